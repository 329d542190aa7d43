//! In-memory GLB builders for tests.
//!
//! Produces minimal but valid glTF assets: one mesh, one node, one material
//! and optionally one embedded PNG texture. Output is either a binary GLB
//! container or a `.gltf` JSON document with everything in `data:` URIs.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// Vertex data for one primitive.
#[derive(Debug, Clone)]
pub struct Primitive {
    /// Left empty to omit the POSITION attribute
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Option<Vec<u32>>,
    /// glTF topology: 0 points, 1 lines, 4 triangles, ...
    pub mode: u32,
}

impl Primitive {
    pub fn new(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals: None,
            uvs: None,
            indices: Some(indices),
            mode: 4,
        }
    }

    /// Right triangle in the XY plane with area 1.0 and +Z normals.
    pub fn unit_triangle() -> Self {
        Self::new(
            vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2],
        )
        .with_normals(vec![[0.0, 0.0, 1.0]; 3])
    }

    /// Axis-aligned cube with unit edges centered on the origin: 24 vertices, 12 triangles.
    pub fn cube() -> Self {
        // (normal, u, v) with u x v == normal
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ];

        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut uvs = Vec::new();
        let mut indices = Vec::new();

        for (n, u, v) in faces {
            let base = positions.len() as u32;
            for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
                positions.push([
                    0.5 * n[0] + su * u[0] + sv * v[0],
                    0.5 * n[1] + su * u[1] + sv * v[1],
                    0.5 * n[2] + su * u[2] + sv * v[2],
                ]);
                normals.push(n);
                uvs.push([su + 0.5, sv + 0.5]);
            }
            indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self {
            positions,
            normals: Some(normals),
            uvs: Some(uvs),
            indices: Some(indices),
            mode: 4,
        }
    }

    /// Vertex soup without an index accessor.
    pub fn non_indexed(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            normals: None,
            uvs: None,
            indices: None,
            mode: 4,
        }
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Planar UVs taken from the XY position.
    pub fn with_uvs(mut self) -> Self {
        self.uvs = Some(self.positions.iter().map(|p| [p[0], p[1]]).collect());
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

enum TextureSource {
    Png(Vec<u8>),
    Corrupt,
}

/// Assembles a GLB container.
pub struct GlbBuilder {
    primitives: Vec<Primitive>,
    translation: Option<[f32; 3]>,
    scale: Option<[f32; 3]>,
    base_color: [f32; 4],
    metallic: f32,
    roughness: f32,
    emissive: [f32; 3],
    texture: Option<TextureSource>,
}

impl Default for GlbBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GlbBuilder {
    pub fn new() -> Self {
        Self {
            primitives: Vec::new(),
            translation: None,
            scale: None,
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 1.0,
            roughness: 1.0,
            emissive: [0.0, 0.0, 0.0],
            texture: None,
        }
    }

    pub fn primitive(mut self, primitive: Primitive) -> Self {
        self.primitives.push(primitive);
        self
    }

    pub fn translation(mut self, translation: [f32; 3]) -> Self {
        self.translation = Some(translation);
        self
    }

    /// Node scale; a negative component mirrors the mesh.
    pub fn scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn base_color(mut self, rgba: [f32; 4]) -> Self {
        self.base_color = rgba;
        self
    }

    pub fn pbr_factors(mut self, metallic: f32, roughness: f32, emissive: [f32; 3]) -> Self {
        self.metallic = metallic;
        self.roughness = roughness;
        self.emissive = emissive;
        self
    }

    /// Embed a solid-color PNG as the base color texture.
    pub fn base_color_texture(mut self, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("PNG encoding into memory");
        self.texture = Some(TextureSource::Png(png));
        self
    }

    /// Reference a base color texture whose bytes are not a decodable image.
    pub fn corrupt_texture(mut self) -> Self {
        self.texture = Some(TextureSource::Corrupt);
        self
    }

    /// Binary GLB container.
    pub fn build(self) -> Vec<u8> {
        let (document, bin) = self.document(false);
        assemble_glb(&serde_json::to_vec(&document).expect("fixture JSON"), bin)
    }

    /// `.gltf` JSON with the buffer and the image embedded as base64 `data:` URIs.
    pub fn build_embedded_gltf(self) -> String {
        let (mut document, bin) = self.document(true);
        document["buffers"] = json!([{
            "byteLength": bin.len(),
            "uri": format!("data:application/octet-stream;base64,{}", BASE64.encode(&bin)),
        }]);
        serde_json::to_string_pretty(&document).expect("fixture JSON")
    }

    fn document(self, image_as_uri: bool) -> (Value, Vec<u8>) {
        let mut bin: Vec<u8> = Vec::new();
        let mut views: Vec<Value> = Vec::new();
        let mut accessors: Vec<Value> = Vec::new();

        let mut push_view = |bin: &mut Vec<u8>, bytes: &[u8]| -> usize {
            while bin.len() % 4 != 0 {
                bin.push(0);
            }
            views.push(json!({
                "buffer": 0,
                "byteOffset": bin.len(),
                "byteLength": bytes.len(),
            }));
            bin.extend_from_slice(bytes);
            views.len() - 1
        };

        let mut gltf_primitives = Vec::new();
        for prim in &self.primitives {
            let mut attributes = serde_json::Map::new();

            if !prim.positions.is_empty() {
                let (min, max) = bounds(&prim.positions);
                let view = push_view(&mut bin, &f32_bytes(prim.positions.iter().flatten()));
                accessors.push(json!({
                    "bufferView": view,
                    "componentType": COMPONENT_FLOAT,
                    "count": prim.positions.len(),
                    "type": "VEC3",
                    "min": min,
                    "max": max,
                }));
                attributes.insert("POSITION".into(), json!(accessors.len() - 1));
            }

            if let Some(normals) = &prim.normals {
                let view = push_view(&mut bin, &f32_bytes(normals.iter().flatten()));
                accessors.push(json!({
                    "bufferView": view,
                    "componentType": COMPONENT_FLOAT,
                    "count": normals.len(),
                    "type": "VEC3",
                }));
                attributes.insert("NORMAL".into(), json!(accessors.len() - 1));
            }

            if let Some(uvs) = &prim.uvs {
                let view = push_view(&mut bin, &f32_bytes(uvs.iter().flatten()));
                accessors.push(json!({
                    "bufferView": view,
                    "componentType": COMPONENT_FLOAT,
                    "count": uvs.len(),
                    "type": "VEC2",
                }));
                attributes.insert("TEXCOORD_0".into(), json!(accessors.len() - 1));
            }

            let mut gltf_prim = json!({
                "attributes": attributes,
                "material": 0,
                "mode": prim.mode,
            });

            if let Some(indices) = &prim.indices {
                let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
                let view = push_view(&mut bin, &bytes);
                accessors.push(json!({
                    "bufferView": view,
                    "componentType": COMPONENT_UNSIGNED_INT,
                    "count": indices.len(),
                    "type": "SCALAR",
                }));
                gltf_prim["indices"] = json!(accessors.len() - 1);
            }

            gltf_primitives.push(gltf_prim);
        }

        let mut pbr = json!({
            "baseColorFactor": self.base_color,
            "metallicFactor": self.metallic,
            "roughnessFactor": self.roughness,
        });

        let mut document = json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "meshes": [{ "name": "fixture", "primitives": gltf_primitives }],
        });

        if let Some(source) = &self.texture {
            let bytes: &[u8] = match source {
                TextureSource::Png(png) => png,
                TextureSource::Corrupt => b"definitely not an image",
            };
            document["images"] = if image_as_uri {
                json!([{ "uri": format!("data:image/png;base64,{}", BASE64.encode(bytes)) }])
            } else {
                let view = push_view(&mut bin, bytes);
                json!([{ "bufferView": view, "mimeType": "image/png" }])
            };
            document["textures"] = json!([{ "source": 0 }]);
            pbr["baseColorTexture"] = json!({ "index": 0 });
        }

        let mut node = json!({ "mesh": 0 });
        if let Some(t) = self.translation {
            node["translation"] = json!(t);
        }
        if let Some(s) = self.scale {
            node["scale"] = json!(s);
        }

        document["nodes"] = json!([node]);
        document["materials"] = json!([{
            "name": "fixture-material",
            "pbrMetallicRoughness": pbr,
            "emissiveFactor": self.emissive,
        }]);
        document["accessors"] = json!(accessors);
        document["bufferViews"] = json!(views);
        document["buffers"] = json!([{ "byteLength": bin.len() }]);

        (document, bin)
    }
}

fn f32_bytes<'a>(values: impl Iterator<Item = &'a f32>) -> Vec<u8> {
    values.flat_map(|v| v.to_le_bytes()).collect()
}

fn bounds(positions: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for p in positions {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    (min, max)
}

fn assemble_glb(json: &[u8], mut bin: Vec<u8>) -> Vec<u8> {
    let mut json = json.to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}
