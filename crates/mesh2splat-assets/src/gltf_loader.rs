use std::path::Path;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use gltf::mesh::Mode;
use tracing::{debug, info, warn};

use mesh2splat_core::{Triangle, MAX_TEX_COORD_SETS};

use crate::error::AssetError;
use crate::material::{MaterialAsset, TextureRef};
use crate::mesh::SceneAsset;
use crate::texture::TextureAsset;

/// Options controlling how a scene is loaded.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Downscale textures whose width or height exceeds this many pixels.
    pub max_texture_size: Option<u32>,
}

/// Load a glTF 2.0 file (.gltf or .glb) with default options.
pub fn load_scene(path: &Path) -> Result<SceneAsset, AssetError> {
    load_scene_with(path, &LoadOptions::default())
}

/// Load a glTF 2.0 file (.gltf or .glb) and flatten it into world-space triangles.
///
/// Only triangle-list primitives are converted; other topologies are skipped
/// with a warning. Images that cannot be decoded are left out, so materials
/// referencing them fall back to their flat factors.
pub fn load_scene_with(path: &Path, options: &LoadOptions) -> Result<SceneAsset, AssetError> {
    if !path.exists() {
        return Err(AssetError::NotFound(path.to_path_buf()));
    }

    let gltf = gltf::Gltf::open(path).map_err(|e| open_error(path, e))?;
    let base = path.parent();
    let buffers = gltf::import_buffers(&gltf.document, base, gltf.blob.clone())
        .map_err(|e| AssetError::GltfLoadFailed(path.to_path_buf(), e.to_string()))?;
    let document = &gltf.document;

    let textures = load_images(document, base, &buffers, options);

    let mut materials: Vec<MaterialAsset> = document.materials().map(convert_material).collect();
    let default_material = materials.len();
    materials.push(MaterialAsset::default());

    let mut scene = SceneAsset {
        triangles: Vec::new(),
        materials,
        textures,
    };

    let root_scene = document.default_scene().or_else(|| document.scenes().next());
    match root_scene {
        Some(root) => {
            for node in root.nodes() {
                visit_node(&node, Mat4::IDENTITY, &buffers, default_material, &mut scene)?;
            }
        }
        None => {
            // No scene graph: take meshes as authored.
            for mesh in document.meshes() {
                append_mesh(&mesh, Mat4::IDENTITY, &buffers, default_material, &mut scene)?;
            }
        }
    }

    info!(
        "glTF '{}': {} triangles, {} materials, {}/{} textures decoded",
        path.display(),
        scene.triangles.len(),
        scene.materials.len(),
        scene.textures.iter().filter(|t| t.is_some()).count(),
        scene.textures.len()
    );

    Ok(scene)
}

fn open_error(path: &Path, error: gltf::Error) -> AssetError {
    match error {
        gltf::Error::Io(io) => AssetError::Io(path.to_path_buf(), io),
        gltf::Error::Validation(errors) => errors
            .iter()
            .find_map(|(at, kind)| missing_position(&at.to_string(), kind))
            .unwrap_or_else(|| {
                AssetError::GltfLoadFailed(
                    path.to_path_buf(),
                    gltf::Error::Validation(errors).to_string(),
                )
            }),
        other => AssetError::GltfLoadFailed(path.to_path_buf(), other.to_string()),
    }
}

/// Validation reports a primitive without POSITION at
/// `meshes[M].primitives[P].attributes["POSITION"]`.
fn missing_position(at: &str, kind: &gltf::json::validation::Error) -> Option<AssetError> {
    if !matches!(kind, gltf::json::validation::Error::Missing)
        || !at.contains("attributes")
        || !at.contains("POSITION")
    {
        return None;
    }

    let index_after = |key: &str| -> Option<usize> {
        let rest = &at[at.find(key)? + key.len()..];
        let digits: String = rest
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    };

    let mesh = index_after("meshes")?;
    Some(AssetError::MissingAccessor {
        mesh: format!("mesh{}", mesh),
        primitive: index_after("primitives")?,
        accessor: "POSITION",
    })
}

fn visit_node(
    node: &gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    default_material: usize,
    scene: &mut SceneAsset,
) -> Result<(), AssetError> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        append_mesh(&mesh, world, buffers, default_material, scene)?;
    }

    for child in node.children() {
        visit_node(&child, world, buffers, default_material, scene)?;
    }

    Ok(())
}

fn append_mesh(
    mesh: &gltf::Mesh<'_>,
    world: Mat4,
    buffers: &[gltf::buffer::Data],
    default_material: usize,
    scene: &mut SceneAsset,
) -> Result<(), AssetError> {
    let name = mesh
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("mesh{}", mesh.index()));

    let linear = Mat3::from_mat4(world);
    let det = linear.determinant();
    let normal_matrix = if det.abs() > f32::EPSILON {
        linear.inverse().transpose()
    } else {
        linear
    };
    // Mirroring transforms flip winding; swap two corners to keep faces outward.
    let mirrored = det < 0.0;

    let before = scene.triangles.len();

    for primitive in mesh.primitives() {
        if primitive.mode() != Mode::Triangles {
            warn!(
                "Skipping primitive {} of mesh '{}': unsupported topology {:?}",
                primitive.index(),
                name,
                primitive.mode()
            );
            continue;
        }

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .ok_or_else(|| AssetError::MissingAccessor {
                mesh: name.clone(),
                primitive: primitive.index(),
                accessor: "POSITION",
            })?
            .map(|p| world.transform_point3(Vec3::from(p)))
            .collect();

        let normals: Option<Vec<Vec3>> = reader.read_normals().map(|iter| {
            iter.map(|n| (normal_matrix * Vec3::from(n)).normalize_or_zero())
                .collect()
        });

        let mut tex_coords: [Option<Vec<Vec2>>; MAX_TEX_COORD_SETS] = Default::default();
        for (set, slot) in tex_coords.iter_mut().enumerate() {
            *slot = reader
                .read_tex_coords(set as u32)
                .map(|tc| tc.into_f32().map(Vec2::from).collect());
        }

        let colors: Option<Vec<Vec4>> = reader
            .read_colors(0)
            .map(|c| c.into_rgba_f32().map(Vec4::from).collect());

        let indices: Vec<u32> = match reader.read_indices() {
            Some(idx) => idx.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        if indices.len() % 3 != 0 {
            warn!(
                "Primitive {} of mesh '{}' has {} indices; ignoring the trailing {}",
                primitive.index(),
                name,
                indices.len(),
                indices.len() % 3
            );
        }

        let material = primitive
            .material()
            .index()
            .unwrap_or(default_material);

        for corner in indices.chunks_exact(3) {
            let mut idx = [corner[0] as usize, corner[1] as usize, corner[2] as usize];
            if mirrored {
                idx.swap(1, 2);
            }

            if idx.iter().any(|&i| i >= positions.len()) {
                return Err(AssetError::InvalidIndices {
                    mesh: name.clone(),
                    primitive: primitive.index(),
                    vertex_count: positions.len(),
                });
            }

            let pick3 = |values: &[Vec3]| -> Option<[Vec3; 3]> {
                Some([
                    *values.get(idx[0])?,
                    *values.get(idx[1])?,
                    *values.get(idx[2])?,
                ])
            };

            let mut triangle_uvs = [None; MAX_TEX_COORD_SETS];
            for (slot, uvs) in triangle_uvs.iter_mut().zip(&tex_coords) {
                *slot = uvs.as_ref().and_then(|uvs| {
                    Some([*uvs.get(idx[0])?, *uvs.get(idx[1])?, *uvs.get(idx[2])?])
                });
            }

            scene.triangles.push(Triangle {
                positions: [positions[idx[0]], positions[idx[1]], positions[idx[2]]],
                normals: normals
                    .as_deref()
                    .and_then(pick3)
                    .unwrap_or([Vec3::ZERO; 3]),
                tex_coords: triangle_uvs,
                colors: colors.as_ref().and_then(|c| {
                    Some([*c.get(idx[0])?, *c.get(idx[1])?, *c.get(idx[2])?])
                }),
                material,
            });
        }
    }

    debug!(
        "Loaded mesh '{}' with {} triangles",
        name,
        scene.triangles.len() - before
    );
    Ok(())
}

fn texture_ref(texture: gltf::Texture<'_>, tex_coord: u32) -> TextureRef {
    TextureRef {
        image: texture.source().index(),
        tex_coord: tex_coord as usize,
    }
}

fn convert_material(material: gltf::Material<'_>) -> MaterialAsset {
    let pbr = material.pbr_metallic_roughness();

    MaterialAsset {
        name: material
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("material{}", material.index().unwrap_or_default())),
        base_color_factor: Vec4::from(pbr.base_color_factor()),
        base_color_texture: pbr
            .base_color_texture()
            .map(|info| texture_ref(info.texture(), info.tex_coord())),
        metallic_factor: pbr.metallic_factor(),
        roughness_factor: pbr.roughness_factor(),
        metallic_roughness_texture: pbr
            .metallic_roughness_texture()
            .map(|info| texture_ref(info.texture(), info.tex_coord())),
        emissive_factor: Vec3::from(material.emissive_factor()),
        emissive_texture: material
            .emissive_texture()
            .map(|info| texture_ref(info.texture(), info.tex_coord())),
        occlusion_texture: material
            .occlusion_texture()
            .as_ref()
            .map(|occ| texture_ref(occ.texture(), occ.tex_coord())),
        occlusion_strength: material
            .occlusion_texture()
            .map(|occ| occ.strength())
            .unwrap_or(1.0),
    }
}

/// Decode every image in the document. Failures are logged and yield `None`.
///
/// Images may live in buffer views, external files or `data:` URIs.
fn load_images(
    document: &gltf::Document,
    base: Option<&Path>,
    buffers: &[gltf::buffer::Data],
    options: &LoadOptions,
) -> Vec<Option<TextureAsset>> {
    document
        .images()
        .map(|image| match decode_image(&image, base, buffers) {
            Ok(tex) => Some(match options.max_texture_size {
                Some(max) => tex.limit_size(max),
                None => tex,
            }),
            Err(e) => {
                warn!("{}, falling back to flat material color", e);
                None
            }
        })
        .collect()
}

fn decode_image(
    image: &gltf::Image<'_>,
    base: Option<&Path>,
    buffers: &[gltf::buffer::Data],
) -> Result<TextureAsset, AssetError> {
    let data = gltf::image::Data::from_source(image.source(), base, buffers).map_err(|e| {
        AssetError::ImageLoadFailed {
            image: image.index(),
            reason: e.to_string(),
        }
    })?;

    TextureAsset::from_gltf_image(data).map_err(|format| AssetError::UnsupportedFormat {
        image: image.index(),
        format: format!("{:?}", format),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{GlbBuilder, Primitive};

    fn write_glb(bytes: &[u8]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scene.glb"), bytes).unwrap();
        dir
    }

    #[test]
    fn missing_file_returns_error() {
        let result = load_scene(Path::new("/nonexistent/does_not_exist.glb"));
        match result.unwrap_err() {
            AssetError::NotFound(_) => {}
            other => panic!("expected NotFound, got: {:?}", other),
        }
    }

    #[test]
    fn malformed_container_returns_error() {
        let dir = write_glb(b"glTF this is not a real container");
        let result = load_scene(&dir.path().join("scene.glb"));
        assert!(matches!(result, Err(AssetError::GltfLoadFailed(_, _))));
    }

    #[test]
    fn loads_indexed_triangles() {
        let glb = GlbBuilder::new().primitive(Primitive::cube()).build();
        let dir = write_glb(&glb);
        let scene = load_scene(&dir.path().join("scene.glb")).unwrap();

        assert_eq!(scene.triangle_count(), 12);
        assert!((scene.surface_area() - 6.0).abs() < 1e-5);
        // One document material plus the built-in default.
        assert_eq!(scene.materials.len(), 2);
        assert!(scene.triangles.iter().all(|t| t.material == 0));
    }

    #[test]
    fn skips_non_triangle_primitives() {
        let glb = GlbBuilder::new()
            .primitive(Primitive::unit_triangle())
            .primitive(Primitive::unit_triangle().with_mode(0))
            .build();
        let dir = write_glb(&glb);
        let scene = load_scene(&dir.path().join("scene.glb")).unwrap();
        assert_eq!(scene.triangle_count(), 1);
    }

    #[test]
    fn applies_node_translation() {
        let glb = GlbBuilder::new()
            .primitive(Primitive::unit_triangle())
            .translation([10.0, 0.0, 0.0])
            .build();
        let dir = write_glb(&glb);
        let scene = load_scene(&dir.path().join("scene.glb")).unwrap();
        let bounds = scene.bounds();
        assert!((bounds.min.x - 10.0).abs() < 1e-6);
    }

    #[test]
    fn missing_positions_are_reported() {
        let glb = GlbBuilder::new()
            .primitive(Primitive::non_indexed(Vec::new()).with_normals(vec![[0.0, 0.0, 1.0]; 3]))
            .build();
        let dir = write_glb(&glb);
        match load_scene(&dir.path().join("scene.glb")) {
            Err(AssetError::MissingAccessor {
                primitive, accessor, ..
            }) => {
                assert_eq!(primitive, 0);
                assert_eq!(accessor, "POSITION");
            }
            other => panic!("expected MissingAccessor, got: {:?}", other),
        }
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let prim = Primitive::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 5],
        );
        let dir = write_glb(&GlbBuilder::new().primitive(prim).build());
        match load_scene(&dir.path().join("scene.glb")) {
            Err(AssetError::InvalidIndices { vertex_count, .. }) => assert_eq!(vertex_count, 3),
            other => panic!("expected InvalidIndices, got: {:?}", other),
        }
    }

    #[test]
    fn non_indexed_vertices_are_taken_in_order() {
        let positions: Vec<[f32; 3]> = (0..6).map(|i| [i as f32, (i % 3) as f32, 0.0]).collect();
        let glb = GlbBuilder::new()
            .primitive(Primitive::non_indexed(positions.clone()))
            .build();
        let dir = write_glb(&glb);
        let scene = load_scene(&dir.path().join("scene.glb")).unwrap();

        assert_eq!(scene.triangle_count(), 2);
        let second = &scene.triangles[1];
        for (corner, expected) in second.positions.iter().zip(&positions[3..]) {
            assert_eq!(*corner, Vec3::from(*expected));
        }
    }

    #[test]
    fn trailing_partial_triangle_is_ignored() {
        let positions: Vec<[f32; 3]> = (0..7).map(|i| [i as f32, (i % 2) as f32, 0.0]).collect();
        let dir = write_glb(
            &GlbBuilder::new()
                .primitive(Primitive::non_indexed(positions.clone()))
                .build(),
        );
        let scene = load_scene(&dir.path().join("scene.glb")).unwrap();
        assert_eq!(scene.triangle_count(), 2);

        let indexed = Primitive::new(positions[..4].to_vec(), vec![0, 1, 2, 3]);
        let dir = write_glb(&GlbBuilder::new().primitive(indexed).build());
        let scene = load_scene(&dir.path().join("scene.glb")).unwrap();
        assert_eq!(scene.triangle_count(), 1);
    }

    #[test]
    fn mirrored_node_keeps_faces_outward() {
        let glb = GlbBuilder::new()
            .primitive(Primitive::cube())
            .scale([-1.0, 1.0, 1.0])
            .build();
        let dir = write_glb(&glb);
        let scene = load_scene(&dir.path().join("scene.glb")).unwrap();
        assert_eq!(scene.triangle_count(), 12);

        for tri in &scene.triangles {
            let face = tri.face_normal().unwrap();
            let center = (tri.positions[0] + tri.positions[1] + tri.positions[2]) / 3.0;
            assert!(face.dot(center) > 0.0, "face points inward: {:?}", tri);
            for normal in tri.normals {
                assert!((normal - face).length() < 1e-5);
            }
        }
    }

    #[test]
    fn decodes_data_uri_texture() {
        let gltf = GlbBuilder::new()
            .primitive(Primitive::unit_triangle().with_uvs())
            .base_color_texture(2, 2, [0, 255, 0, 255])
            .build_embedded_gltf();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.gltf");
        std::fs::write(&path, gltf).unwrap();

        let scene = load_scene(&path).unwrap();
        assert_eq!(scene.triangle_count(), 1);
        let tex = scene.texture(0).expect("data URI texture decoded");
        assert_eq!((tex.width, tex.height), (2, 2));
        assert_eq!(&tex.data[..4], &[0, 255, 0, 255]);
    }

    #[test]
    fn decodes_embedded_texture() {
        let glb = GlbBuilder::new()
            .primitive(Primitive::unit_triangle().with_uvs())
            .base_color_texture(2, 2, [0, 0, 255, 255])
            .build();
        let dir = write_glb(&glb);
        let scene = load_scene(&dir.path().join("scene.glb")).unwrap();

        let tex = scene.texture(0).expect("texture decoded");
        assert_eq!((tex.width, tex.height), (2, 2));
        assert_eq!(scene.materials[0].base_color_texture.map(|t| t.image), Some(0));
        assert!(scene.triangles[0].tex_coords[0].is_some());
    }

    #[test]
    fn undecodable_texture_degrades() {
        let glb = GlbBuilder::new()
            .primitive(Primitive::unit_triangle().with_uvs())
            .corrupt_texture()
            .build();
        let dir = write_glb(&glb);
        let scene = load_scene(&dir.path().join("scene.glb")).unwrap();
        assert_eq!(scene.textures.len(), 1);
        assert!(scene.texture(0).is_none());
        assert_eq!(scene.triangle_count(), 1);
    }

    #[test]
    fn max_texture_size_downscales() {
        let glb = GlbBuilder::new()
            .primitive(Primitive::unit_triangle().with_uvs())
            .base_color_texture(8, 8, [255, 0, 0, 255])
            .build();
        let dir = write_glb(&glb);
        let options = LoadOptions {
            max_texture_size: Some(4),
        };
        let scene = load_scene_with(&dir.path().join("scene.glb"), &options).unwrap();
        let tex = scene.texture(0).unwrap();
        assert_eq!((tex.width, tex.height), (4, 4));
    }
}
