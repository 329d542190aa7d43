//! Binary little-endian PLY serialization of splat buffers
//!
//! Two fixed vertex layouts are supported. `Standard`:
//!
//! ```text
//! float x y z | uchar red green blue alpha | float sx sy sz | float qx qy qz qw | float nx ny nz
//! ```
//!
//! `Pbr` appends `float roughness metallic emissive_r emissive_g emissive_b`.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use glam::{Quat, Vec3};
use mesh2splat_core::{Color, PbrChannels, Splat};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::buffer::SplatBuffer;
use crate::error::ConvertError;

/// Output schema selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlyFormat {
    #[default]
    Standard,
    Pbr,
}

/// Numeric flag of the standard layout.
pub const PLY_FORMAT_STANDARD: u32 = 0;
/// Numeric flag of the PBR-extended layout.
pub const PLY_FORMAT_PBR: u32 = 1;

/// Vertices reserved up front when reading; larger files grow as records arrive.
const MAX_PREALLOCATED_VERTICES: usize = 1 << 20;

const STANDARD_PROPERTIES: &[(&str, &str)] = &[
    ("float", "x"),
    ("float", "y"),
    ("float", "z"),
    ("uchar", "red"),
    ("uchar", "green"),
    ("uchar", "blue"),
    ("uchar", "alpha"),
    ("float", "sx"),
    ("float", "sy"),
    ("float", "sz"),
    ("float", "qx"),
    ("float", "qy"),
    ("float", "qz"),
    ("float", "qw"),
    ("float", "nx"),
    ("float", "ny"),
    ("float", "nz"),
];

const PBR_PROPERTIES: &[(&str, &str)] = &[
    ("float", "roughness"),
    ("float", "metallic"),
    ("float", "emissive_r"),
    ("float", "emissive_g"),
    ("float", "emissive_b"),
];

impl PlyFormat {
    /// Map a numeric flag (0 standard, 1 PBR). Anything else is rejected.
    pub fn from_flag(flag: u32) -> Result<Self, ConvertError> {
        match flag {
            PLY_FORMAT_STANDARD => Ok(PlyFormat::Standard),
            PLY_FORMAT_PBR => Ok(PlyFormat::Pbr),
            other => Err(ConvertError::UnsupportedFormat(other)),
        }
    }

    pub fn flag(&self) -> u32 {
        match self {
            PlyFormat::Standard => PLY_FORMAT_STANDARD,
            PlyFormat::Pbr => PLY_FORMAT_PBR,
        }
    }

    pub fn is_pbr(&self) -> bool {
        matches!(self, PlyFormat::Pbr)
    }

    /// Declared vertex properties as `(type, name)`, in record order.
    pub fn properties(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        let extra: &[(&str, &str)] = if self.is_pbr() { PBR_PROPERTIES } else { &[] };
        STANDARD_PROPERTIES.iter().chain(extra).copied()
    }

    /// Bytes per vertex record.
    pub fn record_size(&self) -> usize {
        self.properties()
            .map(|(ty, _)| if ty == "uchar" { 1 } else { 4 })
            .sum()
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlyFormat::Standard => "standard",
            PlyFormat::Pbr => "pbr",
        }
    }
}

/// Options for [`write_ply`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlyWriteOptions {
    /// Emit a zero-vertex file instead of failing on an empty buffer.
    pub allow_empty: bool,
}

/// Write `buffer` to `path`.
///
/// Data goes to a temporary sibling file that is renamed into place once
/// complete, so a failed write never leaves a partial file at `path`.
pub fn write_ply(
    buffer: &SplatBuffer,
    path: &Path,
    format: PlyFormat,
    options: PlyWriteOptions,
) -> Result<(), ConvertError> {
    if buffer.is_empty() && !options.allow_empty {
        return Err(ConvertError::EmptyBuffer);
    }

    let tmp = temp_path(path);
    let result = File::create(&tmp).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write_ply_to(&mut writer, buffer, format)?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()
    });

    let result = result.and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(ConvertError::Io(path.to_path_buf(), e));
    }

    info!(
        "Wrote {} splats ({} layout) to {}",
        buffer.len(),
        format.name(),
        path.display()
    );
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "splats.ply".to_string());
    path.with_file_name(format!(".{}.partial", name))
}

/// Serialize header and records to any writer.
pub fn write_ply_to<W: Write>(
    writer: &mut W,
    buffer: &SplatBuffer,
    format: PlyFormat,
) -> io::Result<()> {
    writer.write_all(header(buffer.len(), format).as_bytes())?;

    if format.is_pbr() && !buffer.has_pbr() {
        debug!("Buffer has no PBR channels; writing material defaults");
    }

    let mut record = Vec::with_capacity(format.record_size());
    for splat in buffer.iter() {
        record.clear();
        encode_record(&mut record, &splat, format);
        writer.write_all(&record)?;
    }
    writer.flush()
}

/// ASCII header for `count` vertices.
pub fn header(count: usize, format: PlyFormat) -> String {
    let mut out = String::new();
    out.push_str("ply\n");
    out.push_str("format binary_little_endian 1.0\n");
    out.push_str(&format!("comment mesh2splat {} layout\n", format.name()));
    out.push_str(&format!("element vertex {}\n", count));
    for (ty, name) in format.properties() {
        out.push_str(&format!("property {} {}\n", ty, name));
    }
    out.push_str("end_header\n");
    out
}

fn encode_record(out: &mut Vec<u8>, splat: &Splat, format: PlyFormat) {
    let put = |out: &mut Vec<u8>, values: &[f32]| {
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    };

    put(out, &splat.position.to_array());
    out.extend_from_slice(&splat.color.to_rgba8());
    put(out, &splat.scale.to_array());
    put(out, &splat.rotation.to_array());
    put(out, &splat.normal.to_array());

    if format.is_pbr() {
        let pbr = splat.pbr.unwrap_or_default();
        put(out, &[pbr.roughness, pbr.metallic]);
        put(out, &pbr.emissive.to_array());
    }
}

/// Read a file written by [`write_ply`].
pub fn read_ply(path: &Path) -> Result<(SplatBuffer, PlyFormat), ConvertError> {
    let file = File::open(path).map_err(|e| ConvertError::Io(path.to_path_buf(), e))?;
    read_ply_from(BufReader::new(file)).map_err(|e| match e {
        ConvertError::Io(_, io) => ConvertError::Io(path.to_path_buf(), io),
        other => other,
    })
}

/// Parse a PLY stream in either layout.
pub fn read_ply_from<R: BufRead>(mut reader: R) -> Result<(SplatBuffer, PlyFormat), ConvertError> {
    let (count, format) = read_header(&mut reader)?;

    let mut buffer =
        SplatBuffer::with_capacity(count.min(MAX_PREALLOCATED_VERTICES), format.is_pbr());
    let mut record = vec![0u8; format.record_size()];
    for i in 0..count {
        reader.read_exact(&mut record).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                ConvertError::MalformedPly(format!("body ends after {} of {} vertices", i, count))
            }
            _ => ConvertError::Io(PathBuf::new(), e),
        })?;
        buffer.push(decode_record(&record, format));
    }

    Ok((buffer, format))
}

fn read_header<R: BufRead>(reader: &mut R) -> Result<(usize, PlyFormat), ConvertError> {
    let malformed = |msg: &str| ConvertError::MalformedPly(msg.to_string());

    let mut line = String::new();
    let mut next_line = |line: &mut String| -> Result<(), ConvertError> {
        line.clear();
        let read = reader
            .read_line(line)
            .map_err(|e| ConvertError::Io(PathBuf::new(), e))?;
        if read == 0 {
            return Err(ConvertError::MalformedPly("unexpected end of header".into()));
        }
        Ok(())
    };

    next_line(&mut line)?;
    if line.trim_end() != "ply" {
        return Err(malformed("missing 'ply' magic"));
    }

    let mut count: Option<usize> = None;
    let mut properties: Vec<(String, String)> = Vec::new();

    loop {
        next_line(&mut line)?;
        let mut words = line.split_whitespace();
        match words.next() {
            Some("end_header") => break,
            Some("comment") | Some("obj_info") | None => {}
            Some("format") => {
                if words.next() != Some("binary_little_endian") {
                    return Err(malformed("only binary_little_endian is supported"));
                }
            }
            Some("element") => {
                if count.is_some() || words.next() != Some("vertex") {
                    return Err(malformed("expected a single 'vertex' element"));
                }
                count = Some(
                    words
                        .next()
                        .and_then(|n| n.parse().ok())
                        .ok_or_else(|| malformed("invalid vertex count"))?,
                );
            }
            Some("property") => {
                let (Some(ty), Some(name)) = (words.next(), words.next()) else {
                    return Err(malformed("incomplete property line"));
                };
                properties.push((ty.to_string(), name.to_string()));
            }
            Some(other) => {
                return Err(ConvertError::MalformedPly(format!(
                    "unexpected header keyword '{}'",
                    other
                )))
            }
        }
    }

    let count = count.ok_or_else(|| malformed("no vertex element"))?;
    let format = [PlyFormat::Standard, PlyFormat::Pbr]
        .into_iter()
        .find(|f| {
            f.properties()
                .map(|(t, n)| (t.to_string(), n.to_string()))
                .eq(properties.iter().cloned())
        })
        .ok_or_else(|| malformed("vertex properties match neither splat layout"))?;

    Ok((count, format))
}

fn decode_record(bytes: &[u8], format: PlyFormat) -> Splat {
    let float = |at: usize| {
        f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    };
    let vec3 = |at: usize| Vec3::new(float(at), float(at + 4), float(at + 8));

    Splat {
        position: vec3(0),
        color: Color::from_rgba8([bytes[12], bytes[13], bytes[14], bytes[15]]),
        scale: vec3(16),
        rotation: Quat::from_xyzw(float(28), float(32), float(36), float(40)),
        normal: vec3(44),
        pbr: format.is_pbr().then(|| PbrChannels {
            roughness: float(56),
            metallic: float(60),
            emissive: vec3(64),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_buffer(with_pbr: bool) -> SplatBuffer {
        let mut buffer = SplatBuffer::new(with_pbr);
        for i in 0..4 {
            let t = i as f32;
            buffer.push(Splat {
                position: Vec3::new(t, -t * 0.5, 1.0 / 3.0 + t),
                color: Color::from_rgba8([i as u8 * 60, 7, 255, 200]),
                scale: Vec3::new(0.01 * (t + 1.0), 0.02, 1e-7),
                rotation: Quat::from_rotation_y(0.3 * t),
                normal: Vec3::new(0.0, 0.6, 0.8),
                pbr: with_pbr.then(|| PbrChannels {
                    roughness: 0.1 * t,
                    metallic: 1.0 - 0.2 * t,
                    emissive: Vec3::new(t, 0.5, 0.25),
                }),
            });
        }
        buffer
    }

    fn to_bytes(buffer: &SplatBuffer, format: PlyFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_ply_to(&mut bytes, buffer, format).unwrap();
        bytes
    }

    fn header_text(bytes: &[u8]) -> String {
        let end = bytes
            .windows(b"end_header\n".len())
            .position(|w| w == b"end_header\n")
            .unwrap();
        String::from_utf8(bytes[..end].to_vec()).unwrap()
    }

    #[test]
    fn format_flags() {
        assert_eq!(PlyFormat::from_flag(0).unwrap(), PlyFormat::Standard);
        assert_eq!(PlyFormat::from_flag(1).unwrap(), PlyFormat::Pbr);
        assert!(matches!(
            PlyFormat::from_flag(2),
            Err(ConvertError::UnsupportedFormat(2))
        ));
        assert_eq!(PlyFormat::Pbr.flag(), 1);
    }

    #[test]
    fn record_sizes() {
        assert_eq!(PlyFormat::Standard.record_size(), 56);
        assert_eq!(PlyFormat::Pbr.record_size(), 76);
    }

    #[test]
    fn standard_header_has_no_pbr_properties() {
        let bytes = to_bytes(&sample_buffer(false), PlyFormat::Standard);
        let header = header_text(&bytes);
        assert!(header.starts_with("ply\nformat binary_little_endian 1.0\n"));
        assert!(header.contains("element vertex 4\n"));
        assert!(header.contains("property float qw\n"));
        assert!(!header.contains("roughness"));
        assert!(!header.contains("metallic"));
        assert!(!header.contains("emissive"));
    }

    #[test]
    fn pbr_header_declares_pbr_properties() {
        let bytes = to_bytes(&sample_buffer(true), PlyFormat::Pbr);
        let header = header_text(&bytes);
        assert!(header.contains("property float roughness\n"));
        assert!(header.contains("property float metallic\n"));
        assert!(header.contains("property float emissive_r\n"));
        assert!(header.contains("property float emissive_b\n"));
    }

    #[test]
    fn body_size_matches_layout() {
        let buffer = sample_buffer(true);
        for format in [PlyFormat::Standard, PlyFormat::Pbr] {
            let bytes = to_bytes(&buffer, format);
            let header_len = header(buffer.len(), format).len();
            assert_eq!(bytes.len() - header_len, buffer.len() * format.record_size());
        }
    }

    #[test]
    fn first_record_is_little_endian() {
        let bytes = to_bytes(&sample_buffer(false), PlyFormat::Standard);
        let body = &bytes[header(4, PlyFormat::Standard).len()..];
        assert_eq!(&body[0..4], &0.0f32.to_le_bytes());
        assert_eq!(&body[8..12], &(1.0f32 / 3.0).to_le_bytes());
        assert_eq!(&body[12..16], &[0, 7, 255, 200]);
    }

    #[test]
    fn round_trip_is_exact() {
        for (with_pbr, format) in [(false, PlyFormat::Standard), (true, PlyFormat::Pbr)] {
            let buffer = sample_buffer(with_pbr);
            let bytes = to_bytes(&buffer, format);
            let (read, read_format) = read_ply_from(Cursor::new(bytes)).unwrap();
            assert_eq!(read_format, format);
            assert_eq!(read.len(), buffer.len());
            for (a, b) in buffer.iter().zip(read.iter()) {
                assert_eq!(a.position.to_array().map(f32::to_bits), b.position.to_array().map(f32::to_bits));
                assert_eq!(a.scale.to_array().map(f32::to_bits), b.scale.to_array().map(f32::to_bits));
                assert_eq!(a.rotation.to_array().map(f32::to_bits), b.rotation.to_array().map(f32::to_bits));
                assert_eq!(a.normal.to_array().map(f32::to_bits), b.normal.to_array().map(f32::to_bits));
                assert_eq!(a.color, b.color);
                assert_eq!(a.pbr, b.pbr);
            }
        }
    }

    #[test]
    fn truncated_body_is_rejected() {
        let mut bytes = to_bytes(&sample_buffer(false), PlyFormat::Standard);
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            read_ply_from(Cursor::new(bytes)),
            Err(ConvertError::MalformedPly(_))
        ));
    }

    #[test]
    fn oversized_vertex_count_is_rejected() {
        for count in [u64::MAX.to_string(), "18446744073709551616".to_string()] {
            let mut bytes = header(0, PlyFormat::Standard)
                .replace("element vertex 0", &format!("element vertex {}", count))
                .into_bytes();
            bytes.extend_from_slice(&[0u8; 56]);
            assert!(matches!(
                read_ply_from(Cursor::new(bytes)),
                Err(ConvertError::MalformedPly(_))
            ));
        }
    }

    #[test]
    fn foreign_layout_is_rejected() {
        let text = "ply\nformat binary_little_endian 1.0\nelement vertex 0\nproperty float x\nend_header\n";
        assert!(matches!(
            read_ply_from(Cursor::new(text.as_bytes())),
            Err(ConvertError::MalformedPly(_))
        ));
        let ascii = "ply\nformat ascii 1.0\nelement vertex 0\nend_header\n";
        assert!(read_ply_from(Cursor::new(ascii.as_bytes())).is_err());
    }

    #[test]
    fn empty_buffer_is_an_error_unless_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.ply");
        let empty = SplatBuffer::new(false);

        let result = write_ply(&empty, &path, PlyFormat::Standard, PlyWriteOptions::default());
        assert!(matches!(result, Err(ConvertError::EmptyBuffer)));
        assert!(!path.exists());

        write_ply(
            &empty,
            &path,
            PlyFormat::Standard,
            PlyWriteOptions { allow_empty: true },
        )
        .unwrap();
        let (read, _) = read_ply(&path).unwrap();
        assert!(read.is_empty());
    }

    #[test]
    fn unwritable_path_fails_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.ply");
        let result = write_ply(
            &sample_buffer(false),
            &path,
            PlyFormat::Standard,
            PlyWriteOptions::default(),
        );
        assert!(matches!(result, Err(ConvertError::Io(_, _))));
        assert!(!path.exists());
    }

    #[test]
    fn write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("splats.ply");
        let buffer = sample_buffer(true);
        write_ply(&buffer, &path, PlyFormat::Pbr, PlyWriteOptions::default()).unwrap();

        let (read, format) = read_ply(&path).unwrap();
        assert_eq!(format, PlyFormat::Pbr);
        assert_eq!(read, buffer);
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }
}
