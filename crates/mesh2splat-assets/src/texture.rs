use glam::{Vec2, Vec4};
use gltf::image::Format;
use image::imageops::FilterType;
use image::RgbaImage;
use tracing::debug;

/// A decoded texture, always stored as tightly packed RGBA8 rows (top row first).
#[derive(Debug, Clone)]
pub struct TextureAsset {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl TextureAsset {
    /// Convert decoded glTF image data to RGBA8.
    ///
    /// Gray images are expanded to RGB, missing alpha becomes opaque and
    /// 16-bit channels keep their high byte. Float formats are returned as
    /// the error.
    pub fn from_gltf_image(image: gltf::image::Data) -> Result<Self, Format> {
        let (channels, wide) = match image.format {
            Format::R8 => (1, false),
            Format::R8G8 => (2, false),
            Format::R8G8B8 => (3, false),
            Format::R8G8B8A8 => (4, false),
            Format::R16 => (1, true),
            Format::R16G16 => (2, true),
            Format::R16G16B16 => (3, true),
            Format::R16G16B16A16 => (4, true),
            other => return Err(other),
        };

        let data = if channels == 4 && !wide {
            image.pixels
        } else {
            let stride = if wide { channels * 2 } else { channels };
            let mut rgba = Vec::with_capacity(image.pixels.len() / stride * 4);
            for px in image.pixels.chunks_exact(stride) {
                // Little-endian u16: the high byte comes second.
                let c = |i: usize| if wide { px[i * 2 + 1] } else { px[i] };
                let texel = match channels {
                    1 => [c(0), c(0), c(0), 255],
                    2 => [c(0), c(0), c(0), c(1)],
                    3 => [c(0), c(1), c(2), 255],
                    _ => [c(0), c(1), c(2), c(3)],
                };
                rgba.extend_from_slice(&texel);
            }
            rgba
        };

        let format = image.format;
        Self::from_rgba8(image.width, image.height, data).ok_or(format)
    }

    /// Build from raw RGBA8 pixels. Returns `None` if the length does not match.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(|img| Self {
            width,
            height,
            data: img.into_raw(),
        })
    }

    /// Downscale so neither side exceeds `max_size`, preserving aspect ratio.
    pub fn limit_size(self, max_size: u32) -> Self {
        let max_size = max_size.max(1);
        if self.width <= max_size && self.height <= max_size {
            return self;
        }

        let scale = max_size as f32 / self.width.max(self.height) as f32;
        let new_w = ((self.width as f32 * scale).round() as u32).clamp(1, max_size);
        let new_h = ((self.height as f32 * scale).round() as u32).clamp(1, max_size);
        debug!(
            "Downscaling texture {}x{} -> {}x{}",
            self.width, self.height, new_w, new_h
        );

        let (width, height) = (self.width, self.height);
        match RgbaImage::from_raw(width, height, self.data) {
            Some(img) => {
                let resized = image::imageops::resize(&img, new_w, new_h, FilterType::Triangle);
                Self {
                    width: new_w,
                    height: new_h,
                    data: resized.into_raw(),
                }
            }
            // Constructors guarantee matching lengths.
            None => Self {
                width: 0,
                height: 0,
                data: Vec::new(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Sample with bilinear filtering and repeat wrapping.
    /// UV (0, 0) is the top-left corner of the image, as in glTF.
    /// Returns channels in [0, 1]; `None` for empty textures or non-finite UVs.
    pub fn sample(&self, uv: Vec2) -> Option<Vec4> {
        if self.is_empty() || !uv.is_finite() {
            return None;
        }

        // Pixel centers sit at half-integer coordinates.
        let x = uv.x.rem_euclid(1.0) * self.width as f32 - 0.5;
        let y = uv.y.rem_euclid(1.0) * self.height as f32 - 0.5;

        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        let wx = x - x.floor();
        let wy = y - y.floor();

        let c00 = self.texel_wrapped(x0, y0);
        let c10 = self.texel_wrapped(x0 + 1, y0);
        let c01 = self.texel_wrapped(x0, y0 + 1);
        let c11 = self.texel_wrapped(x0 + 1, y0 + 1);

        let top = c00.lerp(c10, wx);
        let bottom = c01.lerp(c11, wx);
        Some(top.lerp(bottom, wy))
    }

    fn texel_wrapped(&self, x: i64, y: i64) -> Vec4 {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        let i = (y * self.width as usize + x) * 4;
        let px = &self.data[i..i + 4];
        Vec4::new(
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
            px[3] as f32 / 255.0,
        )
    }
}
