//! CPU texture data and GPU upload.

use image::RgbaImage;

/// RGBA8 texture data in CPU-friendly form before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl TextureData {
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width * height * 4) as usize,
            "Data size doesn't match RGBA8 format"
        );
        Self {
            data,
            width,
            height,
        }
    }

    pub fn from_pixels(pixels: &RgbaImage) -> Self {
        let (width, height) = pixels.dimensions();
        Self::new_rgba8(width, height, pixels.as_raw().clone())
    }

    /// 1x1 solid color, used where the shader expects a bound texture but
    /// the material has no map for that slot.
    pub fn solid(color: [u8; 4]) -> Self {
        Self::new_rgba8(1, 1, color.to_vec())
    }

    pub fn is_valid(&self) -> bool {
        self.data.len() == (self.width * self.height * 4) as usize
            && self.width > 0
            && self.height > 0
    }

    /// Upload to the GPU and return a view for binding.
    pub fn upload(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
    ) -> wgpu::TextureView {
        let size = wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.width),
                rows_per_image: Some(self.height),
            },
            size,
        );
        log::info!(
            "Uploaded texture '{}' {}x{} ({} bytes)",
            label,
            self.width,
            self.height,
            self.data.len()
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pixels() {
        let mut img = RgbaImage::new(4, 2);
        img.put_pixel(0, 0, image::Rgba([9, 8, 7, 255]));
        let tex = TextureData::from_pixels(&img);
        assert_eq!(tex.width, 4);
        assert_eq!(tex.height, 2);
        assert!(tex.is_valid());
        assert_eq!(&tex.data[0..4], &[9, 8, 7, 255]);
    }

    #[test]
    fn test_solid() {
        let tex = TextureData::solid([255, 255, 255, 255]);
        assert!(tex.is_valid());
        assert_eq!(tex.data.len(), 4);
    }
}
