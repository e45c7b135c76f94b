use std::fmt;
use std::path::PathBuf;

use image::RgbaImage;

use crate::category::Category;
use crate::error::PipelineError;

/// Exact number of rendered views (and paired segmentations) stage 4 yields.
pub const VIEW_COUNT: usize = 5;

/// An image kept both in its encoded wire form and decoded for display or
/// GPU upload. The encoded bytes are what gets re-sent to later stages.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub pixels: RgbaImage,
}

impl EncodedImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PipelineError> {
        let pixels = image::load_from_memory(&bytes)
            .map_err(|e| PipelineError::malformed(format!("undecodable image payload: {e}")))?
            .to_rgba8();
        Ok(Self { bytes, pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Opaque server-side working-directory token from the mesh-generation
/// response header. Passed through verbatim to every later stage; never
/// parsed, normalized or synthesized locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFolder(String);

impl SampleFolder {
    pub fn new(raw: impl Into<String>) -> Result<Self, PipelineError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(PipelineError::malformed(
                "mesh generation response carried an empty Output-Folder header",
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User-supplied raw image, as picked from disk.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub path: PathBuf,
    pub image: EncodedImage,
}

/// Stage-1 output: the background-removed image. Its encoded bytes are the
/// stage-2 upload payload.
#[derive(Debug, Clone)]
pub struct ForegroundImage {
    pub image: EncodedImage,
}

/// Stage-2 output: the textured mesh as raw OBJ/MTL bytes plus the albedo
/// texture, and the sample-folder token that links all later stages.
#[derive(Debug, Clone)]
pub struct TexturedMeshBundle {
    pub folder: SampleFolder,
    pub geometry: Vec<u8>,
    pub material: Vec<u8>,
    pub albedo: EncodedImage,
}

/// Stage-3 output: the UV-unwrapped white mesh (binary glTF) and the
/// flattened albedo-UV image.
#[derive(Debug, Clone)]
pub struct WhiteModelBundle {
    pub mesh: Vec<u8>,
    pub albedo_uv: EncodedImage,
}

/// Stage-4 output. Both halves arrive together or not at all; the 5+5 shape
/// is enforced here so no partially-joined set can exist.
#[derive(Debug, Clone)]
pub struct ViewSet {
    renders: Vec<EncodedImage>,
    segmentations: Vec<EncodedImage>,
    category: Category,
}

impl ViewSet {
    pub fn new(
        renders: Vec<EncodedImage>,
        segmentations: Vec<EncodedImage>,
        category: Category,
    ) -> Result<Self, PipelineError> {
        if renders.len() != VIEW_COUNT {
            return Err(PipelineError::malformed(format!(
                "expected {VIEW_COUNT} rendered views, got {}",
                renders.len()
            )));
        }
        if segmentations.len() != VIEW_COUNT {
            return Err(PipelineError::malformed(format!(
                "expected {VIEW_COUNT} segmentation views, got {}",
                segmentations.len()
            )));
        }
        Ok(Self {
            renders,
            segmentations,
            category,
        })
    }

    pub fn renders(&self) -> &[EncodedImage] {
        &self.renders
    }

    pub fn segmentations(&self) -> &[EncodedImage] {
        &self.segmentations
    }

    /// The category the views were segmented with. Materialisation reads it
    /// from here, so stages 4 and 5 can never disagree within one run.
    pub fn category(&self) -> Category {
        self.category
    }
}

/// Stage-5 output: the packed occlusion/roughness/metalness map.
#[derive(Debug, Clone)]
pub struct OrmTexture {
    pub image: EncodedImage,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    /// A tiny valid PNG for artifact construction in tests.
    pub fn tiny_image(color: [u8; 4]) -> EncodedImage {
        let mut img = RgbaImage::new(2, 2);
        for pixel in img.pixels_mut() {
            *pixel = Rgba(color);
        }
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode test png");
        EncodedImage::from_bytes(bytes).expect("decode test png")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::tiny_image;
    use super::*;

    #[test]
    fn test_encoded_image_rejects_garbage() {
        let err = EncodedImage::from_bytes(vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, PipelineError::Malformed(_)));
    }

    #[test]
    fn test_sample_folder_must_not_be_empty() {
        assert!(SampleFolder::new("").is_err());
        let folder = SampleFolder::new("outputs/sample_42").unwrap();
        assert_eq!(folder.as_str(), "outputs/sample_42");
    }

    #[test]
    fn test_sample_folder_is_kept_verbatim() {
        // Tokens with spacing or path-like structure must survive untouched.
        let raw = "  outputs//Sample 7/ ";
        let folder = SampleFolder::new(raw).unwrap();
        assert_eq!(folder.as_str(), raw);
    }

    #[test]
    fn test_view_set_requires_five_plus_five() {
        let img = || tiny_image([10, 20, 30, 255]);
        let five = || (0..VIEW_COUNT).map(|_| img()).collect::<Vec<_>>();

        assert!(ViewSet::new(five(), five(), Category::Car).is_ok());

        let four = (0..4).map(|_| img()).collect::<Vec<_>>();
        assert!(ViewSet::new(five(), four, Category::Car).is_err());

        let six = (0..6).map(|_| img()).collect::<Vec<_>>();
        assert!(ViewSet::new(six, five(), Category::Car).is_err());
    }
}
