//! Wire schemas and pure request/response codecs for the backend contracts.
//! Everything here is side-effect free so the byte-level invariants (token
//! passed verbatim, 5+5 view shape, archive contents) are unit-testable.

use std::io::{Cursor, Read};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

use mm_core::{Category, EncodedImage, PipelineError, SampleFolder, VIEW_COUNT};

/// Response header carrying the sample-folder token on mesh generation.
pub const OUTPUT_FOLDER_HEADER: &str = "Output-Folder";

// --- response schemas ----------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RemoveBackgroundResponse {
    pub error: Option<String>,
    pub foreground_image: Option<String>,
}

impl RemoveBackgroundResponse {
    pub fn into_payload(self) -> Result<String, PipelineError> {
        if let Some(error) = self.error {
            return Err(PipelineError::Backend(error));
        }
        self.foreground_image
            .ok_or_else(|| PipelineError::malformed("response is missing foreground_image"))
    }
}

#[derive(Debug, Deserialize)]
pub struct DisplayResponse {
    pub error: Option<String>,
    pub uv_image: Option<String>,
    pub mesh_path: Option<String>,
}

impl DisplayResponse {
    pub fn into_parts(self) -> Result<(String, String), PipelineError> {
        if let Some(error) = self.error {
            return Err(PipelineError::Backend(error));
        }
        let uv_image = self
            .uv_image
            .ok_or_else(|| PipelineError::malformed("display response is missing uv_image"))?;
        let mesh_path = self
            .mesh_path
            .ok_or_else(|| PipelineError::malformed("display response is missing mesh_path"))?;
        Ok((uv_image, mesh_path))
    }
}

#[derive(Debug, Deserialize)]
pub struct RenderViewsResponse {
    pub error: Option<String>,
    pub view1: Option<String>,
    pub view2: Option<String>,
    pub view3: Option<String>,
    pub view4: Option<String>,
    pub view5: Option<String>,
}

impl RenderViewsResponse {
    pub fn into_payloads(self) -> Result<Vec<String>, PipelineError> {
        if let Some(error) = self.error {
            return Err(PipelineError::Backend(error));
        }
        let views: Vec<String> = [self.view1, self.view2, self.view3, self.view4, self.view5]
            .into_iter()
            .flatten()
            .collect();
        if views.len() != VIEW_COUNT {
            return Err(PipelineError::malformed(format!(
                "expected {VIEW_COUNT} rendered views, got {}",
                views.len()
            )));
        }
        Ok(views)
    }
}

#[derive(Debug, Deserialize)]
pub struct SegmentationResponse {
    pub error: Option<String>,
    pub seg1: Option<String>,
    pub seg2: Option<String>,
    pub seg3: Option<String>,
    pub seg4: Option<String>,
    pub seg5: Option<String>,
}

impl SegmentationResponse {
    pub fn into_payloads(self) -> Result<Vec<String>, PipelineError> {
        if let Some(error) = self.error {
            return Err(PipelineError::Backend(error));
        }
        let views: Vec<String> = [self.seg1, self.seg2, self.seg3, self.seg4, self.seg5]
            .into_iter()
            .flatten()
            .collect();
        if views.len() != VIEW_COUNT {
            return Err(PipelineError::malformed(format!(
                "expected {VIEW_COUNT} segmentation views, got {}",
                views.len()
            )));
        }
        Ok(views)
    }
}

#[derive(Debug, Deserialize)]
pub struct MaterializeResponse {
    pub error: Option<String>,
    #[serde(rename = "ORM_image_url")]
    pub orm_image_url: Option<String>,
}

impl MaterializeResponse {
    pub fn into_payload(self) -> Result<String, PipelineError> {
        if let Some(error) = self.error {
            return Err(PipelineError::Backend(error));
        }
        self.orm_image_url
            .ok_or_else(|| PipelineError::malformed("response is missing ORM_image_url"))
    }
}

// --- request bodies ------------------------------------------------------
// The token goes into every body exactly as captured.

pub fn display_request(folder: &SampleFolder) -> Value {
    json!({ "sample_folder": folder.as_str() })
}

pub fn rendering_request(folder: &SampleFolder) -> Value {
    json!({ "zip_file": folder.as_str() })
}

pub fn segmentation_request(folder: &SampleFolder, category: Category) -> Value {
    json!({ "zip_file": folder.as_str(), "category": category.id() })
}

pub fn materialize_request(folder: &SampleFolder, category: Category) -> Value {
    json!({ "zip_file": folder.as_str(), "category": category.id() })
}

pub fn export_query(folder: &SampleFolder) -> [(&'static str, String); 1] {
    [("sample_folder", folder.as_str().to_string())]
}

// --- payload decoding ----------------------------------------------------

/// Decode an embedded image payload: either a bare base64 string or a
/// `data:*;base64,` URL.
pub fn decode_image_payload(payload: &str) -> Result<EncodedImage, PipelineError> {
    let encoded = match payload.split_once("base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| PipelineError::malformed(format!("invalid base64 image payload: {e}")))?;
    EncodedImage::from_bytes(bytes)
}

/// Resolve a backend-relative reference against the service base URL.
pub fn resolve_url(base: &str, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        reference.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            reference.trim_start_matches('/')
        )
    }
}

// --- stage-2 archive -----------------------------------------------------

#[derive(Debug)]
pub struct MeshArchive {
    pub geometry: Vec<u8>,
    pub material: Vec<u8>,
    pub albedo: Vec<u8>,
}

/// Unpack the mesh-generation archive. It must contain one mesh-geometry
/// file, one material file and one texture file; a missing part fails the
/// whole transition.
pub fn unpack_mesh_archive(bytes: &[u8]) -> Result<MeshArchive, PipelineError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::malformed(format!("unreadable archive: {e}")))?;

    let mut geometry = None;
    let mut material = None;
    let mut albedo = None;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| PipelineError::malformed(format!("unreadable archive entry: {e}")))?;
        let name = entry.name().to_string();
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| PipelineError::malformed(format!("unreadable archive entry {name}: {e}")))?;

        if name.ends_with(".obj") {
            geometry = Some(contents);
        } else if name.ends_with(".mtl") {
            material = Some(contents);
        } else if name.ends_with(".png") {
            albedo = Some(contents);
        }
    }

    match (geometry, material, albedo) {
        (Some(geometry), Some(material), Some(albedo)) => Ok(MeshArchive {
            geometry,
            material,
            albedo,
        }),
        _ => Err(PipelineError::malformed("missing required files in zip")),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use image::RgbaImage;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 2, image::Rgba([120, 64, 32, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, contents) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_token_is_passed_verbatim() {
        let raw = "outputs/Sample Folder_07";
        let folder = SampleFolder::new(raw).unwrap();

        assert_eq!(display_request(&folder)["sample_folder"], raw);
        assert_eq!(rendering_request(&folder)["zip_file"], raw);
        let seg = segmentation_request(&folder, Category::Car);
        assert_eq!(seg["zip_file"], raw);
        assert_eq!(seg["category"], "car");
        assert_eq!(materialize_request(&folder, Category::Plant)["zip_file"], raw);
        assert_eq!(export_query(&folder)[0].1, raw);
    }

    #[test]
    fn test_decode_data_url_and_bare_base64() {
        let png = tiny_png();
        let encoded = STANDARD.encode(&png);

        let bare = decode_image_payload(&encoded).unwrap();
        assert_eq!(bare.width(), 2);

        let data_url = format!("data:image/png;base64,{encoded}");
        let from_url = decode_image_payload(&data_url).unwrap();
        assert_eq!(from_url.bytes, png);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_image_payload("not base64 at all!!!").is_err());
    }

    #[test]
    fn test_view_responses_require_all_five() {
        let full = RenderViewsResponse {
            error: None,
            view1: Some("a".into()),
            view2: Some("b".into()),
            view3: Some("c".into()),
            view4: Some("d".into()),
            view5: Some("e".into()),
        };
        assert_eq!(full.into_payloads().unwrap().len(), VIEW_COUNT);

        let partial = SegmentationResponse {
            error: None,
            seg1: Some("a".into()),
            seg2: Some("b".into()),
            seg3: Some("c".into()),
            seg4: Some("d".into()),
            seg5: None,
        };
        assert!(matches!(
            partial.into_payloads(),
            Err(PipelineError::Malformed(_))
        ));
    }

    #[test]
    fn test_error_field_beats_payload() {
        let resp = MaterializeResponse {
            error: Some("no views".into()),
            orm_image_url: Some("ignored".into()),
        };
        assert!(matches!(
            resp.into_payload(),
            Err(PipelineError::Backend(_))
        ));
    }

    #[test]
    fn test_unpack_complete_archive() {
        let bytes = archive(&[
            ("mesh.obj", b"v 0 0 0".as_slice()),
            ("mesh.mtl", b"newmtl m".as_slice()),
            ("texture.png", b"\x89PNG".as_slice()),
        ]);
        let unpacked = unpack_mesh_archive(&bytes).unwrap();
        assert_eq!(unpacked.geometry, b"v 0 0 0");
        assert_eq!(unpacked.material, b"newmtl m");
        assert_eq!(unpacked.albedo, b"\x89PNG");
    }

    #[test]
    fn test_unpack_rejects_missing_part() {
        let bytes = archive(&[
            ("mesh.obj", b"v 0 0 0".as_slice()),
            ("texture.png", b"\x89PNG".as_slice()),
        ]);
        assert!(matches!(
            unpack_mesh_archive(&bytes),
            Err(PipelineError::Malformed(_))
        ));
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("http://localhost:8080", "/files/mesh.glb"),
            "http://localhost:8080/files/mesh.glb"
        );
        assert_eq!(
            resolve_url("http://localhost:8080/", "files/mesh.glb"),
            "http://localhost:8080/files/mesh.glb"
        );
        assert_eq!(
            resolve_url("http://localhost:8080", "http://cdn/mesh.glb"),
            "http://cdn/mesh.glb"
        );
    }
}
