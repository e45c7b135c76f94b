use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Sentinel vertex count meaning "no cap".
pub const UNCAPPED_VERTICES: i32 = -1;

/// Remesh strategy applied by the mesh-generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemeshOption {
    None,
    Triangle,
    Quad,
}

impl RemeshOption {
    /// Identifier sent over the wire.
    pub fn id(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Triangle => "triangle",
            Self::Quad => "quad",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::None => "None",
            Self::Triangle => "Triangle",
            Self::Quad => "Quad",
        }
    }

    pub fn all() -> [RemeshOption; 3] {
        [Self::None, Self::Triangle, Self::Quad]
    }
}

/// Tunable generation controls, read as a snapshot when mesh generation is
/// invoked. The slider ranges below are what the backend accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineParameters {
    pub foreground_ratio: f32,
    pub remesh: RemeshOption,
    pub vertex_count: i32,
    pub texture_size: u32,
}

impl Default for PipelineParameters {
    fn default() -> Self {
        Self {
            foreground_ratio: 0.85,
            remesh: RemeshOption::None,
            vertex_count: UNCAPPED_VERTICES,
            texture_size: 1024,
        }
    }
}

impl PipelineParameters {
    pub const FOREGROUND_RATIO_RANGE: std::ops::RangeInclusive<f32> = 0.5..=1.0;
    pub const VERTEX_COUNT_RANGE: std::ops::RangeInclusive<i32> = UNCAPPED_VERTICES..=19999;
    pub const TEXTURE_SIZE_RANGE: std::ops::RangeInclusive<u32> = 512..=2048;

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !Self::FOREGROUND_RATIO_RANGE.contains(&self.foreground_ratio) {
            return Err(PipelineError::precondition(format!(
                "foreground ratio {} outside [0.5, 1.0]",
                self.foreground_ratio
            )));
        }
        if self.vertex_count != UNCAPPED_VERTICES && !(0..=19999).contains(&self.vertex_count) {
            return Err(PipelineError::precondition(format!(
                "vertex count {} outside -1..=19999",
                self.vertex_count
            )));
        }
        if !Self::TEXTURE_SIZE_RANGE.contains(&self.texture_size) {
            return Err(PipelineError::precondition(format!(
                "texture size {} outside [512, 2048]",
                self.texture_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = PipelineParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.vertex_count, UNCAPPED_VERTICES);
    }

    #[test]
    fn test_uncapped_sentinel_accepted() {
        let params = PipelineParameters {
            vertex_count: -1,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let ratio = PipelineParameters {
            foreground_ratio: 0.4,
            ..Default::default()
        };
        assert!(matches!(
            ratio.validate(),
            Err(PipelineError::Precondition(_))
        ));

        let vertices = PipelineParameters {
            vertex_count: -2,
            ..Default::default()
        };
        assert!(vertices.validate().is_err());

        let texture = PipelineParameters {
            texture_size: 4096,
            ..Default::default()
        };
        assert!(texture.validate().is_err());
    }

    #[test]
    fn test_remesh_wire_ids() {
        assert_eq!(RemeshOption::None.id(), "none");
        assert_eq!(RemeshOption::Quad.id(), "quad");
        assert_eq!(RemeshOption::all().len(), 3);
    }
}
