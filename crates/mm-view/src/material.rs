use bytemuck::{Pod, Zeroable};

/// Which color channel of a packed texture feeds a material input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureChannel {
    Red,
    Green,
    Blue,
    Alpha,
}

impl TextureChannel {
    /// Channel index as the shader sees it.
    pub fn index(&self) -> u32 {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
            Self::Alpha => 3,
        }
    }
}

/// Material configuration consumed by the viewer shader. Channel selection
/// is part of the configuration, not a shader patch, so a packed map whose
/// layout differs from the glTF convention is a parameter choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialSpec {
    pub metalness_channel: TextureChannel,
    pub roughness_channel: TextureChannel,
    pub metalness: f32,
    pub roughness: f32,
}

impl MaterialSpec {
    /// Albedo-lit preview without a packed map (textured-mesh viewer).
    pub fn albedo_only() -> Self {
        Self {
            metalness_channel: TextureChannel::Blue,
            roughness_channel: TextureChannel::Green,
            metalness: 0.0,
            roughness: 0.8,
        }
    }

    /// The materialiser's packed ORM layout: metalness lives in the red
    /// channel and roughness in the green, instead of the standard
    /// blue/red assignment.
    pub fn orm_packed() -> Self {
        Self {
            metalness_channel: TextureChannel::Red,
            roughness_channel: TextureChannel::Green,
            metalness: 1.0,
            roughness: 1.0,
        }
    }
}

/// Material UBO (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct MaterialUniform {
    metalness_channel: u32,
    roughness_channel: u32,
    use_orm: u32,
    _pad: u32,
    metalness: f32,
    roughness: f32,
    _pad2: [f32; 2],
}

impl MaterialUniform {
    pub fn new(spec: &MaterialSpec, use_orm: bool) -> Self {
        Self {
            metalness_channel: spec.metalness_channel.index(),
            roughness_channel: spec.roughness_channel.index(),
            use_orm: use_orm as u32,
            _pad: 0,
            metalness: spec.metalness,
            roughness: spec.roughness,
            _pad2: [0.0; 2],
        }
    }

    #[cfg(test)]
    pub fn channels(&self) -> (u32, u32, bool) {
        (
            self.metalness_channel,
            self.roughness_channel,
            self.use_orm == 1,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orm_remap_reads_red_and_green() {
        let spec = MaterialSpec::orm_packed();
        assert_eq!(spec.metalness_channel, TextureChannel::Red);
        assert_eq!(spec.roughness_channel, TextureChannel::Green);

        let uniform = MaterialUniform::new(&spec, true);
        assert_eq!(uniform.channels(), (0, 1, true));
    }

    #[test]
    fn test_albedo_only_disables_packed_map() {
        let uniform = MaterialUniform::new(&MaterialSpec::albedo_only(), false);
        let (_, _, use_orm) = uniform.channels();
        assert!(!use_orm);
    }

    #[test]
    fn test_uniform_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<MaterialUniform>() % 16, 0);
    }
}
