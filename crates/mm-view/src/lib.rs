//! Preview layer: orbit camera, mesh/texture decode, material configuration
//! and the offscreen wgpu surface both viewers render through.

pub mod camera;
pub mod material;
pub mod mesh;
pub mod surface;
pub mod texture;

pub use camera::OrbitCamera;
pub use material::{MaterialSpec, TextureChannel};
pub use mesh::MeshData;
pub use surface::ViewerSurface;
pub use texture::TextureData;
