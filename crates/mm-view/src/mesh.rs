use std::io::{BufReader, Cursor};

use anyhow::{Context, Result, anyhow};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::{VertexBufferLayout, VertexStepMode};

/// Vertex: position + normal + texture coordinates.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
    };
}

/// Axis-aligned bounds used to frame the camera around a loaded mesh.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn max_dimension(&self) -> f32 {
        let size = self.max - self.min;
        size.x.max(size.y).max(size.z)
    }
}

/// CPU-side triangle mesh, ready for GPU upload.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty() && self.indices.len() % 3 == 0
    }

    pub fn bounds(&self) -> Bounds {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for vertex in &self.vertices {
            let p = Vec3::from(vertex.position);
            min = min.min(p);
            max = max.max(p);
        }
        Bounds { min, max }
    }
}

/// Parse an OBJ mesh (with its MTL companion) from in-memory bytes.
///
/// Material references inside the MTL are resolved so parsing succeeds, but
/// the texture the viewer binds comes from the pipeline output, not from
/// whatever path the MTL names.
pub fn from_obj_bytes(obj: &[u8], mtl: &[u8]) -> Result<MeshData> {
    let mut reader = BufReader::new(Cursor::new(obj));
    let (models, _materials) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_path| tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mtl))),
    )
    .context("Failed to parse OBJ geometry")?;

    let mut data = MeshData::default();
    for model in &models {
        let mesh = &model.mesh;
        let base = u32::try_from(data.vertices.len())
            .map_err(|_| anyhow!("Mesh exceeds u32 vertex capacity"))?;

        let vertex_count = mesh.positions.len() / 3;
        for i in 0..vertex_count {
            let position = [
                mesh.positions[i * 3],
                mesh.positions[i * 3 + 1],
                mesh.positions[i * 3 + 2],
            ];
            let normal = if mesh.normals.len() >= (i + 1) * 3 {
                [
                    mesh.normals[i * 3],
                    mesh.normals[i * 3 + 1],
                    mesh.normals[i * 3 + 2],
                ]
            } else {
                [0.0, 0.0, 0.0]
            };
            // OBJ uses a bottom-left UV origin; flip V for wgpu sampling.
            let uv = if mesh.texcoords.len() >= (i + 1) * 2 {
                [mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]]
            } else {
                [0.0, 0.0]
            };
            data.vertices.push(MeshVertex {
                position,
                normal,
                uv,
            });
        }
        data.indices.extend(mesh.indices.iter().map(|i| base + i));
    }

    if !data.is_valid() {
        return Err(anyhow!("OBJ contained no triangles"));
    }
    if data.vertices.iter().all(|v| v.normal == [0.0, 0.0, 0.0]) {
        compute_normals(&mut data);
    }
    log::info!(
        "Parsed OBJ mesh: {} vertices, {} triangles",
        data.vertices.len(),
        data.indices.len() / 3
    );
    Ok(data)
}

/// Parse a binary glTF mesh from in-memory bytes. All primitives of all
/// meshes are merged into one draw; embedded materials are ignored since the
/// viewer supplies its own textures.
pub fn from_glb_bytes(bytes: &[u8]) -> Result<MeshData> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).context("Failed to parse glTF mesh")?;

    let mut data = MeshData::default();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .context("glTF primitive has no positions")?
                .collect();
            let normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|iter| iter.collect())
                .unwrap_or_default();
            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|iter| iter.into_f32().collect())
                .unwrap_or_default();

            let base = u32::try_from(data.vertices.len())
                .map_err(|_| anyhow!("Mesh exceeds u32 vertex capacity"))?;
            for (i, position) in positions.iter().enumerate() {
                data.vertices.push(MeshVertex {
                    position: *position,
                    normal: normals.get(i).copied().unwrap_or([0.0, 0.0, 0.0]),
                    uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
                });
            }
            match reader.read_indices() {
                Some(indices) => data
                    .indices
                    .extend(indices.into_u32().map(|i| base + i)),
                None => data
                    .indices
                    .extend((0..positions.len() as u32).map(|i| base + i)),
            }
        }
    }

    if !data.is_valid() {
        return Err(anyhow!("glTF contained no triangles"));
    }
    if data.vertices.iter().all(|v| v.normal == [0.0, 0.0, 0.0]) {
        compute_normals(&mut data);
    }
    log::info!(
        "Parsed glTF mesh: {} vertices, {} triangles",
        data.vertices.len(),
        data.indices.len() / 3
    );
    Ok(data)
}

/// Area-weighted vertex normals for meshes that ship without them.
fn compute_normals(data: &mut MeshData) {
    let mut accumulated = vec![Vec3::ZERO; data.vertices.len()];
    for triangle in data.indices.chunks_exact(3) {
        let [a, b, c] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        let pa = Vec3::from(data.vertices[a].position);
        let pb = Vec3::from(data.vertices[b].position);
        let pc = Vec3::from(data.vertices[c].position);
        let face = (pb - pa).cross(pc - pa);
        accumulated[a] += face;
        accumulated[b] += face;
        accumulated[c] += face;
    }
    for (vertex, normal) in data.vertices.iter_mut().zip(accumulated) {
        vertex.normal = normal.normalize_or_zero().to_array();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE_OBJ: &str = "\
v 0.0 0.0 0.0
v 2.0 0.0 0.0
v 0.0 2.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
f 1/1 2/2 3/3
";

    const TRIANGLE_MTL: &str = "\
newmtl mesh
map_Kd some/other/texture.png
";

    #[test]
    fn test_parse_obj_triangle() {
        let mesh = from_obj_bytes(TRIANGLE_OBJ.as_bytes(), TRIANGLE_MTL.as_bytes()).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices.len(), 3);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_obj_uv_v_is_flipped() {
        let mesh = from_obj_bytes(TRIANGLE_OBJ.as_bytes(), TRIANGLE_MTL.as_bytes()).unwrap();
        let uvs: Vec<[f32; 2]> = mesh.vertices.iter().map(|v| v.uv).collect();
        assert!(uvs.contains(&[0.0, 1.0]));
        assert!(uvs.contains(&[1.0, 1.0]));
        assert!(uvs.contains(&[0.0, 0.0]));
    }

    #[test]
    fn test_missing_normals_are_computed() {
        let mesh = from_obj_bytes(TRIANGLE_OBJ.as_bytes(), TRIANGLE_MTL.as_bytes()).unwrap();
        for vertex in &mesh.vertices {
            let n = Vec3::from(vertex.normal);
            assert!((n.length() - 1.0).abs() < 1e-4);
            // CCW triangle in the XY plane faces +Z.
            assert!(n.z > 0.99);
        }
    }

    #[test]
    fn test_bounds() {
        let mesh = from_obj_bytes(TRIANGLE_OBJ.as_bytes(), TRIANGLE_MTL.as_bytes()).unwrap();
        let bounds = mesh.bounds();
        assert_eq!(bounds.center(), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(bounds.max_dimension(), 2.0);
    }

    #[test]
    fn test_garbage_glb_is_rejected() {
        assert!(from_glb_bytes(&[0, 1, 2, 3]).is_err());
    }
}
