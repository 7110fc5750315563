use std::io::Write;

use glam::{Vec2, Vec3};
use serde::Serialize;

use crate::config::{MeshSettings, NUM_SUPPORTED_LODS};
use crate::error::{PreviewError, Result};
use crate::height_map::HeightMap;

/// Renderable triangle mesh. Y is up, the tile is centred on the origin.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Give every triangle its own vertices so it shades with its face normal.
    pub fn flat_shade(&mut self) {
        let mut positions = Vec::with_capacity(self.indices.len());
        let mut normals = Vec::with_capacity(self.indices.len());
        let mut uvs = Vec::with_capacity(self.indices.len());
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let face = (self.positions[b] - self.positions[a])
                .cross(self.positions[c] - self.positions[a])
                .normalize_or_zero();
            for i in [a, b, c] {
                positions.push(self.positions[i]);
                normals.push(face);
                uvs.push(self.uvs[i]);
            }
        }
        self.indices = (0..positions.len() as u32).collect();
        self.positions = positions;
        self.normals = normals;
        self.uvs = uvs;
    }

    /// Wavefront OBJ with positions, uvs and normals.
    pub fn write_obj<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "# terrain preview mesh")?;
        for p in &self.positions {
            writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
        }
        for uv in &self.uvs {
            writeln!(out, "vt {} {}", uv.x, uv.y)?;
        }
        for n in &self.normals {
            writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
        }
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] + 1, tri[1] + 1, tri[2] + 1];
            writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
        }
        Ok(())
    }
}

/// Vertex step for a level of detail: every vertex at LOD 0, then every 2nd, 4th, 6th, 8th.
pub fn lod_increment(lod: usize) -> usize {
    if lod == 0 { 1 } else { lod * 2 }
}

/// Build the terrain mesh for a height map at `lod`.
///
/// The height map may be wider than `num_verts_per_line` (the erosion border);
/// the centred window is used. The outermost ring of that window only feeds
/// normals so that adjacent tiles would shade seamlessly.
pub fn generate_terrain_mesh(height_map: &HeightMap, settings: &MeshSettings, lod: usize) -> Result<MeshData> {
    if lod >= NUM_SUPPORTED_LODS {
        return Err(PreviewError::InvalidLod { lod, max: NUM_SUPPORTED_LODS - 1 });
    }
    let map = &height_map.values;
    let verts_per_line = settings.num_verts_per_line();
    if map.w < verts_per_line || !map.is_square() {
        return Err(PreviewError::SizeMismatch { len: map.data.len(), size: verts_per_line });
    }
    let border = (map.w - verts_per_line) / 2;
    let height = |x: usize, y: usize| map.get(border + x, border + y);

    let chunk = verts_per_line - 3;
    let inc = lod_increment(lod);
    let line = chunk / inc + 1;
    let world = settings.mesh_world_size();
    let spacing = settings.mesh_scale;

    let mut mesh = MeshData {
        positions: Vec::with_capacity(line * line),
        normals: Vec::with_capacity(line * line),
        uvs: Vec::with_capacity(line * line),
        indices: Vec::with_capacity((line - 1) * (line - 1) * 6),
    };

    for k in 0..line {
        for j in 0..line {
            // Main vertices start one in from the normal-only border.
            let sx = 1 + j * inc;
            let sy = 1 + k * inc;
            let percent = Vec2::new((j * inc) as f32 / chunk as f32, (k * inc) as f32 / chunk as f32);
            let h = height(sx, sy);
            mesh.positions.push(Vec3::new(
                (percent.x - 0.5) * world,
                h,
                (0.5 - percent.y) * world,
            ));
            mesh.uvs.push(percent);

            // Rows grow towards -z, so the row above is the +z neighbour.
            let dh_dx = (height(sx + 1, sy) - height(sx - 1, sy)) / (2.0 * spacing);
            let dh_dz = (height(sx, sy - 1) - height(sx, sy + 1)) / (2.0 * spacing);
            mesh.normals.push(Vec3::new(-dh_dx, 1.0, -dh_dz).normalize());
        }
    }

    for k in 0..line - 1 {
        for j in 0..line - 1 {
            let a = (k * line + j) as u32;
            let b = a + 1;
            let c = a + line as u32;
            let d = c + 1;
            mesh.indices.extend_from_slice(&[a, b, c, b, d, c]);
        }
    }

    if settings.use_flat_shading {
        mesh.flat_shade();
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    fn settings() -> MeshSettings {
        MeshSettings { chunk_size_index: 0, ..MeshSettings::default() }
    }

    fn flat_map(size: usize, h: f32) -> HeightMap {
        HeightMap::new(Grid::from_vec(vec![h; size * size], size, size).unwrap(), h, h)
    }

    #[test]
    fn vertex_and_triangle_counts_per_lod() {
        let s = settings();
        let map = flat_map(s.num_verts_per_line(), 1.0);
        for lod in 0..NUM_SUPPORTED_LODS {
            let mesh = generate_terrain_mesh(&map, &s, lod).unwrap();
            let line = 48 / lod_increment(lod) + 1;
            assert_eq!(mesh.vertex_count(), line * line, "lod {lod}");
            assert_eq!(mesh.triangle_count(), (line - 1) * (line - 1) * 2, "lod {lod}");
        }
    }

    #[test]
    fn flat_terrain_points_up_and_spans_world_size() {
        let s = settings();
        let map = flat_map(s.num_verts_per_line(), 2.0);
        let mesh = generate_terrain_mesh(&map, &s, 0).unwrap();
        assert!(mesh.normals.iter().all(|n| (*n - Vec3::Y).length() < 1e-5));
        let xs: Vec<f32> = mesh.positions.iter().map(|p| p.x).collect();
        let span = xs.iter().cloned().fold(f32::MIN, f32::max) - xs.iter().cloned().fold(f32::MAX, f32::min);
        assert!((span - s.mesh_world_size()).abs() < 1e-3);
        assert!(mesh.positions.iter().all(|p| p.y == 2.0));
    }

    #[test]
    fn triangles_face_up() {
        let s = settings();
        let mesh = generate_terrain_mesh(&flat_map(s.num_verts_per_line(), 0.0), &s, 1).unwrap();
        for tri in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let n = (mesh.positions[b] - mesh.positions[a]).cross(mesh.positions[c] - mesh.positions[a]);
            assert!(n.y > 0.0);
        }
    }

    #[test]
    fn erosion_border_is_cropped() {
        let s = settings();
        let nv = s.num_verts_per_line();
        let size = nv + 6;
        // Border cells are tall, the centred window is flat.
        let mut grid = Grid::from_vec(vec![100.0; size * size], size, size).unwrap();
        for y in 3..3 + nv {
            for x in 3..3 + nv {
                grid.set(x, y, 1.0);
            }
        }
        let mesh = generate_terrain_mesh(&HeightMap::new(grid, 1.0, 100.0), &s, 0).unwrap();
        assert!(mesh.positions.iter().all(|p| p.y == 1.0));
    }

    #[test]
    fn rejects_bad_lod_and_small_map() {
        let s = settings();
        let map = flat_map(s.num_verts_per_line(), 0.0);
        assert!(matches!(
            generate_terrain_mesh(&map, &s, NUM_SUPPORTED_LODS),
            Err(PreviewError::InvalidLod { .. })
        ));
        assert!(matches!(
            generate_terrain_mesh(&flat_map(10, 0.0), &s, 0),
            Err(PreviewError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn flat_shading_splits_vertices() {
        let s = MeshSettings { use_flat_shading: true, flatshaded_chunk_size_index: 0, ..MeshSettings::default() };
        let mesh = generate_terrain_mesh(&flat_map(s.num_verts_per_line(), 0.0), &s, 0).unwrap();
        assert_eq!(mesh.vertex_count(), mesh.indices.len());
        assert_eq!(mesh.triangle_count(), 48 * 48 * 2);
    }

    #[test]
    fn obj_export_lists_every_face() {
        let s = settings();
        let mesh = generate_terrain_mesh(&flat_map(s.num_verts_per_line(), 0.0), &s, 4).unwrap();
        let mut buf = Vec::new();
        mesh.write_obj(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), mesh.triangle_count());
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), mesh.vertex_count());
    }
}
