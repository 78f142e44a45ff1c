use glam::Vec3;

use super::material::MaterialEntry;
use super::vertex::Vertex;
use crate::scene::model::MeshData;

/// Unit quad in the XZ plane facing +Y; scaled up by the ground plane.
pub fn ground_quad() -> (Vec<Vertex>, Vec<u32>) {
    let up = [0.0, 1.0, 0.0];
    let vertices = vec![
        Vertex::new([-1.0, 0.0, -1.0], up, [0.0, 0.0]),
        Vertex::new([1.0, 0.0, -1.0], up, [1.0, 0.0]),
        Vertex::new([1.0, 0.0, 1.0], up, [1.0, 1.0]),
        Vertex::new([-1.0, 0.0, 1.0], up, [0.0, 1.0]),
    ];
    let indices = vec![0, 3, 2, 2, 1, 0];
    (vertices, indices)
}

const CUBE_FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
    // normal, u axis, v axis
    ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
];

/// Cube of edge `size` centred at the origin, two triangles per face,
/// counter-clockwise when seen from outside.
pub fn cube(size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let half = size * 0.5;
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u_axis, v_axis) in CUBE_FACES {
        let (n, u, v) = (Vec3::from(normal), Vec3::from(u_axis), Vec3::from(v_axis));
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = (n + u * su + v * sv) * half;
            let uv = [(su + 1.0) * 0.5, 1.0 - (sv + 1.0) * 0.5];
            vertices.push(Vertex::new(position.to_array(), normal, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    (vertices, indices)
}

/// RGBA8 checkerboard, `cells` squares per side.
pub fn checker_pixels(size: u32, cells: u32) -> Vec<u8> {
    let cell = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let light = ((x / cell) + (y / cell)) % 2 == 0;
            let value = if light { 230 } else { 60 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    pixels
}

/// Cube with three materials laid out in face order so the lit pass needs
/// several runs. `textured` replaces the third material's colour with a
/// diffuse texture.
pub fn demo_mesh(textured: Option<super::device::TextureId>) -> MeshData {
    let (vertices, indices) = cube(1.0);
    let face_materials = vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 0, 0];
    let third = match textured {
        Some(texture) => MaterialEntry::textured(texture),
        None => MaterialEntry::new(Vec3::new(0.25, 0.55, 0.85)),
    };
    let materials = vec![
        MaterialEntry::new(Vec3::new(0.85, 0.3, 0.25)).with_specular(Vec3::splat(0.6), 32.0),
        // No diffuse colour: renders white.
        MaterialEntry::new(Vec3::ZERO).with_specular(Vec3::splat(0.2), 8.0),
        third.with_specular(Vec3::splat(0.9), 64.0),
    ];
    MeshData {
        vertices,
        indices,
        face_materials,
        materials,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_faces_wind_outward() {
        let (vertices, indices) = cube(2.0);
        for tri in indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| vertices[tri[i] as usize].position_vec());
            let face_normal = (b - a).cross(c - a).normalize();
            let normal = Vec3::from(vertices[tri[0] as usize].normal);
            assert!(face_normal.abs_diff_eq(normal, 1e-5), "{face_normal} vs {normal}");
        }
    }

    #[test]
    fn demo_mesh_is_consistent() {
        let mesh = demo_mesh(None);
        assert_eq!(mesh.triangle_count(), mesh.face_materials.len());
        assert!(mesh.face_materials.iter().all(|&id| (id as usize) < mesh.materials.len()));
        let lowest = mesh.vertices.iter().map(|v| v.position[1]).fold(f32::MAX, f32::min);
        assert_eq!(lowest, -0.5);
    }

    #[test]
    fn checker_has_rgba_per_pixel() {
        assert_eq!(checker_pixels(8, 2).len(), 8 * 8 * 4);
    }
}
