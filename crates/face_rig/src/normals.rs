use glam::Vec3;

/// Area weighted vertex normals of a triangle list. Vertices without any
/// usable triangle get `+Z`.
pub fn vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        let (Some(pa), Some(pb), Some(pc)) = (positions.get(a), positions.get(b), positions.get(c)) else {
            continue;
        };

        // The cross product's length is twice the triangle area.
        let face = (*pb - *pa).cross(*pc - *pa);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }

    for normal in normals.iter_mut() {
        *normal = normal.try_normalize().unwrap_or(Vec3::Z);
    }
    normals
}
