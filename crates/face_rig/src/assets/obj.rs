use glam::{Vec2, Vec3};

use crate::error::AssetError;

/// Triangle mesh read from a Wavefront OBJ file.
#[derive(Debug, Clone, Default)]
pub struct MeshAsset {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Per-vertex texture coordinates, if the file had any.
    pub uvs: Option<Vec<Vec2>>,
    /// Per-vertex normals, if the file had any.
    pub normals: Option<Vec<Vec3>>,
}

impl MeshAsset {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

#[derive(Clone, Copy)]
struct Corner {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

fn obj_error(line: usize, message: impl Into<String>) -> AssetError {
    AssetError::Obj { line, message: message.into() }
}

fn read_float<'a>(line: usize, iter: &mut impl Iterator<Item=&'a str>) -> Result<f32, AssetError> {
    let token = iter.next().ok_or_else(|| obj_error(line, "expected float"))?;
    token.parse::<f32>().map_err(|_| obj_error(line, format!("invalid float {token:?}")))
}

/// OBJ indices are 1-based, negative values count back from the end.
fn resolve_index(line: usize, token: &str, count: usize) -> Result<usize, AssetError> {
    let raw = token.parse::<i64>()
        .map_err(|_| obj_error(line, format!("invalid index {token:?}")))?;
    let index = match raw {
        0 => None,
        i if i > 0 => Some(i as usize - 1),
        i => count.checked_sub(i.unsigned_abs() as usize),
    };
    match index {
        Some(index) if index < count => Ok(index),
        _ => Err(obj_error(line, format!("index {raw} out of range"))),
    }
}

fn read_corner(line: usize, token: &str, counts: (usize, usize, usize)) -> Result<Corner, AssetError> {
    let mut parts = token.split('/');
    let position = resolve_index(line, parts.next().unwrap_or_default(), counts.0)?;
    let uv = match parts.next() {
        Some(x) if !x.is_empty() => Some(resolve_index(line, x, counts.1)?),
        _ => None,
    };
    let normal = match parts.next() {
        Some(x) if !x.is_empty() => Some(resolve_index(line, x, counts.2)?),
        _ => None,
    };
    Ok(Corner { position, uv, normal })
}

pub fn parse_obj(text: &str) -> Result<MeshAsset, AssetError> {
    let mut positions = Vec::new();
    let mut raw_uvs = Vec::new();
    let mut raw_normals = Vec::new();
    let mut corners = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let number = number + 1;
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };

        match command {
            "v" => {
                let x = read_float(number, &mut parts)?;
                let y = read_float(number, &mut parts)?;
                let z = read_float(number, &mut parts)?;
                positions.push(Vec3::new(x, y, z));
            }
            "vt" => {
                let u = read_float(number, &mut parts)?;
                let v = read_float(number, &mut parts)?;
                raw_uvs.push(Vec2::new(u, v));
            }
            "vn" => {
                let x = read_float(number, &mut parts)?;
                let y = read_float(number, &mut parts)?;
                let z = read_float(number, &mut parts)?;
                raw_normals.push(Vec3::new(x, y, z));
            }
            "f" => {
                let counts = (positions.len(), raw_uvs.len(), raw_normals.len());
                let face = parts
                    .map(|token| read_corner(number, token, counts))
                    .collect::<Result<Vec<_>, _>>()?;
                if face.len() < 3 {
                    return Err(obj_error(number, "face needs at least three corners"));
                }

                // Fan out polygons into triangles.
                for i in 1..face.len() - 1 {
                    corners.extend([face[0], face[i], face[i + 1]]);
                }
            }
            _ => {}
        }
    }

    // Attributes are stored per vertex, the last corner referencing a vertex wins.
    let mut uvs = (!raw_uvs.is_empty()).then(|| vec![Vec2::ZERO; positions.len()]);
    let mut normals = (!raw_normals.is_empty()).then(|| vec![Vec3::Z; positions.len()]);
    let mut indices = Vec::with_capacity(corners.len());
    for corner in corners {
        if let (Some(uvs), Some(uv)) = (uvs.as_mut(), corner.uv) {
            uvs[corner.position] = raw_uvs[uv];
        }
        if let (Some(normals), Some(normal)) = (normals.as_mut(), corner.normal) {
            normals[corner.position] = raw_normals[normal];
        }
        indices.push(corner.position as u32);
    }

    Ok(MeshAsset {
        positions,
        indices,
        uvs,
        normals,
    })
}
