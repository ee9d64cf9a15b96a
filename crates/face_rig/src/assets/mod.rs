//! Readers for the files a face rig is built from: the neutral mesh
//! (`.obj`), the expression basis (`.npy`) and the optional eye vertex list.

use std::path::Path;

use tracing::warn;

use crate::error::AssetError;

pub use obj::{parse_obj, MeshAsset};
pub use npy::{parse_npy, NpyArray};

mod npy;
mod obj;

fn read(path: &Path) -> Result<Vec<u8>, AssetError> {
    std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_owned(),
        source,
    })
}

pub fn load_mesh(path: &Path) -> Result<MeshAsset, AssetError> {
    let bytes = read(path)?;
    let text = std::str::from_utf8(&bytes)
        .map_err(|_| AssetError::Obj { line: 0, message: "file is not UTF-8".into() })?;
    parse_obj(text)
}

/// Expression displacement fields, one row of `vertices * 3` values per
/// expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionBasis {
    pub expressions: usize,
    pub vertices: usize,
    pub data: Vec<f32>,
}

impl ExpressionBasis {
    /// Accepts arrays shaped `(E, V, 3)` or already flattened `(E, V * 3)`.
    pub fn from_array(array: NpyArray) -> Result<Self, AssetError> {
        let (expressions, vertices) = match array.shape.as_slice() {
            [e, v, 3] => (*e, *v),
            [e, n] if n % 3 == 0 => (*e, n / 3),
            shape => {
                return Err(AssetError::Npy(format!("expected an (E, V, 3) basis, got {shape:?}")));
            }
        };
        Ok(Self {
            expressions,
            vertices,
            data: array.data,
        })
    }
}

pub fn load_basis(path: &Path) -> Result<ExpressionBasis, AssetError> {
    ExpressionBasis::from_array(parse_npy(&read(path)?)?)
}

pub fn parse_eye_indices(text: &str) -> Result<Vec<usize>, AssetError> {
    text.split_whitespace()
        .map(|token| {
            token.parse::<usize>().map_err(|_| AssetError::EyeIndex { token: token.to_owned() })
        })
        .collect()
}

pub fn load_eye_indices(path: &Path) -> Result<Vec<usize>, AssetError> {
    let bytes = read(path)?;
    parse_eye_indices(&String::from_utf8_lossy(&bytes))
}

/// Like [`load_eye_indices`], but a missing file only disables the eye
/// correction.
pub fn load_optional_eye_indices(path: &Path) -> Result<Option<Vec<usize>>, AssetError> {
    if !path.is_file() {
        warn!("no eye index file at {}, eyes are not corrected", path.display());
        return Ok(None);
    }
    load_eye_indices(path).map(Some)
}
