use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid OBJ on line {line}: {message}")]
    Obj { line: usize, message: String },
    #[error("invalid npy array: {0}")]
    Npy(String),
    #[error("invalid eye index {token:?}")]
    EyeIndex { token: String },
}

#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("mean shape has no vertices")]
    EmptyMeanShape,
    #[error("expression basis has {got} values, expected {expressions} x {vertices} x 3")]
    BasisShape { expressions: usize, vertices: usize, got: usize },
    #[error("eye index {index} is out of range for {vertices} vertices")]
    EyeIndexOutOfRange { index: usize, vertices: usize },
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("can not connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
}
