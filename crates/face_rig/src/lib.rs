pub use face_wire;

pub use animator::{AnimationLoop, LoopSummary};
pub use assets::{ExpressionBasis, MeshAsset};
pub use error::{AssetError, FeedError, ModelError};
pub use feed::{connect, CoefficientFeed, FeedConfig, FeedExit, FeedHandle, FrameResult};
pub use handoff::FaceHandoff;
pub use latest::LatestFrame;
pub use model::{BlendShapeModel, EyeCorrection, DEFAULT_EYE_DEPTH_OFFSET};
pub use scene::{default_lights, Light, MeshNode, NodeId, Renderer, Scene, SharedScene};

pub mod assets;
mod animator;
mod error;
mod feed;
mod handoff;
mod latest;
mod model;
mod normals;
mod scene;
