use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use bevy::math::Vec3;
use clap::{Parser, ValueEnum};
use tokio::net::TcpStream;
use tracing::{debug, info};

use face_rig::assets;
use face_rig::{
    AnimationLoop, BlendShapeModel, CoefficientFeed, EyeCorrection, FaceHandoff, FeedConfig, LatestFrame, MeshAsset,
    Renderer, SharedScene,
};
use face_wire::{CoefficientMapping, Framing};

use crate::viewer::ViewerSettings;

mod viewer;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FramingMode {
    /// Newline terminated frames.
    Line,
    /// One frame per network read, for controllers that send no terminator.
    Chunk,
}

impl From<FramingMode> for Framing {
    fn from(mode: FramingMode) -> Self {
        match mode {
            FramingMode::Line => Framing::default(),
            FramingMode::Chunk => Framing::Chunked,
        }
    }
}

#[derive(Parser)]
struct Options {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, short = 'p', default_value = "985")]
    pub port: u16,
    /// Neutral face mesh (.obj).
    #[arg(long, short = 'm')]
    pub mesh: PathBuf,
    /// Expression basis (.npy) shaped (expressions, vertices, 3).
    #[arg(long, short = 'b')]
    pub basis: PathBuf,
    #[arg(long, short = 't')]
    pub texture: Option<PathBuf>,
    /// Whitespace separated indices of the eye vertices.
    #[arg(long)]
    pub eye_index: Option<PathBuf>,
    #[arg(long, default_value = "0.01")]
    pub eye_delta: f32,
    #[arg(long, value_enum, default_value = "line")]
    pub framing: FramingMode,
    #[arg(long, default_value = "1024")]
    pub read_chunk: usize,
    /// 0 disables the stale feed warning.
    #[arg(long, default_value = "5000")]
    pub read_timeout_ms: u64,
    /// JSON file with the frame position to expression channel mapping.
    #[arg(long)]
    pub mapping: Option<PathBuf>,
    #[arg(long)]
    pub max_rate: Option<u32>,
}

fn load_model(options: &Options) -> anyhow::Result<(MeshAsset, BlendShapeModel)> {
    let mesh = assets::load_mesh(&options.mesh)
        .with_context(|| format!("got wrong base model {}", options.mesh.display()))?;
    let basis = assets::load_basis(&options.basis)
        .with_context(|| format!("failed to load expression basis {}", options.basis.display()))?;
    let eyes = match &options.eye_index {
        Some(path) => assets::load_optional_eye_indices(path)
            .with_context(|| format!("failed to load eye indices {}", path.display()))?
            .map(|indices| EyeCorrection::new(indices).with_depth_offset(options.eye_delta)),
        None => None,
    };

    let model = BlendShapeModel::new(mesh.positions.clone(), basis, eyes)
        .context("expression basis does not fit the base model")?;
    info!(
        "loaded face with {} vertices and {} expressions",
        model.vertex_count(),
        model.expression_count(),
    );
    Ok((mesh, model))
}

fn load_mapping(path: Option<&Path>) -> anyhow::Result<CoefficientMapping> {
    let Some(path) = path else {
        return Ok(CoefficientMapping::default());
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read mapping {}", path.display()))?;
    let mapping = serde_json::from_slice(&bytes)
        .with_context(|| format!("invalid mapping {}", path.display()))?;
    Ok(mapping)
}

fn connect(runtime: &tokio::runtime::Runtime, host: &str, port: u16) -> anyhow::Result<TcpStream> {
    runtime.block_on(face_rig::connect(host, port))
        .with_context(|| format!("can not connect to server {host}:{port}"))
}

/// Frames the camera on the neutral face.
fn viewer_settings(mesh: &MeshAsset, texture: Option<PathBuf>) -> ViewerSettings {
    let (min, max) = mesh.positions.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), p| (min.min(*p), max.max(*p)),
    );
    let focus = (min + max) * 0.5;
    let radius = ((max - min).length() * 0.5).max(0.1);
    ViewerSettings {
        texture,
        focus,
        distance: radius * 2.5,
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let options = Options::parse();

    let (mesh, model) = load_model(&options)?;
    let mapping = load_mapping(options.mapping.as_deref())?;
    mapping.validate(model.expression_count())
        .context("coefficient mapping does not fit the expression basis")?;
    let texture = options.texture.as_deref()
        .map(|path| std::fs::canonicalize(path)
            .with_context(|| format!("failed to find texture {}", path.display())))
        .transpose()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let stream = connect(&runtime, &options.host, options.port)?;

    let config = FeedConfig {
        read_chunk: options.read_chunk,
        read_timeout: (options.read_timeout_ms > 0).then(|| Duration::from_millis(options.read_timeout_ms)),
        framing: options.framing.into(),
        ..FeedConfig::default()
    };
    let frames = LatestFrame::new();
    let peer = format!("{}:{}", options.host, options.port);
    let feed = CoefficientFeed::new(stream, peer, config, frames.clone())
        .spawn(runtime.handle());

    let renderer = Arc::new(SharedScene::with_default_lights());
    let min_cycle = options.max_rate
        .filter(|rate| *rate > 0)
        .map(|rate| Duration::from_secs_f64(1.0 / rate as f64));
    let animation = AnimationLoop::new(
        Arc::new(model),
        mapping,
        frames,
        FaceHandoff::new(&mesh),
        renderer.clone(),
    )
        .with_min_cycle(min_cycle);
    let animation = std::thread::Builder::new()
        .name("animation".into())
        .spawn(move || animation.run())?;

    let exit = viewer::run(renderer.clone(), viewer_settings(&mesh, texture));
    debug!("viewer exited: {:?}", exit);
    renderer.close();

    animation.join().map_err(|_| anyhow!("animation thread panicked"))?;
    let feed_exit = runtime.block_on(feed.shutdown());
    debug!("feed exited: {:?}", feed_exit);
    info!("client closed");
    Ok(())
}
