use std::sync::Arc;
use std::time::{Duration, Instant};

use face_wire::{CoeffVector, CoefficientMapping, FrameError};
use glam::Vec3;
use tracing::info;

use crate::feed::FrameResult;
use crate::handoff::FaceHandoff;
use crate::latest::LatestFrame;
use crate::model::BlendShapeModel;
use crate::scene::{NodeId, Renderer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    /// Cycles that showed the neutral face because no usable frame was there.
    pub fallback_cycles: u64,
    /// Distinct received frames that could not be turned into weights.
    pub malformed_frames: u64,
}

/// Drives the face: latest frame in, deformed mesh out to the renderer.
pub struct AnimationLoop<R: ?Sized> {
    model: Arc<BlendShapeModel>,
    mapping: CoefficientMapping,
    frames: LatestFrame<FrameResult>,
    handoff: FaceHandoff,
    renderer: Arc<R>,
    min_cycle: Option<Duration>,
    last_malformed: u64,
    summary: LoopSummary,
}

impl<R: Renderer + ?Sized> AnimationLoop<R> {
    pub fn new(
        model: Arc<BlendShapeModel>,
        mapping: CoefficientMapping,
        frames: LatestFrame<FrameResult>,
        handoff: FaceHandoff,
        renderer: Arc<R>,
    ) -> Self {
        Self {
            model,
            mapping,
            frames,
            handoff,
            renderer,
            min_cycle: None,
            last_malformed: 0,
            summary: LoopSummary::default(),
        }
    }

    /// Caps the cycle rate. Without it the loop runs as fast as the render
    /// lock allows.
    pub fn with_min_cycle(mut self, min_cycle: Option<Duration>) -> Self {
        self.min_cycle = min_cycle;
        self
    }

    pub fn summary(&self) -> LoopSummary {
        self.summary
    }

    fn latest_coefficients(&mut self) -> Option<CoeffVector> {
        let (generation, frame) = self.frames.snapshot()?;
        let extracted: Result<CoeffVector, FrameError> = match &*frame {
            Ok(raw) => self.mapping.extract(raw, self.model.expression_count()),
            Err(err) => Err(err.clone()),
        };

        match extracted {
            Ok(coeffs) => Some(coeffs),
            Err(_) => {
                if generation != self.last_malformed {
                    self.last_malformed = generation;
                    self.summary.malformed_frames += 1;
                }
                None
            }
        }
    }

    /// Vertices for the newest frame. Falls back to the mean shape when
    /// there is no frame yet or it can not be used.
    pub fn current_vertices(&mut self) -> Vec<Vec3> {
        match self.latest_coefficients() {
            Some(coeffs) => self.model.deform(&coeffs),
            None => {
                self.summary.fallback_cycles += 1;
                self.model.mean_shape().to_vec()
            }
        }
    }

    /// One cycle: read, deform, hand over.
    pub fn step(&mut self) -> NodeId {
        let vertices = self.current_vertices();
        self.summary.cycles += 1;
        self.handoff.submit_vertices(&*self.renderer, vertices)
    }

    /// Cycles until the renderer goes inactive.
    pub fn run(mut self) -> LoopSummary {
        while self.renderer.is_active() {
            let started = Instant::now();
            self.step();

            if let Some(remaining) = self.min_cycle.and_then(|min| min.checked_sub(started.elapsed())) {
                std::thread::sleep(remaining);
            }
        }

        let summary = self.summary;
        info!(
            "animation stopped after {} cycles ({} on the neutral face, {} malformed frames)",
            summary.cycles, summary.fallback_cycles, summary.malformed_frames,
        );
        summary
    }
}
