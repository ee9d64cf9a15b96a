use face_wire::CoeffVector;
use glam::Vec3;

use crate::assets::ExpressionBasis;
use crate::error::ModelError;

pub const DEFAULT_EYE_DEPTH_OFFSET: f32 = 0.01;

/// Eye vertices are pinned to the neutral shape, pushed back slightly so the
/// eyeballs stay behind the lids. The expression basis models them poorly.
#[derive(Debug, Clone, PartialEq)]
pub struct EyeCorrection {
    pub indices: Vec<usize>,
    pub depth_offset: f32,
}

impl EyeCorrection {
    pub fn new(indices: Vec<usize>) -> Self {
        Self {
            indices,
            depth_offset: DEFAULT_EYE_DEPTH_OFFSET,
        }
    }

    pub fn with_depth_offset(mut self, depth_offset: f32) -> Self {
        self.depth_offset = depth_offset;
        self
    }
}

/// Linear blend-shape face: `mean + weights . basis`.
#[derive(Debug, Clone)]
pub struct BlendShapeModel {
    mean_shape: Vec<Vec3>,
    basis: ExpressionBasis,
    eyes: Option<EyeCorrection>,
}

impl BlendShapeModel {
    pub fn new(
        mean_shape: Vec<Vec3>,
        basis: ExpressionBasis,
        eyes: Option<EyeCorrection>,
    ) -> Result<Self, ModelError> {
        let vertices = mean_shape.len();
        if vertices == 0 {
            return Err(ModelError::EmptyMeanShape);
        }
        if basis.vertices != vertices || basis.data.len() != basis.expressions * vertices * 3 {
            return Err(ModelError::BasisShape {
                expressions: basis.expressions,
                vertices,
                got: basis.data.len(),
            });
        }
        if let Some(eyes) = &eyes {
            if let Some(&index) = eyes.indices.iter().find(|i| **i >= vertices) {
                return Err(ModelError::EyeIndexOutOfRange { index, vertices });
            }
        }

        Ok(Self {
            mean_shape,
            basis,
            eyes,
        })
    }

    pub fn mean_shape(&self) -> &[Vec3] {
        &self.mean_shape
    }

    pub fn vertex_count(&self) -> usize {
        self.mean_shape.len()
    }

    pub fn expression_count(&self) -> usize {
        self.basis.expressions
    }

    pub fn eyes(&self) -> Option<&EyeCorrection> {
        self.eyes.as_ref()
    }

    /// Deforms the mean shape by `coeffs`, then applies the eye correction.
    ///
    /// `coeffs` must have one weight per expression.
    pub fn deform(&self, coeffs: &CoeffVector) -> Vec<Vec3> {
        debug_assert_eq!(coeffs.len(), self.expression_count());

        let row_len = self.vertex_count() * 3;
        let mut flat = vec![0.0f32; row_len];
        for (weight, row) in coeffs.weights().iter().zip(self.basis.data.chunks_exact(row_len)) {
            if *weight == 0.0 {
                continue;
            }
            for (acc, delta) in flat.iter_mut().zip(row) {
                *acc += weight * delta;
            }
        }

        let mut vertices = self.mean_shape.iter()
            .zip(flat.chunks_exact(3))
            .map(|(mean, delta)| *mean + Vec3::from_slice(delta))
            .collect::<Vec<_>>();

        if let Some(eyes) = &self.eyes {
            for &index in &eyes.indices {
                let mut eye = self.mean_shape[index];
                eye.z -= eyes.depth_offset;
                vertices[index] = eye;
            }
        }
        vertices
    }
}
