use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{FrameError, RawFrame};

/// Routes one value of a [`RawFrame`] into one expression channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelMapping {
    /// Position of the value in the received frame.
    pub source: usize,
    /// Expression channel of the blend-shape model that receives it.
    pub channel: usize,
    /// The received value is divided by this before use.
    pub divisor: f32,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("mapping targets channel {channel} but the model has {expression_count} expressions")]
    ChannelOutOfRange { channel: usize, expression_count: usize },
    #[error("mapping for frame position {position} has an invalid divisor {divisor}")]
    InvalidDivisor { position: usize, divisor: f32 },
    #[error("mapping has no entries")]
    Empty,
}

/// Table turning the tracker's raw frame layout into blend-shape weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientMapping {
    pub channels: Vec<ChannelMapping>,
}

impl Default for CoefficientMapping {
    /// The layout sent by the face tracking controller: jaw, mouth and
    /// brow values scaled down from its 0..80 range.
    fn default() -> Self {
        const DIVISOR: f32 = 80.0;
        Self {
            channels: vec![
                ChannelMapping { source: 25, channel: 0, divisor: DIVISOR },
                ChannelMapping { source: 13, channel: 1, divisor: DIVISOR },
                ChannelMapping { source: 12, channel: 2, divisor: DIVISOR },
            ],
        }
    }
}

impl CoefficientMapping {
    /// Smallest frame length this table can read from.
    pub fn required_len(&self) -> usize {
        self.channels.iter()
            .map(|m| m.source + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn validate(&self, expression_count: usize) -> Result<(), MappingError> {
        if self.channels.is_empty() {
            return Err(MappingError::Empty);
        }

        for mapping in &self.channels {
            if mapping.channel >= expression_count {
                return Err(MappingError::ChannelOutOfRange {
                    channel: mapping.channel,
                    expression_count,
                });
            }
            if mapping.divisor == 0.0 || !mapping.divisor.is_finite() {
                return Err(MappingError::InvalidDivisor {
                    position: mapping.source,
                    divisor: mapping.divisor,
                });
            }
        }
        Ok(())
    }

    /// Builds the weight vector for a model with `expression_count` channels.
    /// Channels not named in the table stay at zero.
    pub fn extract(&self, raw: &RawFrame, expression_count: usize) -> Result<CoeffVector, FrameError> {
        let needed = self.required_len();
        if raw.len() < needed {
            return Err(FrameError::TooShort { needed, got: raw.len() });
        }

        let mut weights = vec![0.0; expression_count];
        for mapping in &self.channels {
            let value = raw.values()[mapping.source];
            if let Some(weight) = weights.get_mut(mapping.channel) {
                *weight = value / mapping.divisor;
            }
        }
        Ok(CoeffVector(weights))
    }
}

/// Per-expression blend weights for a single cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CoeffVector(pub Vec<f32>);

impl CoeffVector {
    pub fn zeros(expression_count: usize) -> Self {
        Self(vec![0.0; expression_count])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn weights(&self) -> &[f32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn controller_frame(jaw: f32, mouth: f32, brow: f32) -> RawFrame {
        let mut values = vec![0.0; 26];
        values[25] = jaw;
        values[13] = mouth;
        values[12] = brow;
        RawFrame::new(values)
    }

    #[test]
    fn default_table_reads_controller_layout() {
        let mapping = CoefficientMapping::default();
        assert_eq!(mapping.required_len(), 26);

        let coeffs = mapping.extract(&controller_frame(80.0, 40.0, -80.0), 5).unwrap();
        assert_eq!(coeffs.weights(), &[1.0, 0.5, -1.0, 0.0, 0.0]);
    }

    #[test]
    fn short_frame_is_rejected() {
        let err = CoefficientMapping::default()
            .extract(&RawFrame::new(vec![1.0; 10]), 3)
            .unwrap_err();
        assert_eq!(err, FrameError::TooShort { needed: 26, got: 10 });
    }

    #[test]
    fn validate_checks_channels_and_divisors() {
        let mapping = CoefficientMapping::default();
        assert!(mapping.validate(3).is_ok());
        assert_eq!(
            mapping.validate(2).unwrap_err(),
            MappingError::ChannelOutOfRange { channel: 2, expression_count: 2 }
        );

        let zero = CoefficientMapping {
            channels: vec![ChannelMapping { source: 0, channel: 0, divisor: 0.0 }],
        };
        assert!(matches!(zero.validate(1), Err(MappingError::InvalidDivisor { .. })));
        assert_eq!(
            CoefficientMapping { channels: vec![] }.validate(1).unwrap_err(),
            MappingError::Empty
        );
    }

    #[test]
    fn loads_from_json() {
        let json = r#"{"channels":[{"source":0,"channel":2,"divisor":2.0}]}"#;
        let mapping: CoefficientMapping = serde_json::from_str(json).unwrap();
        let coeffs = mapping.extract(&RawFrame::new(vec![3.0]), 3).unwrap();
        assert_eq!(coeffs.weights(), &[0.0, 0.0, 1.5]);
    }

    proptest! {
        #[test]
        fn frames_below_required_len_never_extract(len in 0usize..26) {
            let raw = RawFrame::new(vec![1.0; len]);
            prop_assert!(CoefficientMapping::default().extract(&raw, 3).is_err());
        }
    }
}
