use thiserror::Error;

pub use decoder::{FrameDecoder, Framing, DEFAULT_MAX_FRAME_LEN};
pub use mapping::{ChannelMapping, CoeffVector, CoefficientMapping, MappingError};

mod decoder;
mod mapping;

/// Separator between coefficient values inside a frame.
pub const VALUE_SEPARATOR: char = ',';

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("frame is not valid UTF-8")]
    Utf8,
    #[error("frame is empty")]
    Empty,
    #[error("invalid coefficient {token:?} at position {index}")]
    InvalidToken { index: usize, token: String },
    #[error("frame has {got} coefficients, at least {needed} are required")]
    TooShort { needed: usize, got: usize },
    #[error("frame exceeds {limit} bytes without a delimiter")]
    Oversized { limit: usize },
}

/// The most recently received coefficient frame, exactly as sent by the peer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawFrame {
    values: Vec<f32>,
}

impl RawFrame {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    /// Parses a comma separated list of floats, e.g. `"0.1, 2,-3e2"`.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FrameError::Empty);
        }

        let values = text.split(VALUE_SEPARATOR)
            .enumerate()
            .map(|(index, token)| {
                let token = token.trim();
                token.parse::<f32>().map_err(|_| FrameError::InvalidToken {
                    index,
                    token: token.to_owned(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { values })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        let text = std::str::from_utf8(bytes).map_err(|_| FrameError::Utf8)?;
        Self::parse(text)
    }
}

impl From<Vec<f32>> for RawFrame {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parses_comma_separated_values() {
        let frame = RawFrame::parse(" 1.5,-2, 3e1 ,0\n").unwrap();
        assert_eq!(frame.values(), &[1.5, -2.0, 30.0, 0.0]);
    }

    #[test]
    fn rejects_non_numeric_token() {
        let err = RawFrame::parse("1,2,abc,4").unwrap_err();
        assert_eq!(err, FrameError::InvalidToken { index: 2, token: "abc".into() });
    }

    #[test]
    fn rejects_empty_and_dangling_separator() {
        assert_eq!(RawFrame::parse("   ").unwrap_err(), FrameError::Empty);
        assert!(matches!(
            RawFrame::parse("1,2,").unwrap_err(),
            FrameError::InvalidToken { index: 2, .. }
        ));
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert_eq!(RawFrame::from_bytes(&[0x31, 0xff, 0x2c]).unwrap_err(), FrameError::Utf8);
    }

    proptest! {
        #[test]
        fn parse_keeps_every_value(values in prop::collection::vec(-1.0e6f32..1.0e6, 1..64)) {
            let text = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
            let frame = RawFrame::parse(&text).unwrap();
            prop_assert_eq!(frame.values(), values.as_slice());
        }
    }
}
