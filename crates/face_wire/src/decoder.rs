use bytes::{Buf, BytesMut};

use crate::{FrameError, RawFrame};

pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// How frame boundaries are found in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Frames end with `delimiter`. Partial frames are carried across reads.
    Delimited { delimiter: u8 },
    /// Every read from the transport is one frame. Peers that send no
    /// terminator need this.
    Chunked,
}

impl Default for Framing {
    fn default() -> Self {
        Framing::Delimited { delimiter: b'\n' }
    }
}

/// Turns transport reads into frames. Only the newest complete frame of each
/// read is returned, older ones are superseded before anyone could see them.
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    buffer: BytesMut,
    max_frame_len: usize,
    /// Set after an oversized frame, the rest of it up to the next delimiter
    /// is thrown away.
    discarding: bool,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self::with_max_frame_len(framing, DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(framing: Framing, max_frame_len: usize) -> Self {
        Self {
            framing,
            buffer: BytesMut::new(),
            max_frame_len,
            discarding: false,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Option<Result<RawFrame, FrameError>> {
        let delimiter = match self.framing {
            Framing::Chunked => {
                if bytes.is_empty() {
                    return None;
                }
                return Some(RawFrame::from_bytes(bytes));
            }
            Framing::Delimited { delimiter } => delimiter,
        };

        self.buffer.extend_from_slice(bytes);
        if self.discarding {
            let Some(end) = self.buffer.iter().position(|b| *b == delimiter) else {
                self.buffer.clear();
                return None;
            };
            self.buffer.advance(end + 1);
            self.discarding = false;
        }

        let Some(end) = self.buffer.iter().rposition(|b| *b == delimiter) else {
            if self.buffer.len() > self.max_frame_len {
                self.buffer.clear();
                self.discarding = true;
                return Some(Err(FrameError::Oversized { limit: self.max_frame_len }));
            }
            return None;
        };

        let complete = self.buffer.split_to(end + 1);
        let newest = complete[..end]
            .split(|b| *b == delimiter)
            .rev()
            .find(|frame| !is_blank(frame))?;
        Some(RawFrame::from_bytes(newest))
    }

    /// Called once the stream has ended. A trailing frame that was never
    /// terminated is incomplete and gets dropped, returns how many bytes that
    /// were.
    pub fn finish(&mut self) -> usize {
        let dropped = if is_blank(&self.buffer) { 0 } else { self.buffer.len() };
        self.buffer.clear();
        self.discarding = false;
        dropped
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines() -> FrameDecoder {
        FrameDecoder::new(Framing::default())
    }

    #[test]
    fn carries_partial_frames_across_reads() {
        let mut decoder = lines();
        assert!(decoder.push(b"1,2,").is_none());
        assert_eq!(decoder.pending(), 4);

        let frame = decoder.push(b"3\n4").unwrap().unwrap();
        assert_eq!(frame.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(decoder.pending(), 1);

        let frame = decoder.push(b",5\n").unwrap().unwrap();
        assert_eq!(frame.values(), &[4.0, 5.0]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn newest_complete_frame_wins() {
        let mut decoder = lines();
        let frame = decoder.push(b"1,1\n2,2\n\n3,3\n4").unwrap().unwrap();
        assert_eq!(frame.values(), &[3.0, 3.0]);
        assert_eq!(decoder.pending(), 1);
    }

    #[test]
    fn blank_frames_are_skipped() {
        let mut decoder = lines();
        assert!(decoder.push(b"\n\r\n").is_none());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn malformed_frame_is_reported_and_discarded() {
        let mut decoder = lines();
        assert!(decoder.push(b"1,x\n").unwrap().is_err());
        assert_eq!(decoder.push(b"7\n").unwrap().unwrap().values(), &[7.0]);
    }

    #[test]
    fn oversized_buffer_is_dropped() {
        let mut decoder = FrameDecoder::with_max_frame_len(Framing::default(), 8);
        assert!(decoder.push(b"1,2,3,").is_none());
        assert_eq!(
            decoder.push(b"4,5,6").unwrap().unwrap_err(),
            FrameError::Oversized { limit: 8 }
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn oversized_frame_remainder_is_skipped() {
        let mut decoder = FrameDecoder::with_max_frame_len(Framing::default(), 8);
        assert!(decoder.push(b"1,2,3,4,").is_none());
        assert!(decoder.push(b"5,6").unwrap().is_err());
        assert!(decoder.push(b"7,8").is_none());
        assert!(decoder.push(b"9\n").is_none());
        assert_eq!(decoder.pending(), 0);

        // The stream is back in sync after the delimiter.
        assert_eq!(decoder.push(b"2,4\n").unwrap().unwrap().values(), &[2.0, 4.0]);
    }

    #[test]
    fn resync_keeps_frames_after_the_delimiter() {
        let mut decoder = FrameDecoder::with_max_frame_len(Framing::default(), 4);
        assert!(decoder.push(b"1,2,3,4").unwrap().is_err());
        assert_eq!(decoder.push(b",5\n6\n").unwrap().unwrap().values(), &[6.0]);
    }

    #[test]
    fn finish_drops_unterminated_tail() {
        let mut decoder = lines();
        assert!(decoder.push(b"9,8").is_none());
        assert_eq!(decoder.finish(), 3);
        assert_eq!(decoder.pending(), 0);
        assert_eq!(decoder.finish(), 0);
    }

    #[test]
    fn chunked_treats_each_read_as_a_frame() {
        let mut decoder = FrameDecoder::new(Framing::Chunked);
        assert_eq!(decoder.push(b"1,2").unwrap().unwrap().values(), &[1.0, 2.0]);
        assert!(decoder.push(b"").is_none());
        assert_eq!(decoder.finish(), 0);
    }
}
