//! Code decoding
//!
//! A `Decoder` turns one frame into at most one text payload. Returning
//! `None` is the normal outcome for frames without a readable code.

pub mod qr;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::camera::Frame;

pub use qr::QrDecoder;

/// Text extracted from a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub text: String,
}

impl DecodedPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Frame decoder capability
///
/// Implementations must not keep the frame past the call.
pub trait Decoder {
    /// Attempt to read a code from `frame`
    fn decode(&self, frame: &Frame) -> Option<DecodedPayload>;

    /// Decoder name for logs
    fn name(&self) -> &str {
        "decoder"
    }
}

impl<D: Decoder + ?Sized> Decoder for Arc<D> {
    fn decode(&self, frame: &Frame) -> Option<DecodedPayload> {
        (**self).decode(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Decoder that replays a fixed script, one entry per call
///
/// After the script runs out it keeps returning the fallback (usually `None`).
pub struct ScriptedDecoder {
    script: Mutex<VecDeque<Option<String>>>,
    fallback: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedDecoder {
    /// Decode results in order; `None` entries simulate frames without a code
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(script.into_iter().map(|s| s.map(Into::into)).collect()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Decoder that reads `text` from every frame
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(text.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Decoder that never finds a code
    pub fn empty() -> Self {
        Self::new(Vec::<Option<String>>::new())
    }

    /// Number of frames decoded so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Decoder for ScriptedDecoder {
    fn decode(&self, _frame: &Frame) -> Option<DecodedPayload> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let next = match self.script.lock().pop_front() {
            Some(entry) => entry,
            None => self.fallback.clone(),
        };
        next.map(DecodedPayload::new)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_decoder_order() {
        let decoder = ScriptedDecoder::new([None, Some("A"), Some("B")]);
        let frame = Frame::solid(1, 1, [0, 0, 0, 255], 0);

        assert_eq!(decoder.decode(&frame), None);
        assert_eq!(decoder.decode(&frame), Some(DecodedPayload::new("A")));
        assert_eq!(decoder.decode(&frame), Some(DecodedPayload::new("B")));
        assert_eq!(decoder.decode(&frame), None);
        assert_eq!(decoder.calls(), 4);
    }

    #[test]
    fn test_always_decoder() {
        let decoder = ScriptedDecoder::always("7791234");
        let frame = Frame::solid(1, 1, [0, 0, 0, 255], 0);
        for _ in 0..3 {
            assert_eq!(decoder.decode(&frame).unwrap().text, "7791234");
        }
    }
}
