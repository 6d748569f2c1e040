// codecam-decode/src/lib.rs
// ============================================================
// codecam-decode  –  hand-off to the external symbol decoder
// One worker thread owns the decoder; frames go in one at a
// time, responses come back as a stream in submission order.
// ------------------------------------------------------------
// Pipeline: PixelPayload → Decoder → Vec<Symbol>
// ------------------------------------------------------------
// Public API
//   * DecodeDispatcher::spawn(decoder) – start the worker
//   * DecodeDispatcher::submit(req)    – single-flight send
//   * DecodeResponses                  – Stream of responses
//   * ProcessDecoder::spawn(cmd)       – out-of-process decoder
// ============================================================

//! codecam – decode hand-off layer
//!
//! How symbols are actually recognised is not this crate's business: a
//! [`Decoder`] is any black box that turns a [`PixelPayload`] into zero or
//! more opaque [`Symbol`] records. [`DecodeDispatcher`] runs it off the
//! caller's thread and enforces that at most one request is outstanding.
//! [`ProcessDecoder`] talks to a decoder living in a child process.

use codecam_sample::PixelPayload;
use serde::Serialize;
use thiserror::Error;

mod dispatcher;
mod process;

pub use dispatcher::{DecodeDispatcher, DecodeResponses};
pub use process::ProcessDecoder;

/// One decoded symbol. Its shape belongs to the decoder.
pub type Symbol = serde_json::Value;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Decoder failed: {0}")]
    Failed(String),
    #[error("Decoder I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed decoder output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Decoder process exited (status {0:?})")]
    Exited(Option<i32>),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Request {0} refused: a decode is already in flight")]
    Busy(u64),
    #[error("Decode worker has shut down")]
    Closed,
    #[error("Failed to start decode worker: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// The decoding black box.
pub trait Decoder: Send + 'static {
    fn decode(&mut self, payload: &PixelPayload) -> Result<Vec<Symbol>>;
}

impl<F> Decoder for F
where
    F: FnMut(&PixelPayload) -> Result<Vec<Symbol>> + Send + 'static,
{
    fn decode(&mut self, payload: &PixelPayload) -> Result<Vec<Symbol>> {
        self(payload)
    }
}

/// A frame tagged with its sequence number.
#[derive(Debug)]
pub struct DecodeRequest {
    pub seq: u64,
    pub payload: PixelPayload,
}

/// Symbols found in one frame, in decoder order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DecodeResult {
    pub symbols: Vec<Symbol>,
}

impl DecodeResult {
    /// A response only counts when something was found.
    pub fn is_success(&self) -> bool {
        !self.symbols.is_empty()
    }
}

#[derive(Debug)]
pub struct DecodeResponse {
    pub seq: u64,
    pub outcome: Result<DecodeResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emptiness_decides_success() {
        assert!(!DecodeResult { symbols: vec![] }.is_success());
        assert!(DecodeResult { symbols: vec![json!("ABC123")] }.is_success());
    }

    #[test]
    fn result_serializes_as_plain_array() {
        let r = DecodeResult { symbols: vec![json!("ABC123"), json!({ "format": "qr" })] };
        assert_eq!(serde_json::to_value(&r).unwrap(), json!(["ABC123", { "format": "qr" }]));
    }
}
