//! Gzip decompress → inspect → recompress state machine.
//!
//! # Responsibilities
//! - Decompress upstream chunks in arrival order
//! - Feed accumulated text to the meta extractor until a status is found
//! - Recompress every decompressed byte exactly once
//!
//! # State Machine
//! ```text
//! Buffering ──(status found)──────────▶ Extracted ──┐
//!     │                                              │
//!     ├──(cap reached / give_up)───────▶ GaveUp ─────┤
//!     │                                              ▼
//!     └──────────────(end of input)──────────────▶ Ended
//! ```
//!
//! # Design Decisions
//! - Synchronous: `on_chunk`/`on_end` return the bytes to emit, the async
//!   adapter in `body.rs` decides when to pull and push
//! - Output is sync-flushed per chunk so streamed HTML reaches the client promptly
//! - Multi-member gzip bodies are decoded member after member
//! - The markup is re-parsed only when a chunk brings a `>`, since no tag can
//!   complete without one; text up to the last complete tag is then dropped
//! - Inspection stops after `max_inspect_bytes` of decompressed text

use axum::http::StatusCode;
use bytes::Bytes;
use flate2::write::{GzEncoder, MultiGzDecoder};
use flate2::Compression;
use std::io::Write;
use thiserror::Error;

use crate::inspect::MetaExtractor;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort a single exchange's body.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("gzip decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("gzip compression failed: {0}")]
    Compress(#[source] std::io::Error),

    #[error("upstream body failed: {0}")]
    Upstream(#[source] BoxError),
}

/// Inspection state of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeState {
    /// Still looking for the meta tag.
    Buffering,
    /// Status found; bytes are only transcoded from now on.
    Extracted,
    /// Inspection cap or settle window reached without a status; bytes are only transcoded.
    GaveUp,
    /// Input finished and the gzip trailer was emitted.
    Ended,
}

/// Per-exchange transcoder.
pub struct StreamTranscoder {
    extractor: MetaExtractor,
    max_inspect_bytes: usize,
    decoder: MultiGzDecoder<Vec<u8>>,
    encoder: GzEncoder<Vec<u8>>,
    accumulated: Vec<u8>,
    state: TranscodeState,
    extracted: Option<StatusCode>,
    compressed_in: usize,
    decompressed_in: usize,
}

impl StreamTranscoder {
    pub fn new(extractor: MetaExtractor, max_inspect_bytes: usize) -> Self {
        Self {
            extractor,
            max_inspect_bytes,
            decoder: MultiGzDecoder::new(Vec::new()),
            encoder: GzEncoder::new(Vec::new(), Compression::default()),
            accumulated: Vec::new(),
            state: TranscodeState::Buffering,
            extracted: None,
            compressed_in: 0,
            decompressed_in: 0,
        }
    }

    pub fn state(&self) -> TranscodeState {
        self.state
    }

    /// The status taken from the body, if one was found.
    pub fn extracted_status(&self) -> Option<StatusCode> {
        self.extracted
    }

    /// True while the response status may still change.
    pub fn is_buffering(&self) -> bool {
        self.state == TranscodeState::Buffering
    }

    /// Bytes currently held for inspection.
    pub fn buffered_len(&self) -> usize {
        self.accumulated.len()
    }

    /// Process one compressed input chunk and return the compressed bytes to emit.
    ///
    /// The returned buffer may be empty when the chunk produced no output yet.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Result<Bytes, TranscodeError> {
        if self.state == TranscodeState::Ended {
            return Ok(Bytes::new());
        }
        self.compressed_in += chunk.len();

        self.decoder.write_all(chunk).map_err(TranscodeError::Decompress)?;
        self.decoder.flush().map_err(TranscodeError::Decompress)?;
        let plain = std::mem::take(self.decoder.get_mut());
        if plain.is_empty() {
            return Ok(Bytes::new());
        }

        self.inspect(&plain);
        self.encoder.write_all(&plain).map_err(TranscodeError::Compress)?;
        self.encoder.flush().map_err(TranscodeError::Compress)?;
        Ok(self.take_output())
    }

    /// Finish the input and return the remaining compressed bytes, trailer included.
    ///
    /// Input that never carried a single byte yields a complete empty gzip stream.
    pub fn on_end(&mut self) -> Result<Bytes, TranscodeError> {
        if self.state == TranscodeState::Ended {
            return Ok(Bytes::new());
        }

        if self.compressed_in > 0 {
            self.decoder.try_finish().map_err(TranscodeError::Decompress)?;
            let plain = std::mem::take(self.decoder.get_mut());
            if !plain.is_empty() {
                self.inspect(&plain);
                self.encoder.write_all(&plain).map_err(TranscodeError::Compress)?;
            }
        }

        self.encoder.try_finish().map_err(TranscodeError::Compress)?;
        self.release();
        self.state = TranscodeState::Ended;

        tracing::trace!(
            compressed_in = self.compressed_in,
            decompressed_in = self.decompressed_in,
            status = ?self.extracted,
            "Transcoding finished"
        );
        Ok(self.take_output())
    }

    /// Stop looking for the status; later input is only transcoded.
    pub fn give_up(&mut self) {
        if self.state == TranscodeState::Buffering {
            tracing::debug!(
                meta = %self.extractor.target_name(),
                inspected = self.decompressed_in,
                "Inspection abandoned without status"
            );
            self.state = TranscodeState::GaveUp;
            self.release();
        }
    }

    /// Stop processing and drop every held buffer.
    pub fn abort(&mut self) {
        self.release();
        self.decoder.get_mut().clear();
        self.encoder.get_mut().clear();
        self.state = TranscodeState::Ended;
    }

    fn inspect(&mut self, plain: &[u8]) {
        self.decompressed_in += plain.len();
        if self.state != TranscodeState::Buffering {
            return;
        }
        self.accumulated.extend_from_slice(plain);

        if plain.contains(&b'>') {
            let found = {
                let text = String::from_utf8_lossy(&self.accumulated);
                self.extractor.extract_status(&text)
            };
            if let Some(status) = found {
                tracing::debug!(
                    meta = %self.extractor.target_name(),
                    status = status.as_u16(),
                    inspected = self.decompressed_in,
                    "Status found in body"
                );
                self.extracted = Some(status);
                self.state = TranscodeState::Extracted;
                self.release();
                return;
            }
            self.discard_examined();
        }

        if self.decompressed_in >= self.max_inspect_bytes {
            tracing::debug!(
                meta = %self.extractor.target_name(),
                limit = self.max_inspect_bytes,
                "Inspection limit reached without status"
            );
            self.state = TranscodeState::GaveUp;
            self.release();
        }
    }

    /// Drop text that can no longer become part of a matching tag: everything
    /// before the first `<` opened after the last `>`.
    fn discard_examined(&mut self) {
        let Some(last_close) = self.accumulated.iter().rposition(|&b| b == b'>') else {
            return;
        };
        let keep_from = self.accumulated[last_close..]
            .iter()
            .position(|&b| b == b'<')
            .map_or(self.accumulated.len(), |offset| last_close + offset);
        self.accumulated.drain(..keep_from);
    }

    fn release(&mut self) {
        self.accumulated = Vec::new();
    }

    fn take_output(&mut self) -> Bytes {
        Bytes::from(std::mem::take(self.encoder.get_mut()))
    }
}

impl std::fmt::Debug for StreamTranscoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTranscoder")
            .field("state", &self.state)
            .field("extracted", &self.extracted)
            .field("buffered", &self.accumulated.len())
            .finish()
    }
}
