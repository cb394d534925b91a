//! Dual-mode incremental framing decoder.
//!
//! Network chunks arrive with no alignment to logical message boundaries:
//! a frame, a line, or even a single UTF-8 scalar may be split across two
//! reads. [`StreamDecoder`] buffers bytes, decodes them incrementally, and
//! emits one raw frame string per logical protocol unit.

use futures::{Stream, StreamExt};

/// Leading token that selects SSE framing.
const SSE_TOKEN: &str = "data:";

/// Framing of the response stream, detected from its first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// Server-sent events: frames are `data:` payloads inside blocks
    /// separated by a blank line.
    Sse,
    /// One JSON object per non-empty line.
    Lines,
}

/// Incremental decoder turning raw byte chunks into protocol frames.
///
/// The decoder auto-detects [`FramingMode`] from the first non-whitespace
/// text and keeps it for the rest of the stream. Feed chunks with
/// [`push`](Self::push) as they arrive and call [`finish`](Self::finish)
/// at end-of-input to flush any buffered tail. A decoder is single-use;
/// restarting means constructing a new one.
///
/// Frames are raw strings; JSON validity is the caller's concern.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes held back because they end mid-scalar.
    pending: Vec<u8>,
    /// Decoded text not yet cut into frames.
    buffer: String,
    mode: Option<FramingMode>,
}

impl StreamDecoder {
    /// Create a decoder with no mode chosen yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The detected framing mode, if the stream has revealed it yet.
    #[must_use]
    pub fn mode(&self) -> Option<FramingMode> {
        self.mode
    }

    /// Feed one chunk of bytes, returning every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();
        self.detect_mode(false);
        match self.mode {
            Some(FramingMode::Sse) => self.drain_sse_blocks(),
            Some(FramingMode::Lines) => self.drain_lines(),
            None => Vec::new(),
        }
    }

    /// Signal end-of-input and flush whatever is still buffered.
    ///
    /// A trailing SSE block without its closing blank line is still scanned
    /// for `data:` lines; in line mode the trailing partial line is emitted
    /// if non-empty.
    #[must_use]
    pub fn finish(mut self) -> Vec<String> {
        // Whatever is left can no longer be completed; decode it lossily.
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        self.detect_mode(true);

        let mut frames = match self.mode {
            Some(FramingMode::Sse) => self.drain_sse_blocks(),
            Some(FramingMode::Lines) => self.drain_lines(),
            // Empty or whitespace-only stream.
            None => return Vec::new(),
        };

        let leftover = self.buffer.trim();
        if leftover.is_empty() {
            return frames;
        }
        match self.mode {
            Some(FramingMode::Sse) => {
                if let Some(frame) = sse_block_frame(leftover) {
                    frames.push(frame);
                }
            }
            Some(FramingMode::Lines) | None => frames.push(leftover.to_string()),
        }
        frames
    }

    /// Move every fully decodable byte from `pending` into `buffer`,
    /// keeping only an incomplete trailing scalar behind.
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    // Safe: `valid` bytes were just checked.
                    self.buffer
                        .push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or(""));
                    match err.error_len() {
                        // Incomplete scalar at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        // Invalid sequence: replace and keep going.
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }

    /// Choose the framing mode once the first non-whitespace text allows it.
    ///
    /// Detection is deferred while the probe is still a proper prefix of
    /// `data:` (e.g. a chunk ending after `dat`), so cutting the input at
    /// any byte boundary yields the same frames. With `at_end` the current
    /// text is final and the prefix rule decides immediately.
    fn detect_mode(&mut self, at_end: bool) {
        if self.mode.is_some() {
            return;
        }
        let probe = self.buffer.trim_start();
        if probe.is_empty() {
            return;
        }
        if probe.starts_with(SSE_TOKEN) {
            self.mode = Some(FramingMode::Sse);
        } else if at_end || !SSE_TOKEN.starts_with(probe) {
            // A leading `{` or `[` is not treated specially: anything that
            // is not the SSE token reads as line-delimited JSON.
            self.mode = Some(FramingMode::Lines);
        }
    }

    /// Cut complete `\n\n`-terminated SSE blocks out of the buffer.
    fn drain_sse_blocks(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(idx) = self.buffer.find("\n\n") {
            let block = self.buffer[..idx].to_string();
            self.buffer.drain(..idx + 2);
            if let Some(frame) = sse_block_frame(&block) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Cut complete lines out of the buffer, emitting trimmed non-empty ones.
    fn drain_lines(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(idx) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=idx).collect();
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                frames.push(trimmed.to_string());
            }
        }
        frames
    }
}

/// Extract the frame carried by one SSE event block, if any.
///
/// `data:` lines lose the token plus at most one following whitespace
/// character, are joined with `\n`, and the result is trimmed. Blocks
/// without a `data:` line (comments, bare `event:` lines) carry nothing.
fn sse_block_frame(block: &str) -> Option<String> {
    let payload = block
        .lines()
        .filter_map(strip_data_prefix)
        .collect::<Vec<_>>()
        .join("\n");
    let payload = payload.trim();
    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}

/// Strip `data:` and at most one whitespace character after it.
fn strip_data_prefix(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(SSE_TOKEN)?;
    match rest.chars().next() {
        Some(c) if c.is_whitespace() => Some(&rest[c.len_utf8()..]),
        _ => Some(rest),
    }
}

/// Lift a [`StreamDecoder`] over an async byte stream.
///
/// Yields raw frames lazily, in arrival order, flushing the decoder when
/// the underlying stream ends. Transport errors pass through unchanged.
pub fn frame_stream<S, B, E>(bytes: S) -> impl Stream<Item = anyhow::Result<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<anyhow::Error> + Send,
{
    async_stream::try_stream! {
        let mut decoder = StreamDecoder::new();
        futures::pin_mut!(bytes);
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(Into::into)?;
            for frame in decoder.push(chunk.as_ref()) {
                yield frame;
            }
        }
        for frame in decoder.finish() {
            yield frame;
        }
    }
}
