//! Incremental decoding of streamed webhook responses.
//!
//! The automation backend answers a chat request with a byte stream whose
//! framing is not known in advance: either server-sent events (`data:` lines
//! separated by blank lines) or one JSON object per line. This module turns
//! that stream into discrete protocol events.
//!
//! - [`StreamDecoder`]: pure incremental framing decoder (bytes in, raw
//!   JSON frames out), testable without any I/O.
//! - [`frame_stream`]: lifts the decoder over an async byte stream.
//! - [`StreamEvent`]: one decoded protocol unit (`item` delta or `end`).

pub mod decoder;
pub mod event;

pub use decoder::{FramingMode, StreamDecoder, frame_stream};
pub use event::StreamEvent;
