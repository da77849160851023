//! Transcodes kernel/user event trace captures into a CTF-style trace
//! folder: one binary stream file per source buffer plus a textual
//! `metadata` schema document.

pub mod converter;
pub mod dissector;
pub mod dissectors;
pub mod source;

pub use converter::CtfConverter;
pub use dissector::{Dissector, DissectorRegistry};
pub use source::{BufferRecord, Capture, EventRecord, Record};
