//! Writer side of a CTF-style trace: a packet encoder, a deduplicating
//! dictionary of event layouts, the textual metadata serializer, and the
//! per-stream file writer.

use thiserror::Error;

pub mod metadata;
pub mod packet;
pub mod tsdl;
pub mod writer;

pub use metadata::{Event, Field, FieldType, Guid, Metadata, ROOT_SCOPE};
pub use packet::Packet;
pub use writer::CtfStreamWriter;

/// Magic value opening the packet header of every stream file.
pub const CTF_MAGIC: u32 = 0xC1FC_1FC1;

#[derive(Error, Debug)]
pub enum CtfFormatError {
    #[error("output folder already opened")]
    FolderAlreadyOpen,

    #[error("output folder path is empty")]
    EmptyFolderPath,

    #[error("no output folder opened")]
    FolderNotOpen,

    #[error("a stream is already open")]
    StreamAlreadyOpen,

    #[error("no stream is open")]
    StreamNotOpen,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CtfFormatError>;
