use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("message truncated: needed {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unknown tuple type {0}")]
    UnknownTupleType(u8),

    #[error("missing field with key {0}")]
    MissingField(u32),

    #[error("field {key} has unexpected type")]
    WrongType { key: u32 },

    #[error("unknown record kind {0}")]
    UnknownKind(u8),

    #[error("invalid text in field {0}")]
    InvalidText(u32),

    #[error("too many tuples: {0}")]
    TooManyTuples(usize),

    #[error("value too large for field {0}")]
    ValueTooLarge(u32),

    #[error("unknown frame kind {0}")]
    UnknownFrame(u8),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
