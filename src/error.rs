use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structurally broken input: impossible counts, sizes that do not add
    /// up, names that cannot be read. Fatal for the current parse.
    #[error("malformed stream: {0}")]
    Malformed(String),

    /// The decoder failed to advance its read position.
    #[error("decoder did not advance: previous offset {last:#x}, now at {at:#x}")]
    Progress { last: u64, at: u64 },

    /// A typed extraction was asked for a width the raw bytes do not have.
    #[error("field width mismatch: expected {expected} bytes, got {got}")]
    Width { expected: usize, got: usize },

    /// Repack validation failure. Always names the offending path or leaf.
    #[error("consistency check failed: {0}")]
    Consistency(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
