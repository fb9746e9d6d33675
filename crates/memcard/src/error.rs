use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unsupported memory card format")]
    UnsupportedFormat,
    #[error("unrecognized single save format")]
    UnrecognizedSaveFormat,
    #[error("input is truncated: expected at least {expected} bytes, got {actual}")]
    TruncatedInput { expected: usize, actual: usize },
    #[error("not enough free space: {required} contiguous blocks required")]
    InsufficientSpace { required: usize },
    #[error("invalid slot {0}")]
    InvalidSlot(usize),
    #[error("save chain starting at slot {start} is corrupted after {walked} blocks")]
    CorruptedChain { start: usize, walked: usize },
    #[error("icon data must be exactly {expected} bytes, got {actual}")]
    InvalidIconData { expected: usize, actual: usize },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
