use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything a command handler can fail with. All of these surface as a
/// single message at the prompt; none of them terminate the loop.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid track number: {0}")]
    InvalidOrdinal(usize),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("already in catalog: {0}")]
    DuplicateEntry(String),

    #[error("could not resolve a title for {0}")]
    TitleResolutionFailed(String),

    #[error("{0} is not installed or in your PATH")]
    ToolMissing(&'static str),

    #[error("{tool} failed with exit code {code}")]
    ToolFailed { tool: &'static str, code: i32 },

    #[error("could not parse: {0}")]
    ParseFailure(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Prefix used when this error is shown at the prompt.
    pub fn prompt_tag(&self) -> &'static str {
        match self {
            Error::ToolMissing(_) => "[missing]",
            _ => "[error]",
        }
    }

    /// Map a spawn failure to `ToolMissing` when the binary is absent,
    /// plain `Io` otherwise.
    pub fn from_spawn(tool: &'static str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::ToolMissing(tool)
        } else {
            Error::Io(err)
        }
    }

    /// Build `ToolFailed` from a process exit status (-1 when killed by signal).
    pub fn from_exit(tool: &'static str, status: std::process::ExitStatus) -> Self {
        Error::ToolFailed {
            tool,
            code: status.code().unwrap_or(-1),
        }
    }
}
