use thiserror::Error;

/// Failures surfaced by the artwork cache and fetch pipeline.
///
/// Absent artwork is not an error: lookups return `Ok(None)`. Corrupt cache
/// state is self-healed internally and never surfaces here.
#[derive(Error, Debug)]
pub enum ArtworkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index serialization error: {0}")]
    Index(#[from] serde_json::Error),

    /// The server rejected our credentials (HTTP 401). Surfaced distinctly
    /// so the caller can trigger re-authentication.
    #[error("authentication expired")]
    AuthExpired,

    #[error("artwork not found for owner: {0}")]
    NotFound(String),

    /// Transport timeout or an upstream 504.
    #[error("artwork request timed out")]
    Timeout,

    #[error("media server unreachable")]
    Unreachable,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// 2xx response with an empty or undecodable body.
    #[error("invalid artwork response")]
    InvalidResponse,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ArtworkError>;
