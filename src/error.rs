//! Error taxonomy for generation and persistence.

use thiserror::Error;

/// Errors surfaced by the generation pipeline and the atlas.
///
/// Degenerate geometry (a requested shape larger than its bounding
/// rectangle) is deliberately not represented here: it is recovered locally
/// by clamping and logged as a warning. Connectivity failures are likewise
/// absent; layouts are connected by construction and verified in tests.
#[derive(Debug, Error)]
pub enum GenError {
    /// Malformed or internally inconsistent theme data. Fails fast at
    /// generation start; not retryable.
    #[error("invalid theme `{theme}`: {reason}")]
    Config { theme: String, reason: String },

    /// The atlas was asked for a map that is neither cached nor stored.
    /// The caller decides whether to synthesize a new themed map.
    #[error("map {0} not found in cache or store")]
    MapNotFound(u32),

    /// A door or caller referenced a zone index the map does not have.
    #[error("map {map} has no zone {zone}")]
    ZoneNotFound { map: u32, zone: usize },

    /// The atlas was used before `open` attached a persistent store.
    #[error("atlas store not opened")]
    StoreNotOpen,

    /// Persistent store I/O failure.
    #[error("store i/o error: {0}")]
    Store(#[from] std::io::Error),

    /// A store entry exists but cannot be decoded. Recoverable per zone by
    /// regenerating from the theme.
    #[error("corrupt store entry `{key}`: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
}

impl GenError {
    pub fn config(theme: impl Into<String>, reason: impl Into<String>) -> Self {
        GenError::Config {
            theme: theme.into(),
            reason: reason.into(),
        }
    }
}

pub type GenResult<T> = Result<T, GenError>;
