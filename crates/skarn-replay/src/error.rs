//! Replay error types.

use skarn_core::ConfigError;
use skarn_sim::catalog::CatalogError;
use std::error::Error;
use std::fmt;

/// Errors from recording or replaying a script.
#[derive(Debug)]
pub enum ReplayError {
    /// The script's configuration failed validation.
    Config(ConfigError),
    /// The effect catalog failed to load.
    Catalog(CatalogError),
    /// A marshaled frame could not be re-encoded for hashing.
    Encode {
        /// Encoder description.
        reason: String,
    },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Catalog(e) => write!(f, "catalog: {e}"),
            Self::Encode { reason } => write!(f, "encode: {reason}"),
        }
    }
}

impl Error for ReplayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Catalog(e) => Some(e),
            Self::Encode { .. } => None,
        }
    }
}

impl From<ConfigError> for ReplayError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<CatalogError> for ReplayError {
    fn from(e: CatalogError) -> Self {
        Self::Catalog(e)
    }
}
