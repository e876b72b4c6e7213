//! Result type alias for dropsync operations

use crate::Error;

/// Result type alias for dropsync operations
pub type Result<T> = std::result::Result<T, Error>;
