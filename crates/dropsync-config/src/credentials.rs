//! Access token loading
//!
//! The token lives in a plain file inside the sync directory. Only the first
//! line is used; surrounding whitespace is trimmed.

use crate::{ConfigError, ConfigResult};
use std::fmt;
use std::path::Path;

/// Bearer token for the remote store
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Read the access token from `path`
pub fn read_token(path: &Path) -> ConfigResult<AccessToken> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::MissingToken {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let token = contents.lines().next().unwrap_or_default().trim();
    if token.is_empty() {
        return Err(ConfigError::EmptyToken {
            path: path.to_path_buf(),
        });
    }

    Ok(AccessToken::new(token))
}
