//! Remote store transports for dropsync
//!
//! Two implementations of [`dropsync_types::Transport`]:
//!
//! - [`DropboxClient`]: the Dropbox HTTP API v2 over `reqwest`, with paged
//!   recursive listing, header-argument content calls, and retry with
//!   exponential backoff for transient failures
//! - [`MemoryTransport`]: a shared in-memory store with a call log and
//!   failure injection, used to drive the reconciler in tests
//!
//! # Examples
//!
//! ```rust,no_run
//! use dropsync_config::{AccessToken, RemoteConfig};
//! use dropsync_remote::DropboxClient;
//! use dropsync_types::{SyncPath, Transport};
//!
//! # async fn example() -> dropsync_types::Result<()> {
//! let client = DropboxClient::new(AccessToken::new("token"), &RemoteConfig::default())?;
//! let entries = client.list_folder(&SyncPath::root()).await?;
//! println!("{} remote entries", entries.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod memory;
pub mod protocol;

pub use client::DropboxClient;
pub use memory::{MemoryTransport, TransportCall, TransportOp};
