//! Wire types for the Dropbox HTTP API v2
//!
//! Only the fields the transport reads are modelled; unknown fields are
//! ignored on deserialization.

use chrono::{DateTime, Utc};
use dropsync_types::{RemoteDirMeta, RemoteFileMeta};
use serde::{Deserialize, Serialize};

/// `files/list_folder` argument
#[derive(Debug, Clone, Serialize)]
pub struct ListFolderArg<'a> {
    /// Absolute remote path; empty for the app root
    pub path: &'a str,
    /// List the whole subtree
    pub recursive: bool,
    /// Include tombstones
    pub include_deleted: bool,
}

/// `files/list_folder/continue` argument
#[derive(Debug, Clone, Serialize)]
pub struct ListFolderContinueArg<'a> {
    /// Cursor from the previous page
    pub cursor: &'a str,
}

/// One page of a folder listing
#[derive(Debug, Clone, Deserialize)]
pub struct ListFolderResult {
    /// Entries on this page
    pub entries: Vec<Metadata>,
    /// Cursor for the next page
    pub cursor: String,
    /// Whether another page follows
    pub has_more: bool,
}

/// Tagged entry metadata
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum Metadata {
    /// A file
    File(FileMetadata),
    /// A folder
    Folder(FolderMetadata),
    /// A tombstone
    Deleted(DeletedMetadata),
}

impl Metadata {
    /// Display path of the entry, when the server sent one
    pub fn path_display(&self) -> Option<&str> {
        match self {
            Self::File(m) => m.path_display.as_deref(),
            Self::Folder(m) => m.path_display.as_deref(),
            Self::Deleted(m) => m.path_display.as_deref(),
        }
    }
}

/// File metadata
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileMetadata {
    /// Last path component
    pub name: String,
    /// Cased path for display
    pub path_display: Option<String>,
    /// Unique identifier
    pub id: String,
    /// Revision; changes with every content change
    pub rev: String,
    /// Size in bytes
    pub size: u64,
    /// Server-side modification time
    pub server_modified: Option<DateTime<Utc>>,
    /// Dropbox content hash
    pub content_hash: Option<String>,
}

impl From<FileMetadata> for RemoteFileMeta {
    fn from(meta: FileMetadata) -> Self {
        Self {
            rev: meta.rev,
            content_hash: meta.content_hash,
            size: meta.size,
            server_modified: meta.server_modified,
        }
    }
}

/// Folder metadata
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FolderMetadata {
    /// Last path component
    pub name: String,
    /// Cased path for display
    pub path_display: Option<String>,
    /// Unique identifier
    pub id: String,
}

impl From<FolderMetadata> for RemoteDirMeta {
    fn from(meta: FolderMetadata) -> Self {
        Self::with_id(meta.id)
    }
}

/// Tombstone metadata
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeletedMetadata {
    /// Last path component
    pub name: String,
    /// Cased path for display
    pub path_display: Option<String>,
}

/// Argument naming a single path
#[derive(Debug, Clone, Serialize)]
pub struct PathArg<'a> {
    /// Absolute remote path
    pub path: &'a str,
}

/// Upload write mode on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum WriteModeArg {
    /// Fail on conflict
    Add,
    /// Replace existing content
    Overwrite,
}

impl From<dropsync_types::WriteMode> for WriteModeArg {
    fn from(mode: dropsync_types::WriteMode) -> Self {
        match mode {
            dropsync_types::WriteMode::Add => Self::Add,
            dropsync_types::WriteMode::Overwrite => Self::Overwrite,
        }
    }
}

/// `files/upload` argument
#[derive(Debug, Clone, Serialize)]
pub struct UploadArg<'a> {
    /// Absolute remote path
    pub path: &'a str,
    /// Write mode
    pub mode: WriteModeArg,
    /// Never rename on conflict
    pub autorename: bool,
    /// Do not notify the user's devices
    pub mute: bool,
}

/// `files/create_folder_v2` argument
#[derive(Debug, Clone, Serialize)]
pub struct CreateFolderArg<'a> {
    /// Absolute remote path
    pub path: &'a str,
    /// Never rename on conflict
    pub autorename: bool,
}

/// `files/create_folder_v2` result
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFolderResult {
    /// The new folder
    pub metadata: FolderMetadata,
}

/// `files/delete_v2` result
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteResult {
    /// What was deleted
    pub metadata: Metadata,
}

/// Error body returned with 4xx statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Slash-separated error path, e.g. `path_lookup/not_found/..`
    pub error_summary: String,
}

/// Encode an argument for the `Dropbox-API-Arg` header
///
/// HTTP headers must be ASCII, so every non-ASCII character is written as a
/// JSON `\u` escape.
pub fn header_arg<T: Serialize>(arg: &T) -> serde_json::Result<String> {
    let json = serde_json::to_string(arg)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    Ok(out)
}
