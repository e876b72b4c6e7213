//! Dropbox HTTP API v2 transport
//!
//! Metadata calls are JSON RPCs against the API host; content calls pass
//! their argument in the `Dropbox-API-Arg` header and the file bytes in the
//! body. Transient failures (network, timeouts, 429, 5xx) are retried with
//! exponential backoff; everything else is returned to the caller.

use crate::protocol::{
    header_arg, ApiError, CreateFolderArg, CreateFolderResult, DeleteResult, FileMetadata,
    ListFolderArg, ListFolderContinueArg, ListFolderResult, Metadata, PathArg, UploadArg,
};
use async_trait::async_trait;
use dropsync_config::{AccessToken, RemoteConfig, PARTIAL_DOWNLOAD_SUFFIX};
use dropsync_types::{
    DeleteOutcome, Error, RemoteDirMeta, RemoteEntry, RemoteFileMeta, Result, RetryConfig,
    SyncPath, TimeoutConfig, Transport, WriteMode,
};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const API_ARG_HEADER: &str = "Dropbox-API-Arg";
const API_RESULT_HEADER: &str = "Dropbox-API-Result";

/// Client for the Dropbox HTTP API
#[derive(Debug, Clone)]
pub struct DropboxClient {
    http: Client,
    token: AccessToken,
    api_url: String,
    content_url: String,
    root: SyncPath,
    retry: RetryConfig,
    timeouts: TimeoutConfig,
}

impl DropboxClient {
    /// Create a client from the `remote` configuration section
    pub fn new(token: AccessToken, config: &RemoteConfig) -> Result<Self> {
        let api_url = normalize_base_url(&config.api_url)?;
        let content_url = normalize_base_url(&config.content_url)?;

        let http = Client::builder()
            .connect_timeout(config.timeouts.connect_timeout)
            .user_agent(format!("dropsync/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            token,
            api_url,
            content_url,
            root: SyncPath::from_remote(&config.root),
            retry: config.retry.clone(),
            timeouts: config.timeouts.clone(),
        })
    }

    /// The remote folder this client mirrors
    pub fn root(&self) -> &SyncPath {
        &self.root
    }

    /// Absolute remote path for a root-relative path
    pub fn remote_path(&self, path: &SyncPath) -> String {
        if self.root.is_root() {
            path.to_remote()
        } else if path.is_root() {
            self.root.to_remote()
        } else {
            self.root.join(path.as_str()).to_remote()
        }
    }

    /// Root-relative path for an absolute remote path; `None` outside the root
    pub fn relative_path(&self, display: &str) -> Option<SyncPath> {
        let absolute = SyncPath::from_remote(display);
        if self.root.is_root() {
            return Some(absolute);
        }
        // Remote paths are case-insensitive
        let mut segments = absolute.segments();
        for expected in self.root.segments() {
            if !same_name(segments.next()?, expected) {
                return None;
            }
        }
        Some(SyncPath::new(segments.collect::<Vec<_>>().join("/")))
    }

    fn api(&self, endpoint: &str) -> RequestBuilder {
        self.http
            .post(format!("{}/2/{}", self.api_url, endpoint))
            .bearer_auth(self.token.secret())
            .timeout(self.timeouts.request_timeout)
    }

    fn content(&self, endpoint: &str, arg: String) -> RequestBuilder {
        self.http
            .post(format!("{}/2/{}", self.content_url, endpoint))
            .bearer_auth(self.token.secret())
            .header(API_ARG_HEADER, arg)
            .timeout(self.timeouts.transfer_timeout)
    }

    async fn rpc<A, R>(&self, endpoint: &str, arg: &A) -> Result<R>
    where
        A: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.with_retry(endpoint, || async move {
            let response = self
                .api(endpoint)
                .json(arg)
                .send()
                .await
                .map_err(|e| self.transport_error(&e))?;
            let response = check_status(response).await?;
            response
                .json::<R>()
                .await
                .map_err(|e| Error::network(format!("Invalid response from {endpoint}: {e}")))
        })
        .await
    }

    /// Run `f`, retrying transient errors with exponential backoff
    async fn with_retry<T, F, Fut>(&self, operation: &str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.should_retry() && attempt < self.retry.max_retries => {
                    let delay = match &err {
                        Error::RateLimited {
                            retry_after: Some(secs),
                        } => Duration::from_secs(*secs).min(self.retry.max_delay),
                        _ => self.retry.delay_for_attempt(attempt),
                    };
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn transport_error(&self, e: &reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                seconds: self.timeouts.request_timeout.as_secs(),
            }
        } else {
            Error::network(e.to_string())
        }
    }

    async fn list_page(&self, cursor: Option<&str>, path: &str) -> Result<ListFolderResult> {
        match cursor {
            Some(cursor) => {
                self.rpc("files/list_folder/continue", &ListFolderContinueArg { cursor })
                    .await
            }
            None => {
                let arg = ListFolderArg {
                    path,
                    recursive: true,
                    include_deleted: false,
                };
                self.rpc("files/list_folder", &arg).await
            }
        }
    }

    async fn folder_metadata(&self, remote: &str) -> Result<Option<RemoteDirMeta>> {
        let meta: Metadata = self
            .rpc("files/get_metadata", &PathArg { path: remote })
            .await?;
        Ok(match meta {
            Metadata::Folder(folder) => Some(folder.into()),
            _ => None,
        })
    }

    fn to_entry(&self, meta: Metadata) -> Option<RemoteEntry> {
        let path = self.relative_path(meta.path_display()?)?;
        Some(match meta {
            Metadata::File(file) => RemoteEntry::file(path, file.into()),
            Metadata::Folder(folder) => RemoteEntry::folder(path, folder.into()),
            Metadata::Deleted(_) => RemoteEntry::deleted(path),
        })
    }
}

fn normalize_base_url(url: &str) -> Result<String> {
    let url = url.trim_end_matches('/');
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(Error::config(format!(
            "Remote URL must start with http:// or https://: {url}"
        )));
    }
    Ok(url.to_string())
}

/// Turn non-success statuses into errors
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    let summary = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error_summary)
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED => Error::auth(summary),
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited { retry_after },
        _ => Error::Remote {
            status: status.as_u16(),
            summary,
        },
    })
}

fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn is_conflict(err: &Error, prefix: &str) -> bool {
    matches!(err, Error::Remote { status: 409, summary } if summary.starts_with(prefix))
}

fn same_name(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(PARTIAL_DOWNLOAD_SUFFIX);
    path.with_file_name(name)
}

/// Write `bytes` next to `path` and rename over it
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = temp_sibling(path);
    if let Err(e) = tokio::fs::write(&temp, bytes).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(Error::io_at("write", &temp, &e));
    }
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| Error::io_at("replace", path, &e))
}

#[async_trait]
impl Transport for DropboxClient {
    async fn list_folder(&self, path: &SyncPath) -> Result<Vec<RemoteEntry>> {
        let remote = self.remote_path(path);
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.list_page(cursor.as_deref(), &remote).await?;
            entries.extend(page.entries.into_iter().filter_map(|m| self.to_entry(m)));
            if !page.has_more {
                break;
            }
            debug!("Listing continues after {} entries", entries.len());
            cursor = Some(page.cursor);
        }

        Ok(entries)
    }

    async fn download_to_file(&self, path: &SyncPath, local: &Path) -> Result<RemoteFileMeta> {
        let remote = self.remote_path(path);
        let arg = header_arg(&PathArg { path: &remote })
            .map_err(|e| Error::other(format!("Failed to encode download argument: {e}")))?;
        let (arg, remote) = (arg.as_str(), remote.as_str());

        let (meta, bytes) = self
            .with_retry("files/download", || async move {
                let response = self
                    .content("files/download", arg.to_string())
                    .send()
                    .await
                    .map_err(|e| self.transport_error(&e))?;
                let response = check_status(response).await?;

                let meta: FileMetadata = response
                    .headers()
                    .get(API_RESULT_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| serde_json::from_str(v).ok())
                    .ok_or_else(|| {
                        Error::network(format!("Missing {API_RESULT_HEADER} header for {remote}"))
                    })?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| self.transport_error(&e))?;
                Ok((meta, bytes))
            })
            .await?;

        write_atomic(local, &bytes).await?;
        Ok(meta.into())
    }

    async fn upload_file(
        &self,
        contents: Vec<u8>,
        path: &SyncPath,
        mode: WriteMode,
    ) -> Result<RemoteFileMeta> {
        // TODO: files over 150 MiB need upload sessions (upload_session/start, append_v2, finish)
        let remote = self.remote_path(path);
        let arg = header_arg(&UploadArg {
            path: &remote,
            mode: mode.into(),
            autorename: false,
            mute: true,
        })
        .map_err(|e| Error::other(format!("Failed to encode upload argument: {e}")))?;
        let (arg, contents) = (arg.as_str(), &contents);

        let meta: FileMetadata = self
            .with_retry("files/upload", || async move {
                let response = self
                    .content("files/upload", arg.to_string())
                    .header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
                    .body(contents.clone())
                    .send()
                    .await
                    .map_err(|e| self.transport_error(&e))?;
                let response = check_status(response).await?;
                response
                    .json::<FileMetadata>()
                    .await
                    .map_err(|e| Error::network(format!("Invalid upload response: {e}")))
            })
            .await?;

        Ok(meta.into())
    }

    async fn create_folder(&self, path: &SyncPath) -> Result<RemoteDirMeta> {
        let remote = self.remote_path(path);
        let arg = CreateFolderArg {
            path: &remote,
            autorename: false,
        };

        match self
            .rpc::<_, CreateFolderResult>("files/create_folder_v2", &arg)
            .await
        {
            Ok(result) => Ok(result.metadata.into()),
            Err(e) if is_conflict(&e, "path/conflict/folder") => {
                debug!("Remote folder {remote} already exists");
                match self.folder_metadata(&remote).await? {
                    Some(meta) => Ok(meta),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, path: &SyncPath) -> Result<DeleteOutcome> {
        let remote = self.remote_path(path);
        match self
            .rpc::<_, DeleteResult>("files/delete_v2", &PathArg { path: &remote })
            .await
        {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(e) if is_conflict(&e, "path_lookup/not_found") => {
                debug!("Remote {remote} was already gone");
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => Err(e),
        }
    }
}
