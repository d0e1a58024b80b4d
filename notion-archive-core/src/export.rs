//! PDF export through Notion's export task endpoints.
//!
//! The export is a three step exchange authenticated with browser session cookies:
//! enqueue an `exportBlock` task, poll it until it reports an export URL, download the
//! zip behind that URL. The archive is then unpacked flat into the staging directory.

use std::fmt;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::error::{ArchiveError, Result};
use crate::identifier::PageIdentifier;

/// Produces one or more files for a page inside a staging directory.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Export `id` into `staging_dir`, which already exists and is empty.
    async fn export_page(&self, id: &PageIdentifier, staging_dir: &Path) -> Result<()>;
}

/// Browser session cookies required by the export endpoints.
#[derive(Clone)]
pub struct ExportTokens {
    pub token_v2: String,
    pub file_token: String,
}

impl fmt::Debug for ExportTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportTokens")
            .field("token_v2", &REDACTED)
            .field("file_token", &REDACTED)
            .finish()
    }
}

pub(crate) const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub base_url: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub time_zone: String,
}

pub struct NotionExporter {
    http: reqwest::Client,
    tokens: ExportTokens,
    settings: ExportSettings,
}

#[derive(Debug, Deserialize)]
struct EnqueueResponse {
    #[serde(rename = "taskId")]
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TasksResponse {
    #[serde(default)]
    results: Vec<TaskResult>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    #[serde(default)]
    state: String,
    #[serde(default)]
    status: Option<TaskStatus>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    #[serde(rename = "exportURL", default)]
    export_url: Option<String>,
    #[serde(rename = "pagesExported", default)]
    pages_exported: Option<u64>,
}

impl NotionExporter {
    pub fn new(tokens: ExportTokens, settings: ExportSettings) -> Self {
        let settings = ExportSettings {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            ..settings
        };
        Self {
            http: reqwest::Client::new(),
            tokens,
            settings,
        }
    }

    fn session_cookie(&self) -> String {
        format!(
            "token_v2={}; file_token={}",
            self.tokens.token_v2, self.tokens.file_token
        )
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
        id: &PageIdentifier,
    ) -> Result<T> {
        let url = format!("{}/api/v3/{}", self.settings.base_url, endpoint);
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::COOKIE, self.session_cookie())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, url = %url, "Failed to reach export endpoint");
                ArchiveError::remote("export", id.as_str(), e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            error!(status = %status, url = %url, "Export endpoint returned error. Response body: {text}");
            return Err(ArchiveError::remote(
                "export",
                id.as_str(),
                format!("{endpoint}: HTTP {status}: {text}"),
            ));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = ?e, url = %url, "Failed to decode export endpoint JSON");
            ArchiveError::remote("export", id.as_str(), e)
        })
    }

    async fn enqueue(&self, id: &PageIdentifier) -> Result<String> {
        let body = json!({
            "task": {
                "eventName": "exportBlock",
                "request": {
                    "block": { "id": id.as_str() },
                    "recursive": true,
                    "exportOptions": {
                        "exportType": "pdf",
                        "timeZone": self.settings.time_zone,
                        "locale": "en",
                        "collectionViewExportType": "currentView",
                        "includeContents": "no_files"
                    }
                }
            }
        });
        let queued: EnqueueResponse = self.post_json("enqueueTask", body, id).await?;
        info!(page_id = %id, task_id = %queued.task_id, "Export task enqueued");
        Ok(queued.task_id)
    }

    async fn wait_for_export_url(&self, id: &PageIdentifier, task_id: &str) -> Result<String> {
        let deadline = tokio::time::Instant::now() + self.settings.timeout;
        loop {
            let tasks: TasksResponse = self
                .post_json("getTasks", json!({ "taskIds": [task_id] }), id)
                .await?;

            match tasks.results.into_iter().next() {
                Some(TaskResult { state, status, .. }) if state == "success" => {
                    let status = status.unwrap_or(TaskStatus {
                        export_url: None,
                        pages_exported: None,
                    });
                    info!(task_id, pages = ?status.pages_exported, "Export task finished");
                    return status.export_url.ok_or_else(|| {
                        error!(task_id, "Export task succeeded without an export URL");
                        ArchiveError::remote(
                            "export",
                            id.as_str(),
                            "task finished without exportURL",
                        )
                    });
                }
                Some(TaskResult { state, error: e, .. }) if state == "failure" => {
                    let message = e.unwrap_or_else(|| "export task failed".to_string());
                    error!(task_id, message = %message, "Export task failed");
                    return Err(ArchiveError::remote("export", id.as_str(), message));
                }
                Some(task) => debug!(task_id, state = %task.state, "Export task pending"),
                None => debug!(task_id, "Export task not visible yet"),
            }

            if tokio::time::Instant::now() >= deadline {
                error!(task_id, timeout = ?self.settings.timeout, "Export task timed out");
                return Err(ArchiveError::remote(
                    "export",
                    id.as_str(),
                    format!("task {task_id} did not finish within {:?}", self.settings.timeout),
                ));
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    async fn download(&self, id: &PageIdentifier, export_url: &str) -> Result<Vec<u8>> {
        info!(page_id = %id, "Downloading export archive");
        let response = self
            .http
            .get(export_url)
            .header(
                reqwest::header::COOKIE,
                format!("file_token={}", self.tokens.file_token),
            )
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Failed to download export archive");
                ArchiveError::remote("download export", id.as_str(), e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Export download returned error");
            return Err(ArchiveError::remote(
                "download export",
                id.as_str(),
                format!("HTTP {status}"),
            ));
        }
        let bytes = response.bytes().await.map_err(|e| {
            error!(error = ?e, "Failed to read export archive body");
            ArchiveError::remote("download export", id.as_str(), e)
        })?;
        debug!(page_id = %id, size = bytes.len(), "Export archive downloaded");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Exporter for NotionExporter {
    async fn export_page(&self, id: &PageIdentifier, staging_dir: &Path) -> Result<()> {
        let task_id = self.enqueue(id).await?;
        let export_url = self.wait_for_export_url(id, &task_id).await?;
        let archive = self.download(id, &export_url).await?;
        let written = extract_flat(&archive, staging_dir).map_err(|e| {
            error!(error = ?e, dir = %staging_dir.display(), "Failed to unpack export archive");
            e
        })?;
        info!(page_id = %id, files = written, dir = %staging_dir.display(), "Export unpacked");
        Ok(())
    }
}

/// Unpack a zip archive into `dest` without its directory tree; nested zips are unpacked too.
/// Returns the number of files written.
pub fn extract_flat(archive: &[u8], dest: &Path) -> Result<usize> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| ArchiveError::remote("unpack export", dest.display().to_string(), e))?;

    let mut written = 0;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| ArchiveError::remote("unpack export", dest.display().to_string(), e))?;
        if entry.is_dir() {
            continue;
        }
        let Some(name) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_owned()))
        else {
            warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| ArchiveError::io(format!("reading archive entry {}", entry.name()), e))?;

        if Path::new(&name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
        {
            written += extract_flat(&contents, dest)?;
            continue;
        }

        let target = dest.join(&name);
        fs::write(&target, &contents)
            .map_err(|e| ArchiveError::io(format!("writing {}", target.display()), e))?;
        written += 1;
    }
    Ok(written)
}

/// Largest `.pdf` below `dir`, searched recursively.
///
/// The primary document is assumed to be larger than any embedded or auxiliary PDF.
/// This is a heuristic, not a guarantee.
pub fn select_largest_pdf(dir: &Path) -> Result<Option<PathBuf>> {
    fn visit(dir: &Path, best: &mut Option<(u64, PathBuf)>) -> Result<()> {
        let entries = fs::read_dir(dir)
            .map_err(|e| ArchiveError::io(format!("listing {}", dir.display()), e))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| ArchiveError::io(format!("listing {}", dir.display()), e))?;
            let path = entry.path();
            let meta = entry
                .metadata()
                .map_err(|e| ArchiveError::io(format!("stat {}", path.display()), e))?;
            if meta.is_dir() {
                visit(&path, best)?;
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
                && best.as_ref().map_or(true, |(size, _)| meta.len() > *size)
            {
                *best = Some((meta.len(), path));
            }
        }
        Ok(())
    }

    let mut best = None;
    visit(dir, &mut best)?;
    if let Some((size, path)) = &best {
        debug!(path = %path.display(), size, "Selected largest PDF");
    }
    Ok(best.map(|(_, path)| path))
}
