//! Export one page into the target repository under its metadata-derived name.
//!
//! Layout inside the repository:
//! - `.export-tmp/export-<hash>/...` transient staging for one export
//! - `<subdir>/<slug>.pdf` the archived file
//!
//! The staging name is derived from the page id, so re-running the same page reuses
//! (and first clears) the same directory instead of piling up new ones. Destination
//! collisions are last-write-wins: the same page always maps to the same file, and
//! two pages sharing title and date end up in one file. Every replacement is reported
//! through [`ArchivedPage::replaced`] and a warning.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{ArchiveError, Result};
use crate::export::{select_largest_pdf, Exporter};
use crate::identifier::PageIdentifier;
use crate::metadata::{MetadataClient, PageMetadata};

pub const STAGING_ROOT: &str = ".export-tmp";

/// A page written to its final location.
#[derive(Debug, Clone)]
pub struct ArchivedPage {
    pub id: PageIdentifier,
    pub metadata: PageMetadata,
    pub path: PathBuf,
    /// An existing file at `path` was overwritten.
    pub replaced: bool,
}

pub struct ArchiveWriter<'a, E, M> {
    exporter: &'a E,
    metadata: &'a M,
    repo_root: PathBuf,
    subdir: String,
}

impl<'a, E, M> ArchiveWriter<'a, E, M>
where
    E: Exporter,
    M: MetadataClient,
{
    pub fn new(
        exporter: &'a E,
        metadata: &'a M,
        repo_root: impl Into<PathBuf>,
        subdir: impl Into<String>,
    ) -> Self {
        Self {
            exporter,
            metadata,
            repo_root: repo_root.into(),
            subdir: subdir.into(),
        }
    }

    pub fn staging_dir(&self, id: &PageIdentifier) -> PathBuf {
        self.repo_root
            .join(STAGING_ROOT)
            .join(format!("export-{}", id.short_hash()))
    }

    /// Final location of a page with the given metadata.
    pub fn destination(&self, metadata: &PageMetadata) -> PathBuf {
        self.repo_root
            .join(&self.subdir)
            .join(format!("{}.pdf", metadata.file_stem()))
    }

    /// Export, rename and move one page. The staging directory is removed afterwards
    /// whatever the outcome.
    pub async fn archive(&self, id: &PageIdentifier) -> Result<ArchivedPage> {
        let staging = self.staging_dir(id);
        prepare_staging(&staging)?;

        let result = self.export_and_move(id, &staging).await;
        cleanup_staging(&staging);
        result
    }

    async fn export_and_move(&self, id: &PageIdentifier, staging: &Path) -> Result<ArchivedPage> {
        info!(page_id = %id, staging = %staging.display(), "Exporting page");
        self.exporter.export_page(id, staging).await?;

        let staged_pdf = select_largest_pdf(staging)?.ok_or_else(|| {
            error!(page_id = %id, dir = %staging.display(), "Export produced no PDF");
            ArchiveError::ExportNotFound {
                id: id.to_string(),
                dir: staging.to_path_buf(),
            }
        })?;

        let metadata = self.metadata.fetch_metadata(id).await?;
        let dest = self.destination(&metadata);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ArchiveError::io(format!("creating {}", parent.display()), e))?;
        }

        let replaced = move_file(&staged_pdf, &dest)?;
        if replaced {
            warn!(page_id = %id, dest = %dest.display(), "Replaced existing archived file");
        }
        info!(page_id = %id, dest = %dest.display(), "Saved archived PDF");
        Ok(ArchivedPage {
            id: id.clone(),
            metadata,
            path: dest,
            replaced,
        })
    }
}

fn prepare_staging(staging: &Path) -> Result<()> {
    if staging.exists() {
        debug!(path = %staging.display(), "Clearing stale staging directory");
        fs::remove_dir_all(staging)
            .map_err(|e| ArchiveError::io(format!("clearing {}", staging.display()), e))?;
    }
    fs::create_dir_all(staging)
        .map_err(|e| ArchiveError::io(format!("creating {}", staging.display()), e))
}

fn cleanup_staging(staging: &Path) {
    if let Err(e) = fs::remove_dir_all(staging) {
        warn!(error = ?e, path = %staging.display(), "Failed to remove staging directory");
        return;
    }
    // Drop the shared staging root once the last export left it.
    if let Some(root) = staging.parent() {
        let _ = fs::remove_dir(root);
    }
}

/// Rename, falling back to copy + remove when source and destination are on different
/// filesystems. Returns whether a file already existed at `to`.
fn move_file(from: &Path, to: &Path) -> Result<bool> {
    let replaced = to.is_file();
    match fs::rename(from, to) {
        Ok(()) => Ok(replaced),
        Err(rename_err) => {
            debug!(error = ?rename_err, "Rename failed, copying instead");
            fs::copy(from, to).map_err(|e| {
                ArchiveError::io(format!("moving {} to {}", from.display(), to.display()), e)
            })?;
            fs::remove_file(from)
                .map_err(|e| ArchiveError::io(format!("removing {}", from.display()), e))?;
            Ok(replaced)
        }
    }
}
