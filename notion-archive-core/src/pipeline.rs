//! Orchestration of a whole invocation: one URL after another, start to finish.
//!
//! A failing URL never stops the ones after it. Its error is written to the error
//! stream, logged, and recorded in the [`ArchiveReport`] so the caller can decide
//! on the exit status.
//!
//! # Flow per URL
//! - dry run: extract id → fetch metadata → print what would be written
//! - full run: extract id → [`ArchiveWriter::archive`] → [`GitRepository::commit_artifact`]

use std::io::Write;
use std::path::PathBuf;

use tracing::{error, info, info_span, Instrument};

use crate::archive::ArchiveWriter;
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::export::Exporter;
use crate::git::{CommitOutcome, GitRepository};
use crate::identifier::{extract_page_id, PageIdentifier};
use crate::metadata::{MetadataClient, PageMetadata};

/// Where human-readable status lines go.
pub struct Console<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl Console<'_> {
    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}").map_err(|e| ArchiveError::io("writing status", e))
    }

    fn failure(&mut self, url: &str, error: &ArchiveError) -> Result<()> {
        writeln!(self.err, "[error] {url}: {error}")
            .map_err(|e| ArchiveError::io("writing status", e))
    }
}

#[derive(Debug)]
pub enum PageOutcome {
    /// Dry run: metadata resolved, nothing written.
    Previewed {
        metadata: PageMetadata,
        destination: PathBuf,
    },
    Archived {
        path: PathBuf,
        title: String,
        commit: CommitOutcome,
    },
    Failed {
        error: ArchiveError,
    },
}

#[derive(Debug)]
pub struct PageReport {
    pub url: String,
    pub id: Option<PageIdentifier>,
    pub outcome: PageOutcome,
}

#[derive(Debug)]
pub struct ArchiveReport {
    pub dry_run: bool,
    pub pages: Vec<PageReport>,
}

impl ArchiveReport {
    pub fn failures(&self) -> impl Iterator<Item = &PageReport> {
        self.pages
            .iter()
            .filter(|p| matches!(p.outcome, PageOutcome::Failed { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn succeeded_count(&self) -> usize {
        self.pages.len() - self.failed_count()
    }
}

pub fn commit_message(title: &str) -> String {
    format!("backup: upload notes of - {title}")
}

/// Resolve metadata for every URL without writing anything.
pub async fn preview_urls<M>(
    config: &ArchiveConfig,
    metadata: &M,
    urls: &[String],
    console: &mut Console<'_>,
) -> Result<ArchiveReport>
where
    M: MetadataClient,
{
    let mut pages = Vec::with_capacity(urls.len());
    for url in urls {
        let span = info_span!("preview", url = %url);
        let mut id = None;
        let step = async {
            let page_id = extract_page_id(url)?;
            id = Some(page_id.clone());
            let meta = metadata.fetch_metadata(&page_id).await?;
            Ok::<_, ArchiveError>((page_id, meta))
        }
        .instrument(span)
        .await;

        let report = match step {
            Ok((id, meta)) => {
                let destination = config
                    .output_dir()
                    .join(format!("{}.pdf", meta.file_stem()));
                console.line(&format!("[dry-run] page_id={id}"))?;
                console.line(&format!("[dry-run] title={}", meta.title))?;
                console.line(&format!("[dry-run] created_date={}", meta.created_display()))?;
                console.line(&format!("[dry-run] target={}\n", destination.display()))?;
                PageReport {
                    url: url.clone(),
                    id: Some(id),
                    outcome: PageOutcome::Previewed {
                        metadata: meta,
                        destination,
                    },
                }
            }
            Err(e) => failed(url, id, e, console)?,
        };
        pages.push(report);
    }
    Ok(ArchiveReport {
        dry_run: true,
        pages,
    })
}

/// Export, archive and commit every URL in order.
pub async fn archive_urls<E, M>(
    config: &ArchiveConfig,
    exporter: &E,
    metadata: &M,
    urls: &[String],
    push: bool,
    console: &mut Console<'_>,
) -> Result<ArchiveReport>
where
    E: Exporter,
    M: MetadataClient,
{
    let writer = ArchiveWriter::new(exporter, metadata, &config.target_repo, &config.target_subdir);
    let repo = GitRepository::open(&config.target_repo);
    let remote = push.then_some(config.remote.as_str());

    let mut pages = Vec::with_capacity(urls.len());
    for url in urls {
        let span = info_span!("archive", url = %url);
        let mut id = None;
        let step = async {
            let page_id = extract_page_id(url)?;
            id = Some(page_id.clone());
            let archived = writer.archive(&page_id).await?;
            if archived.replaced {
                console.line(&format!("[warn] replacing existing {}", archived.path.display()))?;
            }
            console.line(&format!("[ok] saved: {}", archived.path.display()))?;

            let message = commit_message(&archived.metadata.title);
            let commit = repo.commit_artifact(
                &config.identity,
                &config.branch,
                &archived.path,
                &message,
                remote,
            )?;
            if commit.committed {
                console.line(&format!("[git] committed: {message}"))?;
            } else {
                console.line("[git] no changes to commit")?;
            }
            if commit.pushed {
                console.line(&format!("[git] pushed {}/{}", config.remote, config.branch))?;
            }
            Ok::<_, ArchiveError>((archived, commit))
        }
        .instrument(span)
        .await;

        let report = match step {
            Ok((archived, commit)) => {
                info!(
                    url = %url,
                    path = %archived.path.display(),
                    committed = commit.committed,
                    replaced = archived.replaced,
                    "Page archived"
                );
                PageReport {
                    url: url.clone(),
                    id,
                    outcome: PageOutcome::Archived {
                        path: archived.path,
                        title: archived.metadata.title,
                        commit,
                    },
                }
            }
            Err(e) => failed(url, id, e, console)?,
        };
        pages.push(report);
    }
    Ok(ArchiveReport {
        dry_run: false,
        pages,
    })
}

fn failed(
    url: &str,
    id: Option<PageIdentifier>,
    error: ArchiveError,
    console: &mut Console<'_>,
) -> Result<PageReport> {
    error!(url, error = %error, "Page processing failed");
    console.failure(url, &error)?;
    Ok(PageReport {
        url: url.to_string(),
        id,
        outcome: PageOutcome::Failed { error },
    })
}
