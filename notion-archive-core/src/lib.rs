#![doc = "notion-archive-core: core logic library for notion-archive."]

//! Everything needed to back up Notion pages as PDFs into a git repository:
//! page id parsing, metadata lookups, the PDF export exchange, moving the export
//! into place and committing it. The `notion-archive` binary is only CLI glue on top.
//!
//! # Navigation
//! - Entry points: [`pipeline::archive_urls`], [`pipeline::preview_urls`]
//! - Seams for tests: [`export::Exporter`], [`metadata::MetadataClient`]

pub mod archive;
pub mod config;
pub mod error;
pub mod export;
pub mod git;
pub mod identifier;
pub mod metadata;
pub mod pipeline;

pub use error::{ArchiveError, Result};
