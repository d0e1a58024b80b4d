//! Page metadata: title and creation date, fetched from the public Notion API.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::error::{ArchiveError, Result};
use crate::identifier::PageIdentifier;

pub const NOTION_VERSION: &str = "2022-06-28";
pub const UNTITLED: &str = "untitled";

/// Title and creation date of one page; only used to name the archived file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub created: NaiveDate,
}

impl PageMetadata {
    /// Creation date as `dd/mm/yyyy`.
    pub fn created_display(&self) -> String {
        self.created.format("%d/%m/%Y").to_string()
    }

    /// Slug used as the archived file name (without extension).
    pub fn file_stem(&self) -> String {
        slugify(&format!("{}-{}", self.title, self.created_display()))
    }
}

/// Source of page metadata. Implemented over HTTP by [`NotionApiClient`] and mocked in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn fetch_metadata(&self, id: &PageIdentifier) -> Result<PageMetadata>;
}

/// Subset of the page object returned by `GET /v1/pages/{id}`.
#[derive(Debug, Deserialize)]
pub struct Page {
    pub created_time: String,
    #[serde(default)]
    pub properties: HashMap<String, PageProperty>,
}

#[derive(Debug, Deserialize)]
pub struct PageProperty {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<Vec<RichText>>,
}

#[derive(Debug, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

impl Page {
    pub fn metadata(&self) -> Result<PageMetadata> {
        Ok(PageMetadata {
            title: page_title(self),
            created: created_date(&self.created_time)?,
        })
    }
}

/// Concatenate the plain-text runs of the title property, `"untitled"` when empty.
///
/// Plain pages key their title property `title`; database rows may name it anything,
/// so the first property of type `title` is used as a fallback.
pub fn page_title(page: &Page) -> String {
    let property = page.properties.get("title").or_else(|| {
        page.properties
            .values()
            .find(|p| p.kind.as_deref() == Some("title"))
    });

    let title: String = property
        .and_then(|p| p.title.as_ref())
        .map(|runs| runs.iter().map(|r| r.plain_text.as_str()).collect())
        .unwrap_or_default();

    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    }
}

/// Parse an ISO-8601 creation timestamp (`Z` meaning UTC) into its calendar date.
pub fn created_date(timestamp: &str) -> Result<NaiveDate> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.date_naive())
        .map_err(|e| {
            error!(error = ?e, timestamp, "Unparseable created_time");
            ArchiveError::remote("parse created_time", timestamp, e)
        })
}

/// Filesystem-safe slug: lowercase, runs of non-alphanumerics collapse to one `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        UNTITLED.to_string()
    } else {
        slug
    }
}

/// Metadata client over the public Notion REST API.
pub struct NotionApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl NotionApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub async fn retrieve_page(&self, id: &PageIdentifier) -> Result<Page> {
        let url = format!("{}/v1/pages/{}", self.base_url, id);
        info!(page_id = %id, url = %url, "Fetching page metadata");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, url = %url, "Failed to reach Notion API");
                ArchiveError::remote("retrieve page", id.as_str(), e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            error!(status = %status, url = %url, "Notion API returned error. Response body: {body}");
            return Err(ArchiveError::remote(
                "retrieve page",
                id.as_str(),
                format!("HTTP {status}: {body}"),
            ));
        }

        let page = response.json::<Page>().await.map_err(|e| {
            error!(error = ?e, url = %url, "Failed to decode page JSON");
            ArchiveError::remote("retrieve page", id.as_str(), e)
        })?;
        debug!(page_id = %id, properties = page.properties.len(), "Page retrieved");
        Ok(page)
    }
}

#[async_trait]
impl MetadataClient for NotionApiClient {
    async fn fetch_metadata(&self, id: &PageIdentifier) -> Result<PageMetadata> {
        let metadata = self.retrieve_page(id).await?.metadata()?;
        info!(
            page_id = %id,
            title = %metadata.title,
            created = %metadata.created,
            "Page metadata resolved"
        );
        Ok(metadata)
    }
}
