//! Search providers used by discovery
//!
//! Every source of candidate URLs (web search APIs, business directories,
//! import lists) sits behind [`SearchProvider`] and answers with the same
//! normalized [`SearchResult`], tagged with a [`DiscoverySource`].

use crate::config::{SourceEntry, SourceKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// One search call failed; discovery logs it and moves on
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map_or(false, |s| s.as_u16() == 429) {
            Self::RateLimited
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Kind of source a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoverySource {
    #[default]
    WebSearch,
    Directory,
    Import,
    News,
}

impl From<SourceKind> for DiscoverySource {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Imports => Self::Import,
            SourceKind::Directories => Self::Directory,
        }
    }
}

/// A discovery query
///
/// Two queries are the same query when text and region match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    /// Location label the query is scoped to, e.g. "Ontario, Canada"
    pub region: Option<String>,
    pub tags: BTreeSet<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, region: Option<String>) -> Self {
        Self {
            text: text.into(),
            region,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Key used to dedupe queries
    pub fn dedupe_key(&self) -> (String, Option<String>) {
        (
            self.text.trim().to_lowercase(),
            self.region.as_ref().map(|r| r.trim().to_lowercase()),
        )
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// One candidate URL returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// URL as returned; validated later, at seed construction
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    /// Provider-assigned relevance in `[0, 1]`
    pub relevance: f64,
    pub provider_id: String,
    pub source: DiscoverySource,
    pub tags: BTreeSet<String>,
}

impl SearchResult {
    pub fn new(url: impl Into<String>, relevance: f64, provider_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            snippet: None,
            relevance: if relevance.is_nan() {
                0.0
            } else {
                relevance.clamp(0.0, 1.0)
            },
            provider_id: provider_id.into(),
            source: DiscoverySource::default(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_source(mut self, source: DiscoverySource) -> Self {
        self.source = source;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// A pluggable source of search results
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Whether free-plan discovery may use this provider
    fn is_free_tier_eligible(&self) -> bool;

    /// Per-minute call ceiling the provider asks for, if any
    fn max_per_minute(&self) -> Option<u32> {
        None
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, ProviderError>;
}

/// Answers every query with a fixed URL list from configuration
#[derive(Debug, Clone)]
pub struct StaticSeedProvider {
    id: String,
    source: DiscoverySource,
    free_tier: bool,
    max_per_minute: Option<u32>,
    relevance: f64,
    tags: Vec<String>,
    urls: Vec<String>,
}

impl StaticSeedProvider {
    pub fn from_entry(entry: &SourceEntry) -> Self {
        Self {
            id: entry.id.clone(),
            source: entry.kind.into(),
            free_tier: entry.free_tier,
            max_per_minute: entry.max_per_minute,
            relevance: entry.relevance,
            tags: entry.tags.clone(),
            urls: entry.urls.clone(),
        }
    }
}

#[async_trait]
impl SearchProvider for StaticSeedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_free_tier_eligible(&self) -> bool {
        self.free_tier
    }

    fn max_per_minute(&self) -> Option<u32> {
        self.max_per_minute
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<SearchResult>, ProviderError> {
        Ok(self
            .urls
            .iter()
            .map(|url| {
                self.tags.iter().fold(
                    SearchResult::new(url.clone(), self.relevance, self.id.clone())
                        .with_source(self.source),
                    |result, tag| result.with_tag(tag.clone()),
                )
            })
            .collect())
    }
}
