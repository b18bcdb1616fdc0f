//! Crawler module: discovery scheduling and fetch execution
//!
//! This module contains the core crawl pipeline, including:
//! - Discovery query construction and provider fan-out ([`CrawlScheduler`])
//! - Seed merge, filtering and seed → task conversion
//! - The polite, budgeted fetch loop ([`CrawlWorker`])
//! - The HTTP transport seam ([`FetchTransport`])

mod fetcher;
mod politeness;
mod queries;
mod scheduler;
mod seeds;
mod task;
mod worker;

pub use fetcher::{
    build_http_client, is_html, read_budgeted, BodyStream, FetchError, FetchOptions,
    FetchResponse, FetchTransport, ReqwestTransport,
};
pub use politeness::{HostPacer, SeenSet};
pub use queries::{
    build_queries, TAG_COMPETITOR, TAG_FOCUS, TAG_KEYWORD, TAG_OPS, TAG_PLATFORM, TAG_RFQ,
};
pub use scheduler::{CrawlScheduler, DiscoveryReport};
pub use seeds::{merge_seeds, seed_to_task, QueryHits, SeedFilter};
pub use task::{
    CrawlResult, CrawlStatus, CrawlTask, HttpMeta, LeadCandidate, LeadSeed, SeedSource,
    TaskFailure,
};
pub use worker::{CrawlWorker, CrawlWorkerBuilder, ResultCallback, WorkerSettings};
