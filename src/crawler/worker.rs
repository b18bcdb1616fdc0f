//! Crawl worker - pull loop that turns queued tasks into results
//!
//! A worker owns its task queue, its "seen" set and its per-host pacer. Each
//! of its `concurrency` loops claims the highest-priority ready task, fetches
//! it within the task's time and byte budgets, extracts signals and emits
//! exactly one [`CrawlResult`] per claimed task.

use crate::compliance::{ComplianceGate, DefaultCompliance, RobotsCache, RobotsVerdict};
use crate::config::{Config, PlansConfig};
use crate::crawler::fetcher::{is_html, read_budgeted, FetchError, FetchOptions, FetchTransport};
use crate::crawler::politeness::{HostPacer, SeenSet};
use crate::crawler::task::{
    CrawlResult, CrawlStatus, CrawlTask, HttpMeta, LeadCandidate, TaskFailure,
};
use crate::feedback::FeedbackLogger;
use crate::queue::TaskQueue;
use crate::signals::SignalExtractor;
use crate::url::host_key;
use crate::LeadError;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use url::Url;

/// Excerpt length for plans that do not configure one
const DEFAULT_EXCERPT_CHARS: usize = 500;

/// Called once per terminal task outcome
pub type ResultCallback = Arc<dyn Fn(CrawlResult) + Send + Sync>;

/// Worker tuning taken from `[crawler]` and `[plans]`
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub per_host_delay: Duration,
    pub default_timeout_ms: u64,
    pub max_redirects: usize,
    pub concurrency: usize,
    pub seen_capacity: usize,
    pub respect_robots: bool,
    pub plans: PlansConfig,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            per_host_delay: Duration::from_millis(1000),
            default_timeout_ms: 15_000,
            max_redirects: 5,
            concurrency: 1,
            seen_capacity: 100_000,
            respect_robots: true,
            plans: PlansConfig::default(),
        }
    }
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        let crawler = &config.crawler;
        Self {
            per_host_delay: Duration::from_millis(crawler.per_host_delay_ms),
            default_timeout_ms: crawler.default_timeout_ms,
            max_redirects: crawler.max_redirects,
            concurrency: crawler.concurrency.max(1),
            seen_capacity: crawler.seen_capacity,
            respect_robots: crawler.respect_robots,
            plans: config.plans.clone(),
        }
    }
}

/// Builds a [`CrawlWorker`] around a fetch transport
pub struct CrawlWorkerBuilder {
    settings: WorkerSettings,
    transport: Arc<dyn FetchTransport>,
    compliance: Arc<dyn ComplianceGate>,
    robots: Option<Arc<RobotsCache>>,
    extractor: Arc<SignalExtractor>,
    feedback: FeedbackLogger,
    on_result: Option<ResultCallback>,
}

impl CrawlWorkerBuilder {
    pub fn new(settings: WorkerSettings, transport: Arc<dyn FetchTransport>) -> Self {
        Self {
            settings,
            transport,
            compliance: Arc::new(DefaultCompliance::new()),
            robots: None,
            extractor: Arc::new(SignalExtractor::default()),
            feedback: FeedbackLogger::disabled(),
            on_result: None,
        }
    }

    pub fn compliance(mut self, compliance: Arc<dyn ComplianceGate>) -> Self {
        self.compliance = compliance;
        self
    }

    /// Robots.txt lookups; without a cache every URL counts as allowed
    pub fn robots(mut self, robots: Arc<RobotsCache>) -> Self {
        self.robots = Some(robots);
        self
    }

    pub fn extractor(mut self, extractor: Arc<SignalExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn feedback(mut self, feedback: FeedbackLogger) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn on_result(mut self, callback: impl Fn(CrawlResult) + Send + Sync + 'static) -> Self {
        self.on_result = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> CrawlWorker {
        let state = WorkerState {
            queue: TaskQueue::new(),
            seen: SeenSet::new(self.settings.seen_capacity),
            active: 0,
        };

        CrawlWorker {
            inner: Arc::new(WorkerInner {
                pacer: HostPacer::new(self.settings.per_host_delay),
                settings: self.settings,
                transport: self.transport,
                compliance: self.compliance,
                robots: self.robots,
                extractor: self.extractor,
                feedback: self.feedback,
                on_result: self.on_result,
                state: Mutex::new(state),
                work: Notify::new(),
                idle: Notify::new(),
                started: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
            }),
            handles: Mutex::new(Vec::new()),
        }
    }
}

struct WorkerState {
    queue: TaskQueue<CrawlTask>,
    seen: SeenSet,
    /// Tasks claimed but not yet emitted
    active: usize,
}

struct WorkerInner {
    settings: WorkerSettings,
    transport: Arc<dyn FetchTransport>,
    compliance: Arc<dyn ComplianceGate>,
    robots: Option<Arc<RobotsCache>>,
    extractor: Arc<SignalExtractor>,
    feedback: FeedbackLogger,
    on_result: Option<ResultCallback>,
    pacer: HostPacer,
    state: Mutex<WorkerState>,
    work: Notify,
    idle: Notify,
    started: AtomicBool,
    stopping: AtomicBool,
}

/// Fetches queued [`CrawlTask`]s and reports a [`CrawlResult`] for each
pub struct CrawlWorker {
    inner: Arc<WorkerInner>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl CrawlWorker {
    pub fn builder(settings: WorkerSettings, transport: Arc<dyn FetchTransport>) -> CrawlWorkerBuilder {
        CrawlWorkerBuilder::new(settings, transport)
    }

    /// Queues `task` unless its dedupe key was seen before
    ///
    /// Returns false for duplicates. The seen set outlives the queue entry,
    /// so a URL is fetched at most once while its key stays in the set.
    pub fn enqueue(&self, task: CrawlTask) -> bool {
        let accepted = {
            let mut state = self.inner.lock_state();
            if !state.seen.insert(&task.dedupe_key) {
                false
            } else {
                state.queue.push(task)
            }
        };

        if accepted {
            self.inner.work.notify_one();
        }
        accepted
    }

    /// Spawns the pull loops
    ///
    /// # Errors
    ///
    /// Returns `LeadError::WorkerRunning` if the worker was already started.
    pub fn start(&self) -> Result<(), LeadError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(LeadError::WorkerRunning);
        }

        let concurrency = self.inner.settings.concurrency.max(1);
        tracing::info!(concurrency, "Starting crawl worker");

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for loop_id in 0..concurrency {
            let inner = Arc::clone(&self.inner);
            handles.push(tokio::spawn(run_loop(inner, loop_id)));
        }
        Ok(())
    }

    /// Stops picking up new tasks; in-flight tasks finish normally
    pub fn stop(&self) {
        self.inner.stopping.store(true, Ordering::SeqCst);
        self.inner.work.notify_waiters();
        self.inner.idle.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst) && !self.inner.stopping.load(Ordering::SeqCst)
    }

    /// Waits for every pull loop to exit after [`stop`](Self::stop)
    pub async fn join(&self) {
        let handles: Vec<_> = {
            let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            handles.drain(..).collect()
        };

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Crawl loop ended abnormally");
            }
        }
    }

    /// Resolves once the queue is empty and no task is in flight
    ///
    /// Also resolves when the worker is stopping. Tasks delayed by
    /// `not_before` keep the worker busy until they have run.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            {
                let state = self.inner.lock_state();
                if (state.queue.is_empty() && state.active == 0)
                    || self.inner.stopping.load(Ordering::SeqCst)
                {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Tasks waiting in the queue
    pub fn queued(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    /// Tasks waiting in the queue for `org_id`, or all of them
    pub fn backlog(&self, org_id: Option<&str>) -> usize {
        self.inner.lock_state().queue.size(org_id)
    }
}

enum Claim {
    Task(CrawlTask),
    Wait(Option<DateTime<Utc>>),
}

async fn run_loop(inner: Arc<WorkerInner>, loop_id: usize) {
    tracing::debug!(loop_id, "Crawl loop started");

    loop {
        let notified = inner.work.notified();
        if inner.stopping.load(Ordering::SeqCst) {
            break;
        }

        let claim = {
            let mut state = inner.lock_state();
            match state.queue.pop_ready(Utc::now()) {
                Some(task) => {
                    state.active += 1;
                    Claim::Task(task)
                }
                None => Claim::Wait(state.queue.next_not_before()),
            }
        };

        match claim {
            Claim::Task(task) => {
                let result = inner.process(task).await;
                inner.emit(result);

                let idle = {
                    let mut state = inner.lock_state();
                    state.active = state.active.saturating_sub(1);
                    state.active == 0 && state.queue.is_empty()
                };
                if idle {
                    inner.idle.notify_waiters();
                }
            }
            Claim::Wait(Some(at)) => {
                let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::select! {
                    _ = notified => {}
                    _ = tokio::time::sleep(wait) => {}
                }
            }
            Claim::Wait(None) => notified.await,
        }
    }

    tracing::debug!(loop_id, "Crawl loop stopped");
}

struct FetchedPage {
    http: HttpMeta,
    final_url: Url,
    html: String,
}

type FetchOutcome = Result<FetchedPage, (TaskFailure, Option<HttpMeta>)>;

impl WorkerInner {
    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one task to a result; panics become `error` results
    async fn process(&self, task: CrawlTask) -> CrawlResult {
        let started_at = Utc::now();

        match AssertUnwindSafe(self.execute(&task, started_at))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(url = %task.url, error = %message, "Crawl task panicked");
                CrawlResult::failed(&task, &TaskFailure::Panicked(message), None, started_at)
            }
        }
    }

    async fn execute(&self, task: &CrawlTask, started_at: DateTime<Utc>) -> CrawlResult {
        let Some(host) = task.url.host_str().map(host_key) else {
            let failure = TaskFailure::InvalidTask("URL has no host".to_string());
            return CrawlResult::failed(task, &failure, None, started_at);
        };

        let verdict = match (&self.robots, self.settings.respect_robots) {
            (Some(robots), true) => robots.check(&task.url).await,
            _ => RobotsVerdict::UNKNOWN,
        };
        let robots_allowed = verdict.allowed.unwrap_or(true);

        if !self.compliance.is_crawl_allowed(robots_allowed, true) {
            let reason = if robots_allowed {
                "blocked by compliance policy"
            } else {
                "disallowed by robots.txt"
            };
            return CrawlResult::failed(
                task,
                &TaskFailure::PolicyDenied(reason.to_string()),
                None,
                started_at,
            );
        }

        let crawl_delay = verdict
            .crawl_delay
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
        let wait = self.pacer.reserve(&host, crawl_delay);
        if !wait.is_zero() {
            tracing::debug!(host = %host, wait_ms = wait.as_millis() as u64, "Politeness delay");
            tokio::time::sleep(wait).await;
        }

        let timeout_ms = if task.timeout_ms > 0 {
            task.timeout_ms
        } else {
            self.settings.default_timeout_ms
        };

        let outcome = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.fetch_page(task, timeout_ms),
        )
        .await;
        self.pacer.record(&host);

        let page = match outcome {
            Ok(Ok(page)) => page,
            Ok(Err((failure, http))) => {
                return CrawlResult::failed(task, &failure, http, started_at);
            }
            Err(_) => {
                let failure = TaskFailure::FetchTimeout { timeout_ms };
                return CrawlResult::failed(task, &failure, None, started_at);
            }
        };

        let analysis = self.extractor.analyze(&page.html, &page.final_url);
        let excerpt = self.excerpt(task, &analysis.text);

        let lead = LeadCandidate {
            company_guess: analysis.company_guess,
            website: format!("{}/", page.final_url.origin().ascii_serialization()),
            region: task.subject_region.clone(),
            signals: analysis.signals,
            tags: task.tags.clone(),
        };

        CrawlResult::ok(task, page.http, lead, excerpt, started_at)
    }

    async fn fetch_page(&self, task: &CrawlTask, timeout_ms: u64) -> FetchOutcome {
        let options = FetchOptions {
            timeout_ms,
            max_redirects: self.settings.max_redirects,
        };

        let mut response = self
            .transport
            .fetch(&task.url, options)
            .await
            .map_err(|e| (fetch_failure(e, timeout_ms), None))?;

        let mut http = HttpMeta {
            status: response.status,
            bytes: 0,
            content_type: response.content_type.clone(),
        };

        if !(200..300).contains(&response.status) {
            return Err((TaskFailure::HttpStatus(response.status), Some(http)));
        }

        if !is_html(response.content_type.as_deref()) {
            let reason = format!(
                "non-HTML content type {}",
                response.content_type.as_deref().unwrap_or_default()
            );
            return Err((TaskFailure::ContentRejected(reason), Some(http)));
        }

        let (bytes, truncated) = match read_budgeted(response.body.as_mut(), task.byte_budget).await {
            Ok(read) => read,
            Err(e) => return Err((fetch_failure(e, timeout_ms), Some(http))),
        };

        if truncated {
            tracing::debug!(url = %task.url, budget = task.byte_budget, "Body cut at byte budget");
        }

        http.bytes = bytes.len() as u64;
        Ok(FetchedPage {
            http,
            final_url: response.final_url,
            html: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Full text for paid plans; redacted and shortened for free plans
    fn excerpt(&self, task: &CrawlTask, text: &str) -> Option<String> {
        if text.is_empty() {
            return None;
        }

        let limits = self.settings.plans.limits(task.plan_tier);
        let excerpt = if task.plan_tier.is_paid() {
            match limits.excerpt_chars {
                Some(max) => truncate_chars(text, max),
                None => text.to_string(),
            }
        } else {
            let redacted = self.compliance.redact_pii(text);
            truncate_chars(&redacted, limits.excerpt_chars.unwrap_or(DEFAULT_EXCERPT_CHARS))
        };
        Some(excerpt)
    }

    fn emit(&self, result: CrawlResult) {
        match result.status() {
            CrawlStatus::Ok => tracing::info!(
                url = %result.url,
                bytes = result.http.as_ref().map_or(0, |h| h.bytes),
                duration_ms = result.duration_ms(),
                "Crawled"
            ),
            status => tracing::debug!(
                url = %result.url,
                status = %status,
                reason = result.reason.as_deref().unwrap_or_default(),
                "Crawl task did not produce a lead"
            ),
        }

        self.feedback.log(result.ingestion_event());

        if let Some(callback) = &self.on_result {
            let url = result.url.clone();
            let call = std::panic::catch_unwind(AssertUnwindSafe(|| callback(result)));
            if let Err(panic) = call {
                tracing::error!(url = %url, error = %panic_message(panic.as_ref()), "Result callback panicked");
            }
        }
    }
}

fn fetch_failure(err: FetchError, timeout_ms: u64) -> TaskFailure {
    match err {
        FetchError::Timeout(_) => TaskFailure::FetchTimeout { timeout_ms },
        FetchError::Aborted(msg) | FetchError::Transport(msg) | FetchError::Body(msg) => {
            TaskFailure::FetchAborted(msg)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// First `max` characters of `text`, never splitting a character
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
