//! Request broker orchestration.
//!
//! Owns the submission queue and the single worker task that serializes all
//! outbound calls. Serialization is the mechanism that enforces the rate
//! limit: at most one request is ever in flight, and the worker sleeps out
//! the persisted per-category cool-down before each call.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;

use crate::category::Category;
use crate::cooldown::{CooldownStore, RedbCooldownStore, StoreError, cooldown_hint};
use crate::pending::{CallError, CallResult, PendingRequest, Resolver, pending_pair};
use crate::transport::{ReqwestTransport, Transport, TransportError, TransportRequest};

/// Minimum spacing before the first-ever call of a cold category, guarding
/// against bursts right after process start.
const COLD_START_FLOOR: Duration = Duration::from_millis(1_000);

const DEFAULT_STORE_PATH: &str = "aoc-cooldowns.redb";

/// Result alias for broker construction.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors raised while constructing a broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("cool-down store initialisation failed: {0}")]
    Store(#[from] StoreError),
    #[error("transport initialisation failed: {0}")]
    Transport(#[from] TransportError),
}

/// One queue entry: the opaque request, its rate-limit category, and the
/// writing end of the caller's handle.
struct QueuedRequest {
    request: TransportRequest,
    category: Category,
    resolver: Resolver,
}

/// Fluent builder for [`RequestBroker`].
pub struct RequestBrokerBuilder {
    store_path: PathBuf,
    store: Option<Arc<dyn CooldownStore>>,
    transport: Option<Arc<dyn Transport>>,
}

impl RequestBrokerBuilder {
    pub fn new() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            store: None,
            transport: None,
        }
    }

    /// Path of the default redb cool-down store. Ignored when a store is
    /// injected via [`with_store`](Self::with_store).
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_store(mut self, store: Arc<dyn CooldownStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the broker and spawns its worker task on the current runtime.
    pub fn build(self) -> BrokerResult<RequestBroker> {
        let store: Arc<dyn CooldownStore> = match self.store {
            Some(store) => store,
            None => Arc::new(RedbCooldownStore::open(&self.store_path)?),
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        Ok(RequestBroker::start(store, transport))
    }
}

impl Default for RequestBrokerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializing broker for rate-limited outbound requests.
///
/// Constructed once at startup and passed (or cloned) to callers; clones
/// share the same queue and worker. Submissions never block: callers receive
/// a [`PendingRequest`] immediately and await it for the result. Requests are
/// serviced strictly in submission order, across all categories.
#[derive(Clone)]
pub struct RequestBroker {
    queue: UnboundedSender<QueuedRequest>,
}

impl RequestBroker {
    /// Obtain a builder to customise the broker instance.
    pub fn builder() -> RequestBrokerBuilder {
        RequestBrokerBuilder::new()
    }

    fn start(store: Arc<dyn CooldownStore>, transport: Arc<dyn Transport>) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker(rx, store, transport));
        Self { queue }
    }

    /// Enqueues a request and returns its result handle.
    ///
    /// If the worker is gone the handle resolves immediately with
    /// [`CallError::BrokerClosed`]; it never hangs.
    pub fn submit(&self, request: TransportRequest, category: Category) -> PendingRequest {
        let (resolver, handle) = pending_pair(category);
        let item = QueuedRequest {
            request,
            category,
            resolver,
        };
        // On send failure the item (and its resolver) is dropped, which
        // resolves the handle with BrokerClosed.
        let _ = self.queue.send(item);
        handle
    }
}

async fn worker(
    mut queue: UnboundedReceiver<QueuedRequest>,
    store: Arc<dyn CooldownStore>,
    transport: Arc<dyn Transport>,
) {
    while let Some(item) = queue.recv().await {
        log::debug!("next api request: {}", item.category);
        let outcome = service(store.as_ref(), transport.as_ref(), &item.request, item.category).await;
        // Every dequeued item resolves exactly once, success or failure;
        // Resolver::drop backstops any path missed here.
        item.resolver.resolve(outcome);
    }
}

/// Handles one dequeued request: cool-down wait, transport call, cool-down
/// update.
async fn service(
    store: &dyn CooldownStore,
    transport: &dyn Transport,
    request: &TransportRequest,
    category: Category,
) -> CallResult {
    let wait = remaining_cooldown(store, category);
    if !wait.is_zero() {
        log::info!("waiting {}ms before {} request", wait.as_millis(), category);
        sleep(wait).await;
    }

    let response = match transport.execute(request).await {
        Ok(response) => response,
        Err(err) => {
            log::warn!("{} request failed: {err}", category);
            return Err(CallError::Transport(err.to_string()));
        }
    };

    let cooldown = if category.carries_hint() {
        cooldown_hint(&response.body, category.default_cooldown())
    } else {
        category.default_cooldown()
    };
    record_cooldown(store, category, cooldown);

    Ok(response)
}

/// Time left before `category` may be called.
///
/// A read failure is treated as an absent record; both take the cold-start
/// floor, so persistence trouble only ever makes the broker over-cautious.
fn remaining_cooldown(store: &dyn CooldownStore, category: Category) -> Duration {
    let next_allowed = match store.next_allowed(category) {
        Ok(next) => next,
        Err(err) => {
            log::warn!("cool-down read failed for {category}: {err}");
            None
        }
    };
    match next_allowed {
        Some(next) => {
            let now = Utc::now().timestamp_millis();
            Duration::from_millis(next.saturating_sub(now).max(0) as u64)
        }
        None => COLD_START_FLOOR,
    }
}

/// Persists the category's new next-allowed timestamp, never moving it
/// backwards. A write failure is logged and skipped; the next call for the
/// category falls back to the floor, which still respects the rate limit.
fn record_cooldown(store: &dyn CooldownStore, category: Category, cooldown: Duration) {
    let now = Utc::now().timestamp_millis();
    let mut next = now.saturating_add(cooldown.as_millis().min(i64::MAX as u128) as i64);
    if let Ok(Some(existing)) = store.next_allowed(category) {
        next = next.max(existing);
    }
    if let Err(err) = store.set_next_allowed(category, next) {
        log::warn!("failed to persist cool-down for {category}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooldown::MemoryCooldownStore;
    use crate::transport::TransportResponse;
    use async_trait::async_trait;
    use http::HeaderMap;
    use std::sync::Mutex;
    use tokio::time::Instant;
    use url::Url;

    struct RecordingTransport {
        body: String,
        calls: Mutex<Vec<(Url, Instant)>>,
    }

    impl RecordingTransport {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(Url, Instant)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn execute(
            &self,
            request: &TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((request.url.clone(), Instant::now()));
            Ok(TransportResponse {
                status: 200,
                headers: HeaderMap::new(),
                body: self.body.clone(),
            })
        }
    }

    /// Fails the first call, succeeds afterwards.
    struct FlakyTransport {
        attempts: Mutex<u32>,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn execute(
            &self,
            _request: &TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            if *attempts == 1 {
                return Err(TransportError::Transport("connection reset".into()));
            }
            Ok(TransportResponse {
                status: 200,
                headers: HeaderMap::new(),
                body: "ok".to_string(),
            })
        }
    }

    fn broker_with(
        store: Arc<dyn CooldownStore>,
        transport: Arc<dyn Transport>,
    ) -> RequestBroker {
        RequestBroker::start(store, transport)
    }

    fn page(path: &str) -> TransportRequest {
        let url = Url::parse(&format!("https://adventofcode.com{path}")).unwrap();
        TransportRequest::get(url)
    }

    #[tokio::test(start_paused = true)]
    async fn cold_start_waits_the_floor() {
        let transport = RecordingTransport::new("ok");
        let broker = broker_with(Arc::new(MemoryCooldownStore::new()), transport.clone());

        let started = Instant::now();
        let mut handle = broker.submit(page("/2015/day/1"), Category::TaskPageFetch);
        handle.wait().await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1 - started >= Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn requests_are_serviced_in_submission_order() {
        let transport = RecordingTransport::new("ok");
        let broker = broker_with(Arc::new(MemoryCooldownStore::new()), transport.clone());

        let mut first = broker.submit(page("/2015/day/1"), Category::TaskPageFetch);
        let mut second = broker.submit(page("/2015/day/1/input"), Category::InputFetch);
        let mut third = broker.submit(page("/2015/day/2"), Category::TaskPageFetch);

        first.wait().await.unwrap();
        second.wait().await.unwrap();
        third.wait().await.unwrap();

        let calls = transport.calls();
        let paths: Vec<_> = calls.iter().map(|(url, _)| url.path().to_string()).collect();
        assert_eq!(paths, ["/2015/day/1", "/2015/day/1/input", "/2015/day/2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn same_category_calls_are_spaced_by_the_cooldown() {
        let transport = RecordingTransport::new("That's not the right answer");
        let broker = broker_with(Arc::new(MemoryCooldownStore::new()), transport.clone());

        let mut first = broker.submit(page("/2015/day/1/answer"), Category::Submit);
        let mut second = broker.submit(page("/2015/day/1/answer"), Category::Submit);
        first.wait().await.unwrap();
        second.wait().await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        let gap = calls[1].1 - calls[0].1;
        assert!(gap >= Duration::from_millis(4_900), "gap was {gap:?}");
        assert!(gap <= Duration::from_millis(5_500), "gap was {gap:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn one_minute_hint_extends_the_cooldown() {
        let transport =
            RecordingTransport::new("Please wait one minute before trying again.");
        let store = Arc::new(MemoryCooldownStore::new());
        let broker = broker_with(store.clone(), transport.clone());

        let before = Utc::now().timestamp_millis();
        let mut handle = broker.submit(page("/2015/day/1/answer"), Category::Submit);
        handle.wait().await.unwrap();
        let after = Utc::now().timestamp_millis();

        let next = store.next_allowed(Category::Submit).unwrap().unwrap();
        assert!(next >= before + 60_000);
        assert!(next <= after + 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_resolves_the_handle_and_the_worker_continues() {
        let transport = Arc::new(FlakyTransport {
            attempts: Mutex::new(0),
        });
        let broker = broker_with(Arc::new(MemoryCooldownStore::new()), transport);

        let mut first = broker.submit(page("/2015/day/1/input"), Category::InputFetch);
        let mut second = broker.submit(page("/2015/day/2/input"), Category::InputFetch);

        assert_eq!(
            first.wait().await,
            Err(CallError::Transport("http transport error: connection reset".into()))
        );
        let response = second.wait().await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_is_never_moved_backwards() {
        let transport = RecordingTransport::new("ok");
        let store = Arc::new(MemoryCooldownStore::new());
        let far_future = Utc::now().timestamp_millis() + 100_000;
        store
            .set_next_allowed(Category::TaskPageFetch, far_future)
            .unwrap();
        let broker = broker_with(store.clone(), transport);

        let mut handle = broker.submit(page("/2015/day/3"), Category::TaskPageFetch);
        handle.wait().await.unwrap();

        // The call happened after the stored timestamp, but the 1s default
        // cool-down lands before it, so the record must keep the later value.
        assert_eq!(
            store.next_allowed(Category::TaskPageFetch).unwrap(),
            Some(far_future)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn recorded_but_expired_category_is_not_floored() {
        let transport = RecordingTransport::new("ok");
        let store = Arc::new(MemoryCooldownStore::new());
        store.set_next_allowed(Category::TaskPageFetch, 0).unwrap();
        let broker = broker_with(store, transport.clone());

        let started = Instant::now();
        let mut handle = broker.submit(page("/2015/day/1"), Category::TaskPageFetch);
        handle.wait().await.unwrap();

        let calls = transport.calls();
        assert!(calls[0].1 - started < Duration::from_millis(500));
    }
}
