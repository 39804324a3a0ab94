use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::action_executor::{panic_message, ActionError, ActionExecutor};
use crate::debounce::{DebounceTable, TimerOutcome};
use crate::matcher::Matcher;
use crate::model::{PolishedResult, Query, QueryType, RawResult, ResultBatch};
use crate::plugin_sdk::{ProviderRegistry, RegisteredProvider};
use crate::polisher::Polisher;
use crate::result_cache::ResultCache;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("silent query produced {0} results, expected at most one")]
    Ambiguous(usize),
    #[error("silent query did not finish within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Action(#[from] ActionError),
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub fallback_enabled: bool,
    pub use_pinyin: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            use_pinyin: false,
        }
    }
}

#[derive(Default)]
pub struct DoneSignal {
    done: Mutex<bool>,
    wake: Condvar,
    fired: AtomicUsize,
}

impl DoneSignal {
    fn fire(&self) {
        self.fired.fetch_add(1, Ordering::AcqRel);
        let mut done = self.done.lock();
        *done = true;
        self.wake.notify_all();
    }

    pub fn is_done(&self) -> bool {
        *self.done.lock()
    }

    pub fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.wake.wait(&mut done);
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut done = self.done.lock();
        while !*done {
            if self.wake.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }

    pub fn fire_count(&self) -> usize {
        self.fired.load(Ordering::Acquire)
    }
}

pub struct DispatchHandle {
    pub query: Arc<Query>,
    pub generation: u64,
    results: Receiver<ResultBatch>,
    done: Arc<DoneSignal>,
}

impl DispatchHandle {
    /// Batches in arrival order. The channel closes after the done signal.
    pub fn results(&self) -> &Receiver<ResultBatch> {
        &self.results
    }

    pub fn done(&self) -> &Arc<DoneSignal> {
        &self.done
    }

    pub fn is_done(&self) -> bool {
        self.done.is_done()
    }

    pub fn wait(&self) {
        self.done.wait();
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.done.wait_timeout(timeout)
    }

    /// Waits for completion and returns every result, batch order preserved.
    pub fn collect(self) -> Vec<PolishedResult> {
        self.done.wait();
        self.drain_available()
    }

    pub fn collect_timeout(self, timeout: Duration) -> Option<Vec<PolishedResult>> {
        if !self.done.wait_timeout(timeout) {
            return None;
        }
        Some(self.drain_available())
    }

    pub fn drain_available(&self) -> Vec<PolishedResult> {
        self.results
            .try_iter()
            .flat_map(|batch| batch.results)
            .collect()
    }
}

struct DispatchRun {
    query: Arc<Query>,
    generation: u64,
    polisher: Arc<Polisher>,
    matcher: Arc<Matcher>,
    cache: Arc<ResultCache>,
    use_pinyin: bool,
    sender: Mutex<Option<Sender<ResultBatch>>>,
    remaining: AtomicUsize,
    produced: AtomicUsize,
    fallbacks: Vec<Arc<RegisteredProvider>>,
    done: Arc<DoneSignal>,
}

impl DispatchRun {
    fn finish_one(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.complete();
        }
    }

    fn complete(&self) {
        if self.produced.load(Ordering::Acquire) == 0 && !self.fallbacks.is_empty() {
            debug!(query_id = %self.query.id, "no results, querying fallback providers");
            for provider in &self.fallbacks {
                let Some(fallback) = provider.fallback() else {
                    continue;
                };
                let raw = catch_unwind(AssertUnwindSafe(|| fallback.query_fallback(&self.query)))
                    .unwrap_or_else(|payload| {
                        self.provider_fault(provider, &panic_message(payload.as_ref()))
                    });
                self.publish(provider, raw);
            }
        }
        info!(
            query_id = %self.query.id,
            results = self.produced.load(Ordering::Acquire),
            "dispatch complete"
        );
        self.sender.lock().take();
        self.done.fire();
    }

    fn run_provider(&self, provider: &RegisteredProvider) {
        let env = provider.env_view(&self.query.env);
        let raw = catch_unwind(AssertUnwindSafe(|| provider.query(&self.query, &env)))
            .unwrap_or_else(|payload| {
                self.provider_fault(provider, &panic_message(payload.as_ref()))
            });
        self.publish(provider, raw);
        self.finish_one();
    }

    fn provider_fault(&self, provider: &RegisteredProvider, message: &str) -> Vec<RawResult> {
        warn!(provider_id = provider.id(), panic = message, "provider panicked during query");
        vec![RawResult::error(
            &format!("{} failed", provider.name()),
            message,
        )]
    }

    fn publish(&self, provider: &RegisteredProvider, raw: Vec<RawResult>) {
        let filter_text = match self.query.query_type {
            QueryType::Selection => self.query.search_text.trim(),
            QueryType::Input => "",
        };

        let mut results = Vec::with_capacity(raw.len());
        for raw_result in raw {
            if !filter_text.is_empty()
                && !raw_result.is_error
                && !self
                    .matcher
                    .matches(&raw_result.title, filter_text, self.use_pinyin)
                    .is_match
            {
                trace!(provider_id = provider.id(), title = %raw_result.title, "filtered by selection text");
                continue;
            }
            let polished = self.polisher.polish(provider, &self.query, raw_result);
            self.cache.insert(self.generation, polished.entry);
            results.push(polished.result);
        }
        if results.is_empty() {
            return;
        }

        self.produced.fetch_add(results.len(), Ordering::AcqRel);
        let batch = ResultBatch {
            query_id: self.query.id.clone(),
            provider_id: provider.id().to_string(),
            results,
        };
        if let Some(sender) = self.sender.lock().as_ref() {
            if sender.send(batch).is_err() {
                trace!(provider_id = provider.id(), "result receiver dropped");
            }
        }
    }
}

pub struct Dispatcher {
    registry: Arc<dyn ProviderRegistry>,
    polisher: Arc<Polisher>,
    matcher: Arc<Matcher>,
    cache: Arc<ResultCache>,
    debounce: DebounceTable,
    executor: ActionExecutor,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<dyn ProviderRegistry>,
        polisher: Arc<Polisher>,
        matcher: Arc<Matcher>,
        cache: Arc<ResultCache>,
        executor: ActionExecutor,
        options: DispatchOptions,
    ) -> Self {
        Self {
            registry,
            polisher,
            matcher,
            cache,
            debounce: DebounceTable::new(),
            executor,
            options,
        }
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn dispatch(&self, query: Query) -> DispatchHandle {
        let query = Arc::new(query);
        let generation = self.cache.begin_generation();
        let cancelled = self.debounce.cancel_all();
        let providers = self.registry.providers();
        info!(
            query_id = %query.id,
            raw = %query.raw_text,
            providers = providers.len(),
            cancelled,
            "dispatching query"
        );

        let fallbacks = if self.options.fallback_enabled && query.is_global() {
            providers
                .iter()
                .filter(|provider| provider.fallback().is_some())
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        let (sender, results) = mpsc::channel();
        let done = Arc::new(DoneSignal::default());
        let run = Arc::new(DispatchRun {
            query: Arc::clone(&query),
            generation,
            polisher: Arc::clone(&self.polisher),
            matcher: Arc::clone(&self.matcher),
            cache: Arc::clone(&self.cache),
            use_pinyin: self.options.use_pinyin,
            sender: Mutex::new(Some(sender)),
            remaining: AtomicUsize::new(providers.len()),
            produced: AtomicUsize::new(0),
            fallbacks,
            done: Arc::clone(&done),
        });

        if providers.is_empty() {
            run.complete();
        }

        for provider in providers {
            if !provider.is_eligible(&query) {
                trace!(provider_id = provider.id(), "provider not eligible");
                run.finish_one();
                continue;
            }

            match provider.debounce_interval() {
                Some(delay) => {
                    let run = Arc::clone(&run);
                    let debounced = Arc::clone(&provider);
                    self.debounce.arm(provider.id(), delay, move |outcome| match outcome {
                        TimerOutcome::Fired => run.run_provider(&debounced),
                        TimerOutcome::Cancelled => {
                            debug!(provider_id = debounced.id(), "debounced query superseded");
                            run.finish_one();
                        }
                    });
                }
                None => {
                    let run = Arc::clone(&run);
                    thread::spawn(move || run.run_provider(&provider));
                }
            }
        }

        DispatchHandle {
            query,
            generation,
            results,
            done,
        }
    }

    /// Runs a query to completion and invokes the default action of its
    /// only result. Returns whether an action ran.
    pub fn dispatch_silent(&self, query: Query, timeout: Duration) -> Result<bool, DispatchError> {
        let handle = self.dispatch(query);
        let query_id = handle.query.id.clone();
        let results = handle
            .collect_timeout(timeout)
            .ok_or(DispatchError::Timeout(timeout))?;

        match results.as_slice() {
            [] => {
                debug!(query_id = %query_id, "silent query produced no results");
                Ok(false)
            }
            [only] => {
                let Some(action) = only.default_action() else {
                    warn!(query_id = %query_id, title = %only.title, "silent result has no action");
                    return Ok(false);
                };
                self.executor.execute_action(&only.id, &action.id)?;
                Ok(true)
            }
            many => Err(DispatchError::Ambiguous(many.len())),
        }
    }
}
