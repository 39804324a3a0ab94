use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sift_core::action_executor::ActionExecutor;
use sift_core::collaborators::NoUsageHistory;
use sift_core::dispatcher::{DispatchError, DispatchOptions, Dispatcher};
use sift_core::matcher::Matcher;
use sift_core::model::{Action, Query, QueryEnv, RawResult, Selection};
use sift_core::plugin_sdk::{
    FallbackProvider, PluginMetadata, Provider, StaticRegistry, FEATURE_DEBOUNCE,
    FEATURE_QUERY_SELECTION,
};
use sift_core::polisher::Polisher;
use sift_core::query_dsl::parse_input;
use sift_core::result_cache::ResultCache;

const WAIT: Duration = Duration::from_secs(5);

struct Scripted<F> {
    respond: F,
    calls: AtomicUsize,
}

impl<F> Scripted<F>
where
    F: Fn(&Query) -> Vec<RawResult> + Send + Sync,
{
    fn new(respond: F) -> Arc<Self> {
        Arc::new(Self {
            respond,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> Provider for Scripted<F>
where
    F: Fn(&Query) -> Vec<RawResult> + Send + Sync,
{
    fn query(&self, query: &Query, _env: &QueryEnv) -> Vec<RawResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(query)
    }
}

struct WebSearch;

impl Provider for WebSearch {
    fn query(&self, _query: &Query, _env: &QueryEnv) -> Vec<RawResult> {
        Vec::new()
    }

    fn as_fallback(&self) -> Option<&dyn FallbackProvider> {
        Some(self)
    }
}

impl FallbackProvider for WebSearch {
    fn query_fallback(&self, query: &Query) -> Vec<RawResult> {
        vec![RawResult::new(&format!("Search the web for {}", query.search_text))]
    }
}

fn dispatcher(registry: &Arc<StaticRegistry>) -> Dispatcher {
    let cache = Arc::new(ResultCache::new());
    let polisher = Arc::new(Polisher::default());
    let executor = ActionExecutor::new(
        Arc::clone(&cache),
        registry.clone(),
        Arc::new(NoUsageHistory),
        Arc::clone(&polisher),
    );
    Dispatcher::new(
        registry.clone(),
        polisher,
        Arc::new(Matcher::default()),
        cache,
        executor,
        DispatchOptions::default(),
    )
}

/// Deterministic xorshift so failures are reproducible from the seed.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0 % bound
    }
}

#[test]
fn completion_fires_once_after_every_provider_reports() {
    for seed in 1..=20u64 {
        let mut rng = XorShift(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let registry = Arc::new(StaticRegistry::new());
        let mut providers = Vec::new();

        for index in 0..8 {
            let delay = Duration::from_millis(rng.next(15));
            let provider = Scripted::new(move |_query: &Query| {
                thread::sleep(delay);
                vec![RawResult::new(&format!("result {index}"))]
            });
            let mut metadata = PluginMetadata::new(&format!("p{index}"), &["*"]);
            if rng.next(3) == 0 {
                let interval = (rng.next(10) + 1).to_string();
                metadata = metadata.with_feature(FEATURE_DEBOUNCE, &[("intervalMs", interval.as_str())]);
            }
            registry.register(metadata, provider.clone());
            providers.push(provider);
        }
        // Not eligible for global queries, still part of the count.
        registry.register(
            PluginMetadata::new("keyword-only", &["k"]),
            Scripted::new(|_query: &Query| vec![RawResult::new("never")]),
        );

        let dispatcher = dispatcher(&registry);
        let handle = dispatcher.dispatch(Query::input("anything"));
        assert!(handle.wait_timeout(WAIT), "seed {seed} never completed");
        assert!(providers.iter().all(|provider| provider.calls() == 1), "seed {seed}");

        let done = Arc::clone(handle.done());
        let results = handle.collect();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(done.fire_count(), 1, "seed {seed}");
        assert_eq!(results.len(), 8, "seed {seed}");
    }
}

#[test]
fn empty_registry_completes_immediately() {
    let registry = Arc::new(StaticRegistry::new());
    let dispatcher = dispatcher(&registry);
    let handle = dispatcher.dispatch(Query::input("x"));
    assert!(handle.is_done());
    assert!(handle.collect().is_empty());
}

#[test]
fn trigger_keyword_routes_to_its_provider_only() {
    let registry = Arc::new(StaticRegistry::new());
    let google = Scripted::new(|_query: &Query| vec![RawResult::new("from google")]);
    let apps = Scripted::new(|_query: &Query| vec![RawResult::new("from apps")]);
    registry.register(PluginMetadata::new("google", &["g"]), google.clone());
    registry.register(PluginMetadata::new("apps", &["*"]), apps.clone());
    let dispatcher = dispatcher(&registry);

    let routed = dispatcher
        .dispatch(parse_input("g hello", registry.as_ref(), QueryEnv::default()))
        .collect();
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].provider_id, "google");

    let global = dispatcher
        .dispatch(parse_input("hello", registry.as_ref(), QueryEnv::default()))
        .collect();
    assert_eq!(global.len(), 1);
    assert_eq!(global[0].provider_id, "apps");

    assert_eq!(google.calls(), 1);
    assert_eq!(apps.calls(), 1);
}

#[test]
fn panicking_provider_yields_one_error_result() {
    let registry = Arc::new(StaticRegistry::new());
    registry.register(
        PluginMetadata::new("boom", &["*"]),
        Scripted::new(|_query: &Query| -> Vec<RawResult> { panic!("provider exploded") }),
    );
    registry.register(
        PluginMetadata::new("steady", &["*"]),
        Scripted::new(|_query: &Query| vec![RawResult::new("still here")]),
    );
    let dispatcher = dispatcher(&registry);

    let handle = dispatcher.dispatch(Query::input("x"));
    assert!(handle.wait_timeout(WAIT));
    let results = handle.collect();

    let errors: Vec<_> = results.iter().filter(|r| r.is_error).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].provider_id, "boom");
    assert!(errors[0].subtitle.contains("provider exploded"));
    assert!(errors[0].icon.is_some());
    assert!(results.iter().any(|r| r.title == "still here"));
}

#[test]
fn new_dispatch_cancels_pending_debounced_query() {
    let registry = Arc::new(StaticRegistry::new());
    let slow = Scripted::new(|query: &Query| vec![RawResult::new(&query.search_text)]);
    registry.register(
        PluginMetadata::new("slow", &["*"]).with_feature(FEATURE_DEBOUNCE, &[("intervalMs", "200")]),
        slow.clone(),
    );
    let dispatcher = dispatcher(&registry);

    let first = dispatcher.dispatch(Query::input("he"));
    let second = dispatcher.dispatch(Query::input("hello"));

    assert!(first.wait_timeout(Duration::from_millis(150)), "superseded dispatch must resolve");
    assert!(first.collect().is_empty());

    let results = second.collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "hello");
    assert_eq!(slow.calls(), 1);
}

#[test]
fn fallback_runs_only_when_global_query_found_nothing() {
    let registry = Arc::new(StaticRegistry::new());
    registry.register(
        PluginMetadata::new("apps", &["*"]),
        Scripted::new(|query: &Query| {
            if query.search_text == "calc" {
                vec![RawResult::new("Calculator")]
            } else {
                Vec::new()
            }
        }),
    );
    registry.register(PluginMetadata::new("web", &["web"]), Arc::new(WebSearch));
    let dispatcher = dispatcher(&registry);

    let missing = dispatcher.dispatch(Query::input("zzz")).collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].title, "Search the web for zzz");
    assert_eq!(missing[0].provider_id, "web");

    let found = dispatcher.dispatch(Query::input("calc")).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Calculator");
}

#[test]
fn fallback_can_be_disabled() {
    let registry = Arc::new(StaticRegistry::new());
    registry.register(PluginMetadata::new("web", &["web"]), Arc::new(WebSearch));
    let cache = Arc::new(ResultCache::new());
    let polisher = Arc::new(Polisher::default());
    let executor = ActionExecutor::new(
        Arc::clone(&cache),
        registry.clone(),
        Arc::new(NoUsageHistory),
        Arc::clone(&polisher),
    );
    let dispatcher = Dispatcher::new(
        registry.clone(),
        polisher,
        Arc::new(Matcher::default()),
        cache,
        executor,
        DispatchOptions {
            fallback_enabled: false,
            use_pinyin: false,
        },
    );

    assert!(dispatcher.dispatch(Query::input("zzz")).collect().is_empty());
}

#[test]
fn selection_results_are_filtered_by_search_text() {
    let registry = Arc::new(StaticRegistry::new());
    registry.register(
        PluginMetadata::new("selection", &["*"]).with_feature(FEATURE_QUERY_SELECTION, &[]),
        Scripted::new(|_query: &Query| {
            vec![
                RawResult::new("Copy Text"),
                RawResult::new("Translate"),
                RawResult::error("Lookup failed", "offline"),
            ]
        }),
    );
    registry.register(
        PluginMetadata::new("input-only", &["*"]),
        Scripted::new(|_query: &Query| vec![RawResult::new("Translate too")]),
    );
    let dispatcher = dispatcher(&registry);

    let selection = Selection::Text {
        text: "bonjour".to_string(),
    };
    let results = dispatcher
        .dispatch(Query::selection(selection, "tra"))
        .collect();
    let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Translate", "Lookup failed"]);
}

#[test]
fn results_arrive_in_provider_batches() {
    let registry = Arc::new(StaticRegistry::new());
    registry.register(
        PluginMetadata::new("many", &["*"]),
        Scripted::new(|_query: &Query| vec![RawResult::new("one"), RawResult::new("two")]),
    );
    let dispatcher = dispatcher(&registry);
    let handle = dispatcher.dispatch(Query::input("x"));
    handle.wait();

    let batches: Vec<_> = handle.results().iter().collect();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].provider_id, "many");
    assert_eq!(batches[0].query_id, handle.query.id);
    assert_eq!(batches[0].results.len(), 2);
}

fn counting_action(counter: &Arc<AtomicUsize>) -> Action {
    let counter = Arc::clone(counter);
    Action::new("Open", move |_ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn silent_query_runs_default_action_of_single_result() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let action = counting_action(&invoked);
    let registry = Arc::new(StaticRegistry::new());
    registry.register(
        PluginMetadata::new("apps", &["*"]),
        Scripted::new(move |_query: &Query| {
            vec![RawResult::new("Terminal").with_action(action.clone())]
        }),
    );
    let dispatcher = dispatcher(&registry);

    let ran = dispatcher
        .dispatch_silent(Query::input("term"), WAIT)
        .unwrap();
    assert!(ran);
    assert_eq!(invoked.load(Ordering::SeqCst), 1);
}

#[test]
fn silent_query_with_nothing_to_run_reports_false() {
    let registry = Arc::new(StaticRegistry::new());
    registry.register(
        PluginMetadata::new("apps", &["*"]),
        Scripted::new(|query: &Query| {
            if query.search_text == "bare" {
                vec![RawResult::new("No actions")]
            } else {
                Vec::new()
            }
        }),
    );
    let dispatcher = dispatcher(&registry);

    assert!(!dispatcher.dispatch_silent(Query::input("none"), WAIT).unwrap());
    assert!(!dispatcher.dispatch_silent(Query::input("bare"), WAIT).unwrap());
}

#[test]
fn silent_query_with_several_results_is_ambiguous() {
    let registry = Arc::new(StaticRegistry::new());
    registry.register(
        PluginMetadata::new("apps", &["*"]),
        Scripted::new(|_query: &Query| vec![RawResult::new("a"), RawResult::new("b")]),
    );
    let dispatcher = dispatcher(&registry);

    let error = dispatcher
        .dispatch_silent(Query::input("x"), WAIT)
        .unwrap_err();
    assert!(matches!(error, DispatchError::Ambiguous(2)));
}

#[test]
fn silent_query_times_out_on_slow_provider() {
    let registry = Arc::new(StaticRegistry::new());
    registry.register(
        PluginMetadata::new("slow", &["*"]),
        Scripted::new(|_query: &Query| {
            thread::sleep(Duration::from_millis(400));
            vec![RawResult::new("late")]
        }),
    );
    let dispatcher = dispatcher(&registry);

    let error = dispatcher
        .dispatch_silent(Query::input("x"), Duration::from_millis(30))
        .unwrap_err();
    assert!(matches!(error, DispatchError::Timeout(_)));
}
