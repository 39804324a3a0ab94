use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sift_core::config::Config;
use sift_core::contract::{CoreRequest, CoreResponse, MruRequest, QueryRequest};
use sift_core::core_service::{CoreService, ServiceError};
use sift_core::model::{Action, Query, QueryEnv, RawResult, Selection};
use sift_core::plugin_sdk::{
    PluginMetadata, Provider, StaticRegistry, FEATURE_MRU, FEATURE_QUERY_ENV,
    FEATURE_QUERY_SELECTION,
};
use tempfile::TempDir;

struct Launcher {
    launches: Arc<AtomicUsize>,
}

impl Provider for Launcher {
    fn query(&self, query: &Query, env: &QueryEnv) -> Vec<RawResult> {
        let launches = Arc::clone(&self.launches);
        let open = Action::new("Open", move |_ctx| {
            launches.fetch_add(1, Ordering::SeqCst);
        });
        let mut results = Vec::new();
        for title in ["Terminal", "Text Editor"] {
            if title.to_lowercase().starts_with(&query.search_text.to_lowercase()) {
                results.push(
                    RawResult::new(title)
                        .with_subtitle(&env.active_window_title)
                        .with_action(open.clone()),
                );
            }
        }
        results
    }
}

struct Selected;

impl Provider for Selected {
    fn query(&self, query: &Query, _env: &QueryEnv) -> Vec<RawResult> {
        match &query.selection {
            Some(Selection::Text { text }) => vec![RawResult::new(&format!("Uppercase {text}"))],
            _ => Vec::new(),
        }
    }
}

fn service(dir: &TempDir) -> (CoreService, Arc<AtomicUsize>) {
    let launches = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(StaticRegistry::new());
    registry.register(
        PluginMetadata::new("apps", &["*"])
            .with_feature(FEATURE_MRU, &[])
            .with_feature(FEATURE_QUERY_ENV, &[("requireActiveWindowName", "true")]),
        Arc::new(Launcher {
            launches: Arc::clone(&launches),
        }),
    );
    registry.register(
        PluginMetadata::new("selection", &["sel"]).with_feature(FEATURE_QUERY_SELECTION, &[]),
        Arc::new(Selected),
    );

    let mut config = Config {
        data_dir: dir.path().to_path_buf(),
        config_path: dir.path().join("config.toml"),
        ..Config::default()
    };
    config.usage.history_db_path = dir.path().join("usage.sqlite3");
    config.dispatch.silent_timeout_ms = 2_000;

    (CoreService::new(config, registry).unwrap(), launches)
}

#[test]
fn query_passes_requested_environment_to_provider() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _) = service(&dir);
    let env = QueryEnv {
        active_window_title: "Finder".to_string(),
        active_window_pid: 42,
        ..QueryEnv::default()
    };

    let results = service.query("term", env).collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Terminal");
    assert_eq!(results[0].subtitle, "Finder");
}

#[test]
fn silent_query_launches_the_single_match() {
    let dir = tempfile::tempdir().unwrap();
    let (service, launches) = service(&dir);

    let ran = service
        .dispatch_silent(service.parse_query("term", QueryEnv::default()))
        .unwrap();
    assert!(ran);
    assert_eq!(launches.load(Ordering::SeqCst), 1);

    let error = service
        .dispatch_silent(service.parse_query("te", QueryEnv::default()))
        .unwrap_err();
    assert!(matches!(error, ServiceError::AmbiguousSilentQuery(2)));
}

#[test]
fn executed_results_show_up_in_mru() {
    let dir = tempfile::tempdir().unwrap();
    let (service, launches) = service(&dir);

    let results = service.query("text", QueryEnv::default()).collect();
    let result = &results[0];
    service
        .execute_action(&result.id, &result.actions[0].id)
        .unwrap();
    assert_eq!(launches.load(Ordering::SeqCst), 1);

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let entries = service.mru(10).unwrap();
        if let Some(entry) = entries.first() {
            assert_eq!(entry.title, "Text Editor");
            assert_eq!(entry.provider_id, "apps");
            break;
        }
        assert!(Instant::now() < deadline, "mru never updated");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn stale_result_maps_to_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _) = service(&dir);

    let old = service.query("term", QueryEnv::default()).collect();
    let _ = service.query("text", QueryEnv::default()).collect();

    let error = service
        .execute_action(&old[0].id, &old[0].actions[0].id)
        .unwrap_err();
    assert!(matches!(error, ServiceError::NotFound { what: "result", .. }));
    assert!(matches!(
        service.get_preview(&old[0].id),
        Err(ServiceError::NotFound { .. })
    ));
}

#[test]
fn handle_command_runs_selection_queries() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _) = service(&dir);

    let response = service
        .handle_command(CoreRequest::Query(QueryRequest {
            text: String::new(),
            env: QueryEnv::default(),
            selection: Some(Selection::Text {
                text: "hello".to_string(),
            }),
            timeout_ms: Some(2_000),
        }))
        .unwrap();

    let response = match response {
        CoreResponse::Query(response) => response,
        other => panic!("unexpected response: {other:?}"),
    };
    assert!(response.complete);
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].title, "Uppercase hello");
    assert_eq!(
        response.results[0].preview.as_ref().map(|p| p.data.as_str()),
        Some("hello")
    );
}

#[test]
fn handle_command_rejects_empty_input_query() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _) = service(&dir);

    let error = service
        .handle_command(CoreRequest::Query(QueryRequest {
            text: "  ".to_string(),
            env: QueryEnv::default(),
            selection: None,
            timeout_ms: None,
        }))
        .unwrap_err();
    assert!(matches!(error, ServiceError::InvalidRequest(_)));
}

#[test]
fn handle_command_lists_mru() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _) = service(&dir);

    let response = service
        .handle_command(CoreRequest::Mru(MruRequest::default()))
        .unwrap();
    assert_eq!(
        response,
        CoreResponse::Mru(sift_core::contract::MruResponse { entries: Vec::new() })
    );
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    config.usage.history_db_path = dir.path().join("usage.sqlite3");
    config.results.refresh_granularity_ms = 0;

    let result = CoreService::new(config, Arc::new(StaticRegistry::new()));
    assert!(matches!(result, Err(ServiceError::Config(_))));
}
