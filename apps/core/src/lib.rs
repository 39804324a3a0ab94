pub mod action_executor;
pub mod collaborators;
pub mod config;
pub mod contract;
pub mod core_service;
pub mod debounce;
pub mod diacritics;
pub mod dispatcher;
pub mod hotkey;
pub mod icon;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod pinyin_match;
pub mod plugin_sdk;
pub mod polisher;
pub mod query_dsl;
pub mod result_cache;
pub mod transport;
pub mod usage_store;

#[cfg(test)]
mod tests {
    mod match_latency_test {
        include!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../tests/perf/match_latency_test.rs"
        ));
    }
}
