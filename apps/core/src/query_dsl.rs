use crate::model::{Query, QueryEnv};
use crate::plugin_sdk::{ProviderRegistry, GLOBAL_TRIGGER_KEYWORD};

/// Builds an input query from what the user typed.
///
/// `"<keyword> <rest>"` routes to the providers registered under `keyword`;
/// within it `"<keyword> <command> <rest>"` selects one of their commands.
/// A token only counts once the user has typed the space after it, so
/// `"g"` on its own is still a global query.
pub fn parse_input(raw: &str, registry: &dyn ProviderRegistry, env: QueryEnv) -> Query {
    let mut query = Query::input(raw).with_env(env);

    let Some((first, rest)) = raw.split_once(' ') else {
        return query;
    };
    if first.is_empty() || first == GLOBAL_TRIGGER_KEYWORD {
        return query;
    }

    let owners: Vec<_> = registry
        .providers()
        .into_iter()
        .filter(|provider| provider.has_trigger_keyword(first))
        .collect();
    if owners.is_empty() {
        return query;
    }

    query.trigger_keyword = first.to_string();
    query.search_text = rest.to_string();

    if let Some((second, remainder)) = rest.split_once(' ') {
        if !second.is_empty() && owners.iter().any(|p| p.has_command(second)) {
            query.command = second.to_string();
            query.search_text = remainder.to_string();
        }
    }

    query
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::parse_input;
    use crate::model::{Query, QueryEnv, RawResult};
    use crate::plugin_sdk::{PluginMetadata, Provider, StaticRegistry};

    struct Silent;

    impl Provider for Silent {
        fn query(&self, _query: &Query, _env: &QueryEnv) -> Vec<RawResult> {
            Vec::new()
        }
    }

    fn registry() -> StaticRegistry {
        let registry = StaticRegistry::new();
        registry.register(
            PluginMetadata::new("google", &["g"]).with_command("images"),
            Arc::new(Silent),
        );
        registry.register(PluginMetadata::new("apps", &["*"]), Arc::new(Silent));
        registry
    }

    #[test]
    fn routes_trigger_keyword() {
        let query = parse_input("g hello world", &registry(), QueryEnv::default());
        assert_eq!(query.trigger_keyword, "g");
        assert_eq!(query.command, "");
        assert_eq!(query.search_text, "hello world");
        assert!(!query.is_global());
    }

    #[test]
    fn keyword_without_space_stays_global() {
        let query = parse_input("g", &registry(), QueryEnv::default());
        assert!(query.is_global());
        assert_eq!(query.search_text, "g");
    }

    #[test]
    fn detects_command_after_keyword() {
        let query = parse_input("g images cats", &registry(), QueryEnv::default());
        assert_eq!(query.command, "images");
        assert_eq!(query.search_text, "cats");

        let typing = parse_input("g images", &registry(), QueryEnv::default());
        assert_eq!(typing.command, "");
        assert_eq!(typing.search_text, "images");
    }

    #[test]
    fn unknown_keyword_is_global_text() {
        let query = parse_input("hello there", &registry(), QueryEnv::default());
        assert!(query.is_global());
        assert_eq!(query.search_text, "hello there");
    }
}
