use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Query, QueryEnv, QueryType, RawResult};

pub const GLOBAL_TRIGGER_KEYWORD: &str = "*";

pub const FEATURE_DEBOUNCE: &str = "debounce";
pub const FEATURE_QUERY_SELECTION: &str = "querySelection";
pub const FEATURE_QUERY_ENV: &str = "queryEnv";
pub const FEATURE_MRU: &str = "mru";
pub const FEATURE_IGNORE_AUTO_SCORE: &str = "ignoreAutoScore";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("read failed for '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest: {0}")]
    Parse(#[from] json5::Error),
    #[error("missing plugin id")]
    MissingId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginCommand {
    pub command: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureSpec {
    pub name: String,
    pub params: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    pub trigger_keywords: Vec<String>,
    pub commands: Vec<PluginCommand>,
    pub features: Vec<FeatureSpec>,
    /// Base directory for relative icon paths.
    #[serde(skip)]
    pub directory: PathBuf,
}

impl PluginMetadata {
    pub fn new(id: &str, trigger_keywords: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            trigger_keywords: trigger_keywords.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_feature(mut self, name: &str, params: &[(&str, &str)]) -> Self {
        self.features.push(FeatureSpec {
            name: name.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.commands.push(PluginCommand {
            command: command.to_string(),
            description: String::new(),
        });
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let mut metadata: PluginMetadata = json5::from_str(raw)?;
        metadata.id = metadata.id.trim().to_string();
        if metadata.id.is_empty() {
            return Err(ManifestError::MissingId);
        }
        if metadata.name.trim().is_empty() {
            metadata.name = metadata.id.clone();
        }
        Ok(metadata)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut metadata = Self::parse(&raw)?;
        metadata.directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(metadata)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryEnvRequest {
    pub active_window_title: bool,
    pub active_window_pid: bool,
    pub active_window_icon: bool,
    pub active_browser_url: bool,
}

impl QueryEnvRequest {
    /// Copies only the requested fields; the rest stay zeroed.
    pub fn project(&self, env: &QueryEnv) -> QueryEnv {
        QueryEnv {
            active_window_title: if self.active_window_title {
                env.active_window_title.clone()
            } else {
                String::new()
            },
            active_window_pid: if self.active_window_pid {
                env.active_window_pid
            } else {
                0
            },
            active_window_icon: if self.active_window_icon {
                env.active_window_icon.clone()
            } else {
                String::new()
            },
            active_browser_url: if self.active_browser_url {
                env.active_browser_url.clone()
            } else {
                String::new()
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub debounce: Option<Duration>,
    pub query_selection: bool,
    pub query_env: QueryEnvRequest,
    pub mru: bool,
    pub ignore_auto_score: bool,
}

fn flag(spec: &FeatureSpec, key: &str) -> bool {
    spec.params
        .get(key)
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}

fn parse_debounce(plugin_id: &str, spec: &FeatureSpec) -> Option<Duration> {
    let raw = spec.params.get("intervalMs").map(|v| v.trim()).unwrap_or("");
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            warn!(
                plugin_id,
                interval = raw,
                "invalid debounce interval; dispatching without debounce"
            );
            None
        }
    }
}

/// Turns declared features into capabilities. Bad parameters drop the
/// feature with a warning instead of rejecting the provider.
pub fn resolve_capabilities(metadata: &PluginMetadata) -> Capabilities {
    let mut capabilities = Capabilities::default();
    for spec in &metadata.features {
        match spec.name.as_str() {
            FEATURE_DEBOUNCE => capabilities.debounce = parse_debounce(&metadata.id, spec),
            FEATURE_QUERY_SELECTION => capabilities.query_selection = true,
            FEATURE_QUERY_ENV => {
                capabilities.query_env = QueryEnvRequest {
                    active_window_title: flag(spec, "requireActiveWindowName"),
                    active_window_pid: flag(spec, "requireActiveWindowPid"),
                    active_window_icon: flag(spec, "requireActiveWindowIcon"),
                    active_browser_url: flag(spec, "requireActiveBrowserUrl"),
                }
            }
            FEATURE_MRU => capabilities.mru = true,
            FEATURE_IGNORE_AUTO_SCORE => capabilities.ignore_auto_score = true,
            other => debug!(plugin_id = %metadata.id, feature = other, "ignoring unknown feature"),
        }
    }
    capabilities
}

pub trait Provider: Send + Sync {
    /// May block and may panic; the dispatcher isolates both.
    fn query(&self, query: &Query, env: &QueryEnv) -> Vec<RawResult>;

    fn as_fallback(&self) -> Option<&dyn FallbackProvider> {
        None
    }
}

/// Optional capability: results offered when a global query found nothing.
pub trait FallbackProvider: Send + Sync {
    fn query_fallback(&self, query: &Query) -> Vec<RawResult>;
}

pub struct RegisteredProvider {
    metadata: PluginMetadata,
    capabilities: Capabilities,
    provider: Arc<dyn Provider>,
}

impl RegisteredProvider {
    pub fn new(metadata: PluginMetadata, provider: Arc<dyn Provider>) -> Self {
        let capabilities = resolve_capabilities(&metadata);
        Self {
            metadata,
            capabilities,
            provider,
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn debounce_interval(&self) -> Option<Duration> {
        self.capabilities.debounce
    }

    pub fn supports_selection(&self) -> bool {
        self.capabilities.query_selection
    }

    pub fn has_trigger_keyword(&self, keyword: &str) -> bool {
        self.metadata.trigger_keywords.iter().any(|k| k == keyword)
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.metadata.commands.iter().any(|c| c.command == command)
    }

    pub fn is_eligible(&self, query: &Query) -> bool {
        match query.query_type {
            QueryType::Selection => self.supports_selection(),
            QueryType::Input if query.trigger_keyword.is_empty() => {
                self.has_trigger_keyword(GLOBAL_TRIGGER_KEYWORD)
            }
            QueryType::Input => self.has_trigger_keyword(&query.trigger_keyword),
        }
    }

    pub fn env_view(&self, env: &QueryEnv) -> QueryEnv {
        self.capabilities.query_env.project(env)
    }

    pub fn query(&self, query: &Query, env: &QueryEnv) -> Vec<RawResult> {
        self.provider.query(query, env)
    }

    pub fn fallback(&self) -> Option<&dyn FallbackProvider> {
        self.provider.as_fallback()
    }
}

pub trait ProviderRegistry: Send + Sync {
    fn providers(&self) -> Vec<Arc<RegisteredProvider>>;

    fn list_eligible(&self, query: &Query) -> Vec<Arc<RegisteredProvider>> {
        self.providers()
            .into_iter()
            .filter(|provider| provider.is_eligible(query))
            .collect()
    }

    fn find(&self, id: &str) -> Option<Arc<RegisteredProvider>> {
        self.providers().into_iter().find(|p| p.id() == id)
    }
}

#[derive(Default)]
pub struct StaticRegistry {
    providers: RwLock<Vec<Arc<RegisteredProvider>>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider, replacing any earlier one with the same id.
    pub fn register(&self, metadata: PluginMetadata, provider: Arc<dyn Provider>) {
        let registered = Arc::new(RegisteredProvider::new(metadata, provider));
        let mut providers = self.providers.write();
        if let Some(slot) = providers.iter_mut().find(|p| p.id() == registered.id()) {
            warn!(plugin_id = registered.id(), "replacing registered provider");
            *slot = registered;
        } else {
            debug!(plugin_id = registered.id(), "registered provider");
            providers.push(registered);
        }
    }

    pub fn register_manifest(
        &self,
        manifest_path: &Path,
        provider: Arc<dyn Provider>,
    ) -> Result<(), ManifestError> {
        let metadata = PluginMetadata::load(manifest_path)?;
        self.register(metadata, provider);
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> bool {
        let mut providers = self.providers.write();
        let before = providers.len();
        providers.retain(|p| p.id() != id);
        providers.len() != before
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

impl ProviderRegistry for StaticRegistry {
    fn providers(&self) -> Vec<Arc<RegisteredProvider>> {
        self.providers.read().clone()
    }
}
