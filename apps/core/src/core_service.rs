use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::action_executor::{ActionError, ActionExecutor, ActionOutcome};
use crate::collaborators::{
    FavoritesStore, IconResolver, IdentityTranslator, Translator, UsageHistory,
};
use crate::config::{validate, Config, ConfigError};
use crate::contract::{
    CoreRequest, CoreResponse, ExecuteActionResponse, ExecuteRefreshResponse, GetPreviewResponse,
    MruResponse, QueryRequest, QueryResponse, SilentQueryResponse,
};
use crate::dispatcher::{DispatchError, DispatchHandle, DispatchOptions, Dispatcher};
use crate::icon::PathIconResolver;
use crate::matcher::Matcher;
use crate::model::{Preview, Query, QueryEnv, RefreshState};
use crate::plugin_sdk::ProviderRegistry;
use crate::polisher::Polisher;
use crate::query_dsl::parse_input;
use crate::result_cache::ResultCache;
use crate::usage_store::{MruEntry, StoreError, UsageStore};

pub const DEFAULT_MRU_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },
    #[error("silent query produced {0} results, expected at most one")]
    AmbiguousSilentQuery(usize),
    #[error("silent query did not finish within {0:?}")]
    SilentTimeout(Duration),
    #[error("provider '{provider_id}' panicked: {message}")]
    ProviderPanic {
        provider_id: String,
        message: String,
    },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<ActionError> for ServiceError {
    fn from(value: ActionError) -> Self {
        match value {
            ActionError::NotFound { what, id } => Self::NotFound { what, id },
            ActionError::ProviderPanic {
                provider_id,
                message,
            } => Self::ProviderPanic {
                provider_id,
                message,
            },
        }
    }
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Ambiguous(count) => Self::AmbiguousSilentQuery(count),
            DispatchError::Timeout(timeout) => Self::SilentTimeout(timeout),
            DispatchError::Action(error) => error.into(),
        }
    }
}

/// The services a host plugs into the core.
pub struct Collaborators {
    pub translator: Arc<dyn Translator>,
    pub icons: Arc<dyn IconResolver>,
    pub usage: Arc<dyn UsageHistory>,
    pub favorites: Arc<dyn FavoritesStore>,
}

impl Collaborators {
    /// SQLite-backed usage and favorites, path-based icons, no translation.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let store = Arc::new(UsageStore::open_file(&config.usage.history_db_path)?);
        Ok(Self {
            translator: Arc::new(IdentityTranslator),
            icons: Arc::new(PathIconResolver::new(config.usage.icon_cache_capacity)),
            usage: Arc::clone(&store) as Arc<dyn UsageHistory>,
            favorites: store,
        })
    }
}

pub struct CoreService {
    config: Config,
    registry: Arc<dyn ProviderRegistry>,
    usage: Arc<dyn UsageHistory>,
    dispatcher: Dispatcher,
}

impl CoreService {
    pub fn new(config: Config, registry: Arc<dyn ProviderRegistry>) -> Result<Self, ServiceError> {
        validate(&config)?;
        let collaborators = Collaborators::from_config(&config)?;
        Self::with_collaborators(config, registry, collaborators)
    }

    pub fn with_collaborators(
        config: Config,
        registry: Arc<dyn ProviderRegistry>,
        collaborators: Collaborators,
    ) -> Result<Self, ServiceError> {
        validate(&config)?;

        let polisher = Arc::new(Polisher::new(
            config.results.clone(),
            collaborators.translator,
            collaborators.icons,
            Arc::clone(&collaborators.usage),
            collaborators.favorites,
        ));
        let matcher = Arc::new(Matcher::new(
            config.matching.tuning.clone(),
            config.matching.memo_capacity,
        ));
        let cache = Arc::new(ResultCache::new());
        let executor = ActionExecutor::new(
            Arc::clone(&cache),
            Arc::clone(&registry),
            Arc::clone(&collaborators.usage),
            Arc::clone(&polisher),
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            polisher,
            matcher,
            cache,
            executor,
            DispatchOptions {
                fallback_enabled: config.dispatch.fallback_enabled,
                use_pinyin: config.matching.use_pinyin,
            },
        );

        info!(data_dir = %config.data_dir.display(), "core service ready");
        Ok(Self {
            config,
            registry,
            usage: collaborators.usage,
            dispatcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<dyn ProviderRegistry> {
        &self.registry
    }

    pub fn parse_query(&self, raw: &str, env: QueryEnv) -> Query {
        parse_input(raw, self.registry.as_ref(), env)
    }

    pub fn dispatch(&self, query: Query) -> DispatchHandle {
        self.dispatcher.dispatch(query)
    }

    pub fn query(&self, raw: &str, env: QueryEnv) -> DispatchHandle {
        self.dispatch(self.parse_query(raw, env))
    }

    pub fn dispatch_silent(&self, query: Query) -> Result<bool, ServiceError> {
        Ok(self
            .dispatcher
            .dispatch_silent(query, self.config.silent_timeout())?)
    }

    pub fn execute_action(
        &self,
        result_id: &str,
        action_id: &str,
    ) -> Result<ActionOutcome, ServiceError> {
        Ok(self
            .dispatcher
            .executor()
            .execute_action(result_id, action_id)?)
    }

    pub fn execute_refresh(
        &self,
        result_id: &str,
        displayed: RefreshState,
    ) -> Result<RefreshState, ServiceError> {
        Ok(self
            .dispatcher
            .executor()
            .execute_refresh(result_id, displayed)?)
    }

    pub fn get_preview(&self, result_id: &str) -> Result<Preview, ServiceError> {
        Ok(self.dispatcher.executor().get_preview(result_id)?)
    }

    pub fn mru(&self, limit: usize) -> Result<Vec<MruEntry>, ServiceError> {
        Ok(self.usage.mru(limit)?)
    }

    pub fn handle_command(&self, request: CoreRequest) -> Result<CoreResponse, ServiceError> {
        match request {
            CoreRequest::Query(request) => {
                let timeout = request
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| self.config.silent_timeout());
                let handle = self.dispatch(self.build_query(request)?);
                let complete = handle.wait_timeout(timeout);
                let mut results = handle.drain_available();
                results.sort_by(|a, b| b.score.cmp(&a.score));
                Ok(CoreResponse::Query(QueryResponse {
                    query_id: handle.query.id.clone(),
                    results,
                    complete,
                }))
            }
            CoreRequest::QuerySilent(request) => {
                let invoked = self.dispatch_silent(self.build_query(request)?)?;
                Ok(CoreResponse::QuerySilent(SilentQueryResponse { invoked }))
            }
            CoreRequest::ExecuteAction(request) => {
                let outcome = self.execute_action(&request.result_id, &request.action_id)?;
                Ok(CoreResponse::ExecuteAction(ExecuteActionResponse {
                    prevent_hide: outcome.prevent_hide,
                }))
            }
            CoreRequest::ExecuteRefresh(request) => {
                let state = self.execute_refresh(&request.result_id, request.state)?;
                Ok(CoreResponse::ExecuteRefresh(ExecuteRefreshResponse { state }))
            }
            CoreRequest::GetPreview(request) => {
                let preview = self.get_preview(&request.result_id)?;
                Ok(CoreResponse::GetPreview(GetPreviewResponse { preview }))
            }
            CoreRequest::Mru(request) => {
                let entries = self.mru(request.limit.unwrap_or(DEFAULT_MRU_LIMIT))?;
                Ok(CoreResponse::Mru(MruResponse { entries }))
            }
        }
    }

    fn build_query(&self, request: QueryRequest) -> Result<Query, ServiceError> {
        match request.selection {
            Some(selection) => Ok(Query::selection(selection, &request.text).with_env(request.env)),
            None if request.text.trim().is_empty() => {
                Err(ServiceError::InvalidRequest("query text is empty".into()))
            }
            None => Ok(self.parse_query(&request.text, request.env)),
        }
    }
}
