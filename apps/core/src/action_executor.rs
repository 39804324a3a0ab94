use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collaborators::{UsageHistory, UsageRecord};
use crate::logging::ResultExt;
use crate::model::{Action, ActionContext, Preview, PreviewType, RefreshState, RefreshableResult};
use crate::plugin_sdk::ProviderRegistry;
use crate::polisher::Polisher;
use crate::result_cache::{CacheEntry, ResultCache};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The id is unknown or belongs to a superseded query.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },
    #[error("provider '{provider_id}' panicked: {message}")]
    ProviderPanic {
        provider_id: String,
        message: String,
    },
}

impl ActionError {
    fn not_found(what: &'static str, id: &str) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOutcome {
    /// The launcher window should stay open after this action.
    pub prevent_hide: bool,
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic payload unavailable".to_string())
}

pub struct ActionExecutor {
    cache: Arc<ResultCache>,
    registry: Arc<dyn ProviderRegistry>,
    usage: Arc<dyn UsageHistory>,
    polisher: Arc<Polisher>,
}

impl ActionExecutor {
    pub fn new(
        cache: Arc<ResultCache>,
        registry: Arc<dyn ProviderRegistry>,
        usage: Arc<dyn UsageHistory>,
        polisher: Arc<Polisher>,
    ) -> Self {
        Self {
            cache,
            registry,
            usage,
            polisher,
        }
    }

    /// Invokes a cached action closure synchronously. Usage bookkeeping
    /// happens afterwards on a background thread and never fails the call.
    pub fn execute_action(
        &self,
        result_id: &str,
        action_id: &str,
    ) -> Result<ActionOutcome, ActionError> {
        let entry = self
            .cache
            .get(result_id)
            .ok_or_else(|| ActionError::not_found("result", result_id))?;
        let action = entry
            .action(action_id)
            .ok_or_else(|| ActionError::not_found("action", action_id))?;

        let context = ActionContext {
            result_id: result_id.to_string(),
            action_id: action_id.to_string(),
            context_data: entry.context_data.clone(),
            query_text: entry.query.raw_text.clone(),
        };
        info!(
            provider_id = %entry.provider_id,
            result_id,
            action = %action.name,
            "executing action"
        );
        catch_unwind(AssertUnwindSafe(|| (action.callback)(&context))).map_err(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(provider_id = %entry.provider_id, panic = %message, "action panicked");
            ActionError::ProviderPanic {
                provider_id: entry.provider_id.clone(),
                message,
            }
        })?;

        let outcome = ActionOutcome {
            prevent_hide: action.prevent_hide,
        };
        self.record_usage(&entry);
        Ok(outcome)
    }

    fn record_usage(&self, entry: &CacheEntry) {
        let record = UsageRecord {
            provider_id: entry.provider_id.clone(),
            title: entry.title.clone(),
            subtitle: entry.subtitle.clone(),
            query_text: entry.query.raw_text.clone(),
            context_data: entry.context_data.clone(),
            icon: entry.icon.clone(),
        };
        let wants_mru = self
            .registry
            .find(&entry.provider_id)
            .is_some_and(|provider| provider.capabilities().mru);
        let usage = Arc::clone(&self.usage);

        thread::spawn(move || {
            usage.record_action(&record).warn_on_err();
            usage.record_query(&record.query_text).warn_on_err();
            if wants_mru {
                usage.record_mru(&record).warn_on_err();
            }
            debug!(provider_id = %record.provider_id, "usage bookkeeping finished");
        });
    }

    /// Re-runs a result's refresh callback against what the UI currently
    /// shows and merges the outcome back into the cache.
    pub fn execute_refresh(
        &self,
        result_id: &str,
        displayed: RefreshState,
    ) -> Result<RefreshState, ActionError> {
        let entry = self
            .cache
            .get(result_id)
            .ok_or_else(|| ActionError::not_found("result", result_id))?;
        let refresh = entry
            .on_refresh
            .clone()
            .ok_or_else(|| ActionError::not_found("refresh callback", result_id))?;

        let preview = match displayed.preview {
            Some(preview) if preview.preview_type != PreviewType::Remote => Some(preview),
            _ => entry.full_preview.clone(),
        };
        let actions = displayed
            .actions
            .iter()
            .filter_map(|shown| {
                let cached = entry.action(&shown.id)?;
                Some(Action {
                    id: shown.id.clone(),
                    name: shown.name.clone(),
                    icon: Some(shown.icon.clone()),
                    is_default: shown.is_default,
                    hotkey: shown.hotkey.clone(),
                    prevent_hide: shown.prevent_hide,
                    callback: Arc::clone(&cached.callback),
                })
            })
            .collect();
        let current = RefreshableResult {
            title: displayed.title,
            subtitle: displayed.subtitle,
            icon: displayed.icon,
            preview,
            tails: displayed.tails,
            actions,
            context_data: displayed.context_data,
            refresh_interval_ms: displayed.refresh_interval_ms,
        };

        let refreshed = catch_unwind(AssertUnwindSafe(|| refresh(current))).map_err(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(provider_id = %entry.provider_id, panic = %message, "refresh panicked");
            ActionError::ProviderPanic {
                provider_id: entry.provider_id.clone(),
                message,
            }
        })?;

        let repolished = self.polisher.repolish(&entry, refreshed);
        let state = repolished.state;
        let merged = self.cache.update(result_id, |cached| {
            cached.title = state.title.clone();
            cached.subtitle = state.subtitle.clone();
            cached.context_data = state.context_data.clone();
            cached.icon = repolished.icon;
            cached.tails = repolished.tails;
            cached.actions = repolished.actions;
            cached.full_preview = repolished.full_preview;
            cached.refresh_interval_ms = state.refresh_interval_ms;
        });
        if !merged {
            return Err(ActionError::not_found("result", result_id));
        }
        Ok(state)
    }

    /// Full preview payload, including ones held back from the result.
    pub fn get_preview(&self, result_id: &str) -> Result<Preview, ActionError> {
        self.cache
            .get(result_id)
            .ok_or_else(|| ActionError::not_found("result", result_id))?
            .full_preview
            .clone()
            .ok_or_else(|| ActionError::not_found("preview", result_id))
    }
}
