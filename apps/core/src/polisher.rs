use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::collaborators::{
    translate_text, FavoritesStore, IconResolver, IdentityTranslator, NoFavorites,
    NoUsageHistory, PassthroughIconResolver, Translator, UsageHistory,
};
use crate::config::ResultsConfig;
use crate::hotkey::{normalize_hotkey, Platform, DEFAULT_ACTION_HOTKEY};
use crate::model::{
    Action, IconRef, PolishedAction, PolishedResult, Preview, PreviewType, Query, QueryType,
    RawResult, RefreshState, RefreshableResult, ResultTail, Selection,
};
use crate::plugin_sdk::RegisteredProvider;
use crate::result_cache::CacheEntry;

/// Files listed in a synthesized selection preview before "+N more".
pub const SELECTION_PREVIEW_MAX_FILES: usize = 10;

/// Property on a remote preview naming the type of the held-back payload.
pub const REMOTE_PREVIEW_TYPE_PROPERTY: &str = "previewType";

/// A polished result plus what has to stay behind in the result cache.
pub struct Polished {
    pub result: PolishedResult,
    pub entry: CacheEntry,
}

/// Output of re-polishing a refreshed result.
pub struct Repolished {
    pub state: RefreshState,
    pub actions: Vec<Action>,
    pub full_preview: Option<Preview>,
    pub icon: Option<IconRef>,
    pub tails: Vec<ResultTail>,
}

pub struct Polisher {
    config: ResultsConfig,
    platform: Platform,
    translator: Arc<dyn Translator>,
    icons: Arc<dyn IconResolver>,
    usage: Arc<dyn UsageHistory>,
    favorites: Arc<dyn FavoritesStore>,
}

impl Polisher {
    pub fn new(
        config: ResultsConfig,
        translator: Arc<dyn Translator>,
        icons: Arc<dyn IconResolver>,
        usage: Arc<dyn UsageHistory>,
        favorites: Arc<dyn FavoritesStore>,
    ) -> Self {
        Self {
            config,
            platform: Platform::current(),
            translator,
            icons,
            usage,
            favorites,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn config(&self) -> &ResultsConfig {
        &self.config
    }

    pub fn polish(
        &self,
        provider: &RegisteredProvider,
        query: &Arc<Query>,
        raw: RawResult,
    ) -> Polished {
        let result_id = uuid::Uuid::new_v4().to_string();
        let base_dir = provider.metadata().directory.as_path();

        let title = self.translate(&raw.title);
        let subtitle = self.translate(&raw.subtitle);
        let icon = match self.resolve_icon(raw.icon.as_ref(), base_dir) {
            None if raw.is_error => Some(self.config.error_icon.clone()),
            icon => icon,
        };
        let tails = self.polish_tails(raw.tails, base_dir);
        let actions = self.normalize_actions(raw.actions, base_dir, &HashSet::new());

        let preview = raw
            .preview
            .or_else(|| selection_preview(query))
            .map(|preview| self.translate_preview(preview));
        let full_preview = preview.map(|preview| self.servable_image(preview));
        let outward_preview = if query.is_global() {
            None
        } else {
            self.outward_preview(&result_id, full_preview.as_ref())
        };

        let score = if raw.is_error {
            raw.score
        } else {
            raw.score + self.usage_bonus(provider, query, &title, &subtitle)
        };

        let (on_refresh, refresh_interval_ms) = match raw.on_refresh {
            Some(refresh) => {
                let interval =
                    round_refresh_interval(raw.refresh_interval_ms, self.config.refresh_granularity_ms);
                (Some(refresh), interval)
            }
            None => (None, 0),
        };

        let (group, group_score) = if query.is_global() {
            (String::new(), 0)
        } else {
            (self.translate(&raw.group), raw.group_score)
        };

        let result = PolishedResult {
            id: result_id.clone(),
            provider_id: provider.id().to_string(),
            title: title.clone(),
            subtitle: subtitle.clone(),
            icon: icon.clone(),
            score,
            group,
            group_score,
            preview: outward_preview,
            tails: tails.clone(),
            actions: actions.iter().map(polished_action).collect(),
            refresh_interval_ms,
            context_data: raw.context_data.clone(),
            is_error: raw.is_error,
        };

        let entry = CacheEntry {
            result_id,
            provider_id: provider.id().to_string(),
            provider_dir: base_dir.to_path_buf(),
            query: Arc::clone(query),
            title,
            subtitle,
            icon,
            tails,
            context_data: raw.context_data,
            actions,
            full_preview,
            on_refresh,
            refresh_interval_ms,
        };

        Polished { result, entry }
    }

    /// Applies the same action, icon and preview rules as [`Polisher::polish`]
    /// to what a refresh callback handed back.
    pub fn repolish(&self, entry: &CacheEntry, refreshed: RefreshableResult) -> Repolished {
        let base_dir = entry.provider_dir.as_path();
        let known: HashSet<String> = entry.actions.iter().map(|a| a.id.clone()).collect();
        let actions = self.normalize_actions(refreshed.actions, base_dir, &known);
        let icon = self.resolve_icon(refreshed.icon.as_ref(), base_dir);
        let tails = self.polish_tails(refreshed.tails, base_dir);

        let full_preview = refreshed
            .preview
            .filter(|preview| preview.preview_type != PreviewType::Remote)
            .map(|preview| self.servable_image(self.translate_preview(preview)))
            .or_else(|| entry.full_preview.clone());
        let outward_preview = if entry.query.is_global() {
            None
        } else {
            self.outward_preview(&entry.result_id, full_preview.as_ref())
        };

        let refresh_interval_ms = round_refresh_interval(
            refreshed.refresh_interval_ms,
            self.config.refresh_granularity_ms,
        );

        let state = RefreshState {
            result_id: entry.result_id.clone(),
            title: self.translate(&refreshed.title),
            subtitle: self.translate(&refreshed.subtitle),
            icon: icon.clone(),
            preview: outward_preview,
            tails: tails.clone(),
            actions: actions.iter().map(polished_action).collect(),
            context_data: refreshed.context_data,
            refresh_interval_ms,
        };

        Repolished {
            state,
            actions,
            full_preview,
            icon,
            tails,
        }
    }

    fn translate(&self, text: &str) -> String {
        translate_text(self.translator.as_ref(), text)
    }

    fn resolve_icon(&self, icon: Option<&IconRef>, base_dir: &Path) -> Option<IconRef> {
        icon.filter(|icon| !icon.is_empty())
            .map(|icon| self.icons.resolve(icon, base_dir))
    }

    fn polish_tails(&self, tails: Vec<ResultTail>, base_dir: &Path) -> Vec<ResultTail> {
        tails
            .into_iter()
            .filter_map(|tail| match tail {
                ResultTail::Text { text } => Some(ResultTail::Text {
                    text: self.translate(&text),
                }),
                ResultTail::Image { image } => self
                    .resolve_icon(Some(&image), base_dir)
                    .map(|image| ResultTail::Image { image }),
            })
            .collect()
    }

    /// Gives every action an id, icon and translated name, marks exactly one
    /// default and moves it to the front. Ids in `keep` survive; any other
    /// provider-chosen id is replaced so ids never collide across results.
    fn normalize_actions(
        &self,
        mut actions: Vec<Action>,
        base_dir: &Path,
        keep: &HashSet<String>,
    ) -> Vec<Action> {
        if actions.is_empty() {
            return actions;
        }

        let default_index = actions.iter().position(|a| a.is_default).unwrap_or(0);
        let mut seen = HashSet::new();
        for (index, action) in actions.iter_mut().enumerate() {
            if !keep.contains(&action.id) || !seen.insert(action.id.clone()) {
                action.id = uuid::Uuid::new_v4().to_string();
                seen.insert(action.id.clone());
            }
            action.name = self.translate(&action.name);
            action.icon = Some(
                self.resolve_icon(action.icon.as_ref(), base_dir)
                    .unwrap_or_else(|| self.config.default_action_icon.clone()),
            );
            action.is_default = index == default_index;
            if action.is_default && action.hotkey.trim().is_empty() {
                action.hotkey = DEFAULT_ACTION_HOTKEY.to_string();
            }
            if !action.hotkey.trim().is_empty() {
                action.hotkey = match normalize_hotkey(&action.hotkey, self.platform) {
                    Ok(hotkey) => hotkey,
                    Err(error) => {
                        warn!(hotkey = %action.hotkey, %error, "dropping invalid action hotkey");
                        String::new()
                    }
                };
            }
        }

        let default = actions.remove(default_index);
        actions.insert(0, default);
        actions
    }

    fn translate_preview(&self, mut preview: Preview) -> Preview {
        if matches!(preview.preview_type, PreviewType::Text | PreviewType::Markdown) {
            preview.data = self.translate(&preview.data);
        }
        preview.properties = preview
            .properties
            .into_iter()
            .map(|(key, value)| (self.translate(&key), value))
            .collect();
        preview
    }

    /// Local image files become URLs the UI can fetch.
    fn servable_image(&self, mut preview: Preview) -> Preview {
        if preview.preview_type == PreviewType::Image && Path::new(&preview.data).is_absolute() {
            preview.data = format!(
                "{}/image?path={}",
                self.config.preview_base_url.trim_end_matches('/'),
                url_encode_component(&preview.data)
            );
        }
        preview
    }

    fn outward_preview(&self, result_id: &str, preview: Option<&Preview>) -> Option<Preview> {
        let preview = preview?;
        if preview.preview_type == PreviewType::Remote {
            return Some(preview.clone());
        }
        let size = serde_json::to_string(preview).map_or(0, |encoded| encoded.len());
        if size <= self.config.preview_inline_limit {
            return Some(preview.clone());
        }
        debug!(result_id, size, "deferring large preview to the result cache");
        let original_type = serde_json::to_value(preview.preview_type)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();
        Some(
            Preview::new(PreviewType::Remote, result_id)
                .with_property(REMOTE_PREVIEW_TYPE_PROPERTY, original_type),
        )
    }

    fn usage_bonus(
        &self,
        provider: &RegisteredProvider,
        query: &Query,
        title: &str,
        subtitle: &str,
    ) -> i64 {
        let mut bonus = 0;
        if !provider.capabilities().ignore_auto_score {
            bonus += self
                .usage
                .score_for(provider.id(), title, subtitle, &query.raw_text);
        }
        if self.favorites.is_favorite(provider.id(), title, subtitle) {
            bonus += self.config.favorite_bonus;
        }
        bonus
    }
}

impl Default for Polisher {
    fn default() -> Self {
        Self::new(
            ResultsConfig::default(),
            Arc::new(IdentityTranslator),
            Arc::new(PassthroughIconResolver),
            Arc::new(NoUsageHistory),
            Arc::new(NoFavorites),
        )
    }
}

fn polished_action(action: &Action) -> PolishedAction {
    PolishedAction {
        id: action.id.clone(),
        name: action.name.clone(),
        icon: action.icon.clone().unwrap_or(IconRef::Emoji(String::new())),
        is_default: action.is_default,
        hotkey: action.hotkey.clone(),
        prevent_hide: action.prevent_hide,
    }
}

fn selection_preview(query: &Query) -> Option<Preview> {
    if query.query_type != QueryType::Selection {
        return None;
    }
    match query.selection.as_ref()? {
        Selection::Text { text } => Some(Preview::text(text.clone())),
        Selection::Files { paths } => {
            let mut listing: Vec<String> = paths
                .iter()
                .take(SELECTION_PREVIEW_MAX_FILES)
                .cloned()
                .collect();
            if paths.len() > SELECTION_PREVIEW_MAX_FILES {
                listing.push(format!("+{} more", paths.len() - SELECTION_PREVIEW_MAX_FILES));
            }
            Some(Preview::text(listing.join("\n")))
        }
    }
}

/// Rounds a positive interval down to the granularity, never below one
/// step. Non-positive intervals disable refreshing.
pub fn round_refresh_interval(interval_ms: i64, granularity_ms: i64) -> i64 {
    if interval_ms <= 0 || granularity_ms <= 0 {
        return 0;
    }
    ((interval_ms / granularity_ms) * granularity_ms).max(granularity_ms)
}

fn url_encode_component(input: &str) -> String {
    let mut out = String::new();
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push_str(&format!("{byte:02X}"));
        }
    }
    out
}
