use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Callback behind one action of a result.
pub type ActionFn = Arc<dyn Fn(&ActionContext) + Send + Sync>;

/// Callback re-invoked on a timer to update a displayed result.
pub type RefreshFn = Arc<dyn Fn(RefreshableResult) -> RefreshableResult + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    #[default]
    Input,
    Selection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    Text { text: String },
    Files { paths: Vec<String> },
}

/// Host context at query time. Providers only ever see the fields they asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryEnv {
    pub active_window_title: String,
    pub active_window_pid: u32,
    pub active_window_icon: String,
    pub active_browser_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub raw_text: String,
    pub trigger_keyword: String,
    pub command: String,
    pub search_text: String,
    pub query_type: QueryType,
    pub selection: Option<Selection>,
    #[serde(default)]
    pub env: QueryEnv,
}

impl Query {
    /// A global input query: no trigger keyword, search text is the raw text.
    pub fn input(raw_text: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            raw_text: raw_text.to_string(),
            trigger_keyword: String::new(),
            command: String::new(),
            search_text: raw_text.to_string(),
            query_type: QueryType::Input,
            selection: None,
            env: QueryEnv::default(),
        }
    }

    pub fn selection(selection: Selection, search_text: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            raw_text: search_text.to_string(),
            trigger_keyword: String::new(),
            command: String::new(),
            search_text: search_text.to_string(),
            query_type: QueryType::Selection,
            selection: Some(selection),
            env: QueryEnv::default(),
        }
    }

    pub fn with_env(mut self, env: QueryEnv) -> Self {
        self.env = env;
        self
    }

    pub fn is_global(&self) -> bool {
        self.query_type == QueryType::Input && self.trigger_keyword.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum IconRef {
    RelativePath(String),
    AbsolutePath(String),
    Emoji(String),
    Url(String),
    Base64(String),
    Svg(String),
}

impl IconRef {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::RelativePath(data)
            | Self::AbsolutePath(data)
            | Self::Emoji(data)
            | Self::Url(data)
            | Self::Base64(data)
            | Self::Svg(data) => data.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewType {
    Text,
    Markdown,
    Html,
    Image,
    Url,
    File,
    /// Payload held back in the result cache; `data` is the fetch reference.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub preview_type: PreviewType,
    pub data: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Preview {
    pub fn new(preview_type: PreviewType, data: impl Into<String>) -> Self {
        Self {
            preview_type,
            data: data.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self::new(PreviewType::Text, data)
    }

    pub fn markdown(data: impl Into<String>) -> Self {
        Self::new(PreviewType::Markdown, data)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultTail {
    Text { text: String },
    Image { image: IconRef },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    pub result_id: String,
    pub action_id: String,
    pub context_data: String,
    pub query_text: String,
}

#[derive(Clone)]
pub struct Action {
    pub id: String,
    pub name: String,
    pub icon: Option<IconRef>,
    pub is_default: bool,
    pub hotkey: String,
    pub prevent_hide: bool,
    pub callback: ActionFn,
}

impl Action {
    pub fn new(name: &str, callback: impl Fn(&ActionContext) + Send + Sync + 'static) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            icon: None,
            is_default: false,
            hotkey: String::new(),
            prevent_hide: false,
            callback: Arc::new(callback),
        }
    }

    pub fn with_hotkey(mut self, hotkey: &str) -> Self {
        self.hotkey = hotkey.to_string();
        self
    }

    pub fn with_icon(mut self, icon: IconRef) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("is_default", &self.is_default)
            .field("hotkey", &self.hotkey)
            .finish_non_exhaustive()
    }
}

/// What a provider returns from `query`. Lives for one dispatch only.
#[derive(Clone, Default)]
pub struct RawResult {
    pub title: String,
    pub subtitle: String,
    pub icon: Option<IconRef>,
    pub score: i64,
    pub group: String,
    pub group_score: i64,
    pub preview: Option<Preview>,
    pub tails: Vec<ResultTail>,
    pub actions: Vec<Action>,
    pub refresh_interval_ms: i64,
    pub on_refresh: Option<RefreshFn>,
    pub context_data: String,
    pub is_error: bool,
}

impl RawResult {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub fn error(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            subtitle: message.to_string(),
            is_error: true,
            ..Self::default()
        }
    }

    pub fn with_subtitle(mut self, subtitle: &str) -> Self {
        self.subtitle = subtitle.to_string();
        self
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }

    pub fn with_icon(mut self, icon: IconRef) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn with_preview(mut self, preview: Preview) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_group(mut self, group: &str, group_score: i64) -> Self {
        self.group = group.to_string();
        self.group_score = group_score;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_context_data(mut self, context_data: &str) -> Self {
        self.context_data = context_data.to_string();
        self
    }

    pub fn with_refresh(
        mut self,
        interval_ms: i64,
        refresh: impl Fn(RefreshableResult) -> RefreshableResult + Send + Sync + 'static,
    ) -> Self {
        self.refresh_interval_ms = interval_ms;
        self.on_refresh = Some(Arc::new(refresh));
        self
    }
}

impl fmt::Debug for RawResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResult")
            .field("title", &self.title)
            .field("subtitle", &self.subtitle)
            .field("score", &self.score)
            .field("actions", &self.actions)
            .field("is_error", &self.is_error)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolishedAction {
    pub id: String,
    pub name: String,
    pub icon: IconRef,
    pub is_default: bool,
    pub hotkey: String,
    pub prevent_hide: bool,
}

/// The only result representation that crosses the UI boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolishedResult {
    pub id: String,
    pub provider_id: String,
    pub title: String,
    pub subtitle: String,
    pub icon: Option<IconRef>,
    pub score: i64,
    pub group: String,
    pub group_score: i64,
    pub preview: Option<Preview>,
    pub tails: Vec<ResultTail>,
    pub actions: Vec<PolishedAction>,
    pub refresh_interval_ms: i64,
    pub context_data: String,
    pub is_error: bool,
}

impl PolishedResult {
    pub fn default_action(&self) -> Option<&PolishedAction> {
        self.actions.iter().find(|action| action.is_default)
    }
}

/// Mutable fields handed to a refresh callback, with live action closures.
#[derive(Clone, Default)]
pub struct RefreshableResult {
    pub title: String,
    pub subtitle: String,
    pub icon: Option<IconRef>,
    pub preview: Option<Preview>,
    pub tails: Vec<ResultTail>,
    pub actions: Vec<Action>,
    pub context_data: String,
    pub refresh_interval_ms: i64,
}

impl fmt::Debug for RefreshableResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshableResult")
            .field("title", &self.title)
            .field("subtitle", &self.subtitle)
            .field("actions", &self.actions)
            .field("refresh_interval_ms", &self.refresh_interval_ms)
            .finish_non_exhaustive()
    }
}

/// Display snapshot the UI sends with a refresh request and gets back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshState {
    pub result_id: String,
    pub title: String,
    pub subtitle: String,
    pub icon: Option<IconRef>,
    pub preview: Option<Preview>,
    pub tails: Vec<ResultTail>,
    pub actions: Vec<PolishedAction>,
    pub context_data: String,
    pub refresh_interval_ms: i64,
}

/// Results of one provider for one dispatch, in provider order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBatch {
    pub query_id: String,
    pub provider_id: String,
    pub results: Vec<PolishedResult>,
}
