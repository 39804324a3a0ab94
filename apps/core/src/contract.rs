use serde::{Deserialize, Serialize};

use crate::model::{PolishedResult, Preview, QueryEnv, RefreshState, Selection};
use crate::usage_store::MruEntry;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default)]
    pub env: QueryEnv,
    /// Present for selection queries; `text` then narrows the results.
    #[serde(default)]
    pub selection: Option<Selection>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResponse {
    pub query_id: String,
    pub results: Vec<PolishedResult>,
    /// False when the timeout elapsed before every provider finished.
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SilentQueryResponse {
    pub invoked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecuteActionRequest {
    pub result_id: String,
    pub action_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecuteActionResponse {
    pub prevent_hide: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecuteRefreshRequest {
    pub result_id: String,
    pub state: RefreshState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecuteRefreshResponse {
    pub state: RefreshState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetPreviewRequest {
    pub result_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetPreviewResponse {
    pub preview: Preview,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MruRequest {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MruResponse {
    pub entries: Vec<MruEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload")]
pub enum CoreRequest {
    Query(QueryRequest),
    QuerySilent(QueryRequest),
    ExecuteAction(ExecuteActionRequest),
    ExecuteRefresh(ExecuteRefreshRequest),
    GetPreview(GetPreviewRequest),
    Mru(MruRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload")]
pub enum CoreResponse {
    Query(QueryResponse),
    QuerySilent(SilentQueryResponse),
    ExecuteAction(ExecuteActionResponse),
    ExecuteRefresh(ExecuteRefreshResponse),
    GetPreview(GetPreviewResponse),
    Mru(MruResponse),
}
