use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::contract::{CoreRequest, CoreResponse};
use crate::core_service::{CoreService, ServiceError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidJson,
    InvalidRequest,
    NotFound,
    Ambiguous,
    Timeout,
    ProviderPanic,
    Store,
    Config,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransportResponse {
    Ok { response: CoreResponse },
    Err { error: ErrorResponse },
}

pub fn handle_request(service: &CoreService, request: CoreRequest) -> TransportResponse {
    match service.handle_command(request) {
        Ok(response) => TransportResponse::Ok { response },
        Err(error) => {
            debug!(%error, "request failed");
            TransportResponse::Err {
                error: map_service_error(error),
            }
        }
    }
}

pub fn handle_json(service: &CoreService, payload: &str) -> String {
    let response = match serde_json::from_str::<CoreRequest>(payload) {
        Ok(request) => handle_request(service, request),
        Err(error) => TransportResponse::Err {
            error: ErrorResponse {
                code: ErrorCode::InvalidJson,
                message: error.to_string(),
            },
        },
    };

    match serde_json::to_string(&response) {
        Ok(encoded) => encoded,
        Err(encode_error) => {
            error!(%encode_error, "failed to encode transport response");
            r#"{"status":"err","error":{"code":"invalid_request","message":"response encoding failed"}}"#
                .to_string()
        }
    }
}

fn map_service_error(error: ServiceError) -> ErrorResponse {
    let message = error.to_string();
    let code = match error {
        ServiceError::InvalidRequest(_) => ErrorCode::InvalidRequest,
        ServiceError::NotFound { .. } => ErrorCode::NotFound,
        ServiceError::AmbiguousSilentQuery(_) => ErrorCode::Ambiguous,
        ServiceError::SilentTimeout(_) => ErrorCode::Timeout,
        ServiceError::ProviderPanic { .. } => ErrorCode::ProviderPanic,
        ServiceError::Store(_) => ErrorCode::Store,
        ServiceError::Config(_) => ErrorCode::Config,
    };
    ErrorResponse { code, message }
}
