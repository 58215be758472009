use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::logic::{LogicError, TokenError};
use crate::store::traits::StoreError;

pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";

/// JSON error body: `{ "message": ..., "code": ... }`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            code: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    Unauthorized {
        message: String,
        code: Option<&'static str>,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(message: &str, code: Option<&'static str>) -> Self {
        ApiError::Unauthorized {
            message: message.to_string(),
            code,
        }
    }

    pub fn no_token() -> Self {
        Self::unauthorized("No token, authorization denied", None)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = match &self {
            ApiError::Unauthorized { code, .. } => *code,
            _ => None,
        };
        let body = Json(ErrorResponse {
            message: self.to_string(),
            code,
        });
        (status, body).into_response()
    }
}

impl From<LogicError> for ApiError {
    fn from(err: LogicError) -> Self {
        match err {
            LogicError::NotFound(message) => ApiError::NotFound(message),
            LogicError::Invalid(message) => ApiError::BadRequest(message),
            LogicError::Forbidden(message) => ApiError::Forbidden(message),
            LogicError::Unavailable(message) => ApiError::ServiceUnavailable(message),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => {
                Self::unauthorized("Session expired. Please login again.", Some(TOKEN_EXPIRED))
            }
            TokenError::Invalid => {
                Self::unauthorized("Invalid token. Please login again.", Some(INVALID_TOKEN))
            }
        }
    }
}

/// Domain and constraint errors keep their meaning; everything else is logged
/// and reported as a plain server error.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(logic) = err.downcast_ref::<LogicError>() {
            return logic.clone().into();
        }
        if let Some(store) = err.downcast_ref::<StoreError>() {
            return match store {
                StoreError::DuplicateMobile { .. } => {
                    ApiError::BadRequest("User with this mobile number already exists".to_string())
                }
                StoreError::DuplicateId { .. } => {
                    ApiError::BadRequest("User already exists".to_string())
                }
            };
        }
        error!("Request failed: {:#}", err);
        ApiError::Internal("Server error".to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Collection;

    #[test]
    fn test_logic_errors_keep_their_status() {
        let err: ApiError = anyhow::Error::from(LogicError::not_found("User not found")).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "User not found");

        let err: ApiError = anyhow::Error::from(LogicError::forbidden("no")).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_duplicate_mobile_is_a_bad_request() {
        let err: ApiError = anyhow::Error::from(StoreError::DuplicateMobile {
            collection: Collection::Customer,
            mobile: "9000000000".to_string(),
        })
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unknown_errors_hide_details() {
        let err: ApiError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Server error");
    }

    #[test]
    fn test_token_errors_carry_codes() {
        match ApiError::from(TokenError::Expired) {
            ApiError::Unauthorized { code, .. } => assert_eq!(code, Some(TOKEN_EXPIRED)),
            other => panic!("unexpected {:?}", other),
        }
    }
}
