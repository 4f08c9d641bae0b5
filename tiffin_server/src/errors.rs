use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use thiserror::Error;
use tiffin_engine::{ErrorClass, OrderFlowError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The webhook signature is missing or invalid")]
    InvalidWebhookSignature,
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    Flow(#[from] OrderFlowError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidWebhookSignature => StatusCode::UNAUTHORIZED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // One mapping for the whole taxonomy, so clients can tell "pick another order" (conflict) apart from
            // "this action is not allowed right now" (business rule) without parsing messages.
            Self::Flow(e) => match e.class() {
                ErrorClass::NotFound => StatusCode::NOT_FOUND,
                ErrorClass::Conflict => StatusCode::CONFLICT,
                ErrorClass::BusinessRule => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorClass::Validation => StatusCode::BAD_REQUEST,
                ErrorClass::Internal => match e {
                    OrderFlowError::Gateway(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[cfg(test)]
mod test {
    use tiffin_engine::MarketplaceError;

    use super::*;

    #[test]
    fn taxonomy_maps_to_distinct_statuses() {
        let conflict = ServerError::Flow(MarketplaceError::OrderAlreadyClaimed(1).into());
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        let rule = ServerError::Flow(MarketplaceError::OrderNotReady(1).into());
        assert_eq!(rule.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let missing = ServerError::Flow(MarketplaceError::OrderNotFound(1).into());
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        let validation = ServerError::Flow(OrderFlowError::OutOfServiceArea);
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
        let gateway = ServerError::Flow(OrderFlowError::Gateway(tiffin_engine::traits::GatewayError::Timeout(
            "deadline".to_string(),
        )));
        assert_eq!(gateway.status_code(), StatusCode::BAD_GATEWAY);
    }
}
