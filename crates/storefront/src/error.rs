//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error renders as `{"success": false, "error": "<mensagem>"}` with a
//! message safe to show to the buyer.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use filamento_core::cart::CartError;
use filamento_core::payment::PaymentValidationError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::pagarme::PagarmeError;
use crate::services::print_service::PrintServiceError;
use crate::services::uploads::UploadError;

const INTERNAL_MESSAGE: &str = "Erro interno do servidor";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payment gateway call failed.
    #[error("Payment gateway error: {0}")]
    Pagarme(#[from] PagarmeError),

    /// Estimation service call failed.
    #[error("Estimation service error: {0}")]
    PrintService(#[from] PrintServiceError),

    /// Upload rejected or missing.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Buyer or payment data rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] PaymentValidationError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Request clashes with existing state.
    #[error("{0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error is our fault and should reach Sentry.
    const fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Session(_) | Self::PrintService(_) => {
                true
            }
            Self::Pagarme(err) => !matches!(
                err,
                PagarmeError::Rejected { .. } | PagarmeError::InvalidRequest(_)
            ),
            Self::Auth(err) => matches!(err, AuthError::Repository(_) | AuthError::PasswordHash),
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Session(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidProfile(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Pagarme(err) => match err {
                PagarmeError::Rejected { status, .. } if (400..500).contains(status) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PagarmeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::PrintService(PrintServiceError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Self::PrintService(_) => StatusCode::BAD_GATEWAY,
            Self::Upload(err) => match err {
                UploadError::NotFound => StatusCode::NOT_FOUND,
                UploadError::Expired => StatusCode::GONE,
                UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Cart(CartError::ItemNotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Cart(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message shown to the client. Internal details never leave the server.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Session(_) => INTERNAL_MESSAGE.to_owned(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    "E-mail ou senha inválidos".to_owned()
                }
                AuthError::UserAlreadyExists => "Já existe uma conta com este e-mail".to_owned(),
                AuthError::WeakPassword(msg) | AuthError::InvalidProfile(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "E-mail inválido".to_owned(),
                AuthError::Repository(_) | AuthError::PasswordHash => INTERNAL_MESSAGE.to_owned(),
            },
            Self::Pagarme(err) => match err {
                PagarmeError::Rejected { message, .. } | PagarmeError::InvalidRequest(message) => {
                    message.clone()
                }
                _ => "Erro ao processar pagamento".to_owned(),
            },
            Self::PrintService(PrintServiceError::Timeout) => {
                "O serviço de estimativa demorou demais para responder".to_owned()
            }
            Self::PrintService(_) => "Serviço de estimativa indisponível".to_owned(),
            Self::Upload(err) => err.to_string(),
            Self::Cart(err) => err.to_string(),
            Self::Validation(err) => err.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::RateLimited => "Muitas requisições, tente novamente em instantes".to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = json!({
            "success": false,
            "error": self.public_message(),
        });

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a buyer action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
