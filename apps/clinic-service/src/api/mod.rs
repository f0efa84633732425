//! Fachada HTTP (axum) sobre os componentes da clínica
//!
//! Os handlers só traduzem: extraem o usuário do token, validam o corpo e
//! chamam o componente correspondente. Nenhuma regra de negócio mora aqui.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error};
use validator::Validate;

use crate::auth::{Actor, TokenKeys};
use crate::built_info;
use crate::error::ServiceError;
use crate::Clinic;

mod appointments;
mod cards;

pub use appointments::{BookAppointmentBody, NotesBody, SlotsQuery, StatusBody};
pub use cards::{ApproveBody, BlockBody, IssueCardBody, RejectBody, SubmitBody};

/// Estado compartilhado entre os handlers
#[derive(Clone)]
pub struct AppState {
    pub clinic: Arc<Clinic>,
    pub keys: TokenKeys,
}

impl AppState {
    pub fn new(clinic: Clinic, keys: TokenKeys) -> Self {
        Self {
            clinic: Arc::new(clinic),
            keys,
        }
    }
}

/// Monta o roteador com todas as rotas e camadas
pub fn router(state: AppState, max_in_flight: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/doctors/:id/slots", get(appointments::available_slots))
        .route("/doctors/:id/appointments", get(appointments::doctor_agenda))
        .route("/patients/:id/appointments", get(appointments::patient_appointments))
        .route("/patients/:id/health-card", get(cards::patient_card))
        .route("/appointments", post(appointments::book))
        .route("/appointments/:id", get(appointments::get_appointment))
        .route("/appointments/:id/status", post(appointments::set_status))
        .route("/appointments/:id/payment", post(appointments::capture_payment))
        .route("/appointments/:id/notes", put(appointments::update_notes))
        .route("/health-cards", post(cards::issue))
        .route("/health-cards/:id", get(cards::get_card).patch(cards::update_card))
        .route("/health-cards/:id/block", post(cards::block))
        .route("/health-cards/:id/unblock", post(cards::unblock))
        .route("/card-verification/:card_number", get(cards::verify))
        .route(
            "/health-card-requests",
            post(cards::submit_request).get(cards::pending_requests),
        )
        .route("/health-card-requests/:id", get(cards::get_request))
        .route("/health-card-requests/:id/approve", post(cards::approve_request))
        .route("/health-card-requests/:id/reject", post(cards::reject_request))
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(max_in_flight.max(1)))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": built_info::PKG_VERSION,
    }))
}

/// Erro devolvido pelos handlers
#[derive(Debug)]
pub enum ApiError {
    /// Token ausente, malformado ou expirado
    Unauthorized(String),
    Service(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        ApiError::Service(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "authentication_error", message)
            }
            ApiError::Service(error) => {
                let status = match &error {
                    ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
                    ServiceError::Conflict(_) => StatusCode::CONFLICT,
                    ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
                    ServiceError::Authorization(_) => StatusCode::FORBIDDEN,
                    ServiceError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if let ServiceError::Infrastructure(e) = &error {
                    error!("Falha de infraestrutura: {}", e);
                }
                (status, error.kind(), error.to_string())
            }
        };

        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Token de acesso ausente".to_string()))?;

        state.keys.verify(token.trim()).map_err(|e| {
            debug!("Token rejeitado: {}", e);
            ApiError::Unauthorized("Token de acesso inválido ou expirado".to_string())
        })
    }
}

/// Corpo JSON já validado com `validator`
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    B: Send + 'static,
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ServiceError::validation("body", e.body_text()))?;

        value.validate().map_err(|errors| {
            let field = errors
                .field_errors()
                .keys()
                .next()
                .map(|field| field.to_string())
                .unwrap_or_else(|| "body".to_string());
            ServiceError::validation(field, errors.to_string())
        })?;

        Ok(ValidJson(value))
    }
}

/// Resposta `201 Created` com o corpo serializado
pub(crate) fn created<T: serde::Serialize>(value: T) -> Response {
    (StatusCode::CREATED, Json(value)).into_response()
}
