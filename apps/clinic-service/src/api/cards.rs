//! Rotas de carteirinhas e solicitações

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use clinic_db::models::{BloodType, EmergencyContact, HealthCard, HealthCardRequest};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{created, ApiResult, AppState, ValidJson};
use crate::auth::{Actor, Role};
use crate::cards::{Approval, CardUpdate, CardVerification, IssueCard, SubmitRequest};
use crate::error::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct IssueCardBody {
    pub patient_id: Uuid,
    pub expiry_date: Option<DateTime<Utc>>,
    pub blood_type: Option<BloodType>,
    #[validate(length(max = 50))]
    pub allergies: Option<Vec<String>>,
    pub emergency_contact: Option<EmergencyContact>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BlockBody {
    #[serde(default)]
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitBody {
    pub patient_id: Uuid,
    pub blood_type: Option<BloodType>,
    /// Ausente usa o cadastro; `[]` declara que não há alergias
    #[validate(length(max = 50))]
    pub allergies: Option<Vec<String>>,
    pub emergency_contact: Option<EmergencyContact>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApproveBody {
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectBody {
    #[validate(length(min = 1, max = 1000))]
    pub rejection_reason: String,
}

/// Pacientes só enxergam a própria carteirinha
fn ensure_card_visible(actor: &Actor, card: &HealthCard) -> Result<(), ServiceError> {
    match actor.role {
        Role::Patient if card.patient_id != actor.id => {
            Err(ServiceError::forbidden("Carteirinha de outro paciente"))
        }
        _ => Ok(()),
    }
}

pub(super) async fn issue(
    State(state): State<AppState>,
    actor: Actor,
    ValidJson(body): ValidJson<IssueCardBody>,
) -> ApiResult<Response> {
    let request = IssueCard {
        patient_id: body.patient_id,
        expiry_date: body.expiry_date,
        blood_type: body.blood_type,
        allergies: body.allergies,
        emergency_contact: body.emergency_contact,
    };
    let card = state.clinic.cards.issue(&actor, request).await?;
    Ok(created(card))
}

pub(super) async fn get_card(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HealthCard>> {
    let card = state.clinic.cards.get(id).await?;
    ensure_card_visible(&actor, &card)?;
    Ok(Json(card))
}

pub(super) async fn patient_card(
    State(state): State<AppState>,
    actor: Actor,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Json<HealthCard>> {
    actor.require_self_or_staff(patient_id, "Consulta de carteirinha")?;
    let card = state.clinic.cards.for_patient(patient_id).await?;
    Ok(Json(card))
}

/// O corpo chega cru para que campos imutáveis sejam detectados pelo nome
pub(super) async fn update_card(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<HealthCard>> {
    let Json(body) = body.map_err(|e| ServiceError::validation("body", e.body_text()))?;
    let changes = CardUpdate::from_json(body)?;
    let card = state.clinic.cards.update(&actor, id, changes).await?;
    Ok(Json(card))
}

pub(super) async fn block(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<BlockBody>,
) -> ApiResult<Json<HealthCard>> {
    let card = state.clinic.cards.block(&actor, id, body.reason).await?;
    Ok(Json(card))
}

pub(super) async fn unblock(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HealthCard>> {
    let card = state.clinic.cards.unblock(&actor, id).await?;
    Ok(Json(card))
}

/// Conferência no balcão: qualquer usuário autenticado
pub(super) async fn verify(
    State(state): State<AppState>,
    _actor: Actor,
    Path(card_number): Path<String>,
) -> ApiResult<Json<CardVerification>> {
    let verification = state.clinic.cards.verify(&card_number).await?;
    Ok(Json(verification))
}

pub(super) async fn submit_request(
    State(state): State<AppState>,
    actor: Actor,
    ValidJson(body): ValidJson<SubmitBody>,
) -> ApiResult<Response> {
    let request = SubmitRequest {
        patient_id: body.patient_id,
        blood_type: body.blood_type,
        allergies: body.allergies,
        emergency_contact: body.emergency_contact,
    };
    let request = state.clinic.requests.submit(&actor, request).await?;
    Ok(created(request))
}

pub(super) async fn pending_requests(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Vec<HealthCardRequest>>> {
    actor.require_staff("Fila de solicitações")?;
    let pending = state.clinic.requests.list_pending().await?;
    Ok(Json(pending))
}

pub(super) async fn get_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HealthCardRequest>> {
    let request = state.clinic.requests.get(id).await?;
    actor.require_self_or_staff(request.patient_id, "Consulta de solicitação")?;
    Ok(Json(request))
}

pub(super) async fn approve_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<ApproveBody>,
) -> ApiResult<Json<Approval>> {
    let approval = state.clinic.requests.approve(&actor, id, body.expiry_date).await?;
    Ok(Json(approval))
}

pub(super) async fn reject_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<RejectBody>,
) -> ApiResult<Json<HealthCardRequest>> {
    let request = state
        .clinic
        .requests
        .reject(&actor, id, &body.rejection_reason)
        .await?;
    Ok(Json(request))
}
