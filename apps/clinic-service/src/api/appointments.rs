//! Rotas de agenda e consultas

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use clinic_db::models::{hhmm, Appointment, AppointmentStatus, AppointmentType, TimeWindow};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{created, ApiResult, AppState, ValidJson};
use crate::auth::{Actor, Role};
use crate::error::ServiceError;
use crate::scheduling::BookingRequest;

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BookAppointmentBody {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default = "default_appointment_type")]
    pub appointment_type: AppointmentType,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub symptoms: Vec<String>,
}

fn default_appointment_type() -> AppointmentType {
    AppointmentType::Consultation
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusBody {
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NotesBody {
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

pub(super) async fn available_slots(
    State(state): State<AppState>,
    _actor: Actor,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> ApiResult<Json<Vec<TimeWindow>>> {
    let slots = state.clinic.slots.available_slots(doctor_id, query.date).await?;
    Ok(Json(slots))
}

pub(super) async fn doctor_agenda(
    State(state): State<AppState>,
    actor: Actor,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> ApiResult<Json<Vec<Appointment>>> {
    // A agenda completa expõe dados de outros pacientes
    let own_agenda = actor.role == Role::Doctor && actor.id == doctor_id;
    if !own_agenda && !actor.role.is_staff() {
        return Err(ServiceError::forbidden("Agenda restrita ao próprio médico e a funcionários").into());
    }
    let appointments = state
        .clinic
        .ledger
        .list_for_doctor_on(doctor_id, query.date)
        .await?;
    Ok(Json(appointments))
}

pub(super) async fn patient_appointments(
    State(state): State<AppState>,
    actor: Actor,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Appointment>>> {
    actor.require_self_or_staff(patient_id, "Consulta de agendamentos")?;
    let appointments = state.clinic.ledger.list_for_patient(patient_id).await?;
    Ok(Json(appointments))
}

pub(super) async fn book(
    State(state): State<AppState>,
    actor: Actor,
    ValidJson(body): ValidJson<BookAppointmentBody>,
) -> ApiResult<Response> {
    let request = BookingRequest {
        patient_id: body.patient_id,
        doctor_id: body.doctor_id,
        appointment_date: body.appointment_date,
        start_time: body.start_time,
        end_time: body.end_time,
        appointment_type: body.appointment_type,
        reason: body.reason,
        symptoms: body.symptoms,
    };
    let appointment = state.clinic.ledger.book(&actor, request).await?;
    Ok(created(appointment))
}

pub(super) async fn get_appointment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    let appointment = state.clinic.ledger.get(id).await?;
    let visible = match actor.role {
        Role::Patient => appointment.patient_id == actor.id,
        Role::Doctor => appointment.doctor_id == actor.id,
        Role::Staff | Role::Admin => true,
    };
    if !visible {
        return Err(ServiceError::forbidden("Consulta de outro paciente ou médico").into());
    }
    Ok(Json(appointment))
}

pub(super) async fn set_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<StatusBody>,
) -> ApiResult<Json<Appointment>> {
    let appointment = state.clinic.ledger.set_status(&actor, id, body.status).await?;
    Ok(Json(appointment))
}

pub(super) async fn capture_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    let appointment = state.clinic.ledger.set_payment_captured(&actor, id).await?;
    Ok(Json(appointment))
}

pub(super) async fn update_notes(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<NotesBody>,
) -> ApiResult<Json<Appointment>> {
    let appointment = state.clinic.ledger.update_notes(&actor, id, body.notes).await?;
    Ok(Json(appointment))
}
