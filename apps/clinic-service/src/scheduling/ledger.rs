//! Livro de agendamentos
//!
//! Responsável pela regra de conflito na gravação e pela máquina de estados
//! das consultas. O gatilho `appointments_no_overlap` é a barreira final
//! contra agendamento duplo; a consulta de horários livres é só indicativa.

use chrono::{NaiveDate, NaiveTime};
use clinic_db::models::{Appointment, AppointmentStatus, AppointmentType, TIME_FORMAT};
use clinic_db::DbError;
use sqlx::types::Json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{Actor, Role};
use crate::clock::Clock;
use crate::directory::Directory;
use crate::error::{ServiceError, ServiceResult};

/// Dados de um novo agendamento
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub appointment_type: AppointmentType,
    pub reason: String,
    pub symptoms: Vec<String>,
}

pub struct AppointmentLedger {
    pool: SqlitePool,
    directory: Directory,
    clock: Arc<dyn Clock>,
}

impl AppointmentLedger {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory: Directory::new(pool.clone()),
            pool,
            clock,
        }
    }

    /// Agenda uma consulta no estado `scheduled`, sem pagamento
    pub async fn book(&self, actor: &Actor, request: BookingRequest) -> ServiceResult<Appointment> {
        info!(
            "Agendando consulta para paciente {} com médico {} em {} {}-{}",
            request.patient_id,
            request.doctor_id,
            request.appointment_date,
            request.start_time.format(TIME_FORMAT),
            request.end_time.format(TIME_FORMAT)
        );

        if actor.role == Role::Doctor {
            return Err(ServiceError::forbidden("Médicos não podem agendar consultas"));
        }
        actor.require_self_or_staff(request.patient_id, "Agendamento")?;

        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::validation("reason", "O motivo da consulta é obrigatório"));
        }
        if request.start_time >= request.end_time {
            return Err(ServiceError::validation(
                "end_time",
                "O horário de término deve ser posterior ao de início",
            ));
        }
        let today = self.clock.now().date_naive();
        if request.appointment_date < today {
            return Err(ServiceError::validation(
                "appointment_date",
                format!("A data {} já passou", request.appointment_date),
            ));
        }

        let patient = self.directory.require_patient(request.patient_id).await?;
        let doctor = self.directory.require_doctor(request.doctor_id).await?;
        if !doctor.is_active {
            return Err(ServiceError::validation(
                "doctor_id",
                "O médico não está atendendo no momento",
            ));
        }

        let now = self.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            doctor_id: doctor.id,
            appointment_date: request.appointment_date,
            start_time: request.start_time,
            end_time: request.end_time,
            appointment_type: request.appointment_type,
            patient: patient.snapshot(),
            doctor: doctor.snapshot(),
            consultation_fee_cents: doctor.consultation_fee_cents,
            reason: reason.to_string(),
            symptoms: request.symptoms,
            status: AppointmentStatus::Scheduled,
            payment_status: false,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        // A verificação de sobreposição roda no gatilho, dentro da mesma
        // escrita; duas reservas simultâneas nunca passam juntas
        let inserted = sqlx::query(
            r#"
            INSERT INTO appointments (
                id, patient_id, doctor_id, appointment_date, start_time, end_time, type,
                patient_name, patient_email, patient_phone, doctor_name, doctor_specialization,
                consultation_fee_cents, reason, symptoms, status, payment_status, notes,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(appointment.id)
        .bind(appointment.patient_id)
        .bind(appointment.doctor_id)
        .bind(appointment.appointment_date)
        .bind(appointment.start_time.format(TIME_FORMAT).to_string())
        .bind(appointment.end_time.format(TIME_FORMAT).to_string())
        .bind(appointment.appointment_type.as_str())
        .bind(&appointment.patient.name)
        .bind(&appointment.patient.email)
        .bind(&appointment.patient.phone)
        .bind(&appointment.doctor.name)
        .bind(&appointment.doctor.specialization)
        .bind(appointment.consultation_fee_cents)
        .bind(&appointment.reason)
        .bind(Json(&appointment.symptoms))
        .bind(appointment.status.as_str())
        .bind(appointment.payment_status)
        .bind(&appointment.notes)
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from);

        match inserted {
            Ok(_) => {
                info!("Consulta {} agendada com sucesso", appointment.id);
                Ok(appointment)
            }
            Err(e) if e.is_appointment_conflict() => {
                warn!(
                    "Conflito de horário para médico {} em {} às {}",
                    request.doctor_id,
                    request.appointment_date,
                    request.start_time.format(TIME_FORMAT)
                );
                Err(ServiceError::Conflict(format!(
                    "O médico já possui consulta que se sobrepõe a {}-{} em {}",
                    appointment.start_time.format(TIME_FORMAT),
                    appointment.end_time.format(TIME_FORMAT),
                    appointment.appointment_date
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<Appointment> {
        sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Consulta", id))
    }

    /// Agenda do médico em uma data, em ordem de horário
    pub async fn list_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> ServiceResult<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE doctor_id = ? AND appointment_date = ? ORDER BY start_time",
        )
        .bind(doctor_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(appointments)
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> ServiceResult<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE patient_id = ? ORDER BY appointment_date, start_time",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(appointments)
    }

    /// Avança o status da consulta conforme o papel do usuário
    pub async fn set_status(
        &self,
        actor: &Actor,
        id: Uuid,
        target: AppointmentStatus,
    ) -> ServiceResult<Appointment> {
        let mut appointment = self.get(id).await?;
        authorize_transition(actor, &appointment, target)?;

        // Compare-and-set sobre o status lido: uma transição concorrente faz
        // esta falhar em vez de sobrescrever um estado terminal
        let now = self.clock.now();
        let result = sqlx::query(
            "UPDATE appointments SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(target.as_str())
        .bind(now)
        .bind(id)
        .bind(appointment.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!("Status da consulta {} mudou durante a transição", id);
            return Err(ServiceError::Conflict(format!(
                "O status da consulta {} foi alterado por outra operação",
                id
            )));
        }

        info!(
            "Consulta {}: {} -> {} por {:?}",
            id, appointment.status, target, actor.role
        );
        appointment.status = target;
        appointment.updated_at = now;
        Ok(appointment)
    }

    /// Marca o pagamento como realizado; idempotente e sem efeito no status
    pub async fn set_payment_captured(&self, actor: &Actor, id: Uuid) -> ServiceResult<Appointment> {
        let mut appointment = self.get(id).await?;
        actor.require_self_or_staff(appointment.patient_id, "Registro de pagamento")?;

        if appointment.payment_status {
            debug!("Pagamento da consulta {} já registrado", id);
            return Ok(appointment);
        }

        let now = self.clock.now();
        sqlx::query("UPDATE appointments SET payment_status = 1, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!("Pagamento da consulta {} registrado", id);
        appointment.payment_status = true;
        appointment.updated_at = now;
        Ok(appointment)
    }

    /// Atualiza as anotações clínicas (médico ou funcionário)
    pub async fn update_notes(
        &self,
        actor: &Actor,
        id: Uuid,
        notes: Option<String>,
    ) -> ServiceResult<Appointment> {
        if !(actor.role == Role::Doctor || actor.role.is_staff()) {
            return Err(ServiceError::forbidden(
                "Somente médicos e funcionários podem editar anotações",
            ));
        }
        let mut appointment = self.get(id).await?;
        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let now = self.clock.now();
        sqlx::query("UPDATE appointments SET notes = ?, updated_at = ? WHERE id = ?")
            .bind(&notes)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!("Anotações da consulta {} atualizadas", id);
        appointment.notes = notes;
        appointment.updated_at = now;
        Ok(appointment)
    }
}

/// Estados alcançáveis a partir do status atual
pub fn allowed_targets(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    match current {
        AppointmentStatus::Scheduled | AppointmentStatus::Confirmed => &[
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ],
        AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow => {
            &[]
        }
    }
}

/// Regras de transição por papel
///
/// Médicos e funcionários movem qualquer consulta não terminal; o paciente só
/// cancela a própria consulta enquanto ela está `scheduled`.
pub fn authorize_transition(
    actor: &Actor,
    appointment: &Appointment,
    target: AppointmentStatus,
) -> ServiceResult<()> {
    match actor.role {
        Role::Doctor | Role::Staff | Role::Admin => {}
        Role::Patient => {
            let own = appointment.patient_id == actor.id;
            let is_cancel = appointment.status == AppointmentStatus::Scheduled
                && target == AppointmentStatus::Cancelled;
            if !own || !is_cancel {
                return Err(ServiceError::forbidden(
                    "Pacientes só podem cancelar as próprias consultas ainda não confirmadas",
                ));
            }
        }
    }

    if appointment.status.is_terminal() {
        return Err(ServiceError::Conflict(format!(
            "A consulta {} já está em estado final ({})",
            appointment.id, appointment.status
        )));
    }
    if !allowed_targets(appointment.status).contains(&target) {
        return Err(ServiceError::Conflict(format!(
            "Transição inválida: {} -> {}",
            appointment.status, target
        )));
    }
    Ok(())
}
