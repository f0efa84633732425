//! Leitura do cadastro de identidades (pacientes e médicos)
//!
//! O núcleo nunca altera este cadastro; apenas copia campos de exibição
//! para os próprios registros no momento da criação.

use clinic_db::models::{DoctorRecord, PatientRecord};
use clinic_db::DbError;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct Directory {
    pool: SqlitePool,
}

impl Directory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn patient(&self, id: Uuid) -> Result<Option<PatientRecord>, DbError> {
        let patient = sqlx::query_as::<_, PatientRecord>("SELECT * FROM patients WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    pub async fn doctor(&self, id: Uuid) -> Result<Option<DoctorRecord>, DbError> {
        let doctor = sqlx::query_as::<_, DoctorRecord>("SELECT * FROM doctors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doctor)
    }

    /// Como `patient`, mas falha com `NotFound` quando o cadastro não existe
    pub async fn require_patient(&self, id: Uuid) -> ServiceResult<PatientRecord> {
        self.patient(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Paciente", id))
    }

    pub async fn require_doctor(&self, id: Uuid) -> ServiceResult<DoctorRecord> {
        self.doctor(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Médico", id))
    }
}
