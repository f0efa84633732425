//! Fluxo de solicitação de carteirinha
//!
//! `pending` -> `approved` (emite a carteirinha na mesma transação) ou
//! `rejected` (com motivo). Uma solicitação aprovada sem carteirinha nunca
//! chega a ser gravada: qualquer falha na emissão desfaz a aprovação.

use chrono::{DateTime, Utc};
use clinic_db::models::{
    BloodType, EmergencyContact, HealthCard, HealthCardRequest, RequestStatus,
};
use clinic_db::DbError;
use sqlx::types::Json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Actor;
use crate::cards::registry::{insert_card, validate_expiry, CardMedical};
use crate::clock::Clock;
use crate::directory::Directory;
use crate::error::{ServiceError, ServiceResult};

/// Dados médicos informados pelo paciente
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub patient_id: Uuid,
    pub blood_type: Option<BloodType>,
    /// `None` usa o cadastro na aprovação; uma lista vazia é mantida vazia
    pub allergies: Option<Vec<String>>,
    pub emergency_contact: Option<EmergencyContact>,
}

/// Resultado de uma aprovação: a solicitação e a carteirinha emitida
#[derive(Debug, Clone, serde::Serialize)]
pub struct Approval {
    pub request: HealthCardRequest,
    pub card: HealthCard,
}

pub struct HealthCardRequestWorkflow {
    pool: SqlitePool,
    directory: Directory,
    clock: Arc<dyn Clock>,
}

impl HealthCardRequestWorkflow {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory: Directory::new(pool.clone()),
            pool,
            clock,
        }
    }

    /// Cria uma solicitação `pending`; só uma pendente por paciente
    pub async fn submit(&self, actor: &Actor, request: SubmitRequest) -> ServiceResult<HealthCardRequest> {
        actor.require_self_or_staff(request.patient_id, "Solicitação de carteirinha")?;
        let patient = self.directory.require_patient(request.patient_id).await?;

        let record = HealthCardRequest {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            patient: patient.snapshot(),
            blood_type: request.blood_type,
            allergies: request.allergies,
            emergency_contact: request.emergency_contact,
            status: RequestStatus::Pending,
            rejection_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            health_card_id: None,
            created_at: self.clock.now(),
        };

        // O índice parcial de pendentes é a garantia; o erro vira conflito
        sqlx::query(
            r#"
            INSERT INTO health_card_requests (
                id, patient_id, patient_name, patient_email, patient_phone,
                blood_type, allergies, emergency_contact, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id)
        .bind(record.patient_id)
        .bind(&record.patient.name)
        .bind(&record.patient.email)
        .bind(&record.patient.phone)
        .bind(record.blood_type.map(|b| b.as_str()))
        .bind(record.allergies.as_ref().map(Json))
        .bind(record.emergency_contact.as_ref().map(Json))
        .bind(record.status.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.violates("health_card_requests.patient_id") => {
                warn!("Paciente {} já possui solicitação pendente", record.patient_id);
                ServiceError::Conflict(
                    "Já existe uma solicitação pendente para este paciente".to_string(),
                )
            }
            err => err.into(),
        })?;

        info!("Solicitação {} criada para paciente {}", record.id, record.patient_id);
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<HealthCardRequest> {
        sqlx::query_as::<_, HealthCardRequest>("SELECT * FROM health_card_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Solicitação", id))
    }

    /// Fila de análise, das mais antigas para as mais novas
    pub async fn list_pending(&self) -> ServiceResult<Vec<HealthCardRequest>> {
        let pending = sqlx::query_as::<_, HealthCardRequest>(
            "SELECT * FROM health_card_requests WHERE status = 'pending' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(pending)
    }

    /// Aprova e emite a carteirinha de forma atômica
    ///
    /// A transição é um compare-and-set em `pending`: de duas aprovações
    /// simultâneas só a primeira passa, a outra recebe `Conflict`.
    pub async fn approve(
        &self,
        actor: &Actor,
        id: Uuid,
        expiry_date: Option<DateTime<Utc>>,
    ) -> ServiceResult<Approval> {
        actor.require_staff("Aprovação de solicitação")?;
        let now = self.clock.now();
        let expiry_date = validate_expiry(expiry_date, now)?;

        let request = self.get(id).await?;
        ensure_pending(&request)?;
        let patient = self.directory.require_patient(request.patient_id).await?;

        // Dados de contato vêm do cadastro atual; o que faltar, da solicitação
        let mut snapshot = patient.snapshot();
        if snapshot.phone.is_none() {
            snapshot.phone = request.patient.phone.clone();
        }
        let medical = resolve_medical(&request, patient.blood_type, &patient.allergies, &patient.emergency_contact);

        let mut tx = self.pool.begin().await?;

        let moved = sqlx::query(
            r#"
            UPDATE health_card_requests
            SET status = 'approved', reviewed_by = ?, reviewed_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(actor.id)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if moved.rows_affected() == 0 {
            warn!("Solicitação {} já foi analisada por outra operação", id);
            return Err(ServiceError::Conflict(format!(
                "A solicitação {} não está mais pendente",
                id
            )));
        }

        // Se a emissão falhar, o drop da transação desfaz a aprovação
        let card = insert_card(&mut tx, request.patient_id, snapshot, medical, expiry_date, now).await?;

        sqlx::query("UPDATE health_card_requests SET health_card_id = ? WHERE id = ?")
            .bind(card.id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "Solicitação {} aprovada; carteirinha {} emitida",
            id, card.card_number
        );
        let request = HealthCardRequest {
            status: RequestStatus::Approved,
            reviewed_by: Some(actor.id),
            reviewed_at: Some(now),
            health_card_id: Some(card.id),
            ..request
        };
        Ok(Approval { request, card })
    }

    /// Rejeita com motivo obrigatório; o paciente pode enviar outra depois
    pub async fn reject(&self, actor: &Actor, id: Uuid, reason: &str) -> ServiceResult<HealthCardRequest> {
        actor.require_staff("Rejeição de solicitação")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::validation(
                "rejection_reason",
                "O motivo da rejeição é obrigatório",
            ));
        }

        let request = self.get(id).await?;
        ensure_pending(&request)?;
        let now = self.clock.now();

        let moved = sqlx::query(
            r#"
            UPDATE health_card_requests
            SET status = 'rejected', rejection_reason = ?, reviewed_by = ?, reviewed_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(reason)
        .bind(actor.id)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if moved.rows_affected() == 0 {
            return Err(ServiceError::Conflict(format!(
                "A solicitação {} não está mais pendente",
                id
            )));
        }

        info!("Solicitação {} rejeitada: {}", id, reason);
        Ok(HealthCardRequest {
            status: RequestStatus::Rejected,
            rejection_reason: Some(reason.to_string()),
            reviewed_by: Some(actor.id),
            reviewed_at: Some(now),
            ..request
        })
    }
}

fn ensure_pending(request: &HealthCardRequest) -> ServiceResult<()> {
    if request.status == RequestStatus::Pending {
        Ok(())
    } else {
        Err(ServiceError::Conflict(format!(
            "A solicitação {} já está {}",
            request.id, request.status
        )))
    }
}

/// Campos médicos da solicitação, com o cadastro do paciente como reserva
fn resolve_medical(
    request: &HealthCardRequest,
    on_file_blood_type: Option<BloodType>,
    on_file_allergies: &[String],
    on_file_contact: &Option<EmergencyContact>,
) -> CardMedical {
    CardMedical {
        blood_type: request.blood_type.or(on_file_blood_type),
        allergies: request
            .allergies
            .clone()
            .unwrap_or_else(|| on_file_allergies.to_vec()),
        emergency_contact: request
            .emergency_contact
            .clone()
            .or_else(|| on_file_contact.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::cards::registry::{HealthCardRegistry, IssueCard};
    use crate::clock::FixedClock;
    use anyhow::Result;
    use chrono::{Duration, TimeZone};
    use clinic_db::fixtures::{seed_patient, test_db, TestDb};
    use clinic_db::models::{CardStatus, PatientRecord};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn expiry() -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap())
    }

    fn staff() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Staff)
    }

    struct Setup {
        db: TestDb,
        workflow: HealthCardRequestWorkflow,
        registry: HealthCardRegistry,
        patient: PatientRecord,
    }

    async fn setup() -> Result<Setup> {
        let db = test_db().await?;
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(start()));
        let patient = seed_patient(&db.pool, "Rita", "Moura", Some(BloodType::APositive), &["iodo"]).await?;
        Ok(Setup {
            workflow: HealthCardRequestWorkflow::new(db.pool.clone(), clock.clone()),
            registry: HealthCardRegistry::new(db.pool.clone(), clock),
            db,
            patient,
        })
    }

    fn submission(patient: &PatientRecord) -> SubmitRequest {
        SubmitRequest {
            patient_id: patient.id,
            blood_type: Some(BloodType::ANegative),
            allergies: Some(vec!["amendoim".to_string()]),
            emergency_contact: None,
        }
    }

    async fn approved_without_card(pool: &SqlitePool) -> Result<i64> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM health_card_requests r
            WHERE r.status = 'approved'
              AND NOT EXISTS (SELECT 1 FROM health_cards c WHERE c.patient_id = r.patient_id)
            "#,
        )
        .fetch_one(pool)
        .await?)
    }

    #[tokio::test]
    async fn test_submit_approve_scenario() -> Result<()> {
        let s = setup().await?;
        let patient_actor = Actor::new(s.patient.id, Role::Patient);

        let request = s.workflow.submit(&patient_actor, submission(&s.patient)).await?;
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.patient.name, "Rita Moura");

        // Segunda solicitação antes da análise é recusada
        let duplicate = s.workflow.submit(&patient_actor, submission(&s.patient)).await;
        assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));

        let approval = s.workflow.approve(&staff(), request.id, expiry()).await?;
        assert_eq!(approval.request.status, RequestStatus::Approved);
        assert_eq!(approval.request.health_card_id, Some(approval.card.id));
        assert_eq!(approval.card.expiry_date, expiry().unwrap());
        assert_eq!(approval.card.blood_type, Some(BloodType::ANegative));
        assert_eq!(approval.card.allergies, vec!["amendoim".to_string()]);
        // Contato de emergência ausente na solicitação vem do cadastro
        assert_eq!(approval.card.emergency_contact, s.patient.emergency_contact);
        assert!(s.registry.is_valid(&approval.card));

        let stored = s.workflow.get(request.id).await?;
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(stored.health_card_id, Some(approval.card.id));
        assert_eq!(s.registry.for_patient(s.patient.id).await?.status, CardStatus::Active);
        Ok(())
    }

    #[tokio::test]
    async fn test_explicit_empty_allergies_are_kept_on_card() -> Result<()> {
        let s = setup().await?;
        let request = s
            .workflow
            .submit(
                &staff(),
                SubmitRequest {
                    allergies: Some(vec![]),
                    ..submission(&s.patient)
                },
            )
            .await?;
        assert_eq!(s.workflow.get(request.id).await?.allergies, Some(vec![]));

        let approval = s.workflow.approve(&staff(), request.id, expiry()).await?;
        assert!(approval.card.allergies.is_empty());
        assert!(s.registry.get(approval.card.id).await?.allergies.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_omitted_allergies_come_from_patient_record() -> Result<()> {
        let s = setup().await?;
        let request = s
            .workflow
            .submit(
                &staff(),
                SubmitRequest {
                    allergies: None,
                    ..submission(&s.patient)
                },
            )
            .await?;
        assert_eq!(s.workflow.get(request.id).await?.allergies, None);

        let approval = s.workflow.approve(&staff(), request.id, expiry()).await?;
        assert_eq!(approval.card.allergies, vec!["iodo".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_reject_requires_reason_and_allows_resubmission() -> Result<()> {
        let s = setup().await?;
        let patient_actor = Actor::new(s.patient.id, Role::Patient);
        let request = s.workflow.submit(&patient_actor, submission(&s.patient)).await?;

        let blank = s.workflow.reject(&staff(), request.id, "  ").await;
        assert!(matches!(blank, Err(ServiceError::Validation { .. })));
        assert_eq!(s.workflow.get(request.id).await?.status, RequestStatus::Pending);

        let rejected = s.workflow.reject(&staff(), request.id, "Documento ilegível").await?;
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Documento ilegível"));

        // Terminal: não pode ser aprovada nem rejeitada de novo
        assert!(matches!(
            s.workflow.approve(&staff(), request.id, expiry()).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            s.workflow.reject(&staff(), request.id, "outra vez").await,
            Err(ServiceError::Conflict(_))
        ));

        let again = s.workflow.submit(&patient_actor, submission(&s.patient)).await?;
        assert_eq!(again.status, RequestStatus::Pending);
        assert_eq!(s.workflow.list_pending().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_approval_rolls_back_when_card_already_exists() -> Result<()> {
        let s = setup().await?;
        let patient_actor = Actor::new(s.patient.id, Role::Patient);
        let request = s.workflow.submit(&patient_actor, submission(&s.patient)).await?;

        // Carteirinha emitida por outro caminho enquanto a solicitação aguardava
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        s.registry
            .issue(
                &admin,
                IssueCard {
                    patient_id: s.patient.id,
                    expiry_date: expiry(),
                    ..IssueCard::default()
                },
            )
            .await?;

        let result = s.workflow.approve(&staff(), request.id, expiry()).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));

        // A aprovação foi desfeita por inteiro
        let stored = s.workflow.get(request.id).await?;
        assert_eq!(stored.status, RequestStatus::Pending);
        assert_eq!(stored.health_card_id, None);
        assert_eq!(approved_without_card(&s.db.pool).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_approvals_issue_one_card() -> Result<()> {
        let s = setup().await?;
        let request = s.workflow.submit(&staff(), submission(&s.patient)).await?;
        let reviewer = staff();

        let (a, b) = tokio::join!(
            s.workflow.approve(&reviewer, request.id, expiry()),
            s.workflow.approve(&reviewer, request.id, expiry())
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(a, Err(ServiceError::Conflict(_))) || matches!(b, Err(ServiceError::Conflict(_))));

        let cards: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM health_cards")
            .fetch_one(&s.db.pool)
            .await?;
        assert_eq!(cards, 1);
        assert_eq!(approved_without_card(&s.db.pool).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_approve_validates_expiry_and_role() -> Result<()> {
        let s = setup().await?;
        let request = s.workflow.submit(&staff(), submission(&s.patient)).await?;

        assert!(matches!(
            s.workflow.approve(&staff(), request.id, None).await,
            Err(ServiceError::Validation { .. })
        ));
        assert!(matches!(
            s.workflow.approve(&staff(), request.id, Some(start() - Duration::days(1))).await,
            Err(ServiceError::Validation { .. })
        ));

        let patient_actor = Actor::new(s.patient.id, Role::Patient);
        assert!(matches!(
            s.workflow.approve(&patient_actor, request.id, expiry()).await,
            Err(ServiceError::Authorization(_))
        ));
        assert!(matches!(
            s.workflow.approve(&staff(), Uuid::new_v4(), expiry()).await,
            Err(ServiceError::NotFound { .. })
        ));
        assert_eq!(s.workflow.get(request.id).await?.status, RequestStatus::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_role_gate() -> Result<()> {
        let s = setup().await?;
        let other_patient = Actor::new(Uuid::new_v4(), Role::Patient);
        let doctor = Actor::new(Uuid::new_v4(), Role::Doctor);

        assert!(matches!(
            s.workflow.submit(&other_patient, submission(&s.patient)).await,
            Err(ServiceError::Authorization(_))
        ));
        assert!(matches!(
            s.workflow.submit(&doctor, submission(&s.patient)).await,
            Err(ServiceError::Authorization(_))
        ));
        assert!(s.workflow.list_pending().await?.is_empty());
        Ok(())
    }
}
