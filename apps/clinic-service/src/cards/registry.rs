//! Registro de carteirinhas de saúde
//!
//! Emissão (uma por paciente), cálculo de validade, bloqueio e atualização.
//! O status gravado é apenas um cache: a validade é sempre recalculada a
//! partir de `is_blocked`, `expiry_date` e do relógio.

use chrono::{DateTime, Datelike, Utc};
use clinic_db::models::{BloodType, CardStatus, EmergencyContact, HealthCard, PatientSnapshot};
use clinic_db::DbError;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Actor;
use crate::clock::Clock;
use crate::directory::Directory;
use crate::error::{ServiceError, ServiceResult};

/// Motivo gravado quando o bloqueio não informa um
pub const DEFAULT_BLOCK_REASON: &str = "Bloqueada pela administração";

/// Campos imutáveis que não podem aparecer em uma atualização
const IMMUTABLE_FIELDS: &[(&str, &str)] = &[
    ("card_number", "cardNumber"),
    ("patient_id", "patientId"),
    ("issue_date", "issueDate"),
];

/// Pedido de emissão direta
#[derive(Debug, Clone, Default)]
pub struct IssueCard {
    pub patient_id: Uuid,
    pub expiry_date: Option<DateTime<Utc>>,
    pub blood_type: Option<BloodType>,
    pub allergies: Option<Vec<String>>,
    pub emergency_contact: Option<EmergencyContact>,
}

/// Dados médicos já resolvidos (informados ou do cadastro do paciente)
#[derive(Debug, Clone)]
pub(crate) struct CardMedical {
    pub blood_type: Option<BloodType>,
    pub allergies: Vec<String>,
    pub emergency_contact: Option<EmergencyContact>,
}

/// Atualização parcial; somente os campos presentes são alterados
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CardUpdate {
    #[serde(default, alias = "expiryDate")]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "bloodType")]
    pub blood_type: Option<BloodType>,
    #[serde(default)]
    pub allergies: Option<Vec<String>>,
    #[serde(default, alias = "emergencyContact")]
    pub emergency_contact: Option<EmergencyContact>,
}

impl CardUpdate {
    /// Interpreta um corpo JSON, rejeitando campos imutáveis pelo nome
    pub fn from_json(value: serde_json::Value) -> ServiceResult<Self> {
        if let Some(object) = value.as_object() {
            for (snake, camel) in IMMUTABLE_FIELDS {
                if object.contains_key(*snake) || object.contains_key(*camel) {
                    return Err(ServiceError::validation(
                        *snake,
                        format!("O campo {} é imutável após a emissão", snake),
                    ));
                }
            }
        }
        serde_json::from_value(value)
            .map_err(|e| ServiceError::validation("body", format!("Atualização inválida: {}", e)))
    }

    pub fn is_empty(&self) -> bool {
        self == &CardUpdate::default()
    }
}

/// Resultado da conferência de uma carteirinha pelo número
#[derive(Debug, Clone, Serialize)]
pub struct CardVerification {
    pub card_number: String,
    pub patient_name: String,
    pub status: CardStatus,
    pub valid: bool,
    pub expiry_date: DateTime<Utc>,
}

pub struct HealthCardRegistry {
    pool: SqlitePool,
    directory: Directory,
    clock: Arc<dyn Clock>,
}

impl HealthCardRegistry {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory: Directory::new(pool.clone()),
            pool,
            clock,
        }
    }

    /// Emissão direta pela administração
    pub async fn issue(&self, actor: &Actor, request: IssueCard) -> ServiceResult<HealthCard> {
        actor.require_admin("Emissão de carteirinha")?;
        let now = self.clock.now();
        let expiry_date = validate_expiry(request.expiry_date, now)?;

        let patient = self.directory.require_patient(request.patient_id).await?;
        let medical = CardMedical {
            blood_type: request.blood_type.or(patient.blood_type),
            allergies: request.allergies.unwrap_or_else(|| patient.allergies.clone()),
            emergency_contact: request
                .emergency_contact
                .or_else(|| patient.emergency_contact.clone()),
        };

        let mut tx = self.pool.begin().await?;
        let card = insert_card(&mut tx, patient.id, patient.snapshot(), medical, expiry_date, now).await?;
        tx.commit().await?;

        info!(
            "Carteirinha {} emitida para paciente {}",
            card.card_number, card.patient_id
        );
        Ok(card)
    }

    /// Validade no instante atual; não altera nada
    pub fn is_valid(&self, card: &HealthCard) -> bool {
        card.is_valid_at(self.clock.now())
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<HealthCard> {
        let card = self.load(id).await?;
        self.sync_status(card).await
    }

    pub async fn for_patient(&self, patient_id: Uuid) -> ServiceResult<HealthCard> {
        let card = sqlx::query_as::<_, HealthCard>("SELECT * FROM health_cards WHERE patient_id = ?")
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Carteirinha do paciente", patient_id))?;
        self.sync_status(card).await
    }

    /// Conferência na recepção a partir do número impresso
    pub async fn verify(&self, card_number: &str) -> ServiceResult<CardVerification> {
        let card = sqlx::query_as::<_, HealthCard>("SELECT * FROM health_cards WHERE card_number = ?")
            .bind(card_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Carteirinha", card_number))?;
        let card = self.sync_status(card).await?;

        Ok(CardVerification {
            valid: self.is_valid(&card),
            card_number: card.card_number,
            patient_name: card.patient.name,
            status: card.status,
            expiry_date: card.expiry_date,
        })
    }

    /// Bloqueia a carteirinha; bloquear de novo apenas troca o motivo
    pub async fn block(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> ServiceResult<HealthCard> {
        actor.require_staff("Bloqueio de carteirinha")?;
        let mut card = self.load(id).await?;
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_BLOCK_REASON.to_string());
        let now = self.clock.now();

        sqlx::query(
            "UPDATE health_cards SET is_blocked = 1, block_reason = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&reason)
        .bind(CardStatus::Blocked.as_str())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        warn!("Carteirinha {} bloqueada: {}", card.card_number, reason);
        card.is_blocked = true;
        card.block_reason = Some(reason);
        card.status = CardStatus::Blocked;
        card.updated_at = now;
        Ok(card)
    }

    /// Desbloqueia e volta o status para `active`, sem checar a validade;
    /// `is_valid` continua refletindo uma eventual expiração
    pub async fn unblock(&self, actor: &Actor, id: Uuid) -> ServiceResult<HealthCard> {
        actor.require_staff("Desbloqueio de carteirinha")?;
        let mut card = self.load(id).await?;
        let now = self.clock.now();

        sqlx::query(
            "UPDATE health_cards SET is_blocked = 0, block_reason = NULL, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(CardStatus::Active.as_str())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        info!("Carteirinha {} desbloqueada", card.card_number);
        card.is_blocked = false;
        card.block_reason = None;
        card.status = CardStatus::Active;
        card.updated_at = now;
        Ok(card)
    }

    /// Atualização parcial dos campos mutáveis
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: CardUpdate,
    ) -> ServiceResult<HealthCard> {
        actor.require_staff("Atualização de carteirinha")?;
        let mut card = self.load(id).await?;
        if changes.is_empty() {
            debug!("Atualização vazia para carteirinha {}", card.card_number);
            return self.sync_status(card).await;
        }

        if let Some(expiry_date) = changes.expiry_date {
            if expiry_date <= card.issue_date {
                return Err(ServiceError::validation(
                    "expiry_date",
                    "A validade deve ser posterior à data de emissão",
                ));
            }
            card.expiry_date = expiry_date;
        }
        if let Some(blood_type) = changes.blood_type {
            card.blood_type = Some(blood_type);
        }
        if let Some(allergies) = changes.allergies {
            card.allergies = allergies;
        }
        if let Some(contact) = changes.emergency_contact {
            card.emergency_contact = Some(contact);
        }

        let now = self.clock.now();
        card.status = card.derived_status(now);
        card.updated_at = now;

        sqlx::query(
            r#"
            UPDATE health_cards
            SET expiry_date = ?, blood_type = ?, allergies = ?, emergency_contact = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(card.expiry_date)
        .bind(card.blood_type.map(|b| b.as_str()))
        .bind(Json(&card.allergies))
        .bind(card.emergency_contact.as_ref().map(Json))
        .bind(card.status.as_str())
        .bind(card.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        info!("Carteirinha {} atualizada", card.card_number);
        Ok(card)
    }

    async fn load(&self, id: Uuid) -> ServiceResult<HealthCard> {
        sqlx::query_as::<_, HealthCard>("SELECT * FROM health_cards WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Carteirinha", id))
    }

    /// Mantém o cache de status em dia com o relógio
    async fn sync_status(&self, mut card: HealthCard) -> ServiceResult<HealthCard> {
        let derived = card.derived_status(self.clock.now());
        if derived != card.status {
            debug!(
                "Status da carteirinha {}: {} -> {}",
                card.card_number, card.status, derived
            );
            sqlx::query("UPDATE health_cards SET status = ? WHERE id = ?")
                .bind(derived.as_str())
                .bind(card.id)
                .execute(&self.pool)
                .await?;
            card.status = derived;
        }
        Ok(card)
    }
}

/// A validade é obrigatória e precisa estar no futuro
pub(crate) fn validate_expiry(
    expiry_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ServiceResult<DateTime<Utc>> {
    match expiry_date {
        None => Err(ServiceError::validation(
            "expiry_date",
            "A data de validade é obrigatória",
        )),
        Some(expiry) if expiry <= now => Err(ServiceError::validation(
            "expiry_date",
            format!(
                "A validade {} deve ser posterior à emissão",
                expiry.format("%Y-%m-%d %H:%M")
            ),
        )),
        Some(expiry) => Ok(expiry),
    }
}

/// Número da carteirinha: `HC-<ano>-<sequência>`
pub fn format_card_number(year: i32, sequence: i64) -> String {
    format!("HC-{}-{:06}", year, sequence)
}

/// Grava uma carteirinha dentro da transação do chamador
///
/// A primeira instrução é uma escrita (sequência), para que transações
/// concorrentes esperem pelo lock em vez de falhar com snapshot antigo.
pub(crate) async fn insert_card(
    conn: &mut SqliteConnection,
    patient_id: Uuid,
    patient: PatientSnapshot,
    medical: CardMedical,
    expiry_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ServiceResult<HealthCard> {
    let sequence = sqlx::query("INSERT INTO card_number_sequence (issued_at) VALUES (?)")
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    let existing: Option<String> =
        sqlx::query_scalar("SELECT card_number FROM health_cards WHERE patient_id = ?")
            .bind(patient_id)
            .fetch_optional(&mut *conn)
            .await?;
    if let Some(card_number) = existing {
        warn!("Paciente {} já possui a carteirinha {}", patient_id, card_number);
        return Err(ServiceError::Conflict(format!(
            "O paciente já possui a carteirinha {}",
            card_number
        )));
    }

    let card = HealthCard {
        id: Uuid::new_v4(),
        card_number: format_card_number(now.year(), sequence),
        patient_id,
        patient,
        blood_type: medical.blood_type,
        allergies: medical.allergies,
        emergency_contact: medical.emergency_contact,
        issue_date: now,
        expiry_date,
        status: CardStatus::Active,
        is_blocked: false,
        block_reason: None,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO health_cards (
            id, card_number, patient_id, patient_name, patient_email, patient_phone,
            blood_type, allergies, emergency_contact, issue_date, expiry_date,
            status, is_blocked, block_reason, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(card.id)
    .bind(&card.card_number)
    .bind(card.patient_id)
    .bind(&card.patient.name)
    .bind(&card.patient.email)
    .bind(&card.patient.phone)
    .bind(card.blood_type.map(|b| b.as_str()))
    .bind(Json(&card.allergies))
    .bind(card.emergency_contact.as_ref().map(Json))
    .bind(card.issue_date)
    .bind(card.expiry_date)
    .bind(card.status.as_str())
    .bind(card.is_blocked)
    .bind(&card.block_reason)
    .bind(card.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        err if err.violates("health_cards.patient_id") => {
            ServiceError::Conflict("O paciente já possui uma carteirinha".to_string())
        }
        err => err.into(),
    })?;

    Ok(card)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::clock::FixedClock;
    use anyhow::Result;
    use chrono::{Duration, TimeZone};
    use clinic_db::fixtures::{seed_patient, test_db, TestDb};
    use clinic_db::models::PatientRecord;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Admin)
    }

    struct Setup {
        _db: TestDb,
        clock: Arc<FixedClock>,
        registry: HealthCardRegistry,
        patient: PatientRecord,
    }

    async fn setup() -> Result<Setup> {
        let db = test_db().await?;
        let clock = Arc::new(FixedClock::new(start()));
        let patient = seed_patient(&db.pool, "Paula", "Dias", Some(BloodType::BPositive), &["penicilina"]).await?;
        let registry = HealthCardRegistry::new(db.pool.clone(), clock.clone());
        Ok(Setup { _db: db, clock, registry, patient })
    }

    fn issue_for(patient: &PatientRecord, expiry: Option<DateTime<Utc>>) -> IssueCard {
        IssueCard {
            patient_id: patient.id,
            expiry_date: expiry,
            ..IssueCard::default()
        }
    }

    #[tokio::test]
    async fn test_issue_defaults_to_patient_on_file_values() -> Result<()> {
        let s = setup().await?;
        let card = s
            .registry
            .issue(&admin(), issue_for(&s.patient, Some(start() + Duration::days(365))))
            .await?;

        assert_eq!(card.status, CardStatus::Active);
        assert!(!card.is_blocked);
        assert_eq!(card.issue_date, start());
        assert_eq!(card.blood_type, Some(BloodType::BPositive));
        assert_eq!(card.allergies, vec!["penicilina".to_string()]);
        assert_eq!(card.patient.name, "Paula Dias");
        assert_eq!(card.patient.phone, s.patient.phone);
        assert!(card.card_number.starts_with("HC-2025-"));
        assert!(s.registry.is_valid(&card));

        let explicit = IssueCard {
            blood_type: Some(BloodType::ONegative),
            allergies: Some(vec![]),
            ..issue_for(&s.patient, Some(start() + Duration::days(1)))
        };
        // Segunda emissão para o mesmo paciente sempre conflita
        assert!(matches!(
            s.registry.issue(&admin(), explicit).await,
            Err(ServiceError::Conflict(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_issue_requires_future_expiry() -> Result<()> {
        let s = setup().await?;

        let missing = s.registry.issue(&admin(), issue_for(&s.patient, None)).await;
        assert!(matches!(missing, Err(ServiceError::Validation { field, .. }) if field == "expiry_date"));

        let yesterday = s
            .registry
            .issue(&admin(), issue_for(&s.patient, Some(start() - Duration::days(1))))
            .await;
        assert!(matches!(yesterday, Err(ServiceError::Validation { .. })));

        let unknown = IssueCard {
            patient_id: Uuid::new_v4(),
            expiry_date: Some(start() + Duration::days(30)),
            ..IssueCard::default()
        };
        assert!(matches!(
            s.registry.issue(&admin(), unknown).await,
            Err(ServiceError::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_issue_is_admin_only() -> Result<()> {
        let s = setup().await?;
        let staff = Actor::new(Uuid::new_v4(), Role::Staff);
        let result = s
            .registry
            .issue(&staff, issue_for(&s.patient, Some(start() + Duration::days(30))))
            .await;
        assert!(matches!(result, Err(ServiceError::Authorization(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_card_numbers_are_unique_and_increasing() -> Result<()> {
        let s = setup().await?;
        let other = seed_patient(&s._db.pool, "Igor", "Nunes", None, &[]).await?;
        let expiry = Some(start() + Duration::days(30));

        let first = s.registry.issue(&admin(), issue_for(&s.patient, expiry)).await?;
        let second = s.registry.issue(&admin(), issue_for(&other, expiry)).await?;
        assert_ne!(first.card_number, second.card_number);
        assert!(first.card_number < second.card_number);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_issue_only_one_card() -> Result<()> {
        let s = setup().await?;
        let expiry = Some(start() + Duration::days(30));
        let actor = admin();

        let (a, b) = tokio::join!(
            s.registry.issue(&actor, issue_for(&s.patient, expiry)),
            s.registry.issue(&actor, issue_for(&s.patient, expiry))
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(a, Err(ServiceError::Conflict(_))) || matches!(b, Err(ServiceError::Conflict(_))));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM health_cards WHERE patient_id = ?")
            .bind(s.patient.id)
            .fetch_one(&s._db.pool)
            .await?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_validity_is_pure_function_of_state_and_time() -> Result<()> {
        let s = setup().await?;
        let card = s
            .registry
            .issue(&admin(), issue_for(&s.patient, Some(start() + Duration::days(10))))
            .await?;

        // Chamadas repetidas não mudam nada
        for _ in 0..3 {
            assert!(s.registry.is_valid(&card));
        }
        assert!(card.is_valid_at(start() + Duration::days(10) - Duration::seconds(1)));
        assert!(!card.is_valid_at(start() + Duration::days(10)));

        s.clock.advance(Duration::days(11));
        assert!(!s.registry.is_valid(&card));
        // O registro em memória não foi alterado pela consulta de validade
        assert_eq!(card.status, CardStatus::Active);

        // A leitura sincroniza o cache de status
        let reloaded = s.registry.get(card.id).await?;
        assert_eq!(reloaded.status, CardStatus::Expired);
        Ok(())
    }

    #[tokio::test]
    async fn test_block_and_unblock_scenario() -> Result<()> {
        let s = setup().await?;
        let staff = Actor::new(Uuid::new_v4(), Role::Staff);
        let card = s
            .registry
            .issue(&admin(), issue_for(&s.patient, Some(start() + Duration::days(90))))
            .await?;

        let blocked = s.registry.block(&staff, card.id, Some("lost".to_string())).await?;
        assert!(!s.registry.is_valid(&blocked));
        assert_eq!(blocked.status, CardStatus::Blocked);
        assert_eq!(blocked.block_reason.as_deref(), Some("lost"));

        // Bloquear de novo só troca o motivo
        let reblocked = s.registry.block(&staff, card.id, None).await?;
        assert_eq!(reblocked.block_reason.as_deref(), Some(DEFAULT_BLOCK_REASON));
        assert_eq!(s.registry.get(card.id).await?.status, CardStatus::Blocked);

        let unblocked = s.registry.unblock(&staff, card.id).await?;
        assert!(s.registry.is_valid(&unblocked));
        assert_eq!(unblocked.block_reason, None);
        assert_eq!(s.registry.get(card.id).await?.status, CardStatus::Active);

        let patient = Actor::new(s.patient.id, Role::Patient);
        assert!(matches!(
            s.registry.block(&patient, card.id, None).await,
            Err(ServiceError::Authorization(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_unblock_of_expired_card_stays_invalid() -> Result<()> {
        let s = setup().await?;
        let staff = Actor::new(Uuid::new_v4(), Role::Staff);
        let card = s
            .registry
            .issue(&admin(), issue_for(&s.patient, Some(start() + Duration::days(1))))
            .await?;
        s.registry.block(&staff, card.id, None).await?;
        s.clock.advance(Duration::days(5));

        let unblocked = s.registry.unblock(&staff, card.id).await?;
        assert_eq!(unblocked.status, CardStatus::Active);
        assert!(!s.registry.is_valid(&unblocked));
        assert_eq!(s.registry.get(card.id).await?.status, CardStatus::Expired);
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_update_and_immutable_fields() -> Result<()> {
        let s = setup().await?;
        let staff = Actor::new(Uuid::new_v4(), Role::Staff);
        let card = s
            .registry
            .issue(&admin(), issue_for(&s.patient, Some(start() + Duration::days(30))))
            .await?;

        let changes = CardUpdate::from_json(serde_json::json!({
            "expiryDate": "2027-01-01T00:00:00Z",
            "allergies": ["látex"]
        }))?;
        let updated = s.registry.update(&staff, card.id, changes).await?;
        assert_eq!(updated.expiry_date, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(updated.allergies, vec!["látex".to_string()]);
        // Campos ausentes ficam intactos
        assert_eq!(updated.blood_type, Some(BloodType::BPositive));
        assert_eq!(updated.card_number, card.card_number);

        for body in [
            serde_json::json!({ "cardNumber": "HC-1" }),
            serde_json::json!({ "patient_id": Uuid::new_v4() }),
            serde_json::json!({ "issueDate": "2020-01-01T00:00:00Z" }),
        ] {
            assert!(matches!(CardUpdate::from_json(body), Err(ServiceError::Validation { .. })));
        }

        let before_issue = CardUpdate {
            expiry_date: Some(start() - Duration::days(1)),
            ..CardUpdate::default()
        };
        assert!(matches!(
            s.registry.update(&staff, card.id, before_issue).await,
            Err(ServiceError::Validation { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_verify_by_card_number() -> Result<()> {
        let s = setup().await?;
        let card = s
            .registry
            .issue(&admin(), issue_for(&s.patient, Some(start() + Duration::days(30))))
            .await?;

        let check = s.registry.verify(&card.card_number).await?;
        assert!(check.valid);
        assert_eq!(check.patient_name, "Paula Dias");
        assert_eq!(check.status, CardStatus::Active);

        assert!(matches!(
            s.registry.verify("HC-0000-000000").await,
            Err(ServiceError::NotFound { .. })
        ));
        assert_eq!(s.registry.for_patient(s.patient.id).await?.id, card.id);
        Ok(())
    }

    #[test]
    fn test_card_number_format() {
        assert_eq!(format_card_number(2025, 42), "HC-2025-000042");
        assert_eq!(format_card_number(2026, 1_234_567), "HC-2026-1234567");
    }
}
