//! Utilidades de teste: criação de bancos temporários e cadastro de
//! pacientes/médicos, já que o núcleo nunca escreve no cadastro de identidades.

use anyhow::Result;
use sqlx::types::Json;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use crate::models::{BloodType, DoctorRecord, EmergencyContact, PatientRecord};
use crate::{init_db_pool, DbConfig};

/// Banco temporário; o diretório é removido quando a estrutura sai de escopo
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

/// Cria um banco SQLite novo, já migrado, em um diretório temporário
pub async fn test_db() -> Result<TestDb> {
    let dir = tempfile::tempdir()?;
    let config = DbConfig {
        db_path: dir.path().join("clinic-test.db").to_string_lossy().into_owned(),
        max_connections: 4,
        ..DbConfig::default()
    };
    let pool = init_db_pool(&config).await?;
    Ok(TestDb { pool, _dir: dir })
}

/// Cadastra um paciente com dados médicos opcionais
pub async fn seed_patient(
    pool: &SqlitePool,
    first_name: &str,
    last_name: &str,
    blood_type: Option<BloodType>,
    allergies: &[&str],
) -> Result<PatientRecord> {
    let patient = PatientRecord {
        id: Uuid::new_v4(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: format!("{}.{}@exemplo.com", first_name.to_lowercase(), last_name.to_lowercase()),
        phone: Some("+55 11 90000-0000".to_string()),
        blood_type,
        allergies: allergies.iter().map(|a| a.to_string()).collect(),
        emergency_contact: Some(EmergencyContact {
            name: "Contato Padrão".to_string(),
            phone: "+55 11 91111-1111".to_string(),
            relationship: "família".to_string(),
        }),
    };

    sqlx::query(
        r#"
        INSERT INTO patients (id, first_name, last_name, email, phone, blood_type, allergies, emergency_contact)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(patient.id)
    .bind(&patient.first_name)
    .bind(&patient.last_name)
    .bind(&patient.email)
    .bind(&patient.phone)
    .bind(patient.blood_type.map(|b| b.as_str()))
    .bind(Json(&patient.allergies))
    .bind(patient.emergency_contact.as_ref().map(Json))
    .execute(pool)
    .await?;

    Ok(patient)
}

/// Cadastra um médico
pub async fn seed_doctor(
    pool: &SqlitePool,
    first_name: &str,
    last_name: &str,
    specialization: &str,
    consultation_fee_cents: i64,
    is_active: bool,
) -> Result<DoctorRecord> {
    let doctor = DoctorRecord {
        id: Uuid::new_v4(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        specialization: specialization.to_string(),
        consultation_fee_cents,
        is_active,
    };

    sqlx::query(
        r#"
        INSERT INTO doctors (id, first_name, last_name, specialization, consultation_fee_cents, is_active)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(doctor.id)
    .bind(&doctor.first_name)
    .bind(&doctor.last_name)
    .bind(&doctor.specialization)
    .bind(doctor.consultation_fee_cents)
    .bind(doctor.is_active)
    .execute(pool)
    .await?;

    Ok(doctor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_records_decode() -> Result<()> {
        let db = test_db().await?;
        let patient = seed_patient(&db.pool, "Ana", "Souza", Some(BloodType::ONegative), &["dipirona"]).await?;
        let doctor = seed_doctor(&db.pool, "Carlos", "Lima", "Cardiologia", 25_000, true).await?;

        let loaded: PatientRecord = sqlx::query_as("SELECT * FROM patients WHERE id = ?")
            .bind(patient.id)
            .fetch_one(&db.pool)
            .await?;
        assert_eq!(loaded.full_name(), "Ana Souza");
        assert_eq!(loaded.blood_type, Some(BloodType::ONegative));
        assert_eq!(loaded.allergies, vec!["dipirona".to_string()]);
        assert_eq!(loaded.emergency_contact, patient.emergency_contact);

        let loaded: DoctorRecord = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
            .bind(doctor.id)
            .fetch_one(&db.pool)
            .await?;
        assert_eq!(loaded.consultation_fee_cents, 25_000);
        assert!(loaded.is_active);

        Ok(())
    }
}
