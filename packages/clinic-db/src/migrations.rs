//! Sistema de migrações para banco de dados
//!
//! Este módulo gerencia as migrações do banco de dados SQLite. As
//! invariantes de unicidade da agenda e das carteirinhas vivem aqui, no
//! próprio esquema, e não apenas na aplicação.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

/// Lista de migrações SQL a serem aplicadas
const MIGRATIONS: &[&str] = &[
    // 001_directory.sql
    r#"
    -- Cadastro de pacientes (somente leitura para o núcleo)
    CREATE TABLE IF NOT EXISTS patients (
        id BLOB PRIMARY KEY NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT,
        blood_type TEXT,
        allergies TEXT NOT NULL DEFAULT '[]', -- JSON
        emergency_contact TEXT -- JSON
    );

    -- Cadastro de médicos
    CREATE TABLE IF NOT EXISTS doctors (
        id BLOB PRIMARY KEY NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        specialization TEXT NOT NULL,
        consultation_fee_cents INTEGER NOT NULL DEFAULT 0,
        is_active BOOLEAN NOT NULL DEFAULT 1
    );
    "#,
    // 002_appointments.sql
    r#"
    -- Tabela de agendamentos; horários em texto HH:MM (comparação lexical = cronológica)
    CREATE TABLE IF NOT EXISTS appointments (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        doctor_id BLOB NOT NULL,
        appointment_date DATE NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        type TEXT NOT NULL CHECK (type IN ('consultation', 'follow_up', 'checkup', 'emergency')),
        patient_name TEXT NOT NULL,
        patient_email TEXT NOT NULL,
        patient_phone TEXT,
        doctor_name TEXT NOT NULL,
        doctor_specialization TEXT NOT NULL,
        consultation_fee_cents INTEGER NOT NULL,
        reason TEXT NOT NULL,
        symptoms TEXT NOT NULL DEFAULT '[]', -- JSON
        status TEXT NOT NULL CHECK (status IN ('scheduled', 'confirmed', 'completed', 'cancelled', 'no_show')),
        payment_status BOOLEAN NOT NULL DEFAULT 0,
        notes TEXT,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        CHECK (start_time < end_time),
        FOREIGN KEY (patient_id) REFERENCES patients (id),
        FOREIGN KEY (doctor_id) REFERENCES doctors (id)
    );

    -- Impede agendamento duplo: o SQLite serializa escritores, então a
    -- verificação e a inserção acontecem atomicamente
    CREATE TRIGGER IF NOT EXISTS appointments_no_overlap
    BEFORE INSERT ON appointments
    WHEN NEW.status <> 'cancelled' AND EXISTS (
        SELECT 1 FROM appointments a
        WHERE a.doctor_id = NEW.doctor_id
          AND a.appointment_date = NEW.appointment_date
          AND a.status <> 'cancelled'
          AND a.start_time < NEW.end_time
          AND NEW.start_time < a.end_time
    )
    BEGIN
        SELECT RAISE(ABORT, 'appointment_conflict');
    END;

    CREATE INDEX IF NOT EXISTS idx_appointments_doctor_date ON appointments (doctor_id, appointment_date);
    CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments (patient_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments (status);
    "#,
    // 003_health_cards.sql
    r#"
    -- Sequência monotônica usada no sufixo do número da carteirinha
    CREATE TABLE IF NOT EXISTS card_number_sequence (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issued_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    -- Carteirinhas emitidas: no máximo uma por paciente
    CREATE TABLE IF NOT EXISTS health_cards (
        id BLOB PRIMARY KEY NOT NULL,
        card_number TEXT NOT NULL UNIQUE,
        patient_id BLOB NOT NULL UNIQUE,
        patient_name TEXT NOT NULL,
        patient_email TEXT NOT NULL,
        patient_phone TEXT,
        blood_type TEXT,
        allergies TEXT NOT NULL DEFAULT '[]', -- JSON
        emergency_contact TEXT, -- JSON
        issue_date TIMESTAMP NOT NULL,
        expiry_date TIMESTAMP NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('active', 'expired', 'blocked')),
        is_blocked BOOLEAN NOT NULL DEFAULT 0,
        block_reason TEXT,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients (id)
    );

    -- Solicitações de carteirinha feitas pelo paciente
    CREATE TABLE IF NOT EXISTS health_card_requests (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        patient_name TEXT NOT NULL,
        patient_email TEXT NOT NULL,
        patient_phone TEXT,
        blood_type TEXT,
        allergies TEXT, -- JSON; NULL quando não informado na solicitação
        emergency_contact TEXT, -- JSON
        status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
        rejection_reason TEXT,
        reviewed_by BLOB,
        reviewed_at TIMESTAMP,
        health_card_id BLOB,
        created_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients (id),
        FOREIGN KEY (health_card_id) REFERENCES health_cards (id)
    );

    -- No máximo uma solicitação pendente por paciente
    CREATE UNIQUE INDEX IF NOT EXISTS idx_health_card_requests_one_pending
        ON health_card_requests (patient_id) WHERE status = 'pending';
    CREATE INDEX IF NOT EXISTS idx_health_card_requests_status ON health_card_requests (status);
    "#,
];

/// Número de migrações conhecidas por esta versão da biblioteca
pub fn latest_version() -> i64 {
    MIGRATIONS.len() as i64
}

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações de banco de dados...");

    // Obter a versão atual do banco de dados
    let version: i64 = match sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            // Continuar mesmo assim, pois pode ser a primeira execução
            error!("Erro ao obter versão do banco: {}", e);
            0
        }
    };

    info!("Versão atual do banco: {}", version);

    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        // Pular migrações já aplicadas
        if migration_version <= version {
            info!("Migração {} já aplicada", migration_version);
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        let mut transaction = pool.begin().await.with_context(|| {
            format!("Falha ao iniciar transação para migração {}", migration_version)
        })?;

        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao executar migração {}", migration_version))?;

        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao atualizar versão para {}", migration_version))?;

        transaction.commit().await.with_context(|| {
            format!("Falha ao confirmar transação para migração {}", migration_version)
        })?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", latest_version());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnectOptions;
    use tempfile::tempdir;

    async fn fresh_pool(dir: &std::path::Path) -> Result<SqlitePool> {
        let conn_options = SqliteConnectOptions::new()
            .filename(dir.join("test_migrations.db"))
            .create_if_missing(true);
        Ok(SqlitePool::connect_with(conn_options).await?)
    }

    #[tokio::test]
    async fn test_migrations() -> Result<()> {
        let temp_dir = tempdir()?;
        let pool = fresh_pool(temp_dir.path()).await?;

        run_migrations(&pool).await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;
        assert_eq!(version, latest_version());

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&pool)
        .await?;

        for expected in [
            "patients",
            "doctors",
            "appointments",
            "health_cards",
            "health_card_requests",
            "card_number_sequence",
        ] {
            assert!(tables.contains(&expected.to_string()), "tabela ausente: {}", expected);
        }

        let triggers: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='trigger'")
                .fetch_all(&pool)
                .await?;
        assert!(triggers.contains(&"appointments_no_overlap".to_string()));

        Ok(())
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() -> Result<()> {
        let temp_dir = tempdir()?;
        let pool = fresh_pool(temp_dir.path()).await?;

        run_migrations(&pool).await?;
        // Segunda execução não deve reaplicar nada
        run_migrations(&pool).await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;
        assert_eq!(version, latest_version());

        Ok(())
    }
}
