//! Definições de erro para a biblioteca clinic-db
//!
//! Este módulo define os tipos de erro usados pela camada de persistência

use thiserror::Error;

/// Marcador levantado pelo gatilho `appointments_no_overlap` quando um
/// agendamento se sobrepõe a outro não cancelado do mesmo médico/dia
pub const APPOINTMENT_CONFLICT_MARKER: &str = "appointment_conflict";

/// Códigos estendidos do SQLite tratados como violação de restrição
/// (UNIQUE, PRIMARY KEY e RAISE dentro de gatilho)
const CONSTRAINT_CODES: &[&str] = &["2067", "1555", "1811"];

/// Erros específicos para operações de banco de dados
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Erro de conexão com banco de dados: {0}")]
    ConnectionError(String),

    #[error("Erro de consulta: {0}")]
    QueryError(String),

    #[error("Entidade não encontrada: {0}")]
    NotFound(String),

    #[error("Violação de restrição: {0}")]
    ConstraintViolation(String),

    #[error("Erro interno: {0}")]
    InternalError(String),
}

impl DbError {
    /// Indica se a violação veio do gatilho de sobreposição de horários
    pub fn is_appointment_conflict(&self) -> bool {
        matches!(self, DbError::ConstraintViolation(msg) if msg.contains(APPOINTMENT_CONFLICT_MARKER))
    }

    /// Indica se a violação envolve a coluna informada (ex.: `health_cards.patient_id`)
    pub fn violates(&self, column: &str) -> bool {
        matches!(self, DbError::ConstraintViolation(msg) if msg.contains(column))
    }
}

/// Conversão de erros específicos do SQLx para nossos tipos de erro
impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DbError::NotFound("Registro não encontrado".to_string()),
            sqlx::Error::Database(dbe) => {
                let message = dbe.message().to_string();
                if message.contains(APPOINTMENT_CONFLICT_MARKER) || dbe.is_unique_violation() {
                    return DbError::ConstraintViolation(message);
                }
                if let Some(code) = dbe.code() {
                    if CONSTRAINT_CODES.contains(&code.as_ref()) {
                        return DbError::ConstraintViolation(message);
                    }
                }
                DbError::QueryError(message)
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::QueryError(format!("Coluna não encontrada: {}", col))
            }
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::QueryError(format!("Tipo não encontrado: {}", type_name))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::QueryError(format!("Erro ao decodificar coluna {}: {}", index, source))
            }
            sqlx::Error::Io(io_err) => DbError::ConnectionError(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => DbError::ConnectionError(conf_err.to_string()),
            sqlx::Error::PoolClosed => {
                DbError::ConnectionError("Pool de conexões fechado".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionError("Timeout no pool de conexões".to_string())
            }
            sqlx::Error::WorkerCrashed => {
                DbError::InternalError("Worker do banco de dados falhou".to_string())
            }
            _ => DbError::InternalError(format!("Erro inesperado: {:?}", error)),
        }
    }
}
