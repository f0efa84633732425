//! Taxonomia de erros do núcleo da clínica
//!
//! Todos os erros de domínio são determinísticos: dependem apenas da entrada
//! e do estado persistido. Nenhum é repetido internamente.

use clinic_db::DbError;
use std::fmt::Display;
use thiserror::Error;

/// Erros devolvidos pelas operações de agenda e carteirinhas
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Entrada ausente ou malformada
    #[error("Dados inválidos em '{field}': {message}")]
    Validation { field: String, message: String },

    /// Uma invariante de unicidade ou de estado seria violada
    #[error("Conflito: {0}")]
    Conflict(String),

    /// Identificador referenciado não existe
    #[error("{entity} não encontrado(a): {id}")]
    NotFound { entity: &'static str, id: String },

    /// O papel do usuário não permite a operação
    #[error("Operação não permitida: {0}")]
    Authorization(String),

    /// Falha da camada de persistência, fora da taxonomia de domínio
    #[error("Falha de infraestrutura: {0}")]
    Infrastructure(#[from] DbError),
}

impl ServiceError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Authorization(message.into())
    }

    /// Nome estável do tipo de erro, usado nas respostas da API
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation { .. } => "validation_error",
            ServiceError::Conflict(_) => "conflict_error",
            ServiceError::NotFound { .. } => "not_found_error",
            ServiceError::Authorization(_) => "authorization_error",
            ServiceError::Infrastructure(_) => "infrastructure_error",
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        ServiceError::Infrastructure(error.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
