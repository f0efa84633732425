//! Usuário atuante e tokens de acesso
//!
//! A gestão de sessão é externa; o núcleo só recebe o `Actor` já decodificado.
//! Os tokens são JWT HS256 com as claims `sub`, `role` e `exp`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Papel do usuário; `Admin` tem todas as permissões de `Staff`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Staff,
    Admin,
}

impl Role {
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

/// Usuário que executa a operação
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Exige papel de funcionário (staff ou admin)
    pub fn require_staff(&self, action: &str) -> ServiceResult<()> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(ServiceError::forbidden(format!(
                "{} exige papel de funcionário (papel atual: {:?})",
                action, self.role
            )))
        }
    }

    pub fn require_admin(&self, action: &str) -> ServiceResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ServiceError::forbidden(format!(
                "{} exige papel de administrador (papel atual: {:?})",
                action, self.role
            )))
        }
    }

    /// Exige que o usuário seja o próprio paciente ou um funcionário
    pub fn require_self_or_staff(&self, patient_id: Uuid, action: &str) -> ServiceResult<()> {
        match self.role {
            Role::Patient if self.id == patient_id => Ok(()),
            role if role.is_staff() => Ok(()),
            _ => Err(ServiceError::forbidden(format!(
                "{} só pode ser feito pelo próprio paciente ou por funcionários",
                action
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: Role,
    exp: usize,
}

/// Chaves de assinatura e verificação dos tokens
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Emite um token para o usuário, válido por `ttl`
    pub fn issue(&self, actor: &Actor, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: actor.id,
            role: actor.role,
            exp: (Utc::now() + ttl).timestamp().max(0) as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Valida assinatura e expiração e devolve o usuário
    pub fn verify(&self, token: &str) -> Result<Actor, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        Ok(Actor::new(data.claims.sub, data.claims.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_and_tampering() {
        let keys = TokenKeys::from_secret(b"segredo-de-teste");
        let actor = Actor::new(Uuid::new_v4(), Role::Staff);

        let token = keys.issue(&actor, Duration::minutes(5)).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), actor);

        let other = TokenKeys::from_secret(b"outro-segredo");
        assert!(other.verify(&token).is_err());

        let expired = keys.issue(&actor, Duration::hours(-2)).unwrap();
        assert!(keys.verify(&expired).is_err());
    }

    #[test]
    fn test_role_gates() {
        let patient_id = Uuid::new_v4();
        let patient = Actor::new(patient_id, Role::Patient);
        let doctor = Actor::new(Uuid::new_v4(), Role::Doctor);
        let staff = Actor::new(Uuid::new_v4(), Role::Staff);
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);

        assert!(patient.require_self_or_staff(patient_id, "teste").is_ok());
        assert!(patient.require_self_or_staff(Uuid::new_v4(), "teste").is_err());
        assert!(doctor.require_self_or_staff(patient_id, "teste").is_err());
        assert!(staff.require_self_or_staff(patient_id, "teste").is_ok());

        assert!(staff.require_staff("teste").is_ok());
        assert!(admin.require_staff("teste").is_ok());
        assert!(doctor.require_staff("teste").is_err());
        assert!(staff.require_admin("teste").is_err());
        assert!(admin.require_admin("teste").is_ok());
    }
}
