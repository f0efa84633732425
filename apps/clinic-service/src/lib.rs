//! Núcleo de agendamento e carteirinhas de saúde da clínica
//!
//! `Clinic` reúne os quatro componentes de domínio sobre um único pool
//! SQLite e um relógio compartilhado. A camada HTTP em [`api`] é apenas uma
//! fachada fina sobre eles.

pub mod api;
pub mod auth;
pub mod cards;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod scheduling;

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::cards::{HealthCardRegistry, HealthCardRequestWorkflow};
use crate::clock::Clock;
use crate::config::ClinicHours;
use crate::scheduling::{AppointmentLedger, SlotCalculator};

/// Informações geradas em tempo de build (versão, perfil, compilador)
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Componentes de domínio prontos para uso
pub struct Clinic {
    pub slots: SlotCalculator,
    pub ledger: AppointmentLedger,
    pub cards: HealthCardRegistry,
    pub requests: HealthCardRequestWorkflow,
}

impl Clinic {
    pub fn new(pool: SqlitePool, hours: ClinicHours, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: SlotCalculator::new(pool.clone(), hours, clock.clone()),
            ledger: AppointmentLedger::new(pool.clone(), clock.clone()),
            cards: HealthCardRegistry::new(pool.clone(), clock.clone()),
            requests: HealthCardRequestWorkflow::new(pool, clock),
        }
    }
}
