//! Cálculo de horários livres de um médico em uma data
//!
//! Leitura pura: o resultado reflete o estado da agenda no momento da
//! chamada. A verificação definitiva de conflito acontece na gravação.

use chrono::NaiveDate;
use clinic_db::models::TimeWindow;
use clinic_db::DbError;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::ClinicHours;
use crate::directory::Directory;
use crate::error::ServiceResult;

pub struct SlotCalculator {
    pool: SqlitePool,
    directory: Directory,
    hours: ClinicHours,
    clock: Arc<dyn Clock>,
}

impl SlotCalculator {
    pub fn new(pool: SqlitePool, hours: ClinicHours, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory: Directory::new(pool.clone()),
            pool,
            hours,
            clock,
        }
    }

    /// Horários livres em ordem crescente de início
    ///
    /// Médico inexistente, inativo ou data já passada resultam em lista vazia,
    /// para que a tela de agendamento degrade sem erro.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> ServiceResult<Vec<TimeWindow>> {
        match self.directory.doctor(doctor_id).await? {
            Some(doctor) if doctor.is_active => {}
            Some(_) => {
                debug!("Médico {} inativo, sem horários", doctor_id);
                return Ok(Vec::new());
            }
            None => {
                debug!("Médico {} não encontrado, sem horários", doctor_id);
                return Ok(Vec::new());
            }
        }

        if date < self.clock.now().date_naive() {
            debug!("Data {} já passou, sem horários", date);
            return Ok(Vec::new());
        }

        let booked = booked_windows(&self.pool, doctor_id, date).await?;
        let free = free_slots(&self.hours.working_slots(), &booked);
        debug!(
            "Médico {} em {}: {} horários livres, {} ocupados",
            doctor_id,
            date,
            free.len(),
            booked.len()
        );
        Ok(free)
    }
}

/// Remove os candidatos que se sobrepõem a algum horário ocupado
pub fn free_slots(candidates: &[TimeWindow], booked: &[TimeWindow]) -> Vec<TimeWindow> {
    let mut free: Vec<TimeWindow> = candidates
        .iter()
        .filter(|slot| !booked.iter().any(|taken| taken.overlaps(slot)))
        .copied()
        .collect();
    free.sort_by_key(|slot| slot.start_time);
    free
}

/// Janelas ocupadas por consultas não canceladas do médico na data
async fn booked_windows<'e, E>(
    executor: E,
    doctor_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<TimeWindow>, DbError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT start_time, end_time FROM appointments
        WHERE doctor_id = ? AND appointment_date = ? AND status <> 'cancelled'
        ORDER BY start_time
        "#,
    )
    .bind(doctor_id)
    .bind(date)
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| -> Result<TimeWindow, DbError> {
            let start: String = row.try_get("start_time")?;
            let end: String = row.try_get("end_time")?;
            Ok(TimeWindow::new(parse_hhmm(&start)?, parse_hhmm(&end)?))
        })
        .collect()
}

fn parse_hhmm(raw: &str) -> Result<chrono::NaiveTime, DbError> {
    chrono::NaiveTime::parse_from_str(raw, clinic_db::models::TIME_FORMAT)
        .map_err(|e| DbError::QueryError(format!("Horário inválido {}: {}", raw, e)))
}
