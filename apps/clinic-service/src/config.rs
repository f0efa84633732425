//! Configuração do serviço, lida de variáveis de ambiente
//!
//! O horário de funcionamento da clínica é configuração: o calculador de
//! horários apenas o consome.

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveTime};
use clinic_db::models::{TimeWindow, TIME_FORMAT};
use clinic_db::DbConfig;
use std::net::SocketAddr;
use std::str::FromStr;

/// Horário de funcionamento e duração padrão das consultas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicHours {
    /// Abertura
    pub open: NaiveTime,
    /// Fechamento (exclusivo)
    pub close: NaiveTime,
    /// Início do intervalo de almoço
    pub break_start: NaiveTime,
    /// Fim do intervalo de almoço
    pub break_end: NaiveTime,
    /// Duração de cada horário em minutos
    pub slot_minutes: u32,
}

impl Default for ClinicHours {
    fn default() -> Self {
        Self {
            open: hm(9, 0),
            close: hm(17, 0),
            break_start: hm(12, 0),
            break_end: hm(13, 0),
            slot_minutes: 30,
        }
    }
}

impl ClinicHours {
    /// Verifica a coerência dos horários configurados
    pub fn validate(&self) -> Result<()> {
        if self.slot_minutes == 0 {
            bail!("A duração do horário deve ser maior que zero");
        }
        if self.open >= self.close {
            bail!("Abertura ({}) deve ser antes do fechamento ({})", self.open, self.close);
        }
        if self.break_start > self.break_end
            || self.break_start < self.open
            || self.break_end > self.close
        {
            bail!(
                "Intervalo {}-{} deve estar dentro do expediente {}-{}",
                self.break_start,
                self.break_end,
                self.open,
                self.close
            );
        }
        Ok(())
    }

    /// Janelas canônicas de um dia de trabalho, em ordem crescente, já sem
    /// as que tocam o intervalo
    pub fn working_slots(&self) -> Vec<TimeWindow> {
        let length = Duration::minutes(i64::from(self.slot_minutes));
        let lunch = TimeWindow::new(self.break_start, self.break_end);
        let mut slots = Vec::new();
        if length <= Duration::zero() {
            return slots;
        }

        let mut cursor = self.open;
        loop {
            let (end, wrapped) = cursor.overflowing_add_signed(length);
            if wrapped != 0 || end > self.close {
                break;
            }
            let slot = TimeWindow::new(cursor, end);
            if !slot.overlaps(&lunch) {
                slots.push(slot);
            }
            cursor = end;
        }
        slots
    }
}

/// Configuração completa do serviço
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub db: DbConfig,
    pub bind_addr: SocketAddr,
    /// Segredo HS256 dos tokens de acesso
    pub jwt_secret: String,
    pub hours: ClinicHours,
    /// Limite de requisições simultâneas
    pub max_in_flight: usize,
    /// Logs em JSON
    pub log_json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: String::new(),
            hours: ClinicHours::default(),
            max_in_flight: 64,
            log_json: false,
        }
    }
}

impl ServiceConfig {
    /// Carrega a configuração do ambiente do processo
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Carrega a configuração de uma função de busca arbitrária
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let default_hours = ClinicHours::default();

        let db = DbConfig {
            db_path: lookup("CLINIC_DB_PATH").unwrap_or(defaults.db.db_path),
            max_connections: parse_or(&lookup, "CLINIC_DB_MAX_CONNECTIONS", defaults.db.max_connections)?,
            ..defaults.db
        };

        let hours = ClinicHours {
            open: time_or(&lookup, "CLINIC_OPEN", default_hours.open)?,
            close: time_or(&lookup, "CLINIC_CLOSE", default_hours.close)?,
            break_start: time_or(&lookup, "CLINIC_BREAK_START", default_hours.break_start)?,
            break_end: time_or(&lookup, "CLINIC_BREAK_END", default_hours.break_end)?,
            slot_minutes: parse_or(&lookup, "CLINIC_SLOT_MINUTES", default_hours.slot_minutes)?,
        };
        hours.validate().context("Horário de funcionamento inválido")?;

        Ok(Self {
            db,
            bind_addr: parse_or(&lookup, "CLINIC_BIND_ADDR", defaults.bind_addr)?,
            jwt_secret: lookup("CLINIC_JWT_SECRET").unwrap_or_default(),
            hours,
            max_in_flight: parse_or(&lookup, "CLINIC_MAX_IN_FLIGHT", defaults.max_in_flight)?,
            log_json: lookup("CLINIC_LOG_JSON")
                .map(|v| matches!(v.as_str(), "1" | "true"))
                .unwrap_or(defaults.log_json),
        })
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Valor inválido para {}: {} ({})", key, raw, e)),
        None => Ok(default),
    }
}

fn time_or<F>(lookup: &F, key: &str, default: NaiveTime) -> Result<NaiveTime>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT)
            .with_context(|| format!("Horário inválido para {}: {}", key, raw)),
        None => Ok(default),
    }
}
