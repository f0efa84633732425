//! Modelos de dados compartilhados entre aplicações
//!
//! Este módulo define as estruturas de agenda e carteirinhas de saúde.
//! Os campos de identificação do paciente/médico são copiados no momento
//! da criação (snapshot) e não acompanham alterações posteriores no cadastro.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{FromRow, Row};
use std::str::FromStr;
use uuid::Uuid;

/// Formato de horário de parede usado na persistência e na API
pub const TIME_FORMAT: &str = "%H:%M";

/// Define um enum persistido como texto, com `as_str`, `Display` e `FromStr`
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Todos os valores possíveis
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Representação textual persistida
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $( $text => Ok($name::$variant), )+
                    other => Err(format!("Valor inválido para {}: {}", stringify!($name), other)),
                }
            }
        }
    };
}

text_enum! {
    /// Status possíveis de um agendamento
    AppointmentStatus {
        /// Agendamento inicial
        Scheduled => "scheduled",
        /// Confirmado pela clínica
        Confirmed => "confirmed",
        /// Consulta concluída
        Completed => "completed",
        /// Cancelado (libera o horário)
        Cancelled => "cancelled",
        /// Paciente não compareceu
        NoShow => "no_show",
    }
}

impl AppointmentStatus {
    /// Estados a partir dos quais nenhuma transição é permitida
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

text_enum! {
    /// Tipo de consulta
    AppointmentType {
        Consultation => "consultation",
        FollowUp => "follow_up",
        Checkup => "checkup",
        Emergency => "emergency",
    }
}

text_enum! {
    /// Tipos sanguíneos ABO/Rh
    BloodType {
        APositive => "A+",
        ANegative => "A-",
        BPositive => "B+",
        BNegative => "B-",
        AbPositive => "AB+",
        AbNegative => "AB-",
        OPositive => "O+",
        ONegative => "O-",
    }
}

text_enum! {
    /// Status (parcialmente derivado) de uma carteirinha
    CardStatus {
        Active => "active",
        Expired => "expired",
        Blocked => "blocked",
    }
}

text_enum! {
    /// Status de uma solicitação de carteirinha
    RequestStatus {
        /// Aguardando análise
        Pending => "pending",
        /// Aprovada; a carteirinha foi emitida na mesma transação
        Approved => "approved",
        /// Rejeitada com motivo
        Rejected => "rejected",
    }
}

/// Serialização de `NaiveTime` como `HH:MM`
pub mod hhmm {
    use super::TIME_FORMAT;
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Contato de emergência
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

/// Cópia dos dados de contato do paciente no momento da criação do registro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSnapshot {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Cópia dos dados do médico no momento do agendamento
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorSnapshot {
    pub name: String,
    pub specialization: String,
}

/// Paciente no cadastro de identidades
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub blood_type: Option<BloodType>,
    pub allergies: Vec<String>,
    pub emergency_contact: Option<EmergencyContact>,
}

impl PatientRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Gera o snapshot gravado em agendamentos, carteirinhas e solicitações
    pub fn snapshot(&self) -> PatientSnapshot {
        PatientSnapshot {
            name: self.full_name(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }
}

impl FromRow<'_, SqliteRow> for PatientRecord {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            blood_type: decode_optional_text(row, "blood_type")?,
            allergies: row.try_get::<Json<Vec<String>>, _>("allergies")?.0,
            emergency_contact: decode_optional_json(row, "emergency_contact")?,
        })
    }
}

/// Médico no cadastro de identidades
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    /// Valor da consulta em centavos
    pub consultation_fee_cents: i64,
    pub is_active: bool,
}

impl DoctorRecord {
    pub fn snapshot(&self) -> DoctorSnapshot {
        DoctorSnapshot {
            name: format!("Dr(a). {} {}", self.first_name, self.last_name),
            specialization: self.specialization.clone(),
        }
    }
}

impl FromRow<'_, SqliteRow> for DoctorRecord {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            specialization: row.try_get("specialization")?,
            consultation_fee_cents: row.try_get("consultation_fee_cents")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

/// Janela de horário `[start_time, end_time)` em um dia
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

impl TimeWindow {
    pub fn new(start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self { start_time, end_time }
    }

    /// Duas janelas conflitam quando `a.start < b.end && b.start < a.end`
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}

/// Representa uma consulta/agendamento
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    /// Identificador único da consulta
    pub id: Uuid,
    /// Identificador do paciente
    pub patient_id: Uuid,
    /// Identificador do médico
    pub doctor_id: Uuid,
    /// Data da consulta (sem fuso horário)
    pub appointment_date: NaiveDate,
    /// Horário de início (HH:MM)
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    /// Horário de término (HH:MM, exclusivo)
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    /// Tipo de consulta
    pub appointment_type: AppointmentType,
    /// Dados do paciente copiados no agendamento
    pub patient: PatientSnapshot,
    /// Dados do médico copiados no agendamento
    pub doctor: DoctorSnapshot,
    /// Valor da consulta vigente no agendamento, em centavos
    pub consultation_fee_cents: i64,
    /// Motivo da consulta
    pub reason: String,
    /// Sintomas relatados, na ordem informada
    pub symptoms: Vec<String>,
    /// Status atual da consulta
    pub status: AppointmentStatus,
    /// Indica se o pagamento foi registrado
    pub payment_status: bool,
    /// Anotações do médico
    pub notes: Option<String>,
    /// Data e hora de criação do registro
    pub created_at: DateTime<Utc>,
    /// Data e hora da última alteração
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }
}

impl FromRow<'_, SqliteRow> for Appointment {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            doctor_id: row.try_get("doctor_id")?,
            appointment_date: row.try_get("appointment_date")?,
            start_time: decode_time(row, "start_time")?,
            end_time: decode_time(row, "end_time")?,
            appointment_type: decode_text(row, "type")?,
            patient: PatientSnapshot {
                name: row.try_get("patient_name")?,
                email: row.try_get("patient_email")?,
                phone: row.try_get("patient_phone")?,
            },
            doctor: DoctorSnapshot {
                name: row.try_get("doctor_name")?,
                specialization: row.try_get("doctor_specialization")?,
            },
            consultation_fee_cents: row.try_get("consultation_fee_cents")?,
            reason: row.try_get("reason")?,
            symptoms: row.try_get::<Json<Vec<String>>, _>("symptoms")?.0,
            status: decode_text(row, "status")?,
            payment_status: row.try_get("payment_status")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Carteirinha de saúde emitida
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCard {
    /// Identificador único
    pub id: Uuid,
    /// Número da carteirinha, imutável após a emissão
    pub card_number: String,
    /// Paciente titular (no máximo uma carteirinha por paciente)
    pub patient_id: Uuid,
    /// Dados de contato copiados na emissão
    pub patient: PatientSnapshot,
    pub blood_type: Option<BloodType>,
    pub allergies: Vec<String>,
    pub emergency_contact: Option<EmergencyContact>,
    /// Data de emissão
    pub issue_date: DateTime<Utc>,
    /// Data de validade
    pub expiry_date: DateTime<Utc>,
    /// Cache do status; `blocked` tem precedência sobre a validade
    pub status: CardStatus,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl HealthCard {
    /// Validade calculada apenas a partir do estado gravado e do instante informado
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_blocked && self.expiry_date > now
    }

    /// Status derivado: bloqueio prevalece sobre expiração
    pub fn derived_status(&self, now: DateTime<Utc>) -> CardStatus {
        if self.is_blocked {
            CardStatus::Blocked
        } else if self.expiry_date > now {
            CardStatus::Active
        } else {
            CardStatus::Expired
        }
    }
}

impl FromRow<'_, SqliteRow> for HealthCard {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            card_number: row.try_get("card_number")?,
            patient_id: row.try_get("patient_id")?,
            patient: decode_patient_snapshot(row)?,
            blood_type: decode_optional_text(row, "blood_type")?,
            allergies: row.try_get::<Json<Vec<String>>, _>("allergies")?.0,
            emergency_contact: decode_optional_json(row, "emergency_contact")?,
            issue_date: row.try_get("issue_date")?,
            expiry_date: row.try_get("expiry_date")?,
            status: decode_text(row, "status")?,
            is_blocked: row.try_get("is_blocked")?,
            block_reason: row.try_get("block_reason")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Solicitação de carteirinha feita pelo paciente
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCardRequest {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient: PatientSnapshot,
    pub blood_type: Option<BloodType>,
    /// `None` quando não informado; `Some(vec![])` declara ausência de alergias
    pub allergies: Option<Vec<String>>,
    pub emergency_contact: Option<EmergencyContact>,
    pub status: RequestStatus,
    /// Obrigatório quando rejeitada
    pub rejection_reason: Option<String>,
    /// Funcionário que analisou a solicitação
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Carteirinha emitida na aprovação
    pub health_card_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for HealthCardRequest {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            patient: decode_patient_snapshot(row)?,
            blood_type: decode_optional_text(row, "blood_type")?,
            allergies: decode_optional_json(row, "allergies")?,
            emergency_contact: decode_optional_json(row, "emergency_contact")?,
            status: decode_text(row, "status")?,
            rejection_reason: row.try_get("rejection_reason")?,
            reviewed_by: row.try_get("reviewed_by")?,
            reviewed_at: row.try_get("reviewed_at")?,
            health_card_id: row.try_get("health_card_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn decode_patient_snapshot(row: &SqliteRow) -> sqlx::Result<PatientSnapshot> {
    Ok(PatientSnapshot {
        name: row.try_get("patient_name")?,
        email: row.try_get("patient_email")?,
        phone: row.try_get("patient_phone")?,
    })
}

fn column_decode_error(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message,
        )),
    }
}

fn decode_text<T: FromStr<Err = String>>(row: &SqliteRow, column: &str) -> sqlx::Result<T> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| column_decode_error(column, e))
}

fn decode_optional_text<T: FromStr<Err = String>>(
    row: &SqliteRow,
    column: &str,
) -> sqlx::Result<Option<T>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| value.parse().map_err(|e| column_decode_error(column, e)))
        .transpose()
}

fn decode_optional_json<T>(row: &SqliteRow, column: &str) -> sqlx::Result<Option<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| {
        serde_json::from_str(&value).map_err(|e| column_decode_error(column, e.to_string()))
    })
    .transpose()
}

fn decode_time(row: &SqliteRow, column: &str) -> sqlx::Result<NaiveTime> {
    let raw: String = row.try_get(column)?;
    NaiveTime::parse_from_str(&raw, TIME_FORMAT)
        .map_err(|e| column_decode_error(column, format!("Horário inválido {}: {}", raw, e)))
}
