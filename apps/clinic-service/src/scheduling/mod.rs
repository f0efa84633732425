//! Agenda: horários livres e livro de consultas

pub mod ledger;
pub mod slots;

pub use ledger::{AppointmentLedger, BookingRequest};
pub use slots::SlotCalculator;
