//! Carteirinhas de saúde: registro e fluxo de solicitação

pub mod registry;
pub mod requests;

pub use registry::{CardUpdate, CardVerification, HealthCardRegistry, IssueCard};
pub use requests::{Approval, HealthCardRequestWorkflow, SubmitRequest};
