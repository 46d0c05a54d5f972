//! Data models for pcare-ai
//!
//! - Import session state machine
//! - Consensus outcome types
//! - Care source / care profile records
//! - Pipeline configuration

pub mod care;
pub mod identification;
pub mod import_session;
pub mod parameters;

pub use care::{CareProfile, CareSourceRecord, SunlightLevel};
pub use identification::{ConsensusResult, ResolvedIdentification, SelectionRequest, Suggestion};
pub use import_session::{ImportSession, SessionStatus, TransitionError};
pub use parameters::{ConfirmationPolicy, ConsensusConfig, PipelineConfig, ResearchConfig};
