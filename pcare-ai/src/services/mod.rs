//! Service modules for plant identification and care research
//!
//! - `research_orchestrator`: escalating search until the source quorum is met
//! - `session_orchestrator`: state machine driver and persistence

pub mod research_orchestrator;
pub mod session_orchestrator;

pub use research_orchestrator::{NoopObserver, ResearchObserver, ResearchOrchestrator};
pub use session_orchestrator::SessionOrchestrator;
