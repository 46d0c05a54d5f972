//! Fusion layer
//!
//! Turns several independent, possibly conflicting answers into one:
//! - **consensus_resolver** - classifier votes → species (or a selection request)
//! - **care_consolidator** - validated care sources → care profile
//!
//! Both fusers are pure and synchronous; the orchestrators own all I/O.

pub mod care_consolidator;
pub mod consensus_resolver;

pub use care_consolidator::CareConsolidator;
pub use consensus_resolver::ConsensusResolver;
