//! Service modules for live group assessment
//!
//! Pure core (state machine, reconciliation, snapshot building, text
//! normalization) plus the stateful pieces around it (session registry,
//! processing guard, broadcast coordinator, oracle, transport).

pub mod assessment_service;
pub mod broadcast_coordinator;
pub mod oracle;
pub mod processing_guard;
pub mod progression;
pub mod reconciler;
pub mod session_registry;
pub mod snapshot_builder;
pub mod text_normalizer;
pub mod transport;

pub use assessment_service::{AssessmentService, NewCriterion, ProcessOutcome};
pub use broadcast_coordinator::{BroadcastCoordinator, BroadcastPhase, BroadcastStatus};
pub use oracle::{DisabledOracle, HttpOracle, Oracle, OracleError};
pub use processing_guard::{ProcessingGuard, ProcessingPermit};
pub use progression::{transition, Transition};
pub use reconciler::{reconcile, Reconciliation};
pub use session_registry::{SessionHandle, SessionLiveState, SessionRegistry};
pub use snapshot_builder::{build_snapshot, SnapshotSources};
pub use transport::{EventBusTransport, Transport};
