//! Collector orchestration: the uniform collect/save/run contract, the four
//! platform collectors, the registry deciding which of them are usable, the
//! per-cycle orchestrator and the single-flight trigger in front of it.

pub mod collector;
pub mod collectors;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod trigger;

pub use collector::{Collection, Collector, CollectorResult, Outcome};
pub use error::{CollectError, ErrorKind};
pub use orchestrator::{CycleSource, CycleSummary, Orchestrator, OrchestratorState};
pub use registry::{default_specs, CollectorRegistry, CollectorSpec, RegistryError};
pub use retry::RetryPolicy;
pub use trigger::{CycleRunner, CycleTrigger, TriggerAck};
