pub mod registry;
pub mod generate;
pub mod install;

pub use generate::{generate_schedule, next_fire, Trigger, TriggerSpec};
pub use registry::{registry, SpecialSchedule, TaskKind, TaskMetadata, TaskTier};
