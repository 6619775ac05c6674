/// Managed resources
pub mod container;
pub mod plan;

pub use container::{ContainerManager, ContainerState};
pub use plan::{plan, Action, PlannedChange};
