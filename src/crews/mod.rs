//! Crew support: run results, declarative configs and autonomous planning.

pub mod crew_config;
pub mod crew_output;
pub mod planning;

pub use crew_config::{AgentConfig, CrewConfig, TaskConfig};
pub use crew_output::{CrewOutput, KickoffOutput};
pub use planning::AutonomousPlanner;
