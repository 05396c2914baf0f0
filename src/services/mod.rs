//! Service layer for the document pipeline.
//!
//! Domain operations separated from transport concerns, usable from the
//! CLI or any other interface.

pub mod intake;
pub mod reroute;
pub mod submit;

pub use intake::{EmailIntake, IntakeConfig};
pub use reroute::{OverrideError, OverrideService};
pub use submit::SubmitService;
