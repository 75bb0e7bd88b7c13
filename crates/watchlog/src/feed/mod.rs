mod controller;
mod dedup;
mod state;

pub use controller::DrainController;
pub use state::{DrainMode, FeedSnapshot, StepOutcome};
