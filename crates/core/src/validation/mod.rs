pub mod engine;
pub mod states;

pub use engine::{apply_transition, next_status, ValidationMachine};
pub use states::{TransitionOutcome, ValidationEvent, ValidationStatus};
