//! Divination wizard
//!
//! The step machine and its session state. The terminal layer renders the
//! state and forwards user actions to the machine.

pub mod machine;
pub mod state;

pub use machine::{NextOutcome, Wizard};
pub use state::{Report, Step, WizardState};
