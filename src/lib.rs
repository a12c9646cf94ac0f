//! Divinator - multi-method divination wizard
//!
//! A terminal wizard that walks a user from demographics through method
//! selection and per-method input to AI-generated divination reports, then
//! offers a grounded chat about the results. Finished readings are saved
//! to an optional persistence service without ever blocking the user.

pub mod backend;
pub mod chat;
pub mod cli;
pub mod config;
pub mod llm;
pub mod methods;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod repl;
pub mod wizard;

pub use config::Config;
pub use methods::{ALL_METHODS, Method, MethodInput, UserInputs};
pub use pipeline::{PipelineOutput, ReportPipeline};
pub use wizard::{Report, Step, Wizard, WizardState};
