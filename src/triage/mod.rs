//! The triage pipeline: selection, classification prompt, transition
//! policy, mutation application, and the driving loop.

pub mod applier;
pub mod driver;
pub mod prompt;
pub mod selector;
pub mod transitions;
pub mod types;

pub use driver::{RunReport, TriageLoop};
pub use selector::BatchSelector;
pub use types::{Category, ClassificationResult, Mutation};
