//! Deterministic first-pass intent routing.
//!
//! Matches common device commands against an ordered rule table and
//! returns a structured response without any I/O. A miss means the caller
//! should escalate to the language model.

pub mod catalog;
pub mod extract;
pub mod router;
pub mod rules;

pub use catalog::Catalog;
pub use router::RuleRouter;
pub use rules::{Extractor, Rule};
