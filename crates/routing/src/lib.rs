//! Request routing for Clarion — decides how complex a request is and who
//! should answer it.
//!
//! Both components are synchronous and deterministic: the same text and
//! catalog always produce the same score and the same persona list.

pub mod complexity;
pub mod selector;
pub mod text;

pub use complexity::ComplexityAnalyzer;
pub use selector::PersonaSelector;
pub use text::Words;
