//! Detection — problems found in a resolved license graph
//!
//! Currently one kind: source that must be both shared and kept private.

pub mod conflict;

pub use conflict::{conflicting_shared_private_source, SourceSharePrivacyConflict};
