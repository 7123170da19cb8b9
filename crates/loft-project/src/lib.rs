//! Loft Project - versioned, forkable project documents
//!
//! A project is a lightweight metadata record plus one wholesale-saved
//! state blob carrying the activity history used for linear undo/redo.
//! Forking a variation deep-copies the state into a new project.

mod state;
mod store;

pub use state::{ProjectState, Snapshot, STATE_VERSION};
pub use store::{Project, ProjectStore, VariationResult};
