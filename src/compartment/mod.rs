//! The compartment tree: nodes, ancestry paths, and subtree enumeration.
//!
//! Compartments scope resources and policies into a hierarchy rooted at the
//! tenancy. The analyzer only ever holds read-only snapshots of nodes fetched
//! from a [`PolicySource`](crate::source::PolicySource).

pub mod error;
pub mod node;
pub mod path;
pub mod walker;

pub use error::{CompartmentError, CompartmentResult};
pub use node::{CompartmentNode, LifecycleState};
pub use path::PathResolver;
pub use walker::TreeWalker;
