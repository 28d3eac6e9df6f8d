//! Recipe CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Recipe controller,
//! plus the status condition model shared by every status writer.

pub mod conditions;
pub mod recipe;

pub use conditions::*;
pub use recipe::*;
