//! Cluster store client
//!
//! The narrow slice of the Kubernetes API the Recipe controller needs:
//! get/create/replace for Recipes, Deployments and Jobs, and status writes
//! for Recipes.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClient, ClusterClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClusterClient::new(kube::Client::try_default().await?);
//! if let Some(recipe) = client.get_recipe("default", "r1").await? {
//!     println!("size = {}", recipe.spec.size);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Every write that carries a `resourceVersion` is subject to the API
//! server's optimistic concurrency check; a stale version surfaces as
//! [`ClusterError::Conflict`].

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::ClusterClient;
pub use cluster_trait::ClusterClientTrait;
pub use error::ClusterError;
#[cfg(feature = "test-util")]
pub use mock::{MockClusterClient, MockFault, MockOperation};
