//! Status writes with bounded retry on conflict.

use cluster_client::{ClusterClientTrait, ClusterError};
use crds::{Recipe, RecipeStatus};
use tracing::debug;

/// Attempts made before a conflict is surfaced
pub const STATUS_WRITE_ATTEMPTS: usize = 3;

/// Applies `mutate` to the Recipe's status and persists it.
///
/// `mutate` reports whether it changed anything; an unchanged status is not
/// written. The first attempt uses `recipe` as given. On `Conflict` the Recipe is
/// re-fetched and the same mutation is applied to the fresh copy, as long as
/// its `metadata.generation` still matches `recipe`. A newer generation means
/// the spec moved under the caller, so the `Conflict` is returned and the whole
/// cycle has to run again. Returns the Recipe as stored after the successful
/// write.
pub async fn update_status_with_retry<F>(
    client: &dyn ClusterClientTrait,
    recipe: Recipe,
    mutate: F,
) -> Result<Recipe, ClusterError>
where
    F: Fn(&mut RecipeStatus) -> bool,
{
    let namespace = recipe.metadata.namespace.clone().unwrap_or_default();
    let name = recipe.metadata.name.clone().unwrap_or_default();
    let generation = recipe.metadata.generation;

    let mut current = recipe;
    let mut attempt = 1;
    loop {
        if !mutate(current.status.get_or_insert_with(RecipeStatus::default)) {
            debug!("Status of Recipe {}/{} unchanged, skipping write", namespace, name);
            return Ok(current);
        }
        match client.update_recipe_status(&current).await {
            Ok(stored) => return Ok(stored),
            Err(e) if e.is_conflict() && attempt < STATUS_WRITE_ATTEMPTS => {
                debug!(
                    "Status write for Recipe {}/{} conflicted (attempt {}), re-fetching",
                    namespace, name, attempt
                );
                let fresh = client
                    .get_recipe(&namespace, &name)
                    .await?
                    .ok_or_else(|| ClusterError::NotFound(format!("recipes {namespace}/{name}")))?;
                if fresh.metadata.generation != generation {
                    debug!(
                        "Recipe {}/{} moved from generation {:?} to {:?}, not retrying the status write",
                        namespace, name, generation, fresh.metadata.generation
                    );
                    return Err(e);
                }
                current = fresh;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
