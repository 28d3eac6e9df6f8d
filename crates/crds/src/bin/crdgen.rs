//! Prints the Recipe CustomResourceDefinition as YAML.
//!
//! `cargo run -p crds --bin crdgen > config/crd/recipes.yaml`

use anyhow::Context;
use crds::Recipe;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = Recipe::crd();
    let yaml = serde_yaml::to_string(&crd).context("serializing Recipe CRD")?;
    print!("{yaml}");
    Ok(())
}
