//! Prints the HetznerCluster CustomResourceDefinition as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/hetznercluster.yaml`

use crds::HetznerCluster;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&HetznerCluster::crd())?);
    Ok(())
}
