//! Startup loaders (spec §4.7 `load_topology`, `load_if_model`). Both are
//! one-shot, synchronous reads — failures here are fatal at startup (spec
//! §7 items 1-2), not retried.

use sentinel_common::error::{Error, Result};
use sentinel_snmp::IsolationForestModel;
use sentinel_topology::Topology;
use std::path::Path;

pub fn load_topology(config_path: &Path) -> Result<Topology> {
    sentinel_topology::load_from_yaml_file(config_path)
}

pub fn load_if_model(model_path: &Path) -> Result<IsolationForestModel> {
    let bytes = std::fs::read(model_path)?;
    IsolationForestModel::load(&bytes).map_err(|e| match e {
        Error::ModelLoad(msg) => Error::ModelLoad(format!("{}: {msg}", model_path.display())),
        other => other,
    })
}
