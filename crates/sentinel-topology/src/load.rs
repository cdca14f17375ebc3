//! Parsing and validation of the topology + roles file (spec §4.6 "Loading").

use crate::{DeviceNode, Topology};
use sentinel_common::error::{Error, Result};
use sentinel_common::types::{DevicePriority, Role};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct RawTopologyFile {
    pub devices: HashMap<String, RawDevice>,
    #[serde(default)]
    pub bgp_peers: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
pub struct RawDevice {
    pub role: Role,
    #[serde(default)]
    pub neighbors: Vec<String>,
    pub priority: DevicePriority,
}

pub fn load_from_yaml_file(path: impl AsRef<Path>) -> Result<Topology> {
    let text = std::fs::read_to_string(path)?;
    load_from_str(&text)
}

pub fn load_from_str(text: &str) -> Result<Topology> {
    let raw: RawTopologyFile = serde_yaml::from_str(text)?;
    validate_and_build(raw)
}

fn validate_and_build(raw: RawTopologyFile) -> Result<Topology> {
    // Every referenced neighbor id must exist.
    for (id, dev) in &raw.devices {
        for neighbor in &dev.neighbors {
            if !raw.devices.contains_key(neighbor) {
                return Err(Error::Configuration(format!(
                    "device '{id}' references unknown neighbor '{neighbor}'"
                )));
            }
            if neighbor == id {
                return Err(Error::Configuration(format!(
                    "device '{id}' has a self-loop neighbor"
                )));
            }
        }
    }
    for (a, b) in &raw.bgp_peers {
        for id in [a, b] {
            if !raw.devices.contains_key(id) {
                return Err(Error::Configuration(format!(
                    "bgp_peers references unknown device '{id}'"
                )));
            }
        }
        if a == b {
            return Err(Error::Configuration(
                "bgp_peers entry has identical endpoints (self-loop)".to_string(),
            ));
        }
    }

    let mut adjacency: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut devices = HashMap::new();

    for (id, dev) in &raw.devices {
        let entry = adjacency.entry(id.clone()).or_default();
        for n in &dev.neighbors {
            entry.insert(n.clone());
            adjacency.entry(n.clone()).or_default().insert(id.clone());
        }
    }
    for (a, b) in &raw.bgp_peers {
        adjacency.entry(a.clone()).or_default().insert(b.clone());
        adjacency.entry(b.clone()).or_default().insert(a.clone());
    }

    for (id, dev) in raw.devices {
        let neighbors: Vec<String> = adjacency.get(&id).into_iter().flatten().cloned().collect();
        devices.insert(
            id.clone(),
            DeviceNode {
                id,
                role: dev.role,
                neighbors,
                priority: dev.priority,
            },
        );
    }

    let mut topology = Topology {
        devices,
        adjacency,
        blast_radius: HashMap::new(),
        spof: Default::default(),
    };
    topology.blast_radius = topology.compute_blast_radius();
    topology.spof = topology.compute_spof();
    Ok(topology)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_dangling_neighbor() {
        let yaml = r#"
devices:
  a: { role: spine, neighbors: [ghost], priority: critical }
bgp_peers: []
"#;
        let err = load_from_str(yaml).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn rejects_unknown_role() {
        let yaml = r#"
devices:
  a: { role: mainframe, neighbors: [], priority: critical }
bgp_peers: []
"#;
        assert!(load_from_str(yaml).is_err());
    }
}
