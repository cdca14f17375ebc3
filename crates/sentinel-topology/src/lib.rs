//! Read-mostly, in-memory labeled fabric graph (spec §4.6).
//!
//! Loaded once at startup from a declarative YAML file, validated, and then
//! shared by immutable reference for the lifetime of the process. Blast
//! radius and single-point-of-failure results are computed once at load
//! time and cached, since the graph never mutates afterward.

mod load;

use sentinel_common::types::{DeviceId, DevicePriority, Layer, Role};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

pub use load::{load_from_str, load_from_yaml_file, RawTopologyFile};

#[derive(Debug, Clone)]
pub struct DeviceNode {
    pub id: DeviceId,
    pub role: Role,
    pub neighbors: Vec<DeviceId>,
    pub priority: DevicePriority,
}

fn layer_of(role: Role) -> Layer {
    match role {
        // Route reflectors and edge/border routers sit at the top of the
        // fabric alongside spines for blast-radius and SPOF purposes; there
        // is no dedicated layer for them in spec.md's data model.
        Role::Spine | Role::Rr | Role::Edge => Layer::Spine,
        Role::Tor => Layer::Tor,
        Role::Leaf => Layer::Leaf,
        Role::Server => Layer::Server,
        Role::Unknown => Layer::Server,
    }
}

/// The loaded, validated, read-only topology graph.
#[derive(Debug, Clone)]
pub struct Topology {
    devices: HashMap<DeviceId, DeviceNode>,
    /// Undirected adjacency built from both `neighbors` and `bgp_peers`.
    adjacency: HashMap<DeviceId, BTreeSet<DeviceId>>,
    blast_radius: HashMap<DeviceId, usize>,
    spof: HashSet<DeviceId>,
}

impl Topology {
    /// `role(device) -> Role`. Unknown devices resolve to `Role::Unknown`
    /// rather than an error (spec §4.5 failure semantics, §7 item 7).
    pub fn role(&self, device: &str) -> Role {
        self.devices
            .get(device)
            .map(|d| d.role)
            .unwrap_or(Role::Unknown)
    }

    pub fn contains(&self, device: &str) -> bool {
        self.devices.contains_key(device)
    }

    /// `neighbors(device) -> Iter<DeviceId>`.
    pub fn neighbors(&self, device: &str) -> impl Iterator<Item = &DeviceId> {
        self.adjacency
            .get(device)
            .into_iter()
            .flat_map(|set| set.iter())
    }

    /// `blast_radius(device) -> usize` — count of downstream-reachable
    /// devices, cached at load time. Unknown devices have a blast radius of
    /// 1 per the correlator's degraded-triage fallback (spec §4.5).
    pub fn blast_radius(&self, device: &str) -> usize {
        self.blast_radius.get(device).copied().unwrap_or(1)
    }

    /// `affected_layers(device) -> Set<Layer>` — the layers of `device`
    /// itself plus every device downstream-reachable from it.
    pub fn affected_layers(&self, device: &str) -> BTreeSet<Layer> {
        let mut layers = BTreeSet::new();
        if let Some(node) = self.devices.get(device) {
            layers.insert(layer_of(node.role));
        } else {
            layers.insert(Layer::Server);
            return layers;
        }
        for reachable in self.downstream_reachable(device) {
            if let Some(node) = self.devices.get(&reachable) {
                layers.insert(layer_of(node.role));
            }
        }
        layers
    }

    /// `is_spof(device) -> bool`.
    pub fn is_spof(&self, device: &str) -> bool {
        self.spof.contains(device)
    }

    /// BFS over directed "downstream" edges (spine -> tor -> leaf ->
    /// server): an edge is followed only when it strictly increases depth in
    /// the fabric hierarchy, which keeps the walk acyclic.
    fn downstream_reachable(&self, device: &str) -> HashSet<DeviceId> {
        let mut visited = HashSet::new();
        let Some(start) = self.devices.get(device) else {
            return visited;
        };
        let start_layer = layer_of(start.role);

        let mut queue = VecDeque::new();
        queue.push_back(device.to_string());

        while let Some(current) = queue.pop_front() {
            let current_layer = self
                .devices
                .get(&current)
                .map(|n| layer_of(n.role))
                .unwrap_or(start_layer);
            let Some(neighbors) = self.adjacency.get(&current) else {
                continue;
            };
            for next in neighbors {
                if visited.contains(next) || next == device {
                    continue;
                }
                let Some(next_node) = self.devices.get(next) else {
                    continue;
                };
                if layer_of(next_node.role) > current_layer {
                    visited.insert(next.clone());
                    queue.push_back(next.clone());
                }
            }
        }
        visited
    }

    fn compute_blast_radius(&self) -> HashMap<DeviceId, usize> {
        self.devices
            .keys()
            .map(|id| (id.clone(), self.downstream_reachable(id).len()))
            .collect()
    }

    /// A device is SPOF iff removing it disconnects some server from every
    /// spine-layer node (spine, rr, edge) in the residual graph.
    fn compute_spof(&self) -> HashSet<DeviceId> {
        let spine_layer_nodes: Vec<&DeviceId> = self
            .devices
            .iter()
            .filter(|(_, n)| layer_of(n.role) == Layer::Spine)
            .map(|(id, _)| id)
            .collect();
        let servers: Vec<&DeviceId> = self
            .devices
            .iter()
            .filter(|(_, n)| n.role == Role::Server)
            .map(|(id, _)| id)
            .collect();

        let mut result = HashSet::new();
        if spine_layer_nodes.is_empty() || servers.is_empty() {
            return result;
        }

        for candidate in self.devices.keys() {
            for server in &servers {
                if *server == candidate {
                    continue;
                }
                if !self.reachable_excluding(server, &spine_layer_nodes, candidate) {
                    result.insert(candidate.clone());
                    break;
                }
            }
        }
        result
    }

    /// Whether `start` can reach any node in `targets` in the undirected
    /// adjacency graph with `excluded` removed.
    fn reachable_excluding(
        &self,
        start: &str,
        targets: &[&DeviceId],
        excluded: &str,
    ) -> bool {
        if start == excluded {
            return false;
        }
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start.to_string());
        visited.insert(start.to_string());

        while let Some(current) = queue.pop_front() {
            if targets.iter().any(|t| t.as_str() == current) {
                return true;
            }
            let Some(neighbors) = self.adjacency.get(&current) else {
                continue;
            };
            for next in neighbors {
                if next == excluded || visited.contains(next) {
                    continue;
                }
                visited.insert(next.clone());
                queue.push_back(next.clone());
            }
        }
        false
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}
