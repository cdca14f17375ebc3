//! Ingress/Egress Boundary (spec §4.7) plus the startup loaders (spec
//! §4.7 `load_topology`, `load_if_model`) and an in-process reference
//! transport used by the binary's default configuration and by
//! integration tests.

mod boundary;
mod in_process;
mod load;

pub use boundary::Boundary;
pub use in_process::{InProcessBoundary, InProcessProducers};
pub use load::{load_if_model, load_topology};
