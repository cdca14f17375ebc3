//! SNMP feature extraction and Isolation Forest outlier detection
//! (spec §4.3, §4.4).

mod extractor;
mod isolation_forest;

pub use extractor::{schema_hash, SnmpFeatureExtractor};
pub use isolation_forest::{IsolationForestDetector, IsolationForestModel, IsolationNode, IsolationTree};
