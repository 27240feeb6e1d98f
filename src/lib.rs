// Attack graph remediation library
// Network topology simulation, MulVAL attack graph scoring and remediation costing

pub mod attack_graph;
pub mod benchmarks;
pub mod config;
pub mod error;
pub mod fact;
pub mod flow_matrix;
pub mod information_system;
pub mod reachability;
pub mod remediation;
pub mod scoring;
pub mod topology;
pub mod xml;

pub use attack_graph::{AttackGraph, AttackPath};
pub use config::Config;
pub use error::{AttackGraphError, Result};
pub use information_system::InformationSystem;
pub use topology::Topology;
