// Error type shared by the topology simulator, the scoring engine and the remediation model

use thiserror::Error;

/// Every failure the library can report.
///
/// Firewall blocking is never an error: the simulation returns `false` for a
/// blocked packet and keeps `Err` for malformed topologies or inputs.
#[derive(Error, Debug)]
pub enum AttackGraphError {
    #[error("Invalid IP Address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid mask length: {0} (must be between 0 and 32)")]
    InvalidMask(u32),

    #[error("Invalid port range: {0}")]
    InvalidPortRange(String),

    #[error("{0}")]
    Routing(String),

    #[error("Missing default gateway for host {0}")]
    MissingDefaultGateway(String),

    #[error("The destination host has no interface")]
    NoInterface,

    #[error("Interface {interface} does not belong to host {host}")]
    InterfaceNotOnHost { host: String, interface: String },

    #[error("Unknown host: {0}")]
    UnknownHost(String),

    #[error("This datalog command is not a hacl")]
    NotAHacl,

    #[error("Flow matrix error: {0}")]
    FlowMatrix(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("The vertex {0} is not in this attack graph")]
    UnknownVertex(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("TOML deserialization error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, AttackGraphError>;
