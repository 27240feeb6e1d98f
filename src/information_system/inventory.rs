// Services, vulnerabilities and security requirements attached to hosts

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::topology::{IpAddress, Protocol};

/// A known vulnerability of a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub cve: String,
    /// MulVAL exploit range, e.g. `remoteExploit`
    #[serde(default = "default_exploit_type")]
    pub exploit_type: String,
    /// MulVAL exploit consequence, e.g. `privEscalation`
    #[serde(default = "default_exploit_goal")]
    pub exploit_goal: String,
    #[serde(default)]
    pub cvss: Option<f64>,
}

fn default_exploit_type() -> String {
    "remoteExploit".to_string()
}

fn default_exploit_goal() -> String {
    "privEscalation".to_string()
}

impl Vulnerability {
    pub fn new(cve: &str) -> Self {
        Self {
            cve: cve.to_string(),
            exploit_type: default_exploit_type(),
            exploit_goal: default_exploit_goal(),
            cvss: None,
        }
    }

    /// MulVAL cvss bucket: h from 6.6, m from 3.3, l above 0, m when unknown
    pub fn cvss_level(&self) -> char {
        match self.cvss {
            Some(score) if score >= 6.6 => 'h',
            Some(score) if score >= 3.3 => 'm',
            Some(score) if score > 0.0 => 'l',
            _ => 'm',
        }
    }
}

/// A network service running on a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub ip_address: Option<IpAddress>,
    /// 0 when the service does not listen on the network
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
    #[serde(default)]
    pub vulnerabilities: IndexMap<String, Vulnerability>,
}

fn default_protocol() -> Protocol {
    Protocol::Tcp
}

impl Service {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ip_address: None,
            port: 0,
            protocol: Protocol::Tcp,
            vulnerabilities: IndexMap::new(),
        }
    }

    /// Numeric port, `httpPort` for 80, 0 when unknown
    pub fn port_string_to_int(port: &str) -> u16 {
        match port.parse::<u16>() {
            Ok(number) => number,
            Err(_) if port == "httpPort" => 80,
            Err(_) => 0,
        }
    }

    /// Fill port and protocol for the well-known MulVAL service names
    pub fn set_protocol_and_port_from_name(&mut self) {
        let port = match self.name.as_str() {
            "http_server" => 80,
            "remote_desktop_connection" => 3389,
            "database_server" | "oracle8i" => 1521,
            "application_server" => 445,
            _ => return,
        };
        self.port = port;
        self.protocol = Protocol::Tcp;
    }

    pub fn set_name_from_protocol_and_port(&mut self) {
        if self.protocol != Protocol::Tcp {
            return;
        }
        let name = match self.port {
            80 => "http_server",
            3389 => "remote_desktop_connection",
            1521 => "database_server",
            445 => "application_server",
            _ => return,
        };
        self.name = name.to_string();
    }

    pub fn get_new_or_existing_vulnerability(&mut self, cve: &str) -> &mut Vulnerability {
        self.vulnerabilities
            .entry(cve.to_string())
            .or_insert_with(|| Vulnerability::new(cve))
    }
}

/// How much the owner cares about a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityRequirement {
    pub name: String,
    pub metric: f64,
}

impl SecurityRequirement {
    pub fn new(name: &str, metric: f64) -> Self {
        Self { name: name.to_string(), metric }
    }

    pub fn metric_value_from_plain_text(plain_text: &str) -> f64 {
        match plain_text.to_lowercase().as_str() {
            "negligeable" => 10.0,
            "minor" => 30.0,
            "medium" => 50.0,
            "severe" => 70.0,
            "catastrophic" => 90.0,
            _ => 0.0,
        }
    }

    pub fn metric_plain_text(&self) -> &'static str {
        match self.metric {
            metric if metric < 0.0 => "None",
            metric if metric < 20.0 => "Negligeable",
            metric if metric < 40.0 => "Minor",
            metric if metric < 60.0 => "Medium",
            metric if metric < 80.0 => "Severe",
            _ => "Catastrophic",
        }
    }
}
