// Remediations answering an intrusion alert at run time

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::topology::{Action, FirewallRule, IpAddress, PortRange, Protocol, Table};

/// An intrusion detected between two addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub source: IpAddress,
    pub destination: IpAddress,
    #[serde(default)]
    pub cve: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicRemediation {
    FirewallRule(FirewallRule),
    /// Send the traffic of a source network to the DDoS mitigation server
    PacketRedirection { source: IpAddress, mask: IpAddress },
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum DynamicRemediationJson {
    #[serde(rename = "firewall-rule")]
    FirewallRule {
        iptables_rule: String,
        action: String,
        source_ip: String,
        source_mask: String,
        source_port: String,
        destination_ip: String,
        destination_mask: String,
        destination_port: String,
        protocol: String,
    },
    #[serde(rename = "redirection")]
    Redirection {
        iptables_rule: String,
        linux_black_hole_rule: String,
        action: String,
        source_ip: String,
        source_mask: String,
    },
}

impl DynamicRemediation {
    /// Block the source of the alert, and redirect its traffic
    pub fn for_alert(alert: &Alert) -> Vec<DynamicRemediation> {
        let rule = FirewallRule::new(
            Action::Drop,
            Protocol::Any,
            alert.source,
            IpAddress::HOST_MASK,
            PortRange::any(),
            alert.destination,
            IpAddress::HOST_MASK,
            PortRange::any(),
            Table::Input,
        );
        vec![
            DynamicRemediation::FirewallRule(rule),
            DynamicRemediation::PacketRedirection { source: alert.source, mask: IpAddress::HOST_MASK },
        ]
    }

    fn to_json_form(&self, config: &Config) -> DynamicRemediationJson {
        match self {
            DynamicRemediation::FirewallRule(rule) => DynamicRemediationJson::FirewallRule {
                iptables_rule: rule.to_iptables_add_rule(),
                action: rule.action.to_string(),
                source_ip: rule.source.to_string(),
                source_mask: rule.source_mask.to_string(),
                source_port: rule.source_port_range.to_string(),
                destination_ip: rule.destination.to_string(),
                destination_mask: rule.destination_mask.to_string(),
                destination_port: rule.destination_port_range.to_string(),
                protocol: rule.protocol.to_string(),
            },
            DynamicRemediation::PacketRedirection { source, mask } => {
                let network = format!("{}/{}", source, mask.mask_prefix_length());
                DynamicRemediationJson::Redirection {
                    iptables_rule: format!(
                        "iptables -t nat -A PREROUTING -s {} -j DNAT --to-destination {}",
                        network, config.ddos_mitigation_server
                    ),
                    linux_black_hole_rule: format!("ip route add blackhole {}", network),
                    action: format!(
                        "REDIRECT {}/{}",
                        config.black_hole_address, config.ddos_filtering_equipment_address
                    ),
                    source_ip: source.to_string(),
                    source_mask: mask.to_string(),
                }
            }
        }
    }

    pub fn to_json(&self, config: &Config) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json_form(config))?)
    }
}

/// JSON array of the remediations answering an alert
pub fn remediations_for_alert_json(alert: &Alert, config: &Config) -> Result<String> {
    let remediations: Vec<DynamicRemediationJson> = DynamicRemediation::for_alert(alert)
        .iter()
        .map(|remediation| remediation.to_json_form(config))
        .collect();
    Ok(serde_json::to_string(&remediations)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn alert() -> Alert {
        serde_json::from_str(r#"{"source": "203.0.113.7", "destination": "192.168.1.2", "cve": "CVE-2014-6271"}"#).unwrap()
    }

    #[test]
    fn alert_source_is_blocked() {
        let remediations = DynamicRemediation::for_alert(&alert());
        assert_eq!(remediations.len(), 2);
        let DynamicRemediation::FirewallRule(rule) = &remediations[0] else {
            panic!("expected a firewall rule first");
        };
        assert_eq!(rule.action, Action::Drop);
        assert_eq!(rule.source, IpAddress::new("203.0.113.7").unwrap());
        assert!(rule.to_iptables_add_rule().contains("-s 203.0.113.7/32"));
    }

    #[test]
    fn json_forms() {
        let config = Config { ddos_mitigation_server: "10.9.9.9".to_string(), ..Config::default() };
        let json: Value = serde_json::from_str(&remediations_for_alert_json(&alert(), &config).unwrap()).unwrap();

        assert_eq!(json[0]["type"], "firewall-rule");
        assert_eq!(json[0]["destination_ip"], "192.168.1.2");
        assert_eq!(json[0]["source_mask"], "255.255.255.255");

        assert_eq!(json[1]["type"], "redirection");
        assert_eq!(
            json[1]["iptables_rule"],
            "iptables -t nat -A PREROUTING -s 203.0.113.7/32 -j DNAT --to-destination 10.9.9.9"
        );
        assert_eq!(json[1]["linux_black_hole_rule"], "ip route add blackhole 203.0.113.7/32");
        assert_eq!(json[1]["action"], "REDIRECT blackhole/127.0.0.1");
    }
}
