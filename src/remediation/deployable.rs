// Remediations placed on concrete machines

use std::collections::BTreeSet;
use std::fmt;

use log::{info, warn};

use crate::attack_graph::{AttackPath, SerializableAttackPath, VertexId};
use crate::config::Config;
use crate::error::Result;
use crate::fact::names_the_internet;
use crate::information_system::{InformationSystem, Service};
use crate::topology::{HostId, IpAddress, Packet, Protocol, Table, CLIENT_SOURCE_PORT};
use crate::xml::XmlElement;

use super::serializable::{load_history, save_history, HistoryEntry, SerializableDeployableRemediation};
use super::{RemediationAction, RemediationKind};

/// Immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct DeployableRemediationAction {
    action: RemediationAction,
    host: HostId,
}

impl DeployableRemediationAction {
    pub fn new(action: RemediationAction, host: HostId) -> Self {
        Self { action, host }
    }

    pub fn action(&self) -> &RemediationAction {
        &self.action
    }

    pub fn host(&self) -> HostId {
        self.host
    }

    pub fn to_xml(&self, information_system: &InformationSystem) -> XmlElement {
        let mut root = XmlElement::new("deployable_remediation");
        root.push(XmlElement::with_text("machine", information_system.machine_name(self.host)));

        let mut action = XmlElement::new("action");
        match &self.action.kind {
            RemediationKind::ApplyPatch(patches) => {
                action.push(XmlElement::with_text("type", "patch"));
                let mut patches_element = XmlElement::new("patchs");
                for patch in patches {
                    patches_element.push(XmlElement::with_text("patch", &patch.link));
                }
                action.push(patches_element);
            }
            RemediationKind::DeployFirewallRule(rule) => {
                action
                    .push(XmlElement::with_text("type", "firewall-rule"))
                    .push(XmlElement::with_text("rule", rule.to_iptables_add_rule()));
            }
            RemediationKind::DeploySnortRule(rules) => {
                action.push(XmlElement::with_text("type", "snort-rules"));
                let mut rules_element = XmlElement::new("rules");
                for rule in rules {
                    rules_element.push(XmlElement::with_text("rule", &rule.rule));
                }
                action.push(rules_element);
            }
        }
        root.push(action);
        root
    }
}

impl fmt::Display for DeployableRemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {:?}", self.action.action_type(), self.host)
    }
}

/// Actions that together cut `corrected_path`
#[derive(Debug, Clone, PartialEq)]
pub struct DeployableRemediation {
    pub actions: Vec<DeployableRemediationAction>,
    pub cost: f64,
    pub corrected_path: AttackPath,
}

impl DeployableRemediation {
    pub fn new(corrected_path: AttackPath) -> Self {
        Self { actions: Vec::new(), cost: 0.0, corrected_path }
    }

    /// Sum of the operational costs of the actions
    pub fn compute_cost(&mut self) -> f64 {
        self.cost = self.actions.iter().map(|deployable| deployable.action.operational_cost()).sum();
        self.cost
    }

    pub fn to_xml(&self, information_system: &InformationSystem, habit_index: f64) -> XmlElement {
        let mut root = XmlElement::new("remediation");
        root.push(XmlElement::with_text("cost", self.cost))
            .push(XmlElement::with_text("habit_index", habit_index));
        let mut actions = XmlElement::new("remediation_actions");
        for action in &self.actions {
            actions.push(action.to_xml(information_system));
        }
        root.push(actions);
        root
    }

    // ------------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------------

    /// Deploy the firewall actions on a copy of the information system and
    /// tell whether one of the accesses they filter is still possible.
    /// Without firewall action the flows are untouched.
    pub fn simulate(&self, information_system: &InformationSystem) -> Result<bool> {
        let mut simulated = information_system.clone();
        let mut filtered_accesses: BTreeSet<VertexId> = BTreeSet::new();
        for deployable in &self.actions {
            let RemediationKind::DeployFirewallRule(rule) = &deployable.action.kind else {
                continue;
            };
            let Some(host) = simulated.topology.host_mut(deployable.host) else {
                continue;
            };
            match rule.table {
                Table::Input => {
                    host.input_firewall.push_rule(rule.clone());
                }
                Table::Output => {
                    host.output_firewall.push_rule(rule.clone());
                }
                Table::Forward => continue,
            }
            filtered_accesses.insert(deployable.action.related_vertex);
        }

        if filtered_accesses.is_empty() {
            return Ok(true);
        }
        for access in filtered_accesses {
            if self.access_still_possible(access, &mut simulated)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn access_still_possible(&self, access: VertexId, simulated: &mut InformationSystem) -> Result<bool> {
        let vertex = self.corrected_path.graph.vertex_from_id(access)?;
        let Some(command) = vertex.command() else {
            return Ok(true);
        };
        let (Some(from), Some(to), Some(protocol), Some(port)) =
            (command.param(0), command.param(1), command.param(2), command.param(3))
        else {
            return Ok(true);
        };
        let protocol = Protocol::from_name(protocol);
        let port = Service::port_string_to_int(port);

        if names_the_internet(from) {
            let to = simulated.get_host_by_name_or_ip_address(to)?;
            let Some(address) = simulated.machine(to).and_then(|host| host.first_ip_address()) else {
                return Ok(false);
            };
            let routes = simulated.routes_from_internet_to(to)?;
            Ok(routes
                .iter()
                .any(|route| simulated.topology.send_a_packet_on_a_route_from_internet(route, address, port, protocol)))
        } else if names_the_internet(to) {
            let from = simulated.get_host_by_name_or_ip_address(from)?;
            let Some(address) = simulated.machine(from).and_then(|host| host.first_ip_address()) else {
                return Ok(false);
            };
            let route = simulated.route_to_internet_from(from);
            let packet = Packet {
                protocol,
                source: address,
                source_mask: IpAddress::HOST_MASK,
                source_port: CLIENT_SOURCE_PORT,
                destination: IpAddress::ANY,
                destination_mask: IpAddress::ANY,
                destination_port: port,
            };
            Ok(simulated.topology.send_a_packet_on_a_route(&route, &packet))
        } else {
            let from = simulated.get_host_by_name_or_ip_address(from)?;
            let to = simulated.get_host_by_name_or_ip_address(to)?;
            let addresses = (
                simulated.machine(from).and_then(|host| host.first_ip_address()),
                simulated.machine(to).and_then(|host| host.first_ip_address()),
            );
            let (Some(source), Some(destination)) = addresses else {
                return Ok(false);
            };
            simulated
                .topology
                .send_a_packet_from_a_host_to_another_succeed(source, CLIENT_SOURCE_PORT, destination, port, protocol)
        }
    }

    // ------------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------------

    /// Record this remediation of `corrected_path` in the history file
    pub fn validate(&self, config: &Config, information_system: &mut InformationSystem) -> Result<()> {
        info!("{} has been validated to correct the path.", self);
        let path = &config.remediations_history_path;
        if path.as_os_str().is_empty() {
            warn!("The remediations history path has not been set, the remediation history will not be kept.");
            return Ok(());
        }
        let mut history = if path.exists() { load_history(path)? } else { Vec::new() };
        info!("{} remediated paths in the history file.", history.len());
        history.push(HistoryEntry {
            attack_path: SerializableAttackPath::from_attack_path(&self.corrected_path, information_system)?,
            remediation: SerializableDeployableRemediation::new(self, information_system),
        });
        save_history(path, &history)
    }

    /// Number of times a similar remediation was validated for a similar path
    pub fn habit_index(&self, config: &Config, information_system: &mut InformationSystem) -> Result<f64> {
        let path = &config.remediations_history_path;
        if path.as_os_str().is_empty() || !path.exists() {
            return Ok(0.0);
        }
        let history = load_history(path)?;
        let current_path = SerializableAttackPath::from_attack_path(&self.corrected_path, information_system)?;
        let count = history
            .iter()
            .filter(|entry| {
                entry.attack_path.is_similar_to(&current_path) && entry.remediation.is_similar_to(self, information_system)
            })
            .count();
        Ok(count as f64)
    }
}

impl fmt::Display for DeployableRemediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<String> = self.actions.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", actions.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack_graph::tests::small_graph;
    use crate::remediation::tests::{costs, knowledge_base, routed_system};
    use crate::remediation::{deployable_remediations, ActionType, RemediationContext};

    fn remediations(system: &mut InformationSystem) -> Vec<DeployableRemediation> {
        let path = small_graph().generate_attack_paths().remove(0);
        let knowledge_base = knowledge_base();
        let context = RemediationContext::new(&knowledge_base, costs());
        deployable_remediations(&path, system, &context).unwrap()
    }

    #[test]
    fn deployable_action_exposes_its_action_and_host() {
        let action = RemediationAction::new(RemediationKind::ApplyPatch(Vec::new()), 3, &costs());
        let deployable = DeployableRemediationAction::new(action.clone(), HostId(2));
        assert_eq!(deployable.action(), &action);
        assert_eq!(deployable.host(), HostId(2));
        assert_eq!(deployable.action().related_vertex, 3);
        assert_eq!(deployable.to_string(), format!("{} on {:?}", ActionType::ApplyPatch, HostId(2)));
    }

    #[test]
    fn firewall_remediations_block_the_access() {
        let (mut system, _, _) = routed_system();
        let remediations = remediations(&mut system);
        for remediation in &remediations {
            let blocked = !remediation.simulate(&system).unwrap();
            let is_firewall = remediation.actions[0].action().action_type() == ActionType::DeployFirewallRule;
            // a patch does not change the flows
            assert_eq!(blocked, is_firewall, "{}", remediation);
        }
        // the simulation works on a copy
        let router = system.existing_machine_by_name("router").unwrap();
        assert!(system.machine(router).unwrap().input_firewall.is_empty());
    }

    #[test]
    fn xml_rendering() {
        let (mut system, _, _) = routed_system();
        let remediations = remediations(&mut system);
        let patch = remediations.last().unwrap().to_xml(&system, 2.0);
        assert_eq!(patch.child_text("cost"), Some("50"));
        assert_eq!(patch.child_text("habit_index"), Some("2"));
        let action = patch.required_child("remediation_actions").unwrap().children[0].clone();
        assert_eq!(action.child_text("machine"), Some("web"));
        let action = action.required_child("action").unwrap();
        assert_eq!(action.child_text("type"), Some("patch"));
        assert_eq!(action.required_child("patchs").unwrap().children[0].text, "https://example.org/bash-patch");

        let firewall = remediations[0].to_xml(&system, 0.0);
        let rule = firewall.required_child("remediation_actions").unwrap().children[0]
            .required_child("action")
            .unwrap()
            .child_text("rule")
            .unwrap()
            .to_string();
        assert!(rule.starts_with("iptables -I "));
        assert!(rule.contains("-j DROP"));
    }

    #[test]
    fn validated_remediations_raise_the_habit_index() {
        let (mut system, _, _) = routed_system();
        let remediations = remediations(&mut system);
        let history = tempfile::tempdir().unwrap();
        let config = Config {
            remediations_history_path: history.path().join("history.json"),
            ..Config::default()
        };

        let chosen = &remediations[0];
        assert_eq!(chosen.habit_index(&config, &mut system).unwrap(), 0.0);
        chosen.validate(&config, &mut system).unwrap();
        chosen.validate(&config, &mut system).unwrap();
        assert_eq!(chosen.habit_index(&config, &mut system).unwrap(), 2.0);

        let patch = remediations.last().unwrap();
        assert_eq!(patch.habit_index(&config, &mut system).unwrap(), 0.0);
    }
}
