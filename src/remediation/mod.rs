//! Remediation of attack paths
//!
//! A remediable leaf of an attack path (a vulnerability, a network access)
//! gets a list of alternative ways to fix it; each alternative is a list of
//! actions that must all be deployed. The sufficient groups of leaves of the
//! path are combined into candidate remediations, expanded over the machines
//! each action can be deployed on and ordered by operational cost.

pub mod cost;
pub mod deployable;
pub mod dynamic;
pub mod knowledge;
pub mod serializable;

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::attack_graph::{AttackPath, VertexId};
use crate::error::{AttackGraphError, Result};
use crate::fact::{names_the_internet, DatalogCommand};
use crate::information_system::InformationSystem;
use crate::topology::{Action, FirewallRule, HostId, IpAddress, PortRange, Protocol, Table};

pub use cost::{CostParameters, GlobalParameters, OperationalCostParameters};
pub use deployable::{DeployableRemediation, DeployableRemediationAction};
pub use dynamic::{Alert, DynamicRemediation};
pub use knowledge::{InMemoryKnowledgeBase, Patch, SnortRule, VulnerabilityKnowledgeBase};
pub use serializable::{SerializableDeployableRemediation, SerializableDeployableRemediationAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    ApplyPatch,
    DeploySnortRule,
    DeployFirewallRule,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::ApplyPatch => write!(f, "APPLY_PATCH"),
            ActionType::DeploySnortRule => write!(f, "DEPLOY_SNORT_RULE"),
            ActionType::DeployFirewallRule => write!(f, "DEPLOY_FIREWALL_RULE"),
        }
    }
}

/// What a remediation action deploys
#[derive(Debug, Clone, PartialEq)]
pub enum RemediationKind {
    ApplyPatch(Vec<Patch>),
    DeployFirewallRule(FirewallRule),
    DeploySnortRule(Vec<SnortRule>),
}

impl RemediationKind {
    pub fn action_type(&self) -> ActionType {
        match self {
            RemediationKind::ApplyPatch(_) => ActionType::ApplyPatch,
            RemediationKind::DeployFirewallRule(_) => ActionType::DeployFirewallRule,
            RemediationKind::DeploySnortRule(_) => ActionType::DeploySnortRule,
        }
    }
}

/// An action fixing one leaf, deployable on any of `possible_machines`
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationAction {
    pub kind: RemediationKind,
    pub possible_machines: Vec<HostId>,
    pub related_vertex: VertexId,
    pub cost_parameters: OperationalCostParameters,
}

impl RemediationAction {
    pub fn new(kind: RemediationKind, related_vertex: VertexId, costs: &CostParameters) -> Self {
        let cost_parameters = costs.for_action_type(kind.action_type());
        Self { kind, possible_machines: Vec::new(), related_vertex, cost_parameters }
    }

    pub fn action_type(&self) -> ActionType {
        self.kind.action_type()
    }

    pub fn operational_cost(&self) -> f64 {
        self.cost_parameters.operational_cost()
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RemediationAction [actionType={}, possibleMachines={}, relatedVertex={}]",
            self.action_type(),
            self.possible_machines.len(),
            self.related_vertex
        )
    }
}

/// Alternatives (outer list) of actions to deploy together (inner list)
pub type RemediationAlternatives = Vec<Vec<RemediationAction>>;

/// Everything needed to turn attack paths into remediations
pub struct RemediationContext<'a> {
    pub knowledge_base: &'a dyn VulnerabilityKnowledgeBase,
    pub costs: CostParameters,
    pub use_snort_rules: bool,
}

impl<'a> RemediationContext<'a> {
    pub fn new(knowledge_base: &'a dyn VulnerabilityKnowledgeBase, costs: CostParameters) -> Self {
        Self { knowledge_base, costs, use_snort_rules: true }
    }
}

// ============================================================================
// CANDIDATES FOR ONE LEAF
// ============================================================================

/// The ways to remediate one leaf of `path`
pub fn remediation_actions_for_leaf(
    path: &AttackPath,
    leaf: VertexId,
    information_system: &mut InformationSystem,
    context: &RemediationContext<'_>,
) -> Result<RemediationAlternatives> {
    let vertex = path.graph.vertex_from_id(leaf)?;
    let Some(command) = vertex.command() else {
        return Ok(Vec::new());
    };
    match command.command.as_str() {
        "vulExists" => vulnerability_remediations(path, leaf, command, information_system, context),
        "hacl" | "haclprimit" => access_remediations(leaf, command, information_system, context),
        _ => Ok(Vec::new()),
    }
}

/// Patch the vulnerable machine, or reject the exploit on every route the
/// attacker can take to it
fn vulnerability_remediations(
    path: &AttackPath,
    leaf: VertexId,
    command: &DatalogCommand,
    information_system: &mut InformationSystem,
    context: &RemediationContext<'_>,
) -> Result<RemediationAlternatives> {
    let mut result = Vec::new();
    let Some(cve) = command.param(1) else {
        return Ok(result);
    };

    let patches = context.knowledge_base.patches_for(cve);
    if !patches.is_empty() {
        let mut action = RemediationAction::new(RemediationKind::ApplyPatch(patches), leaf, &context.costs);
        let machine = path.graph.vertex_from_id(leaf)?.related_machine(information_system);
        action.possible_machines.extend(machine);
        result.push(vec![action]);
    }

    let rules = context.knowledge_base.snort_rules_for(cve);
    if !rules.is_empty() && context.use_snort_rules {
        match path.attacker_route_to_a_vulnerability(leaf, information_system) {
            Ok(routes) => {
                let rejecting: Vec<SnortRule> = rules.iter().map(SnortRule::rejecting).collect();
                let on_every_route = routes
                    .into_iter()
                    .map(|route| {
                        let mut action =
                            RemediationAction::new(RemediationKind::DeploySnortRule(rejecting.clone()), leaf, &context.costs);
                        action.possible_machines = route;
                        action
                    })
                    .collect();
                result.push(on_every_route);
            }
            Err(error) => warn!("No Snort remediation for {}: {}", cve, error),
        }
    }
    Ok(result)
}

/// Drop the packets of a network access, either when they enter a machine
/// of the route or when they leave it
fn access_remediations(
    leaf: VertexId,
    command: &DatalogCommand,
    information_system: &mut InformationSystem,
    context: &RemediationContext<'_>,
) -> Result<RemediationAlternatives> {
    let missing = || AttackGraphError::Format(format!("Incomplete access fact: {}", command));
    let (from_name, to_name) = (command.param(0).ok_or_else(missing)?, command.param(1).ok_or_else(missing)?);
    let protocol = Protocol::from_name(command.param(2).ok_or_else(missing)?);
    let port: PortRange = command.param(3).ok_or_else(missing)?.parse()?;
    let from_internet = names_the_internet(from_name);
    let to_internet = names_the_internet(to_name);

    let (source, source_mask) = if from_internet {
        (IpAddress::ANY, IpAddress::ANY)
    } else {
        (host_address(information_system, from_name)?, IpAddress::HOST_MASK)
    };
    let (destination, destination_mask) = if to_internet {
        (IpAddress::ANY, IpAddress::ANY)
    } else {
        (host_address(information_system, to_name)?, IpAddress::HOST_MASK)
    };

    // haclprimit has the shape of a hacl
    let mut hacl = command.clone();
    hacl.command = "hacl".to_string();
    let routes = hacl.get_routes_between_hosts_of_hacl(information_system)?;

    let sender = information_system.existing_machine_by_name_or_ip_address(from_name);
    let receiver = information_system.existing_machine_by_name_or_ip_address(to_name);

    let mut result = Vec::new();
    for (table, excluded) in [(Table::Input, sender.filter(|_| !from_internet)), (Table::Output, receiver.filter(|_| !to_internet))] {
        let rule = FirewallRule::new(
            Action::Drop,
            protocol,
            source,
            source_mask,
            PortRange::any(),
            destination,
            destination_mask,
            port,
            table,
        );
        let on_every_route = routes
            .iter()
            .map(|route| {
                let mut action = RemediationAction::new(RemediationKind::DeployFirewallRule(rule.clone()), leaf, &context.costs);
                action.possible_machines = route.iter().copied().filter(|host| Some(*host) != excluded).collect();
                action
            })
            .collect();
        result.push(on_every_route);
    }
    Ok(result)
}

fn host_address(information_system: &mut InformationSystem, name: &str) -> Result<IpAddress> {
    let host = information_system.get_host_by_name_or_ip_address(name)?;
    information_system
        .machine(host)
        .and_then(|machine| machine.first_ip_address())
        .ok_or(AttackGraphError::NoInterface)
}

// ============================================================================
// CANDIDATES FOR A PATH
// ============================================================================

/// Alternatives remediating the whole path: for every sufficient group of
/// leaves, one alternative per combination of the leaves' alternatives
pub fn remediation_actions(
    path: &AttackPath,
    information_system: &mut InformationSystem,
    context: &RemediationContext<'_>,
) -> Result<RemediationAlternatives> {
    let mut how_to_remediate_leaves: HashMap<VertexId, RemediationAlternatives> = HashMap::new();
    for leaf in path.leaves_that_can_be_remediated() {
        let alternatives = remediation_actions_for_leaf(path, leaf, information_system, context)?;
        how_to_remediate_leaves.insert(leaf, alternatives);
    }

    let mut result = Vec::new();
    for group in path.sufficient_leaves_to_cut_path() {
        let remediable = group
            .iter()
            .all(|leaf| how_to_remediate_leaves.get(leaf).is_some_and(|alternatives| !alternatives.is_empty()));
        if remediable {
            result.extend(combine_leaf_remediations(&group, &how_to_remediate_leaves));
        } else {
            debug!("Leaves {:?} cannot be remediated together", group);
        }
    }
    Ok(result)
}

/// Each alternative of the first leaf appended to every combination of the others
fn combine_leaf_remediations(
    leaves: &[VertexId],
    how_to_remediate_leaves: &HashMap<VertexId, RemediationAlternatives>,
) -> RemediationAlternatives {
    let alternatives_of = |leaf: &VertexId| how_to_remediate_leaves.get(leaf).cloned().unwrap_or_default();
    match leaves {
        [] => Vec::new(),
        [leaf] => alternatives_of(leaf),
        [leaf, rest @ ..] => {
            let others = combine_leaf_remediations(rest, how_to_remediate_leaves);
            let mut result = Vec::new();
            for alternative in alternatives_of(leaf) {
                for combination in &others {
                    let mut actions = combination.clone();
                    actions.extend(alternative.iter().cloned());
                    result.push(actions);
                }
            }
            result
        }
    }
}

/// Remediations of `path` placed on concrete machines, cheapest first
pub fn deployable_remediations(
    path: &AttackPath,
    information_system: &mut InformationSystem,
    context: &RemediationContext<'_>,
) -> Result<Vec<DeployableRemediation>> {
    let mut result = Vec::new();
    for alternative in remediation_actions(path, information_system, context)? {
        let mut group = vec![DeployableRemediation::new(path.clone())];
        for action in &alternative {
            let Some((first, others)) = action.possible_machines.split_first() else {
                continue;
            };
            let mut placed_elsewhere = Vec::new();
            for &machine in others {
                for remediation in &group {
                    let mut copy = remediation.clone();
                    copy.actions.push(DeployableRemediationAction::new(action.clone(), machine));
                    placed_elsewhere.push(copy);
                }
            }
            for remediation in &mut group {
                remediation.actions.push(DeployableRemediationAction::new(action.clone(), *first));
            }
            group.extend(placed_elsewhere);
        }
        result.extend(group.into_iter().filter(|remediation| !remediation.actions.is_empty()));
    }

    for remediation in &mut result {
        remediation.compute_cost();
    }
    result.sort_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap_or(std::cmp::Ordering::Equal));
    Ok(result)
}
