// Remediation snapshots and the history of validated remediations

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::attack_graph::SerializableAttackPath;
use crate::error::Result;
use crate::information_system::InformationSystem;

use super::{DeployableRemediation, DeployableRemediationAction, RemediationKind};

/// `(type, canonical parameters, host name)` of a deployed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableDeployableRemediationAction {
    pub remediation_action_type: String,
    pub remediation_action: String,
    pub host: String,
}

/// Every item followed by `|`, empty when there is none
fn joined_parameters<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.map(|item| format!("{}|", item)).collect()
}

impl SerializableDeployableRemediationAction {
    pub fn new(deployable: &DeployableRemediationAction, information_system: &InformationSystem) -> Self {
        let remediation_action = match &deployable.action().kind {
            RemediationKind::ApplyPatch(patches) => joined_parameters(patches.iter().map(|patch| patch.link.as_str())),
            RemediationKind::DeployFirewallRule(rule) => rule.to_string(),
            RemediationKind::DeploySnortRule(rules) => joined_parameters(rules.iter().map(|rule| rule.rule.as_str())),
        };
        Self {
            remediation_action_type: deployable.action().action_type().to_string(),
            remediation_action,
            host: information_system.machine_name(deployable.host()).to_string(),
        }
    }

    pub fn is_similar_to(&self, deployable: &DeployableRemediationAction, information_system: &InformationSystem) -> bool {
        *self == Self::new(deployable, information_system)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableDeployableRemediation {
    pub actions: Vec<SerializableDeployableRemediationAction>,
}

impl SerializableDeployableRemediation {
    pub fn new(remediation: &DeployableRemediation, information_system: &InformationSystem) -> Self {
        Self {
            actions: remediation
                .actions
                .iter()
                .map(|action| SerializableDeployableRemediationAction::new(action, information_system))
                .collect(),
        }
    }

    /// Every action of `remediation` matches a stored action
    pub fn is_similar_to(&self, remediation: &DeployableRemediation, information_system: &InformationSystem) -> bool {
        remediation.actions.iter().all(|action| {
            self.actions
                .iter()
                .any(|stored| stored.is_similar_to(action, information_system))
        })
    }
}

/// One validated remediation of an attack path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub attack_path: SerializableAttackPath,
    pub remediation: SerializableDeployableRemediation,
}

pub fn load_history(path: &Path) -> Result<Vec<HistoryEntry>> {
    let history: Vec<HistoryEntry> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    debug!("{} entries in the remediation history {}", history.len(), path.display());
    Ok(history)
}

pub fn save_history(path: &Path, history: &[HistoryEntry]) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(history)?)?;
    Ok(())
}
