// Operational cost parameters of the remediation actions

use std::path::Path;

use log::debug;

use crate::error::{AttackGraphError, Result};
use crate::xml::XmlElement;

use super::ActionType;

pub const FILE_NAME_PATCH: &str = "patch-parameters.xml";
pub const FILE_NAME_FIREWALL_RULE: &str = "firewall-rule-parameters.xml";
pub const FILE_NAME_SNORT_RULE: &str = "snort-rule-parameters.xml";
pub const FILE_NAME_GLOBAL: &str = "global-parameters.xml";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn parse_value(element: &XmlElement) -> Result<f64> {
    element
        .text
        .trim()
        .parse()
        .map_err(|_| AttackGraphError::Format(format!("<{}> is not a number: {}", element.name, element.text)))
}

/// Costs and durations of deploying one type of remediation.
/// Durations are in hours, costs in the currency of `GlobalParameters`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationalCostParameters {
    pub remediation_cost: f64,
    pub business_applications_tests_duration: f64,
    pub work_cost: f64,
    pub computation_power_cost: f64,
    pub storage_cost: f64,
    pub deployment_duration: f64,
    pub remediation_uninstall_duration: f64,
    pub service_unavailability_deployment_duration: f64,
    pub restart_cost: f64,
    pub restart_duration: f64,
    pub used_power: f64,
    pub used_storage: f64,
    pub maintenance_duration: f64,
    pub skill_rate_tests: f64,
    pub skill_rate_deployment: f64,
    pub skill_rate_maintenance: f64,
}

impl Default for OperationalCostParameters {
    fn default() -> Self {
        Self {
            remediation_cost: 0.0,
            business_applications_tests_duration: 0.0,
            work_cost: 0.0,
            computation_power_cost: 0.0,
            storage_cost: 0.0,
            deployment_duration: 0.0,
            remediation_uninstall_duration: 0.0,
            service_unavailability_deployment_duration: 0.0,
            restart_cost: 0.0,
            restart_duration: 0.0,
            used_power: 0.0,
            used_storage: 0.0,
            maintenance_duration: 0.0,
            skill_rate_tests: 1.0,
            skill_rate_deployment: 1.0,
            skill_rate_maintenance: 1.0,
        }
    }
}

impl OperationalCostParameters {
    /// XML element names, in document order
    fn fields_mut(&mut self) -> [(&'static str, &mut f64); 16] {
        [
            ("businessApplicationsTestsDuration", &mut self.business_applications_tests_duration),
            ("workCost", &mut self.work_cost),
            ("remediationCost", &mut self.remediation_cost),
            ("computationPowerCost", &mut self.computation_power_cost),
            ("storageCost", &mut self.storage_cost),
            ("deploymentDuration", &mut self.deployment_duration),
            ("remediationUninstallDuration", &mut self.remediation_uninstall_duration),
            ("serviceUnavailabilityDeploymentDuration", &mut self.service_unavailability_deployment_duration),
            ("restartCost", &mut self.restart_cost),
            ("restartDuration", &mut self.restart_duration),
            ("usedPower", &mut self.used_power),
            ("usedStorage", &mut self.used_storage),
            ("maintenanceDuration", &mut self.maintenance_duration),
            ("skillRateTests", &mut self.skill_rate_tests),
            ("skillRateDeployment", &mut self.skill_rate_deployment),
            ("skillRateMaintenance", &mut self.skill_rate_maintenance),
        ]
    }

    pub fn from_xml(root: &XmlElement) -> Result<Self> {
        let mut parameters = Self::default();
        for (name, field) in parameters.fields_mut() {
            if let Some(element) = root.child(name) {
                *field = parse_value(element)?;
            }
        }
        Ok(parameters)
    }

    pub fn to_xml(&self) -> XmlElement {
        let mut copy = *self;
        let mut root = XmlElement::new("operational_costs_parameters");
        for (name, field) in copy.fields_mut() {
            root.push(XmlElement::with_text(name, *field));
        }
        root
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_xml(&XmlElement::parse(&std::fs::read_to_string(path)?)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_xml().to_xml_string()?)?;
        Ok(())
    }

    /// Parameters of an action type from the cost parameters folder; an
    /// absent file leaves the defaults
    pub fn load_for_action_type(folder: &Path, action_type: ActionType) -> Result<Self> {
        let file_name = match action_type {
            ActionType::ApplyPatch => FILE_NAME_PATCH,
            ActionType::DeployFirewallRule => FILE_NAME_FIREWALL_RULE,
            ActionType::DeploySnortRule => FILE_NAME_SNORT_RULE,
        };
        let path = folder.join(file_name);
        if path.exists() {
            debug!("Loading cost parameters of {} from {}", action_type, path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    // ------------------------------------------------------------------------
    // Cost terms, each rounded to the cent
    // ------------------------------------------------------------------------

    pub fn remediation_cost(&self) -> f64 {
        round2(self.remediation_cost)
    }

    pub fn test_cost(&self) -> f64 {
        round2(
            (self.deployment_duration + self.business_applications_tests_duration + self.remediation_uninstall_duration)
                * self.skill_rate_tests
                * self.work_cost,
        )
    }

    pub fn deployment_cost(&self) -> f64 {
        let deployment = self.deployment_duration * self.skill_rate_deployment * self.work_cost;
        let production_tests = self.business_applications_tests_duration * self.skill_rate_tests * self.work_cost;
        round2(deployment + production_tests)
    }

    pub fn restart_cost(&self) -> f64 {
        round2(self.restart_cost)
    }

    pub fn maintenance_cost(&self) -> f64 {
        round2(
            self.used_power * self.computation_power_cost
                + self.used_storage * self.storage_cost
                + self.maintenance_duration * self.work_cost * self.skill_rate_maintenance,
        )
    }

    pub fn operational_cost(&self) -> f64 {
        round2(
            self.remediation_cost()
                + self.test_cost()
                + self.deployment_cost()
                + self.restart_cost()
                + self.maintenance_cost(),
        )
    }
}

/// Operational cost parameters of every action type
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostParameters {
    pub patch: OperationalCostParameters,
    pub firewall_rule: OperationalCostParameters,
    pub snort_rule: OperationalCostParameters,
}

impl CostParameters {
    pub fn load(folder: &Path) -> Result<Self> {
        Ok(Self {
            patch: OperationalCostParameters::load_for_action_type(folder, ActionType::ApplyPatch)?,
            firewall_rule: OperationalCostParameters::load_for_action_type(folder, ActionType::DeployFirewallRule)?,
            snort_rule: OperationalCostParameters::load_for_action_type(folder, ActionType::DeploySnortRule)?,
        })
    }

    pub fn for_action_type(&self, action_type: ActionType) -> OperationalCostParameters {
        match action_type {
            ActionType::ApplyPatch => self.patch,
            ActionType::DeployFirewallRule => self.firewall_rule,
            ActionType::DeploySnortRule => self.snort_rule,
        }
    }
}

/// Parameters shared by every remediation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalParameters {
    /// Yearly IT expenses
    pub expenses_for_it: f64,
}

impl Default for GlobalParameters {
    fn default() -> Self {
        Self { expenses_for_it: 100.0 }
    }
}

impl GlobalParameters {
    pub fn from_xml(root: &XmlElement) -> Result<Self> {
        let mut parameters = Self::default();
        if let Some(element) = root.child("expensesForIT") {
            parameters.expenses_for_it = parse_value(element)?;
        }
        Ok(parameters)
    }

    pub fn to_xml(&self) -> XmlElement {
        let mut root = XmlElement::new("global_parameters");
        root.push(XmlElement::with_text("expensesForIT", self.expenses_for_it));
        root
    }

    /// `global-parameters.xml` of the folder, defaults when it is absent
    pub fn load(folder: &Path) -> Result<Self> {
        let path = folder.join(FILE_NAME_GLOBAL);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_xml(&XmlElement::parse(&std::fs::read_to_string(path)?)?)
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        std::fs::write(folder.join(FILE_NAME_GLOBAL), self.to_xml().to_xml_string()?)?;
        Ok(())
    }
}
