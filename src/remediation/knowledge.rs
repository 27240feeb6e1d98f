//! Vulnerability knowledge base: the patches and the Snort rules known for a CVE

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub link: String,
    #[serde(default)]
    pub description: String,
}

impl Patch {
    pub fn new(link: &str, description: &str) -> Self {
        Self { link: link.to_string(), description: description.to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnortRule {
    pub rule: String,
    #[serde(default)]
    pub sid: u32,
    #[serde(default)]
    pub description: String,
}

impl SnortRule {
    pub fn new(rule: &str) -> Self {
        Self { rule: rule.to_string(), ..Default::default() }
    }

    /// The same rule rejecting the traffic instead of raising an alert
    pub fn rejecting(&self) -> Self {
        Self { rule: self.rule.replacen("alert", "reject", 1), ..self.clone() }
    }
}

pub trait VulnerabilityKnowledgeBase {
    fn patches_for(&self, cve: &str) -> Vec<Patch>;
    fn snort_rules_for(&self, cve: &str) -> Vec<SnortRule>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownRemediations {
    #[serde(default)]
    pub patches: Vec<Patch>,
    #[serde(default)]
    pub snort_rules: Vec<SnortRule>,
}

/// Knowledge base held in memory, keyed by CVE.
///
/// JSON form: `{"CVE-2014-6271": {"patches": [{"link": ...}], "snort_rules": [{"rule": ...}]}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryKnowledgeBase {
    pub vulnerabilities: HashMap<String, KnownRemediations>,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_patch(&mut self, cve: &str, patch: Patch) {
        self.vulnerabilities.entry(cve.to_string()).or_default().patches.push(patch);
    }

    pub fn add_snort_rule(&mut self, cve: &str, rule: SnortRule) {
        self.vulnerabilities.entry(cve.to_string()).or_default().snort_rules.push(rule);
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

impl VulnerabilityKnowledgeBase for InMemoryKnowledgeBase {
    fn patches_for(&self, cve: &str) -> Vec<Patch> {
        self.vulnerabilities.get(cve).map(|known| known.patches.clone()).unwrap_or_default()
    }

    fn snort_rules_for(&self, cve: &str) -> Vec<SnortRule> {
        self.vulnerabilities.get(cve).map(|known| known.snort_rules.clone()).unwrap_or_default()
    }
}
