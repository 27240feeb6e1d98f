//! Incremental compromise reachability
//!
//! The MulVAL facts of an attack graph (`attackerLocated`, `hacl`,
//! `vulExists`) are fed to a differential dataflow computing the set of
//! compromised hosts. Once the fixpoint is reached, removing a fact (a
//! firewall rule cutting a hacl, a patch removing a vulnerability) only
//! recomputes what the removal changes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use abomonation_derive::Abomonation;
use differential_dataflow::collection::Collection;
use differential_dataflow::input::{Input, InputSession};
use differential_dataflow::lattice::Lattice;
use differential_dataflow::operators::iterate::Iterate;
use differential_dataflow::operators::join::Join;
use differential_dataflow::operators::reduce::Threshold;
use differential_dataflow::operators::Consolidate;
use log::{debug, info};
use timely::communication::Allocate;
use timely::dataflow::operators::probe::Handle;
use timely::dataflow::Scope;
use timely::worker::Worker;

use crate::attack_graph::AttackGraph;

// ============================================================================
// FACTS
// ============================================================================

/// attackerLocated(host)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Abomonation)]
pub struct AttackerLocation {
    pub host: String,
}

impl AttackerLocation {
    pub fn new(host: &str) -> Self {
        Self { host: host.to_string() }
    }
}

/// hacl(source, destination, protocol, port)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Abomonation)]
pub struct HaclEdge {
    pub source: String,
    pub destination: String,
    pub protocol: String,
    pub port: String,
}

impl HaclEdge {
    pub fn new(source: &str, destination: &str, protocol: &str, port: &str) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            protocol: protocol.to_string(),
            port: port.to_string(),
        }
    }
}

/// vulExists(host, cve)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Abomonation)]
pub struct VulnerableHost {
    pub host: String,
    pub cve: String,
}

impl VulnerableHost {
    pub fn new(host: &str, cve: &str) -> Self {
        Self { host: host.to_string(), cve: cve.to_string() }
    }
}

/// Derived: the attacker executes code on `host`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Abomonation)]
pub struct CompromisedHost {
    pub host: String,
}

impl fmt::Display for AttackerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attackerLocated({})", self.host)
    }
}

impl fmt::Display for HaclEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hacl({}, {}, {}, {})", self.source, self.destination, self.protocol, self.port)
    }
}

impl fmt::Display for VulnerableHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vulExists({}, {})", self.host, self.cve)
    }
}

impl fmt::Display for CompromisedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "execCode({})", self.host)
    }
}

/// The base facts of one reachability computation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachabilityFacts {
    pub attacker_locations: Vec<AttackerLocation>,
    pub hacls: Vec<HaclEdge>,
    pub vulnerabilities: Vec<VulnerableHost>,
}

impl ReachabilityFacts {
    /// Collect the reachability facts carried by the leaves of a MulVAL graph
    pub fn from_attack_graph(attack_graph: &AttackGraph) -> Self {
        let mut facts = Self::default();
        for vertex in attack_graph.vertices.values() {
            let Some(command) = vertex.command() else {
                continue;
            };
            let param = |index: usize| command.param(index).unwrap_or_default();
            match command.command.as_str() {
                "attackerLocated" => facts.attacker_locations.push(AttackerLocation::new(param(0))),
                "hacl" => facts.hacls.push(HaclEdge::new(param(0), param(1), param(2), param(3))),
                "vulExists" => facts.vulnerabilities.push(VulnerableHost::new(param(0), param(1))),
                _ => {}
            }
        }
        debug!(
            "{} attacker locations, {} hacl, {} vulnerabilities extracted from the attack graph",
            facts.attacker_locations.len(),
            facts.hacls.len(),
            facts.vulnerabilities.len()
        );
        facts
    }
}

/// A fact withdrawn by a remediation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactRemoval {
    /// A firewall rule cutting the access
    Hacl(HaclEdge),
    /// A patch
    Vulnerability(VulnerableHost),
}

impl fmt::Display for FactRemoval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactRemoval::Hacl(hacl) => write!(f, "-{}", hacl),
            FactRemoval::Vulnerability(vulnerability) => write!(f, "-{}", vulnerability),
        }
    }
}

// ============================================================================
// DATAFLOW
// ============================================================================

/// Build the compromise closure.
///
/// execCode(h) :- attackerLocated(h)
/// execCode(d) :- execCode(s), hacl(s, d, _, _), vulExists(d, _)
pub fn build_compromise_closure<G>(
    attacker_locations: &Collection<G, AttackerLocation>,
    hacls: &Collection<G, HaclEdge>,
    vulnerabilities: &Collection<G, VulnerableHost>,
) -> Collection<G, CompromisedHost>
where
    G: Scope,
    G::Timestamp: Lattice + Ord,
{
    // Step 1: the attacker controls the hosts it is located on
    let initial_compromise = attacker_locations
        .map(|location| CompromisedHost { host: location.host })
        .distinct();

    // Step 2: index the accesses by source, the vulnerable hosts by name
    let destinations_by_source = hacls.map(|hacl| (hacl.source, hacl.destination));
    let vulnerable_hosts = vulnerabilities.map(|vulnerability| vulnerability.host).distinct();

    // Step 3: propagate along the accesses until the fixpoint
    let all_compromised = initial_compromise.iterate(|current| {
        let accesses = destinations_by_source.enter(&current.scope());
        let vulnerable = vulnerable_hosts.enter(&current.scope());

        let newly_compromised = current
            .map(|compromised| (compromised.host, ()))
            .join(&accesses)
            .map(|(_source, ((), destination))| (destination, ()))
            .semijoin(&vulnerable)
            .map(|(host, ())| CompromisedHost { host });

        newly_compromised.concat(current).distinct()
    });

    // Step 4: merge the updates of each time
    all_compromised.consolidate()
}

type CompromisedCounts = Arc<Mutex<BTreeMap<String, isize>>>;

/// Hosts whose accumulated multiplicity is positive
fn snapshot(counts: &CompromisedCounts) -> Vec<String> {
    let counts = counts.lock().unwrap_or_else(PoisonError::into_inner);
    counts.iter().filter(|(_, count)| **count > 0).map(|(host, _)| host.clone()).collect()
}

struct ReachabilityInputs {
    attacker_locations: InputSession<usize, AttackerLocation, isize>,
    hacls: InputSession<usize, HaclEdge, isize>,
    vulnerabilities: InputSession<usize, VulnerableHost, isize>,
}

impl ReachabilityInputs {
    fn insert_all(&mut self, facts: &ReachabilityFacts) {
        for location in &facts.attacker_locations {
            self.attacker_locations.insert(location.clone());
        }
        for hacl in &facts.hacls {
            self.hacls.insert(hacl.clone());
        }
        for vulnerability in &facts.vulnerabilities {
            self.vulnerabilities.insert(vulnerability.clone());
        }
    }

    fn remove(&mut self, removal: &FactRemoval) {
        match removal {
            FactRemoval::Hacl(hacl) => self.hacls.remove(hacl.clone()),
            FactRemoval::Vulnerability(vulnerability) => self.vulnerabilities.remove(vulnerability.clone()),
        }
    }

    fn restore(&mut self, removal: &FactRemoval) {
        match removal {
            FactRemoval::Hacl(hacl) => self.hacls.insert(hacl.clone()),
            FactRemoval::Vulnerability(vulnerability) => self.vulnerabilities.insert(vulnerability.clone()),
        }
    }

    fn advance_to(&mut self, time: usize) {
        self.attacker_locations.advance_to(time);
        self.hacls.advance_to(time);
        self.vulnerabilities.advance_to(time);
        self.attacker_locations.flush();
        self.hacls.flush();
        self.vulnerabilities.flush();
    }
}

fn install_closure<A: Allocate>(
    worker: &mut Worker<A>,
    probe: &mut Handle<usize>,
    counts: CompromisedCounts,
) -> ReachabilityInputs {
    worker.dataflow::<usize, _, _>(|scope| {
        let (location_handle, locations) = scope.new_collection::<AttackerLocation, isize>();
        let (hacl_handle, hacls) = scope.new_collection::<HaclEdge, isize>();
        let (vulnerability_handle, vulnerabilities) = scope.new_collection::<VulnerableHost, isize>();

        build_compromise_closure(&locations, &hacls, &vulnerabilities)
            .inspect(move |(compromised, _time, diff)| {
                let mut counts = counts.lock().unwrap_or_else(PoisonError::into_inner);
                *counts.entry(compromised.host.clone()).or_insert(0) += *diff;
            })
            .probe_with(probe);

        ReachabilityInputs {
            attacker_locations: location_handle,
            hacls: hacl_handle,
            vulnerabilities: vulnerability_handle,
        }
    })
}

// ============================================================================
// RUNS
// ============================================================================

/// Compromised hosts before and after an incremental remediation
#[derive(Debug, Clone, PartialEq)]
pub struct ReachabilityReport {
    pub compromised_before: Vec<String>,
    pub compromised_after: Vec<String>,
    pub initial_computation_time: Duration,
    pub incremental_update_time: Duration,
}

impl ReachabilityReport {
    /// Hosts no longer compromised once the remediation is applied
    pub fn protected_hosts(&self) -> Vec<String> {
        self.compromised_before
            .iter()
            .filter(|host| !self.compromised_after.contains(host))
            .cloned()
            .collect()
    }

    pub fn speedup_factor(&self) -> f64 {
        if self.incremental_update_time.as_nanos() > 0 {
            self.initial_computation_time.as_secs_f64() / self.incremental_update_time.as_secs_f64()
        } else {
            f64::INFINITY
        }
    }
}

/// Effect of one remediation evaluated alone
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationImpact {
    pub removal: FactRemoval,
    pub compromised_hosts: Vec<String>,
    pub update_time: Duration,
}

/// Hosts the attacker compromises, sorted by name
pub fn compute_compromised_hosts(facts: &ReachabilityFacts) -> Vec<String> {
    compute_with_remediation(facts, &[]).compromised_before
}

/// Reach the fixpoint, then withdraw `removals` in a single incremental step
pub fn compute_with_remediation(facts: &ReachabilityFacts, removals: &[FactRemoval]) -> ReachabilityReport {
    let facts = facts.clone();
    let removals = removals.to_vec();
    let counts: CompromisedCounts = Arc::new(Mutex::new(BTreeMap::new()));
    let worker_counts = Arc::clone(&counts);

    let (compromised_before, initial_computation_time, incremental_update_time) =
        timely::execute_directly(move |worker| {
            let mut probe = Handle::new();
            let mut inputs = install_closure(worker, &mut probe, Arc::clone(&worker_counts));

            // Phase 1: initial fixpoint
            let start_initial = Instant::now();
            inputs.insert_all(&facts);
            inputs.advance_to(1);
            while probe.less_than(&1) {
                worker.step();
            }
            let initial_elapsed = start_initial.elapsed();
            let before = snapshot(&worker_counts);

            // Phase 2: incremental update
            let start_incremental = Instant::now();
            for removal in &removals {
                inputs.remove(removal);
            }
            inputs.advance_to(2);
            while probe.less_than(&2) {
                worker.step();
            }
            (before, initial_elapsed, start_incremental.elapsed())
        });

    let report = ReachabilityReport {
        compromised_before,
        compromised_after: snapshot(&counts),
        initial_computation_time,
        incremental_update_time,
    };
    info!(
        "{} compromised hosts, {} after the remediation ({:?} initial, {:?} incremental)",
        report.compromised_before.len(),
        report.compromised_after.len(),
        report.initial_computation_time,
        report.incremental_update_time
    );
    report
}

/// Evaluate each candidate alone against the same fixpoint.
///
/// A candidate is withdrawn, measured, then restored before the next one.
/// Returns the time of the initial fixpoint and the impact of every candidate.
pub fn evaluate_remediations(
    facts: &ReachabilityFacts,
    candidates: &[FactRemoval],
) -> (Duration, Vec<RemediationImpact>) {
    let facts = facts.clone();
    let candidates = candidates.to_vec();
    let counts: CompromisedCounts = Arc::new(Mutex::new(BTreeMap::new()));

    timely::execute_directly(move |worker| {
        let mut probe = Handle::new();
        let mut inputs = install_closure(worker, &mut probe, Arc::clone(&counts));

        let start_initial = Instant::now();
        inputs.insert_all(&facts);
        inputs.advance_to(1);
        while probe.less_than(&1) {
            worker.step();
        }
        let initial_elapsed = start_initial.elapsed();

        let mut impacts = Vec::with_capacity(candidates.len());
        for (index, removal) in candidates.into_iter().enumerate() {
            // each candidate uses two times: withdrawal and restoration
            let withdrawn_at = 2 + 2 * index;

            let start_incremental = Instant::now();
            inputs.remove(&removal);
            inputs.advance_to(withdrawn_at);
            while probe.less_than(&withdrawn_at) {
                worker.step();
            }
            let update_time = start_incremental.elapsed();
            let compromised_hosts = snapshot(&counts);
            debug!("{}: {} compromised hosts", removal, compromised_hosts.len());

            inputs.restore(&removal);
            inputs.advance_to(withdrawn_at + 1);
            while probe.less_than(&(withdrawn_at + 1)) {
                worker.step();
            }
            impacts.push(RemediationImpact { removal, compromised_hosts, update_time });
        }
        (initial_elapsed, impacts)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack_graph::tests::small_graph;

    fn chain(length: usize) -> ReachabilityFacts {
        let mut facts = ReachabilityFacts::default();
        facts.attacker_locations.push(AttackerLocation::new("internet"));
        facts.hacls.push(HaclEdge::new("internet", "node_0", "tcp", "22"));
        for i in 0..length {
            facts.vulnerabilities.push(VulnerableHost::new(&format!("node_{}", i), &format!("CVE-CHAIN-{}", i)));
            if i + 1 < length {
                facts.hacls.push(HaclEdge::new(&format!("node_{}", i), &format!("node_{}", i + 1), "tcp", "22"));
            }
        }
        facts
    }

    #[test]
    fn facts_from_a_mulval_graph() {
        let facts = ReachabilityFacts::from_attack_graph(&small_graph());
        assert_eq!(facts.attacker_locations, vec![AttackerLocation::new("internet")]);
        assert_eq!(facts.hacls, vec![HaclEdge::new("internet", "web", "tcp", "80")]);
        assert_eq!(facts.vulnerabilities.len(), 1);
        assert_eq!(facts.vulnerabilities[0].cve, "CVE-2014-6271");
    }

    #[test]
    fn compromise_follows_the_accesses() {
        let facts = ReachabilityFacts::from_attack_graph(&small_graph());
        assert_eq!(compute_compromised_hosts(&facts), vec!["internet".to_string(), "web".to_string()]);
    }

    #[test]
    fn an_access_to_a_host_without_vulnerability_does_not_compromise_it() {
        let mut facts = chain(3);
        facts.hacls.push(HaclEdge::new("node_2", "hardened", "tcp", "22"));
        let compromised = compute_compromised_hosts(&facts);
        assert_eq!(compromised.len(), 4);
        assert!(!compromised.contains(&"hardened".to_string()));
    }

    #[test]
    fn patching_cuts_the_rest_of_the_chain() {
        let facts = chain(5);
        let report = compute_with_remediation(
            &facts,
            &[FactRemoval::Vulnerability(VulnerableHost::new("node_2", "CVE-CHAIN-2"))],
        );
        assert_eq!(report.compromised_before.len(), 6);
        assert_eq!(report.compromised_after, vec!["internet", "node_0", "node_1"]);
        assert_eq!(report.protected_hosts(), vec!["node_2", "node_3", "node_4"]);
    }

    #[test]
    fn a_second_access_keeps_the_host_compromised() {
        let mut facts = chain(3);
        facts.hacls.push(HaclEdge::new("internet", "node_2", "tcp", "443"));
        let report = compute_with_remediation(
            &facts,
            &[FactRemoval::Hacl(HaclEdge::new("node_1", "node_2", "tcp", "22"))],
        );
        assert!(report.protected_hosts().is_empty());
    }

    #[test]
    fn candidates_are_evaluated_independently() {
        let facts = chain(4);
        let candidates = vec![
            FactRemoval::Hacl(HaclEdge::new("internet", "node_0", "tcp", "22")),
            FactRemoval::Vulnerability(VulnerableHost::new("node_3", "CVE-CHAIN-3")),
        ];
        let (_, impacts) = evaluate_remediations(&facts, &candidates);
        assert_eq!(impacts[0].compromised_hosts, vec!["internet"]);
        // the first withdrawal was restored
        assert_eq!(impacts[1].compromised_hosts.len(), 4);
    }
}
