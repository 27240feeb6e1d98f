// From an attack graph to costed remediations, their history and their effect

use attack_graph_remediation::attack_graph::AttackGraph;
use attack_graph_remediation::config::Config;
use attack_graph_remediation::information_system::InformationSystem;
use attack_graph_remediation::reachability::{self, FactRemoval, HaclEdge, ReachabilityFacts, VulnerableHost};
use attack_graph_remediation::remediation::dynamic::{remediations_for_alert_json, Alert};
use attack_graph_remediation::remediation::{
    deployable_remediations, ActionType, CostParameters, DeployableRemediation, InMemoryKnowledgeBase,
    RemediationContext,
};
use attack_graph_remediation::topology::{IpAddress, Topology};

const WEB_SERVER: &str = r#"<attack_graph>
    <arcs>
        <arc><src>1</src><dst>2</dst></arc>
        <arc><src>2</src><dst>3</dst></arc>
        <arc><src>2</src><dst>4</dst></arc>
        <arc><src>2</src><dst>5</dst></arc>
        <arc><src>4</src><dst>6</dst></arc>
        <arc><src>6</src><dst>7</dst></arc>
        <arc><src>6</src><dst>8</dst></arc>
    </arcs>
    <vertices>
        <vertex><id>1</id><fact>execCode(web,root)</fact><metric>0</metric><type>OR</type></vertex>
        <vertex><id>2</id><fact>RULE 2 (remote exploit of a server program)</fact><metric>0</metric><type>AND</type></vertex>
        <vertex><id>3</id><fact>vulExists(web,'CVE-2014-6271',http,remoteExploit,privEscalation)</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>4</id><fact>netAccess(web,tcp,'80')</fact><metric>0</metric><type>OR</type></vertex>
        <vertex><id>5</id><fact>networkServiceInfo(web,http,tcp,'80',root)</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>6</id><fact>RULE 6 (direct network access)</fact><metric>0</metric><type>AND</type></vertex>
        <vertex><id>7</id><fact>hacl(internet,web,tcp,'80')</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>8</id><fact>attackerLocated(internet)</fact><metric>1</metric><type>LEAF</type></vertex>
    </vertices>
</attack_graph>"#;

const TOPOLOGY: &str = r#"{
    "vlans": [ { "label": "lan", "network": "192.168.1.0/24" } ],
    "hosts": [
        {
            "name": "router",
            "interfaces": [
                { "name": "eth0", "ip": "10.0.0.1", "connected_to_the_internet": true },
                { "name": "eth1", "ip": "192.168.1.1", "vlan": "lan" }
            ]
        },
        {
            "name": "web",
            "interfaces": [ { "name": "eth0", "ip": "192.168.1.2", "vlan": "lan" } ],
            "routes": [ { "destination": "0.0.0.0", "mask": "0.0.0.0", "gateway": "192.168.1.1", "interface": "eth0" } ]
        }
    ]
}"#;

const KNOWLEDGE_BASE: &str = r#"{
    "CVE-2014-6271": {
        "patches": [ { "link": "https://example.org/bash-4.3-patch-25", "description": "bash 4.3 patch 25" } ]
    }
}"#;

const PATCH_PARAMETERS: &str = r#"<operational_costs_parameters>
    <remediationCost>50</remediationCost>
    <workCost>20</workCost>
    <deploymentDuration>1</deploymentDuration>
</operational_costs_parameters>"#;

const FIREWALL_RULE_PARAMETERS: &str = r#"<operational_costs_parameters>
    <remediationCost>10</remediationCost>
</operational_costs_parameters>"#;

struct Fixture {
    system: InformationSystem,
    graph: AttackGraph,
    knowledge_base: InMemoryKnowledgeBase,
    costs: CostParameters,
    _folder: tempfile::TempDir,
    config: Config,
}

fn fixture() -> Fixture {
    let folder = tempfile::tempdir().unwrap();
    let cost_folder = folder.path().join("cost-parameters");
    std::fs::create_dir(&cost_folder).unwrap();
    std::fs::write(cost_folder.join("patch-parameters.xml"), PATCH_PARAMETERS).unwrap();
    std::fs::write(cost_folder.join("firewall-rule-parameters.xml"), FIREWALL_RULE_PARAMETERS).unwrap();

    let config = Config {
        remediations_history_path: folder.path().join("history.json"),
        cost_parameters_path: cost_folder,
        ..Config::default()
    };
    Fixture {
        system: InformationSystem::new(Topology::from_json_str(TOPOLOGY).unwrap()),
        graph: AttackGraph::from_xml_str(WEB_SERVER).unwrap(),
        knowledge_base: InMemoryKnowledgeBase::from_json_str(KNOWLEDGE_BASE).unwrap(),
        costs: CostParameters::load(&config.cost_parameters_path).unwrap(),
        _folder: folder,
        config,
    }
}

fn remediations(fixture: &mut Fixture) -> Vec<DeployableRemediation> {
    let path = fixture.graph.generate_attack_paths().remove(0);
    let context = RemediationContext::new(&fixture.knowledge_base, fixture.costs);
    deployable_remediations(&path, &mut fixture.system, &context).unwrap()
}

#[test]
fn cost_files_are_read_from_the_folder() {
    let fixture = fixture();
    // 50 + tests 1h * 20 + deployment 1h * 20
    assert_eq!(fixture.costs.patch.operational_cost(), 90.0);
    assert_eq!(fixture.costs.firewall_rule.operational_cost(), 10.0);
    // no file for Snort rules
    assert_eq!(fixture.costs.snort_rule.operational_cost(), 0.0);
}

#[test]
fn cheapest_remediations_come_first() {
    let mut fixture = fixture();
    let remediations = remediations(&mut fixture);

    // firewall rules on the router or the web server, then the patch
    assert_eq!(remediations.len(), 4);
    let costs: Vec<f64> = remediations.iter().map(|remediation| remediation.cost).collect();
    assert_eq!(costs, vec![10.0, 10.0, 10.0, 90.0]);

    let patch = &remediations[3].actions[0];
    assert_eq!(patch.action().action_type(), ActionType::ApplyPatch);
    assert_eq!(fixture.system.machine_name(patch.host()), "web");

    for remediation in &remediations[..3] {
        assert_eq!(remediation.actions[0].action().action_type(), ActionType::DeployFirewallRule);
        assert!(!remediation.simulate(&fixture.system).unwrap());
    }
}

#[test]
fn validated_remediation_raises_the_habit_index() {
    let mut fixture = fixture();
    let remediations = remediations(&mut fixture);
    let patch = &remediations[3];

    assert_eq!(patch.habit_index(&fixture.config, &mut fixture.system).unwrap(), 0.0);
    patch.validate(&fixture.config, &mut fixture.system).unwrap();
    patch.validate(&fixture.config, &mut fixture.system).unwrap();
    assert_eq!(patch.habit_index(&fixture.config, &mut fixture.system).unwrap(), 2.0);

    // a firewall rule was never validated
    assert_eq!(remediations[0].habit_index(&fixture.config, &mut fixture.system).unwrap(), 0.0);
}

#[test]
fn every_kind_of_remediation_protects_the_server() {
    let fixture = fixture();
    let facts = ReachabilityFacts::from_attack_graph(&fixture.graph);
    assert_eq!(reachability::compute_compromised_hosts(&facts), vec!["internet", "web"]);

    let candidates = [
        FactRemoval::Vulnerability(VulnerableHost::new("web", "CVE-2014-6271")),
        FactRemoval::Hacl(HaclEdge::new("internet", "web", "tcp", "80")),
    ];
    let (_, impacts) = reachability::evaluate_remediations(&facts, &candidates);
    assert_eq!(impacts.len(), 2);
    for impact in &impacts {
        assert_eq!(impact.compromised_hosts, vec!["internet"]);
    }
}

#[test]
fn alert_remediations_use_the_configured_mitigation_server() {
    let config = Config::from_toml_str("ddos_mitigation_server = \"10.9.9.9\"\n").unwrap();
    let alert = Alert {
        source: IpAddress::new("203.0.113.7").unwrap(),
        destination: IpAddress::new("192.168.1.2").unwrap(),
        cve: None,
    };
    let json: serde_json::Value = serde_json::from_str(&remediations_for_alert_json(&alert, &config).unwrap()).unwrap();
    let remediations = json.as_array().unwrap();
    assert_eq!(remediations.len(), 2);
    assert_eq!(remediations[0]["action"], "DROP");
    assert!(remediations[1]["iptables_rule"].as_str().unwrap().ends_with("10.9.9.9"));
}
