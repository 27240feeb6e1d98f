// Simple demonstration of the whole pipeline on a three-host network
// Run with: cargo run --example simple_demo
//
//   internet -- router -- web -- db

use std::time::Instant;

use attack_graph_remediation::attack_graph::AttackGraph;
use attack_graph_remediation::information_system::InformationSystem;
use attack_graph_remediation::reachability::{self, FactRemoval, ReachabilityFacts, VulnerableHost};
use attack_graph_remediation::topology::{Protocol, Topology};
use attack_graph_remediation::{AttackGraphError, Result};

const TOPOLOGY: &str = r#"{
    "vlans": [
        { "label": "dmz", "network": "192.168.1.0/24" },
        { "label": "lan", "network": "192.168.2.0/24" }
    ],
    "hosts": [
        {
            "name": "router",
            "interfaces": [
                { "name": "eth0", "ip": "10.0.0.1", "connected_to_the_internet": true },
                { "name": "eth1", "ip": "192.168.1.254", "vlan": "dmz" },
                { "name": "eth2", "ip": "192.168.2.254", "vlan": "lan" }
            ],
            "input_firewall": {
                "rules": [ { "action": "DROP", "protocol": "TCP", "destination": "192.168.2.0/24", "destination_port": "22" } ]
            }
        },
        {
            "name": "web",
            "interfaces": [ { "name": "eth0", "ip": "192.168.1.2", "vlan": "dmz" } ],
            "routes": [ { "destination": "0.0.0.0", "mask": "0.0.0.0", "gateway": "192.168.1.254", "interface": "eth0" } ],
            "services": [
                { "name": "http", "port": 80, "vulnerabilities": { "CVE-2014-6271": { "cve": "CVE-2014-6271" } } }
            ]
        },
        {
            "name": "db",
            "interfaces": [ { "name": "eth0", "ip": "192.168.2.2", "vlan": "lan" } ],
            "routes": [ { "destination": "0.0.0.0", "mask": "0.0.0.0", "gateway": "192.168.2.254", "interface": "eth0" } ],
            "services": [
                { "name": "mysql", "port": 3306, "vulnerabilities": { "CVE-2016-6662": { "cve": "CVE-2016-6662" } } }
            ],
            "security_requirements": [ { "name": "confidentiality", "metric": 90.0 } ]
        }
    ]
}"#;

// What MulVAL derives from the facts above
const ATTACK_GRAPH: &str = r#"<attack_graph>
    <arcs>
        <arc><src>1</src><dst>2</dst></arc>
        <arc><src>2</src><dst>3</dst></arc>
        <arc><src>2</src><dst>4</dst></arc>
        <arc><src>4</src><dst>5</dst></arc>
        <arc><src>5</src><dst>6</dst></arc>
        <arc><src>5</src><dst>7</dst></arc>
        <arc><src>7</src><dst>8</dst></arc>
        <arc><src>8</src><dst>9</dst></arc>
        <arc><src>8</src><dst>10</dst></arc>
        <arc><src>10</src><dst>11</dst></arc>
        <arc><src>11</src><dst>12</dst></arc>
        <arc><src>11</src><dst>13</dst></arc>
    </arcs>
    <vertices>
        <vertex><id>1</id><fact>execCode(db,root)</fact><metric>0</metric><type>OR</type></vertex>
        <vertex><id>2</id><fact>RULE 2 (remote exploit of a server program)</fact><metric>0</metric><type>AND</type></vertex>
        <vertex><id>3</id><fact>vulExists(db,'CVE-2016-6662',mysql,remoteExploit,privEscalation)</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>4</id><fact>netAccess(db,tcp,'3306')</fact><metric>0</metric><type>OR</type></vertex>
        <vertex><id>5</id><fact>RULE 5 (multi-hop access)</fact><metric>0</metric><type>AND</type></vertex>
        <vertex><id>6</id><fact>hacl(web,db,tcp,'3306')</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>7</id><fact>execCode(web,root)</fact><metric>0</metric><type>OR</type></vertex>
        <vertex><id>8</id><fact>RULE 2 (remote exploit of a server program)</fact><metric>0</metric><type>AND</type></vertex>
        <vertex><id>9</id><fact>vulExists(web,'CVE-2014-6271',http,remoteExploit,privEscalation)</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>10</id><fact>netAccess(web,tcp,'80')</fact><metric>0</metric><type>OR</type></vertex>
        <vertex><id>11</id><fact>RULE 6 (direct network access)</fact><metric>0</metric><type>AND</type></vertex>
        <vertex><id>12</id><fact>hacl(internet,web,tcp,'80')</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>13</id><fact>attackerLocated(internet)</fact><metric>1</metric><type>LEAF</type></vertex>
    </vertices>
</attack_graph>"#;

fn main() {
    println!("Simple Attack Graph Demo");
    println!("========================\n");

    if let Err(error) = run() {
        eprintln!("Demo failed: {}", error);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut system = InformationSystem::new(Topology::from_json_str(TOPOLOGY)?);

    // ----------------------------------------------------------------
    // Step 1: Simulate the network
    // ----------------------------------------------------------------
    println!("Step 1: Routing");
    println!("---------------");
    let web = system.get_host_by_name_or_ip_address("web")?;
    let db = system.get_host_by_name_or_ip_address("db")?;
    let route: Vec<&str> = system
        .route_between_hosts(web, db)?
        .into_iter()
        .map(|host| system.machine_name(host))
        .collect();
    println!("  web -> db: {}", route.join(" -> "));

    let db_address = system
        .machine(db)
        .and_then(|machine| machine.first_ip_address())
        .ok_or(AttackGraphError::NoInterface)?;
    for port in [3306, 22] {
        let allowed = system.topology.send_a_packet_to_succeed(web, db_address, port, Protocol::Tcp)?;
        println!("  web -> db:{} {}", port, if allowed { "allowed" } else { "dropped" });
    }
    println!();

    // ----------------------------------------------------------------
    // Step 2: MulVAL input
    // ----------------------------------------------------------------
    println!("Step 2: MulVAL facts");
    println!("--------------------");
    for line in system.export_to_mulval_datalog()?.lines().filter(|line| !line.is_empty()) {
        println!("  {}", line);
    }
    println!();

    // ----------------------------------------------------------------
    // Step 3: Attack paths of the MulVAL attack graph
    // ----------------------------------------------------------------
    println!("Step 3: Attack paths");
    println!("--------------------");
    let mut attack_graph = AttackGraph::from_xml_str(ATTACK_GRAPH)?;
    attack_graph.load_metrics_from_topology(&mut system)?;
    for path in attack_graph.generate_attack_paths() {
        let goal = path.goal().and_then(|id| attack_graph.vertex(id)).map(|vertex| vertex.fact.to_string());
        println!("  {} (scoring {:.3})", goal.unwrap_or_default(), path.scoring);
    }
    println!();

    // ----------------------------------------------------------------
    // Step 4: Incremental effect of a patch
    // ----------------------------------------------------------------
    println!("Step 4: Patching the web server");
    println!("-------------------------------");
    let facts = ReachabilityFacts::from_attack_graph(&attack_graph);
    let start = Instant::now();
    let report = reachability::compute_with_remediation(
        &facts,
        &[FactRemoval::Vulnerability(VulnerableHost::new("web", "CVE-2014-6271"))],
    );
    println!("  Compromised before: {:?}", report.compromised_before);
    println!("  Compromised after:  {:?}", report.compromised_after);
    println!("  Protected hosts:    {:?}", report.protected_hosts());
    println!(
        "  Initial {:?}, incremental {:?} ({:.1}x), total {:?}",
        report.initial_computation_time,
        report.incremental_update_time,
        report.speedup_factor(),
        start.elapsed()
    );
    println!();

    println!("Demo complete.");
    Ok(())
}
