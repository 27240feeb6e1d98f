// Scoring of a two-step MulVAL attack graph: internet -> web -> db

use std::collections::BTreeSet;

use attack_graph_remediation::attack_graph::AttackGraph;
use attack_graph_remediation::information_system::InformationSystem;
use attack_graph_remediation::scoring::{self, ImpactMetric};
use attack_graph_remediation::topology::Topology;

const TWO_STEPS: &str = r#"<attack_graph>
    <arcs>
        <arc><src>1</src><dst>2</dst></arc>
        <arc><src>2</src><dst>3</dst></arc>
        <arc><src>2</src><dst>4</dst></arc>
        <arc><src>2</src><dst>5</dst></arc>
        <arc><src>4</src><dst>6</dst></arc>
        <arc><src>6</src><dst>7</dst></arc>
        <arc><src>6</src><dst>8</dst></arc>
        <arc><src>8</src><dst>9</dst></arc>
        <arc><src>9</src><dst>10</dst></arc>
        <arc><src>9</src><dst>11</dst></arc>
        <arc><src>9</src><dst>12</dst></arc>
        <arc><src>11</src><dst>13</dst></arc>
        <arc><src>13</src><dst>14</dst></arc>
        <arc><src>13</src><dst>15</dst></arc>
    </arcs>
    <vertices>
        <vertex><id>1</id><fact>execCode(db,root)</fact><metric>0</metric><type>OR</type></vertex>
        <vertex><id>2</id><fact>RULE 2 (remote exploit of a server program)</fact><metric>0</metric><type>AND</type></vertex>
        <vertex><id>3</id><fact>vulExists(db,'CVE-2016-6662',mysql,remoteExploit,privEscalation)</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>4</id><fact>netAccess(db,tcp,'3306')</fact><metric>0</metric><type>OR</type></vertex>
        <vertex><id>5</id><fact>networkServiceInfo(db,mysql,tcp,'3306',root)</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>6</id><fact>RULE 5 (multi-hop access)</fact><metric>0</metric><type>AND</type></vertex>
        <vertex><id>7</id><fact>hacl(web,db,tcp,'3306')</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>8</id><fact>execCode(web,root)</fact><metric>0</metric><type>OR</type></vertex>
        <vertex><id>9</id><fact>RULE 2 (remote exploit of a server program)</fact><metric>0</metric><type>AND</type></vertex>
        <vertex><id>10</id><fact>vulExists(web,'CVE-2014-6271',http,remoteExploit,privEscalation)</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>11</id><fact>netAccess(web,tcp,'80')</fact><metric>0</metric><type>OR</type></vertex>
        <vertex><id>12</id><fact>networkServiceInfo(web,http,tcp,'80',root)</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>13</id><fact>RULE 6 (direct network access)</fact><metric>0</metric><type>AND</type></vertex>
        <vertex><id>14</id><fact>hacl(internet,web,tcp,'80')</fact><metric>1</metric><type>LEAF</type></vertex>
        <vertex><id>15</id><fact>attackerLocated(internet)</fact><metric>1</metric><type>LEAF</type></vertex>
    </vertices>
</attack_graph>"#;

const TOPOLOGY: &str = r#"{
    "hosts": [
        { "name": "web", "interfaces": [ { "name": "eth0", "ip": "192.168.1.2", "vlan": "dmz" } ] },
        {
            "name": "db",
            "interfaces": [ { "name": "eth0", "ip": "192.168.2.2", "vlan": "lan" } ],
            "security_requirements": [
                { "name": "confidentiality", "metric": 90.0 },
                { "name": "availability", "metric": 10.0 }
            ]
        }
    ]
}"#;

fn graph() -> AttackGraph {
    AttackGraph::from_xml_str(TWO_STEPS).unwrap()
}

#[test]
fn every_goal_gets_an_attack_path() {
    let paths = graph().generate_attack_paths();
    assert_eq!(paths.len(), 2);

    let to_db = paths.iter().find(|path| path.goal() == Some(1)).unwrap();
    assert_eq!(to_db.graph.vertices.len(), 15);
    // two exploited vulnerabilities
    assert_eq!(to_db.scoring, 0.25);

    let to_web = paths.iter().find(|path| path.goal() == Some(8)).unwrap();
    assert_eq!(to_web.graph.vertices.len(), 8);
    assert_eq!(to_web.scoring, 0.5);
}

#[test]
fn scored_paths_are_written_and_read_back_sorted() {
    let folder = tempfile::tempdir().unwrap();
    let output = folder.path().join("attack-paths.xml");
    let mut graph = graph();

    let paths = graph.score_attack_graph_and_get_attack_paths(&output, 1.0).unwrap();
    assert!(graph.global_score > 0.0);
    assert_eq!(paths.len(), 2);
    assert!(paths.windows(2).all(|pair| pair[0].scoring >= pair[1].scoring));

    let goals: BTreeSet<i64> = paths.iter().filter_map(|path| path.goal()).collect();
    assert_eq!(goals, BTreeSet::from([1, 8]));

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains("<attack_paths>"));
    assert!(written.contains("<src>1.0</src>"));
}

#[test]
fn security_requirements_weigh_the_global_score() {
    let folder = tempfile::tempdir().unwrap();
    let output = folder.path().join("attack-paths.xml");

    let mut plain = graph();
    plain.score_attack_graph_and_get_attack_paths(&output, 1.0).unwrap();

    let mut system = InformationSystem::new(Topology::from_json_str(TOPOLOGY).unwrap());
    let mut weighted = graph();
    weighted.load_metrics_from_topology(&mut system).unwrap();
    assert_eq!(weighted.vertex(1).unwrap().impact_metrics, vec![ImpactMetric::new(100.0, 1.0)]);
    assert_eq!(weighted.vertex(8).unwrap().impact_metrics, vec![ImpactMetric::new(0.0, 1.0)]);

    weighted.score_attack_graph_and_get_attack_paths(&output, 1.0).unwrap();
    assert!((weighted.global_score - plain.global_score - 100.0).abs() < 1e-9);
}

#[test]
fn global_score_is_normalized_by_the_previous_maximum() {
    let folder = tempfile::tempdir().unwrap();
    let output = folder.path().join("attack-paths.xml");
    let tables = graph().to_scoring_input();

    let raw = scoring::score_attack_graph(&tables.vertices, &tables.arcs, &tables.impact_metrics, &output, 1.0).unwrap();
    let halved = scoring::score_attack_graph(&tables.vertices, &tables.arcs, &tables.impact_metrics, &output, 2.0).unwrap();
    assert!((raw / 2.0 - halved).abs() < 1e-9);
}

#[test]
fn unreachable_goal_has_no_path() {
    let mut graph = graph();
    // without the attacker location nothing can be exploited
    graph.delete_vertex(15);
    assert!(graph.vertex(1).is_none());
    assert!(graph.generate_attack_paths().is_empty());
}

#[test]
fn impacted_requirements_follow_the_exec_code_vertices() {
    let system = InformationSystem::new(Topology::from_json_str(TOPOLOGY).unwrap());
    let requirements = graph().impacted_security_requirements(&system);
    let names: Vec<&str> = requirements.iter().map(|requirement| requirement.name.as_str()).collect();
    assert_eq!(names, vec!["confidentiality", "availability"]);
}
