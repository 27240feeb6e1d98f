// Facts attached to attack graph vertices
// A fact string is either a MulVAL rule "RULE n (text)" or a datalog command "name(p1,p2,...)"

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AttackGraphError, Result};
use crate::information_system::InformationSystem;
use crate::topology::HostId;

static RULE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^RULE (\d+) \((.*)\)$").expect("Invalid rule regex"));

static DATALOG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z\\=]+)\((.*)\)$").expect("Invalid datalog command regex"));

/// Names MulVAL uses for the attacker's location on the internet.
/// `internet_host` is the attacker host of the exported facts.
const INTERNET_NAMES: [&str; 3] = ["internet", "1.1.1.1", "internet_host"];

/// Whether a fact parameter designates the internet rather than a host
pub fn names_the_internet(name: &str) -> bool {
    INTERNET_NAMES.contains(&name)
}

/// A MulVAL derivation rule, e.g. `RULE 4 (Trojan horse installation)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Rule {
    pub number: u32,
    pub text: String,
}

impl Rule {
    /// Parse a rule; a string that is not a rule gives number 0 and an empty text
    pub fn new(fact: &str) -> Self {
        match RULE_PATTERN.captures(fact) {
            Some(captures) => Self {
                number: captures[1].parse().unwrap_or(0),
                text: captures[2].to_string(),
            },
            None => Self::default(),
        }
    }

    pub fn is_a_rule(fact: &str) -> bool {
        RULE_PATTERN.is_match(fact)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rule [number={}, ruleText={}]", self.number, self.text)
    }
}

/// A datalog predicate with its parameters, quotes removed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatalogCommand {
    pub command: String,
    pub params: Vec<String>,
}

fn strip_quotes(param: &str) -> String {
    let quoted = param.len() >= 2
        && ((param.starts_with('\'') && param.ends_with('\'')) || (param.starts_with('"') && param.ends_with('"')));
    if quoted {
        param[1..param.len() - 1].to_string()
    } else {
        param.to_string()
    }
}

impl DatalogCommand {
    /// Parse `name(p1,p2,...)`.
    ///
    /// Parameters are split on every comma, including commas inside quotes,
    /// and trailing empty parameters are dropped.
    pub fn parse(fact: &str) -> Option<Self> {
        let captures = DATALOG_PATTERN.captures(fact)?;
        let arguments = &captures[2];
        let mut params: Vec<String> = arguments.split(',').map(strip_quotes).collect();
        if !arguments.is_empty() {
            while params.last().map(String::is_empty).unwrap_or(false) {
                params.pop();
            }
        }
        Some(Self { command: captures[1].to_string(), params })
    }

    pub fn is_a_datalog_fact(fact: &str) -> bool {
        DATALOG_PATTERN.is_match(fact)
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    fn required_param(&self, index: usize) -> Result<&str> {
        self.param(index).ok_or_else(|| {
            AttackGraphError::Format(format!("{} has no parameter {}", self.command, index))
        })
    }

    /// Routes the flow of a `hacl(from, to, protocol, port)` fact takes in the
    /// information system. Unknown hosts are created on the way.
    pub fn get_routes_between_hosts_of_hacl(
        &self,
        information_system: &mut InformationSystem,
    ) -> Result<Vec<Vec<HostId>>> {
        if self.command != "hacl" {
            return Err(AttackGraphError::NotAHacl);
        }
        let from = self.required_param(0)?;
        let to = self.required_param(1)?;

        if names_the_internet(from) {
            let destination = information_system.get_host_by_name_or_ip_address(to)?;
            information_system.routes_from_internet_to(destination)
        } else if names_the_internet(to) {
            let source = information_system.get_host_by_name_or_ip_address(from)?;
            Ok(vec![information_system.route_to_internet_from(source)])
        } else {
            let source = information_system.get_host_by_name_or_ip_address(from)?;
            let destination = information_system.get_host_by_name_or_ip_address(to)?;
            Ok(vec![information_system.route_between_hosts(source, destination)?])
        }
    }
}

impl fmt::Display for DatalogCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatalogFact [command={}, params=[{}]]", self.command, self.params.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FactKind {
    Rule(Rule),
    DatalogCommand(DatalogCommand),
    /// Neither a rule nor a datalog command
    Unparsed,
}

/// The raw fact string of a vertex and its parsed form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fact {
    pub fact_string: String,
    pub kind: FactKind,
}

impl Fact {
    pub fn new(fact: &str) -> Self {
        let kind = if Rule::is_a_rule(fact) {
            FactKind::Rule(Rule::new(fact))
        } else if let Some(command) = DatalogCommand::parse(fact) {
            FactKind::DatalogCommand(command)
        } else {
            FactKind::Unparsed
        };
        Self { fact_string: fact.to_string(), kind }
    }

    pub fn datalog_command(&self) -> Option<&DatalogCommand> {
        match &self.kind {
            FactKind::DatalogCommand(command) => Some(command),
            _ => None,
        }
    }

    pub fn rule(&self) -> Option<&Rule> {
        match &self.kind {
            FactKind::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    /// Name of the datalog predicate, if the fact is one
    pub fn command(&self) -> Option<&str> {
        self.datalog_command().map(|command| command.command.as_str())
    }

    pub fn is_command(&self, name: &str) -> bool {
        self.command() == Some(name)
    }

    pub fn rule_text(&self) -> Option<&str> {
        self.rule().map(|rule| rule.text.as_str())
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fact_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hacl_command_parameters() {
        let command = DatalogCommand::parse("hacl(hostA,hostB,tcp,80)").unwrap();
        assert_eq!(command.command, "hacl");
        assert_eq!(command.params, vec!["hostA", "hostB", "tcp", "80"]);

        let quoted = DatalogCommand::parse("vulExists('web','CVE-2014-6271',\"bash\")").unwrap();
        assert_eq!(quoted.params, vec!["web", "CVE-2014-6271", "bash"]);
    }

    #[test]
    fn commas_inside_quotes_split_the_parameter() {
        let command = DatalogCommand::parse("f('a,b')").unwrap();
        assert_eq!(command.params, vec!["'a", "b'"]);
    }

    #[test]
    fn rule_parsing() {
        let rule = Rule::new("RULE 12 (foo AND bar)");
        assert_eq!(rule.number, 12);
        assert_eq!(rule.text, "foo AND bar");

        let not_a_rule = Rule::new("execCode(web,root)");
        assert_eq!(not_a_rule.number, 0);
        assert_eq!(not_a_rule.text, "");
    }

    #[test]
    fn internet_names() {
        assert!(names_the_internet("internet"));
        assert!(names_the_internet("1.1.1.1"));
        // attackerLocated(internet_host) comes back in the attack graph
        assert!(names_the_internet("internet_host"));
        assert!(!names_the_internet("Internet"));
        assert!(!names_the_internet("web"));
    }

    #[test]
    fn fact_classification() {
        assert!(matches!(Fact::new("RULE 2 (remote exploit of a server program)").kind, FactKind::Rule(_)));
        assert!(Fact::new("netAccess('web','tcp','80')").is_command("netAccess"));
        assert_eq!(Fact::new("not a fact").kind, FactKind::Unparsed);
        assert_eq!(Fact::new("").kind, FactKind::Unparsed);
    }
}
