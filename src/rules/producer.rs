//! Rule producers for each target platform.

use serde::Serialize;

use super::Rule;
use crate::producer::{self, Producer, ProducerMode};
use crate::{Platform, Result, RuleType};

/// `TYPE,content[,first option]` with the given type name.
fn render(type_name: &str, rule: &Rule) -> String {
    let mut line = format!("{},{}", type_name, rule.content);
    if rule.rule_type.is_cidr() {
        if let Some(option) = rule.options.first() {
            line.push(',');
            line.push_str(option);
        }
    }
    line
}

/// Quantumult X filter lines.
pub struct QxFilterProducer;

impl Producer<Rule> for QxFilterProducer {
    fn platform(&self) -> Platform {
        Platform::Qx
    }

    fn produce_one(&self, rule: &Rule) -> Result<Option<String>> {
        let type_name = match rule.rule_type {
            RuleType::Domain => "HOST",
            RuleType::DomainSuffix => "HOST-SUFFIX",
            RuleType::DomainKeyword => "HOST-KEYWORD",
            RuleType::IpCidr6 => "IP6-CIDR",
            RuleType::IpCidr | RuleType::UserAgent => rule.rule_type.as_str(),
            RuleType::UrlRegex
            | RuleType::DestPort
            | RuleType::SrcIp
            | RuleType::InPort
            | RuleType::Protocol
            | RuleType::ProcessName => return Ok(None),
        };
        Ok(Some(render(type_name, rule)))
    }
}

/// Surge rule-set lines.
pub struct SurgeRuleSetProducer;

impl Producer<Rule> for SurgeRuleSetProducer {
    fn platform(&self) -> Platform {
        Platform::Surge
    }

    fn produce_one(&self, rule: &Rule) -> Result<Option<String>> {
        Ok(Some(render(rule.rule_type.as_str(), rule)))
    }
}

/// Loon rule lines.
pub struct LoonRulesProducer;

impl Producer<Rule> for LoonRulesProducer {
    fn platform(&self) -> Platform {
        Platform::Loon
    }

    fn produce_one(&self, rule: &Rule) -> Result<Option<String>> {
        match rule.rule_type {
            RuleType::DestPort
            | RuleType::SrcIp
            | RuleType::InPort
            | RuleType::Protocol
            | RuleType::ProcessName => Ok(None),
            other => Ok(Some(render(other.as_str(), rule))),
        }
    }
}

#[derive(Serialize)]
struct ProviderPayload {
    payload: Vec<String>,
}

/// Clash rule provider document.
pub struct ClashRuleProviderProducer;

impl ClashRuleProviderProducer {
    fn type_name(rule_type: RuleType) -> &'static str {
        match rule_type {
            RuleType::DestPort => "DST-PORT",
            RuleType::SrcIp => "SRC-IP-CIDR",
            RuleType::InPort => "SRC-PORT",
            other => other.as_str(),
        }
    }
}

impl Producer<Rule> for ClashRuleProviderProducer {
    fn platform(&self) -> Platform {
        Platform::Clash
    }

    fn mode(&self) -> ProducerMode {
        ProducerMode::All
    }

    fn produce_all(&self, rules: &[Rule]) -> Result<String> {
        let document = ProviderPayload {
            payload: rules
                .iter()
                .map(|rule| render(Self::type_name(rule.rule_type), rule))
                .collect(),
        };
        Ok(serde_yaml::to_string(&document)?)
    }
}

/// Producer registered for `platform`.
pub fn producer_for(platform: Platform) -> &'static dyn Producer<Rule> {
    match platform {
        Platform::Qx => &QxFilterProducer,
        Platform::Surge => &SurgeRuleSetProducer,
        Platform::Loon => &LoonRulesProducer,
        Platform::Clash => &ClashRuleProviderProducer,
    }
}

/// Render `rules` for the named target platform.
pub fn produce(rules: &[Rule], target: &str) -> Result<String> {
    let platform: Platform = target.parse()?;
    producer::produce(producer_for(platform), rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn sample() -> Vec<Rule> {
        vec![
            Rule::new(RuleType::Domain, "a.com"),
            Rule::new(RuleType::IpCidr6, "2001:db8::/32")
                .with_options(vec!["no-resolve".to_string(), "extra".to_string()]),
            Rule::new(RuleType::DestPort, "443"),
            Rule::new(RuleType::UrlRegex, "^https?://ad\\."),
            Rule::new(RuleType::ProcessName, "curl"),
        ]
    }

    #[test]
    fn test_qx_output() {
        assert_eq!(
            produce(&sample(), "QX").unwrap(),
            "HOST,a.com\nIP6-CIDR,2001:db8::/32,no-resolve"
        );
    }

    #[test]
    fn test_surge_output() {
        assert_eq!(
            produce(&sample(), "surge").unwrap(),
            "DOMAIN,a.com\nIP-CIDR6,2001:db8::/32,no-resolve\nDEST-PORT,443\nURL-REGEX,^https?://ad\\.\nPROCESS-NAME,curl"
        );
    }

    #[test]
    fn test_loon_output() {
        assert_eq!(
            produce(&sample(), "Loon").unwrap(),
            "DOMAIN,a.com\nIP-CIDR6,2001:db8::/32,no-resolve\nURL-REGEX,^https?://ad\\."
        );
    }

    #[test]
    fn test_clash_output_round_trips() {
        let output = produce(&sample(), "Clash").unwrap();
        assert!(output.starts_with("payload:"));

        let document: serde_yaml::Value = serde_yaml::from_str(&output).unwrap();
        let payload: Vec<&str> = document["payload"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(payload[2], "DST-PORT,443");

        let reparsed = crate::rules::parse(&output);
        assert_eq!(reparsed, {
            let mut expected = sample();
            expected[1].options.truncate(1);
            expected
        });
    }

    #[test]
    fn test_unknown_target() {
        assert!(matches!(produce(&sample(), "Stash"), Err(Error::UnsupportedPlatform(_))));
    }
}
