//! Rule dialect parsers.
//!
//! Every dialect is translated into Surge rule-set lines and handed to the
//! Surge line parser. The first parser whose test accepts the document is
//! used for the whole document.

use serde::Deserialize;

use super::Rule;
use crate::RuleType;

/// Parser for one rule dialect.
pub trait RuleParser {
    /// Display name used in log lines.
    fn name(&self) -> &str;

    /// Whether this parser handles `raw`.
    fn test(&self, raw: &str) -> bool;

    /// Parse the whole document. Malformed lines are skipped.
    fn parse(&self, raw: &str) -> Vec<Rule>;
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with(';') || line.starts_with("//")
}

/// First line that is neither blank nor a comment.
fn first_content_line(raw: &str) -> Option<&str> {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !is_comment(line))
}

fn is_yaml_payload(raw: &str) -> bool {
    first_content_line(raw).is_some_and(|line| line.starts_with("payload:"))
}

/// Leading comma-separated token of a line.
fn leading_token(line: &str) -> &str {
    line.split(',').next().unwrap_or_default().trim()
}

/// Surge rule-set lines: `TYPE,content[,options...]`.
pub struct SurgeRuleSet;

impl SurgeRuleSet {
    /// Parse one line; `None` for lines to skip.
    fn parse_line(line: &str) -> Option<Rule> {
        let line = line.trim();
        if line.is_empty() || is_comment(line) {
            return None;
        }
        if !RuleType::ALL.iter().any(|t| line.starts_with(t.as_str())) {
            return None;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let Some(rule_type) = RuleType::parse(fields[0]) else {
            log::warn!("Failed to parse line: {}\n Reason: unknown rule type", line);
            return None;
        };
        let content = match fields.get(1) {
            Some(content) if !content.is_empty() => content.to_string(),
            _ => {
                log::warn!("Failed to parse line: {}\n Reason: missing content", line);
                return None;
            }
        };

        let mut rule = Rule::new(rule_type, content);
        if rule_type.is_cidr() {
            rule.options = fields[2..].iter().map(|s| s.to_string()).collect();
        }
        Some(rule)
    }
}

impl RuleParser for SurgeRuleSet {
    fn name(&self) -> &str {
        "Surge Rule Set Parser"
    }

    fn test(&self, raw: &str) -> bool {
        if is_yaml_payload(raw) || QxFilter::has_qx_line(raw) {
            return false;
        }
        RuleType::ALL.iter().any(|t| raw.contains(t.as_str()))
    }

    fn parse(&self, raw: &str) -> Vec<Rule> {
        raw.lines().filter_map(Self::parse_line).collect()
    }
}

/// Quantumult X filter lines: `host-suffix,example.com,proxy`.
pub struct QxFilter;

impl QxFilter {
    /// QX type tokens and their Surge names.
    const TYPES: [(&'static str, RuleType); 6] = [
        ("host", RuleType::Domain),
        ("host-suffix", RuleType::DomainSuffix),
        ("host-keyword", RuleType::DomainKeyword),
        ("ip-cidr", RuleType::IpCidr),
        ("ip6-cidr", RuleType::IpCidr6),
        ("user-agent", RuleType::UserAgent),
    ];

    /// Tokens that only exist in the QX dialect.
    const EXCLUSIVE: [&'static str; 4] = ["host", "host-suffix", "host-keyword", "ip6-cidr"];

    fn translate(token: &str) -> Option<RuleType> {
        Self::TYPES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, t)| *t)
    }

    fn has_qx_line(raw: &str) -> bool {
        raw.lines().any(|line| {
            let token = leading_token(line);
            Self::EXCLUSIVE.iter().any(|t| t.eq_ignore_ascii_case(token))
        })
    }

    /// Rewrite the leading token of a line into its Surge name.
    fn to_surge_line(line: &str) -> String {
        let line = line.trim();
        let token = leading_token(line);
        match Self::translate(token) {
            Some(rule_type) => {
                let rest = line.split_once(',').map(|(_, rest)| rest).unwrap_or_default();
                format!("{},{}", rule_type.as_str(), rest)
            }
            None => line.to_string(),
        }
    }
}

impl RuleParser for QxFilter {
    fn name(&self) -> &str {
        "QX Filter"
    }

    fn test(&self, raw: &str) -> bool {
        raw.lines()
            .any(|line| Self::translate(leading_token(line)).is_some() && line.contains(','))
    }

    fn parse(&self, raw: &str) -> Vec<Rule> {
        raw.lines()
            .map(Self::to_surge_line)
            .filter_map(|line| SurgeRuleSet::parse_line(&line))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ProviderPayload {
    #[serde(default)]
    payload: Vec<String>,
}

/// Clash rule provider: a YAML document with a `payload` list.
pub struct ClashRuleProvider;

impl ClashRuleProvider {
    /// Clash type names that differ from Surge.
    const RENAMES: [(&'static str, RuleType); 3] = [
        ("DST-PORT", RuleType::DestPort),
        ("SRC-IP-CIDR", RuleType::SrcIp),
        ("SRC-PORT", RuleType::InPort),
    ];

    fn to_surge_line(line: &str) -> String {
        let line = line.trim();
        let token = leading_token(line);
        match Self::RENAMES.iter().find(|(name, _)| *name == token) {
            Some((_, rule_type)) => {
                let rest = line.split_once(',').map(|(_, rest)| rest).unwrap_or_default();
                format!("{},{}", rule_type.as_str(), rest)
            }
            None => line.to_string(),
        }
    }
}

impl RuleParser for ClashRuleProvider {
    fn name(&self) -> &str {
        "Clash Rule Provider"
    }

    fn test(&self, raw: &str) -> bool {
        is_yaml_payload(raw)
    }

    fn parse(&self, raw: &str) -> Vec<Rule> {
        let document: ProviderPayload = match serde_yaml::from_str(raw) {
            Ok(document) => document,
            Err(e) => {
                log::error!("Cannot parse rules: {}", e);
                return Vec::new();
            }
        };
        document
            .payload
            .iter()
            .map(|line| Self::to_surge_line(line))
            .filter_map(|line| SurgeRuleSet::parse_line(&line))
            .collect()
    }
}

/// Parse `raw` with the first built-in dialect that accepts it.
pub fn parse(raw: &str) -> Vec<Rule> {
    let parsers: [&dyn RuleParser; 3] = [&SurgeRuleSet, &QxFilter, &ClashRuleProvider];
    parse_with(raw, &parsers)
}

/// Parse `raw` with the first of `parsers` that accepts it.
pub fn parse_with(raw: &str, parsers: &[&dyn RuleParser]) -> Vec<Rule> {
    match parsers.iter().find(|p| p.test(raw)) {
        Some(parser) => {
            log::info!("Rule parser [{}] is activated", parser.name());
            parser.parse(raw)
        }
        None => {
            log::warn!("No rule parser accepts the input");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surge_rule_set() {
        let raw = "DOMAIN-SUFFIX,example.com\nIP-CIDR,10.0.0.0/8,no-resolve\n# comment\nDOMAIN-SUFFIX,example.com";
        assert!(SurgeRuleSet.test(raw));
        let rules = parse(raw);
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0], Rule::new(RuleType::DomainSuffix, "example.com"));
        assert_eq!(rules[1].rule_type, RuleType::IpCidr);
        assert_eq!(rules[1].options, vec!["no-resolve"]);
    }

    #[test]
    fn test_surge_skips_noise() {
        let raw = "\n; note\n// note\nDOMAIN-SET,https://x\nDOMAIN,\nUSER-AGENT,Foo*\nGEOIP,CN\nDOMAIN,a.com,Proxy";
        let rules = parse(raw);
        assert_eq!(
            rules,
            vec![
                Rule::new(RuleType::UserAgent, "Foo*"),
                Rule::new(RuleType::Domain, "a.com"),
            ]
        );
    }

    #[test]
    fn test_qx_filter() {
        let raw = "HOST-SUFFIX,google.com,proxy\nhost,hostname.example,direct\nip6-cidr,2001:db8::/32,proxy\nIP-CIDR,1.0.0.0/8,proxy";
        assert!(!SurgeRuleSet.test(raw));
        assert!(QxFilter.test(raw));

        let rules = parse(raw);
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0], Rule::new(RuleType::DomainSuffix, "google.com"));
        // Only the leading token is rewritten.
        assert_eq!(rules[1], Rule::new(RuleType::Domain, "hostname.example"));
        assert_eq!(rules[2].rule_type, RuleType::IpCidr6);
        assert_eq!(rules[2].options, vec!["proxy"]);
        assert_eq!(rules[3].rule_type, RuleType::IpCidr);
    }

    #[test]
    fn test_clash_provider() {
        let raw = "# provider\npayload:\n  - DOMAIN-SUFFIX,example.com\n  - DST-PORT,443\n  - SRC-IP-CIDR,192.168.0.0/16\n  - SRC-PORT,7890\n  - IP-CIDR,10.0.0.0/8,no-resolve\n  - PROCESS-NAME,curl\n";
        assert!(!SurgeRuleSet.test(raw));
        assert!(ClashRuleProvider.test(raw));

        let rules = parse(raw);
        let types: Vec<RuleType> = rules.iter().map(|r| r.rule_type).collect();
        assert_eq!(
            types,
            vec![
                RuleType::DomainSuffix,
                RuleType::DestPort,
                RuleType::SrcIp,
                RuleType::InPort,
                RuleType::IpCidr,
                RuleType::ProcessName,
            ]
        );
        assert_eq!(rules[1].content, "443");
        assert_eq!(rules[4].options, vec!["no-resolve"]);
    }

    #[test]
    fn test_no_dialect() {
        assert!(parse("just some text").is_empty());
        assert!(parse("payload: [unclosed").is_empty());
    }
}
