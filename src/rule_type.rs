//! Rule type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// RuleType represents the kind of a routing rule.
///
/// The canonical names follow the Surge rule-set vocabulary; other dialects
/// are translated to these on parse and back on production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleType {
    /// Exact domain match
    #[serde(rename = "DOMAIN")]
    Domain,
    /// Domain suffix match
    #[serde(rename = "DOMAIN-SUFFIX")]
    DomainSuffix,
    /// Domain keyword match
    #[serde(rename = "DOMAIN-KEYWORD")]
    DomainKeyword,
    /// IPv4 CIDR range
    #[serde(rename = "IP-CIDR")]
    IpCidr,
    /// IPv6 CIDR range
    #[serde(rename = "IP-CIDR6")]
    IpCidr6,
    /// HTTP user agent
    #[serde(rename = "USER-AGENT")]
    UserAgent,
    /// HTTP URL regex
    #[serde(rename = "URL-REGEX")]
    UrlRegex,
    /// Destination port
    #[serde(rename = "DEST-PORT")]
    DestPort,
    /// Source IP
    #[serde(rename = "SRC-IP")]
    SrcIp,
    /// Inbound port
    #[serde(rename = "IN-PORT")]
    InPort,
    /// Transport protocol
    #[serde(rename = "PROTOCOL")]
    Protocol,
    /// Local process name
    #[serde(rename = "PROCESS-NAME")]
    ProcessName,
}

impl RuleType {
    /// All rule types, in the order the line parser tries them.
    pub const ALL: [RuleType; 12] = [
        RuleType::Domain,
        RuleType::DomainSuffix,
        RuleType::DomainKeyword,
        RuleType::IpCidr,
        RuleType::IpCidr6,
        RuleType::UserAgent,
        RuleType::UrlRegex,
        RuleType::DestPort,
        RuleType::SrcIp,
        RuleType::InPort,
        RuleType::Protocol,
        RuleType::ProcessName,
    ];

    /// Parse a rule type from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_uppercase();
        Self::ALL.into_iter().find(|t| t.as_str() == upper)
    }

    /// Get the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Domain => "DOMAIN",
            RuleType::DomainSuffix => "DOMAIN-SUFFIX",
            RuleType::DomainKeyword => "DOMAIN-KEYWORD",
            RuleType::IpCidr => "IP-CIDR",
            RuleType::IpCidr6 => "IP-CIDR6",
            RuleType::UserAgent => "USER-AGENT",
            RuleType::UrlRegex => "URL-REGEX",
            RuleType::DestPort => "DEST-PORT",
            RuleType::SrcIp => "SRC-IP",
            RuleType::InPort => "IN-PORT",
            RuleType::Protocol => "PROTOCOL",
            RuleType::ProcessName => "PROCESS-NAME",
        }
    }

    /// Whether this is an address-range kind that carries options.
    pub fn is_cidr(&self) -> bool {
        matches!(self, RuleType::IpCidr | RuleType::IpCidr6)
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_type_from_str() {
        assert_eq!(RuleType::parse("DOMAIN"), Some(RuleType::Domain));
        assert_eq!(RuleType::parse("domain-suffix"), Some(RuleType::DomainSuffix));
        assert_eq!(RuleType::parse("IP-CIDR6"), Some(RuleType::IpCidr6));
        assert_eq!(RuleType::parse("PROCESS-NAME"), Some(RuleType::ProcessName));
        assert_eq!(RuleType::parse("GEOIP"), None);
    }

    #[test]
    fn test_cidr_kinds() {
        assert!(RuleType::IpCidr.is_cidr());
        assert!(RuleType::IpCidr6.is_cidr());
        assert!(!RuleType::DomainSuffix.is_cidr());
    }

    #[test]
    fn test_every_name_parses_back() {
        for rule_type in RuleType::ALL {
            assert_eq!(RuleType::parse(rule_type.as_str()), Some(rule_type));
        }
    }
}
