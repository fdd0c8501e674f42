//! Built-in proxy filters and operators.

use std::cmp::Ordering;

use rand::seq::SliceRandom;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::Value;

use super::flag::{get_flag, remove_flag, CHINA, TAIWAN};
use super::Proxy;
use crate::pipeline::script::{ScriptFilter, ScriptOperator, StageScript};
use crate::pipeline::{parse_args, Filter, Operator, Stage, StageCatalog, StageKind};
use crate::{Error, Result};

/// Registry of proxy stages, keyed by their configured names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyStage {
    KeywordFilter,
    UselessFilter,
    RegionFilter,
    RegexFilter,
    TypeFilter,
    ScriptFilter,
    SetPropertyOperator,
    FlagOperator,
    SortOperator,
    KeywordSortOperator,
    KeywordRenameOperator,
    KeywordDeleteOperator,
    RegexRenameOperator,
    RegexDeleteOperator,
    ScriptOperator,
}

impl ProxyStage {
    /// All registered stages.
    pub const ALL: [ProxyStage; 15] = [
        ProxyStage::KeywordFilter,
        ProxyStage::UselessFilter,
        ProxyStage::RegionFilter,
        ProxyStage::RegexFilter,
        ProxyStage::TypeFilter,
        ProxyStage::ScriptFilter,
        ProxyStage::SetPropertyOperator,
        ProxyStage::FlagOperator,
        ProxyStage::SortOperator,
        ProxyStage::KeywordSortOperator,
        ProxyStage::KeywordRenameOperator,
        ProxyStage::KeywordDeleteOperator,
        ProxyStage::RegexRenameOperator,
        ProxyStage::RegexDeleteOperator,
        ProxyStage::ScriptOperator,
    ];

    /// Configured name of this stage.
    pub fn name(&self) -> &'static str {
        match self {
            ProxyStage::KeywordFilter => "Keyword Filter",
            ProxyStage::UselessFilter => "Useless Filter",
            ProxyStage::RegionFilter => "Region Filter",
            ProxyStage::RegexFilter => "Regex Filter",
            ProxyStage::TypeFilter => "Type Filter",
            ProxyStage::ScriptFilter => "Script Filter",
            ProxyStage::SetPropertyOperator => "Set Property Operator",
            ProxyStage::FlagOperator => "Flag Operator",
            ProxyStage::SortOperator => "Sort Operator",
            ProxyStage::KeywordSortOperator => "Keyword Sort Operator",
            ProxyStage::KeywordRenameOperator => "Keyword Rename Operator",
            ProxyStage::KeywordDeleteOperator => "Keyword Delete Operator",
            ProxyStage::RegexRenameOperator => "Regex Rename Operator",
            ProxyStage::RegexDeleteOperator => "Regex Delete Operator",
            ProxyStage::ScriptOperator => "Script Operator",
        }
    }
}

impl StageCatalog for ProxyStage {
    type Item = Proxy;

    fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    fn kind(&self) -> StageKind {
        match self {
            ProxyStage::KeywordFilter
            | ProxyStage::UselessFilter
            | ProxyStage::RegionFilter
            | ProxyStage::RegexFilter
            | ProxyStage::TypeFilter
            | ProxyStage::ScriptFilter => StageKind::Filter,
            _ => StageKind::Operator,
        }
    }

    fn is_script(&self) -> bool {
        matches!(self, ProxyStage::ScriptFilter | ProxyStage::ScriptOperator)
    }

    fn build(&self, args: &Value, script: Option<&str>) -> Result<Stage<Proxy>> {
        let name = self.name();
        let stage = match self {
            ProxyStage::KeywordFilter => {
                let args: KeywordFilterArgs = parse_args(name, args)?;
                Stage::Filter(Box::new(KeywordFilter::new(args.keywords, args.keep)))
            }
            ProxyStage::UselessFilter => Stage::Filter(Box::new(KeywordFilter::useless())),
            ProxyStage::RegionFilter => Stage::Filter(Box::new(RegionFilter {
                regions: parse_args(name, args)?,
            })),
            ProxyStage::RegexFilter => {
                let args: RegexFilterArgs = parse_args(name, args)?;
                Stage::Filter(Box::new(RegexFilter::new(&args.regex, args.keep)?))
            }
            ProxyStage::TypeFilter => Stage::Filter(Box::new(TypeFilter {
                types: parse_args(name, args)?,
            })),
            ProxyStage::ScriptFilter => {
                let script = script.ok_or_else(|| Error::Script("missing script body".to_string()))?;
                Stage::Filter(Box::new(ScriptFilter::<ProxyStage, _>::new(script, StageScript)))
            }
            ProxyStage::SetPropertyOperator => {
                let args: SetPropertyArgs = parse_args(name, args)?;
                Stage::Operator(Box::new(SetPropertyOperator {
                    key: args.key,
                    value: args.value,
                }))
            }
            ProxyStage::FlagOperator => {
                let add = match args {
                    Value::Null => true,
                    other => parse_args::<FlagArgs>(name, other)?.add(),
                };
                Stage::Operator(Box::new(FlagOperator { add }))
            }
            ProxyStage::SortOperator => {
                let order = match args {
                    Value::Null => "asc".to_string(),
                    other => parse_args(name, other)?,
                };
                Stage::Operator(Box::new(SortOperator { order }))
            }
            ProxyStage::KeywordSortOperator => Stage::Operator(Box::new(KeywordSortOperator {
                keywords: parse_args(name, args)?,
            })),
            ProxyStage::KeywordRenameOperator => {
                let pairs: Vec<KeywordPair> = parse_args(name, args)?;
                Stage::Operator(Box::new(KeywordRenameOperator {
                    name: name.to_string(),
                    pairs: pairs.into_iter().map(|p| (p.old, p.now)).collect(),
                }))
            }
            ProxyStage::KeywordDeleteOperator => {
                let keywords: Vec<String> = parse_args(name, args)?;
                Stage::Operator(Box::new(KeywordRenameOperator {
                    name: name.to_string(),
                    pairs: keywords.into_iter().map(|k| (k, String::new())).collect(),
                }))
            }
            ProxyStage::RegexRenameOperator => {
                let pairs: Vec<RegexPair> = parse_args(name, args)?;
                let pairs = pairs.into_iter().map(|p| (p.expr, p.now)).collect::<Vec<_>>();
                Stage::Operator(Box::new(RegexRenameOperator::new(name, &pairs)?))
            }
            ProxyStage::RegexDeleteOperator => {
                let exprs: Vec<String> = parse_args(name, args)?;
                let pairs = exprs.into_iter().map(|e| (e, String::new())).collect::<Vec<_>>();
                Stage::Operator(Box::new(RegexRenameOperator::new(name, &pairs)?))
            }
            ProxyStage::ScriptOperator => {
                let script = script.ok_or_else(|| Error::Script("missing script body".to_string()))?;
                Stage::Operator(Box::new(ScriptOperator::<ProxyStage, _>::new(script, StageScript)))
            }
        };
        Ok(stage)
    }
}

// ---------------------------------------------------------------------------
// Arguments

#[derive(Debug, Deserialize)]
struct KeywordFilterArgs {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_keep")]
    keep: bool,
}

#[derive(Debug, Deserialize)]
struct RegexFilterArgs {
    #[serde(default)]
    regex: Vec<String>,
    #[serde(default = "default_keep")]
    keep: bool,
}

fn default_keep() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SetPropertyArgs {
    key: String,
    value: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlagArgs {
    Bare(bool),
    Keyed { add: bool },
}

impl FlagArgs {
    fn add(&self) -> bool {
        match self {
            FlagArgs::Bare(add) | FlagArgs::Keyed { add } => *add,
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeywordPair {
    old: String,
    now: String,
}

#[derive(Debug, Deserialize)]
struct RegexPair {
    expr: String,
    now: String,
}

// ---------------------------------------------------------------------------
// Filters

/// Keeps (or drops, with `keep = false`) proxies whose name contains any keyword.
///
/// With no keywords nothing matches, so `keep = true` keeps nothing and
/// `keep = false` keeps everything.
pub struct KeywordFilter {
    name: &'static str,
    keywords: Vec<String>,
    keep: bool,
}

impl KeywordFilter {
    /// Marker substrings of expired, traffic-quota and notice entries.
    pub const USELESS_KEYWORDS: [&'static str; 7] =
        ["网址", "流量", "时间", "应急", "过期", "Bandwidth", "expire"];

    pub fn new(keywords: Vec<String>, keep: bool) -> Self {
        Self {
            name: "Keyword Filter",
            keywords,
            keep,
        }
    }

    /// Drops subscription notice entries.
    pub fn useless() -> Self {
        Self {
            name: "Useless Filter",
            keywords: Self::USELESS_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            keep: false,
        }
    }
}

impl Filter<Proxy> for KeywordFilter {
    fn name(&self) -> &str {
        self.name
    }

    fn select(&self, items: &[Proxy]) -> Result<Vec<bool>> {
        Ok(items
            .iter()
            .map(|p| {
                let selected = self.keywords.iter().any(|k| p.name.contains(k.as_str()));
                selected == self.keep
            })
            .collect())
    }
}

/// Keeps proxies whose computed flag belongs to one of the given regions.
pub struct RegionFilter {
    regions: Vec<String>,
}

impl RegionFilter {
    /// Region codes with a direct flag mapping; other codes match nothing.
    fn region_flag(code: &str) -> Option<&'static str> {
        match code {
            "HK" => Some("🇭🇰"),
            "TW" => Some("🇹🇼"),
            "US" => Some("🇺🇸"),
            "SG" => Some("🇸🇬"),
            "JP" => Some("🇯🇵"),
            "UK" => Some("🇬🇧"),
            _ => None,
        }
    }
}

impl Filter<Proxy> for RegionFilter {
    fn name(&self) -> &str {
        "Region Filter"
    }

    fn select(&self, items: &[Proxy]) -> Result<Vec<bool>> {
        Ok(items
            .iter()
            .map(|p| {
                let flag = get_flag(&p.name);
                self.regions
                    .iter()
                    .any(|r| Self::region_flag(r) == Some(flag))
            })
            .collect())
    }
}

/// Keeps (or drops) proxies whose name matches any pattern.
pub struct RegexFilter {
    patterns: Vec<Regex>,
    keep: bool,
}

impl RegexFilter {
    pub fn new(patterns: &[String], keep: bool) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns, keep })
    }
}

impl Filter<Proxy> for RegexFilter {
    fn name(&self) -> &str {
        "Regex Filter"
    }

    fn select(&self, items: &[Proxy]) -> Result<Vec<bool>> {
        Ok(items
            .iter()
            .map(|p| {
                let selected = self.patterns.iter().any(|r| r.is_match(&p.name));
                selected == self.keep
            })
            .collect())
    }
}

/// Keeps proxies whose `type` tag is listed.
pub struct TypeFilter {
    types: Vec<String>,
}

impl Filter<Proxy> for TypeFilter {
    fn name(&self) -> &str {
        "Type Filter"
    }

    fn select(&self, items: &[Proxy]) -> Result<Vec<bool>> {
        Ok(items
            .iter()
            .map(|p| self.types.iter().any(|t| t == p.type_name()))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Operators

/// Forces one attribute to the same value on every proxy.
pub struct SetPropertyOperator {
    key: String,
    value: Value,
}

impl Operator<Proxy> for SetPropertyOperator {
    fn name(&self) -> &str {
        "Set Property Operator"
    }

    fn apply(&self, items: &mut Vec<Proxy>) -> Result<Option<Vec<Proxy>>> {
        for proxy in items.iter_mut() {
            proxy.set_property(&self.key, self.value.clone())?;
        }
        Ok(None)
    }
}

/// Adds or removes the region flag at the start of each name.
pub struct FlagOperator {
    add: bool,
}

impl Operator<Proxy> for FlagOperator {
    fn name(&self) -> &str {
        "Flag Operator"
    }

    fn apply(&self, items: &mut Vec<Proxy>) -> Result<Option<Vec<Proxy>>> {
        for proxy in items.iter_mut() {
            if !self.add {
                proxy.name = remove_flag(&proxy.name);
                continue;
            }
            let flag = get_flag(&proxy.name).to_string();
            let name = format!("{} {}", flag, remove_flag(&proxy.name));
            proxy.name = name.replace(TAIWAN, CHINA);
        }
        Ok(None)
    }
}

/// Orders names by UTF-16 code units, as subscription clients do.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// Sorts by name: `asc`, `desc` or `random`.
pub struct SortOperator {
    order: String,
}

impl Operator<Proxy> for SortOperator {
    fn name(&self) -> &str {
        "Sort Operator"
    }

    fn apply(&self, items: &mut Vec<Proxy>) -> Result<Option<Vec<Proxy>>> {
        // `sort_by` is stable: equal names keep their relative order.
        match self.order.as_str() {
            "asc" => items.sort_by(|a, b| compare_names(&a.name, &b.name)),
            "desc" => items.sort_by(|a, b| compare_names(&b.name, &a.name)),
            "random" => items.shuffle(&mut rand::thread_rng()),
            other => return Err(Error::UnknownSortOrder(other.to_string())),
        }
        Ok(None)
    }
}

/// Sorts proxies matching earlier keywords first, unmatched last.
pub struct KeywordSortOperator {
    keywords: Vec<String>,
}

impl KeywordSortOperator {
    /// 1-based index of the first keyword contained in `name`.
    fn keyword_order(&self, name: &str) -> Option<usize> {
        self.keywords
            .iter()
            .position(|k| name.contains(k.as_str()))
            .map(|i| i + 1)
    }
}

impl Operator<Proxy> for KeywordSortOperator {
    fn name(&self) -> &str {
        "Keyword Sort Operator"
    }

    fn apply(&self, items: &mut Vec<Proxy>) -> Result<Option<Vec<Proxy>>> {
        items.sort_by(|a, b| {
            match (self.keyword_order(&a.name), self.keyword_order(&b.name)) {
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(x), Some(y)) if x != y => x.cmp(&y),
                _ => compare_names(&a.name, &b.name),
            }
        });
        Ok(None)
    }
}

/// Replaces substrings of names, trimming after each replacement.
pub struct KeywordRenameOperator {
    name: String,
    pairs: Vec<(String, String)>,
}

impl Operator<Proxy> for KeywordRenameOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, items: &mut Vec<Proxy>) -> Result<Option<Vec<Proxy>>> {
        for proxy in items.iter_mut() {
            for (old, now) in &self.pairs {
                if old.is_empty() {
                    continue;
                }
                proxy.name = proxy.name.replace(old.as_str(), now).trim().to_string();
            }
        }
        Ok(None)
    }
}

/// Replaces regex matches in names, trimming after each replacement.
pub struct RegexRenameOperator {
    name: String,
    pairs: Vec<(Regex, String)>,
}

impl RegexRenameOperator {
    pub fn new(name: &str, pairs: &[(String, String)]) -> Result<Self> {
        let pairs = pairs
            .iter()
            .map(|(expr, now)| Ok((Regex::new(expr)?, now.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: name.to_string(),
            pairs,
        })
    }
}

impl Operator<Proxy> for RegexRenameOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, items: &mut Vec<Proxy>) -> Result<Option<Vec<Proxy>>> {
        for proxy in items.iter_mut() {
            for (expr, now) in &self.pairs {
                let renamed = expr
                    .replace_all(&proxy.name, |caps: &Captures| {
                        expand_replacement(expr, now, caps, &proxy.name)
                    })
                    .trim()
                    .to_string();
                proxy.name = renamed;
            }
        }
        Ok(None)
    }
}

/// Expand a replacement template for one match.
///
/// Understands `$$`, `$&`, `` $` ``, `$'`, `$1`..`$99` and `$<name>`.
/// A reference to a group the pattern does not define stays literal.
fn expand_replacement(expr: &Regex, template: &str, caps: &Captures, haystack: &str) -> String {
    let whole = caps.get(0).map_or(0..0, |m| m.range());
    let groups = caps.len() - 1;
    let has_names = expr.capture_names().flatten().next().is_some();

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let consumed = match tail.as_bytes().first() {
            Some(b'$') => {
                out.push('$');
                1
            }
            Some(b'&') => {
                out.push_str(&haystack[whole.clone()]);
                1
            }
            Some(b'`') => {
                out.push_str(&haystack[..whole.start]);
                1
            }
            Some(b'\'') => {
                out.push_str(&haystack[whole.end..]);
                1
            }
            Some(b'0'..=b'9') => match group_reference(tail, groups) {
                Some((index, len)) => {
                    out.push_str(caps.get(index).map_or("", |m| m.as_str()));
                    len
                }
                None => {
                    out.push('$');
                    0
                }
            },
            Some(b'<') if has_names => match tail.find('>') {
                Some(end) => {
                    out.push_str(caps.name(&tail[1..end]).map_or("", |m| m.as_str()));
                    end + 1
                }
                None => {
                    out.push('$');
                    0
                }
            },
            _ => {
                out.push('$');
                0
            }
        };
        rest = &tail[consumed..];
    }
    out.push_str(rest);
    out
}

/// Group index and digit count of a `$n` or `$nn` reference, preferring
/// two digits when that group exists.
fn group_reference(tail: &str, groups: usize) -> Option<(usize, usize)> {
    let digits: Vec<usize> = tail
        .bytes()
        .take(2)
        .take_while(u8::is_ascii_digit)
        .map(|b| usize::from(b - b'0'))
        .collect();
    if let [tens, ones] = digits[..] {
        let index = tens * 10 + ones;
        if (1..=groups).contains(&index) {
            return Some((index, 2));
        }
    }
    let index = *digits.first()?;
    (1..=groups).contains(&index).then_some((index, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{process_filter, process_operator, Pipeline, StageDescriptor};
    use crate::proxy::tests::{ss, trojan};
    use serde_json::json;

    fn names(proxies: &[Proxy]) -> Vec<&str> {
        proxies.iter().map(|p| p.name.as_str()).collect()
    }

    fn run(proxies: Vec<Proxy>, stages: Vec<StageDescriptor>) -> Vec<Proxy> {
        Pipeline::new().run::<ProxyStage>(proxies, &stages).unwrap()
    }

    fn build(stage: ProxyStage, args: Value) -> Stage<Proxy> {
        match stage.build(&args, None) {
            Ok(stage) => stage,
            Err(e) => panic!("failed to build {}: {}", stage.name(), e),
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(ProxyStage::lookup("Flag Operator"), Some(ProxyStage::FlagOperator));
        assert_eq!(ProxyStage::lookup("flag operator"), None);
        assert_eq!(ProxyStage::ScriptFilter.kind(), StageKind::Filter);
        assert_eq!(ProxyStage::SortOperator.kind(), StageKind::Operator);
        assert!(ProxyStage::ScriptOperator.is_script());
    }

    #[test]
    fn test_keyword_filter_empty_keywords() {
        let input = vec![ss("a"), ss("b")];

        let Stage::Filter(keep) = build(ProxyStage::KeywordFilter, json!({"keywords": [], "keep": true})) else {
            panic!("expected filter");
        };
        assert!(process_filter(keep.as_ref(), input.clone()).is_empty());

        let Stage::Filter(drop) = build(ProxyStage::KeywordFilter, json!({"keywords": [], "keep": false})) else {
            panic!("expected filter");
        };
        assert_eq!(process_filter(drop.as_ref(), input.clone()), input);
    }

    #[test]
    fn test_keyword_and_useless_filter() {
        let input = vec![ss("HK 01"), ss("剩余流量 10G"), ss("US 02"), ss("expire 2024-01-01")];
        let output = run(
            input.clone(),
            vec![StageDescriptor::new("Keyword Filter", json!({"keywords": ["HK", "US"]}))],
        );
        assert_eq!(names(&output), vec!["HK 01", "US 02"]);

        let output = run(input, vec![StageDescriptor::named("Useless Filter")]);
        assert_eq!(names(&output), vec!["HK 01", "US 02"]);
    }

    #[test]
    fn test_region_filter() {
        let input = vec![ss("香港 01"), ss("日本 02"), ss("Germany"), ss("新加坡")];
        let output = run(
            input.clone(),
            vec![StageDescriptor::new("Region Filter", json!(["HK", "SG"]))],
        );
        assert_eq!(names(&output), vec!["香港 01", "新加坡"]);

        // Codes without a direct mapping match nothing.
        let output = run(input, vec![StageDescriptor::new("Region Filter", json!(["DE"]))]);
        assert!(output.is_empty());
    }

    #[test]
    fn test_regex_filter() {
        let input = vec![ss("IPLC-01"), ss("BGP-02"), ss("IPLC-03")];
        let output = run(
            input.clone(),
            vec![StageDescriptor::new("Regex Filter", json!({"regex": ["^IPLC"], "keep": false}))],
        );
        assert_eq!(names(&output), vec!["BGP-02"]);

        // Invalid pattern: the stage is skipped.
        let output = run(
            input.clone(),
            vec![StageDescriptor::new("Regex Filter", json!({"regex": ["("]}))],
        );
        assert_eq!(output, input);
    }

    #[test]
    fn test_type_filter() {
        let input = vec![ss("a"), trojan("b"), ss("c")];
        let output = run(input, vec![StageDescriptor::new("Type Filter", json!(["trojan"]))]);
        assert_eq!(names(&output), vec!["b"]);
    }

    #[test]
    fn test_set_property_operator() {
        let output = run(
            vec![ss("a"), trojan("b")],
            vec![StageDescriptor::new(
                "Set Property Operator",
                json!({"key": "skip-cert-verify", "value": true}),
            )],
        );
        assert!(output.iter().all(|p| p.skip_cert_verify == Some(true)));
    }

    #[test]
    fn test_set_property_mixed_types() {
        let output = run(
            vec![ss("a"), trojan("b")],
            vec![StageDescriptor::new(
                "Set Property Operator",
                json!({"key": "cipher", "value": "chacha20-ietf-poly1305"}),
            )],
        );
        let values: Vec<Value> = output
            .iter()
            .map(|p| serde_json::to_value(p).unwrap()["cipher"].clone())
            .collect();
        assert_eq!(values, vec![json!("chacha20-ietf-poly1305"); 2]);
    }

    #[test]
    fn test_set_property_mistyped_value_reverts() {
        let input = vec![ss("a"), trojan("b")];
        let output = run(
            input.clone(),
            vec![StageDescriptor::new(
                "Set Property Operator",
                json!({"key": "port", "value": "not a port"}),
            )],
        );
        assert_eq!(output, input);
    }

    #[test]
    fn test_flag_operator() {
        let output = run(
            vec![ss("HK 01"), ss("🇺🇸 Los Angeles"), ss("🇹🇼 Taipei"), ss("node")],
            vec![StageDescriptor::named("Flag Operator")],
        );
        assert_eq!(
            names(&output),
            vec!["🇭🇰 HK 01", "🇺🇸 Los Angeles", "🇨🇳 Taipei", "🏴‍☠️ node"]
        );

        let output = run(output, vec![StageDescriptor::new("Flag Operator", json!(false))]);
        assert_eq!(names(&output), vec!["HK 01", "Los Angeles", "Taipei", "🏴‍☠️ node"]);
    }

    #[test]
    fn test_sort_operator_stability() {
        let mut first = ss("b");
        first.server = "first".to_string();
        let mut second = ss("b");
        second.server = "second".to_string();
        let input = vec![ss("c"), first, ss("a"), second];

        let asc = run(input.clone(), vec![StageDescriptor::new("Sort Operator", json!("asc"))]);
        assert_eq!(names(&asc), vec!["a", "b", "b", "c"]);
        assert_eq!(asc[1].server, "first");
        assert_eq!(asc[2].server, "second");

        let desc = run(input, vec![StageDescriptor::new("Sort Operator", json!("desc"))]);
        assert_eq!(names(&desc), vec!["c", "b", "b", "a"]);
        assert_eq!(desc[1].server, "first");
        assert_eq!(desc[2].server, "second");
    }

    #[test]
    fn test_sort_by_utf16_units() {
        // U+FF03 sorts after the surrogate pair of a flag emoji in UTF-16.
        let output = run(
            vec![ss("＃1"), ss("🇭🇰 HK")],
            vec![StageDescriptor::new("Sort Operator", json!("asc"))],
        );
        assert_eq!(names(&output), vec!["🇭🇰 HK", "＃1"]);
    }

    #[test]
    fn test_sort_operator_random_and_unknown() {
        let input: Vec<Proxy> = (0..20).map(|i| ss(&format!("n{:02}", i))).collect();
        let shuffled = run(input.clone(), vec![StageDescriptor::new("Sort Operator", json!("random"))]);
        let mut restored = names(&shuffled);
        restored.sort();
        assert_eq!(restored, names(&input));

        let output = run(input.clone(), vec![StageDescriptor::new("Sort Operator", json!("sideways"))]);
        assert_eq!(output, input);
    }

    #[test]
    fn test_keyword_sort_operator() {
        let output = run(
            vec![ss("xb"), ss("ya"), ss("zz")],
            vec![StageDescriptor::new("Keyword Sort Operator", json!(["a", "b"]))],
        );
        assert_eq!(names(&output), vec!["ya", "xb", "zz"]);

        let output = run(
            vec![ss("zz"), ss("b2"), ss("yy"), ss("b1")],
            vec![StageDescriptor::new("Keyword Sort Operator", json!(["b"]))],
        );
        assert_eq!(names(&output), vec!["b1", "b2", "yy", "zz"]);
    }

    #[test]
    fn test_rename_and_delete_operators() {
        let input = vec![ss("[Premium] HK 01 "), ss("[Premium] US  02")];

        let output = run(
            input.clone(),
            vec![StageDescriptor::new(
                "Keyword Rename Operator",
                json!([{"old": "[Premium]", "now": "P"}, {"old": "HK", "now": "Hong Kong"}]),
            )],
        );
        assert_eq!(names(&output), vec!["P Hong Kong 01", "P US  02"]);

        let output = run(
            input.clone(),
            vec![StageDescriptor::new("Keyword Delete Operator", json!(["[Premium]"]))],
        );
        assert_eq!(names(&output), vec!["HK 01", "US  02"]);

        let output = run(
            input.clone(),
            vec![StageDescriptor::new(
                "Regex Rename Operator",
                json!([{"expr": "\\s+", "now": "-"}, {"expr": "^\\[(\\w+)\\]", "now": "$1"}]),
            )],
        );
        assert_eq!(names(&output), vec!["Premium-HK-01-", "Premium-US-02"]);

        let output = run(
            input,
            vec![StageDescriptor::new("Regex Delete Operator", json!(["^\\[.*?\\]", "\\d+"]))],
        );
        assert_eq!(names(&output), vec!["HK", "US"]);
    }

    #[test]
    fn test_regex_rename_templates() {
        let rename = |expr: &str, now: &str| {
            let output = run(
                vec![ss("HK-01")],
                vec![StageDescriptor::new(
                    "Regex Rename Operator",
                    json!([{"expr": expr, "now": now}]),
                )],
            );
            output[0].name.clone()
        };

        assert_eq!(rename("(\\w+)-(\\d+)", "$2a $5 $$ $&"), "01a $5 $ HK-01");
        assert_eq!(rename("-", "[$`|$']"), "HK[HK|01]01");
        assert_eq!(rename("(?P<code>\\w+)-", "$<code>:"), "HK:01");
        assert_eq!(rename("-", "$<code>"), "HK$<code>01");
        assert_eq!(rename("(\\w)(\\w)-", "$02$1"), "KH01");
    }

    #[test]
    fn test_operator_does_not_touch_input() {
        let input = vec![ss("HK 01")];
        let Stage::Operator(op) = build(ProxyStage::FlagOperator, Value::Null) else {
            panic!("expected operator");
        };
        let output = process_operator(op.as_ref(), input.clone());
        assert_eq!(input[0].name, "HK 01");
        assert_eq!(output[0].name, "🇭🇰 HK 01");
    }
}
