//! End-to-end conversion: parse, run the pipeline, produce.

use crate::config::{JobConfig, JobKind};
use crate::fetch::ScriptFetcher;
use crate::pipeline::{Pipeline, StageDescriptor};
use crate::proxy::{self, ProxyStage};
use crate::rules::{self, RuleStage};
use crate::{Platform, Result};

/// Convert a raw proxy subscription for `target`.
///
/// Fails only on an unknown target or an unreachable remote script.
pub fn convert_proxies(
    raw: &str,
    stages: &[StageDescriptor],
    target: &str,
    fetcher: Option<&dyn ScriptFetcher>,
) -> Result<String> {
    let platform: Platform = target.parse()?;
    let proxies = proxy::parse(raw);
    log::info!("Parsed {} proxies", proxies.len());

    let proxies = pipeline(fetcher).run::<ProxyStage>(proxies, stages)?;
    log::info!("{} proxies after processing", proxies.len());

    proxy::produce(&proxies, platform.as_str())
}

/// Convert a raw rule set for `target`.
pub fn convert_rules(
    raw: &str,
    stages: &[StageDescriptor],
    target: &str,
    fetcher: Option<&dyn ScriptFetcher>,
) -> Result<String> {
    let platform: Platform = target.parse()?;
    let rules = rules::parse(raw);
    log::info!("Parsed {} rules", rules.len());

    let rules = pipeline(fetcher).run::<RuleStage>(rules, stages)?;
    log::info!("{} rules after processing", rules.len());

    rules::produce(&rules, platform.as_str())
}

/// Run a configured job over `raw`.
pub fn run(job: &JobConfig, raw: &str, fetcher: Option<&dyn ScriptFetcher>) -> Result<String> {
    match job.kind {
        JobKind::Proxy => convert_proxies(raw, &job.process, &job.target, fetcher),
        JobKind::Rule => convert_rules(raw, &job.process, &job.target, fetcher),
    }
}

fn pipeline(fetcher: Option<&dyn ScriptFetcher>) -> Pipeline<'_> {
    match fetcher {
        Some(fetcher) => Pipeline::with_fetcher(fetcher),
        None => Pipeline::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_unknown_target_fails_before_parsing() {
        assert!(matches!(
            convert_rules("DOMAIN,a.com", &[], "Nope", None),
            Err(Error::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn test_run_rule_job() {
        let job = JobConfig::from_str(
            "kind: rule\ntarget: Loon\nprocess:\n  - type: Remove Duplicate\n",
        )
        .unwrap();
        let output = run(&job, "DOMAIN,a.com\nDOMAIN,a.com\nPROTOCOL,UDP", None).unwrap();
        assert_eq!(output, "DOMAIN,a.com");
    }
}
