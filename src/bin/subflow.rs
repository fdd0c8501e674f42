//! subflow: convert a proxy subscription or rule set for a target client.

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use subflow::config::{JobConfig, JobKind};
use subflow::fetch::{HttpFetcher, ScriptFetcher};

#[derive(Parser)]
#[command(name = "subflow")]
#[command(version)]
#[command(about = "Convert proxy subscriptions and rule sets between client formats", long_about = None)]
struct Cli {
    /// Raw subscription or rule set file
    #[arg(short, long)]
    input: PathBuf,

    /// Job configuration (YAML or JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Override the target platform from the configuration
    #[arg(short, long)]
    target: Option<String>,

    /// Override the job kind from the configuration (`proxy` or `rule`)
    #[arg(short, long)]
    kind: Option<String>,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = convert(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn convert(cli: &Cli) -> subflow::Result<()> {
    let mut job = JobConfig::from_file(&cli.config)?;
    if let Some(target) = &cli.target {
        job.target = target.clone();
    }
    if let Some(kind) = &cli.kind {
        job.kind = JobKind::from_str(kind)
            .ok_or_else(|| subflow::Error::Config(format!("unknown job kind: {}", kind)))?;
    }
    job.validate()?;

    let raw = fs::read_to_string(&cli.input)?;
    let fetcher = HttpFetcher::new();
    let fetcher: &dyn ScriptFetcher = &fetcher;
    let output = subflow::job::run(&job, &raw, Some(fetcher))?;

    match &cli.output {
        Some(path) => {
            fs::write(path, &output)?;
            log::info!("Wrote {} bytes to {}", output.len(), path.display());
        }
        None => println!("{}", output),
    }
    Ok(())
}
