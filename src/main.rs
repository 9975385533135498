use anyhow::{Context, Result};
use clap::Parser;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use reshape::{Engine, RulesFile};

/// Apply a JSON rule set to a JSON document
#[derive(Debug, Parser)]
#[command(name = "reshape", version, about)]
struct Cli {
    /// Rules file holding one or more rule sets
    #[arg(short, long, value_name = "FILE")]
    rules: PathBuf,

    /// Id of the rule set to apply
    #[arg(short = 's', long, value_name = "ID", required_unless_present = "list")]
    rule_set: Option<String>,

    /// Input document; read from stdin when omitted
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Pretty-print the output document
    #[arg(short, long)]
    pretty: bool,

    /// Print the ids of the rule sets in the rules file and exit
    #[arg(short, long, conflicts_with_all = ["rule_set", "input", "pretty"])]
    list: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_engine(path: &Path) -> Result<Engine> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read rules file {}", path.display()))?;
    let file = RulesFile::from_slice(&bytes)
        .with_context(|| format!("failed to load rules file {}", path.display()))?;

    let engine = Engine::new();
    for rule_set in file.rule_sets {
        let id = rule_set.id.clone();
        engine
            .add_rule_set_config(rule_set)
            .with_context(|| format!("failed to register rule set '{}'", id))?;
    }
    Ok(engine)
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read input {}", path.display())),
        None => {
            let mut input = Vec::new();
            std::io::stdin()
                .read_to_end(&mut input)
                .context("failed to read stdin")?;
            Ok(input)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let engine = load_engine(&cli.rules)?;
    let mut stdout = std::io::stdout().lock();

    if cli.list {
        for id in engine.rule_set_ids() {
            writeln!(stdout, "{}", id)?;
        }
        return Ok(());
    }

    let id = cli.rule_set.context("--rule-set is required")?;
    let input = read_input(cli.input.as_deref())?;

    let mut output = engine
        .transform(&id, &input)
        .with_context(|| format!("rule set '{}' failed", id))?;
    if cli.pretty {
        let value: serde_json::Value = serde_json::from_slice(&output)?;
        output = serde_json::to_vec_pretty(&value)?;
    }

    stdout.write_all(&output)?;
    writeln!(stdout)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "run failed");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
