use clap::Parser;
use color_eyre::eyre::bail;
use color_eyre::Result;
use env_logger::Env;
use log::{error, info, warn};
use std::collections::HashSet;
use std::path::PathBuf;

use hubnet::orchestrator;

/// Planner for hub-and-spoke transit network topologies
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a topology configuration YAML file (repeat to plan several environments)
    #[arg(short, long, required = true)]
    config: Vec<PathBuf>,

    /// Output directory for the plan, inventory and diagnostics
    #[arg(short, long, default_value = "hubnet_output")]
    output: PathBuf,

    /// Validate and plan without writing any files
    #[arg(long)]
    check: bool,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting hubnet topology planner");
    info!("Configuration file(s): {:?}", args.config);
    if !args.check {
        info!("Output directory: {:?}", args.output);
    }

    if args.check {
        return check(&args.config);
    }

    let total = args.config.len();
    let mut failures = 0;
    let mut output_dirs = HashSet::new();

    for result in orchestrator::plan_environments(&args.config) {
        let env = match result {
            Ok(env) => env,
            Err(e) => {
                error!("{:#}", e);
                failures += 1;
                continue;
            }
        };

        // Several environments each get their own subdirectory
        let output_dir = if total > 1 {
            args.output.join(env.dir_name())
        } else {
            args.output.clone()
        };
        if !output_dirs.insert(output_dir.clone()) {
            bail!(
                "Configuration {:?} writes to {:?}, which another configuration already uses",
                env.path,
                output_dir
            );
        }

        let summary = orchestrator::write_outputs(&env.config, &env.outcome, &output_dir)?;
        info!(
            "Planned {}: {} resources, {} warning(s)",
            env.dir_name(),
            summary.resource_count,
            summary.diagnostics.len()
        );
    }

    if failures > 0 {
        bail!("{} of {} configuration(s) failed to plan", failures, total);
    }

    info!("Planning completed successfully");
    Ok(())
}

/// Print every configuration's diagnostics as JSON, errors included
fn check(paths: &[PathBuf]) -> Result<()> {
    let mut failures = 0;

    for result in orchestrator::check_environments(paths) {
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                error!("{:#}", e);
                failures += 1;
                continue;
            }
        };

        if report.has_errors() {
            failures += 1;
        }
        for diagnostic in &report.diagnostics {
            if diagnostic.is_error() {
                error!("{:?}: [{}] {}", report.path, diagnostic.code, diagnostic.message);
            } else {
                warn!("{:?}: [{}] {}", report.path, diagnostic.code, diagnostic.message);
            }
        }
        println!("{}", serde_json::to_string_pretty(&report.diagnostics)?);
    }

    if failures > 0 {
        bail!("{} of {} configuration(s) failed the check", failures, paths.len());
    }

    info!("Check completed successfully");
    Ok(())
}
