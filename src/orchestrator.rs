//! Planning orchestrator.
//!
//! This module coordinates the whole planning run, from validated
//! configuration through address planning, attachment wiring and route
//! resolution to the files handed to the provisioner and the connectivity
//! test.

use chrono::{DateTime, Utc};
use color_eyre::eyre::WrapErr;
use log::{error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::config_loader::load_config;
use crate::emit::{emit, ResourceSpec};
use crate::error::{Diagnostic, PlanError, Result};
use crate::ip::allocator::plan_addresses;
use crate::registry::build_inventory;
use crate::topology::builder::build_topology;
use crate::topology::routes::resolve_routes;
use crate::topology::types::{HubConfig, SpokeDefinition, TopologyPlan};

pub const PLAN_FILE: &str = "plan.yaml";
pub const INVENTORY_FILE: &str = "inventory.json";
pub const DIAGNOSTICS_FILE: &str = "diagnostics.json";

/// A resolved plan and the warnings raised while resolving it
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: TopologyPlan,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run address planning, attachment wiring and route resolution.
///
/// Pure: the same inputs always give the same plan, and nothing is
/// written anywhere.
pub fn plan_topology(spokes: &[SpokeDefinition], hub: &HubConfig) -> Result<PlanOutcome> {
    info!(
        "Planning {} spoke(s) on hub ASN {} across {} zone(s)",
        spokes.len(),
        hub.asn,
        hub.zone_set().len()
    );

    let mut plan = TopologyPlan::new(spokes, hub);
    plan.subnets = plan_addresses(spokes, hub)?;
    plan.attachments = build_topology(spokes, &plan.subnets, hub)?;

    let resolution = resolve_routes(&plan)?;
    let diagnostics = resolution.diagnostics();
    plan.route_tables = resolution.route_tables;
    plan.routes = resolution.routes;
    plan.partitions = resolution.partitions;

    Ok(PlanOutcome { plan, diagnostics })
}

/// Plan a loaded configuration
pub fn plan_config(config: &Config) -> Result<PlanOutcome> {
    plan_topology(&config.to_spokes(), &config.to_hub())
}

/// Diagnostics for a configuration without writing anything.
///
/// A planning failure comes back as its single error-level diagnostic.
pub fn check_config(config: &Config) -> Vec<Diagnostic> {
    let outcome = plan_config(config).and_then(|outcome| {
        let settings = config.emit_settings();
        emit(&outcome.plan, &settings)?;
        Ok(outcome)
    });
    match outcome {
        Ok(outcome) => outcome.diagnostics,
        Err(e) => vec![e.to_diagnostic()],
    }
}

/// Contents of `diagnostics.json`
#[derive(Debug, Serialize)]
pub struct DiagnosticsReport {
    pub generated_at: DateTime<Utc>,
    pub project: String,
    pub stack: String,
    pub resource_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// What a successful run wrote
#[derive(Debug, Clone)]
pub struct OutputSummary {
    pub output_dir: PathBuf,
    pub resource_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Plan `config` and write the plan, inventory and diagnostics into `output_dir`.
///
/// Planning errors are logged as diagnostics and returned before any file
/// is created.
pub fn generate_outputs(config: &Config, output_dir: &Path) -> color_eyre::Result<OutputSummary> {
    let outcome = plan_config(config).map_err(|e| report_failure(config, e))?;
    write_outputs(config, &outcome, output_dir)
}

fn report_failure(config: &Config, err: PlanError) -> color_eyre::Report {
    let diagnostic = err.to_diagnostic();
    error!(
        "[{}] {}/{}: {} (affected: {})",
        diagnostic.code,
        config.project,
        config.stack,
        diagnostic.message,
        diagnostic.affected.join(", ")
    );
    color_eyre::Report::new(err)
}

/// Emit an already resolved plan and write every output file
pub fn write_outputs(
    config: &Config,
    outcome: &PlanOutcome,
    output_dir: &Path,
) -> color_eyre::Result<OutputSummary> {
    let settings = config.emit_settings();
    let emitter = emit(&outcome.plan, &settings).map_err(|e| report_failure(config, e))?;
    let specs: Vec<ResourceSpec> = emitter.specs().collect();
    let inventory = build_inventory(&outcome.plan, emitter.addresses());

    for diagnostic in &outcome.diagnostics {
        warn!("[{}] {}", diagnostic.code, diagnostic.message);
    }

    fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

    let plan_path = output_dir.join(PLAN_FILE);
    let plan_yaml = serde_yaml::to_string(&specs)?;
    fs::write(&plan_path, plan_yaml)
        .wrap_err_with(|| format!("Failed to write plan '{}'", plan_path.display()))?;

    let inventory_path = output_dir.join(INVENTORY_FILE);
    let inventory_json = serde_json::to_string_pretty(&inventory)?;
    fs::write(&inventory_path, inventory_json)
        .wrap_err_with(|| format!("Failed to write inventory '{}'", inventory_path.display()))?;

    let report = DiagnosticsReport {
        generated_at: Utc::now(),
        project: config.project.clone(),
        stack: config.stack.clone(),
        resource_count: specs.len(),
        diagnostics: outcome.diagnostics.clone(),
    };
    let diagnostics_path = output_dir.join(DIAGNOSTICS_FILE);
    let diagnostics_json = serde_json::to_string_pretty(&report)?;
    fs::write(&diagnostics_path, diagnostics_json)
        .wrap_err_with(|| format!("Failed to write diagnostics '{}'", diagnostics_path.display()))?;

    info!(
        "Wrote {} resource specs for {}/{} to {:?}",
        specs.len(),
        config.project,
        config.stack,
        output_dir
    );
    Ok(OutputSummary {
        output_dir: output_dir.to_path_buf(),
        resource_count: specs.len(),
        diagnostics: outcome.diagnostics.clone(),
    })
}

/// One configuration file and its plan
#[derive(Debug)]
pub struct Environment {
    pub path: PathBuf,
    pub config: Config,
    pub outcome: PlanOutcome,
}

impl Environment {
    /// Directory name used when several environments share one output root
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.config.project, self.config.stack)
    }
}

/// Load and plan several configuration files in parallel.
///
/// Results keep the order of `paths`. Each environment is planned on its
/// own; a failure in one does not affect the others.
pub fn plan_environments(paths: &[PathBuf]) -> Vec<color_eyre::Result<Environment>> {
    paths
        .par_iter()
        .map(|path| -> color_eyre::Result<Environment> {
            let config = load_config(path)?;
            let outcome = plan_config(&config).map_err(|e| report_failure(&config, e))?;
            Ok(Environment {
                path: path.clone(),
                config,
                outcome,
            })
        })
        .collect()
}

/// Diagnostics for one configuration file, planning errors included
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Load and check several configuration files in parallel without writing
/// anything.
///
/// Only unreadable or invalid files are `Err`; a configuration that fails
/// to plan yields a report carrying its error-level diagnostic.
pub fn check_environments(paths: &[PathBuf]) -> Vec<color_eyre::Result<CheckReport>> {
    paths
        .par_iter()
        .map(|path| -> color_eyre::Result<CheckReport> {
            let config = load_config(path)?;
            Ok(CheckReport {
                path: path.clone(),
                diagnostics: check_config(&config),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use crate::topology::types::RouteTableMode;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn lab_dev() -> Config {
        serde_yaml::from_str(
            r#"
project: transit-lab
hub:
  asn: 64512
  availability_zones: [us-east-1a, us-east-1b]
spokes:
  lab:
    cidr_block: 10.200.0.0/16
    workload_subnet_cidr: 10.200.10.0/24
  dev:
    cidr_block: 10.201.0.0/16
    workload_subnet_cidr: 10.201.10.0/24
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_plan_topology() {
        let config = lab_dev();
        let outcome = plan_config(&config).unwrap();
        assert_eq!(outcome.plan.attachments.len(), 2);
        assert_eq!(outcome.plan.subnets.len(), 6);
        assert!(outcome.diagnostics.is_empty());
        assert!(!outcome.plan.is_partitioned());
    }

    #[test]
    fn test_generate_outputs() {
        let config = lab_dev();
        let dir = tempdir().unwrap();
        let summary = generate_outputs(&config, dir.path()).unwrap();
        assert!(summary.resource_count > 0);

        let plan = fs::read_to_string(dir.path().join(PLAN_FILE)).unwrap();
        assert!(plan.contains("kind: attachment"));

        let inventory: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(INVENTORY_FILE)).unwrap()).unwrap();
        assert_eq!(inventory["spokes"]["lab"]["instance_addresses"][0], "10.200.10.4");

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(DIAGNOSTICS_FILE)).unwrap()).unwrap();
        assert!(report["generated_at"].is_string());
        assert_eq!(report["resource_count"], summary.resource_count);
    }

    #[test]
    fn test_failure_writes_nothing() {
        let mut config = lab_dev();
        config.spokes.get_mut("dev").unwrap().cidr_block = "10.200.128.0/17".parse().unwrap();
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");

        let err = generate_outputs(&config, &out).unwrap_err();
        let plan_err = err.downcast_ref::<PlanError>().unwrap();
        assert_eq!(plan_err.code(), "AddressConflict");
        assert!(!out.exists());
    }

    #[test]
    fn test_check_config() {
        let mut config = lab_dev();
        assert!(check_config(&config).is_empty());

        config.hub.route_table_mode = RouteTableMode::PerSpokeIsolated;
        let diagnostics = check_config(&config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(diagnostics[0].code, "PartitionedTopology");

        config.hub.availability_zones = vec!["us-east-1a".to_string()];
        let diagnostics = check_config(&config);
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[0].code, "InsufficientAZCoverage");
    }

    #[test]
    fn test_plan_environments() {
        let mut good = NamedTempFile::new().unwrap();
        write!(good, "{}", serde_yaml::to_string(&lab_dev()).unwrap()).unwrap();
        let mut bad = NamedTempFile::new().unwrap();
        write!(bad, "hub: [").unwrap();

        let paths = vec![good.path().to_path_buf(), bad.path().to_path_buf()];
        let results = plan_environments(&paths);
        assert_eq!(results.len(), 2);

        let env = results[0].as_ref().unwrap();
        assert_eq!(env.path, paths[0]);
        assert_eq!(env.dir_name(), "transit-lab-dev");
        assert!(results[1].is_err());
    }

    #[test]
    fn test_check_environments_reports_planning_errors() {
        let mut good = NamedTempFile::new().unwrap();
        write!(good, "{}", serde_yaml::to_string(&lab_dev()).unwrap()).unwrap();

        let mut conflicting = lab_dev();
        conflicting.spokes.get_mut("dev").unwrap().cidr_block = "10.200.128.0/17".parse().unwrap();
        conflicting.spokes.get_mut("dev").unwrap().workload_subnet_cidr = None;
        let mut failing = NamedTempFile::new().unwrap();
        write!(failing, "{}", serde_yaml::to_string(&conflicting).unwrap()).unwrap();

        let mut broken = NamedTempFile::new().unwrap();
        write!(broken, "hub: [").unwrap();

        let paths = vec![
            good.path().to_path_buf(),
            failing.path().to_path_buf(),
            broken.path().to_path_buf(),
        ];
        let reports = check_environments(&paths);
        assert_eq!(reports.len(), 3);

        let ok = reports[0].as_ref().unwrap();
        assert!(ok.diagnostics.is_empty());
        assert!(!ok.has_errors());

        let failed = reports[1].as_ref().unwrap();
        assert_eq!(failed.path, paths[1]);
        assert!(failed.has_errors());
        assert_eq!(failed.diagnostics.len(), 1);
        assert_eq!(failed.diagnostics[0].code, "AddressConflict");
        assert_eq!(failed.diagnostics[0].affected, vec!["dev".to_string(), "lab".to_string()]);

        let json = serde_json::to_string(&failed.diagnostics).unwrap();
        assert!(json.contains("\"severity\":\"error\""));

        assert!(reports[2].is_err());
    }
}
