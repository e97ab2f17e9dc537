//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{DistributorBlueprint, TargetType};

use crate::cli::ValidateArgs;

use super::load_blueprint;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    source_count: usize,
    target_count: usize,
    worker_threads: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_blueprint(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    source_count: blueprint.sources.len(),
                    target_count: blueprint.targets.len(),
                    worker_threads: blueprint
                        .targets
                        .iter()
                        .filter(|t| t.target_type != TargetType::Log)
                        .map(|t| t.pool_size)
                        .sum(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &DistributorBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let settings = &blueprint.distributor;

    if settings.delivery_timeout().is_none() {
        warnings.push(
            "distributor.delivery_timeout_ms is 0 - a stuck target can stall every delivery"
                .to_string(),
        );
    }

    if blueprint
        .targets
        .iter()
        .all(|t| t.target_type == TargetType::Log)
    {
        warnings.push("Only log targets configured - messages leave no external trace".to_string());
    }

    for target in &blueprint.targets {
        if target.target_type != TargetType::Log && target.task_timeout_ms.is_none() {
            warnings.push(format!(
                "Target '{}' has no task_timeout_ms - a hung endpoint holds a worker forever",
                target.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Sources: {}", summary.source_count);
            println!("  Targets: {}", summary.target_count);
            println!("  Worker threads: {}", summary.worker_threads);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
