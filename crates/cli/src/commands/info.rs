//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{DistributorBlueprint, TargetType};

use crate::cli::InfoArgs;

use super::load_blueprint;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    distributor: DistributorInfo,
    sources: Vec<EndpointInfo>,
    targets: Vec<TargetInfo>,
}

#[derive(Serialize)]
struct DistributorInfo {
    queue_capacity: usize,
    pacing_delay_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    delivery_timeout_ms: Option<u64>,
    shutdown_code: i32,
}

#[derive(Serialize)]
struct EndpointInfo {
    name: String,
    kind: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct TargetInfo {
    #[serde(flatten)]
    endpoint: EndpointInfo,
    /// `None` for targets that process inline
    #[serde(skip_serializing_if = "Option::is_none")]
    pool_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_timeout_ms: Option<u64>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config)?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &DistributorBlueprint, args: &InfoArgs) -> ConfigInfo {
    let params = |map: &std::collections::HashMap<String, String>| -> BTreeMap<String, String> {
        if args.params {
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        } else {
            BTreeMap::new()
        }
    };

    let sources = blueprint
        .sources
        .iter()
        .map(|s| EndpointInfo {
            name: s.name.clone(),
            kind: format!("{:?}", s.source_type),
            params: params(&s.params),
        })
        .collect();

    let targets = blueprint
        .targets
        .iter()
        .map(|t| {
            let pooled = t.target_type != TargetType::Log;
            TargetInfo {
                endpoint: EndpointInfo {
                    name: t.name.clone(),
                    kind: format!("{:?}", t.target_type),
                    params: params(&t.params),
                },
                pool_size: pooled.then_some(t.pool_size),
                task_timeout_ms: t.task_timeout_ms,
            }
        })
        .collect();

    let settings = &blueprint.distributor;
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        distributor: DistributorInfo {
            queue_capacity: settings.queue_capacity,
            pacing_delay_secs: settings.pacing_delay_secs,
            delivery_timeout_ms: settings
                .delivery_timeout()
                .map(|limit| limit.as_millis() as u64),
            shutdown_code: settings.shutdown_code.0,
        },
        sources,
        targets,
    }
}

fn print_config_info(blueprint: &DistributorBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Alert Distributor Configuration                ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let settings = &blueprint.distributor;
    println!("⚙️  Distributor");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Queue capacity: {}", settings.queue_capacity);
    println!("   ├─ Pacing delay: {}s", settings.pacing_delay_secs);
    match settings.delivery_timeout() {
        Some(limit) => println!("   ├─ Delivery timeout: {}ms", limit.as_millis()),
        None => println!("   ├─ Delivery timeout: none"),
    }
    println!("   └─ Shutdown code: {}", settings.shutdown_code);

    println!("\n📥 Sources ({})", blueprint.sources.len());
    for (i, source) in blueprint.sources.iter().enumerate() {
        let is_last = i == blueprint.sources.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };
        println!("   {} {} ({:?})", prefix, source.name, source.source_type);
        if args.params {
            print_params(child_prefix, &source.params);
        }
    }

    println!("\n📤 Targets ({})", blueprint.targets.len());
    for (i, target) in blueprint.targets.iter().enumerate() {
        let is_last = i == blueprint.targets.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        if target.target_type == TargetType::Log {
            println!("   {} {} (Log, inline)", prefix, target.name);
        } else {
            let timeout = target
                .task_timeout_ms
                .map(|ms| format!("{ms}ms"))
                .unwrap_or_else(|| "none".to_string());
            println!(
                "   {} {} ({:?}, {} workers, task timeout {})",
                prefix, target.name, target.target_type, target.pool_size, timeout
            );
        }
        if args.params {
            print_params(child_prefix, &target.params);
        }
    }

    println!();
}

fn print_params(child_prefix: &str, params: &std::collections::HashMap<String, String>) {
    let sorted: BTreeMap<_, _> = params.iter().collect();
    for (j, (key, value)) in sorted.iter().enumerate() {
        let prefix = if j == sorted.len() - 1 { "└─" } else { "├─" };
        println!("   {}  {} {} = {}", child_prefix, prefix, key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};
    use std::path::PathBuf;

    fn blueprint() -> DistributorBlueprint {
        ConfigLoader::load_from_str(
            r#"
[[sources]]
name = "alerts"
source_type = "tcp_lines"
params = { bind = "127.0.0.1:9000" }

[[targets]]
name = "debug"
target_type = "log"

[[targets]]
name = "graphite"
target_type = "graphite"
pool_size = 4
task_timeout_ms = 2000
params = { addr = "127.0.0.1:2003", namespace = "alerts" }
"#,
            ConfigFormat::Toml,
        )
        .unwrap()
    }

    fn args(params: bool) -> InfoArgs {
        InfoArgs {
            config: PathBuf::from("distributor.toml"),
            json: true,
            params,
        }
    }

    #[test]
    fn test_info_json_shape() {
        let info = build_config_info(&blueprint(), &args(false));
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["distributor"]["queue_capacity"], 1000);
        assert_eq!(json["sources"][0]["kind"], "TcpLines");
        assert!(json["targets"][0].get("pool_size").is_none());
        assert_eq!(json["targets"][1]["pool_size"], 4);
        assert_eq!(json["targets"][1]["task_timeout_ms"], 2000);
        assert!(json["targets"][1].get("params").is_none());
    }

    #[test]
    fn test_info_includes_params_on_request() {
        let info = build_config_info(&blueprint(), &args(true));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["targets"][1]["params"]["namespace"], "alerts");
    }
}
