use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use ingress_router::routing::{normalize_host, RouteTable};
use ingress_router::source::Manifest;

#[derive(Parser)]
#[command(name = "ingress-cli")]
#[command(about = "Inspect ingress manifests offline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a manifest and print the route table it produces
    Check { manifest: PathBuf },
    /// Resolve a host and path against a manifest
    Match {
        manifest: PathBuf,
        host: String,
        path: String,
    },
}

fn build_table(path: &PathBuf) -> Result<(RouteTable, usize), Box<dyn std::error::Error>> {
    let manifest = Manifest::load(path)?;
    let rejected = manifest.rejected();
    let snapshot: Vec<_> = manifest.into_map().into_values().map(Arc::new).collect();
    Ok((RouteTable::build(&snapshot, 1), rejected))
}

fn describe(table: &RouteTable) -> Value {
    let hosts: BTreeMap<_, _> = table
        .hosts()
        .map(|(host, routes)| {
            let routes: Vec<_> = routes
                .iter()
                .map(|r| {
                    json!({
                        "path": r.path_prefix,
                        "ingress": format!("{}/{}", r.namespace, r.name),
                        "backend": &*r.backend,
                    })
                })
                .collect();
            (host.to_string(), routes)
        })
        .collect();
    json!(hosts)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { manifest } => {
            let (table, rejected) = build_table(&manifest)?;
            let report = json!({
                "hosts": table.host_count(),
                "routes": table.route_count(),
                "rejected_entries": rejected,
                "table": describe(&table),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            if rejected > 0 {
                std::process::exit(1);
            }
        }
        Commands::Match { manifest, host, path } => {
            let (table, _) = build_table(&manifest)?;
            let result = match table.lookup(&normalize_host(&host), &path) {
                Some(entry) => json!({
                    "found": true,
                    "namespace": &*entry.namespace,
                    "name": &*entry.name,
                    "backend": &*entry.backend,
                }),
                None => json!({ "found": false }),
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
