use anyhow::Result;
use async_classifier::alias::AliasDescriptor;
use async_classifier::cache::{CacheStats, Classification, ClassificationCache};
use async_classifier::cli::{Cli, Commands};
use async_classifier::config::{resolve_config, resolve_root_hint};
use async_classifier::registry::MethodDescriptor;
use clap::Parser;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    install_subscriber(cli.verbose);

    let config = resolve_config(&cli)?;
    let hint = resolve_root_hint(&cli)?;
    let mut cache = ClassificationCache::new(config);

    match cli.command.clone() {
        Commands::Classify { names } => {
            let results: Vec<ClassifyOutput> = names
                .into_iter()
                .map(|name| {
                    let classification = cache.classify(&name, &hint);
                    ClassifyOutput {
                        name,
                        classification,
                    }
                })
                .collect();
            print_json(&results)?;
        }
        Commands::Resolve { name } => {
            print_json(&cache.resolve(&name, &hint))?;
        }
        Commands::Alias { name } => {
            print_json(&cache.is_alias(&name, &hint))?;
        }
        Commands::Stats => {
            cache.prepare(&hint);
            print_json(&cache.stats())?;
        }
        Commands::Dump => {
            cache.prepare(&hint);
            let state = cache.state();
            let output = DumpOutput {
                stats: cache.stats(),
                methods: state.registry().methods().collect(),
                named_types: state.registry().named_type_names().collect(),
                aliases: state.aliases().iter().collect(),
            };
            print_json(&output)?;
        }
    }

    Ok(())
}

fn install_subscriber(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct ClassifyOutput {
    name: String,
    #[serde(flatten)]
    classification: Classification,
}

#[derive(Debug, Serialize)]
struct DumpOutput<'a> {
    stats: CacheStats,
    methods: BTreeMap<&'a str, &'a MethodDescriptor>,
    named_types: Vec<&'a str>,
    aliases: BTreeMap<&'a str, &'a AliasDescriptor>,
}
