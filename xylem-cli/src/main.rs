// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Xylem command-line interface
//!
//! Loads XML documents into collections, configures range indexes, and
//! runs queries interactively or one-shot.

mod output;
mod shell;

use clap::Parser;
use colored::Colorize;
use xylem::{EngineConfig, EnforcementMode, Store};

/// Xylem - a native XML database with structural index optimization
#[derive(Parser, Debug)]
#[command(name = "xylem", version, about)]
struct Cli {
    /// XML files to load into the "db" collection at startup
    #[arg(value_name = "FILE")]
    files: Vec<std::path::PathBuf>,

    /// Run one query and exit instead of starting the shell
    #[arg(short, long, value_name = "QUERY")]
    query: Option<String>,

    /// Range-index enforcement mode: default or always
    #[arg(long, default_value = "default")]
    enforcement: String,

    /// Disable the optimizer for pragmas without an explicit enable key
    #[arg(long)]
    no_optimize: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let enforcement = match cli.enforcement.as_str() {
        "default" => EnforcementMode::Default,
        "always" => EnforcementMode::Always,
        other => {
            eprintln!("{} unknown enforcement mode '{}'", "error:".red(), other);
            std::process::exit(2);
        }
    };
    let config = EngineConfig {
        enforcement,
        optimize_by_default: !cli.no_optimize,
    };

    let store = Store::new();
    if let Err(e) = store.create_collection("db") {
        eprintln!("{} {}", "error:".red(), e);
        std::process::exit(1);
    }

    for file in &cli.files {
        match load_file(&store, file) {
            Ok(name) => println!("Loaded {} into 'db'", name.green()),
            Err(e) => {
                eprintln!("{} loading {}: {}", "error:".red(), file.display(), e);
                std::process::exit(1);
            }
        }
    }

    let exit = match cli.query {
        Some(query) => shell::run_once(&store, &config, &query),
        None => shell::run_interactive(&store, &config),
    };
    std::process::exit(exit);
}

fn load_file(store: &Store, path: &std::path::Path) -> Result<String, Box<dyn std::error::Error>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.xml".to_string());
    let xml = std::fs::read_to_string(path)?;
    store.load_document("db", &name, &xml)?;
    Ok(name)
}
