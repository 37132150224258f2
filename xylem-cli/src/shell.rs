// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Interactive shell
//!
//! A rustyline loop over queries and `:commands`. The last compiled
//! query is kept so `:explain` can show its optimizer diagnostics.

use colored::Colorize;
use log::debug;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use xylem::{CompiledQuery, EngineConfig, NameKind, RangeType, Store, Variables};

use crate::output;

pub fn run_once(store: &Store, config: &EngineConfig, query: &str) -> i32 {
    match execute(store, config, query) {
        Ok((compiled, rendered)) => {
            println!("{}", rendered);
            debug!("diagnostics: {:?}", compiled.optimize_diagnostics());
            0
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red(), e);
            1
        }
    }
}

pub fn run_interactive(store: &Store, config: &EngineConfig) -> i32 {
    println!("{}", "Xylem shell. Type :help for commands.".bold());
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{} {}", "error:".red(), e);
            return 1;
        }
    };
    let mut last_query: Option<CompiledQuery> = None;

    loop {
        match editor.readline("xylem> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                if let Some(command) = line.strip_prefix(':') {
                    if !handle_command(store, command, &last_query) {
                        break;
                    }
                } else {
                    match execute(store, config, line) {
                        Ok((compiled, rendered)) => {
                            println!("{}", rendered);
                            last_query = Some(compiled);
                        }
                        Err(e) => eprintln!("{} {}", "error:".red(), e),
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{} {}", "error:".red(), e);
                return 1;
            }
        }
    }
    0
}

/// Returns false when the shell should exit.
fn handle_command(store: &Store, command: &str, last_query: &Option<CompiledQuery>) -> bool {
    let parts: Vec<&str> = command.split_whitespace().collect();
    match parts.as_slice() {
        ["help"] => {
            println!(":collections                         list collections");
            println!(":create <collection>                 create a collection");
            println!(":load <collection> <file>            load an XML document");
            println!(":index <collection> <element|attribute> <name> <type>");
            println!("                                     configure a range index");
            println!(":explain                             optimizer diagnostics of the last query");
            println!(":quit                                exit");
        }
        ["collections"] => {
            for name in store.collection_names() {
                let count = store.documents_in(&name).map(|d| d.len()).unwrap_or(0);
                println!("{}  ({} documents)", name, count);
            }
        }
        ["create", name] => match store.create_collection(name) {
            Ok(()) => println!("Created collection '{}'", name),
            Err(e) => eprintln!("{} {}", "error:".red(), e),
        },
        ["load", collection, file] => {
            match std::fs::read_to_string(file) {
                Ok(xml) => {
                    let name = std::path::Path::new(file)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| file.to_string());
                    match store.load_document(collection, &name, &xml) {
                        Ok(doc) => println!("Loaded {} as {}", name.green(), doc),
                        Err(e) => eprintln!("{} {}", "error:".red(), e),
                    }
                }
                Err(e) => eprintln!("{} {}", "error:".red(), e),
            }
        }
        ["index", collection, kind, name, value_type] => {
            let kind = match *kind {
                "element" => NameKind::Element,
                "attribute" => NameKind::Attribute,
                other => {
                    eprintln!("{} unknown name kind '{}'", "error:".red(), other);
                    return true;
                }
            };
            match value_type.parse::<RangeType>() {
                Ok(value_type) => {
                    match store.configure_range_index(collection, kind, name, value_type) {
                        Ok(()) => println!(
                            "Configured {} range index on {} {} in '{}'",
                            value_type, kind, name, collection
                        ),
                        Err(e) => eprintln!("{} {}", "error:".red(), e),
                    }
                }
                Err(e) => eprintln!("{} {}", "error:".red(), e),
            }
        }
        ["explain"] => match last_query {
            Some(query) => print!("{}", output::render_diagnostics(query)),
            None => println!("No query has run yet."),
        },
        ["quit"] | ["q"] | ["exit"] => return false,
        _ => eprintln!("{} unknown command :{}", "error:".red(), command),
    }
    true
}

fn execute(
    store: &Store,
    config: &EngineConfig,
    query: &str,
) -> Result<(CompiledQuery, String), Box<dyn std::error::Error>> {
    let context = store.root_node_set();
    let mut compiled = CompiledQuery::compile(query)?;
    let result = compiled.eval(store, config, Some(&context), &Variables::new())?;
    let rendered = output::render_sequence(store, &result);
    Ok((compiled, rendered))
}
