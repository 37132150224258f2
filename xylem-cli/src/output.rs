// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Result and diagnostics rendering

use comfy_table::{presets::UTF8_FULL, Cell, Table};
use xylem::{CompiledQuery, NodeKind, Sequence, Store, Value};

/// Render an evaluation result as a table of items
pub fn render_sequence(store: &Store, seq: &Sequence) -> String {
    if seq.is_empty() {
        return "empty sequence".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "item", "value"]);
    for (i, item) in seq.items().iter().enumerate() {
        let (kind, value) = match item {
            Value::Node(n) => {
                let label = match store.node(*n) {
                    Some(rec) => match rec.kind {
                        NodeKind::Document => format!("document {}", n.doc),
                        NodeKind::Element => {
                            format!("<{}>", rec.name.unwrap_or_default())
                        }
                        NodeKind::Attribute => {
                            format!("@{}", rec.name.unwrap_or_default())
                        }
                        NodeKind::Text => "text()".to_string(),
                    },
                    None => "gone".to_string(),
                };
                (label, store.string_value(*n))
            }
            Value::String(s) => ("string".to_string(), s.clone()),
            Value::Integer(n) => ("integer".to_string(), n.to_string()),
            Value::Double(d) => ("double".to_string(), d.to_string()),
            Value::Boolean(b) => ("boolean".to_string(), b.to_string()),
        };
        table.add_row(vec![Cell::new(i + 1), Cell::new(kind), Cell::new(value)]);
    }
    format!("{}\n{} item(s)", table, seq.len())
}

/// Render the optimizer diagnostics of a compiled query
pub fn render_diagnostics(query: &CompiledQuery) -> String {
    let diagnostics = query.optimize_diagnostics();
    if diagnostics.is_empty() {
        return "No optimization pragma in the last query.\n".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "pragma",
        "chain",
        "context step",
        "checks",
        "cache hits",
        "optimized",
        "fallback",
    ]);
    for (i, d) in diagnostics.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i),
            Cell::new(d.chain_len),
            Cell::new(if d.has_context_step { "yes" } else { "no" }),
            Cell::new(d.feasibility_checks),
            Cell::new(d.cache_hits),
            Cell::new(d.optimized_evals),
            Cell::new(d.fallback_evals),
        ]);
    }
    format!("{}\n", table)
}
