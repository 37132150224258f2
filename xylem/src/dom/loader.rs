// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! XML document loading
//!
//! Parses XML text into the flat pre-order record array of
//! [`Document`](super::Document). Namespace prefixes are stripped; names
//! are stored as local names. Whitespace-only text is dropped.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::errors::DomError;
use super::node::{DocId, NodeKind, NodeRec};

/// Parse `xml` into a record array, document node at pre 0.
pub(crate) fn parse_nodes(xml: &str) -> Result<Vec<NodeRec>, DomError> {
    let mut reader = Reader::from_str(xml);
    let mut nodes: Vec<NodeRec> = vec![NodeRec {
        kind: NodeKind::Document,
        name: None,
        value: None,
        parent: None,
        size: 0,
    }];
    // Pre values of currently open elements, document node at the bottom
    let mut open: Vec<u32> = vec![0];
    let mut seen_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if open.len() == 1 && seen_root {
                    return Err(DomError::malformed("multiple root elements"));
                }
                seen_root = true;
                let pre = push_element(&mut nodes, &mut open, local_name(e.name().as_ref()))?;
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| DomError::malformed(e.to_string()))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|e| DomError::malformed(e.to_string()))?;
                    push_attribute(
                        &mut nodes,
                        pre,
                        local_name(attr.key.as_ref()),
                        value.into_owned(),
                    );
                }
                open.push(pre);
            }
            Event::Empty(e) => {
                if open.len() == 1 && seen_root {
                    return Err(DomError::malformed("multiple root elements"));
                }
                seen_root = true;
                let pre = push_element(&mut nodes, &mut open, local_name(e.name().as_ref()))?;
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| DomError::malformed(e.to_string()))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|e| DomError::malformed(e.to_string()))?;
                    push_attribute(
                        &mut nodes,
                        pre,
                        local_name(attr.key.as_ref()),
                        value.into_owned(),
                    );
                }
                close_element(&mut nodes, pre);
            }
            Event::End(_) => {
                let pre = open
                    .pop()
                    .filter(|&p| p != 0)
                    .ok_or_else(|| DomError::malformed("unbalanced end tag"))?;
                close_element(&mut nodes, pre);
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| DomError::malformed(e.to_string()))?;
                push_text(&mut nodes, &mut open, text.as_ref())?;
            }
            Event::CData(t) => {
                let raw = t.into_inner().into_owned();
                let text = String::from_utf8_lossy(&raw).into_owned();
                push_text(&mut nodes, &mut open, &text)?;
            }
            Event::Eof => break,
            // Declarations, comments and processing instructions are not stored
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if open.len() != 1 {
        return Err(DomError::malformed("unclosed element"));
    }
    if !seen_root {
        return Err(DomError::malformed("no root element"));
    }
    nodes[0].size = (nodes.len() - 1) as u32;
    Ok(nodes)
}

fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

fn push_element(
    nodes: &mut Vec<NodeRec>,
    open: &mut [u32],
    name: String,
) -> Result<u32, DomError> {
    let parent = *open.last().ok_or_else(|| DomError::malformed("no parent"))?;
    let pre = nodes.len() as u32;
    nodes.push(NodeRec {
        kind: NodeKind::Element,
        name: Some(name),
        value: None,
        parent: Some(parent),
        size: 0,
    });
    Ok(pre)
}

fn push_attribute(nodes: &mut Vec<NodeRec>, owner: u32, name: String, value: String) {
    nodes.push(NodeRec {
        kind: NodeKind::Attribute,
        name: Some(name),
        value: Some(value),
        parent: Some(owner),
        size: 0,
    });
}

fn push_text(nodes: &mut Vec<NodeRec>, open: &mut [u32], text: &str) -> Result<(), DomError> {
    if text.trim().is_empty() {
        return Ok(());
    }
    let parent = *open.last().ok_or_else(|| DomError::malformed("no parent"))?;
    if parent == 0 {
        return Err(DomError::malformed("text outside root element"));
    }
    nodes.push(NodeRec {
        kind: NodeKind::Text,
        name: None,
        value: Some(text.to_string()),
        parent: Some(parent),
        size: 0,
    });
    Ok(())
}

fn close_element(nodes: &mut [NodeRec], pre: u32) {
    let size = (nodes.len() as u32) - pre - 1;
    nodes[pre as usize].size = size;
}

/// Parse `xml` into a standalone [`Document`](super::Document).
pub fn parse_document(
    id: DocId,
    name: &str,
    collection: &str,
    xml: &str,
) -> Result<super::Document, DomError> {
    let nodes = parse_nodes(xml)?;
    Ok(super::Document::new(
        id,
        name.to_string(),
        collection.to_string(),
        nodes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::NodeKind;

    #[test]
    fn parses_nested_elements_with_attributes() {
        let doc = parse_document(
            DocId(1),
            "t.xml",
            "db",
            r#"<library><book id="b1"><title>Dune</title></book></library>"#,
        )
        .unwrap();

        assert_eq!(doc.node(0).unwrap().kind, NodeKind::Document);
        assert_eq!(doc.node(1).unwrap().name.as_deref(), Some("library"));
        assert_eq!(doc.node(2).unwrap().name.as_deref(), Some("book"));
        assert_eq!(doc.node(3).unwrap().kind, NodeKind::Attribute);
        assert_eq!(doc.node(3).unwrap().value.as_deref(), Some("b1"));
        assert_eq!(doc.node(4).unwrap().name.as_deref(), Some("title"));
        assert_eq!(doc.node(5).unwrap().kind, NodeKind::Text);
        assert_eq!(doc.string_value(2), "Dune");
        // book subtree: attribute, title, text
        assert_eq!(doc.node(2).unwrap().size, 3);
        assert_eq!(doc.node(0).unwrap().size, 5);
    }

    #[test]
    fn parses_self_closing_elements() {
        let doc = parse_document(DocId(1), "t.xml", "db", r#"<a><b x="1"/><c/></a>"#).unwrap();
        assert_eq!(doc.node(2).unwrap().name.as_deref(), Some("b"));
        assert_eq!(doc.node(2).unwrap().size, 1);
        assert_eq!(doc.node(4).unwrap().name.as_deref(), Some("c"));
        assert_eq!(doc.node(4).unwrap().size, 0);
    }

    #[test]
    fn drops_whitespace_only_text() {
        let doc = parse_document(DocId(1), "t.xml", "db", "<a>\n  <b>x</b>\n</a>").unwrap();
        // document, a, b, text — no whitespace records
        assert_eq!(doc.len(), 4);
    }

    #[test]
    fn strips_namespace_prefixes() {
        let doc = parse_document(
            DocId(1),
            "t.xml",
            "db",
            r#"<x:a xmlns:x="urn:x"><x:b/></x:a>"#,
        )
        .unwrap();
        assert_eq!(doc.node(1).unwrap().name.as_deref(), Some("a"));
    }

    #[test]
    fn rejects_unbalanced_markup() {
        assert!(parse_document(DocId(1), "t.xml", "db", "<a><b></a>").is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_document(DocId(1), "t.xml", "db", "").is_err());
    }
}
