//! DOM Extractor (distilled) — keeps only visible or interactive
//! elements with a fixed attribute subset, §4.3.

use super::{parse_state_flag, Extractor};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::model::{normalize_name, Node, Origin, Role, StateTree};
use crate::page::{DomWalkOptions, PageHandle, RawDomNode};
use async_trait::async_trait;

/// Text on a leaf is capped independently of the name cap (§4.3:
/// "length-capped (default 240 chars per node)").
const DOM_TEXT_CAP: usize = 240;

/// The bounded data-attribute subset kept per node (§4.3).
const KEPT_DATA_ATTRS: &[&str] = &["data-testid", "name", "type"];

pub struct DomExtractor;

#[async_trait]
impl Extractor for DomExtractor {
    async fn extract(&self, page: &dyn PageHandle, config: &SessionConfig) -> Result<StateTree> {
        let raw = page
            .dom_walk(DomWalkOptions {
                max_text_len: DOM_TEXT_CAP,
            })
            .await
            .map_err(|e| crate::error::BrowserLensError::PageUnavailable(e.0))?;

        let children = convert_children(std::slice::from_ref(&raw.root), config.name_length_cap);
        let root = Node::new(Role::Document, Origin::Dom).with_children(children);
        Ok(StateTree::new(root))
    }
}

fn qualifies(raw: &RawDomNode) -> bool {
    raw.visible || raw.interactive
}

/// Role computed from the fixed ARIA-or-tag fallback table used when a
/// node carries no explicit `role=*`.
fn role_from_tag(tag: &str) -> Role {
    match tag.to_lowercase().as_str() {
        "button" => Role::Button,
        "a" => Role::Link,
        "input" | "textarea" => Role::Textbox,
        "select" => Role::Option,
        "table" => Role::Table,
        "tr" => Role::Row,
        "td" | "th" => Role::Cell,
        "ul" | "ol" => Role::List,
        "li" => Role::Listitem,
        "img" => Role::Image,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Role::Heading,
        "form" => Role::Form,
        "main" => Role::Main,
        "dialog" => Role::Dialog,
        _ => Role::Generic,
    }
}

pub(crate) fn convert_children(raw_siblings: &[RawDomNode], name_cap: usize) -> Vec<Node> {
    let mut out = Vec::new();
    for raw in raw_siblings {
        if qualifies(raw) {
            out.push(convert_node(raw, name_cap));
        } else {
            out.extend(convert_children(&raw.children, name_cap));
        }
    }
    out
}

fn convert_node(raw: &RawDomNode, name_cap: usize) -> Node {
    let role = raw
        .role
        .as_deref()
        .map(Role::parse)
        .unwrap_or_else(|| role_from_tag(&raw.tag));

    // An explicit accessible name is capped like any other node name;
    // a bare text leaf (no accessible name) uses the text-specific cap.
    let name = match &raw.name {
        Some(explicit) => normalize_name(explicit, name_cap),
        None => normalize_name(raw.text.as_deref().unwrap_or(""), DOM_TEXT_CAP),
    };

    let mut state = std::collections::BTreeSet::new();
    for (prop_name, value) in &raw.properties {
        if *value {
            if let Some(flag) = parse_state_flag(prop_name) {
                state.insert(flag);
            }
        }
    }

    let mut node = Node::new(role, Origin::Dom).with_name(name);
    node.value = raw.value.clone();
    node.state = state;
    node.level = raw.level;
    node.bounds = raw.bounds;
    node.data_attrs = raw
        .data_attrs
        .iter()
        .filter(|(k, _)| KEPT_DATA_ATTRS.contains(&k.as_str()))
        .cloned()
        .collect();
    node.children = convert_children(&raw.children, name_cap);
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::RawDom;
    use crate::testing::FakePage;

    #[tokio::test]
    async fn invisible_non_interactive_nodes_are_dropped_but_children_kept() {
        let mut page = FakePage::new("https://x.com/");
        page.dom = RawDom {
            root: RawDomNode {
                tag: "div".to_string(),
                visible: true,
                children: vec![RawDomNode {
                    tag: "div".to_string(),
                    visible: false,
                    interactive: false,
                    children: vec![RawDomNode {
                        tag: "button".to_string(),
                        name: Some("Go".to_string()),
                        interactive: true,
                        visible: true,
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            },
            node_count: 3,
            interactive_count: 1,
            max_depth: 2,
        };
        let config = SessionConfig::default();
        let tree = DomExtractor.extract(&page, &config).await.unwrap();

        assert_eq!(tree.root.children.len(), 1);
        assert_eq!(tree.root.children[0].children.len(), 1);
        assert_eq!(tree.root.children[0].children[0].role, Role::Button);
    }

    #[tokio::test]
    async fn tag_is_used_to_compute_role_when_no_explicit_role() {
        let mut page = FakePage::new("https://x.com/");
        page.dom = RawDom {
            root: RawDomNode {
                tag: "a".to_string(),
                name: Some("Cart".to_string()),
                visible: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let config = SessionConfig::default();
        let tree = DomExtractor.extract(&page, &config).await.unwrap();
        assert_eq!(tree.root.children[0].role, Role::Link);
    }

    #[tokio::test]
    async fn textual_leaf_falls_back_to_text_for_name() {
        let mut page = FakePage::new("https://x.com/");
        page.dom = RawDom {
            root: RawDomNode {
                tag: "span".to_string(),
                text: Some("  Hello   world  ".to_string()),
                visible: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let config = SessionConfig::default();
        let tree = DomExtractor.extract(&page, &config).await.unwrap();
        assert_eq!(tree.root.children[0].name, "Hello world");
    }

    #[tokio::test]
    async fn only_the_kept_data_attributes_survive() {
        let mut page = FakePage::new("https://x.com/");
        page.dom = RawDom {
            root: RawDomNode {
                tag: "input".to_string(),
                visible: true,
                data_attrs: vec![
                    ("data-testid".to_string(), "search-box".to_string()),
                    ("name".to_string(), "q".to_string()),
                    ("type".to_string(), "text".to_string()),
                    ("data-tracking-id".to_string(), "xyz".to_string()),
                ],
                ..Default::default()
            },
            ..Default::default()
        };
        let config = SessionConfig::default();
        let tree = DomExtractor.extract(&page, &config).await.unwrap();
        let mut attrs = tree.root.children[0].data_attrs.clone();
        attrs.sort();
        assert_eq!(
            attrs,
            vec![
                ("data-testid".to_string(), "search-box".to_string()),
                ("name".to_string(), "q".to_string()),
                ("type".to_string(), "text".to_string()),
            ]
        );
    }
}
