//! A11Y Extractor — walks the full accessibility tree, dropping
//! `none`/`presentation` nodes and collapsing their children into the
//! parent, §4.3.

use super::{parse_state_flag, Extractor};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::model::{normalize_name, Node, Origin, Role, StateTree};
use crate::page::{A11ySnapshotOptions, PageHandle, RawA11yNode};
use async_trait::async_trait;

pub struct A11yExtractor;

#[async_trait]
impl Extractor for A11yExtractor {
    async fn extract(&self, page: &dyn PageHandle, config: &SessionConfig) -> Result<StateTree> {
        let raw = page
            .accessibility_snapshot(A11ySnapshotOptions {
                interactive_only: false,
            })
            .await
            .map_err(|e| crate::error::BrowserLensError::PageUnavailable(e.0))?;

        let children = convert_children(std::slice::from_ref(&raw.root), config.name_length_cap);
        let root = Node::new(Role::Document, Origin::A11y).with_children(children);
        Ok(StateTree::new(root))
    }
}

/// Converts a slice of raw a11y siblings into normalized `Node`s,
/// splicing the children of `none`/`presentation` nodes directly into
/// the returned list in place of the presentational node itself.
pub(crate) fn convert_children(raw_siblings: &[RawA11yNode], name_cap: usize) -> Vec<Node> {
    let mut out = Vec::new();
    for raw in raw_siblings {
        if Role::is_presentational(&raw.role) {
            out.extend(convert_children(&raw.children, name_cap));
        } else {
            out.push(convert_node(raw, name_cap));
        }
    }
    out
}

fn convert_node(raw: &RawA11yNode, name_cap: usize) -> Node {
    let role = Role::parse(&raw.role);
    let mut state = std::collections::BTreeSet::new();
    for (prop_name, value) in &raw.properties {
        if *value {
            if let Some(flag) = parse_state_flag(prop_name) {
                state.insert(flag);
            }
        }
    }
    let mut node = Node::new(role, Origin::A11y)
        .with_name(normalize_name(raw.name.as_deref().unwrap_or(""), name_cap));
    node.value = raw.value.clone();
    node.state = state;
    node.level = raw.level;
    node.bounds = raw.bounds;
    node.children = convert_children(&raw.children, name_cap);
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::RawA11yTree;
    use crate::testing::FakePage;

    fn leaf(role: &str, name: &str) -> RawA11yNode {
        RawA11yNode {
            role: role.to_string(),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn presentational_nodes_collapse_their_children_into_the_parent() {
        let mut page = FakePage::new("https://x.com/");
        page.a11y_tree = RawA11yTree {
            root: RawA11yNode {
                role: "presentation".to_string(),
                children: vec![leaf("button", "Go")],
                ..Default::default()
            },
            interactive_count: 1,
        };
        let config = SessionConfig::default();
        let tree = A11yExtractor.extract(&page, &config).await.unwrap();

        assert_eq!(tree.root.children.len(), 1);
        assert_eq!(tree.root.children[0].role, Role::Button);
        assert_eq!(tree.root.children[0].name, "Go");
    }

    #[tokio::test]
    async fn focused_flag_is_preserved() {
        let mut page = FakePage::new("https://x.com/");
        page.a11y_tree = RawA11yTree {
            root: RawA11yNode {
                role: "textbox".to_string(),
                name: Some("Search".to_string()),
                properties: vec![("focused".to_string(), true)],
                ..Default::default()
            },
            interactive_count: 1,
        };
        let config = SessionConfig::default();
        let tree = A11yExtractor.extract(&page, &config).await.unwrap();

        assert!(tree.root.children[0]
            .state
            .contains(&crate::model::StateFlag::Focused));
    }

    #[tokio::test]
    async fn name_is_normalized_with_configured_cap() {
        let mut page = FakePage::new("https://x.com/");
        page.a11y_tree = RawA11yTree {
            root: RawA11yNode {
                role: "button".to_string(),
                name: Some("  a   b  ".to_string()),
                ..Default::default()
            },
            interactive_count: 1,
        };
        let config = SessionConfig::default();
        let tree = A11yExtractor.extract(&page, &config).await.unwrap();
        assert_eq!(tree.root.children[0].name, "a b");
    }
}
