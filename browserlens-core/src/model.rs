//! The `StateTree` / `Node` / `Signals` data model, §3 of the design doc.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Session-stable short token naming a semantic node across steps.
/// Never reused for a different semantic identity within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ref(pub u32);

/// Reserved ref for the synthetic document root. Never handed out by the
/// reference manager's `@e1..` counter; exists so "parent ref" fields on
/// `added`/`moved` entries always have a value, even for top-level nodes.
pub const ROOT_REF: Ref = Ref(0);

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@e{}", self.0)
    }
}

/// Accessibility role vocabulary. `Other` accepts roles the enum doesn't
/// name yet without breaking the matcher (see design-notes §9).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Generic,
    Document,
    Main,
    Region,
    Form,
    Dialog,
    Heading,
    Button,
    Link,
    Textbox,
    Checkbox,
    Radio,
    Menuitem,
    Tab,
    Tablist,
    Option,
    List,
    Listitem,
    Table,
    Row,
    Cell,
    Image,
    Figure,
    Application,
    Status,
    Timer,
    Marquee,
    Progressbar,
    Carousel,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Generic => "generic",
            Role::Document => "document",
            Role::Main => "main",
            Role::Region => "region",
            Role::Form => "form",
            Role::Dialog => "dialog",
            Role::Heading => "heading",
            Role::Button => "button",
            Role::Link => "link",
            Role::Textbox => "textbox",
            Role::Checkbox => "checkbox",
            Role::Radio => "radio",
            Role::Menuitem => "menuitem",
            Role::Tab => "tab",
            Role::Tablist => "tablist",
            Role::Option => "option",
            Role::List => "list",
            Role::Listitem => "listitem",
            Role::Table => "table",
            Role::Row => "row",
            Role::Cell => "cell",
            Role::Image => "image",
            Role::Figure => "figure",
            Role::Application => "application",
            Role::Status => "status",
            Role::Timer => "timer",
            Role::Marquee => "marquee",
            Role::Progressbar => "progressbar",
            Role::Carousel => "carousel",
            Role::Other(s) => s.as_str(),
        }
    }

    /// Parses the raw accessibility role string from a page handle into
    /// the closed vocabulary, falling back to `Other`.
    pub fn parse(raw: &str) -> Role {
        match raw {
            "generic" | "" => Role::Generic,
            "document" => Role::Document,
            "main" => Role::Main,
            "region" => Role::Region,
            "form" => Role::Form,
            "dialog" => Role::Dialog,
            "heading" => Role::Heading,
            "button" => Role::Button,
            "link" => Role::Link,
            "textbox" => Role::Textbox,
            "checkbox" => Role::Checkbox,
            "radio" => Role::Radio,
            "menuitem" => Role::Menuitem,
            "tab" => Role::Tab,
            "tablist" => Role::Tablist,
            "option" => Role::Option,
            "list" => Role::List,
            "listitem" => Role::Listitem,
            "table" => Role::Table,
            "row" => Role::Row,
            "cell" => Role::Cell,
            "image" | "img" => Role::Image,
            "figure" => Role::Figure,
            "application" => Role::Application,
            "status" => Role::Status,
            "timer" => Role::Timer,
            "marquee" => Role::Marquee,
            "progressbar" => Role::Progressbar,
            "carousel" => Role::Carousel,
            other => Role::Other(other.to_string()),
        }
    }

    /// True for roles that collapse their children into the parent when
    /// the a11y extractor walks the tree (`none`/`presentation`).
    pub fn is_presentational(raw: &str) -> bool {
        matches!(raw, "none" | "presentation")
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a node's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    A11y,
    Dom,
    VisionRegion,
}

/// Unordered state flags a node may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StateFlag {
    Disabled,
    Focused,
    Checked,
    Pressed,
    Selected,
    Expanded,
    Readonly,
    Required,
    Invalid,
    Hidden,
}

/// Axis-aligned bounding rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A single node in a `StateTree`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub role: Role,
    pub name: String,
    pub value: Option<String>,
    pub state: BTreeSet<StateFlag>,
    pub level: Option<i32>,
    pub children: Vec<Node>,
    pub origin: Origin,
    pub bounds: Option<Rect>,
    /// Bounded subset of a DOM node's data attributes kept by the
    /// distilled DOM extractor (§4.3): `data-testid`, `name`, `type`.
    /// Empty for nodes from any other representation.
    pub data_attrs: Vec<(String, String)>,
    #[serde(rename = "ref")]
    pub node_ref: Option<Ref>,
}

impl Node {
    pub fn new(role: Role, origin: Origin) -> Self {
        Self {
            role,
            name: String::new(),
            value: None,
            state: BTreeSet::new(),
            level: None,
            children: Vec::new(),
            origin,
            bounds: None,
            data_attrs: Vec::new(),
            node_ref: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }
}

/// Whitespace-collapses and length-caps a name, per invariant 4 in §3.
pub fn normalize_name(raw: &str, cap: usize) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= cap {
        collapsed
    } else {
        collapsed.chars().take(cap).collect()
    }
}

/// A rooted, ordered tree of `Node`s representing the page, §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTree {
    pub root: Node,
}

impl StateTree {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    /// Depth-first count of all nodes, root included.
    pub fn node_count(&self) -> usize {
        fn count(node: &Node) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }
}

/// Coarse classification of the page used by the `page_kind` rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageKind {
    Form,
    Dashboard,
    Document,
    Listing,
    Unknown,
}

/// Flat record of cheap structural signals produced by the signal probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signals {
    pub has_canvas: bool,
    pub a11y_coverage: f64,
    pub dom_node_count: usize,
    pub dom_max_depth: usize,
    pub dynamic_ratio: Option<f64>,
    pub page_kind: PageKind,
    pub url_origin: String,
}

impl Signals {
    /// Conservative fallback used when a probe errors, biasing the
    /// router toward richer representations (§4.1).
    pub fn conservative_default(url_origin: String) -> Self {
        Self {
            has_canvas: true,
            a11y_coverage: 0.0,
            dom_node_count: usize::MAX,
            dom_max_depth: 0,
            dynamic_ratio: None,
            page_kind: PageKind::Unknown,
            url_origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_collapses_whitespace_and_caps_length() {
        assert_eq!(normalize_name("  a   b\tc\n", 200), "a b c");
        assert_eq!(normalize_name(&"x".repeat(300), 200).chars().count(), 200);
    }

    #[test]
    fn role_roundtrips_through_parse_and_as_str() {
        assert_eq!(Role::parse("button").as_str(), "button");
        assert_eq!(Role::parse("widget-foo").as_str(), "widget-foo");
        assert!(matches!(Role::parse("widget-foo"), Role::Other(_)));
    }

    #[test]
    fn state_tree_node_count_includes_root() {
        let tree = StateTree::new(Node::new(Role::Document, Origin::Dom));
        assert_eq!(tree.node_count(), 1);
    }
}
