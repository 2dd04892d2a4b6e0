//! Mutable document tree used as the "live page".
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Detached nodes
//! stay in the arena but are no longer reachable from the root, so a stale
//! id never aliases a different node until [`Document::compact`] renumbers
//! the arena.

use scraper::{ElementRef, Html, Node};
use std::fmt::Write as _;

/// Elements whose text is never rendered as page text
pub const NON_RENDERED_TAGS: [&str; 3] = ["script", "style", "noscript"];

const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "param", "source", "track", "wbr",
];

const RAW_TEXT_TAGS: [&str; 5] = ["script", "style", "noscript", "xmp", "iframe"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Root,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeEntry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeEntry>,
    has_doctype: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document holding only the root node
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeEntry {
                data: NodeData::Root,
                parent: None,
                children: Vec::new(),
            }],
            has_doctype: false,
        }
    }

    /// Parse a full HTML document
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut document = Self::new();
        document.has_doctype = parsed.tree.root().children().any(|c| c.value().is_doctype());
        let root = document.root();
        document.import_element(parsed.root_element(), root);
        document
    }

    fn import_element(&mut self, element: ElementRef<'_>, parent: NodeId) {
        let data = ElementData {
            name: element.value().name().to_string(),
            attrs: element
                .value()
                .attrs()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        };
        let id = self.create_element(data);
        self.append_child(parent, id);

        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    let text: &str = text;
                    let node = self.create_text(text);
                    self.append_child(id, node);
                }
                Node::Comment(comment) => {
                    let comment: &str = comment;
                    let node = self.push(NodeData::Comment(comment.to_string()));
                    self.append_child(id, node);
                }
                Node::Element(_) => {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        self.import_element(child_element, id);
                    }
                }
                _ => {}
            }
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(NodeEntry {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Create a detached element
    pub fn create_element(&mut self, data: ElementData) -> NodeId {
        self.push(NodeData::Element(data))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `node` as the previous sibling of `reference`.
    ///
    /// Returns `None` when `reference` has no parent.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> Option<()> {
        let parent = self.parent(reference)?;
        self.detach(node);
        let position = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == reference)?;
        self.nodes[parent.0].children.insert(position, node);
        self.nodes[node.0].parent = Some(parent);
        Some(())
    }

    /// Remove a node (and its subtree) from its parent
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Put `replacement` where `old` was and detach `old`
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) -> Option<()> {
        self.insert_before(old, replacement)?;
        self.detach(old);
        Some(())
    }

    /// Merge adjacent text children and drop empty ones
    pub fn normalize(&mut self, id: NodeId) {
        let children = self.nodes[id.0].children.clone();
        let mut kept = Vec::with_capacity(children.len());
        let mut last_text: Option<NodeId> = None;

        for child in children {
            match self.text(child).map(str::to_string) {
                Some(text) if text.is_empty() => {
                    self.nodes[child.0].parent = None;
                }
                Some(text) => match last_text {
                    Some(previous) => {
                        if let NodeData::Text(existing) = &mut self.nodes[previous.0].data {
                            existing.push_str(&text);
                        }
                        self.nodes[child.0].parent = None;
                    }
                    None => {
                        last_text = Some(child);
                        kept.push(child);
                    }
                },
                None => {
                    last_text = None;
                    kept.push(child);
                }
            }
        }

        self.nodes[id.0].children = kept;
    }

    /// Number of arena entries, detached ones included
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Drop detached nodes and renumber the rest in document order.
    /// Every `NodeId` taken before the call is invalidated. Returns the
    /// number of entries freed.
    pub fn compact(&mut self) -> usize {
        let order = self.descendants(self.root());
        let mut remap = vec![None; self.nodes.len()];
        for (new, old) in order.iter().enumerate() {
            remap[old.0] = Some(NodeId(new));
        }

        let before = self.nodes.len();
        let mut old_nodes: Vec<Option<NodeEntry>> = std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        self.nodes = order
            .iter()
            .filter_map(|old| {
                let mut entry = old_nodes[old.0].take()?;
                entry.parent = entry.parent.and_then(|p| remap[p.0]);
                entry.children = entry.children.iter().filter_map(|c| remap[c.0]).collect();
                Some(entry)
            })
            .collect();

        before - self.nodes.len()
    }

    /// All nodes under `id` (inclusive) in document order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Text nodes under `id` in document order
    pub fn text_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| matches!(self.data(n), NodeData::Text(_)))
            .collect()
    }

    /// Nearest-first chain of element ancestors
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// Concatenated text of every text node under `id`
    pub fn text_content(&self, id: NodeId) -> String {
        self.text_nodes(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Elements carrying `class`, in document order
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|&n| self.element(n).map(|e| e.has_class(class)).unwrap_or(false))
            .collect()
    }

    /// First element with the given tag name
    pub fn find_element(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&n| self.tag_name(n) == Some(name))
    }

    /// The `<body>` element, or the root for fragments built by hand
    pub fn body(&self) -> NodeId {
        self.find_element("body").unwrap_or_else(|| self.root())
    }

    /// Serialize the tree back to HTML
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if self.has_doctype {
            out.push_str("<!DOCTYPE html>");
        }
        for &child in self.children(self.root()) {
            self.write_node(child, false, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match self.data(id) {
            NodeData::Root => {
                for &child in self.children(id) {
                    self.write_node(child, false, out);
                }
            }
            NodeData::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    escape_into(text, false, out);
                }
            }
            NodeData::Comment(comment) => {
                let _ = write!(out, "<!--{}-->", comment);
            }
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (key, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&element.name.as_str()) {
                    return;
                }
                let raw = RAW_TEXT_TAGS.contains(&element.name.as_str());
                for &child in self.children(id) {
                    self.write_node(child, raw, out);
                }
                let _ = write!(out, "</{}>", element.name);
            }
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str) -> ElementData {
        ElementData {
            name: name.to_string(),
            attrs: Vec::new(),
        }
    }

    #[test]
    fn test_parse_and_serialize() {
        let doc = Document::parse(
            "<!DOCTYPE html><html><head><title>T</title></head><body><p class=\"a b\">Fish &amp; chips</p><script>if (a < b) {}</script></body></html>",
        );
        let p = doc.elements_with_class("b")[0];
        assert_eq!(doc.tag_name(p), Some("p"));
        assert_eq!(doc.text_content(p), "Fish & chips");

        let html = doc.to_html();
        assert!(html.starts_with("<!DOCTYPE html><html>"));
        assert!(html.contains("<p class=\"a b\">Fish &amp; chips</p>"));
        assert!(html.contains("<script>if (a < b) {}</script>"));
    }

    #[test]
    fn test_insert_before_and_normalize() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element(element("p"));
        doc.append_child(root, p);
        let middle = doc.create_text("b");
        doc.append_child(p, middle);

        let first = doc.create_text("a");
        doc.insert_before(middle, first).unwrap();
        let empty = doc.create_text("");
        doc.append_child(p, empty);
        let last = doc.create_text("c");
        doc.append_child(p, last);
        assert_eq!(doc.children(p).len(), 4);

        doc.normalize(p);
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text(doc.children(p)[0]), Some("abc"));
        assert_eq!(doc.parent(last), None);
    }

    #[test]
    fn test_compact_frees_detached_nodes() {
        let mut doc = Document::parse("<html><head></head><body><p>one</p><p>two</p></body></html>");
        let baseline = doc.arena_len();
        let first = doc.find_element("p").unwrap();
        let text = doc.children(first)[0];
        let replacement = doc.create_text("uno");
        doc.replace(text, replacement).unwrap();
        let _orphan = doc.create_text("never attached");
        assert_eq!(doc.arena_len(), baseline + 2);

        let html = doc.to_html();
        assert_eq!(doc.compact(), 2);
        assert_eq!(doc.arena_len(), baseline);
        assert_eq!(doc.to_html(), html);
        assert!(html.contains("<p>uno</p><p>two</p>"));

        let body = doc.body();
        let paragraphs: Vec<_> = doc.children(body).to_vec();
        assert_eq!(doc.parent(paragraphs[1]), Some(body));
    }

    #[test]
    fn test_detached_reference_is_skipped() {
        let mut doc = Document::new();
        let orphan = doc.create_text("orphan");
        let node = doc.create_text("x");
        assert!(doc.insert_before(orphan, node).is_none());
        assert!(doc.replace(orphan, node).is_none());
    }

    #[test]
    fn test_ancestors_and_body() {
        let doc = Document::parse("<html><body><div><em>deep</em></div></body></html>");
        let em = doc.find_element("em").unwrap();
        let text = doc.children(em)[0];
        let names: Vec<_> = doc.ancestors(text).filter_map(|n| doc.tag_name(n)).collect();
        assert_eq!(names, vec!["em", "div", "body", "html"]);
        assert_eq!(doc.tag_name(doc.body()), Some("body"));
    }
}
