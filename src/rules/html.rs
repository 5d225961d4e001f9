//! Minimal HTML document builder exposed to scripts via `html()`
//! (spec.md §9, "HTML builder"): the script appends elements with text
//! content and children, the engine serialises the tree on each mutation.

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum Content {
    Text(String),
    Element(HtmlNode),
}

#[derive(Debug, Clone, Default)]
pub struct HtmlNode {
    tag: Option<String>,
    content: Vec<Content>,
}

impl HtmlNode {
    fn render(&self, out: &mut String) {
        for item in &self.content {
            match item {
                Content::Text(t) => out.push_str(&escape(t)),
                Content::Element(child) => match &child.tag {
                    Some(tag) => {
                        out.push('<');
                        out.push_str(tag);
                        out.push('>');
                        child.render(out);
                        out.push_str("</");
                        out.push_str(tag);
                        out.push('>');
                    }
                    None => child.render(out),
                },
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// A handle into one node of the tree, re-rendering the whole document
/// into the response body through `on_change` after every mutation.
#[derive(Clone)]
pub struct HtmlBuilder {
    root: Arc<Mutex<HtmlNode>>,
    path: Vec<usize>,
    on_change: Arc<dyn Fn(String) + Send + Sync>,
}

impl HtmlBuilder {
    pub fn new(on_change: Arc<dyn Fn(String) + Send + Sync>) -> HtmlBuilder {
        HtmlBuilder { root: Arc::new(Mutex::new(HtmlNode::default())), path: Vec::new(), on_change }
    }

    fn with_node<R>(&self, f: impl FnOnce(&mut HtmlNode) -> R) -> R {
        let mut root = self.root.lock().expect("html tree lock poisoned");
        let mut node = &mut *root;
        for &idx in &self.path {
            match &mut node.content[idx] {
                Content::Element(child) => node = child,
                Content::Text(_) => unreachable!("path never points at a text node"),
            }
        }
        f(node)
    }

    fn render_and_notify(&self) {
        let root = self.root.lock().expect("html tree lock poisoned");
        let mut out = String::new();
        root.render(&mut out);
        (self.on_change)(out);
    }

    /// Append a leaf child element with the given tag and text, returning
    /// this same builder (chaining stays on the current node, matching
    /// the fluent style most scripts want: `doc.el("h1", "Title")`).
    pub fn el(&mut self, tag: &str, text: &str) -> HtmlBuilder {
        self.with_node(|node| {
            node.content.push(Content::Element(HtmlNode {
                tag: Some(tag.to_string()),
                content: vec![Content::Text(text.to_string())],
            }));
        });
        self.render_and_notify();
        self.clone()
    }

    /// Append a child element and return a builder scoped to *that*
    /// child, for building nested structure.
    pub fn child(&mut self, tag: &str) -> HtmlBuilder {
        let idx = self.with_node(|node| {
            node.content.push(Content::Element(HtmlNode { tag: Some(tag.to_string()), content: Vec::new() }));
            node.content.len() - 1
        });
        self.render_and_notify();
        let mut path = self.path.clone();
        path.push(idx);
        HtmlBuilder { root: self.root.clone(), path, on_change: self.on_change.clone() }
    }

    pub fn text(&mut self, text: &str) -> HtmlBuilder {
        self.with_node(|node| node.content.push(Content::Text(text.to_string())));
        self.render_and_notify();
        self.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renders_nested_elements_in_order() {
        let last = Arc::new(Mutex::new(String::new()));
        let last2 = last.clone();
        let mut doc = HtmlBuilder::new(Arc::new(move |s| *last2.lock().unwrap() = s));
        let mut body = doc.child("body");
        body.el("h1", "Hi");
        assert_eq!(last.lock().unwrap().clone(), "<body><h1>Hi</h1></body>");
        doc.text("trailing");
        assert_eq!(last.lock().unwrap().clone(), "<body><h1>Hi</h1></body>trailing");
    }
}
