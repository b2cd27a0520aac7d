//! Presentation projections over the mirror: flat select options and
//! nested HTML lists

use super::core::Mptt;
use crate::store::Store;
use crate::types::{ListType, NodeId, TreeNode};
use crate::Result;

/// Depth marker used by [`Mptt::to_select`] when the caller has no preference
pub const DEFAULT_SEPARATOR: &str = " → ";

impl<S: Store> Mptt<S> {
    /// Descendants of `node` as `(id, label)` pairs in preorder.
    ///
    /// The label is `separator` repeated once per level below the direct
    /// children, then the title.
    ///
    /// ```
    /// # use mptt::{MemoryStore, Mptt, MpttConfig, ROOT, DEFAULT_SEPARATOR};
    /// # let config = MpttConfig::default();
    /// # let store = MemoryStore::new();
    /// # store.install(&config)?;
    /// # let mut tree = Mptt::new(store, config)?;
    /// let food = tree.add(ROOT, "Food", None)?;
    /// let fruit = tree.add(food, "Fruit", None)?;
    /// tree.add(fruit, "Cherry", None)?;
    ///
    /// let labels: Vec<String> = tree.to_select(ROOT, DEFAULT_SEPARATOR)?.into_iter().map(|(_, l)| l).collect();
    /// assert_eq!(labels, vec!["Food", " → Fruit", " →  → Cherry"]);
    /// # Ok::<(), mptt::MpttError>(())
    /// ```
    pub fn to_select(&mut self, node: NodeId, separator: &str) -> Result<Vec<(NodeId, String)>> {
        let descendants = self.get_descendants(node, false)?;

        let mut options = Vec::with_capacity(descendants.len());
        // right boundaries of the open ancestors inside `node`
        let mut open: Vec<i64> = Vec::new();
        for n in descendants {
            while open.last().is_some_and(|&right| right < n.left) {
                open.pop();
            }
            let label = format!("{}{}", separator.repeat(open.len()), n.title);
            open.push(n.right);
            options.push((n.id, label));
        }

        Ok(options)
    }

    /// Nested `<ul>`/`<ol>` markup of `node`'s descendants.
    ///
    /// Titles are HTML-escaped. `attributes` is written verbatim into the
    /// outermost list tag only. Empty string when there is nothing below
    /// `node`.
    pub fn to_list(&mut self, node: NodeId, list_type: ListType, attributes: &str) -> Result<String> {
        let tree = self.get_tree(node)?;
        let mut out = String::new();
        if !tree.is_empty() {
            render_list(&mut out, &tree, list_type.tag(), attributes.trim());
        }
        Ok(out)
    }
}

fn render_list(out: &mut String, nodes: &[TreeNode], tag: &str, attributes: &str) {
    out.push('<');
    out.push_str(tag);
    if !attributes.is_empty() {
        out.push(' ');
        out.push_str(attributes);
    }
    out.push('>');

    for item in nodes {
        out.push_str("<li>");
        out.push_str(&escape_html(&item.node.title));
        if !item.children.is_empty() {
            render_list(out, &item.children, tag, "");
        }
        out.push_str("</li>");
    }

    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
