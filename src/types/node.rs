//! Tree node types: stored rows, materialized trees, insertion positions

use super::{NodeId, SqlRow, Value, ROOT};
use crate::config::MpttConfig;
use crate::{MpttError, Result};
use serde::{Deserialize, Serialize};

/// One row of the tree table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    /// Left boundary of the preorder interval
    pub left: i64,
    /// Right boundary of the preorder interval
    pub right: i64,
    /// Direct parent, `ROOT` for topmost nodes
    pub parent: NodeId,
}

impl Node {
    /// Boundary units consumed by this node and all of its descendants
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Total number of descendants, read from the interval alone
    pub fn descendant_count(&self) -> usize {
        ((self.right - self.left - 1) / 2).max(0) as usize
    }

    /// True when `other` lies strictly inside this node's interval
    pub fn contains(&self, other: &Node) -> bool {
        self.left < other.left && other.left < self.right
    }

    pub fn is_topmost(&self) -> bool {
        self.parent == ROOT
    }

    pub fn is_leaf(&self) -> bool {
        self.right - self.left == 1
    }

    /// Decode a selected row using the configured column names
    pub(crate) fn from_row(row: &SqlRow, config: &MpttConfig) -> Result<Self> {
        let int = |column: &str| -> Result<i64> {
            row.get(column)
                .and_then(Value::as_i64)
                .ok_or_else(|| MpttError::Store(format!("malformed row: column '{}' is missing or not an integer", column)))
        };

        let title = match row.get(&config.title_column) {
            Some(Value::Text(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        Ok(Self {
            id: int(&config.id_column)? as NodeId,
            title,
            left: int(&config.left_column)?,
            right: int(&config.right_column)?,
            parent: int(&config.parent_column)? as NodeId,
        })
    }
}

/// A node with its direct children attached, to arbitrary depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub node: Node,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(node: Node) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Number of nodes below this one in the materialized tree
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Find a direct child by id
    pub fn child(&self, id: NodeId) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.node.id == id)
    }
}

/// Where `move` places the source node relative to the target.
///
/// Plain indices clamp: anything negative or past the last child appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Append as the target's last child
    #[default]
    Last,
    /// Insert as the target's child at this 0-based index
    Index(i64),
    /// Become the target's next sibling
    After,
    /// Become the target's previous sibling
    Before,
}

impl From<i64> for Position {
    fn from(index: i64) -> Self {
        Position::Index(index)
    }
}

impl From<Option<i64>> for Position {
    fn from(index: Option<i64>) -> Self {
        index.map_or(Position::Last, Position::Index)
    }
}

/// HTML list flavour used by `to_list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListType {
    #[default]
    Unordered,
    Ordered,
}

impl ListType {
    pub fn tag(&self) -> &'static str {
        match self {
            ListType::Unordered => "ul",
            ListType::Ordered => "ol",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: NodeId, left: i64, right: i64, parent: NodeId) -> Node {
        Node {
            id,
            title: format!("n{}", id),
            left,
            right,
            parent,
        }
    }

    #[test]
    fn test_interval_arithmetic() {
        let root = node(1, 1, 8, ROOT);
        let child = node(2, 2, 5, 1);
        let leaf = node(3, 3, 4, 2);

        assert_eq!(root.width(), 8);
        assert_eq!(root.descendant_count(), 3);
        assert_eq!(child.descendant_count(), 1);
        assert!(leaf.is_leaf());
        assert!(root.contains(&leaf));
        assert!(!child.contains(&root));
        assert!(!leaf.contains(&leaf));
    }

    #[test]
    fn test_from_row_uses_configured_columns() {
        let config = MpttConfig::default().with_left_column("l").with_right_column("r");
        let mut row = SqlRow::new();
        row.insert("id".into(), Value::Integer(4));
        row.insert("title".into(), Value::from("Fruit"));
        row.insert("l".into(), Value::Integer(2));
        row.insert("r".into(), Value::Integer(3));
        row.insert("parent".into(), Value::Integer(1));

        let n = Node::from_row(&row, &config).unwrap();
        assert_eq!(n, Node { id: 4, title: "Fruit".into(), left: 2, right: 3, parent: 1 });

        row.remove("r");
        assert!(matches!(Node::from_row(&row, &config), Err(MpttError::Store(_))));
    }

    #[test]
    fn test_position_conversions() {
        assert_eq!(Position::from(2i64), Position::Index(2));
        assert_eq!(Position::from(None::<i64>), Position::Last);
        assert_eq!(Position::default(), Position::Last);
        assert_eq!(ListType::Ordered.tag(), "ol");
    }
}
