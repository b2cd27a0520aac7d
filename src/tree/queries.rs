//! Query Operations
//!
//! Pure reads on the warm Row Mirror. Each call warms the mirror first, so
//! the first query of a session issues the single loading SELECT.

use super::core::Mptt;
use crate::store::Store;
use crate::types::{Node, NodeId, TreeNode, ROOT};
use crate::{MpttError, Result};

impl<S: Store> Mptt<S> {
    pub fn get_node(&mut self, node: NodeId) -> Result<Node> {
        self.warm()?;
        self.node(node).cloned()
    }

    /// Descendants of `node` ordered by left boundary.
    ///
    /// `ROOT` stands for the whole table: with `direct_only` it yields the
    /// topmost nodes, otherwise every node.
    pub fn get_descendants(&mut self, node: NodeId, direct_only: bool) -> Result<Vec<Node>> {
        self.warm()?;
        let found = self
            .mirror
            .descendants(node, direct_only)
            .ok_or(MpttError::NotFound(node))?;
        Ok(found.into_iter().cloned().collect())
    }

    /// Direct children of `node`, left to right
    pub fn get_children(&mut self, node: NodeId) -> Result<Vec<Node>> {
        self.get_descendants(node, true)
    }

    pub fn get_descendant_count(&mut self, node: NodeId, direct_only: bool) -> Result<usize> {
        self.warm()?;
        if direct_only {
            return Ok(self.mirror.children(node).ok_or(MpttError::NotFound(node))?.len());
        }
        if node == ROOT {
            return Ok(self.mirror.len());
        }
        Ok(self.node(node)?.descendant_count())
    }

    /// `None` for a topmost node
    pub fn get_parent(&mut self, node: NodeId) -> Result<Option<Node>> {
        self.warm()?;
        let parent = self.node(node)?.parent;
        if parent == ROOT {
            return Ok(None);
        }
        self.node(parent).cloned().map(Some)
    }

    /// Ancestors from the topmost one down, followed by `node` itself
    pub fn get_path(&mut self, node: NodeId) -> Result<Vec<Node>> {
        self.warm()?;
        let target = self.node(node)?;
        let (left, right) = (target.left, target.right);

        Ok(self
            .mirror
            .iter()
            .filter(|n| n.left <= left && n.right >= right)
            .cloned()
            .collect())
    }

    /// Children of `node`'s parent
    pub fn get_siblings(&mut self, node: NodeId, include_self: bool) -> Result<Vec<Node>> {
        Ok(self
            .sibling_row(node)?
            .into_iter()
            .filter(|n| include_self || n.id != node)
            .collect())
    }

    pub fn get_next_sibling(&mut self, node: NodeId) -> Result<Option<Node>> {
        let siblings = self.sibling_row(node)?;
        let at = siblings.iter().position(|n| n.id == node).ok_or(MpttError::NotFound(node))?;
        Ok(siblings.into_iter().nth(at + 1))
    }

    pub fn get_previous_sibling(&mut self, node: NodeId) -> Result<Option<Node>> {
        let siblings = self.sibling_row(node)?;
        let at = siblings.iter().position(|n| n.id == node).ok_or(MpttError::NotFound(node))?;
        Ok(match at.checked_sub(1) {
            Some(previous) => siblings.into_iter().nth(previous),
            None => None,
        })
    }

    /// Owned tree of everything below `node` (`ROOT` for the whole forest)
    pub fn get_tree(&mut self, node: NodeId) -> Result<Vec<TreeNode>> {
        let descendants = self.get_descendants(node, false)?;

        let mut roots = Vec::new();
        // 当前仍未闭合的祖先链
        let mut open: Vec<TreeNode> = Vec::new();
        for n in descendants {
            while open.last().is_some_and(|top| top.node.right < n.left) {
                close_frame(&mut open, &mut roots);
            }
            open.push(TreeNode::leaf(n));
        }
        while !open.is_empty() {
            close_frame(&mut open, &mut roots);
        }

        Ok(roots)
    }

    /// `node` and its siblings in order
    fn sibling_row(&mut self, node: NodeId) -> Result<Vec<Node>> {
        self.warm()?;
        let parent = self.node(node)?.parent;
        let row = self.mirror.children(parent).ok_or(MpttError::NotFound(parent))?;
        Ok(row.into_iter().cloned().collect())
    }
}

/// Pop the innermost open frame and attach it to its parent frame
fn close_frame(open: &mut Vec<TreeNode>, roots: &mut Vec<TreeNode>) {
    if let Some(done) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }
}
