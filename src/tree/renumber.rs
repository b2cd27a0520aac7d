//! Boundary Renumbering Engine
//!
//! Every mutation is expressed as boundary shifts: all `left > boundary`
//! and all `right > boundary` move by the same delta. A shift is applied
//! twice, once to the Row Mirror and once to the store as two UPDATEs.
//!
//! Moves additionally *park* the relocated subtree so the shifts that close
//! the old gap and open the new one pass it by. In the mirror the parked
//! rows are held in a [`ParkedSubtree`]; in the store their boundaries are
//! negated, which keeps them out of every `> boundary` test.

use crate::cache::RowMirror;
use crate::config::MpttConfig;
use crate::store::{Assignment, Condition, Store};
use crate::types::{Node, NodeId};
use crate::{MpttError, Result};

/// `left += delta where left > boundary`, same for `right`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub boundary: i64,
    pub delta: i64,
}

impl Shift {
    pub fn new(boundary: i64, delta: i64) -> Self {
        Self { boundary, delta }
    }

    pub fn apply_to_mirror(&self, mirror: &mut RowMirror) {
        mirror.shift(self.boundary, self.delta);
    }

    pub fn apply_to_store<S: Store + ?Sized>(&self, store: &mut S, config: &MpttConfig) -> Result<()> {
        if self.delta == 0 {
            return Ok(());
        }

        for column in [config.left_column.as_str(), config.right_column.as_str()] {
            store.update(
                &config.table,
                &[Assignment::add(column, self.delta)],
                &[Condition::gt(column, self.boundary)],
            )?;
        }
        Ok(())
    }
}

/// Clamp a requested child index. Omitted, negative or past-the-end
/// positions all mean "append as last child".
pub fn resolve_index(position: Option<i64>, child_count: usize) -> usize {
    match position {
        Some(p) if p >= 0 && (p as u64) <= child_count as u64 => p as usize,
        _ => child_count,
    }
}

/// Boundary after which a new child of `parent` goes when placed at
/// `position` among its children.
///
/// - index 0, or no children: the parent's left (0 at root level)
/// - index k: the right of the child currently at k - 1
///
/// `exclude` drops one child from consideration (the node being moved).
pub fn insertion_boundary(
    mirror: &RowMirror,
    parent: NodeId,
    position: Option<i64>,
    exclude: Option<NodeId>,
) -> Result<i64> {
    let children: Vec<&Node> = mirror
        .children(parent)
        .ok_or(MpttError::NotFound(parent))?
        .into_iter()
        .filter(|c| Some(c.id) != exclude)
        .collect();

    let index = resolve_index(position, children.len());
    match index.checked_sub(1).and_then(|i| children.get(i)) {
        Some(previous) => Ok(previous.right),
        None => Ok(mirror.bounds(parent).map_or(0, |(left, _)| left)),
    }
}

/// A subtree lifted out of the Row Mirror while it is relocated
#[derive(Debug, Clone)]
pub struct ParkedSubtree {
    /// Root first, then descendants in preorder
    nodes: Vec<Node>,
}

impl ParkedSubtree {
    /// Take `id` and its descendants out of the mirror
    pub fn lift(mirror: &mut RowMirror, id: NodeId) -> Option<Self> {
        let nodes = mirror.take_subtree(id)?;
        if nodes.is_empty() {
            return None;
        }
        Some(Self { nodes })
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn width(&self) -> i64 {
        self.root().width()
    }

    /// Put the subtree back, shifted by `offset`, with its root under `parent`
    pub fn land(self, mirror: &mut RowMirror, offset: i64, parent: NodeId) {
        let root_id = self.root().id;
        for mut node in self.nodes {
            node.left += offset;
            node.right += offset;
            if node.id == root_id {
                node.parent = parent;
            }
            mirror.insert(node);
        }
    }

    /// Store side of `lift`: negate the boundaries of the `[left, right]` range
    pub fn park_rows<S: Store + ?Sized>(store: &mut S, config: &MpttConfig, left: i64, right: i64) -> Result<usize> {
        store.update(
            &config.table,
            &[
                Assignment::negate(config.left_column.as_str()),
                Assignment::negate(config.right_column.as_str()),
            ],
            &[
                Condition::ge(config.left_column.as_str(), left),
                Condition::le(config.right_column.as_str(), right),
            ],
        )
    }

    /// Store side of `land`: flip parked rows back to positive, shifted by `offset`
    pub fn unpark_rows<S: Store + ?Sized>(store: &mut S, config: &MpttConfig, offset: i64) -> Result<usize> {
        store.update(
            &config.table,
            &[
                Assignment::unpark(config.left_column.as_str(), offset),
                Assignment::unpark(config.right_column.as_str(), offset),
            ],
            &[Condition::lt(config.left_column.as_str(), 0i64)],
        )
    }
}
