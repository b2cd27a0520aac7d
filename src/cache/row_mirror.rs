//! Row Mirror - every row of the tree table, held in memory
//!
//! **Purpose**: answer every read without touching the store
//!
//! **Loading**: one ordered SELECT on first use, never again for the session
//!
//! **Ordering**: iteration follows `left` ascending, i.e. preorder. Mutations
//! leave the order stale until `reorder()` is called.

use crate::config::MpttConfig;
use crate::store::Store;
use crate::types::{Node, NodeId, ROOT};
use crate::Result;
use ahash::AHashMap;

/// Mirror statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorStats {
    /// Rows currently mirrored
    pub rows: usize,
    /// SELECTs issued against the store (1 after warm-up)
    pub loads: u64,
    /// Boundary shift passes applied
    pub shifts: u64,
    /// Re-sorts by left boundary
    pub reorders: u64,
}

/// In-memory copy of the tree table keyed by node id
#[derive(Debug, Default)]
pub struct RowMirror {
    /// id -> node
    rows: AHashMap<NodeId, Node>,
    /// Node ids by left boundary (preorder)
    order: Vec<NodeId>,
    warm: bool,
    stats: MirrorStats,
}

impl RowMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_warm(&self) -> bool {
        self.warm
    }

    /// Load every row with one ordered SELECT. No-op once warm.
    pub fn warm<S: Store + ?Sized>(&mut self, store: &S, config: &MpttConfig) -> Result<()> {
        if self.warm {
            return Ok(());
        }

        let columns = config.columns();
        let cursor = store.select(&columns, &config.table, &[], &[config.left_column.as_str()])?;

        self.rows.clear();
        self.order.clear();
        for row in cursor {
            let node = Node::from_row(&row, config)?;
            self.order.push(node.id);
            self.rows.insert(node.id, node);
        }

        self.warm = true;
        self.stats.loads += 1;
        // 存储端已按 left 排序，这里仍保证顺序正确
        self.reorder();

        tracing::debug!(table = %config.table, rows = self.rows.len(), "row mirror warmed");
        Ok(())
    }

    /// Drop every row; the next `warm` reloads from the store
    pub fn clear(&mut self) {
        self.rows.clear();
        self.order.clear();
        self.warm = false;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.rows.get_mut(&id)
    }

    /// Add a row. Call `reorder` before the next positional read.
    pub fn insert(&mut self, node: Node) {
        if self.rows.insert(node.id, node.clone()).is_none() {
            self.order.push(node.id);
        }
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let node = self.rows.remove(&id)?;
        self.order.retain(|&other| other != id);
        Some(node)
    }

    /// Interval of `id`; the virtual root spans `(0, +inf)`
    pub fn bounds(&self, id: NodeId) -> Option<(i64, i64)> {
        if id == ROOT {
            Some((0, i64::MAX))
        } else {
            self.rows.get(&id).map(|n| (n.left, n.right))
        }
    }

    /// Shift `left` of every row with `left > boundary` and `right` of every
    /// row with `right > boundary` by `delta`
    pub fn shift(&mut self, boundary: i64, delta: i64) {
        if delta == 0 {
            return;
        }
        for node in self.rows.values_mut() {
            if node.left > boundary {
                node.left += delta;
            }
            if node.right > boundary {
                node.right += delta;
            }
        }
        self.stats.shifts += 1;
    }

    /// Re-sort by left boundary
    pub fn reorder(&mut self) {
        let rows = &self.rows;
        self.order.sort_by_key(|id| rows.get(id).map_or(i64::MAX, |n| n.left));
        self.stats.reorders += 1;
    }

    /// Every row in preorder
    pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order.iter().filter_map(move |id| self.rows.get(id))
    }

    /// Rows strictly inside `id`'s interval, in preorder. `direct_only`
    /// keeps only rows whose parent is `id`. `None` when `id` is unknown.
    pub fn descendants(&self, id: NodeId, direct_only: bool) -> Option<Vec<&Node>> {
        let (left, right) = self.bounds(id)?;
        Some(
            self.iter()
                .filter(|n| n.left > left && n.left < right)
                .filter(|n| !direct_only || n.parent == id)
                .collect(),
        )
    }

    /// Direct children of `id` in left-to-right order
    pub fn children(&self, id: NodeId) -> Option<Vec<&Node>> {
        self.descendants(id, true)
    }

    /// True when `node` is `ancestor` itself or lies inside its interval
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        if node == ancestor {
            return true;
        }
        match (self.rows.get(&node), self.bounds(ancestor)) {
            (Some(n), Some((left, right))) => n.left > left && n.left < right,
            _ => false,
        }
    }

    /// Detach `id` and all of its descendants, returned in preorder
    pub fn take_subtree(&mut self, id: NodeId) -> Option<Vec<Node>> {
        let (left, right) = self.rows.get(&id).map(|n| (n.left, n.right))?;

        let ids: Vec<NodeId> = self
            .iter()
            .filter(|n| n.left >= left && n.right <= right)
            .map(|n| n.id)
            .collect();

        self.order.retain(|other| !ids.contains(other));
        Some(ids.iter().filter_map(|i| self.rows.remove(i)).collect())
    }

    pub fn stats(&self) -> MirrorStats {
        MirrorStats {
            rows: self.rows.len(),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::Value;

    fn node(id: NodeId, left: i64, right: i64, parent: NodeId) -> Node {
        Node {
            id,
            title: format!("n{}", id),
            left,
            right,
            parent,
        }
    }

    /// 1[1,8] -> 2[2,5] -> 3[3,4]; 1 -> 4[6,7]; 5[9,10]
    fn sample() -> RowMirror {
        let mut mirror = RowMirror::new();
        for n in [
            node(5, 9, 10, ROOT),
            node(1, 1, 8, ROOT),
            node(4, 6, 7, 1),
            node(2, 2, 5, 1),
            node(3, 3, 4, 2),
        ] {
            mirror.insert(n);
        }
        mirror.reorder();
        mirror
    }

    fn ids(nodes: &[&Node]) -> Vec<NodeId> {
        nodes.iter().map(|n| n.id).collect()
    }

    #[test]
    fn test_warm_loads_once() {
        let config = MpttConfig::default();
        let mut store = MemoryStore::new();
        store.install(&config).unwrap();
        store
            .insert(
                "mptt",
                &["title", "lft", "rgt", "parent"],
                vec![Value::from("Food"), Value::Integer(1), Value::Integer(2), Value::Integer(0)],
            )
            .unwrap();

        let mut mirror = RowMirror::new();
        mirror.warm(&store, &config).unwrap();
        assert!(mirror.is_warm());
        assert_eq!(mirror.len(), 1);

        // 第二次 warm 不再访问存储
        store
            .insert(
                "mptt",
                &["title", "lft", "rgt", "parent"],
                vec![Value::from("Drinks"), Value::Integer(3), Value::Integer(4), Value::Integer(0)],
            )
            .unwrap();
        mirror.warm(&store, &config).unwrap();
        assert_eq!(mirror.len(), 1);
        assert_eq!(mirror.stats().loads, 1);

        mirror.clear();
        mirror.warm(&store, &config).unwrap();
        assert_eq!(mirror.len(), 2);
    }

    #[test]
    fn test_warm_on_empty_table_marks_warm() {
        let config = MpttConfig::default();
        let store = MemoryStore::new();
        store.install(&config).unwrap();

        let mut mirror = RowMirror::new();
        mirror.warm(&store, &config).unwrap();
        assert!(mirror.is_warm());
        assert!(mirror.is_empty());
    }

    #[test]
    fn test_iteration_is_preorder() {
        let mirror = sample();
        let order: Vec<NodeId> = mirror.iter().map(|n| n.id).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_descendants_and_children() {
        let mirror = sample();
        assert_eq!(ids(&mirror.descendants(1, false).unwrap()), vec![2, 3, 4]);
        assert_eq!(ids(&mirror.children(1).unwrap()), vec![2, 4]);
        assert_eq!(ids(&mirror.children(ROOT).unwrap()), vec![1, 5]);
        assert_eq!(mirror.descendants(ROOT, false).unwrap().len(), 5);
        assert!(mirror.children(3).unwrap().is_empty());
        assert!(mirror.children(99).is_none());
    }

    #[test]
    fn test_shift_moves_only_rows_past_boundary() {
        let mut mirror = sample();
        // 在 2 的右边界 (5) 之后腾出两个单位
        mirror.shift(5, 2);

        assert_eq!(mirror.bounds(1), Some((1, 10)));
        assert_eq!(mirror.bounds(2), Some((2, 5)));
        assert_eq!(mirror.bounds(4), Some((8, 9)));
        assert_eq!(mirror.bounds(5), Some((11, 12)));
    }

    #[test]
    fn test_take_subtree_detaches_in_preorder() {
        let mut mirror = sample();
        let taken = mirror.take_subtree(2).unwrap();
        assert_eq!(taken.iter().map(|n| n.id).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(mirror.len(), 3);
        assert!(!mirror.contains(3));
        assert_eq!(mirror.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 4, 5]);
        assert!(mirror.take_subtree(2).is_none());
    }

    #[test]
    fn test_is_within() {
        let mirror = sample();
        assert!(mirror.is_within(3, 1));
        assert!(mirror.is_within(2, 2));
        assert!(mirror.is_within(5, ROOT));
        assert!(!mirror.is_within(1, 3));
        assert!(!mirror.is_within(5, 1));
    }

    #[test]
    fn test_remove_and_reinsert() {
        let mut mirror = sample();
        let four = mirror.remove(4).unwrap();
        assert!(mirror.remove(4).is_none());
        mirror.insert(four);
        mirror.reorder();
        assert_eq!(mirror.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }
}
