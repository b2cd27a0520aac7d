//! Property-based tests: random operation sequences keep the nested-set
//! invariants and keep the mirror equal to the stored rows.

use mptt::{MemoryStore, Mptt, MpttConfig, MpttError, Node, NodeId, Position, ROOT};
use proptest::prelude::*;

// =============================================================================
// Test helpers
// =============================================================================

/// Node references are picks into the current node list (ROOT included)
#[derive(Clone, Debug)]
enum TreeOp {
    Add { parent: usize, position: Option<i64> },
    Delete { node: usize },
    Move { node: usize, target: usize, position: Option<i64>, relative: Option<bool> },
    Copy { node: usize, target: usize, position: Option<i64> },
}

fn arbitrary_position() -> impl Strategy<Value = Option<i64>> {
    prop_oneof![Just(None), (-2i64..6).prop_map(Some)]
}

fn arbitrary_tree_op() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        4 => (any::<usize>(), arbitrary_position())
            .prop_map(|(parent, position)| TreeOp::Add { parent, position }),
        1 => any::<usize>().prop_map(|node| TreeOp::Delete { node }),
        2 => (any::<usize>(), any::<usize>(), arbitrary_position(), prop::option::of(any::<bool>()))
            .prop_map(|(node, target, position, relative)| TreeOp::Move { node, target, position, relative }),
        1 => (any::<usize>(), any::<usize>(), arbitrary_position())
            .prop_map(|(node, target, position)| TreeOp::Copy { node, target, position }),
    ]
}

fn pick(nodes: &[Node], choice: usize, with_root: bool) -> Option<NodeId> {
    let slots = nodes.len() + usize::from(with_root);
    if slots == 0 {
        return None;
    }
    let i = choice % slots;
    if with_root && i == nodes.len() {
        Some(ROOT)
    } else {
        Some(nodes[i].id)
    }
}

fn within(nodes: &[Node], node: NodeId, ancestor: NodeId) -> bool {
    if node == ancestor {
        return true;
    }
    let find = |id: NodeId| nodes.iter().find(|n| n.id == id);
    match (find(node), find(ancestor)) {
        (Some(n), Some(a)) => a.left < n.left && n.right < a.right,
        _ => false,
    }
}

fn apply(tree: &mut Mptt<MemoryStore>, op: &TreeOp) -> Result<(), TestCaseError> {
    let nodes = tree.get_descendants(ROOT, false).unwrap();
    match op {
        TreeOp::Add { parent, position } => {
            let parent = pick(&nodes, *parent, true).unwrap_or(ROOT);
            tree.add(parent, "n", *position).unwrap();
        }
        TreeOp::Delete { node } => {
            if let Some(node) = pick(&nodes, *node, false) {
                let expected = nodes.iter().find(|n| n.id == node).map_or(0, |n| n.descendant_count() + 1);
                prop_assert_eq!(tree.delete(node).unwrap(), expected);
            }
        }
        TreeOp::Move { node, target, position, relative } => {
            let (Some(node), Some(target)) = (pick(&nodes, *node, false), pick(&nodes, *target, true)) else {
                return Ok(());
            };
            let position = match relative {
                Some(true) => Position::After,
                Some(false) => Position::Before,
                None => Position::from(*position),
            };
            match tree.move_node(node, target, position) {
                Ok(()) => prop_assert!(!within(&nodes, target, node)),
                Err(MpttError::CycleRejected { .. }) => prop_assert!(within(&nodes, target, node)),
                // 相对虚拟根没有兄弟位置
                Err(MpttError::NotFound(ROOT)) => prop_assert!(target == ROOT && relative.is_some()),
                Err(e) => return Err(TestCaseError::fail(format!("move failed: {}", e))),
            }
        }
        TreeOp::Copy { node, target, position } => {
            if nodes.len() > 150 {
                return Ok(());
            }
            let (Some(node), Some(target)) = (pick(&nodes, *node, false), pick(&nodes, *target, true)) else {
                return Ok(());
            };
            match tree.copy(node, target, *position) {
                Ok(copy) => {
                    let original = nodes.iter().find(|n| n.id == node).map(|n| n.descendant_count());
                    prop_assert_eq!(Some(tree.get_descendant_count(copy, false).unwrap()), original);
                }
                Err(MpttError::CycleRejected { .. }) => prop_assert!(within(&nodes, target, node)),
                Err(e) => return Err(TestCaseError::fail(format!("copy failed: {}", e))),
            }
        }
    }
    Ok(())
}

fn check_invariants(tree: &mut Mptt<MemoryStore>) -> Result<(), TestCaseError> {
    let all = tree.get_descendants(ROOT, false).unwrap();

    for a in &all {
        prop_assert!(a.left < a.right);
        let live = all.iter().filter(|b| a.left < b.left && b.right < a.right).count();
        prop_assert_eq!(a.descendant_count(), live);

        // 父节点是包含它的最内层节点
        let innermost = all
            .iter()
            .filter(|b| b.left < a.left && a.right < b.right)
            .max_by_key(|b| b.left)
            .map_or(ROOT, |b| b.id);
        prop_assert_eq!(a.parent, innermost);

        for b in &all {
            if a.id != b.id {
                let nested = (a.left < b.left && b.right < a.right) || (b.left < a.left && a.right < b.right);
                let disjoint = a.right < b.left || b.right < a.left;
                prop_assert!(nested || disjoint);
            }
        }
    }

    // 边界连续: 1..=2n 每个值恰好出现一次
    let mut bounds: Vec<i64> = all.iter().flat_map(|n| [n.left, n.right]).collect();
    bounds.sort_unstable();
    prop_assert_eq!(bounds, (1..=2 * all.len() as i64).collect::<Vec<_>>());

    // 新会话从存储读取的结果与本会话镜像一致
    let mut fresh = Mptt::with_default_config(tree.store().connect()).unwrap();
    prop_assert_eq!(fresh.get_descendants(ROOT, false).unwrap(), all);
    Ok(())
}

// =============================================================================
// Invariant properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any sequence of add/delete/move/copy leaves a well-formed tree
    #[test]
    fn operations_preserve_nested_set_invariants(
        ops in prop::collection::vec(arbitrary_tree_op(), 1..40),
    ) {
        let config = MpttConfig::default();
        let store = MemoryStore::new();
        store.install(&config).unwrap();
        let mut tree = Mptt::new(store, config).unwrap();

        for op in &ops {
            apply(&mut tree, op)?;
            check_invariants(&mut tree)?;
        }
        prop_assert_eq!(tree.store().lock_owner(), None);
    }

    /// add followed by delete of the new node restores every other row
    #[test]
    fn add_then_delete_is_identity(
        ops in prop::collection::vec(arbitrary_tree_op(), 0..20),
        parent in any::<usize>(),
        position in arbitrary_position(),
    ) {
        let config = MpttConfig::default();
        let store = MemoryStore::new();
        store.install(&config).unwrap();
        let mut tree = Mptt::new(store, config).unwrap();
        for op in &ops {
            apply(&mut tree, op)?;
        }

        let before = tree.get_descendants(ROOT, false).unwrap();
        let parent = pick(&before, parent, true).unwrap_or(ROOT);
        let added = tree.add(parent, "temp", position).unwrap();
        prop_assert_eq!(tree.delete(added).unwrap(), 1);
        prop_assert_eq!(tree.get_descendants(ROOT, false).unwrap(), before);
    }
}
