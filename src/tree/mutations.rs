//! Tree Operations
//!
//! Each operation runs as one unit:
//! validate → compute boundaries → lock → store statements → unlock →
//! apply the same shifts to the Row Mirror → reorder.
//!
//! All boundaries are computed from the mirror *before* anything is
//! written, so a failed precondition never takes the lock.

use super::core::Mptt;
use super::renumber::{insertion_boundary, ParkedSubtree, Shift};
use crate::store::{Assignment, Condition, Store};
use crate::types::{Node, NodeId, Position, Value};
use crate::{MpttError, Result};

impl<S: Store> Mptt<S> {
    /// Add `title` as a child of `parent` (`ROOT` for a topmost node).
    ///
    /// `position` is a 0-based index among the parent's children; `None`,
    /// negative or past-the-end indices append. Returns the new node's id.
    pub fn add(&mut self, parent: NodeId, title: &str, position: Option<i64>) -> Result<NodeId> {
        self.warm()?;
        self.ensure_exists_or_root(parent)?;

        let boundary = insertion_boundary(&self.mirror, parent, position, None)?;
        let shift = Shift::new(boundary, 2);

        let id = self.locked(|store, config| {
            shift.apply_to_store(store, config)?;
            store.insert(
                &config.table,
                &[
                    config.title_column.as_str(),
                    config.left_column.as_str(),
                    config.right_column.as_str(),
                    config.parent_column.as_str(),
                ],
                vec![
                    Value::from(title),
                    Value::Integer(boundary + 1),
                    Value::Integer(boundary + 2),
                    Value::from(parent),
                ],
            )?;
            Ok(store.last_insert_id())
        })?;

        shift.apply_to_mirror(&mut self.mirror);
        self.mirror.insert(Node {
            id,
            title: title.to_string(),
            left: boundary + 1,
            right: boundary + 2,
            parent,
        });
        self.mirror.reorder();

        tracing::debug!(node = id, parent, left = boundary + 1, "added node");
        Ok(id)
    }

    /// Change a node's title. Boundaries are untouched.
    pub fn update(&mut self, node: NodeId, title: &str) -> Result<()> {
        self.warm()?;
        self.node(node)?;

        self.locked(|store, config| {
            store.update(
                &config.table,
                &[Assignment::set(config.title_column.as_str(), title)],
                &[Condition::eq(config.id_column.as_str(), node)],
            )
        })?;

        if let Some(n) = self.mirror.get_mut(node) {
            n.title = title.to_string();
        }

        tracing::debug!(node, "updated title");
        Ok(())
    }

    /// Delete a node together with all of its descendants.
    ///
    /// Returns the number of removed nodes. There is no undo.
    pub fn delete(&mut self, node: NodeId) -> Result<usize> {
        self.warm()?;
        let target = self.node(node)?.clone();
        let close = Shift::new(target.left, -target.width());

        let removed = self.locked(|store, config| {
            let removed = store.delete(
                &config.table,
                &[
                    Condition::ge(config.left_column.as_str(), target.left),
                    Condition::le(config.right_column.as_str(), target.right),
                ],
            )?;
            close.apply_to_store(store, config)?;
            Ok(removed)
        })?;

        let mirrored = self.mirror.take_subtree(node).map_or(0, |nodes| nodes.len());
        close.apply_to_mirror(&mut self.mirror);
        self.mirror.reorder();

        if mirrored != removed {
            // 其他会话写入过该表，镜像已过期
            tracing::warn!(node, mirrored, removed, "store removed a different number of rows than the mirror");
        }

        tracing::debug!(node, removed = mirrored, width = target.width(), "deleted subtree");
        Ok(mirrored)
    }

    /// Move `source` (and its descendants) under `target`.
    ///
    /// `position` is an index among the target's children (clamped, see
    /// [`Position`]), or `After`/`Before` to become the target's next or
    /// previous sibling. Fails with `CycleRejected` when `target` is
    /// `source` or one of its descendants.
    pub fn move_node(&mut self, source: NodeId, target: NodeId, position: impl Into<Position>) -> Result<()> {
        self.warm()?;
        let src = self.node(source)?.clone();
        self.ensure_exists_or_root(target)?;

        if self.mirror.is_within(target, source) {
            return Err(MpttError::CycleRejected { node: source, target });
        }

        let index = match position.into() {
            Position::Last => None,
            Position::Index(i) => Some(i),
            relative @ (Position::After | Position::Before) => {
                let tgt = self.node(target)?;
                let parent = tgt.parent;
                // 源节点不计入兄弟位置
                let siblings = self.mirror.children(parent).ok_or(MpttError::NotFound(parent))?;
                let at = siblings
                    .iter()
                    .filter(|n| n.id != source)
                    .position(|n| n.id == target)
                    .ok_or(MpttError::NotFound(target))?;
                let at = if relative == Position::After { at + 1 } else { at };
                return self.move_node(source, parent, Position::Index(at as i64));
            }
        };

        let width = src.width();
        let boundary = insertion_boundary(&self.mirror, target, index, Some(source))?;
        // 换算到关闭源区间之后的坐标
        let boundary = if boundary > src.right { boundary - width } else { boundary };
        let close = Shift::new(src.left, -width);
        let open = Shift::new(boundary, width);
        let offset = boundary - src.left + 1;

        self.locked(|store, config| {
            ParkedSubtree::park_rows(store, config, src.left, src.right)?;
            close.apply_to_store(store, config)?;
            open.apply_to_store(store, config)?;
            ParkedSubtree::unpark_rows(store, config, offset)?;
            store.update(
                &config.table,
                &[Assignment::set(config.parent_column.as_str(), target)],
                &[Condition::eq(config.id_column.as_str(), source)],
            )?;
            Ok(())
        })?;

        let parked = ParkedSubtree::lift(&mut self.mirror, source).ok_or(MpttError::NotFound(source))?;
        close.apply_to_mirror(&mut self.mirror);
        open.apply_to_mirror(&mut self.mirror);
        parked.land(&mut self.mirror, offset, target);
        self.mirror.reorder();

        tracing::debug!(node = source, target, offset, width, "moved subtree");
        Ok(())
    }

    /// Copy `source` and all of its descendants under `target`.
    ///
    /// The copy keeps the shape and child order of the original and gets
    /// fresh ids. Returns the id of the copied top node.
    pub fn copy(&mut self, source: NodeId, target: NodeId, position: Option<i64>) -> Result<NodeId> {
        self.warm()?;
        let src = self.node(source)?.clone();
        self.ensure_exists_or_root(target)?;

        if self.mirror.is_within(target, source) {
            return Err(MpttError::CycleRejected { node: source, target });
        }

        // 按值快照，前序
        let snapshot: Vec<Node> = self
            .mirror
            .iter()
            .filter(|n| n.left >= src.left && n.right <= src.right)
            .cloned()
            .collect();

        let boundary = insertion_boundary(&self.mirror, target, position, None)?;
        let open = Shift::new(boundary, src.width());
        let offset = boundary - src.left + 1;

        let copies = self.locked(|store, config| {
            open.apply_to_store(store, config)?;

            let columns = [
                config.title_column.as_str(),
                config.left_column.as_str(),
                config.right_column.as_str(),
                config.parent_column.as_str(),
            ];

            let mut copies = Vec::with_capacity(snapshot.len());
            // (right, new id) of every copied ancestor still open
            let mut frames: Vec<(i64, NodeId)> = Vec::new();
            for original in &snapshot {
                let left = original.left + offset;
                let right = original.right + offset;

                while frames.last().is_some_and(|&(frame_right, _)| frame_right < right) {
                    frames.pop();
                }
                let parent = frames.last().map_or(target, |&(_, id)| id);

                store.insert(
                    &config.table,
                    &columns,
                    vec![
                        Value::from(original.title.as_str()),
                        Value::Integer(left),
                        Value::Integer(right),
                        Value::from(parent),
                    ],
                )?;
                let id = store.last_insert_id();
                frames.push((right, id));

                copies.push(Node {
                    id,
                    title: original.title.clone(),
                    left,
                    right,
                    parent,
                });
            }
            Ok(copies)
        })?;

        let top = copies.first().map(|n| n.id).ok_or(MpttError::NotFound(source))?;

        open.apply_to_mirror(&mut self.mirror);
        for node in copies {
            self.mirror.insert(node);
        }
        self.mirror.reorder();

        tracing::debug!(node = source, target, copy = top, rows = snapshot.len(), "copied subtree");
        Ok(top)
    }
}
