//! MPTT Tree Storage
//!
//! 基于嵌套集合 (nested set / modified preorder tree traversal) 的层级数据存储
//!
//! ## 核心特性
//! - 子树、祖先路径、后代计数都是区间查询，不需要递归
//! - 每个会话一次 SELECT 预热 Row Mirror，之后的读取不访问存储
//! - 所有写操作在表写锁内完成，镜像与存储同步移动边界
//!
//! ## 架构
//! - 存储层: `Store` trait + 内存表引擎 (`MemoryStore`, 快照持久化)
//! - 缓存层: Row Mirror (按 left 排序的全表镜像)
//! - 树层: 边界重编号引擎 + 增删改移复制 + 查询与展示

pub mod config;
pub mod types;
pub mod store;
pub mod cache;
pub mod tree;

mod error;

pub use config::MpttConfig;
pub use error::{MpttError, Result};

// 主要对外 API
pub use tree::{Mptt, DEFAULT_SEPARATOR};
pub use store::{Assignment, CompareOp, Condition, ConnectionId, MemoryStore, RowCursor, Statement, Store};
pub use types::{ListType, Node, NodeId, Position, SqlRow, TreeNode, Value, ROOT};
pub use cache::{MirrorStats, RowMirror};
