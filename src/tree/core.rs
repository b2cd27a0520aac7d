//! `Mptt` session: owns the store connection, the configuration and the Row Mirror

use crate::cache::RowMirror;
use crate::config::MpttConfig;
use crate::store::Store;
use crate::types::{Node, NodeId, ROOT};
use crate::{MpttError, Result};

/// One tree session over a store.
///
/// The Row Mirror is loaded on the first call to any operation and kept in
/// sync by this session's own writes only. Writes made by other sessions
/// become visible after [`Mptt::reload`].
///
/// ```
/// use mptt::{MemoryStore, Mptt, MpttConfig, ROOT};
///
/// let config = MpttConfig::default();
/// let store = MemoryStore::new();
/// store.install(&config)?;
///
/// let mut tree = Mptt::new(store, config)?;
/// let food = tree.add(ROOT, "Food", None)?;
/// let fruit = tree.add(food, "Fruit", None)?;
/// assert_eq!(tree.get_parent(fruit)?.map(|n| n.id), Some(food));
/// # Ok::<(), mptt::MpttError>(())
/// ```
#[derive(Debug)]
pub struct Mptt<S: Store> {
    pub(super) store: S,
    pub(super) config: MpttConfig,
    pub(super) mirror: RowMirror,
}

impl<S: Store> Mptt<S> {
    /// Validate the configuration and bind it to a connected store
    pub fn new(store: S, config: MpttConfig) -> Result<Self> {
        config.validate()?;
        if !store.is_connected() {
            return Err(MpttError::NotConnected);
        }

        Ok(Self {
            store,
            config,
            mirror: RowMirror::new(),
        })
    }

    /// Session with the default table and column names
    pub fn with_default_config(store: S) -> Result<Self> {
        Self::new(store, MpttConfig::default())
    }

    pub fn config(&self) -> &MpttConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn mirror(&self) -> &RowMirror {
        &self.mirror
    }

    /// Load the Row Mirror if this session hasn't yet
    pub fn warm(&mut self) -> Result<()> {
        self.mirror.warm(&self.store, &self.config)
    }

    /// Discard the Row Mirror and load it again from the store
    pub fn reload(&mut self) -> Result<()> {
        self.mirror.clear();
        self.warm()
    }

    /// Mirrored node or `NotFound`
    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.mirror.get(id).ok_or(MpttError::NotFound(id))
    }

    /// `ROOT` or a mirrored node
    pub(crate) fn ensure_exists_or_root(&self, id: NodeId) -> Result<()> {
        if id == ROOT || self.mirror.contains(id) {
            Ok(())
        } else {
            Err(MpttError::NotFound(id))
        }
    }

    /// Run `f` between `lock_table_for_write` and `unlock_all_tables`.
    ///
    /// The unlock is always attempted; the statement error wins over an
    /// unlock error.
    pub(crate) fn locked<T>(&mut self, f: impl FnOnce(&mut S, &MpttConfig) -> Result<T>) -> Result<T> {
        self.store
            .lock_table_for_write(&self.config.table)
            .map_err(|e| match e {
                MpttError::Lock(_) => e,
                other => MpttError::Lock(format!("{} ({})", other, self.store.error_info())),
            })?;

        let result = f(&mut self.store, &self.config);
        let unlocked = self.store.unlock_all_tables();

        match (result, unlocked) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(MpttError::Lock(format!("unlock failed: {}", e))),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(unlock_err)) => {
                tracing::warn!(table = %self.config.table, error = %unlock_err, "unlock after failed statement also failed");
                Err(e)
            }
        }
    }
}
