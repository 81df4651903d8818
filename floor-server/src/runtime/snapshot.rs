//! Snapshot-flavored entity state
//!
//! The whole state is one JSON blob. Mutations run on a working copy that
//! replaces the current state only after the store write succeeds, so a
//! rejected command or a failed write leaves nothing behind.

use super::entity::EntityContext;
use super::error::{EntityError, EntityResult};
use super::store::DurableStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub struct SnapshotCell<S> {
    key: String,
    store: Arc<dyn DurableStore>,
    state: Option<S>,
}

impl<S> SnapshotCell<S>
where
    S: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Read the persisted snapshot for the context's key
    pub fn load(ctx: &EntityContext) -> EntityResult<Self> {
        let store = ctx.store().clone();
        let state = match store.read_snapshot(ctx.key_str())? {
            Some(bytes) => Some(serde_json::from_slice(&bytes)?),
            None => None,
        };
        Ok(Self {
            key: ctx.key_str().to_string(),
            store,
            state,
        })
    }

    pub fn exists(&self) -> bool {
        self.state.is_some()
    }

    /// Current state, `NotInitialized` before creation
    pub fn get(&self) -> EntityResult<&S> {
        self.state
            .as_ref()
            .ok_or_else(|| EntityError::not_initialized(&self.key))
    }

    pub fn peek(&self) -> Option<&S> {
        self.state.as_ref()
    }

    /// Persist a full replacement state
    pub fn set(&mut self, state: S) -> EntityResult<&S> {
        self.persist(&state)?;
        Ok(self.state.insert(state))
    }

    /// Mutate a working copy; publish it once persisted
    ///
    /// An error from `f` discards the copy.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut S) -> EntityResult<R>) -> EntityResult<R> {
        let mut working = self.get()?.clone();
        let result = f(&mut working)?;
        self.persist(&working)?;
        self.state = Some(working);
        Ok(result)
    }

    /// Tombstone: remove the persisted snapshot
    pub fn clear(&mut self) -> EntityResult<()> {
        self.store.clear_snapshot(&self.key)?;
        self.state = None;
        Ok(())
    }

    fn persist(&self, state: &S) -> EntityResult<()> {
        let bytes = serde_json::to_vec(state)?;
        self.store.write_snapshot(&self.key, &bytes)?;
        Ok(())
    }
}
