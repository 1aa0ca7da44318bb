//! Session pool.
//!
//! Fixed table of `N` session slots keyed by transport session id. Each slot
//! holds at most one [`RciSession`]; a build without dynamic session
//! allocation uses `N = 1`, which limits the device to one concurrent RCI
//! transaction.

use log::{debug, warn};

use crate::config::RciConfig;
use crate::error::PoolError;

use super::session::RciSession;

pub struct SessionPool<const N: usize> {
    slots: [Option<RciSession>; N],
}

impl<const N: usize> SessionPool<N> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Claim a free slot for transport session `id`.
    pub fn acquire(&mut self, id: u32, config: &RciConfig) -> Result<&mut RciSession, PoolError> {
        if self.position(id).is_some() {
            warn!("RCI pool: session {} already active", id);
            return Err(PoolError::Duplicate(id));
        }
        let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) else {
            warn!("RCI pool: no free slot for session {} ({} in use)", id, N);
            return Err(PoolError::Exhausted);
        };
        debug!("RCI pool: session {} acquired", id);
        Ok(slot.insert(RciSession::new(id, config)))
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut RciSession> {
        self.slots.iter_mut().flatten().find(|s| s.id() == id)
    }

    pub fn get(&self, id: u32) -> Option<&RciSession> {
        self.slots.iter().flatten().find(|s| s.id() == id)
    }

    /// Free the slot of session `id`.
    pub fn release(&mut self, id: u32) -> Result<(), PoolError> {
        let index = self.position(id).ok_or(PoolError::Unknown(id))?;
        self.slots[index] = None;
        debug!("RCI pool: session {} released", id);
        Ok(())
    }

    /// Number of occupied slots.
    pub fn active(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    fn position(&self, id: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.id() == id))
    }
}

impl<const N: usize> Default for SessionPool<N> {
    fn default() -> Self {
        Self::new()
    }
}
