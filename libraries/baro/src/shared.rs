//! Handle for sharing one frontend between tasks
//!
//! The scheduler task ticks through the lock; the arming and field elevation
//! paths take the same lock. Callback contexts never lock: they post to the
//! inbox, which the next tick drains.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{BaroError, BaroResult};
use crate::frontend::Baro;
use crate::health::ArmingFailure;
use crate::inbox::{Inbox, InjectedPacket};

#[derive(Clone)]
pub struct SharedBaro {
    inner: Arc<Mutex<Baro>>,
    inbox: Arc<Inbox>,
}

impl SharedBaro {
    pub fn new(baro: Baro) -> Self {
        let inbox = baro.inbox();
        Self {
            inner: Arc::new(Mutex::new(baro)),
            inbox,
        }
    }

    /// Exclusive access for the duration of the guard
    pub fn lock(&self) -> BaroResult<MutexGuard<'_, Baro>> {
        self.inner.lock().map_err(|_| BaroError::LockPoisoned)
    }

    /// Run one tick under the lock
    pub fn update(&self) -> BaroResult<()> {
        self.lock()?.update();
        Ok(())
    }

    pub fn arming_checks(&self) -> BaroResult<Result<(), ArmingFailure>> {
        Ok(self.lock()?.arming_checks())
    }

    /// Queue a sample without taking the lock. Returns the packet when the
    /// inbox is full.
    pub fn post(&self, packet: InjectedPacket) -> Result<(), InjectedPacket> {
        self.inbox.post(packet)
    }

    pub fn inbox(&self) -> Arc<Inbox> {
        Arc::clone(&self.inbox)
    }
}
