use std::{
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

use anyhow::{anyhow, Result};
use tracing::info;

use crate::{Connector, StartupOptions};

/// Owns the single device connection shared by every proxy in the process.
///
/// All lifecycle transitions and device calls are serialized through one lock
/// because the device library is not reentrant.
pub struct HardwareLink<C: Connector> {
    connector: C,
    device: Mutex<Option<C::Device>>,
}

impl<C: Connector> HardwareLink<C> {
    pub const fn new(connector: C) -> Self {
        Self {
            connector,
            device: Mutex::new(None),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn lock(&self) -> MutexGuard<'_, Option<C::Device>> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Returns `true` if this call created the connection, `false` if one was
    /// already open.
    pub fn open(&self, memmap: &Path) -> Result<bool> {
        let mut device = self.lock();
        if device.is_some() {
            return Ok(false);
        }
        info!("starting DMA device");
        let options = StartupOptions::detect(memmap);
        if let Some(memmap) = options.memmap() {
            info!("memory map found: {}", memmap.display());
        }
        *device = Some(self.connector.connect(&options)?);
        info!("DMA device loaded");
        Ok(true)
    }

    pub fn with_device<T>(&self, f: impl FnOnce(&C::Device) -> Result<T>) -> Result<T> {
        let device = self.lock();
        let device = device
            .as_ref()
            .ok_or_else(|| anyhow!("DMA device is not initialized"))?;
        f(device)
    }

    /// Returns `false` if there was nothing to release.
    pub fn close(&self) -> bool {
        self.close_with(|| {})
    }

    /// Like [`close`](Self::close), but also runs `f` before the lock is
    /// released, whether or not a device was open.
    pub fn close_with(&self, f: impl FnOnce()) -> bool {
        let mut guard = self.lock();
        let released = match guard.take() {
            Some(device) => {
                // The native handle must be gone before another `open` can connect.
                drop(device);
                info!("DMA device released");
                true
            }
            None => false,
        };
        f();
        drop(guard);
        released
    }
}
