use std::{
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use anyhow::anyhow;
use derive_new::new;
use getset::{CopyGetters, Getters};
use tracing::{debug, error, info};

use crate::{Connector, Device, HardwareLink, ProxyError};

#[derive(Clone, Debug, CopyGetters, Getters, PartialEq, Eq, new)]
pub struct ModuleDescriptor {
    #[getset(get = "pub")]
    name: String,
    #[getset(get_copy = "pub")]
    base_address: u64,
    #[getset(get_copy = "pub")]
    size: u32,
}

/// Memory reader backed by the shared DMA link.
///
/// Construction is cheap and may be repeated: only the first construction in
/// the process connects to the device, later ones reuse the open link.
pub struct MemoryProxy<'a, C: Connector> {
    link: &'a HardwareLink<C>,
    memmap: PathBuf,
    pid: Mutex<Option<u32>>,
}

impl<'a, C: Connector> MemoryProxy<'a, C> {
    pub fn new(link: &'a HardwareLink<C>, memmap: impl Into<PathBuf>) -> Result<Self, ProxyError> {
        let proxy = Self {
            link,
            memmap: memmap.into(),
            pid: Mutex::new(None),
        };
        proxy.initialize()?;
        Ok(proxy)
    }

    pub fn initialize(&self) -> Result<(), ProxyError> {
        self.link.open(&self.memmap).map(|_| ()).map_err(|err| {
            error!("failed to initialize FPGA: {:?}", err);
            ProxyError::initialization(err)
        })
    }

    pub fn attached_pid(&self) -> Option<u32> {
        *self.pid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_attached_pid(&self, pid: Option<u32>) {
        *self.pid.lock().unwrap_or_else(PoisonError::into_inner) = pid;
    }

    /// `process_name` is matched as given, including its `.exe` suffix.
    ///
    /// A process that cannot be found is an error, never a silent `false`.
    pub fn attach_to_process(&self, process_name: &str) -> Result<u32, ProxyError> {
        info!("attaching to process '{}'", process_name);
        // The pid is stored under the link lock so a concurrent dispose cannot
        // leave it pointing into a released session.
        let pid = self
            .link
            .with_device(|device| {
                let pid = device.pid_from_name(process_name)?;
                self.set_attached_pid(Some(pid));
                Ok(pid)
            })
            .map_err(|err| {
                error!("failed to attach to process '{}': {:?}", process_name, err);
                ProxyError::attach(process_name, err)
            })?;
        info!("attached to process '{}' (pid {})", process_name, pid);
        Ok(pid)
    }

    pub fn get_module(&self, module_name: &str) -> Result<ModuleDescriptor, ProxyError> {
        info!("getting module '{}'", module_name);
        let result = self.attached_pid().ok_or_else(|| anyhow!("no process attached"));
        let entry = result
            .and_then(|pid| {
                self.link
                    .with_device(|device| device.module_from_name(pid, module_name))
            })
            .and_then(|entry| {
                entry
                    .filter(|x| x.base_address != 0)
                    .ok_or_else(|| anyhow!("module not found"))
            })
            .map_err(|err| {
                error!("failed to get module '{}': {:?}", module_name, err);
                ProxyError::module_lookup(module_name, err)
            })?;
        info!(
            "module search: {} | found: {} | base: {:#X} | size: {}",
            module_name, entry.name, entry.base_address, entry.image_size
        );
        Ok(ModuleDescriptor::new(
            module_name.to_owned(),
            entry.base_address,
            entry.image_size,
        ))
    }

    /// Always returns exactly `length` bytes. Bytes the device could not
    /// deliver read back as zero.
    pub fn read(&self, address: u64, length: i32) -> Result<Vec<u8>, ProxyError> {
        let result = usize::try_from(length)
            .map_err(|_| anyhow!("negative length {}", length))
            .and_then(|length| {
                let pid = self
                    .attached_pid()
                    .ok_or_else(|| anyhow!("no process attached"))?;
                if length == 0 {
                    return Ok(Vec::new());
                }
                let bytes = self
                    .link
                    .with_device(|device| device.read(pid, address, length))?;
                Ok(pad_to_length(bytes, length, address))
            });
        result.map_err(|err| {
            error!("failed to read memory at {:#X}: {:?}", address, err);
            ProxyError::read(address, err)
        })
    }

    /// Releases the device. Calling this with nothing open does nothing.
    pub fn dispose(&self) {
        info!("dispose");
        self.link.close_with(|| self.set_attached_pid(None));
    }
}

fn pad_to_length(mut bytes: Vec<u8>, length: usize, address: u64) -> Vec<u8> {
    if bytes.len() != length {
        debug!(
            "partial read at {:#X}: {} of {} bytes",
            address,
            bytes.len(),
            length
        );
    }
    bytes.resize(length, 0);
    bytes
}
