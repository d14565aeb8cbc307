use std::path::PathBuf;

use anyhow::{anyhow, Result};
use memprocfs::{Vmm, VmmProcess};

use crate::{Connector, Device, ModuleEntry, StartupOptions};

/// Connects through the native MemProcFS library (`vmm.dll` / `vmm.so`).
///
/// `leechcore` must sit next to the library.
pub struct VmmConnector {
    library: PathBuf,
}

impl VmmConnector {
    pub fn new(library: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
        }
    }
}

impl Connector for VmmConnector {
    type Device = VmmDevice;

    fn connect(&self, options: &StartupOptions) -> Result<VmmDevice> {
        let library = self
            .library
            .to_str()
            .ok_or_else(|| anyhow!("invalid library path: {}", self.library.display()))?;
        let args = options.args();
        let args: Vec<&str> = args.iter().map(|x| x.as_str()).collect();
        Ok(VmmDevice {
            vmm: Vmm::new(library, &args)?,
        })
    }
}

/// The native handle is closed when this value is dropped.
pub struct VmmDevice {
    vmm: Vmm<'static>,
}

impl VmmDevice {
    fn process(&self, pid: u32) -> VmmProcess<'_> {
        VmmProcess {
            vmm: &self.vmm,
            pid,
        }
    }
}

impl Device for VmmDevice {
    fn pid_from_name(&self, process_name: &str) -> Result<u32> {
        Ok(self.vmm.process_from_name(process_name)?.pid)
    }

    fn module_from_name(&self, pid: u32, module_name: &str) -> Result<Option<ModuleEntry>> {
        // process_from_pid rejects a pid that has exited since attach
        let modules = self.vmm.process_from_pid(pid)?.map_module(false, false)?;
        Ok(modules
            .into_iter()
            .find(|x| x.name == module_name)
            .map(|x| ModuleEntry::new(x.name, x.va_base, x.image_size)))
    }

    fn read(&self, pid: u32, address: u64, length: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; length];
        let read = self.process(pid).mem_read_into(address, 0, &mut buffer)?;
        buffer.truncate(read);
        Ok(buffer)
    }
}
