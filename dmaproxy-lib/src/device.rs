use anyhow::Result;
use derive_new::new;

use crate::StartupOptions;

/// A module table entry as reported by the device.
#[derive(Clone, Debug, PartialEq, Eq, new)]
pub struct ModuleEntry {
    pub name: String,
    pub base_address: u64,
    pub image_size: u32,
}

/// A live connection to the DMA device.
///
/// Dropping the value must release the connection.
pub trait Device: Send {
    fn pid_from_name(&self, process_name: &str) -> Result<u32>;

    /// `Ok(None)` when the process has no module with this exact name.
    ///
    /// Matching is case-sensitive: `unityplayer.dll` does not find
    /// `UnityPlayer.dll`, even though [`pid_from_name`](Self::pid_from_name)
    /// may ignore case.
    fn module_from_name(&self, pid: u32, module_name: &str) -> Result<Option<ModuleEntry>>;

    /// May return fewer bytes than `length` when part of the range is unmapped.
    fn read(&self, pid: u32, address: u64, length: usize) -> Result<Vec<u8>>;
}

pub trait Connector: Send + Sync {
    type Device: Device;

    fn connect(&self, options: &StartupOptions) -> Result<Self::Device>;
}
