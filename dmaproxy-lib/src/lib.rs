mod config;
mod device;
mod error;
mod hardware_link;
mod memory_proxy;
mod startup_options;
#[cfg(test)]
mod test_device;
mod vmm_device;

pub use crate::config::ProxyConfig;
pub use crate::device::{Connector, Device, ModuleEntry};
pub use crate::error::ProxyError;
pub use crate::hardware_link::HardwareLink;
pub use crate::memory_proxy::{MemoryProxy, ModuleDescriptor};
pub use crate::startup_options::StartupOptions;
pub use crate::vmm_device::{VmmConnector, VmmDevice};
