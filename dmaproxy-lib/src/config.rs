use std::{
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use serde::Deserialize;
use tracing::{info, warn};

#[cfg(target_os = "windows")]
const DEFAULT_VMM_LIBRARY: &str = "vmm.dll";
#[cfg(target_os = "macos")]
const DEFAULT_VMM_LIBRARY: &str = "vmm.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const DEFAULT_VMM_LIBRARY: &str = "vmm.so";

const DEFAULT_MEMMAP: &str = "mmap.txt";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProxyConfig {
    pub vmm_library: PathBuf,
    pub memmap: PathBuf,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            vmm_library: PathBuf::from(DEFAULT_VMM_LIBRARY),
            memmap: PathBuf::from(DEFAULT_MEMMAP),
        }
    }
}

impl ProxyConfig {
    fn parse(path: &Path) -> Result<Option<Self>> {
        let text = match read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(toml::from_str(&text)?))
    }

    /// Falls back to the defaults when the file is absent or unreadable.
    pub fn load(path: &Path) -> Self {
        match Self::parse(path) {
            Ok(Some(config)) => {
                info!("config loaded from {}", path.display());
                config
            }
            Ok(None) => Self::default(),
            Err(err) => {
                warn!("ignoring config {}: {}", path.display(), err);
                Self::default()
            }
        }
    }
}
