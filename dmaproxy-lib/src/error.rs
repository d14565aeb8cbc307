use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to initialize the DMA device")]
    Initialization {
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to attach to process '{process_name}'")]
    Attach {
        process_name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to get module '{module_name}'")]
    ModuleLookup {
        module_name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to read memory at {address:#X}")]
    Read {
        address: u64,
        #[source]
        source: anyhow::Error,
    },
}

impl ProxyError {
    pub fn initialization(source: anyhow::Error) -> Self {
        Self::Initialization { source }
    }

    pub fn attach(process_name: &str, source: anyhow::Error) -> Self {
        Self::Attach {
            process_name: process_name.to_owned(),
            source,
        }
    }

    pub fn module_lookup(module_name: &str, source: anyhow::Error) -> Self {
        Self::ModuleLookup {
            module_name: module_name.to_owned(),
            source,
        }
    }

    pub fn read(address: u64, source: anyhow::Error) -> Self {
        Self::Read { address, source }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use anyhow::anyhow;

    use super::*;

    #[test]
    fn read_error_shows_hex_address() {
        let err = ProxyError::read(0x7ff6_1234_0000, anyhow!("VMMDLL_MemReadEx: fail."));
        assert_eq!(err.to_string(), "failed to read memory at 0x7FF612340000");
    }

    #[test]
    fn source_is_the_device_error() {
        let err = ProxyError::module_lookup("UnityPlayer.dll", anyhow!("module not found"));
        assert_eq!(err.source().unwrap().to_string(), "module not found");
        assert!(err.to_string().contains("UnityPlayer.dll"));
    }
}
