use std::path::{Path, PathBuf};

use getset::Getters;

const DEVICE: &str = "FPGA";

#[derive(Clone, Debug, Getters, PartialEq, Eq)]
pub struct StartupOptions {
    #[get = "pub"]
    device: String,
    #[get = "pub"]
    memmap: Option<PathBuf>,
    #[get = "pub"]
    verbose: bool,
    #[get = "pub"]
    wait_initialize: bool,
}

impl StartupOptions {
    /// Uses `memmap` only if the file exists at the time of the call.
    pub fn detect(memmap: &Path) -> Self {
        Self {
            device: DEVICE.to_owned(),
            memmap: memmap.is_file().then(|| memmap.to_owned()),
            verbose: true,
            wait_initialize: true,
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.verbose {
            args.push("-printf".to_owned());
            args.push("-v".to_owned());
        }
        args.push("-device".to_owned());
        args.push(self.device.clone());
        if let Some(memmap) = &self.memmap {
            args.push("-memmap".to_owned());
            args.push(memmap.to_string_lossy().into_owned());
        }
        if self.wait_initialize {
            args.push("-waitinitialize".to_owned());
        }
        args
    }
}
