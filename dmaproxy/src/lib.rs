mod tracing_helper;

use std::{
    ffi::{c_char, CStr},
    path::PathBuf,
    ptr::null_mut,
    slice,
};

use anyhow::{anyhow, Result};
use dmaproxy_lib::{Connector, HardwareLink, MemoryProxy, ProxyConfig, VmmConnector};
use once_cell::sync::{Lazy, OnceCell};
use tracing::error;

const CONFIG_FILE_NAME: &str = "dmaproxy.toml";
const LOG_FILE_NAME: &str = "dmaproxy.log";

/// Directory of the loaded plugin binary, recorded at load time on Windows.
static PLUGIN_DIR: OnceCell<PathBuf> = OnceCell::new();

static CONFIG: Lazy<ProxyConfig> = Lazy::new(|| {
    let dir = plugin_dir();
    tracing_helper::init_tracing(&dir, LOG_FILE_NAME);
    ProxyConfig::load(&dir.join(CONFIG_FILE_NAME))
});

/// The one device link for the whole process. It outlives every proxy the
/// host creates, so re-creating a proxy never reconnects the device.
static LINK: Lazy<HardwareLink<VmmConnector>> =
    Lazy::new(|| HardwareLink::new(VmmConnector::new(plugin_dir().join(&CONFIG.vmm_library))));

pub type DmaProxy = MemoryProxy<'static, VmmConnector>;

#[repr(C)]
#[derive(Debug, Default)]
pub struct DmaModuleInfo {
    pub base_address: u64,
    pub size: u32,
}

fn plugin_dir() -> PathBuf {
    PLUGIN_DIR
        .get()
        .cloned()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default()
}

fn create_proxy() -> Result<DmaProxy> {
    let link: &'static HardwareLink<VmmConnector> = &LINK;
    Ok(MemoryProxy::new(link, CONFIG.memmap.clone())?)
}

unsafe fn to_str<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(anyhow!("null string"));
    }
    Ok(CStr::from_ptr(ptr).to_str()?)
}

fn module_info<C: Connector>(
    proxy: &MemoryProxy<'_, C>,
    module_name: &str,
    out: &mut DmaModuleInfo,
) -> bool {
    let Ok(module) = proxy.get_module(module_name) else {
        return false;
    };
    *out = DmaModuleInfo {
        base_address: module.base_address(),
        size: module.size(),
    };
    true
}

/// # Safety
/// `buffer` must be writable for `length` bytes, or null when `length` is 0.
unsafe fn read_into<C: Connector>(
    proxy: &MemoryProxy<'_, C>,
    address: u64,
    length: i32,
    buffer: *mut u8,
) -> bool {
    let Ok(bytes) = proxy.read(address, length) else {
        return false;
    };
    if bytes.is_empty() {
        return true;
    }
    if buffer.is_null() {
        error!("DmaRead called with a null buffer");
        return false;
    }
    slice::from_raw_parts_mut(buffer, bytes.len()).copy_from_slice(&bytes);
    true
}

unsafe fn as_proxy<'a>(proxy: *const DmaProxy) -> Option<&'a DmaProxy> {
    let proxy = proxy.as_ref();
    if proxy.is_none() {
        error!("called with a null proxy");
    }
    proxy
}

/// Creates a proxy, connecting the device on first use.
///
/// Returns null if the device could not be initialized.
#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn DmaCreate() -> *mut DmaProxy {
    match create_proxy() {
        Ok(proxy) => Box::into_raw(Box::new(proxy)),
        Err(_) => null_mut(),
    }
}

/// # Safety
/// `proxy` must come from [`DmaCreate`] and `process_name` must be a
/// NUL-terminated string.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn DmaAttachToProcess(
    proxy: *const DmaProxy,
    process_name: *const c_char,
) -> bool {
    let Some(proxy) = as_proxy(proxy) else {
        return false;
    };
    let process_name = match to_str(process_name) {
        Ok(process_name) => process_name,
        Err(err) => {
            error!("invalid process name: {}", err);
            return false;
        }
    };
    proxy.attach_to_process(process_name).is_ok()
}

/// # Safety
/// `proxy` must come from [`DmaCreate`], `module_name` must be a
/// NUL-terminated string and `out` must be writable.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn DmaGetModule(
    proxy: *const DmaProxy,
    module_name: *const c_char,
    out: *mut DmaModuleInfo,
) -> bool {
    let Some(proxy) = as_proxy(proxy) else {
        return false;
    };
    if out.is_null() {
        error!("DmaGetModule called with a null output");
        return false;
    }
    let module_name = match to_str(module_name) {
        Ok(module_name) => module_name,
        Err(err) => {
            error!("invalid module name: {}", err);
            return false;
        }
    };
    module_info(proxy, module_name, &mut *out)
}

/// Fills `buffer` with exactly `length` bytes; unreadable bytes become zero.
///
/// # Safety
/// `proxy` must come from [`DmaCreate`] and `buffer` must be writable for
/// `length` bytes.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn DmaRead(
    proxy: *const DmaProxy,
    address: u64,
    length: i32,
    buffer: *mut u8,
) -> bool {
    let Some(proxy) = as_proxy(proxy) else {
        return false;
    };
    read_into(proxy, address, length, buffer)
}

/// Releases the device. Safe to call repeatedly.
///
/// # Safety
/// `proxy` must be null or come from [`DmaCreate`].
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn DmaDispose(proxy: *const DmaProxy) {
    match proxy.as_ref() {
        Some(proxy) => proxy.dispose(),
        None => {
            LINK.close();
        }
    }
}

/// Frees a proxy handle without touching the device.
///
/// # Safety
/// `proxy` must be null or come from [`DmaCreate`], and must not be used
/// afterwards.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn DmaDestroy(proxy: *mut DmaProxy) {
    if !proxy.is_null() {
        drop(Box::from_raw(proxy));
    }
}

#[cfg(target_os = "windows")]
mod dll_main {
    use std::path::PathBuf;

    use windows::Win32::{
        Foundation::{HINSTANCE, HMODULE, MAX_PATH},
        System::{LibraryLoader::GetModuleFileNameW, SystemServices::DLL_PROCESS_ATTACH},
    };

    use crate::PLUGIN_DIR;

    #[no_mangle]
    pub extern "stdcall" fn DllMain(inst_dll: HINSTANCE, reason: u32, _reserved: u32) -> bool {
        if reason == DLL_PROCESS_ATTACH {
            let mut buf = [0u16; MAX_PATH as usize];
            let len = unsafe { GetModuleFileNameW(HMODULE::from(inst_dll), &mut buf) } as usize;
            if len > 0 {
                let dll_path = PathBuf::from(String::from_utf16_lossy(&buf[..len]));
                if let Some(dir) = dll_path.parent() {
                    let _ = PLUGIN_DIR.set(dir.to_owned());
                }
            }
        }
        true
    }
}
