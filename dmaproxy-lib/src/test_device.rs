//! In-memory stand-in for the DMA device.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use anyhow::{anyhow, bail, Result};

use crate::{Connector, Device, ModuleEntry, StartupOptions};

#[derive(Clone, Default)]
pub struct Counters {
    connects: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
}

impl Counters {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Highest number of devices that were alive at the same time.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
struct Target {
    processes: HashMap<String, u32>,
    modules: HashMap<u32, Vec<ModuleEntry>>,
    /// pid -> (base address, bytes mapped from there)
    memory: HashMap<u32, (u64, Vec<u8>)>,
}

#[derive(Default)]
pub struct MockConnector {
    target: Arc<Target>,
    counters: Counters,
    failures: AtomicUsize,
    delay: Duration,
    release_delay: Duration,
    lookup_delay: Duration,
    options: Mutex<Vec<StartupOptions>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(mut self, name: &str, pid: u32) -> Self {
        Arc::make_mut(&mut self.target)
            .processes
            .insert(name.to_owned(), pid);
        self
    }

    pub fn with_module(mut self, pid: u32, name: &str, base_address: u64, image_size: u32) -> Self {
        Arc::make_mut(&mut self.target)
            .modules
            .entry(pid)
            .or_default()
            .push(ModuleEntry::new(name.to_owned(), base_address, image_size));
        self
    }

    pub fn with_memory(mut self, pid: u32, base_address: u64, bytes: Vec<u8>) -> Self {
        Arc::make_mut(&mut self.target)
            .memory
            .insert(pid, (base_address, bytes));
        self
    }

    pub fn failing_connects(self, count: usize) -> Self {
        self.failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_release_delay(mut self, delay: Duration) -> Self {
        self.release_delay = delay;
        self
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = delay;
        self
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn startup_options(&self) -> Vec<StartupOptions> {
        self.options.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    type Device = MockDevice;

    fn connect(&self, options: &StartupOptions) -> Result<MockDevice> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        self.options.lock().unwrap().push(options.clone());
        thread::sleep(self.delay);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            bail!("device not found");
        }
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(MockDevice {
            target: self.target.clone(),
            counters: self.counters.clone(),
            release_delay: self.release_delay,
            lookup_delay: self.lookup_delay,
        })
    }
}

pub struct MockDevice {
    target: Arc<Target>,
    counters: Counters,
    release_delay: Duration,
    lookup_delay: Duration,
}

impl Device for MockDevice {
    fn pid_from_name(&self, process_name: &str) -> Result<u32> {
        thread::sleep(self.lookup_delay);
        self.target
            .processes
            .get(process_name)
            .copied()
            .ok_or_else(|| anyhow!("process '{process_name}' does not exist"))
    }

    fn module_from_name(&self, pid: u32, module_name: &str) -> Result<Option<ModuleEntry>> {
        if !self.target.processes.values().any(|&x| x == pid) {
            bail!("pid {pid} does not exist");
        }
        Ok(self
            .target
            .modules
            .get(&pid)
            .and_then(|modules| modules.iter().find(|x| x.name == module_name))
            .cloned())
    }

    fn read(&self, pid: u32, address: u64, length: usize) -> Result<Vec<u8>> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        let Some((base, bytes)) = self.target.memory.get(&pid) else {
            bail!("pid {pid} has no memory");
        };
        let end = base + bytes.len() as u64;
        if address < *base || address >= end {
            bail!("{address:#x} is not mapped");
        }
        let start = (address - base) as usize;
        let available = (end - address) as usize;
        Ok(bytes[start..start + length.min(available)].to_vec())
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        thread::sleep(self.release_delay);
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}
