//! Read-only access to another process's memory.

use crate::memory::MemorySource;
use crate::{Result, TelemetryError};
use std::ffi::c_void;
use tracing::{debug, info};
use windows::Win32::Foundation::{CloseHandle, HANDLE, HMODULE};
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows::Win32::System::ProcessStatus::{
    EnumProcessModulesEx, EnumProcesses, GetModuleBaseNameW, LIST_MODULES_ALL,
};
use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ};

const MAX_PROCESSES: usize = 4096;
const MAX_MODULES: usize = 1024;

/// Handle to a running process opened for `PROCESS_VM_READ`.
#[derive(Debug)]
pub struct ProcessMemory {
    handle: HANDLE,
    pid: u32,
    name: String,
}

// SAFETY: the process handle is only used for reads and is owned by this value.
unsafe impl Send for ProcessMemory {}
unsafe impl Sync for ProcessMemory {}

impl ProcessMemory {
    /// Find a process by executable name (case-insensitive) and open it.
    pub fn attach(name: &str) -> Result<Self> {
        let pid = find_process_by_name(name)?;
        let handle = unsafe { OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid) }
            .map_err(|e| {
                TelemetryError::connection_failed_with_source(
                    format!("cannot open {} (pid {})", name, pid),
                    Box::new(e),
                )
            })?;

        info!(process = name, pid, "Attached to process");
        Ok(Self { handle, pid, name: name.to_string() })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn modules(&self) -> Result<Vec<HMODULE>> {
        let mut modules = vec![HMODULE::default(); MAX_MODULES];
        let mut needed = 0u32;

        unsafe {
            EnumProcessModulesEx(
                self.handle,
                modules.as_mut_ptr(),
                (modules.len() * std::mem::size_of::<HMODULE>()) as u32,
                &mut needed,
                LIST_MODULES_ALL,
            )
        }
        .map_err(|e| TelemetryError::windows_api_error("EnumProcessModulesEx", e))?;

        let count = (needed as usize / std::mem::size_of::<HMODULE>()).min(MAX_MODULES);
        modules.truncate(count);
        Ok(modules)
    }
}

impl MemorySource for ProcessMemory {
    fn read_bytes(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        let mut read = 0usize;
        unsafe {
            ReadProcessMemory(
                self.handle,
                address as *const c_void,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                Some(&mut read as *mut usize),
            )
        }
        .map_err(|_| TelemetryError::memory_access_error(address, buf.len()))?;

        if read != buf.len() {
            return Err(TelemetryError::memory_access_error(address, buf.len()));
        }
        Ok(())
    }

    fn module_base(&self, module: &str) -> Result<u64> {
        for handle in self.modules()? {
            let mut name_buf = [0u16; 260];
            let len = unsafe { GetModuleBaseNameW(self.handle, Some(handle), &mut name_buf) };
            if len == 0 {
                continue;
            }
            let name = String::from_utf16_lossy(&name_buf[..len as usize]);
            if name.eq_ignore_ascii_case(module) {
                let base = handle.0 as u64;
                debug!(module, base = format_args!("{:#x}", base), "Module found");
                return Ok(base);
            }
        }

        Err(TelemetryError::connection_failed(format!(
            "module {} not loaded in {} (pid {})",
            module, self.name, self.pid
        )))
    }
}

impl Drop for ProcessMemory {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

fn find_process_by_name(name: &str) -> Result<u32> {
    let mut pids = vec![0u32; MAX_PROCESSES];
    let mut bytes_returned = 0u32;

    unsafe {
        EnumProcesses(
            pids.as_mut_ptr(),
            (pids.len() * std::mem::size_of::<u32>()) as u32,
            &mut bytes_returned,
        )
    }
    .map_err(|e| TelemetryError::windows_api_error("EnumProcesses", e))?;

    let count = bytes_returned as usize / std::mem::size_of::<u32>();
    for &pid in pids.iter().take(count).filter(|pid| **pid != 0) {
        let Ok(process) =
            (unsafe { OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid) })
        else {
            continue;
        };

        let mut name_buf = [0u16; 260];
        let len = unsafe { GetModuleBaseNameW(process, None, &mut name_buf) };
        unsafe {
            let _ = CloseHandle(process);
        }

        if len > 0 && String::from_utf16_lossy(&name_buf[..len as usize]).eq_ignore_ascii_case(name) {
            return Ok(pid);
        }
    }

    Err(TelemetryError::connection_failed(format!("process {} not running", name)))
}
