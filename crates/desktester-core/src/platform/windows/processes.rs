//! Process enumeration, launch and termination

use crate::error::{Error, Result};
use std::path::Path;
use windows::Win32::Foundation::CloseHandle;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

#[derive(Debug, Clone)]
pub struct Process {
    pub pid: i32,
    /// Executable name without `.exe`.
    pub name: String,
}

pub fn processes() -> Vec<Process> {
    let mut out = Vec::new();
    unsafe {
        let Ok(snapshot) = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) else {
            return out;
        };
        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };
        if Process32FirstW(snapshot, &mut entry).is_ok() {
            loop {
                let len = entry
                    .szExeFile
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(entry.szExeFile.len());
                let exe = String::from_utf16_lossy(&entry.szExeFile[..len]);
                out.push(Process {
                    pid: entry.th32ProcessID as i32,
                    name: exe_stem(&exe),
                });
                if Process32NextW(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }
        let _ = CloseHandle(snapshot);
    }
    out
}

pub fn exe_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

pub fn name_of(pid: i32) -> Option<String> {
    processes().into_iter().find(|p| p.pid == pid).map(|p| p.name)
}

pub fn spawn(path: &str, args: &[String]) -> Result<i32> {
    let child = std::process::Command::new(path)
        .args(args)
        .spawn()
        .map_err(|e| {
            tracing::debug!(path, error = %e, "spawn failed");
            Error::application_not_found(path)
        })?;
    Ok(child.id() as i32)
}

pub fn terminate(pid: i32) -> Result<()> {
    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, false, pid as u32)
            .map_err(|e| Error::action_failed("terminate", &format!("{:?}", e)))?;
        let result = TerminateProcess(handle, 1);
        let _ = CloseHandle(handle);
        result.map_err(|e| Error::action_failed("terminate", &format!("{:?}", e)))
    }
}

pub fn alive(pid: i32) -> bool {
    processes().iter().any(|p| p.pid == pid)
}
