//! Locating and loading the engine DLLs.
//!
//! The provider DLLs are loaded before the loader DLL so the loader finds
//! them already resident. Candidate directories are tried in order: a
//! subfolder named after the host module, the module's own directory, then
//! the default DLL search path.

use std::path::{Path, PathBuf};

pub const UPSCALER_DLL: &str = "amd_fidelityfx_upscaler_dx12.dll";
pub const FRAMEGENERATION_DLL: &str = "amd_fidelityfx_framegeneration_dx12.dll";
pub const LOADER_DLL: &str = "amd_fidelityfx_loader_dx12.dll";

/// Directories to search, given the path of the module doing the loading.
/// `None` stands for the default search path.
pub fn search_order(module_path: &Path) -> Vec<Option<PathBuf>> {
    let dir = module_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut order = Vec::with_capacity(3);
    if let Some(stem) = module_path.file_stem() {
        order.push(Some(dir.join(stem)));
    }
    order.push(Some(dir));
    order.push(None);
    order
}

/// Full DLL paths for one candidate directory, providers first.
pub fn candidate_paths(dir: Option<&Path>) -> [PathBuf; 3] {
    let at = |name: &str| match dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    };
    [at(UPSCALER_DLL), at(FRAMEGENERATION_DLL), at(LOADER_DLL)]
}

#[cfg(target_os = "windows")]
pub use self::windows_impl::{current_module_path, FfxFunctions};

#[cfg(target_os = "windows")]
mod windows_impl {
    use std::ffi::c_void;
    use std::os::windows::ffi::OsStringExt;
    use std::path::{Path, PathBuf};

    use anyhow::{bail, Context, Result};
    use tracing::{debug, error, info};
    use windows::core::{HSTRING, PCSTR, PCWSTR};
    use windows::Win32::Foundation::HMODULE;
    use windows::Win32::System::LibraryLoader::{
        GetModuleFileNameW, GetModuleHandleExW, GetProcAddress, LoadLibraryExW,
        GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS, GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
        LOAD_LIBRARY_FLAGS, LOAD_WITH_ALTERED_SEARCH_PATH,
    };

    use super::{candidate_paths, search_order};
    use crate::ffi::*;

    /// The five engine entry points, resolved from the loader DLL.
    #[derive(Clone, Copy)]
    pub struct FfxFunctions {
        pub create_context: PfnFfxCreateContext,
        pub destroy_context: PfnFfxDestroyContext,
        pub configure: PfnFfxConfigure,
        pub query: PfnFfxQuery,
        pub dispatch: PfnFfxDispatch,
    }

    impl FfxFunctions {
        /// Load the provider and loader DLLs beside `module_path` and
        /// resolve the entry points. The DLLs stay loaded for the life of
        /// the process.
        pub fn load(module_path: &Path) -> Result<Self> {
            for dir in search_order(module_path) {
                let [upscaler, framegen, loader] = candidate_paths(dir.as_deref());
                // Providers are optional here; the loader reports a missing
                // provider when a context is created.
                let _ = load_library(&upscaler, dir.is_some());
                let _ = load_library(&framegen, dir.is_some());
                match load_library(&loader, dir.is_some()) {
                    Ok(module) => {
                        info!("Loaded {}", loader.display());
                        return Self::resolve(module);
                    }
                    Err(e) => debug!("{} not loaded: {e}", loader.display()),
                }
            }
            error!("{} not found", super::LOADER_DLL);
            bail!("{} not found next to {}", super::LOADER_DLL, module_path.display())
        }

        fn resolve(module: HMODULE) -> Result<Self> {
            let proc = |name: &[u8]| -> Result<*const c_void> {
                let addr = unsafe { GetProcAddress(module, PCSTR(name.as_ptr())) };
                match addr {
                    Some(f) => Ok(f as *const c_void),
                    None => bail!(
                        "entry point {} missing",
                        String::from_utf8_lossy(&name[..name.len() - 1])
                    ),
                }
            };
            unsafe {
                Ok(Self {
                    create_context: std::mem::transmute::<*const c_void, PfnFfxCreateContext>(
                        proc(b"ffxCreateContext\0")?,
                    ),
                    destroy_context: std::mem::transmute::<*const c_void, PfnFfxDestroyContext>(
                        proc(b"ffxDestroyContext\0")?,
                    ),
                    configure: std::mem::transmute::<*const c_void, PfnFfxConfigure>(proc(
                        b"ffxConfigure\0",
                    )?),
                    query: std::mem::transmute::<*const c_void, PfnFfxQuery>(proc(
                        b"ffxQuery\0",
                    )?),
                    dispatch: std::mem::transmute::<*const c_void, PfnFfxDispatch>(proc(
                        b"ffxDispatch\0",
                    )?),
                })
            }
        }
    }

    fn load_library(path: &Path, altered_search_path: bool) -> Result<HMODULE> {
        let flags = if altered_search_path {
            LOAD_WITH_ALTERED_SEARCH_PATH
        } else {
            LOAD_LIBRARY_FLAGS(0)
        };
        unsafe { LoadLibraryExW(&HSTRING::from(path), None, flags) }
            .with_context(|| format!("LoadLibraryExW({})", path.display()))
    }

    /// Path of the module containing this code (the injected DLL, or the
    /// executable when linked statically).
    pub fn current_module_path() -> Result<PathBuf> {
        let mut module = HMODULE::default();
        unsafe {
            GetModuleHandleExW(
                GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
                PCWSTR(current_module_path as *const () as *const u16),
                &mut module,
            )
        }
        .context("GetModuleHandleExW")?;

        let mut buf = vec![0u16; 1024];
        let len = unsafe { GetModuleFileNameW(Some(module), &mut buf) } as usize;
        if len == 0 {
            bail!("GetModuleFileNameW returned an empty path");
        }
        Ok(PathBuf::from(std::ffi::OsString::from_wide(&buf[..len])))
    }
}
