//! The facade as a real `IDXGISwapChain4` COM object.
//!
//! The object carries its own 41-entry vtable. `QueryInterface`, `AddRef`,
//! `Release`, `GetDevice`, `Present`, `Present1`, `GetBuffer`,
//! `ResizeBuffers` and `ResizeBuffers1` call into the [`ComHost`]; every
//! other slot jumps straight to the same slot of the native swap chain with
//! the native object as `this`, so the host sees exactly what it would have
//! seen without the facade.

use std::ffi::c_void;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use windows::core::{IUnknown, Interface, GUID};
use windows::Win32::Graphics::Direct3D11::{ID3D11Device, ID3D11Texture2D};
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT;
use windows::Win32::Graphics::Dxgi::{IDXGIOutput, IDXGISwapChain4};

use super::convert::{format, from_guid};
use crate::error::HResult;
use crate::swapchain::{DeviceRef, HostSwapChain, Queried};
use crate::types::{PresentFlags, SwapChainFlags};

/// What the COM object calls into.
pub type ComHost = dyn HostSwapChain<
    Texture = ID3D11Texture2D,
    Device = ID3D11Device,
    Object = IUnknown,
    Output = IDXGIOutput,
>;

const SLOTS: usize = 41;

#[repr(C)]
struct FacadeObject {
    vtbl: *const *const c_void,
    slots: [*const c_void; SLOTS],
    refs: AtomicU32,
    native: IDXGISwapChain4,
    host: Mutex<Box<ComHost>>,
}

/// Wrap `host` in a COM object answering for the whole swap-chain family.
///
/// `native` is the swap chain non-intercepted calls are forwarded to. The
/// returned reference owns the object; the last `Release` drops `host`.
pub fn into_com(host: Box<ComHost>, native: IDXGISwapChain4) -> IDXGISwapChain4 {
    let object = Box::new(FacadeObject {
        vtbl: std::ptr::null(),
        slots: vtable(),
        refs: AtomicU32::new(1),
        native,
        host: Mutex::new(host),
    });
    let raw = Box::into_raw(object);
    unsafe {
        (*raw).vtbl = (*raw).slots.as_ptr();
        IDXGISwapChain4::from_raw(raw.cast())
    }
}

unsafe fn object<'a>(this: *mut c_void) -> &'a FacadeObject {
    unsafe { &*this.cast::<FacadeObject>() }
}

/// The native object and its function pointer at `slot`.
unsafe fn native_slot(this: *mut c_void, slot: usize) -> (*mut c_void, *const c_void) {
    unsafe {
        let native = object(this).native.as_raw();
        let vtbl = *native.cast::<*const *const c_void>();
        (native, *vtbl.add(slot))
    }
}

macro_rules! forward {
    ($name:ident, $slot:expr, ($($arg:ident: $ty:ty),*) -> $ret:ty) => {
        unsafe extern "system" fn $name(this: *mut c_void, $($arg: $ty),*) -> $ret {
            unsafe {
                let (native, f) = native_slot(this, $slot);
                let f: unsafe extern "system" fn(*mut c_void, $($ty),*) -> $ret =
                    std::mem::transmute(f);
                f(native, $($arg),*)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Pass-through slots
// ---------------------------------------------------------------------------

forward!(set_private_data, 3, (name: *const GUID, size: u32, data: *const c_void) -> i32);
forward!(set_private_data_interface, 4, (name: *const GUID, object: *mut c_void) -> i32);
forward!(get_private_data, 5, (name: *const GUID, size: *mut u32, data: *mut c_void) -> i32);
forward!(get_parent, 6, (riid: *const GUID, ppv: *mut *mut c_void) -> i32);
forward!(set_fullscreen_state, 10, (fullscreen: i32, target: *mut c_void) -> i32);
forward!(get_fullscreen_state, 11, (fullscreen: *mut i32, target: *mut *mut c_void) -> i32);
forward!(get_desc, 12, (desc: *mut c_void) -> i32);
forward!(resize_target, 14, (mode: *const c_void) -> i32);
forward!(get_containing_output, 15, (output: *mut *mut c_void) -> i32);
forward!(get_frame_statistics, 16, (stats: *mut c_void) -> i32);
forward!(get_last_present_count, 17, (count: *mut u32) -> i32);
forward!(get_desc1, 18, (desc: *mut c_void) -> i32);
forward!(get_fullscreen_desc, 19, (desc: *mut c_void) -> i32);
forward!(get_hwnd, 20, (hwnd: *mut *mut c_void) -> i32);
forward!(get_core_window, 21, (riid: *const GUID, ppv: *mut *mut c_void) -> i32);
forward!(is_temporary_mono_supported, 23, () -> i32);
forward!(get_restrict_to_output, 24, (output: *mut *mut c_void) -> i32);
forward!(set_background_color, 25, (color: *const c_void) -> i32);
forward!(get_background_color, 26, (color: *mut c_void) -> i32);
forward!(set_rotation, 27, (rotation: i32) -> i32);
forward!(get_rotation, 28, (rotation: *mut i32) -> i32);
forward!(set_source_size, 29, (width: u32, height: u32) -> i32);
forward!(get_source_size, 30, (width: *mut u32, height: *mut u32) -> i32);
forward!(set_maximum_frame_latency, 31, (latency: u32) -> i32);
forward!(get_maximum_frame_latency, 32, (latency: *mut u32) -> i32);
forward!(get_frame_latency_waitable_object, 33, () -> *mut c_void);
forward!(set_matrix_transform, 34, (matrix: *const c_void) -> i32);
forward!(get_matrix_transform, 35, (matrix: *mut c_void) -> i32);
forward!(get_current_back_buffer_index, 36, () -> u32);
forward!(check_color_space_support, 37, (space: i32, support: *mut u32) -> i32);
forward!(set_color_space1, 38, (space: i32) -> i32);
forward!(set_hdr_meta_data, 40, (kind: i32, size: u32, data: *mut c_void) -> i32);

// ---------------------------------------------------------------------------
// Intercepted slots
// ---------------------------------------------------------------------------

unsafe extern "system" fn query_interface(
    this: *mut c_void,
    riid: *const GUID,
    ppv: *mut *mut c_void,
) -> i32 {
    if riid.is_null() || ppv.is_null() {
        return HResult::E_POINTER.0;
    }
    unsafe {
        *ppv = std::ptr::null_mut();
        let iid = from_guid(&*riid);
        let queried = object(this).host.lock().query_interface(&iid);
        match queried {
            Ok(Queried::Facade) => {
                add_ref(this);
                *ppv = this;
                HResult::OK.0
            }
            Ok(Queried::Native(native)) => {
                *ppv = native.into_raw();
                HResult::OK.0
            }
            Err(code) => code.0,
        }
    }
}

unsafe extern "system" fn add_ref(this: *mut c_void) -> u32 {
    unsafe { object(this).refs.fetch_add(1, Ordering::Relaxed) + 1 }
}

unsafe extern "system" fn release(this: *mut c_void) -> u32 {
    let remaining = unsafe { object(this).refs.fetch_sub(1, Ordering::AcqRel) - 1 };
    if remaining == 0 {
        drop(unsafe { Box::from_raw(this.cast::<FacadeObject>()) });
    }
    remaining
}

unsafe extern "system" fn get_device(
    this: *mut c_void,
    riid: *const GUID,
    ppv: *mut *mut c_void,
) -> i32 {
    if riid.is_null() || ppv.is_null() {
        return HResult::E_POINTER.0;
    }
    unsafe {
        *ppv = std::ptr::null_mut();
        let device = object(this).host.lock().get_device(&from_guid(&*riid));
        match device {
            Ok(DeviceRef::Bridged(device)) => device.query(riid, ppv).0,
            Ok(DeviceRef::Native(native)) => {
                *ppv = native.into_raw();
                HResult::OK.0
            }
            Err(code) => code.0,
        }
    }
}

unsafe extern "system" fn present(this: *mut c_void, sync_interval: u32, flags: u32) -> i32 {
    let flags = PresentFlags::from_bits_retain(flags);
    unsafe { object(this).host.lock().present(sync_interval, flags).0 }
}

/// Dirty rects and scroll parameters are dropped: the engine presents whole
/// frames.
unsafe extern "system" fn present1(
    this: *mut c_void,
    sync_interval: u32,
    flags: u32,
    _parameters: *const c_void,
) -> i32 {
    unsafe { present(this, sync_interval, flags) }
}

unsafe extern "system" fn get_buffer(
    this: *mut c_void,
    index: u32,
    riid: *const GUID,
    ppv: *mut *mut c_void,
) -> i32 {
    if riid.is_null() || ppv.is_null() {
        return HResult::E_POINTER.0;
    }
    unsafe {
        *ppv = std::ptr::null_mut();
        let buffer = object(this).host.lock().get_buffer(index, &from_guid(&*riid));
        match buffer {
            Ok(texture) => texture.query(riid, ppv).0,
            Err(code) => code.0,
        }
    }
}

unsafe extern "system" fn resize_buffers(
    this: *mut c_void,
    buffer_count: u32,
    width: u32,
    height: u32,
    new_format: DXGI_FORMAT,
    flags: u32,
) -> i32 {
    let flags = SwapChainFlags::from_bits_retain(flags);
    unsafe {
        object(this)
            .host
            .lock()
            .resize_buffers(buffer_count, width, height, format(new_format), flags)
            .0
    }
}

/// Per-buffer node masks and queues are ignored: every buffer lives on the
/// one direct queue the engine presents from.
unsafe extern "system" fn resize_buffers1(
    this: *mut c_void,
    buffer_count: u32,
    width: u32,
    height: u32,
    new_format: DXGI_FORMAT,
    flags: u32,
    _node_masks: *const u32,
    _queues: *const *mut c_void,
) -> i32 {
    unsafe { resize_buffers(this, buffer_count, width, height, new_format, flags) }
}

fn vtable() -> [*const c_void; SLOTS] {
    [
        query_interface as *const c_void,
        add_ref as *const c_void,
        release as *const c_void,
        set_private_data as *const c_void,
        set_private_data_interface as *const c_void,
        get_private_data as *const c_void,
        get_parent as *const c_void,
        get_device as *const c_void,
        present as *const c_void,
        get_buffer as *const c_void,
        set_fullscreen_state as *const c_void,
        get_fullscreen_state as *const c_void,
        get_desc as *const c_void,
        resize_buffers as *const c_void,
        resize_target as *const c_void,
        get_containing_output as *const c_void,
        get_frame_statistics as *const c_void,
        get_last_present_count as *const c_void,
        get_desc1 as *const c_void,
        get_fullscreen_desc as *const c_void,
        get_hwnd as *const c_void,
        get_core_window as *const c_void,
        present1 as *const c_void,
        is_temporary_mono_supported as *const c_void,
        get_restrict_to_output as *const c_void,
        set_background_color as *const c_void,
        get_background_color as *const c_void,
        set_rotation as *const c_void,
        get_rotation as *const c_void,
        set_source_size as *const c_void,
        get_source_size as *const c_void,
        set_maximum_frame_latency as *const c_void,
        get_maximum_frame_latency as *const c_void,
        get_frame_latency_waitable_object as *const c_void,
        set_matrix_transform as *const c_void,
        get_matrix_transform as *const c_void,
        get_current_back_buffer_index as *const c_void,
        check_color_space_support as *const c_void,
        set_color_space1 as *const c_void,
        resize_buffers1 as *const c_void,
        set_hdr_meta_data as *const c_void,
    ]
}
