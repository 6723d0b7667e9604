//! Conversions between this crate's plain types and their Win32 forms.

use windows::core::{BOOL, GUID};
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::error::HResult;
use crate::iid::Guid;
use crate::types::{
    Format, FrameStatistics, ModeDesc, Rational, ResourceState, SwapChainDesc, SwapChainFlags,
    WindowHandle,
};

/// Status code of a failed `windows` call.
pub fn hresult(e: windows::core::Error) -> HResult {
    HResult(e.code().0)
}

pub fn guid(iid: &Guid) -> GUID {
    GUID::from_u128(iid.0)
}

pub fn from_guid(guid: &GUID) -> Guid {
    Guid(guid.to_u128())
}

pub fn dxgi_format(format: Format) -> DXGI_FORMAT {
    DXGI_FORMAT(format.0 as i32)
}

pub fn format(format: DXGI_FORMAT) -> Format {
    Format(format.0 as u32)
}

pub fn resource_state(state: ResourceState) -> D3D12_RESOURCE_STATES {
    match state {
        ResourceState::Common => D3D12_RESOURCE_STATE_COMMON,
        ResourceState::CopySource => D3D12_RESOURCE_STATE_COPY_SOURCE,
        ResourceState::CopyDest => D3D12_RESOURCE_STATE_COPY_DEST,
        ResourceState::NonPixelShaderResource => D3D12_RESOURCE_STATE_NON_PIXEL_SHADER_RESOURCE,
        ResourceState::UnorderedAccess => D3D12_RESOURCE_STATE_UNORDERED_ACCESS,
    }
}

fn rational(r: DXGI_RATIONAL) -> Rational {
    Rational {
        numerator: r.Numerator,
        denominator: r.Denominator,
    }
}

fn dxgi_rational(r: Rational) -> DXGI_RATIONAL {
    DXGI_RATIONAL {
        Numerator: r.numerator,
        Denominator: r.denominator,
    }
}

pub fn mode_desc(mode: &ModeDesc) -> DXGI_MODE_DESC {
    DXGI_MODE_DESC {
        Width: mode.width,
        Height: mode.height,
        RefreshRate: dxgi_rational(mode.refresh_rate),
        Format: dxgi_format(mode.format),
        ScanlineOrdering: DXGI_MODE_SCANLINE_ORDER(mode.scanline_ordering as i32),
        Scaling: DXGI_MODE_SCALING(mode.scaling as i32),
    }
}

pub fn swap_chain_desc(desc: &DXGI_SWAP_CHAIN_DESC) -> SwapChainDesc {
    SwapChainDesc {
        width: desc.BufferDesc.Width,
        height: desc.BufferDesc.Height,
        format: format(desc.BufferDesc.Format),
        refresh_rate: rational(desc.BufferDesc.RefreshRate),
        sample_count: desc.SampleDesc.Count,
        buffer_usage: desc.BufferUsage.0,
        buffer_count: desc.BufferCount,
        window: WindowHandle(desc.OutputWindow.0 as isize),
        windowed: desc.Windowed.as_bool(),
        swap_effect: desc.SwapEffect.0 as u32,
        flags: SwapChainFlags::from_bits_retain(desc.Flags),
    }
}

pub fn dxgi_swap_chain_desc(desc: &SwapChainDesc) -> DXGI_SWAP_CHAIN_DESC {
    DXGI_SWAP_CHAIN_DESC {
        BufferDesc: DXGI_MODE_DESC {
            Width: desc.width,
            Height: desc.height,
            RefreshRate: dxgi_rational(desc.refresh_rate),
            Format: dxgi_format(desc.format),
            ..Default::default()
        },
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: desc.sample_count.max(1),
            Quality: 0,
        },
        BufferUsage: DXGI_USAGE(desc.buffer_usage),
        BufferCount: desc.buffer_count,
        OutputWindow: window(desc.window),
        Windowed: BOOL::from(desc.windowed),
        SwapEffect: DXGI_SWAP_EFFECT(desc.swap_effect as i32),
        Flags: desc.flags.bits(),
    }
}

/// The flip-model `DESC1` the engine creates its swap chain from.
pub fn swap_chain_desc1(desc: &SwapChainDesc) -> DXGI_SWAP_CHAIN_DESC1 {
    DXGI_SWAP_CHAIN_DESC1 {
        Width: desc.width,
        Height: desc.height,
        Format: dxgi_format(desc.format),
        Stereo: BOOL::from(false),
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        BufferUsage: DXGI_USAGE(desc.buffer_usage),
        BufferCount: desc.buffer_count,
        Scaling: DXGI_SCALING_STRETCH,
        SwapEffect: DXGI_SWAP_EFFECT(desc.swap_effect as i32),
        AlphaMode: DXGI_ALPHA_MODE_UNSPECIFIED,
        Flags: desc.flags.bits(),
    }
}

pub fn fullscreen_desc(desc: &SwapChainDesc) -> DXGI_SWAP_CHAIN_FULLSCREEN_DESC {
    DXGI_SWAP_CHAIN_FULLSCREEN_DESC {
        RefreshRate: dxgi_rational(desc.refresh_rate),
        ScanlineOrdering: DXGI_MODE_SCANLINE_ORDER_UNSPECIFIED,
        Scaling: DXGI_MODE_SCALING_UNSPECIFIED,
        Windowed: BOOL::from(desc.windowed),
    }
}

pub fn window(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut _)
}

pub fn frame_statistics(stats: &DXGI_FRAME_STATISTICS) -> FrameStatistics {
    FrameStatistics {
        present_count: stats.PresentCount,
        present_refresh_count: stats.PresentRefreshCount,
        sync_refresh_count: stats.SyncRefreshCount,
        sync_qpc_time: stats.SyncQPCTime,
        sync_gpu_time: stats.SyncGPUTime,
    }
}
