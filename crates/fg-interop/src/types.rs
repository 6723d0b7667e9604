//! Plain descriptor types shared by both APIs and the swap chain.
//!
//! Numeric values mirror their DXGI/D3D12 counterparts so backends can cast
//! instead of translating.

use bitflags::bitflags;

/// A DXGI surface format, kept open so host formats pass through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Format(pub u32);

impl Format {
    pub const UNKNOWN: Self = Self(0);
    pub const R32G32B32A32_FLOAT: Self = Self(2);
    pub const R16G16B16A16_FLOAT: Self = Self(10);
    pub const R10G10B10A2_UNORM: Self = Self(24);
    pub const R11G11B10_FLOAT: Self = Self(26);
    pub const R8G8B8A8_TYPELESS: Self = Self(27);
    pub const R8G8B8A8_UNORM: Self = Self(28);
    pub const R8G8B8A8_UNORM_SRGB: Self = Self(29);
    pub const R16G16_FLOAT: Self = Self(34);
    pub const R16G16_UNORM: Self = Self(35);
    pub const R32_TYPELESS: Self = Self(39);
    pub const D32_FLOAT: Self = Self(40);
    pub const R32_FLOAT: Self = Self(41);
    pub const B8G8R8A8_UNORM: Self = Self(87);
    pub const B8G8R8A8_TYPELESS: Self = Self(90);
    pub const B8G8R8A8_UNORM_SRGB: Self = Self(91);

    pub fn is_srgb(self) -> bool {
        matches!(self, Self::R8G8B8A8_UNORM_SRGB | Self::B8G8R8A8_UNORM_SRGB)
    }

    /// The linear variant of an sRGB format. Unordered access is not allowed
    /// on sRGB formats, so shared surfaces are always allocated linear.
    pub fn linear(self) -> Self {
        match self {
            Self::R8G8B8A8_UNORM_SRGB => Self::R8G8B8A8_UNORM,
            Self::B8G8R8A8_UNORM_SRGB => Self::B8G8R8A8_UNORM,
            other => other,
        }
    }

    /// Size of one texel, or `None` for formats this layer never allocates.
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            Self::R32G32B32A32_FLOAT => Some(16),
            Self::R16G16B16A16_FLOAT => Some(8),
            Self::R10G10B10A2_UNORM
            | Self::R11G11B10_FLOAT
            | Self::R8G8B8A8_TYPELESS
            | Self::R8G8B8A8_UNORM
            | Self::R8G8B8A8_UNORM_SRGB
            | Self::R16G16_FLOAT
            | Self::R16G16_UNORM
            | Self::R32_TYPELESS
            | Self::D32_FLOAT
            | Self::R32_FLOAT
            | Self::B8G8R8A8_UNORM
            | Self::B8G8R8A8_TYPELESS
            | Self::B8G8R8A8_UNORM_SRGB => Some(4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn covering(extent: Extent) -> Self {
        Self {
            left: 0,
            top: 0,
            width: extent.width as i32,
            height: extent.height as i32,
        }
    }
}

/// Logical description of a 2D image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub mip_levels: u16,
    pub array_size: u16,
}

impl ImageDesc {
    pub fn new(width: u32, height: u32, format: Format) -> Self {
        Self {
            width,
            height,
            format,
            mip_levels: 1,
            array_size: 1,
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }
}

bitflags! {
    /// Views a shared surface must be able to provide in API-A.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SurfaceUsage: u32 {
        const SHADER_RESOURCE = 1 << 0;
        const UNORDERED_ACCESS = 1 << 1;
        const RENDER_TARGET = 1 << 2;
    }
}

bitflags! {
    /// API-B allocation flags (`D3D12_RESOURCE_FLAGS`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceFlags: u32 {
        const ALLOW_RENDER_TARGET = 0x1;
        const ALLOW_UNORDERED_ACCESS = 0x4;
        const ALLOW_SIMULTANEOUS_ACCESS = 0x20;
    }
}

impl From<SurfaceUsage> for ResourceFlags {
    fn from(usage: SurfaceUsage) -> Self {
        let mut flags = ResourceFlags::ALLOW_SIMULTANEOUS_ACCESS;
        if usage.contains(SurfaceUsage::RENDER_TARGET) {
            flags |= ResourceFlags::ALLOW_RENDER_TARGET;
        }
        if usage.contains(SurfaceUsage::UNORDERED_ACCESS) {
            flags |= ResourceFlags::ALLOW_UNORDERED_ACCESS;
        }
        flags
    }
}

/// API-B resource states used by the present path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Common,
    CopySource,
    CopyDest,
    NonPixelShaderResource,
    UnorderedAccess,
}

/// A single resource-state transition recorded into an API-B command list.
#[derive(Debug)]
pub struct Transition<'a, I> {
    pub image: &'a I,
    pub before: ResourceState,
    pub after: ResourceState,
}

impl<I> Clone for Transition<'_, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I> Copy for Transition<'_, I> {}

impl<'a, I> Transition<'a, I> {
    pub fn new(image: &'a I, before: ResourceState, after: ResourceState) -> Self {
        Self {
            image,
            before,
            after,
        }
    }

    /// The transition that undoes this one.
    pub fn reversed(&self) -> Self {
        Self {
            image: self.image,
            before: self.after,
            after: self.before,
        }
    }
}

bitflags! {
    /// `DXGI_PRESENT` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PresentFlags: u32 {
        const TEST = 0x1;
        const DO_NOT_SEQUENCE = 0x2;
        const RESTART = 0x4;
        const DO_NOT_WAIT = 0x8;
        const ALLOW_TEARING = 0x200;
        const _ = !0;
    }
}

bitflags! {
    /// `DXGI_SWAP_CHAIN_FLAG` values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SwapChainFlags: u32 {
        const ALLOW_MODE_SWITCH = 0x2;
        const FRAME_LATENCY_WAITABLE_OBJECT = 0x40;
        const ALLOW_TEARING = 0x800;
        const _ = !0;
    }
}

/// Opaque native window handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowHandle(pub isize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub fn hz(self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            f64::from(self.numerator) / f64::from(self.denominator)
        }
    }
}

/// Swap chain description, covering both `DXGI_SWAP_CHAIN_DESC` and
/// `DXGI_SWAP_CHAIN_DESC1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub refresh_rate: Rational,
    pub sample_count: u32,
    pub buffer_usage: u32,
    pub buffer_count: u32,
    pub window: WindowHandle,
    pub windowed: bool,
    pub swap_effect: u32,
    pub flags: SwapChainFlags,
}

impl SwapChainDesc {
    pub const SWAP_EFFECT_FLIP_DISCARD: u32 = 4;
    pub const USAGE_RENDER_TARGET_OUTPUT: u32 = 0x20;

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }
}

/// `DXGI_MODE_DESC`, forwarded by `ResizeTarget`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeDesc {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: Rational,
    pub format: Format,
    pub scanline_ordering: u32,
    pub scaling: u32,
}

/// `DXGI_FRAME_STATISTICS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStatistics {
    pub present_count: u32,
    pub present_refresh_count: u32,
    pub sync_refresh_count: u32,
    pub sync_qpc_time: i64,
    pub sync_gpu_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_formats_become_linear() {
        assert_eq!(Format::R8G8B8A8_UNORM_SRGB.linear(), Format::R8G8B8A8_UNORM);
        assert_eq!(Format::B8G8R8A8_UNORM_SRGB.linear(), Format::B8G8R8A8_UNORM);
        assert_eq!(Format::R32_FLOAT.linear(), Format::R32_FLOAT);
    }

    #[test]
    fn usage_implies_allocation_flags() {
        let flags = ResourceFlags::from(SurfaceUsage::SHADER_RESOURCE);
        assert_eq!(flags, ResourceFlags::ALLOW_SIMULTANEOUS_ACCESS);

        let flags = ResourceFlags::from(SurfaceUsage::UNORDERED_ACCESS | SurfaceUsage::RENDER_TARGET);
        assert!(flags.contains(ResourceFlags::ALLOW_UNORDERED_ACCESS));
        assert!(flags.contains(ResourceFlags::ALLOW_RENDER_TARGET));
        assert!(flags.contains(ResourceFlags::ALLOW_SIMULTANEOUS_ACCESS));
    }
}
