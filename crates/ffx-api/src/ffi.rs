//! Hardcoded FidelityFX API constants and C-repr descriptor structs.
//!
//! Every descriptor begins with an [`ApiHeader`]; descriptors are chained
//! through `next` and handed to the five entry points as a pointer to the
//! first header. COM objects are carried as raw `*mut c_void`.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::ffi::c_void;
use std::ptr;

use num_derive::FromPrimitive;

pub type ffxContext = *mut c_void;
pub type ffxStructType_t = u64;
pub type ffxReturnCode_t = u32;

// =====================================================================
// Return codes
// =====================================================================

pub const FFX_API_RETURN_OK: ffxReturnCode_t = 0;
pub const FFX_API_RETURN_ERROR: ffxReturnCode_t = 1;
pub const FFX_API_RETURN_ERROR_UNKNOWN_DESCTYPE: ffxReturnCode_t = 2;
pub const FFX_API_RETURN_ERROR_RUNTIME_ERROR: ffxReturnCode_t = 3;
pub const FFX_API_RETURN_NO_PROVIDER: ffxReturnCode_t = 4;
pub const FFX_API_RETURN_ERROR_MEMORY: ffxReturnCode_t = 5;
pub const FFX_API_RETURN_ERROR_PARAMETER: ffxReturnCode_t = 6;

/// Typed view of a return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum ReturnCode {
    Ok = 0,
    Error = 1,
    UnknownDescType = 2,
    RuntimeError = 3,
    NoProvider = 4,
    Memory = 5,
    Parameter = 6,
}

impl ReturnCode {
    pub fn from_raw(code: ffxReturnCode_t) -> Option<Self> {
        num_traits::FromPrimitive::from_u32(code)
    }
}

// =====================================================================
// Descriptor types
// =====================================================================

pub const FFX_API_CREATE_CONTEXT_DESC_TYPE_BACKEND_DX12: ffxStructType_t = 0x0000_0002;

pub const FFX_API_CREATE_CONTEXT_DESC_TYPE_UPSCALE: ffxStructType_t = 0x0001_0000;
pub const FFX_API_DISPATCH_DESC_TYPE_UPSCALE: ffxStructType_t = 0x0001_0001;
pub const FFX_API_QUERY_DESC_TYPE_UPSCALE_GETJITTEROFFSET: ffxStructType_t = 0x0001_0005;

pub const FFX_API_CREATE_CONTEXT_DESC_TYPE_FRAMEGENERATION: ffxStructType_t = 0x0002_0001;
pub const FFX_API_CONFIGURE_DESC_TYPE_FRAMEGENERATION: ffxStructType_t = 0x0002_0002;
pub const FFX_API_DISPATCH_DESC_TYPE_FRAMEGENERATION: ffxStructType_t = 0x0002_0003;
pub const FFX_API_DISPATCH_DESC_TYPE_FRAMEGENERATION_PREPARE: ffxStructType_t = 0x0002_0004;
pub const FFX_API_DISPATCH_DESC_TYPE_FRAMEGENERATION_PREPARE_CAMERAINFO: ffxStructType_t =
    0x0002_000a;

pub const FFX_API_CREATE_CONTEXT_DESC_TYPE_FGSWAPCHAIN_FOR_HWND_DX12: ffxStructType_t =
    0x0003_0006;
pub const FFX_API_CONFIGURE_DESC_TYPE_FGSWAPCHAIN_KEYVALUE_DX12: ffxStructType_t = 0x0003_0007;

pub const FFX_API_CONFIGURE_FG_SWAPCHAIN_KEY_FRAMEPACINGTUNING: u64 = 2;

// =====================================================================
// Flags
// =====================================================================

pub const FFX_UPSCALE_ENABLE_HIGH_DYNAMIC_RANGE: u32 = 1 << 0;
pub const FFX_UPSCALE_ENABLE_DISPLAY_RESOLUTION_MOTION_VECTORS: u32 = 1 << 1;
pub const FFX_UPSCALE_ENABLE_MOTION_VECTORS_JITTER_CANCELLATION: u32 = 1 << 2;

pub const FFX_FRAMEGENERATION_ENABLE_ASYNC_WORKLOAD_SUPPORT: u32 = 1 << 0;
pub const FFX_FRAMEGENERATION_ENABLE_DISPLAY_RESOLUTION_MOTION_VECTORS: u32 = 1 << 1;
pub const FFX_FRAMEGENERATION_ENABLE_MOTION_VECTORS_JITTER_CANCELLATION: u32 = 1 << 2;
pub const FFX_FRAMEGENERATION_ENABLE_HIGH_DYNAMIC_RANGE: u32 = 1 << 5;

pub const FFX_API_BACKBUFFER_TRANSFER_FUNCTION_SRGB: u32 = 0;

// =====================================================================
// Resources
// =====================================================================

pub const FFX_API_RESOURCE_TYPE_TEXTURE2D: u32 = 2;

pub const FFX_API_RESOURCE_STATE_COMMON: u32 = 1 << 0;
pub const FFX_API_RESOURCE_STATE_UNORDERED_ACCESS: u32 = 1 << 1;
pub const FFX_API_RESOURCE_STATE_COMPUTE_READ: u32 = 1 << 2;
pub const FFX_API_RESOURCE_STATE_PIXEL_READ: u32 = 1 << 3;
pub const FFX_API_RESOURCE_STATE_COPY_SRC: u32 = 1 << 4;
pub const FFX_API_RESOURCE_STATE_COPY_DEST: u32 = 1 << 5;

pub const FFX_API_RESOURCE_USAGE_READ_ONLY: u32 = 0;
pub const FFX_API_RESOURCE_USAGE_RENDERTARGET: u32 = 1 << 0;
pub const FFX_API_RESOURCE_USAGE_UAV: u32 = 1 << 1;

pub const FFX_API_SURFACE_FORMAT_UNKNOWN: u32 = 0;
pub const FFX_API_SURFACE_FORMAT_R32G32B32A32_FLOAT: u32 = 3;
pub const FFX_API_SURFACE_FORMAT_R16G16B16A16_FLOAT: u32 = 4;
pub const FFX_API_SURFACE_FORMAT_R8G8B8A8_TYPELESS: u32 = 8;
pub const FFX_API_SURFACE_FORMAT_R8G8B8A8_UNORM: u32 = 9;
pub const FFX_API_SURFACE_FORMAT_R8G8B8A8_SRGB: u32 = 11;
pub const FFX_API_SURFACE_FORMAT_B8G8R8A8_TYPELESS: u32 = 12;
pub const FFX_API_SURFACE_FORMAT_B8G8R8A8_UNORM: u32 = 13;
pub const FFX_API_SURFACE_FORMAT_B8G8R8A8_SRGB: u32 = 14;
pub const FFX_API_SURFACE_FORMAT_R11G11B10_FLOAT: u32 = 15;
pub const FFX_API_SURFACE_FORMAT_R10G10B10A2_UNORM: u32 = 16;
pub const FFX_API_SURFACE_FORMAT_R16G16_FLOAT: u32 = 17;
pub const FFX_API_SURFACE_FORMAT_R32_FLOAT: u32 = 27;
pub const FFX_API_SURFACE_FORMAT_R32_TYPELESS: u32 = 36;

/// Engine surface format for a DXGI format value.
pub fn surface_format(dxgi_format: u32) -> u32 {
    match dxgi_format {
        2 => FFX_API_SURFACE_FORMAT_R32G32B32A32_FLOAT,
        10 => FFX_API_SURFACE_FORMAT_R16G16B16A16_FLOAT,
        24 => FFX_API_SURFACE_FORMAT_R10G10B10A2_UNORM,
        26 => FFX_API_SURFACE_FORMAT_R11G11B10_FLOAT,
        27 => FFX_API_SURFACE_FORMAT_R8G8B8A8_TYPELESS,
        28 => FFX_API_SURFACE_FORMAT_R8G8B8A8_UNORM,
        29 => FFX_API_SURFACE_FORMAT_R8G8B8A8_SRGB,
        34 => FFX_API_SURFACE_FORMAT_R16G16_FLOAT,
        39 | 40 => FFX_API_SURFACE_FORMAT_R32_TYPELESS,
        41 => FFX_API_SURFACE_FORMAT_R32_FLOAT,
        87 => FFX_API_SURFACE_FORMAT_B8G8R8A8_UNORM,
        90 => FFX_API_SURFACE_FORMAT_B8G8R8A8_TYPELESS,
        91 => FFX_API_SURFACE_FORMAT_B8G8R8A8_SRGB,
        _ => FFX_API_SURFACE_FORMAT_UNKNOWN,
    }
}

// =====================================================================
// Structs
// =====================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ApiHeader {
    pub type_: ffxStructType_t,
    pub next: *mut ApiHeader,
}

impl ApiHeader {
    pub fn new(type_: ffxStructType_t) -> Self {
        Self {
            type_,
            next: ptr::null_mut(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FfxApiDimensions2D {
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FfxApiFloatCoords2D {
    pub x: f32,
    pub y: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FfxApiRect2D {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FfxApiResourceDescription {
    pub type_: u32,
    pub format: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_count: u32,
    pub flags: u32,
    pub usage: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfxApiResource {
    pub resource: *mut c_void,
    pub description: FfxApiResourceDescription,
    pub state: u32,
}

impl FfxApiResource {
    /// The "no resource" value.
    pub const NULL: Self = Self {
        resource: ptr::null_mut(),
        description: FfxApiResourceDescription {
            type_: 0,
            format: 0,
            width: 0,
            height: 0,
            depth: 0,
            mip_count: 0,
            flags: 0,
            usage: 0,
        },
        state: FFX_API_RESOURCE_STATE_COMMON,
    };
}

impl Default for FfxApiResource {
    fn default() -> Self {
        Self::NULL
    }
}

#[repr(C)]
pub struct ffxCreateBackendDX12Desc {
    pub header: ApiHeader,
    /// `ID3D12Device*`
    pub device: *mut c_void,
}

#[repr(C)]
pub struct ffxCreateContextDescUpscale {
    pub header: ApiHeader,
    pub flags: u32,
    pub maxRenderSize: FfxApiDimensions2D,
    pub maxUpscaleSize: FfxApiDimensions2D,
    pub fpMessage: *mut c_void,
}

#[repr(C)]
pub struct ffxDispatchDescUpscale {
    pub header: ApiHeader,
    pub commandList: *mut c_void,
    pub color: FfxApiResource,
    pub depth: FfxApiResource,
    pub motionVectors: FfxApiResource,
    pub exposure: FfxApiResource,
    pub reactive: FfxApiResource,
    pub transparencyAndComposition: FfxApiResource,
    pub output: FfxApiResource,
    pub jitterOffset: FfxApiFloatCoords2D,
    pub motionVectorScale: FfxApiFloatCoords2D,
    pub renderSize: FfxApiDimensions2D,
    pub upscaleSize: FfxApiDimensions2D,
    pub enableSharpening: bool,
    pub sharpness: f32,
    pub frameTimeDelta: f32,
    pub preExposure: f32,
    pub reset: bool,
    pub cameraNear: f32,
    pub cameraFar: f32,
    pub cameraFovAngleVertical: f32,
    pub viewSpaceToMetersFactor: f32,
    pub flags: u32,
}

#[repr(C)]
pub struct ffxQueryDescUpscaleGetJitterOffset {
    pub header: ApiHeader,
    pub index: i32,
    pub phaseCount: i32,
    pub pOutX: *mut f32,
    pub pOutY: *mut f32,
}

#[repr(C)]
pub struct ffxCreateContextDescFrameGeneration {
    pub header: ApiHeader,
    pub flags: u32,
    pub displaySize: FfxApiDimensions2D,
    pub maxRenderSize: FfxApiDimensions2D,
    pub backBufferFormat: u32,
}

pub type FfxApiPresentCallbackFunc =
    Option<unsafe extern "C" fn(params: *mut c_void, user: *mut c_void) -> ffxReturnCode_t>;

pub type FfxApiFrameGenerationDispatchFunc = Option<
    unsafe extern "C" fn(
        params: *mut ffxDispatchDescFrameGeneration,
        user: *mut c_void,
    ) -> ffxReturnCode_t,
>;

#[repr(C)]
pub struct ffxConfigureDescFrameGeneration {
    pub header: ApiHeader,
    /// `IDXGISwapChain4*`
    pub swapChain: *mut c_void,
    pub presentCallback: FfxApiPresentCallbackFunc,
    pub presentCallbackUserContext: *mut c_void,
    pub frameGenerationCallback: FfxApiFrameGenerationDispatchFunc,
    pub frameGenerationCallbackUserContext: *mut c_void,
    pub frameGenerationEnabled: bool,
    pub allowAsyncWorkloads: bool,
    pub HUDLessColor: FfxApiResource,
    pub flags: u32,
    pub onlyPresentGenerated: bool,
    pub generationRect: FfxApiRect2D,
    pub frameID: u64,
}

#[repr(C)]
pub struct ffxDispatchDescFrameGeneration {
    pub header: ApiHeader,
    pub commandList: *mut c_void,
    pub presentColor: FfxApiResource,
    pub outputs: [FfxApiResource; 4],
    pub numGeneratedFrames: u32,
    pub reset: bool,
    pub backbufferTransferFunction: u32,
    pub minMaxLuminance: [f32; 2],
    pub generationRect: FfxApiRect2D,
    pub frameID: u64,
}

#[repr(C)]
pub struct ffxDispatchDescFrameGenerationPrepare {
    pub header: ApiHeader,
    pub frameID: u64,
    pub flags: u32,
    pub commandList: *mut c_void,
    pub renderSize: FfxApiDimensions2D,
    pub jitterOffset: FfxApiFloatCoords2D,
    pub motionVectorScale: FfxApiFloatCoords2D,
    pub frameTimeDelta: f32,
    pub unused_reset: bool,
    pub cameraNear: f32,
    pub cameraFar: f32,
    pub cameraFovAngleVertical: f32,
    pub viewSpaceToMetersFactor: f32,
    pub depth: FfxApiResource,
    pub motionVectors: FfxApiResource,
}

#[repr(C)]
pub struct ffxDispatchDescFrameGenerationPrepareCameraInfo {
    pub header: ApiHeader,
    pub cameraPosition: [f32; 3],
    pub cameraUp: [f32; 3],
    pub cameraRight: [f32; 3],
    pub cameraForward: [f32; 3],
}

#[repr(C)]
pub struct ffxCreateContextDescFrameGenerationSwapChainForHwndDX12 {
    pub header: ApiHeader,
    /// `IDXGISwapChain4**`, written on success.
    pub swapchain: *mut *mut c_void,
    pub hwnd: *mut c_void,
    /// `DXGI_SWAP_CHAIN_DESC1*`
    pub desc: *mut c_void,
    /// `DXGI_SWAP_CHAIN_FULLSCREEN_DESC*`
    pub fullscreenDesc: *mut c_void,
    /// `IDXGIFactory*`
    pub dxgiFactory: *mut c_void,
    /// `ID3D12CommandQueue*`
    pub gameQueue: *mut c_void,
}

#[repr(C)]
pub struct ffxConfigureDescFrameGenerationSwapChainKeyValueDX12 {
    pub header: ApiHeader,
    pub key: u64,
    pub u64_: u64,
    pub ptr: *mut c_void,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FfxApiSwapchainFramePacingTuning {
    pub safetyMarginInMs: f32,
    pub varianceFactor: f32,
    pub allowHybridSpin: bool,
    pub hybridSpinTime: u32,
    pub allowWaitForSingleObjectOnFence: bool,
}

// =====================================================================
// Entry points
// =====================================================================

pub type PfnFfxCreateContext = unsafe extern "C" fn(
    context: *mut ffxContext,
    desc: *mut ApiHeader,
    mem_cb: *const c_void,
) -> ffxReturnCode_t;

pub type PfnFfxDestroyContext =
    unsafe extern "C" fn(context: *mut ffxContext, mem_cb: *const c_void) -> ffxReturnCode_t;

pub type PfnFfxConfigure =
    unsafe extern "C" fn(context: *mut ffxContext, desc: *const ApiHeader) -> ffxReturnCode_t;

pub type PfnFfxQuery =
    unsafe extern "C" fn(context: *mut ffxContext, desc: *mut ApiHeader) -> ffxReturnCode_t;

pub type PfnFfxDispatch =
    unsafe extern "C" fn(context: *mut ffxContext, desc: *const ApiHeader) -> ffxReturnCode_t;
