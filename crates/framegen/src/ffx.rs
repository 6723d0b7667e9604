//! [`FrameGenEngine`] over the FidelityFX API.
//!
//! One swap-chain context (owned by the bridge), plus a frame-generation and
//! an upscale context that are rebuilt whenever the swap chain is resized.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use ffx_api::ffi::*;
use ffx_api::{FfxFunctions, ReturnCode};
use fg_interop::dx::convert::{dxgi_format, fullscreen_desc, swap_chain_desc1, window};
use fg_interop::dx::{DxBackend, DxSwapChain};
use fg_interop::{
    ConfigureFrameGeneration, EngineEffects, EngineStatus, Extent, Format, FrameGenEngine,
    FramePacingTuning, PrepareFrameGeneration, Rect, SwapChainDesc, UpscaleDispatch,
};
use tracing::{debug, error, info, warn};
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::{CreateDXGIFactory1, IDXGIFactory2, IDXGISwapChain4};

/// The swap-chain context; destroying it releases the engine's swap chain.
pub struct FfxSwapChainContext {
    context: ffxContext,
    destroy: PfnFfxDestroyContext,
}

impl Drop for FfxSwapChainContext {
    fn drop(&mut self) {
        let code = unsafe { (self.destroy)(&mut self.context, ptr::null()) };
        debug!(code, "Destroyed swap-chain context");
    }
}

/// What the engine's dispatch callback needs. Boxed so the pointer handed
/// to the engine stays put.
struct GenerationContext {
    context: ffxContext,
    dispatch: PfnFfxDispatch,
    /// Reset requested by the last prepare, consumed by the next dispatch.
    reset: AtomicBool,
}

pub struct FfxEngine {
    fns: FfxFunctions,
    generation: Option<Box<GenerationContext>>,
    upscale: Option<ffxContext>,
    /// Swap chain whose generation callback points into `generation`.
    attached: Option<IDXGISwapChain4>,
}

impl FfxEngine {
    pub fn new(fns: FfxFunctions) -> Self {
        Self {
            fns,
            generation: None,
            upscale: None,
            attached: None,
        }
    }

    fn destroy_effects(&mut self) {
        // The engine swap chain outlives these contexts and must stop
        // calling back into them first.
        if let (Some(generation), Some(swap_chain)) =
            (self.generation.as_deref(), self.attached.take())
        {
            let detach = ConfigureFrameGeneration::disabled(Rect::default(), 0);
            let code = self.configure_raw(generation, &swap_chain, &detach);
            if code != FFX_API_RETURN_OK {
                warn!(code, "Could not detach the frame generation callback");
            }
        }
        if let Some(mut generation) = self.generation.take() {
            unsafe { (self.fns.destroy_context)(&mut generation.context, ptr::null()) };
        }
        if let Some(mut upscale) = self.upscale.take() {
            unsafe { (self.fns.destroy_context)(&mut upscale, ptr::null()) };
        }
    }

    /// Point the swap chain's callback at `generation`, or clear it when
    /// generation is disabled.
    fn configure_raw(
        &self,
        generation: &GenerationContext,
        swap_chain: &IDXGISwapChain4,
        params: &ConfigureFrameGeneration<'_, ID3D12Resource>,
    ) -> ffxReturnCode_t {
        let (callback, user): (FfxApiFrameGenerationDispatchFunc, *mut c_void) = if params.enabled {
            (
                Some(generate_frame),
                generation as *const GenerationContext as *mut c_void,
            )
        } else {
            (None, ptr::null_mut())
        };

        let desc = ffxConfigureDescFrameGeneration {
            header: ApiHeader::new(FFX_API_CONFIGURE_DESC_TYPE_FRAMEGENERATION),
            swapChain: swap_chain.as_raw(),
            presentCallback: None,
            presentCallbackUserContext: ptr::null_mut(),
            frameGenerationCallback: callback,
            frameGenerationCallbackUserContext: user,
            frameGenerationEnabled: params.enabled,
            allowAsyncWorkloads: params.allow_async_workloads,
            HUDLessColor: resource(params.hudless, FFX_API_RESOURCE_STATE_COMPUTE_READ),
            flags: 0,
            onlyPresentGenerated: params.only_present_generated,
            generationRect: rect(params.generation_rect),
            frameID: params.frame_id,
        };
        let mut context = generation.context;
        unsafe { (self.fns.configure)(&mut context, &desc.header) }
    }

    fn create(&self, desc: &mut ApiHeader, what: &str) -> Option<ffxContext> {
        let mut context: ffxContext = ptr::null_mut();
        let code = unsafe { (self.fns.create_context)(&mut context, desc, ptr::null()) };
        if code == FFX_API_RETURN_OK && !context.is_null() {
            info!("Created {what} context");
            Some(context)
        } else {
            error!(code, "Failed to create {what} context ({:?})", ReturnCode::from_raw(code));
            None
        }
    }
}

impl Drop for FfxEngine {
    fn drop(&mut self) {
        self.destroy_effects();
    }
}

// ---------------------------------------------------------------------------
// Descriptor helpers
// ---------------------------------------------------------------------------

fn backend_desc(backend: &DxBackend) -> ffxCreateBackendDX12Desc {
    ffxCreateBackendDX12Desc {
        header: ApiHeader::new(FFX_API_CREATE_CONTEXT_DESC_TYPE_BACKEND_DX12),
        device: backend.d3d12().as_raw(),
    }
}

fn dimensions(extent: Extent) -> FfxApiDimensions2D {
    FfxApiDimensions2D {
        width: extent.width,
        height: extent.height,
    }
}

fn coords([x, y]: [f32; 2]) -> FfxApiFloatCoords2D {
    FfxApiFloatCoords2D { x, y }
}

fn rect(rect: Rect) -> FfxApiRect2D {
    FfxApiRect2D {
        left: rect.left,
        top: rect.top,
        width: rect.width,
        height: rect.height,
    }
}

/// Describe a D3D12 texture for the engine, in `state`.
fn resource(image: Option<&ID3D12Resource>, state: u32) -> FfxApiResource {
    let Some(image) = image else {
        return FfxApiResource::NULL;
    };
    let desc = unsafe { image.GetDesc() };
    let mut usage = FFX_API_RESOURCE_USAGE_READ_ONLY;
    if desc.Flags.0 & D3D12_RESOURCE_FLAG_ALLOW_RENDER_TARGET.0 != 0 {
        usage |= FFX_API_RESOURCE_USAGE_RENDERTARGET;
    }
    if desc.Flags.0 & D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS.0 != 0 {
        usage |= FFX_API_RESOURCE_USAGE_UAV;
    }
    FfxApiResource {
        resource: image.as_raw(),
        description: FfxApiResourceDescription {
            type_: FFX_API_RESOURCE_TYPE_TEXTURE2D,
            format: surface_format(desc.Format.0 as u32),
            width: desc.Width as u32,
            height: desc.Height,
            depth: desc.DepthOrArraySize as u32,
            mip_count: desc.MipLevels as u32,
            flags: 0,
            usage,
        },
        state,
    }
}

/// Called by the engine for each interpolated frame.
unsafe extern "C" fn generate_frame(
    params: *mut ffxDispatchDescFrameGeneration,
    user: *mut c_void,
) -> ffxReturnCode_t {
    if params.is_null() || user.is_null() {
        return FFX_API_RETURN_ERROR_PARAMETER;
    }
    unsafe {
        let generation = &*user.cast::<GenerationContext>();
        let params = &mut *params;
        params.numGeneratedFrames = 1;
        params.backbufferTransferFunction = FFX_API_BACKBUFFER_TRANSFER_FUNCTION_SRGB;
        params.reset = generation.reset.swap(false, Ordering::AcqRel);
        let mut context = generation.context;
        (generation.dispatch)(&mut context, &params.header)
    }
}

impl FrameGenEngine<DxBackend> for FfxEngine {
    type SwapChain = DxSwapChain;
    type SwapChainContext = FfxSwapChainContext;

    fn create_swap_chain(
        &mut self,
        backend: &DxBackend,
        desc: &SwapChainDesc,
    ) -> Result<(FfxSwapChainContext, DxSwapChain), EngineStatus> {
        let factory: IDXGIFactory2 = unsafe { CreateDXGIFactory1() }.map_err(|e| {
            error!("CreateDXGIFactory1 failed: {e}");
            EngineStatus::RUNTIME_ERROR
        })?;

        let mut desc1 = swap_chain_desc1(desc);
        let mut fullscreen = fullscreen_desc(desc);
        let mut backend_desc = backend_desc(backend);
        let mut raw_swap_chain: *mut c_void = ptr::null_mut();
        let mut create = ffxCreateContextDescFrameGenerationSwapChainForHwndDX12 {
            header: ApiHeader::new(FFX_API_CREATE_CONTEXT_DESC_TYPE_FGSWAPCHAIN_FOR_HWND_DX12),
            swapchain: &mut raw_swap_chain,
            hwnd: window(desc.window).0,
            desc: (&mut desc1 as *mut _).cast(),
            fullscreenDesc: (&mut fullscreen as *mut _).cast(),
            dxgiFactory: factory.as_raw(),
            gameQueue: backend.queue().as_raw(),
        };
        create.header.next = &mut backend_desc.header;

        let mut context: ffxContext = ptr::null_mut();
        let code =
            unsafe { (self.fns.create_context)(&mut context, &mut create.header, ptr::null()) };
        if code != FFX_API_RETURN_OK {
            error!(code, "Swap-chain context creation failed ({:?})", ReturnCode::from_raw(code));
            return Err(EngineStatus(code));
        }
        let context = FfxSwapChainContext {
            context,
            destroy: self.fns.destroy_context,
        };
        if raw_swap_chain.is_null() {
            error!("Swap-chain context created without a swap chain");
            return Err(EngineStatus::RUNTIME_ERROR);
        }

        let swap_chain = unsafe { IDXGISwapChain4::from_raw(raw_swap_chain) };
        info!(
            width = desc.width,
            height = desc.height,
            "Engine swap chain created"
        );
        Ok((context, DxSwapChain(swap_chain)))
    }

    fn create_effects(&mut self, backend: &DxBackend, display: Extent, format: Format) -> EngineEffects {
        self.destroy_effects();
        let mut backend_desc = backend_desc(backend);

        let mut generation_desc = ffxCreateContextDescFrameGeneration {
            header: ApiHeader::new(FFX_API_CREATE_CONTEXT_DESC_TYPE_FRAMEGENERATION),
            flags: FFX_FRAMEGENERATION_ENABLE_ASYNC_WORKLOAD_SUPPORT
                | FFX_FRAMEGENERATION_ENABLE_DISPLAY_RESOLUTION_MOTION_VECTORS
                | FFX_FRAMEGENERATION_ENABLE_MOTION_VECTORS_JITTER_CANCELLATION
                | FFX_FRAMEGENERATION_ENABLE_HIGH_DYNAMIC_RANGE,
            displaySize: dimensions(display),
            maxRenderSize: dimensions(display),
            backBufferFormat: surface_format(dxgi_format(format).0 as u32),
        };
        generation_desc.header.next = &mut backend_desc.header;
        self.generation = self
            .create(&mut generation_desc.header, "frame generation")
            .map(|context| {
                Box::new(GenerationContext {
                    context,
                    dispatch: self.fns.dispatch,
                    reset: AtomicBool::new(false),
                })
            });

        let mut upscale_desc = ffxCreateContextDescUpscale {
            header: ApiHeader::new(FFX_API_CREATE_CONTEXT_DESC_TYPE_UPSCALE),
            flags: FFX_UPSCALE_ENABLE_HIGH_DYNAMIC_RANGE
                | FFX_UPSCALE_ENABLE_DISPLAY_RESOLUTION_MOTION_VECTORS
                | FFX_UPSCALE_ENABLE_MOTION_VECTORS_JITTER_CANCELLATION,
            maxRenderSize: dimensions(display),
            maxUpscaleSize: dimensions(display),
            fpMessage: ptr::null_mut(),
        };
        upscale_desc.header.next = &mut backend_desc.header;
        self.upscale = self.create(&mut upscale_desc.header, "upscale");

        EngineEffects {
            frame_generation: self.generation.is_some(),
            upscale: self.upscale.is_some(),
        }
    }

    fn configure(
        &mut self,
        swap_chain: &DxSwapChain,
        params: &ConfigureFrameGeneration<'_, ID3D12Resource>,
    ) -> EngineStatus {
        let Some(generation) = self.generation.as_deref() else {
            return EngineStatus::NO_PROVIDER;
        };
        let code = self.configure_raw(generation, swap_chain.raw(), params);
        self.attached = params.enabled.then(|| swap_chain.raw().clone());
        EngineStatus(code)
    }

    fn configure_frame_pacing(
        &mut self,
        context: &FfxSwapChainContext,
        tuning: &FramePacingTuning,
    ) -> EngineStatus {
        let mut tuning = FfxApiSwapchainFramePacingTuning {
            safetyMarginInMs: tuning.safety_margin_ms,
            varianceFactor: tuning.variance_factor,
            allowHybridSpin: tuning.allow_hybrid_spin,
            hybridSpinTime: tuning.hybrid_spin_time,
            allowWaitForSingleObjectOnFence: tuning.allow_wait_for_single_object_on_fence,
        };
        let desc = ffxConfigureDescFrameGenerationSwapChainKeyValueDX12 {
            header: ApiHeader::new(FFX_API_CONFIGURE_DESC_TYPE_FGSWAPCHAIN_KEYVALUE_DX12),
            key: FFX_API_CONFIGURE_FG_SWAPCHAIN_KEY_FRAMEPACINGTUNING,
            u64_: 0,
            ptr: (&mut tuning as *mut FfxApiSwapchainFramePacingTuning).cast(),
        };
        let mut raw = context.context;
        EngineStatus(unsafe { (self.fns.configure)(&mut raw, &desc.header) })
    }

    fn upscale(
        &mut self,
        list: &ID3D12GraphicsCommandList,
        params: &UpscaleDispatch<'_, ID3D12Resource>,
    ) -> EngineStatus {
        let Some(mut upscale) = self.upscale else {
            return EngineStatus::NO_PROVIDER;
        };
        let read = FFX_API_RESOURCE_STATE_COMPUTE_READ;
        let desc = ffxDispatchDescUpscale {
            header: ApiHeader::new(FFX_API_DISPATCH_DESC_TYPE_UPSCALE),
            commandList: list.as_raw(),
            color: resource(Some(params.color), read),
            depth: resource(Some(params.depth), read),
            motionVectors: resource(Some(params.motion_vectors), read),
            exposure: FfxApiResource::NULL,
            reactive: FfxApiResource::NULL,
            transparencyAndComposition: FfxApiResource::NULL,
            output: resource(Some(params.output), FFX_API_RESOURCE_STATE_UNORDERED_ACCESS),
            jitterOffset: coords(params.jitter_offset),
            motionVectorScale: coords(params.motion_vector_scale),
            renderSize: dimensions(params.render_size),
            upscaleSize: dimensions(params.upscale_size),
            enableSharpening: params.sharpness > 0.0,
            sharpness: params.sharpness,
            frameTimeDelta: params.frame_time_delta_ms,
            preExposure: params.pre_exposure,
            reset: params.reset,
            cameraNear: params.camera_near,
            cameraFar: params.camera_far,
            cameraFovAngleVertical: params.fov_vertical,
            viewSpaceToMetersFactor: params.view_space_to_meters,
            flags: 0,
        };
        EngineStatus(unsafe { (self.fns.dispatch)(&mut upscale, &desc.header) })
    }

    fn prepare(
        &mut self,
        list: &ID3D12GraphicsCommandList,
        params: &PrepareFrameGeneration<'_, ID3D12Resource>,
    ) -> EngineStatus {
        let Some(generation) = self.generation.as_deref() else {
            return EngineStatus::NO_PROVIDER;
        };
        // The prepare descriptor's own reset field is unused by the engine;
        // the flag reaches it through the next dispatch callback.
        generation.reset.store(params.reset, Ordering::Release);

        let read = FFX_API_RESOURCE_STATE_COMPUTE_READ;
        let mut camera = ffxDispatchDescFrameGenerationPrepareCameraInfo {
            header: ApiHeader::new(FFX_API_DISPATCH_DESC_TYPE_FRAMEGENERATION_PREPARE_CAMERAINFO),
            cameraPosition: params.camera.position,
            cameraUp: params.camera.up,
            cameraRight: params.camera.right,
            cameraForward: params.camera.forward,
        };
        let mut desc = ffxDispatchDescFrameGenerationPrepare {
            header: ApiHeader::new(FFX_API_DISPATCH_DESC_TYPE_FRAMEGENERATION_PREPARE),
            frameID: params.frame_id,
            flags: 0,
            commandList: list.as_raw(),
            renderSize: dimensions(params.render_size),
            jitterOffset: coords(params.jitter_offset),
            motionVectorScale: coords(params.motion_vector_scale),
            frameTimeDelta: params.frame_time_delta_ms,
            unused_reset: params.reset,
            cameraNear: params.camera_near,
            cameraFar: params.camera_far,
            cameraFovAngleVertical: params.fov_vertical,
            viewSpaceToMetersFactor: params.view_space_to_meters,
            depth: resource(Some(params.depth), read),
            motionVectors: resource(Some(params.motion_vectors), read),
        };
        desc.header.next = &mut camera.header;

        let mut context = generation.context;
        EngineStatus(unsafe { (self.fns.dispatch)(&mut context, &desc.header) })
    }

    fn jitter_offset(&mut self, index: i32, phase_count: i32) -> Result<[f32; 2], EngineStatus> {
        let Some(mut upscale) = self.upscale else {
            return Err(EngineStatus::NO_PROVIDER);
        };
        let (mut x, mut y) = (0.0f32, 0.0f32);
        let mut query = ffxQueryDescUpscaleGetJitterOffset {
            header: ApiHeader::new(FFX_API_QUERY_DESC_TYPE_UPSCALE_GETJITTEROFFSET),
            index,
            phaseCount: phase_count,
            pOutX: &mut x,
            pOutY: &mut y,
        };
        let code = unsafe { (self.fns.query)(&mut upscale, &mut query.header) };
        if code != FFX_API_RETURN_OK {
            warn!(code, index, "Jitter query failed");
            return Err(EngineStatus(code));
        }
        Ok([x, y])
    }
}
