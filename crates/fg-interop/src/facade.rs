//! The swap chain the host holds.
//!
//! Identity queries for the swap-chain family answer with the facade itself,
//! so any layer that caches a queried pointer keeps calling through here.
//! `Present`, `GetBuffer`, `GetDevice` and `ResizeBuffers` are intercepted;
//! everything else goes to the native swap chain untouched.

use tracing::{trace, warn};

use crate::backend::Backend;
use crate::context::InteropContext;
use crate::engine::FrameGenEngine;
use crate::error::{HResult, NativeResult};
use crate::iid::{self, Guid};
use crate::swapchain::{DeviceRef, HostSwapChain, NativeSwapChain, Queried};
use crate::types::{Format, FrameStatistics, ModeDesc, PresentFlags, SwapChainDesc, SwapChainFlags};

type Native<B, E> = <E as FrameGenEngine<B>>::SwapChain;
type NativeObject<B, E> = <Native<B, E> as NativeSwapChain>::Object;
type NativeOutput<B, E> = <Native<B, E> as NativeSwapChain>::Output;

pub struct SwapChainFacade<B: Backend, E: FrameGenEngine<B>> {
    context: InteropContext<B, E>,
}

impl<B: Backend, E: FrameGenEngine<B>> SwapChainFacade<B, E> {
    pub fn new(context: InteropContext<B, E>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &InteropContext<B, E> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut InteropContext<B, E> {
        &mut self.context
    }

    fn native(&self) -> &Native<B, E> {
        self.context.bridge().swap_chain()
    }
}

impl<B: Backend, E: FrameGenEngine<B>> HostSwapChain for SwapChainFacade<B, E> {
    type Texture = B::ImportedImage;
    type Device = B::Device;
    type Object = NativeObject<B, E>;
    type Output = NativeOutput<B, E>;

    fn query_interface(&self, iid: &Guid) -> NativeResult<Queried<Self::Object>> {
        if iid::is_swap_chain_family(iid) {
            return Ok(Queried::Facade);
        }
        self.native().query_interface(iid).map(Queried::Native)
    }

    fn set_private_data(&self, name: &Guid, data: &[u8]) -> NativeResult<()> {
        self.native().set_private_data(name, data)
    }

    fn set_private_data_interface(
        &self,
        name: &Guid,
        object: Option<&Self::Object>,
    ) -> NativeResult<()> {
        self.native().set_private_data_interface(name, object)
    }

    fn get_private_data(&self, name: &Guid, data: &mut [u8]) -> NativeResult<u32> {
        self.native().get_private_data(name, data)
    }

    fn get_parent(&self, iid: &Guid) -> NativeResult<Self::Object> {
        self.native().get_parent(iid)
    }

    /// The host expects its own API's device back.
    fn get_device(&self, iid: &Guid) -> NativeResult<DeviceRef<B::Device, Self::Object>> {
        if iid::is_api_a_device(iid) {
            return Ok(DeviceRef::Bridged(self.context.backend().device()));
        }
        self.native().get_device(iid).map(DeviceRef::Native)
    }

    fn present(&mut self, sync_interval: u32, flags: PresentFlags) -> HResult {
        self.context.present(sync_interval, flags)
    }

    /// Every index resolves to the shared surface: the host renders into it
    /// and the present path copies it into whichever back buffer is current.
    fn get_buffer(&self, index: u32, iid: &Guid) -> NativeResult<B::ImportedImage> {
        trace!(index, ?iid, "GetBuffer");
        match self.context.surface() {
            Some(surface) => Ok(surface.imported().clone()),
            None => {
                warn!(index, "GetBuffer while interop resources are not ready");
                Err(HResult::E_FAIL)
            }
        }
    }

    fn set_fullscreen_state(
        &self,
        fullscreen: bool,
        target: Option<&Self::Output>,
    ) -> NativeResult<()> {
        self.native().set_fullscreen_state(fullscreen, target)
    }

    fn get_fullscreen_state(&self) -> NativeResult<(bool, Option<Self::Output>)> {
        self.native().get_fullscreen_state()
    }

    fn get_desc(&self) -> NativeResult<SwapChainDesc> {
        self.native().get_desc()
    }

    fn resize_buffers(
        &mut self,
        buffer_count: u32,
        width: u32,
        height: u32,
        format: Format,
        flags: SwapChainFlags,
    ) -> HResult {
        self.context.resize(buffer_count, width, height, format, flags)
    }

    fn resize_target(&self, mode: &ModeDesc) -> NativeResult<()> {
        self.native().resize_target(mode)
    }

    fn get_containing_output(&self) -> NativeResult<Self::Output> {
        self.native().get_containing_output()
    }

    fn get_frame_statistics(&self) -> NativeResult<FrameStatistics> {
        self.native().get_frame_statistics()
    }

    fn get_last_present_count(&self) -> NativeResult<u32> {
        self.native().get_last_present_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::{FrameInputs, FrameOptions};
    use crate::sim::{SimDevice, SimEngine, SimGpu, SimObject, SimOutput, SimSwapChain};
    use crate::types::Rational;

    const NAME: Guid = Guid(0x1234_5678_9abc_def0_1234_5678_9abc_def0);
    const FACTORY: Guid = Guid(0x7b71_66ec_21c7_44ae_b21a_c9ae321ae369);
    const QUEUE: Guid = Guid(0x0ec8_70a6_5d7e_4c22_8cfc_5baae07616ed);

    fn facade() -> (SimGpu, SwapChainFacade<SimGpu, SimEngine>, SimSwapChain) {
        let gpu = SimGpu::new();
        let engine = SimEngine::new(gpu.clone());
        let context = InteropContext::create(
            gpu.clone(),
            engine.clone(),
            &SwapChainDesc {
                width: 128,
                height: 72,
                format: Format::B8G8R8A8_UNORM,
                windowed: true,
                ..SwapChainDesc::default()
            },
            FrameOptions::default(),
            Box::new(FrameInputs::default),
        )
        .unwrap();
        let native = engine.swap_chain().unwrap();
        (gpu, SwapChainFacade::new(context), native)
    }

    #[test]
    fn swap_chain_family_queries_return_the_facade() {
        let (_, facade, native) = facade();
        for iid in iid::SWAP_CHAIN_FAMILY {
            assert_eq!(facade.query_interface(&iid), Ok(Queried::Facade));
        }
        assert!(!native.calls().contains(&"QueryInterface"));

        let other = Guid(0xdead_beef);
        assert_eq!(
            facade.query_interface(&other),
            native.query_interface(&other).map(Queried::Native)
        );
    }

    #[test]
    fn api_a_device_queries_return_the_host_device() {
        let (gpu, facade, native) = facade();
        for iid in iid::API_A_DEVICES {
            assert_eq!(
                facade.get_device(&iid),
                Ok(DeviceRef::Bridged(gpu.device()))
            );
        }
        assert_eq!(
            facade.get_device(&QUEUE),
            Ok(DeviceRef::<SimDevice, _>::Native(SimObject::Queue(QUEUE)))
        );
        let forwarded = native.calls().iter().filter(|c| **c == "GetDevice").count();
        assert_eq!(forwarded, 1);
    }

    #[test]
    fn get_buffer_returns_the_shared_surface() {
        let (gpu, facade, _) = facade();
        let surface = facade.context().surface().unwrap();
        for index in 0..3 {
            let buffer = facade.get_buffer(index, &iid::IUNKNOWN).unwrap();
            assert!(gpu.same_allocation(surface.image(), &buffer));
        }
    }

    #[test]
    fn get_buffer_before_interop_fails() {
        let (_, mut facade, native) = facade();
        native.fail_next_resize(HResult::DXGI_ERROR_INVALID_CALL);
        facade.resize_buffers(0, 64, 64, Format::UNKNOWN, SwapChainFlags::empty());

        assert_eq!(
            facade.get_buffer(0, &iid::IUNKNOWN).err(),
            Some(HResult::E_FAIL)
        );
    }

    #[test]
    fn non_intercepted_methods_pass_through_unchanged() {
        let (_, facade, native) = facade();

        assert_eq!(facade.set_private_data(&NAME, b"abc"), Ok(()));
        let mut through_facade = [0u8; 8];
        let mut direct = [0u8; 8];
        assert_eq!(
            facade.get_private_data(&NAME, &mut through_facade),
            native.get_private_data(&NAME, &mut direct)
        );
        assert_eq!(through_facade, direct);
        assert_eq!(&direct[..3], b"abc");
        assert_eq!(
            facade.get_private_data(&QUEUE, &mut through_facade),
            Err(HResult::DXGI_ERROR_NOT_FOUND)
        );

        let object = SimObject::User(7);
        assert_eq!(facade.set_private_data_interface(&NAME, Some(&object)), Ok(()));
        assert_eq!(facade.get_parent(&FACTORY), native.get_parent(&FACTORY));

        assert_eq!(facade.set_fullscreen_state(true, Some(&SimOutput(2))), Ok(()));
        assert_eq!(facade.get_fullscreen_state(), Ok((true, Some(SimOutput(2)))));
        assert_eq!(facade.get_fullscreen_state(), native.get_fullscreen_state());
        assert_eq!(facade.get_desc(), native.get_desc());

        let mode = ModeDesc {
            width: 1920,
            height: 1080,
            refresh_rate: Rational {
                numerator: 144,
                denominator: 1,
            },
            ..ModeDesc::default()
        };
        assert_eq!(facade.resize_target(&mode), Ok(()));
        assert_eq!(native.resize_target_mode(), Some(mode));

        assert_eq!(facade.get_containing_output(), native.get_containing_output());
        assert_eq!(facade.get_frame_statistics(), native.get_frame_statistics());
        assert_eq!(facade.get_last_present_count(), native.get_last_present_count());
    }

    #[test]
    fn present_and_resize_go_through_the_context() {
        let (_, mut facade, native) = facade();
        assert_eq!(facade.present(1, PresentFlags::empty()), HResult::OK);
        assert_eq!(facade.context().orchestrator().frame_id(), 1);
        assert_eq!(native.presents(), vec![(0, PresentFlags::ALLOW_TEARING)]);

        assert_eq!(
            facade.resize_buffers(2, 256, 144, Format::UNKNOWN, SwapChainFlags::empty()),
            HResult::OK
        );
        let desc = native.get_desc().unwrap();
        assert_eq!((desc.width, desc.height, desc.buffer_count), (256, 144, 3));
        assert!(desc.flags.contains(SwapChainFlags::ALLOW_TEARING));
    }
}
