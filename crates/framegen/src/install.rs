//! Swapping the host's swap chain for a facade.
//!
//! The hooking glue calls [`substitute_swap_chain`] from inside the host's
//! `D3D11CreateDeviceAndSwapChain` (or `CreateSwapChain`). A `None` result
//! means the host should get its own swap chain as usual.

use fg_interop::{
    Backend, FrameGenEngine, FrameSource, InteropContext, InteropError, SwapChainDesc,
    SwapChainFacade,
};
use tracing::info;

use crate::limiter::FrameLimiter;
use crate::paced::PacedSwapChain;
use crate::settings::{FrameLimit, Settings};

/// Build the interop context and wrap it the way the host will see it.
pub fn build_facade<B, E>(
    backend: B,
    engine: E,
    desc: &SwapChainDesc,
    settings: &Settings,
    refresh_rate_hz: f64,
    source: Box<dyn FrameSource>,
) -> Result<PacedSwapChain<SwapChainFacade<B, E>>, InteropError>
where
    B: Backend,
    E: FrameGenEngine<B>,
{
    let context = InteropContext::create(backend, engine, desc, settings.frame_options(), source)?;
    let generating = settings.frame_generation && context.effects().frame_generation;
    let limiter = FrameLimiter::new(refresh_rate_hz, settings.frame_limit == FrameLimit::Refresh);
    info!(
        refresh_rate_hz,
        limit = ?settings.frame_limit,
        generating,
        "Facade ready"
    );
    Ok(PacedSwapChain::new(SwapChainFacade::new(context), limiter, generating))
}

#[cfg(target_os = "windows")]
pub use self::windows_impl::substitute_swap_chain;

#[cfg(target_os = "windows")]
mod windows_impl {
    use anyhow::{Context, Result};
    use ffx_api::loader::current_module_path;
    use ffx_api::FfxFunctions;
    use fg_interop::dx::convert::window;
    use fg_interop::dx::{into_com, DxBackend};
    use fg_interop::{FrameSource, SwapChainDesc};
    use tracing::{error, warn};
    use windows::Win32::Graphics::Direct3D11::ID3D11Device;
    use windows::Win32::Graphics::Dxgi::IDXGISwapChain4;

    use super::build_facade;
    use crate::display::refresh_rate;
    use crate::ffx::FfxEngine;
    use crate::gate::{should_proxy, DisplayInfo, ProxyDecision};
    use crate::logging;
    use crate::settings::{self, Settings};

    /// Return a facade to hand the host in place of the swap chain it asked
    /// for, or `None` to let the host create its own.
    pub fn substitute_swap_chain(
        device: &ID3D11Device,
        desc: &SwapChainDesc,
        source: Box<dyn FrameSource>,
    ) -> Result<Option<IDXGISwapChain4>> {
        let module_path = current_module_path()?;
        if let Err(e) = logging::init(&logging::default_path(&module_path)) {
            // Without a log file there is nowhere to report to; carry on.
            eprintln!("framegen: {e:#}");
        }

        let settings_path = settings::default_path(&module_path);
        let settings = Settings::load(&settings_path).unwrap_or_else(|e| {
            warn!("{e:#}; using default settings");
            Settings::default()
        });

        let display = DisplayInfo {
            refresh_rate_hz: refresh_rate(window(desc.window)),
            windowed: desc.windowed,
        };
        let functions = match FfxFunctions::load(&module_path) {
            Ok(functions) => Some(functions),
            Err(e) => {
                error!("{e:#}");
                None
            }
        };
        let decision = should_proxy(&settings, &display, functions.is_some());
        let (ProxyDecision::Substitute, Some(functions)) = (decision, functions) else {
            return Ok(None);
        };

        let backend = DxBackend::from_host(device).context("bridging the host device")?;
        let facade = build_facade(
            backend,
            FfxEngine::new(functions),
            desc,
            &settings,
            display.refresh_rate_hz,
            source,
        )
        .context("creating the interop context")?;

        let native = facade.inner().context().bridge().swap_chain().raw().clone();
        Ok(Some(into_com(Box::new(facade), native)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fg_interop::sim::{EngineCall, SimEngine, SimGpu};
    use fg_interop::{EngineEffects, Format, FrameInputs, HostSwapChain, PresentFlags, HResult};

    fn desc() -> SwapChainDesc {
        SwapChainDesc {
            width: 320,
            height: 180,
            format: Format::R8G8B8A8_UNORM,
            buffer_count: 2,
            windowed: true,
            ..SwapChainDesc::default()
        }
    }

    #[test]
    fn settings_flow_into_the_context() {
        let gpu = SimGpu::new();
        let engine = SimEngine::new(gpu.clone());
        let settings = Settings {
            sharpness: 0.0,
            allow_async_workloads: false,
            warmup_frames: 0,
            ..Settings::default()
        };
        let mut facade = build_facade(
            gpu,
            engine.clone(),
            &desc(),
            &settings,
            144.0,
            Box::new(FrameInputs::default),
        )
        .unwrap();

        assert_eq!(facade.inner().context().options(), &settings.frame_options());
        assert_eq!(facade.present(0, PresentFlags::empty()), HResult::OK);
        assert!(engine.calls().iter().any(|call| matches!(
            call,
            EngineCall::Configure {
                allow_async_workloads: false,
                ..
            }
        )));
    }

    #[test]
    fn limiter_follows_settings_and_effects() {
        let gpu = SimGpu::new();
        let limited = Settings {
            frame_limit: FrameLimit::Refresh,
            ..Settings::default()
        };
        let mut facade = build_facade(
            gpu.clone(),
            SimEngine::new(gpu.clone()),
            &desc(),
            &limited,
            120.0,
            Box::new(FrameInputs::default),
        )
        .unwrap();
        assert!(facade.frame_generation());
        let interval = facade.limiter_mut().target_interval(true).unwrap();
        assert!((interval.as_secs_f64() - 2.0 / 116.0).abs() < 1e-9);

        // Without a generation context only real frames are shown, so the
        // cap is not halved.
        let engine = SimEngine::new(gpu.clone()).with_effects(EngineEffects {
            frame_generation: false,
            upscale: true,
        });
        let facade = build_facade(
            gpu,
            engine,
            &desc(),
            &limited,
            120.0,
            Box::new(FrameInputs::default),
        )
        .unwrap();
        assert!(!facade.frame_generation());
    }
}
