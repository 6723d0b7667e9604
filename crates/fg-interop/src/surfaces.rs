//! Shared surfaces the host pipeline copies its render targets into.
//!
//! Frame generation reads the pre-UI colour, depth and motion vectors of
//! every frame; the native anti-aliasing pass writes the upscaled output.
//! All four live at display size and are rebuilt on resize.

use tracing::debug;

use crate::backend::Backend;
use crate::error::InteropError;
use crate::shared::SharedResource;
use crate::types::{Extent, Format, ImageDesc, SurfaceUsage};

/// Formats of the host surfaces for one display size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostSurfaceDescs {
    pub hudless: ImageDesc,
    pub depth: ImageDesc,
    pub motion_vectors: ImageDesc,
    pub upscaled: ImageDesc,
}

impl HostSurfaceDescs {
    /// Colour surfaces are 8-bit linear, depth is a single float channel, and
    /// motion vectors keep whatever format the host renders them in.
    pub fn new(extent: Extent, motion_vector_format: Format) -> Self {
        let desc = |format| ImageDesc::new(extent.width, extent.height, format);
        Self {
            hudless: desc(Format::R8G8B8A8_UNORM),
            depth: desc(Format::R32_FLOAT),
            motion_vectors: desc(motion_vector_format),
            upscaled: desc(Format::R8G8B8A8_UNORM),
        }
    }
}

pub struct HostSurfaces<B: Backend> {
    pub hudless: SharedResource<B>,
    pub depth: SharedResource<B>,
    pub motion_vectors: SharedResource<B>,
    pub upscaled: SharedResource<B>,
}

impl<B: Backend> HostSurfaces<B> {
    pub fn create(backend: &B, descs: &HostSurfaceDescs) -> Result<Self, InteropError> {
        let surfaces = Self {
            hudless: SharedResource::create(
                backend,
                &descs.hudless,
                SurfaceUsage::SHADER_RESOURCE | SurfaceUsage::RENDER_TARGET,
            )?,
            depth: SharedResource::create(
                backend,
                &descs.depth,
                SurfaceUsage::SHADER_RESOURCE | SurfaceUsage::UNORDERED_ACCESS,
            )?,
            motion_vectors: SharedResource::create(
                backend,
                &descs.motion_vectors,
                SurfaceUsage::SHADER_RESOURCE | SurfaceUsage::RENDER_TARGET,
            )?,
            upscaled: SharedResource::create(
                backend,
                &descs.upscaled,
                SurfaceUsage::SHADER_RESOURCE | SurfaceUsage::UNORDERED_ACCESS,
            )?,
        };
        debug!(
            "Host surfaces created at {}x{}",
            descs.hudless.width, descs.hudless.height
        );
        Ok(surfaces)
    }

    pub fn extent(&self) -> Extent {
        self.hudless.desc().extent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HResult;
    use crate::sim::SimGpu;

    #[test]
    fn surfaces_follow_the_display_size() {
        let gpu = SimGpu::new();
        let descs = HostSurfaceDescs::new(Extent::new(640, 360), Format::R16G16_FLOAT);
        let surfaces = HostSurfaces::create(&gpu, &descs).unwrap();

        assert_eq!(surfaces.extent(), Extent::new(640, 360));
        assert_eq!(surfaces.depth.desc().format, Format::R32_FLOAT);
        assert_eq!(surfaces.motion_vectors.desc().format, Format::R16G16_FLOAT);
        assert!(surfaces.upscaled.uav(&gpu).is_ok());
        assert!(surfaces.hudless.uav(&gpu).is_err());
        assert_eq!(gpu.live_allocations(), 4);
    }

    #[test]
    fn partial_failure_releases_what_was_created() {
        let gpu = SimGpu::new();
        let descs = HostSurfaceDescs::new(Extent::new(64, 64), Format::R16G16_FLOAT);
        gpu.fail_next("OpenSharedResource1", HResult::E_FAIL);

        assert!(HostSurfaces::create(&gpu, &descs).is_err());
        assert_eq!(gpu.live_allocations(), 0);
        assert_eq!(gpu.live_imports(), 0);
    }
}
