//! One GPU allocation visible to both APIs.
//!
//! The image is allocated by API-B on a shared heap with simultaneous access
//! enabled, exported through an OS handle and opened in API-A. Simultaneous
//! access lets both APIs touch the memory without ownership-transfer
//! barriers; ordering comes entirely from [`CrossApiFence`](crate::CrossApiFence).

use once_cell::unsync::OnceCell;
use tracing::{debug, error, warn};

use crate::backend::Backend;
use crate::error::{InteropError, NativeResultExt, ViewKind};
use crate::types::{ImageDesc, ResourceFlags, SurfaceUsage};

pub struct SharedResource<B: Backend> {
    // Field order is drop order: API-A views and the import go before the
    // API-B allocation they point into.
    srv: OnceCell<B::ShaderView>,
    uav: OnceCell<B::UnorderedView>,
    rtv: OnceCell<B::TargetView>,
    imported: B::ImportedImage,
    image: B::Image,
    desc: ImageDesc,
    usage: SurfaceUsage,
}

impl<B: Backend> SharedResource<B> {
    /// Allocate in API-B, export, and import into API-A.
    ///
    /// sRGB formats are allocated as their linear variant. The OS handle is
    /// closed whether or not the import succeeds.
    pub fn create(
        backend: &B,
        desc: &ImageDesc,
        usage: SurfaceUsage,
    ) -> Result<Self, InteropError> {
        let mut desc = *desc;
        if desc.format.is_srgb() {
            warn!(
                "Shared surface requested as sRGB {:?}, allocating {:?}",
                desc.format,
                desc.format.linear()
            );
            desc.format = desc.format.linear();
        }

        let image = backend
            .create_shared_image(&desc, ResourceFlags::from(usage))
            .creating("shared surface")
            .inspect_err(|e| error!("{e} ({}x{} {:?})", desc.width, desc.height, desc.format))?;

        let handle = backend
            .export_image(&image)
            .creating("shared surface handle")
            .inspect_err(|e| error!("{e}"))?;
        let imported = backend.open_image(handle);
        backend.close_handle(handle);
        let imported = imported
            .creating("API-A import of shared surface")
            .inspect_err(|e| error!("{e}"))?;

        debug!(
            "Shared surface {}x{} {:?} created ({:?})",
            desc.width, desc.height, desc.format, usage
        );

        Ok(Self {
            srv: OnceCell::new(),
            uav: OnceCell::new(),
            rtv: OnceCell::new(),
            imported,
            image,
            desc,
            usage,
        })
    }

    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    pub fn usage(&self) -> SurfaceUsage {
        self.usage
    }

    /// The API-B image; owner of the allocation.
    pub fn image(&self) -> &B::Image {
        &self.image
    }

    /// The API-A view of the same allocation.
    pub fn imported(&self) -> &B::ImportedImage {
        &self.imported
    }

    /// API-A shader-resource view, created on first use.
    pub fn srv(&self, backend: &B) -> Result<&B::ShaderView, InteropError> {
        self.require(SurfaceUsage::SHADER_RESOURCE, ViewKind::ShaderResource)?;
        self.srv.get_or_try_init(|| {
            backend
                .create_shader_view(&self.imported, self.desc.format)
                .creating("shader resource view")
        })
    }

    /// API-A unordered-access view, created on first use.
    pub fn uav(&self, backend: &B) -> Result<&B::UnorderedView, InteropError> {
        self.require(SurfaceUsage::UNORDERED_ACCESS, ViewKind::UnorderedAccess)?;
        self.uav.get_or_try_init(|| {
            backend
                .create_unordered_view(&self.imported, self.desc.format)
                .creating("unordered access view")
        })
    }

    /// API-A render-target view, created on first use.
    pub fn rtv(&self, backend: &B) -> Result<&B::TargetView, InteropError> {
        self.require(SurfaceUsage::RENDER_TARGET, ViewKind::RenderTarget)?;
        self.rtv.get_or_try_init(|| {
            backend
                .create_target_view(&self.imported, self.desc.format)
                .creating("render target view")
        })
    }

    fn require(&self, usage: SurfaceUsage, kind: ViewKind) -> Result<(), InteropError> {
        if self.usage.contains(usage) {
            Ok(())
        } else {
            Err(InteropError::ViewNotRequested(kind))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Api;
    use crate::error::HResult;
    use crate::sim::SimGpu;
    use crate::types::Format;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn srgb_is_normalized_before_allocation() {
        let gpu = SimGpu::new();
        let desc = ImageDesc::new(64, 32, Format::R8G8B8A8_UNORM_SRGB);
        let surface = SharedResource::create(&gpu, &desc, SurfaceUsage::UNORDERED_ACCESS).unwrap();

        assert_eq!(surface.desc().format, Format::R8G8B8A8_UNORM);
        assert_eq!(gpu.image_desc(surface.image()).format, Format::R8G8B8A8_UNORM);
        assert!(gpu
            .image_flags(surface.image())
            .contains(ResourceFlags::ALLOW_SIMULTANEOUS_ACCESS | ResourceFlags::ALLOW_UNORDERED_ACCESS));
    }

    #[test]
    fn one_allocation_and_no_open_handles() {
        let gpu = SimGpu::new();
        let desc = ImageDesc::new(16, 16, Format::R32_FLOAT);
        let surface = SharedResource::create(&gpu, &desc, SurfaceUsage::SHADER_RESOURCE).unwrap();

        assert_eq!(gpu.live_allocations(), 1);
        assert_eq!(gpu.open_handles(), 0);
        assert!(gpu.same_allocation(surface.image(), surface.imported()));

        drop(surface);
        assert_eq!(gpu.live_allocations(), 0);
        assert_eq!(gpu.live_imports(), 0);
    }

    #[test]
    fn views_are_lazy_and_limited_to_requested_usage() {
        let gpu = SimGpu::new();
        let desc = ImageDesc::new(8, 8, Format::R8G8B8A8_UNORM);
        let surface = SharedResource::create(&gpu, &desc, SurfaceUsage::SHADER_RESOURCE).unwrap();

        assert_eq!(gpu.views_created(), 0);
        surface.srv(&gpu).unwrap();
        surface.srv(&gpu).unwrap();
        assert_eq!(gpu.views_created(), 1);

        assert_eq!(
            surface.uav(&gpu).err(),
            Some(InteropError::ViewNotRequested(ViewKind::UnorderedAccess))
        );
        assert_eq!(
            surface.rtv(&gpu).err(),
            Some(InteropError::ViewNotRequested(ViewKind::RenderTarget))
        );
    }

    #[test]
    fn allocation_failure_is_reported() {
        let gpu = SimGpu::new();
        gpu.fail_next("CreateCommittedResource", HResult::E_OUTOFMEMORY);
        let desc = ImageDesc::new(8, 8, Format::R8G8B8A8_UNORM);

        let err = SharedResource::create(&gpu, &desc, SurfaceUsage::SHADER_RESOURCE)
            .err()
            .unwrap();
        assert_eq!(err.code(), HResult::E_OUTOFMEMORY);
        assert_eq!(gpu.live_allocations(), 0);
    }

    #[test]
    fn failed_import_still_closes_the_handle() {
        let gpu = SimGpu::new();
        gpu.fail_next("OpenSharedResource1", HResult::E_ACCESSDENIED);
        let desc = ImageDesc::new(8, 8, Format::R8G8B8A8_UNORM);

        let err = SharedResource::create(&gpu, &desc, SurfaceUsage::SHADER_RESOURCE)
            .err()
            .unwrap();
        assert!(matches!(err, InteropError::Creation { .. }));
        assert_eq!(gpu.open_handles(), 0);
        assert_eq!(gpu.live_allocations(), 0);
    }

    #[test]
    fn pattern_written_in_a_is_visible_in_b_after_handoff() {
        let gpu = SimGpu::new();
        let mut fence = crate::CrossApiFence::create(&gpu).unwrap();
        let desc = ImageDesc::new(16, 8, Format::R8G8B8A8_UNORM);
        let surface = SharedResource::create(&gpu, &desc, SurfaceUsage::RENDER_TARGET).unwrap();
        let bytes = pattern(16 * 8 * 4);

        gpu.stall(Api::A, true);
        gpu.write_imported(surface.imported(), &bytes);
        let value = fence.handoff(&gpu, Api::A).unwrap();
        let readback = gpu.read_image_on_queue(surface.image());

        // Nothing has executed while API-A is stalled.
        assert_eq!(readback.take(), None);
        assert!(fence.completed(&gpu) < value);

        gpu.stall(Api::A, false);
        assert_eq!(readback.take(), Some(bytes));
    }

    #[test]
    fn pattern_written_in_b_is_visible_in_a_after_handoff() {
        let gpu = SimGpu::new();
        let mut fence = crate::CrossApiFence::create(&gpu).unwrap();
        let desc = ImageDesc::new(8, 8, Format::R32_FLOAT);
        let surface = SharedResource::create(&gpu, &desc, SurfaceUsage::SHADER_RESOURCE).unwrap();
        let bytes = pattern(8 * 8 * 4);

        gpu.stall(Api::B, true);
        gpu.write_image_on_queue(surface.image(), &bytes);
        fence.handoff(&gpu, Api::B).unwrap();
        let readback = gpu.read_imported(surface.imported());

        assert_eq!(readback.take(), None);

        gpu.stall(Api::B, false);
        assert_eq!(readback.take(), Some(bytes));
    }
}
