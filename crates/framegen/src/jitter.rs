//! Sub-pixel camera jitter for the native anti-aliasing pass.
//!
//! Hosts offset their projection by a different sub-pixel amount every
//! frame so the upscaler can accumulate detail. The engine provides the
//! sequence; a local Halton(2,3) sequence stands in when it cannot.

use fg_interop::{Backend, Extent, FrameGenEngine};
use tracing::warn;

/// Sequence length at 1:1 render/display scale.
pub const PHASE_COUNT: i32 = 8;

/// Radical inverse of `index` in `base`, for `index >= 1`.
pub fn halton(mut index: u32, base: u32) -> f32 {
    let mut fraction = 1.0f32;
    let mut result = 0.0f32;
    while index > 0 {
        fraction /= base as f32;
        result += fraction * (index % base) as f32;
        index /= base;
    }
    result
}

/// Jitter in pixels, each component in `[-0.5, 0.5)`.
pub fn local_jitter(index: i32, phase_count: i32) -> [f32; 2] {
    let phase = index.rem_euclid(phase_count.max(1)) as u32 + 1;
    [halton(phase, 2) - 0.5, halton(phase, 3) - 0.5]
}

/// Jitter for frame `index`, asking the engine first.
pub fn jitter_for_frame<B, E>(engine: &mut E, index: i32) -> [f32; 2]
where
    B: Backend,
    E: FrameGenEngine<B>,
{
    match engine.jitter_offset(index, PHASE_COUNT) {
        Ok(jitter) => jitter,
        Err(status) => {
            warn!(code = %status, "Engine jitter query failed, using local sequence");
            local_jitter(index, PHASE_COUNT)
        }
    }
}

/// Clip-space translation to add to the projection matrix for `jitter`.
/// `None` while the render size is degenerate.
pub fn projection_offset(jitter: [f32; 2], render_size: Extent) -> Option<[f32; 2]> {
    if render_size.width == 0 || render_size.height == 0 {
        return None;
    }
    Some([
        -2.0 * jitter[0] / render_size.width as f32,
        2.0 * jitter[1] / render_size.height as f32,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use fg_interop::sim::{EngineCall, SimEngine, SimGpu};

    #[test]
    fn halton_bases() {
        assert_eq!(halton(1, 2), 0.5);
        assert_eq!(halton(2, 2), 0.25);
        assert_eq!(halton(3, 2), 0.75);
        assert!((halton(1, 3) - 1.0 / 3.0).abs() < 1e-6);
        assert!((halton(2, 3) - 2.0 / 3.0).abs() < 1e-6);
        assert!((halton(4, 3) - 4.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn local_sequence_wraps_at_phase_count() {
        assert_eq!(local_jitter(0, PHASE_COUNT), local_jitter(8, PHASE_COUNT));
        assert_ne!(local_jitter(0, PHASE_COUNT), local_jitter(1, PHASE_COUNT));
        assert_eq!(local_jitter(0, PHASE_COUNT), [0.0, 1.0 / 3.0 - 0.5]);
        for i in 0..PHASE_COUNT {
            let [x, y] = local_jitter(i, PHASE_COUNT);
            assert!((-0.5..0.5).contains(&x));
            assert!((-0.5..0.5).contains(&y));
        }
    }

    #[test]
    fn projection_offset_flips_x() {
        let offset = projection_offset([0.25, -0.5], Extent::new(1920, 1080)).unwrap();
        assert!((offset[0] - (-0.5 / 1920.0)).abs() < 1e-9);
        assert!((offset[1] - (-1.0 / 1080.0)).abs() < 1e-9);
        assert_eq!(projection_offset([0.25, 0.25], Extent::new(0, 1080)), None);
    }

    #[test]
    fn engine_is_asked_with_eight_phases() {
        let gpu = SimGpu::new();
        let mut engine = SimEngine::new(gpu);
        assert_eq!(jitter_for_frame::<SimGpu, _>(&mut engine, 42), [0.0, 0.0]);
        assert_eq!(
            engine.calls(),
            vec![EngineCall::Jitter {
                index: 42,
                phase_count: PHASE_COUNT
            }]
        );
    }
}
