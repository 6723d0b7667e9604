//! Inputs from the host, read once per presented frame.

/// Frame time reported to the engine when the host's measurement is
/// implausibly small (loading screens, paused simulation).
pub const FALLBACK_FRAME_TIME_MS: f32 = 16.6;

/// World units to metres for a 70-units-per-metre scene scale.
pub const DEFAULT_VIEW_SPACE_TO_METERS: f32 = 0.014_282_226_56;

/// Camera world transform, split into position and basis vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: [f32; 3],
    pub right: [f32; 3],
    pub up: [f32; 3],
    pub forward: [f32; 3],
}

impl Default for CameraPose {
    /// Z-up, Y-forward basis at the origin.
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            right: [1.0, 0.0, 0.0],
            up: [0.0, 0.0, 1.0],
            forward: [0.0, 1.0, 0.0],
        }
    }
}

impl CameraPose {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Straight-line distance between two camera positions.
    pub fn distance_to(&self, other: &CameraPose) -> f32 {
        self.position
            .iter()
            .zip(other.position.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

/// Standard data that hosts provide every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    pub camera: CameraPose,
    pub camera_near: f32,
    pub camera_far: f32,
    /// Vertical field of view in radians.
    pub fov_vertical: f32,
    /// Sub-pixel jitter applied to this frame's projection, in pixels.
    pub jitter: [f32; 2],
    /// Milliseconds since the previous frame.
    pub frame_time_delta_ms: f32,
    pub view_space_to_meters: f32,
}

impl Default for FrameInputs {
    fn default() -> Self {
        Self {
            camera: CameraPose::default(),
            camera_near: 0.1,
            camera_far: 10_000.0,
            fov_vertical: std::f32::consts::FRAC_PI_3,
            jitter: [0.0; 2],
            frame_time_delta_ms: FALLBACK_FRAME_TIME_MS,
            view_space_to_meters: DEFAULT_VIEW_SPACE_TO_METERS,
        }
    }
}

impl FrameInputs {
    /// Frame delta as reported to the engine.
    pub fn effective_frame_time(&self) -> f32 {
        if self.frame_time_delta_ms < 1.0 {
            FALLBACK_FRAME_TIME_MS
        } else {
            self.frame_time_delta_ms
        }
    }
}

/// Supplies camera and timing data for the frame being presented.
pub trait FrameSource {
    fn frame_inputs(&mut self) -> FrameInputs;
}

impl<F> FrameSource for F
where
    F: FnMut() -> FrameInputs,
{
    fn frame_inputs(&mut self) -> FrameInputs {
        self()
    }
}

/// Options the orchestrator reads every frame, projected from settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOptions {
    pub frame_generation: bool,
    /// Sharpening for the native anti-aliasing pass; zero disables the pass.
    pub sharpness: f32,
    pub allow_async_workloads: bool,
    /// Camera movement between two presents, in world units, treated as a cut.
    pub camera_cut_distance: f32,
    /// Presents after creation or resize during which generation stays off.
    pub warmup_frames: u32,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            frame_generation: true,
            sharpness: 0.5,
            allow_async_workloads: true,
            camera_cut_distance: 1000.0,
            warmup_frames: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_deltas_fall_back() {
        let mut inputs = FrameInputs {
            frame_time_delta_ms: 0.2,
            ..FrameInputs::default()
        };
        assert_eq!(inputs.effective_frame_time(), FALLBACK_FRAME_TIME_MS);

        inputs.frame_time_delta_ms = 8.3;
        assert_eq!(inputs.effective_frame_time(), 8.3);
    }

    #[test]
    fn camera_distance() {
        let a = CameraPose::at([0.0, 0.0, 0.0]);
        let b = CameraPose::at([3.0, 4.0, 0.0]);
        assert!((a.distance_to(&b) - 5.0).abs() < f32::EPSILON);
    }
}
