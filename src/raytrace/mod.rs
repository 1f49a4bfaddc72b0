//! Ray-traced room impulse-response generator (spec §4.4).
//!
//! A [`Scene`] of triangulated objects, sound [`scene::Source`]s and
//! [`scene::Capture`] points is traced by firing one view-frustum context per
//! source triangle of its capture surface; [`RayTraceScheduler`] drives the
//! SCAN_OBJECTS/SPLIT/CULL_BACK/REFLECT state machine to a configurable
//! reflection depth and accumulates each capture's impulse response.

pub mod context;
pub mod geometry;
pub mod scene;
pub mod scheduler;

pub use context::{ContextState, RtContext};
pub use geometry::{Aabb, Plane, Triangle, Vec3};
pub use scene::{Capture, Directivity, Material, Scene, SceneObject, Source};
pub use scheduler::{RayTraceScheduler, Status};

use crate::error::Result;

/// Highest-level entry point: trace every source against every capture in
/// `scene`, producing one impulse response buffer per capture.
pub struct RayTracer {
    scheduler: RayTraceScheduler,
    max_reflections: u32,
    worker_count: usize,
}

impl RayTracer {
    /// `worker_count` is the size of the OS thread pool `trace` spawns per
    /// call (spec §4.4/§5: "a pool of N worker threads... worker count given
    /// by caller"). Always at least 1.
    pub fn new(max_reflections: u32, worker_count: usize) -> Self {
        Self {
            scheduler: RayTraceScheduler::new(),
            max_reflections,
            worker_count: worker_count.max(1),
        }
    }

    pub fn cancel(&self) {
        self.scheduler.cancel();
    }

    /// Trace `scene`, writing `capture_len` samples of impulse response per
    /// capture at `sample_rate`. `progress` is polled periodically (from
    /// whichever worker thread hits the count) and may request cancellation
    /// by returning [`Status::Cancel`].
    pub fn trace(
        &self,
        scene: &Scene,
        capture_len: usize,
        sample_rate: f32,
        progress: impl FnMut(usize) -> Status + Send,
    ) -> Result<Vec<Vec<f32>>> {
        let mut roots = Vec::new();
        for source in &scene.sources {
            for object in &scene.objects {
                for tri in &object.triangles {
                    roots.push(
                        RtContext::root(source.position, *tri, scene.speed_of_sound, source.amplitude)
                            .with_max_reflections(self.max_reflections),
                    );
                }
            }
            for capture in &scene.captures {
                roots.push(
                    RtContext::root(source.position, capture.triangle, scene.speed_of_sound, source.amplitude)
                        .with_max_reflections(self.max_reflections),
                );
            }
        }
        Ok(self
            .scheduler
            .run(roots, scene, capture_len, sample_rate, self.worker_count, progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_with_no_sources_returns_empty() {
        let tracer = RayTracer::new(8, 4);
        let scene = Scene::new(343.0);
        let out = tracer.trace(&scene, 256, 48000.0, |_| Status::Continue).unwrap();
        assert!(out.is_empty());
    }
}
