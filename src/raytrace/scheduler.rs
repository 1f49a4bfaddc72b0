//! Work-stealing scheduler for the ray-tracing state machine: a local
//! unlocked deque per worker plus a shared, `parking_lot`-guarded deque for
//! overflow, gated by a low-water mark (spec §5). The ray tracer is the one
//! unit in this crate that uses multiple OS threads internally; every other
//! unit is single-threaded and cooperative.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use parking_lot::Mutex;

use crate::math::TASK_LO_THRESH;

use super::context::{ContextState, RtContext, Weight};
use super::scene::Scene;

/// Reported after every batch of work; lets the caller cancel a long run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Continue,
    Cancel,
}

struct SharedDeque {
    items: Mutex<Vec<RtContext>>,
}

impl SharedDeque {
    fn new() -> Self {
        Self { items: Mutex::new(Vec::new()) }
    }

    fn push(&self, ctx: RtContext) {
        self.items.lock().push(ctx);
    }

    fn pop(&self) -> Option<RtContext> {
        self.items.lock().pop()
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}

/// Drives the full SCAN_OBJECTS -> SPLIT -> CULL_BACK -> REFLECT state
/// machine to completion over a scene, accumulating capture output.
pub struct RayTraceScheduler {
    shared: Arc<SharedDeque>,
    cancel: Arc<AtomicBool>,
}

impl RayTraceScheduler {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SharedDeque::new()),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Run to completion over `worker_count` real OS threads (spec §4.4/§5:
    /// "a pool of N worker threads, one local deque per worker plus a single
    /// shared deque protected by a lock"). Roots are distributed round-robin
    /// across the threads' local deques; each worker pops locally first, then
    /// steals from the shared deque, and exits once both are empty and every
    /// other worker is idle too. `progress` is polled periodically from
    /// whichever worker hits the count and may request cooperative
    /// cancellation; calls are serialized behind a lock since workers share
    /// the callback.
    pub fn run(
        &self,
        roots: Vec<RtContext>,
        scene: &Scene,
        capture_len: usize,
        sample_rate: f32,
        worker_count: usize,
        progress: impl FnMut(usize) -> Status + Send,
    ) -> Vec<Vec<f32>> {
        let worker_count = worker_count.max(1);
        let n_captures = scene.captures.len();

        let mut local_queues: Vec<Vec<RtContext>> = vec![Vec::new(); worker_count];
        for (i, ctx) in roots.into_iter().enumerate() {
            local_queues[i % worker_count].push(ctx);
        }

        let combined = StdMutex::new(vec![vec![0.0f32; capture_len]; n_captures]);
        let processed = AtomicUsize::new(0);
        let idle = AtomicUsize::new(0);
        let progress = StdMutex::new(progress);

        std::thread::scope(|s| {
            for local in local_queues {
                s.spawn(|| {
                    let out = self.worker_body(
                        local,
                        scene,
                        n_captures,
                        capture_len,
                        sample_rate,
                        worker_count,
                        &processed,
                        &idle,
                        &progress,
                    );
                    let mut guard = combined.lock().unwrap();
                    for (dst, src) in guard.iter_mut().zip(out.iter()) {
                        for (d, v) in dst.iter_mut().zip(src.iter()) {
                            *d += *v;
                        }
                    }
                });
            }
        });

        combined.into_inner().unwrap()
    }

    /// One worker thread's drive loop: pop-process-push against its own
    /// local stack, spilling to the shared deque above the low-water mark
    /// and stealing from it once local work runs dry. Termination is
    /// detected by counting idle workers: the last worker to find both
    /// deques empty ends the run for everyone.
    #[allow(clippy::too_many_arguments)]
    fn worker_body(
        &self,
        mut local: Vec<RtContext>,
        scene: &Scene,
        n_captures: usize,
        capture_len: usize,
        sample_rate: f32,
        worker_count: usize,
        processed: &AtomicUsize,
        idle: &AtomicUsize,
        progress: &StdMutex<impl FnMut(usize) -> Status>,
    ) -> Vec<Vec<f32>> {
        let mut out = vec![vec![0.0f32; capture_len]; n_captures];
        loop {
            while let Some(mut ctx) = local.pop() {
                if self.cancel.load(Ordering::Relaxed) {
                    return out;
                }
                let children = ctx.step(scene, &mut out, sample_rate);
                if !context_finished(&ctx) {
                    local.push(ctx);
                }
                for child in children {
                    match child.weight() {
                        Weight::Easy => local.push(child),
                        Weight::Heavy => self.shared.push(child),
                    }
                }
                if local.len() > TASK_LO_THRESH / 4 {
                    if let Some(spill) = local.pop() {
                        log::trace!("local deque over threshold ({}), spilling one context", local.len());
                        self.shared.push(spill);
                    }
                }
                let n = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if n % 256 == 0 {
                    let status = (progress.lock().unwrap())(n);
                    if status == Status::Cancel {
                        self.cancel.store(true, Ordering::Relaxed);
                        return out;
                    }
                }
            }
            if let Some(ctx) = self.shared.pop() {
                local.push(ctx);
                continue;
            }
            if self.cancel.load(Ordering::Relaxed) {
                return out;
            }
            // Both deques are empty from this worker's point of view. Mark
            // idle and spin briefly: either every worker goes idle at once
            // (the run is done) or someone spills new work and we resume.
            idle.fetch_add(1, Ordering::SeqCst);
            loop {
                if idle.load(Ordering::SeqCst) == worker_count {
                    return out;
                }
                if self.cancel.load(Ordering::Relaxed) {
                    idle.fetch_sub(1, Ordering::SeqCst);
                    return out;
                }
                if self.shared.len() > 0 {
                    idle.fetch_sub(1, Ordering::SeqCst);
                    break;
                }
                std::thread::yield_now();
            }
        }
    }
}

impl Default for RayTraceScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn context_finished(ctx: &RtContext) -> bool {
    matches!(ctx.state, ContextState::Reflect) && ctx.triangles.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raytrace::geometry::{Triangle, Vec3};

    #[test]
    fn empty_scene_produces_silent_captures() {
        let scheduler = RayTraceScheduler::new();
        let scene = Scene::new(343.0);
        let view = Triangle {
            v: [Vec3::new(1.0, -1.0, 1.0), Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0, 0.0, -1.0)],
            object_id: u32::MAX,
            face_id: 0,
        };
        let root = RtContext::root(Vec3::ZERO, view, scene.speed_of_sound, 1.0);
        let out = scheduler.run(vec![root], &scene, 256, 48000.0, 4, |_| Status::Continue);
        assert!(out.is_empty());
    }
}
