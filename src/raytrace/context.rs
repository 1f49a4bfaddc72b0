//! A ray-tracing context: the unit of work the scheduler's worker pool
//! pushes/pops, and the `SCAN_OBJECTS -> SPLIT -> CULL_BACK -> REFLECT` state
//! machine that advances it (spec §4.4).

use std::collections::VecDeque;

use crate::math::{F_DETALIZATION, F_ENERGY_THRESH};

use super::geometry::{frustum_planes, Aabb, Plane, Triangle, Vec3};
use super::scene::{Directivity, Scene};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContextState {
    ScanObjects,
    Split,
    CullBack,
    Reflect,
}

/// Whether a context is cheap ("easy", pushed to the calling worker's local
/// deque) or heavy (pushed to the shared deque, subject to the low-water
/// mark), per spec §4.4/§5.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Weight {
    Easy,
    Heavy,
}

/// The unit of work: a view frustum plus the triangles still visible within
/// it, propagated source state, and bookkeeping for self-intersection
/// avoidance and the split plan.
#[derive(Clone)]
pub struct RtContext {
    pub source: Vec3,
    pub view: Triangle,
    pub planes: [Plane; 4],
    pub triangles: Vec<Triangle>,
    /// Undone edges (as vertex pairs) available for [`ContextState::Split`].
    pub split_plan: VecDeque<(Vec3, Vec3)>,
    pub spawning_object: Option<(u32, u32)>,
    /// +1 outside a material, -1 inside (spec §3).
    pub location_sign: i8,
    pub speed: f32,
    pub amplitude: f32,
    pub src_time: f32,
    pub reflection: u32,
    pub max_reflections: u32,
    pub state: ContextState,
}

impl RtContext {
    pub fn root(source: Vec3, view: Triangle, speed: f32, amplitude: f32) -> Self {
        let planes = frustum_planes(source, &view);
        Self {
            source,
            view,
            planes,
            triangles: Vec::new(),
            split_plan: VecDeque::new(),
            spawning_object: None,
            location_sign: 1,
            speed,
            amplitude,
            src_time: 0.0,
            reflection: 0,
            max_reflections: u32::MAX,
            state: ContextState::ScanObjects,
        }
    }

    pub fn with_max_reflections(mut self, max_reflections: u32) -> Self {
        self.max_reflections = max_reflections;
        self
    }

    pub fn weight(&self) -> Weight {
        if self.triangles.len() > 64 {
            Weight::Heavy
        } else {
            Weight::Easy
        }
    }

    /// Advance this context by one state-machine step. Returns any new
    /// sibling/child contexts spawned, and whether this context finished
    /// (has nothing left to capture/reflect and should be dropped).
    pub fn step(&mut self, scene: &Scene, out: &mut [Vec<f32>], sample_rate: f32) -> Vec<RtContext> {
        match self.state {
            ContextState::ScanObjects => {
                self.scan_objects(scene);
                self.state = ContextState::Split;
                Vec::new()
            }
            ContextState::Split => self.split(),
            ContextState::CullBack => {
                self.cull_back();
                self.state = ContextState::Reflect;
                Vec::new()
            }
            ContextState::Reflect => self.reflect(scene, out, sample_rate),
        }
    }

    fn scan_objects(&mut self, scene: &Scene) {
        for object in &scene.objects {
            let bbox = Aabb::from_triangles(&object.triangles);
            if !bbox.intersects_frustum(&self.planes) {
                continue;
            }
            for tri in &object.triangles {
                if let Some((obj, face)) = self.spawning_object {
                    if tri.object_id == obj && tri.face_id == face {
                        continue;
                    }
                }
                for clipped in tri.clip_all(&self.planes) {
                    for edge in clipped.edges() {
                        self.split_plan.push_back(edge);
                    }
                    self.triangles.push(clipped);
                }
            }
        }
    }

    fn split(&mut self) -> Vec<RtContext> {
        let Some((a, b)) = self.split_plan.pop_front() else {
            self.state = ContextState::CullBack;
            return Vec::new();
        };
        let plane = Plane::through_edge_and_point(a, b, self.source);
        let mut above = Vec::new();
        let mut below = Vec::new();
        for tri in self.triangles.drain(..) {
            let d0 = plane.signed_distance(tri.v[0]);
            let d1 = plane.signed_distance(tri.v[1]);
            let d2 = plane.signed_distance(tri.v[2]);
            if d0 >= 0.0 && d1 >= 0.0 && d2 >= 0.0 {
                above.push(tri);
            } else if d0 <= 0.0 && d1 <= 0.0 && d2 <= 0.0 {
                below.push(tri);
            } else {
                above.extend(tri.clip(&plane));
                let flipped = Plane {
                    origin: plane.origin,
                    normal: plane.normal.scale(-1.0),
                };
                below.extend(tri.clip(&flipped));
            }
        }

        self.triangles = above;
        let mut siblings = Vec::new();
        if !below.is_empty() {
            let mut sibling = self.clone();
            sibling.triangles = below;
            siblings.push(sibling);
        }
        // Remain in `Split` until the plan is exhausted; re-queued by the
        // scheduler like any other task.
        if self.triangles.is_empty() && !siblings.is_empty() {
            // Nothing left on this side; let the sibling carry on alone.
            self.state = ContextState::Split;
        }
        siblings
    }

    fn cull_back(&mut self) {
        if self.triangles.is_empty() {
            return;
        }
        let nearest = self
            .triangles
            .iter()
            .min_by(|a, b| {
                self.source
                    .distance(a.centroid())
                    .partial_cmp(&self.source.distance(b.centroid()))
                    .unwrap()
            })
            .copied()
            .unwrap();
        let mut plane = Plane::through_points(nearest.v[0], nearest.v[1], nearest.v[2]);
        if plane.signed_distance(self.source) < 0.0 {
            plane.normal = plane.normal.scale(-1.0);
        }
        self.triangles
            .retain(|tri| tri.v.iter().any(|&v| plane.signed_distance(v) >= -1e-6));
    }

    fn reflect(&mut self, scene: &Scene, out: &mut [Vec<f32>], sample_rate: f32) -> Vec<RtContext> {
        let mut children = Vec::new();
        let depth_exhausted = self.reflection >= self.max_reflections;
        for tri in self.triangles.clone() {
            let area = tri.area();
            if area <= F_DETALIZATION {
                continue;
            }
            let arrival: [f32; 3] = std::array::from_fn(|i| {
                self.src_time + self.source.distance(tri.v[i]) / self.speed
            });

            if let Some(capture_idx) = find_capture(scene, &tri) {
                capture(
                    scene,
                    capture_idx,
                    &tri,
                    arrival,
                    self.amplitude,
                    self.source,
                    out,
                    sample_rate,
                );
                continue;
            }

            if depth_exhausted {
                continue;
            }

            let object = scene
                .objects
                .iter()
                .find(|o| o.triangles.iter().any(|t| t.object_id == tri.object_id));
            let (material, reflect_material) = match object {
                Some(o) if self.location_sign > 0 => (o.front, o.back),
                Some(o) => (o.back, o.front),
                None => Default::default(),
            };

            let normal = tri.normal();
            let centroid = tri.centroid();
            let d = self.source.distance(centroid);

            let diffusion = material.diffusion.max(1e-3);
            let mirror_dist = (1.0 + 1.0 / diffusion) * d;
            let reflected_source = centroid.add(normal.scale(mirror_dist));
            let reflect_amp = self.amplitude * (1.0 - material.absorption);
            if reflect_amp.abs() >= F_ENERGY_THRESH {
                children.push(self.spawn_child(
                    reflected_source,
                    tri,
                    reflect_amp,
                    self.speed,
                    self.location_sign,
                    arrival,
                ));
            }

            if material.transparency > 0.0 {
                let refract_amp = self.amplitude * material.transparency;
                if refract_amp.abs() >= F_ENERGY_THRESH {
                    let refracted_source = self.source;
                    let refracted_speed = self.speed * reflect_material.permeability.max(1e-3);
                    children.push(self.spawn_child(
                        refracted_source,
                        tri,
                        refract_amp,
                        refracted_speed,
                        -self.location_sign,
                        arrival,
                    ));
                }
            }
        }
        children
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_child(
        &self,
        source: Vec3,
        view: Triangle,
        amplitude: f32,
        speed: f32,
        location_sign: i8,
        arrival: [f32; 3],
    ) -> RtContext {
        let mut child = RtContext::root(source, view, speed, amplitude);
        child.spawning_object = Some((view.object_id, view.face_id));
        child.location_sign = location_sign;
        child.reflection = self.reflection + 1;
        child.max_reflections = self.max_reflections;
        child.src_time = arrival.iter().copied().fold(0.0, f32::max);
        child
    }
}

fn find_capture(scene: &Scene, tri: &Triangle) -> Option<usize> {
    scene
        .captures
        .iter()
        .position(|c| c.triangle.object_id == tri.object_id && c.triangle.face_id == tri.face_id)
}

#[allow(clippy::too_many_arguments)]
fn capture(
    scene: &Scene,
    capture_idx: usize,
    tri: &Triangle,
    arrival: [f32; 3],
    amplitude: f32,
    source: Vec3,
    out: &mut [Vec<f32>],
    sample_rate: f32,
) {
    let cap = &scene.captures[capture_idx];
    let t_min = arrival.iter().copied().fold(f32::INFINITY, f32::min);
    let t_max = arrival.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !(t_max > t_min) {
        return;
    }
    let centroid = tri.centroid();
    let to_capture = centroid.sub(source).normalized();
    let cos_theta = cap.look.normalized().dot(to_capture.scale(-1.0));
    let directivity = cap.directivity.gain(cos_theta);

    let first = (t_min * sample_rate).ceil().max(1.0) as i64;
    let last = (t_max * sample_rate).floor() as i64;
    let buffer = &mut out[capture_idx];

    let mut prev_area = 0.0f32;
    for csn in first..=last {
        let threshold = csn as f32 / sample_rate;
        let area_so_far = tri.area_below(arrival, threshold);
        let delta_area = (area_so_far - prev_area).max(0.0);
        prev_area = area_so_far;
        let idx = (csn - 1).max(0) as usize;
        if idx < buffer.len() {
            buffer[idx] += amplitude * delta_area.sqrt() * directivity;
        }
    }
}
