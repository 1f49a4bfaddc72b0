//! 3-D geometry primitives backing the ray-tracing scene: points, planes,
//! triangles, and the clip/cull/split routines the scheduler's state machine
//! drives (spec §4.4). Re-architected per spec §9 as plain arenas of
//! vertices/triangles rather than a back-referencing edge/triangle graph.

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, o: Vec3) -> f32 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    pub fn cross(self, o: Vec3) -> Vec3 {
        Vec3::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    pub fn sub(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }

    pub fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }

    pub fn scale(self, k: f32) -> Vec3 {
        Vec3::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn normalized(self) -> Vec3 {
        let l = self.length();
        if l > 1e-12 {
            self.scale(1.0 / l)
        } else {
            self
        }
    }

    pub fn lerp(self, o: Vec3, t: f32) -> Vec3 {
        self.add(o.sub(self).scale(t))
    }

    pub fn distance(self, o: Vec3) -> f32 {
        self.sub(o).length()
    }
}

/// A plane in point-normal form: points `p` satisfying `(p - origin).n = 0`
/// are on the plane; `signed_distance > 0` is the "inside" half-space.
#[derive(Copy, Clone, Debug)]
pub struct Plane {
    pub origin: Vec3,
    pub normal: Vec3,
}

impl Plane {
    pub fn through_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
        let normal = b.sub(a).cross(c.sub(a)).normalized();
        Self { origin: a, normal }
    }

    pub fn through_edge_and_point(a: Vec3, b: Vec3, p: Vec3) -> Self {
        Self::through_points(a, b, p)
    }

    pub fn signed_distance(&self, p: Vec3) -> f32 {
        p.sub(self.origin).dot(self.normal)
    }
}

/// A triangle, storing its three vertex positions directly (the arena's
/// "triangle" unit — edges are derived on demand rather than tracked as a
/// separate indexed structure, since scenes in this crate are rebuilt afresh
/// per ray-tracer run rather than edited incrementally).
#[derive(Copy, Clone, Debug)]
pub struct Triangle {
    pub v: [Vec3; 3],
    /// Scene-object identifier this triangle belongs to (self-intersection
    /// avoidance, spec §3).
    pub object_id: u32,
    /// Face identifier within the object.
    pub face_id: u32,
}

impl Triangle {
    pub fn normal(&self) -> Vec3 {
        self.v[1].sub(self.v[0]).cross(self.v[2].sub(self.v[0])).normalized()
    }

    pub fn area(&self) -> f32 {
        0.5 * self.v[1].sub(self.v[0]).cross(self.v[2].sub(self.v[0])).length()
    }

    pub fn centroid(&self) -> Vec3 {
        self.v[0].add(self.v[1]).add(self.v[2]).scale(1.0 / 3.0)
    }

    /// Clip this triangle against `plane`, keeping the half-space where
    /// `signed_distance >= 0`. Sutherland-Hodgman over a triangle can yield 0,
    /// 1 (triangle), or 2 (quad, emitted as two triangles) output polygons.
    pub fn clip(&self, plane: &Plane) -> Vec<Triangle> {
        let dist: [f32; 3] = std::array::from_fn(|i| plane.signed_distance(self.v[i]));
        let inside: [bool; 3] = std::array::from_fn(|i| dist[i] >= 0.0);
        let inside_count = inside.iter().filter(|&&b| b).count();

        match inside_count {
            0 => Vec::new(),
            3 => vec![*self],
            1 => {
                let i = inside.iter().position(|&b| b).unwrap();
                let j = (i + 1) % 3;
                let k = (i + 2) % 3;
                let pj = self.v[i].lerp(self.v[j], dist[i] / (dist[i] - dist[j]));
                let pk = self.v[i].lerp(self.v[k], dist[i] / (dist[i] - dist[k]));
                vec![Triangle {
                    v: [self.v[i], pj, pk],
                    object_id: self.object_id,
                    face_id: self.face_id,
                }]
            }
            2 => {
                let i = inside.iter().position(|&b| !b).unwrap();
                let j = (i + 1) % 3;
                let k = (i + 2) % 3;
                let pj = self.v[i].lerp(self.v[j], dist[i] / (dist[i] - dist[j]));
                let pk = self.v[i].lerp(self.v[k], dist[i] / (dist[i] - dist[k]));
                vec![
                    Triangle {
                        v: [pj, self.v[j], self.v[k]],
                        object_id: self.object_id,
                        face_id: self.face_id,
                    },
                    Triangle {
                        v: [pj, self.v[k], pk],
                        object_id: self.object_id,
                        face_id: self.face_id,
                    },
                ]
            }
            _ => unreachable!(),
        }
    }

    /// Clip against all planes of a view frustum in sequence.
    pub fn clip_all(&self, planes: &[Plane]) -> Vec<Triangle> {
        let mut current = vec![*self];
        for plane in planes {
            let mut next = Vec::new();
            for tri in &current {
                next.extend(tri.clip(plane));
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// The three undirected edges of this triangle as vertex pairs.
    pub fn edges(&self) -> [(Vec3, Vec3); 3] {
        [(self.v[0], self.v[1]), (self.v[1], self.v[2]), (self.v[2], self.v[0])]
    }

    /// Generalized Sutherland-Hodgman clip keyed on a per-vertex scalar
    /// field (e.g. wavefront arrival time) rather than a geometric plane.
    /// Keeps the region where `values[i] <= threshold`. Used by capture
    /// integration to split a triangle by "time-of-arrival so far" (spec
    /// §4.4's "split the original triangle by that plane").
    pub fn clip_by_scalar(&self, values: [f32; 3], threshold: f32) -> Vec<Triangle> {
        let dist: [f32; 3] = std::array::from_fn(|i| threshold - values[i]);
        let inside: [bool; 3] = std::array::from_fn(|i| dist[i] >= 0.0);
        let inside_count = inside.iter().filter(|&&b| b).count();
        match inside_count {
            0 => Vec::new(),
            3 => vec![*self],
            1 => {
                let i = inside.iter().position(|&b| b).unwrap();
                let j = (i + 1) % 3;
                let k = (i + 2) % 3;
                let pj = self.v[i].lerp(self.v[j], dist[i] / (dist[i] - dist[j]));
                let pk = self.v[i].lerp(self.v[k], dist[i] / (dist[i] - dist[k]));
                vec![Triangle {
                    v: [self.v[i], pj, pk],
                    object_id: self.object_id,
                    face_id: self.face_id,
                }]
            }
            2 => {
                let i = inside.iter().position(|&b| !b).unwrap();
                let j = (i + 1) % 3;
                let k = (i + 2) % 3;
                let pj = self.v[i].lerp(self.v[j], dist[i] / (dist[i] - dist[j]));
                let pk = self.v[i].lerp(self.v[k], dist[i] / (dist[i] - dist[k]));
                vec![
                    Triangle {
                        v: [pj, self.v[j], self.v[k]],
                        object_id: self.object_id,
                        face_id: self.face_id,
                    },
                    Triangle {
                        v: [pj, self.v[k], pk],
                        object_id: self.object_id,
                        face_id: self.face_id,
                    },
                ]
            }
            _ => unreachable!(),
        }
    }

    /// Total area of the triangle's region where `values[i] <= threshold`.
    pub fn area_below(&self, values: [f32; 3], threshold: f32) -> f32 {
        self.clip_by_scalar(values, threshold)
            .iter()
            .map(Triangle::area)
            .sum()
    }
}

/// Build the four clipping planes of a view frustum: source point plus the
/// three vertices of the view triangle, normals pointing inward.
pub fn frustum_planes(source: Vec3, view: &Triangle) -> [Plane; 4] {
    [
        Plane::through_points(source, view.v[0], view.v[1]),
        Plane::through_points(source, view.v[1], view.v[2]),
        Plane::through_points(source, view.v[2], view.v[0]),
        Plane::through_points(view.v[0], view.v[1], view.v[2]),
    ]
}

/// Axis-aligned bounding box, used for the coarse object-vs-frustum cull.
#[derive(Copy, Clone, Debug)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_triangles(tris: &[Triangle]) -> Self {
        let mut min = Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY);
        let mut max = Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
        for t in tris {
            for v in t.v {
                min.x = min.x.min(v.x);
                min.y = min.y.min(v.y);
                min.z = min.z.min(v.z);
                max.x = max.x.max(v.x);
                max.y = max.y.max(v.y);
                max.z = max.z.max(v.z);
            }
        }
        Self { min, max }
    }

    fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// `true` if any corner is on the inside half-space of every plane (a
    /// conservative intersect test, sufficient for a coarse cull).
    pub fn intersects_frustum(&self, planes: &[Plane; 4]) -> bool {
        for plane in planes {
            if self.corners().iter().all(|&c| plane.signed_distance(c) < 0.0) {
                return false;
            }
        }
        true
    }
}
