use std::f64::consts::TAU;

use glam::{DVec2, DVec3};

/// 三角网格。坐标为 z 轴向上的世界坐标。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<DVec3>,
    pub indices: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count),
            indices: Vec::with_capacity(triangle_count),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn push_vertex(&mut self, position: DVec3) -> u32 {
        self.positions.push(position);
        (self.positions.len() - 1) as u32
    }

    #[inline]
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.push([a, b, c]);
    }

    /// 按 `a b c d` 顺序添加四边形（两个三角形）。
    pub fn push_quad(&mut self, a: DVec3, b: DVec3, c: DVec3, d: DVec3) {
        let ia = self.push_vertex(a);
        let ib = self.push_vertex(b);
        let ic = self.push_vertex(c);
        let id = self.push_vertex(d);
        self.push_triangle(ia, ib, ic);
        self.push_triangle(ia, ic, id);
    }

    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.indices.extend(
            other
                .indices
                .iter()
                .map(|[a, b, c]| [a + offset, b + offset, c + offset]),
        );
    }

    pub fn translate(&mut self, offset: DVec3) {
        for position in &mut self.positions {
            *position += offset;
        }
    }

    /// 轴对齐包围盒；空网格返回 `None`。
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }

    pub fn triangles(&self) -> impl Iterator<Item = [DVec3; 3]> + '_ {
        self.indices.iter().map(|[a, b, c]| {
            [
                self.positions[*a as usize],
                self.positions[*b as usize],
                self.positions[*c as usize],
            ]
        })
    }

    /// 射线与网格最近交点的参数 `t`（`origin + direction * t`）。
    pub fn intersect_ray(&self, origin: DVec3, direction: DVec3) -> Option<f64> {
        self.triangles()
            .filter_map(|triangle| intersect_triangle(origin, direction, triangle))
            .min_by(f64::total_cmp)
    }

    /// 轴对齐长方体。
    pub fn cuboid(min: DVec3, max: DVec3) -> Self {
        let corners = [
            DVec3::new(min.x, min.y, min.z),
            DVec3::new(max.x, min.y, min.z),
            DVec3::new(max.x, max.y, min.z),
            DVec3::new(min.x, max.y, min.z),
        ];
        let base: Vec<DVec2> = corners.iter().map(|c| c.truncate()).collect();
        Self::prism_from_footprint(&base, min.z, max.z)
    }

    /// 凸底面的直棱柱，底面需为逆时针顺序。
    pub fn prism_from_footprint(footprint: &[DVec2], bottom: f64, top: f64) -> Self {
        let count = footprint.len();
        let mut mesh = Self::with_capacity(count * 6, count * 4);
        if count < 3 {
            return mesh;
        }
        let lower: Vec<u32> = footprint
            .iter()
            .map(|p| mesh.push_vertex(p.extend(bottom)))
            .collect();
        let upper: Vec<u32> = footprint
            .iter()
            .map(|p| mesh.push_vertex(p.extend(top)))
            .collect();
        for i in 1..count - 1 {
            mesh.push_triangle(lower[0], lower[i + 1], lower[i]);
            mesh.push_triangle(upper[0], upper[i], upper[i + 1]);
        }
        for i in 0..count {
            let j = (i + 1) % count;
            mesh.push_quad(
                footprint[i].extend(bottom),
                footprint[j].extend(bottom),
                footprint[j].extend(top),
                footprint[i].extend(top),
            );
        }
        mesh
    }

    /// 正多边形截面的柱体，近似圆柱。
    pub fn prism(center: DVec2, radius: f64, sides: usize, bottom: f64, top: f64) -> Self {
        Self::prism_from_footprint(&regular_polygon(center, radius, sides), bottom, top)
    }

    pub fn cone(center: DVec2, radius: f64, sides: usize, bottom: f64, apex: f64) -> Self {
        let ring = regular_polygon(center, radius, sides);
        let mut mesh = Self::with_capacity(ring.len() + 2, ring.len() * 2);
        let tip = mesh.push_vertex(center.extend(apex));
        let hub = mesh.push_vertex(center.extend(bottom));
        let rim: Vec<u32> = ring.iter().map(|p| mesh.push_vertex(p.extend(bottom))).collect();
        for i in 0..rim.len() {
            let j = (i + 1) % rim.len();
            mesh.push_triangle(rim[i], rim[j], tip);
            mesh.push_triangle(hub, rim[j], rim[i]);
        }
        mesh
    }

    /// 经纬剖分的椭球。`radius_z` 与水平半径不同即为椭球。
    pub fn ellipsoid(
        center: DVec3,
        radius_xy: f64,
        radius_z: f64,
        segments: usize,
        rings: usize,
    ) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut mesh = Self::with_capacity(segments * (rings + 1), segments * rings * 2);
        for ring in 0..=rings {
            let polar = std::f64::consts::PI * ring as f64 / rings as f64;
            for segment in 0..segments {
                let azimuth = TAU * segment as f64 / segments as f64;
                mesh.push_vertex(
                    center
                        + DVec3::new(
                            radius_xy * polar.sin() * azimuth.cos(),
                            radius_xy * polar.sin() * azimuth.sin(),
                            radius_z * polar.cos(),
                        ),
                );
            }
        }
        let stride = segments as u32;
        for ring in 0..rings as u32 {
            for segment in 0..stride {
                let next = (segment + 1) % stride;
                let a = ring * stride + segment;
                let b = ring * stride + next;
                let c = (ring + 1) * stride + next;
                let d = (ring + 1) * stride + segment;
                mesh.push_triangle(a, d, c);
                mesh.push_triangle(a, c, b);
            }
        }
        mesh
    }

    /// 沿线段 `from → to` 的细长方棒，截面边长 `width`。
    pub fn beam(from: DVec3, to: DVec3, width: f64) -> Self {
        let axis = to - from;
        if axis.length_squared() <= f64::EPSILON {
            return Self::new();
        }
        let forward = axis.normalize();
        let helper = if forward.z.abs() < 0.9 { DVec3::Z } else { DVec3::X };
        let side = forward.cross(helper).normalize() * (width * 0.5);
        let up = forward.cross(side).normalize() * (width * 0.5);
        let ring = [side + up, -side + up, -side - up, side - up];
        let mut mesh = Self::with_capacity(16, 8);
        for i in 0..4 {
            let j = (i + 1) % 4;
            mesh.push_quad(from + ring[i], from + ring[j], to + ring[j], to + ring[i]);
        }
        mesh
    }
}

fn regular_polygon(center: DVec2, radius: f64, sides: usize) -> Vec<DVec2> {
    let sides = sides.max(3);
    (0..sides)
        .map(|i| {
            let angle = TAU * i as f64 / sides as f64;
            center + DVec2::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

/// Möller–Trumbore，双面求交。
fn intersect_triangle(origin: DVec3, direction: DVec3, [a, b, c]: [DVec3; 3]) -> Option<f64> {
    const EPS: f64 = 1e-9;
    let edge1 = b - a;
    let edge2 = c - a;
    let p = direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < EPS {
        return None;
    }
    let inv = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = direction.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv;
    (t > EPS).then_some(t)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn cuboid_is_closed_box() {
        let mesh = Mesh::cuboid(DVec3::ZERO, DVec3::new(2.0, 3.0, 4.0));
        assert_eq!(mesh.triangle_count(), 12);
        let (min, max) = mesh.bounds().expect("bounds");
        assert_eq!(min, DVec3::ZERO);
        assert_eq!(max, DVec3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn ray_hits_nearest_face() {
        let mesh = Mesh::cuboid(DVec3::new(-1.0, -1.0, 0.0), DVec3::new(1.0, 1.0, 2.0));
        let t = mesh
            .intersect_ray(DVec3::new(0.3, -0.2, 10.0), DVec3::NEG_Z)
            .expect("hit");
        assert_relative_eq!(t, 8.0, epsilon = 1e-9);
        assert!(
            mesh.intersect_ray(DVec3::new(5.0, 0.0, 10.0), DVec3::NEG_Z)
                .is_none()
        );
    }

    #[test]
    fn merge_offsets_indices() {
        let mut a = Mesh::cuboid(DVec3::ZERO, DVec3::ONE);
        let b = Mesh::cuboid(DVec3::splat(2.0), DVec3::splat(3.0));
        let vertices = a.vertex_count() as u32;
        a.merge(&b);
        assert_eq!(a.triangle_count(), 24);
        assert!(a.indices[12..].iter().flatten().all(|index| *index >= vertices));
    }

    #[test]
    fn ellipsoid_respects_radii() {
        let mesh = Mesh::ellipsoid(DVec3::new(0.0, 0.0, 10.0), 4.0, 8.0, 8, 6);
        let (min, max) = mesh.bounds().expect("bounds");
        assert_relative_eq!(max.z, 18.0, epsilon = 1e-9);
        assert_relative_eq!(min.z, 2.0, epsilon = 1e-9);
        assert!(max.x <= 4.0 + 1e-9);
    }
}
