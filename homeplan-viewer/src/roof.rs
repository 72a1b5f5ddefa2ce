//! 直骨架屋顶。
//!
//! 轮廓各边以单位速度同时向内平移，顶点沿角平分线运动。边收缩为零（边事件）时两顶点合并；
//! 凹顶点撞上对面边（分裂事件）时波前一分为二；波前面积归零时剩余顶点连成屋脊。
//! 每个顶点的运动轨迹是一条骨架弧，弧两侧各属于一条原始边对应的坡面；
//! 坡面上一点的高度为 `eave + 偏移时间 * pitch`。

use std::collections::HashMap;

use glam::{DVec2, DVec3};
use homeplan_core::geometry::{EPSILON, Point2, is_simple_polygon, signed_area, simplify_polygon};
use tracing::debug;

use crate::errors::ViewerError;
use crate::extrude::triangulate;
use crate::mesh::Mesh;

const TIME_EPS: f64 = 1e-7;

/// 一个坡面：原始轮廓边 `edge` 及其上方的斜面多边形。
#[derive(Debug, Clone, PartialEq)]
pub struct RoofFacet {
    pub edge: usize,
    pub points: Vec<DVec3>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Roof {
    pub outline: Vec<Point2>,
    pub eave: f64,
    pub facets: Vec<RoofFacet>,
}

impl Roof {
    /// 屋脊最高点。
    pub fn peak(&self) -> f64 {
        self.facets
            .iter()
            .flat_map(|facet| facet.points.iter().map(|p| p.z))
            .fold(self.eave, f64::max)
    }

    pub fn to_mesh(&self) -> Result<Mesh, ViewerError> {
        let mut mesh = Mesh::new();
        for facet in &self.facets {
            let flat: Vec<DVec2> = facet.points.iter().map(|p| p.truncate()).collect();
            let triangles = triangulate(&flat)?;
            let indices: Vec<u32> = facet.points.iter().map(|p| mesh.push_vertex(*p)).collect();
            for [a, b, c] in triangles {
                mesh.push_triangle(indices[a], indices[b], indices[c]);
            }
        }
        Ok(mesh)
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    position: DVec2,
    time: f64,
}

/// 骨架弧，`left`/`right` 为两侧原始边。
#[derive(Debug, Clone, Copy)]
struct Arc {
    from: Node,
    to: Node,
    left: usize,
    right: usize,
}

#[derive(Debug, Clone, Copy)]
struct Vertex {
    position: DVec2,
    origin: Node,
    velocity: DVec2,
    /// 进入本顶点的原始边。
    left: usize,
    /// 离开本顶点的原始边。
    right: usize,
}

#[derive(Debug, Clone, Copy)]
enum Event {
    /// 波前 `lav` 中下标 `index` 与下一个顶点之间的边收缩为零。
    Edge { lav: usize, index: usize },
    /// 凹顶点 `index` 撞上从 `edge_start` 出发的波前边。
    Split {
        lav: usize,
        index: usize,
        edge_start: usize,
    },
}

struct Wavefront {
    directions: Vec<DVec2>,
    normals: Vec<DVec2>,
    lavs: Vec<Vec<Vertex>>,
    arcs: Vec<Arc>,
    time: f64,
}

impl Wavefront {
    fn new(outline: &[DVec2]) -> Self {
        let count = outline.len();
        let directions: Vec<DVec2> = (0..count)
            .map(|i| (outline[(i + 1) % count] - outline[i]).normalize_or_zero())
            .collect();
        let normals: Vec<DVec2> = directions.iter().map(|d| d.perp()).collect();
        let mut front = Self {
            directions,
            normals,
            lavs: Vec::new(),
            arcs: Vec::new(),
            time: 0.0,
        };
        let lav = (0..count)
            .map(|i| front.vertex(outline[i], (i + count - 1) % count, i))
            .collect();
        front.lavs.push(lav);
        front
    }

    fn vertex(&self, position: DVec2, left: usize, right: usize) -> Vertex {
        let (n1, n2) = (self.normals[left], self.normals[right]);
        let denominator = 1.0 + n1.dot(n2);
        // 反向平行的两边已重合，顶点不再移动
        let velocity = if denominator > EPSILON {
            (n1 + n2) / denominator
        } else {
            DVec2::ZERO
        };
        Vertex {
            position,
            origin: Node {
                position,
                time: self.time,
            },
            velocity,
            left,
            right,
        }
    }

    fn is_reflex(&self, vertex: &Vertex) -> bool {
        self.directions[vertex.left].perp_dot(self.directions[vertex.right]) < -EPSILON
    }

    fn retire(&mut self, vertex: &Vertex) {
        self.arcs.push(Arc {
            from: vertex.origin,
            to: Node {
                position: vertex.position,
                time: self.time,
            },
            left: vertex.left,
            right: vertex.right,
        });
    }

    /// 面积归零或不足三点的波前：顶点轨迹收尾，相邻顶点连成屋脊。
    fn collapse_degenerate(&mut self) {
        let mut index = 0;
        while index < self.lavs.len() {
            let lav = &self.lavs[index];
            let ring: Vec<Point2> = lav.iter().map(|v| Point2::from_vec(v.position)).collect();
            if lav.len() >= 3 && signed_area(&ring).abs() > EPSILON {
                index += 1;
                continue;
            }
            let lav = self.lavs.swap_remove(index);
            for vertex in &lav {
                self.retire(vertex);
            }
            if lav.len() >= 2 {
                let time = self.time;
                for (i, vertex) in lav.iter().enumerate() {
                    let next = lav[(i + 1) % lav.len()];
                    self.arcs.push(Arc {
                        from: Node {
                            position: vertex.position,
                            time,
                        },
                        to: Node {
                            position: next.position,
                            time,
                        },
                        left: vertex.right,
                        right: vertex.right,
                    });
                }
            }
        }
    }

    fn next_event(&self) -> Option<(f64, Event)> {
        let mut best: Option<(f64, Event)> = None;
        let mut consider = |dt: f64, event: Event| {
            if dt < -TIME_EPS {
                return;
            }
            let dt = dt.max(0.0);
            if best.is_none_or(|(current, _)| dt < current) {
                best = Some((dt, event));
            }
        };

        for (lav_index, lav) in self.lavs.iter().enumerate() {
            let count = lav.len();
            for index in 0..count {
                let a = &lav[index];
                let b = &lav[(index + 1) % count];
                let direction = self.directions[a.right];
                let length = (b.position - a.position).dot(direction);
                let rate = (b.velocity - a.velocity).dot(direction);
                if rate < -EPSILON {
                    consider(
                        -length / rate,
                        Event::Edge {
                            lav: lav_index,
                            index,
                        },
                    );
                }
            }

            for (index, reflex) in lav.iter().enumerate() {
                if !self.is_reflex(reflex) {
                    continue;
                }
                for edge_start in 0..count {
                    let a = &lav[edge_start];
                    let b = &lav[(edge_start + 1) % count];
                    let edge = a.right;
                    if edge == reflex.left || edge == reflex.right {
                        continue;
                    }
                    let normal = self.normals[edge];
                    let approach = 1.0 - reflex.velocity.dot(normal);
                    if approach <= EPSILON {
                        continue;
                    }
                    let dt = (reflex.position - a.position).dot(normal) / approach;
                    if dt < -TIME_EPS {
                        continue;
                    }
                    let dt = dt.max(0.0);
                    let hit = reflex.position + reflex.velocity * dt;
                    let start = a.position + a.velocity * dt;
                    let end = b.position + b.velocity * dt;
                    let direction = self.directions[edge];
                    let span = (end - start).dot(direction);
                    let along = (hit - start).dot(direction);
                    if span > EPSILON && along > EPSILON && along < span - EPSILON {
                        consider(
                            dt,
                            Event::Split {
                                lav: lav_index,
                                index,
                                edge_start,
                            },
                        );
                    }
                }
            }
        }
        best
    }

    fn advance(&mut self, dt: f64) {
        for lav in &mut self.lavs {
            for vertex in lav.iter_mut() {
                vertex.position += vertex.velocity * dt;
            }
        }
        self.time += dt;
    }

    fn apply(&mut self, event: Event) {
        match event {
            Event::Edge { lav, index } => {
                let mut ring = self.lavs.swap_remove(lav);
                let count = ring.len();
                let next = (index + 1) % count;
                let (a, b) = (ring[index], ring[next]);
                self.retire(&a);
                self.retire(&b);
                let merged = self.vertex((a.position + b.position) * 0.5, a.left, b.right);
                ring[index] = merged;
                ring.remove(next);
                self.lavs.push(ring);
            }
            Event::Split {
                lav,
                index,
                edge_start,
            } => {
                let ring = self.lavs.swap_remove(lav);
                let count = ring.len();
                let reflex = ring[index];
                self.retire(&reflex);
                let edge = ring[edge_start].right;
                let edge_end = (edge_start + 1) % count;

                // 一侧：reflex → edge_end → … → reflex 之前
                let mut first = vec![self.vertex(reflex.position, reflex.left, edge)];
                let mut cursor = edge_end;
                while cursor != index {
                    first.push(ring[cursor]);
                    cursor = (cursor + 1) % count;
                }
                // 另一侧：reflex → reflex 之后 → … → edge_start
                let mut second = vec![self.vertex(reflex.position, edge, reflex.right)];
                let mut cursor = (index + 1) % count;
                loop {
                    second.push(ring[cursor]);
                    if cursor == edge_start {
                        break;
                    }
                    cursor = (cursor + 1) % count;
                }
                self.lavs.push(first);
                self.lavs.push(second);
            }
        }
    }

    fn run(&mut self, max_steps: usize) -> bool {
        for _ in 0..max_steps {
            self.collapse_degenerate();
            if self.lavs.is_empty() {
                return true;
            }
            let Some((dt, event)) = self.next_event() else {
                // 无事件可发生：把剩余波前当作屋脊收尾
                for lav in std::mem::take(&mut self.lavs) {
                    for vertex in &lav {
                        self.retire(vertex);
                    }
                }
                return true;
            };
            self.advance(dt);
            self.apply(event);
        }
        false
    }
}

type NodeKey = (i64, i64);

fn node_key(position: DVec2) -> NodeKey {
    let scale = 1.0 / EPSILON.sqrt();
    (
        (position.x * scale).round() as i64,
        (position.y * scale).round() as i64,
    )
}

/// 沿骨架弧从边终点走回边起点，得到该边坡面的边界。
fn trace_facet(
    edge: usize,
    start: DVec2,
    end: DVec2,
    arcs: &[Arc],
    eave: f64,
    pitch: f64,
) -> Option<RoofFacet> {
    let mut heights: HashMap<NodeKey, DVec3> = HashMap::new();
    let mut adjacency: HashMap<NodeKey, Vec<NodeKey>> = HashMap::new();
    for arc in arcs.iter().filter(|arc| arc.left == edge || arc.right == edge) {
        let (from, to) = (node_key(arc.from.position), node_key(arc.to.position));
        if from == to {
            continue;
        }
        for node in [arc.from, arc.to] {
            heights
                .entry(node_key(node.position))
                .or_insert_with(|| node.position.extend(eave + node.time * pitch));
        }
        let forward = adjacency.entry(from).or_default();
        if !forward.contains(&to) {
            forward.push(to);
        }
        let backward = adjacency.entry(to).or_default();
        if !backward.contains(&from) {
            backward.push(from);
        }
    }

    let (start_key, end_key) = (node_key(start), node_key(end));
    let mut points = vec![start.extend(eave), end.extend(eave)];
    let mut previous = start_key;
    let mut current = end_key;
    for _ in 0..=adjacency.len() {
        let next = adjacency
            .get(&current)?
            .iter()
            .copied()
            .find(|candidate| *candidate != previous && *candidate != current)?;
        if next == start_key {
            return (points.len() >= 3).then_some(RoofFacet { edge, points });
        }
        points.push(*heights.get(&next)?);
        previous = current;
        current = next;
    }
    None
}

/// 为一个外轮廓合成坡屋顶。轮廓退化或自相交时返回 `None`，不视为错误。
pub fn synthesize_roof(outline: &[Point2], eave: f64, pitch: f64) -> Option<Roof> {
    let mut outline = simplify_polygon(outline);
    if !is_simple_polygon(&outline) {
        debug!(vertices = outline.len(), "屋顶轮廓退化或自相交，跳过");
        return None;
    }
    if signed_area(&outline) < 0.0 {
        outline.reverse();
    }
    let ring: Vec<DVec2> = outline.iter().map(|p| p.as_vec2()).collect();
    let count = ring.len();

    let mut front = Wavefront::new(&ring);
    let max_steps = 4 * count * count + 16;
    if !front.run(max_steps) {
        debug!(vertices = count, max_steps, "直骨架未在步数上限内收敛，跳过");
        return None;
    }

    let mut facets = Vec::with_capacity(count);
    for edge in 0..count {
        let (start, end) = (ring[edge], ring[(edge + 1) % count]);
        match trace_facet(edge, start, end, &front.arcs, eave, pitch) {
            Some(facet) => facets.push(facet),
            None => debug!(edge, "坡面边界不闭合，跳过该坡面"),
        }
    }
    if facets.is_empty() {
        return None;
    }
    Some(Roof {
        outline,
        eave,
        facets,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use homeplan_core::geometry::point_in_polygon;

    use super::*;
    use crate::extrude::projected_area;

    fn polygon(points: &[(f64, f64)]) -> Vec<Point2> {
        points.iter().map(|(x, y)| Point2::new(*x, *y)).collect()
    }

    fn facet_area(facet: &RoofFacet) -> f64 {
        let flat: Vec<Point2> = facet
            .points
            .iter()
            .map(|p| Point2::new(p.x, p.y))
            .collect();
        signed_area(&flat).abs()
    }

    /// 坡面投影面积之和等于轮廓面积；檐口点是轮廓顶点，其余点都在轮廓内部。
    fn assert_facets_cover(roof: &Roof, outline: &[Point2], area: f64) {
        let total: f64 = roof.facets.iter().map(facet_area).sum();
        assert_relative_eq!(total, area, epsilon = 1e-6);
        for facet in &roof.facets {
            for point in &facet.points {
                let flat = Point2::new(point.x, point.y);
                if (point.z - roof.eave).abs() < 1e-9 {
                    assert!(outline.iter().any(|vertex| vertex.distance(flat) < 1e-6));
                } else {
                    assert!(point_in_polygon(flat, outline), "{flat:?} outside outline");
                }
            }
        }
    }

    #[test]
    fn rectangle_yields_hip_roof() {
        let outline = polygon(&[(0.0, 0.0), (200.0, 0.0), (200.0, 100.0), (0.0, 100.0)]);
        let roof = synthesize_roof(&outline, 96.0, 0.5).expect("roof");

        assert_eq!(roof.facets.len(), 4);
        assert_relative_eq!(roof.peak(), 96.0 + 50.0 * 0.5, epsilon = 1e-6);
        let mut sizes: Vec<usize> = roof.facets.iter().map(|f| f.points.len()).collect();
        sizes.sort();
        assert_eq!(sizes, vec![3, 3, 4, 4]);
        let total: f64 = roof.facets.iter().map(facet_area).sum();
        assert_relative_eq!(total, 20000.0, epsilon = 1e-6);
    }

    #[test]
    fn square_meets_in_single_apex() {
        let outline = polygon(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        let roof = synthesize_roof(&outline, 0.0, 1.0).expect("roof");
        assert_eq!(roof.facets.len(), 4);
        for facet in &roof.facets {
            assert_eq!(facet.points.len(), 3);
            assert_relative_eq!(facet.points[2].z, 50.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn l_shape_facets_cover_footprint() {
        let outline = polygon(&[
            (0.0, 0.0),
            (200.0, 0.0),
            (200.0, 100.0),
            (100.0, 100.0),
            (100.0, 200.0),
            (0.0, 200.0),
        ]);
        let roof = synthesize_roof(&outline, 10.0, 0.5).expect("roof");
        assert_eq!(roof.facets.len(), 6);
        let total: f64 = roof.facets.iter().map(facet_area).sum();
        assert_relative_eq!(total, 30000.0, epsilon = 1e-6);
        assert_relative_eq!(roof.peak(), 10.0 + 25.0, epsilon = 1e-6);

        let mesh = roof.to_mesh().expect("mesh");
        assert_relative_eq!(projected_area(&mesh), 30000.0, epsilon = 1e-6);
    }

    #[test]
    fn u_shape_with_two_reflex_corners() {
        let outline = polygon(&[
            (0.0, 0.0),
            (300.0, 0.0),
            (300.0, 200.0),
            (200.0, 200.0),
            (200.0, 100.0),
            (100.0, 100.0),
            (100.0, 200.0),
            (0.0, 200.0),
        ]);
        let roof = synthesize_roof(&outline, 96.0, 0.5).expect("roof");
        assert_eq!(roof.facets.len(), 8);
        assert_facets_cover(&roof, &outline, 50000.0);
        assert_relative_eq!(roof.peak(), 96.0 + 50.0 * 0.5, epsilon = 1e-6);

        let mesh = roof.to_mesh().expect("mesh");
        assert_relative_eq!(projected_area(&mesh), 50000.0, epsilon = 1e-6);
    }

    #[test]
    fn plus_shape_arms_meet_at_centre() {
        let outline = polygon(&[
            (100.0, 0.0),
            (200.0, 0.0),
            (200.0, 100.0),
            (300.0, 100.0),
            (300.0, 200.0),
            (200.0, 200.0),
            (200.0, 300.0),
            (100.0, 300.0),
            (100.0, 200.0),
            (0.0, 200.0),
            (0.0, 100.0),
            (100.0, 100.0),
        ]);
        let roof = synthesize_roof(&outline, 0.0, 1.0).expect("roof");
        assert_eq!(roof.facets.len(), 12);
        assert_facets_cover(&roof, &outline, 50000.0);
        assert_relative_eq!(roof.peak(), 50.0, epsilon = 1e-6);

        // 四个凹角的骨架弧都汇于中心
        let centre = DVec3::new(150.0, 150.0, 50.0);
        let touching = roof
            .facets
            .iter()
            .filter(|facet| facet.points.iter().any(|p| p.distance(centre) < 1e-6))
            .count();
        assert_eq!(touching, 8);
    }

    #[test]
    fn clockwise_outline_is_normalised() {
        let outline = polygon(&[(0.0, 100.0), (200.0, 100.0), (200.0, 0.0), (0.0, 0.0)]);
        let roof = synthesize_roof(&outline, 0.0, 0.5).expect("roof");
        assert_eq!(roof.facets.len(), 4);
    }

    #[test]
    fn self_intersecting_outline_is_skipped() {
        let bow_tie = polygon(&[(0.0, 0.0), (100.0, 100.0), (100.0, 0.0), (0.0, 100.0)]);
        assert!(synthesize_roof(&bow_tie, 0.0, 0.5).is_none());
        assert!(synthesize_roof(&polygon(&[(0.0, 0.0), (1.0, 0.0)]), 0.0, 0.5).is_none());
    }
}
