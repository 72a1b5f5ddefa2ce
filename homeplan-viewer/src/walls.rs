use std::collections::HashSet;

use glam::DVec2;
use homeplan_core::document::{EntityId, Group};
use homeplan_core::geometry::{EPSILON, Point2};

/// 墙段来源：房间边或显式墙。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WallSource {
    Room(EntityId),
    Explicit(EntityId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WallSegment {
    pub start: Point2,
    pub end: Point2,
    pub source: WallSource,
}

impl WallSegment {
    #[inline]
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    #[inline]
    pub fn direction(&self) -> DVec2 {
        (self.end.as_vec2() - self.start.as_vec2()).normalize_or_zero()
    }
}

type SegmentKey = ((i64, i64), (i64, i64));

fn quantize(point: Point2) -> (i64, i64) {
    let scale = 1.0 / EPSILON.sqrt();
    (
        (point.x() * scale).round() as i64,
        (point.y() * scale).round() as i64,
    )
}

fn undirected_key(a: Point2, b: Point2) -> SegmentKey {
    let (ka, kb) = (quantize(a), quantize(b));
    if ka <= kb { (ka, kb) } else { (kb, ka) }
}

/// 由房间相邻关系推导墙段：房间边在其他房间顶点处拆分，相邻房间共享的边只保留一段；
/// 随后追加楼层的显式墙。
pub fn derive_walls(group: &Group) -> Vec<WallSegment> {
    let polygons: Vec<(EntityId, Vec<Point2>)> = group
        .rooms
        .iter()
        .map(|room| (room.room_id.clone(), room.world_points()))
        .filter(|(_, points)| points.len() >= 2)
        .collect();
    let vertices: Vec<Point2> = polygons
        .iter()
        .flat_map(|(_, points)| points.iter().copied())
        .collect();

    let mut seen: HashSet<SegmentKey> = HashSet::new();
    let mut walls = Vec::new();
    for (room_id, points) in &polygons {
        for (index, start) in points.iter().enumerate() {
            let end = points[(index + 1) % points.len()];
            let mut stops = split_points(*start, end, &vertices);
            stops.insert(0, *start);
            stops.push(end);
            for pair in stops.windows(2) {
                if pair[0].distance(pair[1]) <= EPSILON {
                    continue;
                }
                if seen.insert(undirected_key(pair[0], pair[1])) {
                    walls.push(WallSegment {
                        start: pair[0],
                        end: pair[1],
                        source: WallSource::Room(room_id.clone()),
                    });
                }
            }
        }
    }

    for wall in group.walls.iter().flatten() {
        let start = Point2::new(wall.x1, wall.y1);
        let end = Point2::new(wall.x2, wall.y2);
        if start.distance(end) <= EPSILON || !seen.insert(undirected_key(start, end)) {
            continue;
        }
        walls.push(WallSegment {
            start,
            end,
            source: WallSource::Explicit(wall.wall_id.clone()),
        });
    }
    walls
}

fn split_points(start: Point2, end: Point2, vertices: &[Point2]) -> Vec<Point2> {
    let direction = end.as_vec2() - start.as_vec2();
    let length_squared = direction.length_squared();
    if length_squared <= EPSILON {
        return Vec::new();
    }
    let mut hits: Vec<(f64, Point2)> = vertices
        .iter()
        .filter_map(|vertex| {
            let offset = vertex.as_vec2() - start.as_vec2();
            let t = offset.dot(direction) / length_squared;
            if t <= EPSILON || t >= 1.0 - EPSILON {
                return None;
            }
            let distance = direction.perp_dot(offset).abs() / length_squared.sqrt();
            (distance <= EPSILON.sqrt()).then_some((t, *vertex))
        })
        .collect();
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    hits.dedup_by(|a, b| (a.0 - b.0).abs() <= EPSILON);
    hits.into_iter().map(|(_, point)| point).collect()
}

#[cfg(test)]
mod tests {
    use homeplan_core::document::{Room, Wall};

    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Room {
        Room::new(
            x,
            y,
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(w, 0.0),
                Point2::new(w, h),
                Point2::new(0.0, h),
            ],
        )
    }

    #[test]
    fn shared_edge_is_emitted_once() {
        let mut group = Group::new(0.0, 96.0);
        group.rooms.push(rect(0.0, 0.0, 100.0, 100.0));
        group.rooms.push(rect(100.0, 0.0, 100.0, 100.0));
        let walls = derive_walls(&group);
        assert_eq!(walls.len(), 7);
        let total: f64 = walls.iter().map(WallSegment::length).sum();
        assert_eq!(total, 700.0);
    }

    #[test]
    fn t_junction_splits_long_edge() {
        let mut group = Group::new(0.0, 96.0);
        group.rooms.push(rect(0.0, 0.0, 200.0, 100.0));
        group.rooms.push(rect(0.0, 100.0, 100.0, 100.0));
        group.rooms.push(rect(100.0, 100.0, 100.0, 100.0));
        let walls = derive_walls(&group);
        // 外框 800，内墙 300
        let total: f64 = walls.iter().map(WallSegment::length).sum();
        assert_eq!(total, 1100.0);
        assert_eq!(walls.len(), 10);
    }

    #[test]
    fn explicit_walls_are_appended() {
        let mut group = Group::new(0.0, 96.0);
        group.rooms.push(rect(0.0, 0.0, 100.0, 100.0));
        group.walls = Some(vec![
            Wall {
                wall_id: EntityId::new("garden"),
                x1: 100.0,
                y1: 0.0,
                x2: 300.0,
                y2: 0.0,
            },
            Wall {
                wall_id: EntityId::new("duplicate"),
                x1: 100.0,
                y1: 100.0,
                x2: 100.0,
                y2: 0.0,
            },
        ]);
        let walls = derive_walls(&group);
        assert_eq!(walls.len(), 5);
        assert_eq!(
            walls[4].source,
            WallSource::Explicit(EntityId::new("garden"))
        );
    }
}
