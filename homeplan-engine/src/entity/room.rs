use glam::DVec2;
use homeplan_core::document::{EntityId, Room};
use homeplan_core::geometry::{EPSILON, Point2, Vector2, is_simple_polygon, polygon_bounds};
use tracing::debug;

use super::{
    ACTIVE_STROKE, CanvasEntity, EntityBase, IDLE_STROKE, Workspace, clamp_range, missing, snap,
};
use crate::canvas::{NodeId, Part, Shape};
use crate::errors::EngineError;
use crate::selection::EntityKind;

const ROOM_FILL: &str = "#f5f0e6";
const WALL_STROKE_WIDTH: f64 = 8.0;

fn room<'a>(ws: &'a Workspace, id: &EntityId) -> Result<&'a Room, EngineError> {
    ws.group()?
        .room(id)
        .ok_or_else(|| missing(EntityKind::Room, id))
}

fn room_mut<'a>(ws: &'a mut Workspace, id: &EntityId) -> Result<&'a mut Room, EngineError> {
    ws.group_mut()?
        .room_mut(id)
        .ok_or_else(|| missing(EntityKind::Room, id))
}

fn vertex_out_of_range(room: &EntityId, index: usize) -> EngineError {
    EngineError::VertexOutOfRange {
        room: room.to_string(),
        index,
    }
}

/// 以 `edits` 覆盖房间顶点（局部坐标）。结果自交时保持原样并返回 `false`；
/// 原本就不是简单多边形的房间不受此限制，以便把它编辑回正常形状。
fn commit_points(
    ws: &mut Workspace,
    room_id: &EntityId,
    edits: &[(usize, Point2)],
) -> Result<bool, EngineError> {
    let room = room_mut(ws, room_id)?;
    let mut candidate = room.points.clone();
    for (index, point) in edits {
        let slot = candidate
            .get_mut(*index)
            .ok_or_else(|| vertex_out_of_range(room_id, *index))?;
        *slot = *point;
    }
    if !is_simple_polygon(&candidate) && is_simple_polygon(&room.points) {
        debug!(room = %room_id, "顶点移动会使房间自交，已忽略");
        return Ok(false);
    }
    room.points = candidate;
    Ok(true)
}

fn edge_normal(a: Point2, b: Point2) -> DVec2 {
    (b.as_vec2() - a.as_vec2()).perp().normalize_or_zero()
}

/// 把沿 `direction` 的偏移区间收窄到使 `coord` 留在 `[-half_grid, half_grid]` 内。
fn narrow_offset(coord: f64, direction: f64, half_grid: f64, range: (f64, f64)) -> (f64, f64) {
    if direction.abs() <= EPSILON {
        return range;
    }
    let t1 = (-half_grid - coord) / direction;
    let t2 = (half_grid - coord) / direction;
    (range.0.max(t1.min(t2)), range.1.min(t1.max(t2)))
}

fn stroke(active: bool) -> String {
    let color = if active { ACTIVE_STROKE } else { IDLE_STROKE };
    color.to_string()
}

/// 房间整体拖动。位置按吸附步长取整，并保证包围盒不越出网格。
#[derive(Debug)]
pub struct RoomEntity {
    base: EntityBase<Point2>,
}

impl RoomEntity {
    pub fn new(id: EntityId) -> Self {
        Self {
            base: EntityBase::new(EntityKind::Room, id),
        }
    }
}

impl CanvasEntity for RoomEntity {
    type Snapshot = Point2;

    fn base(&self) -> &EntityBase<Point2> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase<Point2> {
        &mut self.base
    }

    fn draw(&self, ws: &mut Workspace, node: NodeId) -> Result<(), EngineError> {
        let points = room(ws, self.base.id())?.world_points();
        ws.canvas.add(
            node,
            Shape::Polygon {
                points,
                fill: ROOM_FILL.to_string(),
                stroke: Some(stroke(self.base.is_active())),
            },
            Some(self.base.owner(Part::Body)),
        )?;
        Ok(())
    }

    fn snapshot(&self, ws: &Workspace) -> Result<Point2, EngineError> {
        Ok(room(ws, self.base.id())?.origin())
    }

    fn apply_drag(
        &mut self,
        ws: &mut Workspace,
        _part: Part,
        snapshot: &Point2,
        delta: Vector2,
    ) -> Result<(), EngineError> {
        let target = snapshot.translate(delta);
        let step = ws.settings.snap;
        self.move_to(ws, snap(target.x(), step), snap(target.y(), step))
    }

    fn move_to(&mut self, ws: &mut Workspace, x: f64, y: f64) -> Result<(), EngineError> {
        let half_grid = ws.half_grid();
        let room = room_mut(ws, self.base.id())?;
        let local = polygon_bounds(&room.points);
        if local.is_finite() {
            room.x = clamp_range(x, -half_grid - local.left(), half_grid - local.right());
            room.y = clamp_range(y, -half_grid - local.top(), half_grid - local.bottom());
        } else {
            room.x = x;
            room.y = y;
        }
        Ok(())
    }
}

/// 房间的一个顶点。仅在房间处于编辑状态时存在。
#[derive(Debug)]
pub struct PointEntity {
    base: EntityBase<Point2>,
    room_id: EntityId,
    index: usize,
}

impl PointEntity {
    pub fn new(room_id: EntityId, index: usize) -> Self {
        let id = EntityId::new(format!("{room_id}#p{index}"));
        Self {
            base: EntityBase::new(EntityKind::Point, id),
            room_id,
            index,
        }
    }

    #[inline]
    pub fn room_id(&self) -> &EntityId {
        &self.room_id
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    fn local<'a>(&self, ws: &'a Workspace) -> Result<(&'a Room, Point2), EngineError> {
        let room = room(ws, &self.room_id)?;
        let point = room
            .points
            .get(self.index)
            .copied()
            .ok_or_else(|| vertex_out_of_range(&self.room_id, self.index))?;
        Ok((room, point))
    }

    /// 返回是否写入；会使房间自交的位置被拒绝。
    fn place(&self, ws: &mut Workspace, world: Point2) -> Result<bool, EngineError> {
        let half_grid = ws.half_grid();
        let origin = room(ws, &self.room_id)?.origin();
        let local = Point2::new(
            world.x().clamp(-half_grid, half_grid) - origin.x(),
            world.y().clamp(-half_grid, half_grid) - origin.y(),
        );
        commit_points(ws, &self.room_id, &[(self.index, local)])
    }
}

impl CanvasEntity for PointEntity {
    type Snapshot = Point2;

    fn base(&self) -> &EntityBase<Point2> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase<Point2> {
        &mut self.base
    }

    fn draw(&self, ws: &mut Workspace, node: NodeId) -> Result<(), EngineError> {
        let (room, local) = self.local(ws)?;
        let center = Point2::new(local.x() + room.x, local.y() + room.y);
        let size = ws.handle_size();
        ws.canvas.add(
            node,
            Shape::Handle { center, size },
            Some(self.base.owner(Part::Body)),
        )?;
        Ok(())
    }

    /// 快照为顶点的世界坐标。
    fn snapshot(&self, ws: &Workspace) -> Result<Point2, EngineError> {
        let (room, local) = self.local(ws)?;
        Ok(Point2::new(local.x() + room.x, local.y() + room.y))
    }

    fn apply_drag(
        &mut self,
        ws: &mut Workspace,
        _part: Part,
        snapshot: &Point2,
        delta: Vector2,
    ) -> Result<(), EngineError> {
        let step = ws.settings.snap;
        let target = snapshot.translate(delta);
        // 被拒绝的帧保留上一帧的几何
        self.place(ws, Point2::new(snap(target.x(), step), snap(target.y(), step)))?;
        Ok(())
    }

    fn move_to(&mut self, ws: &mut Workspace, x: f64, y: f64) -> Result<(), EngineError> {
        if self.place(ws, Point2::new(x, y))? {
            Ok(())
        } else {
            Err(EngineError::InvalidPolygon)
        }
    }
}

/// 房间的一条边，`index` 为起点顶点下标。拖动时沿边的法向平移两端点。
#[derive(Debug)]
pub struct WallEntity {
    base: EntityBase<(Point2, Point2)>,
    room_id: EntityId,
    index: usize,
}

impl WallEntity {
    pub fn new(room_id: EntityId, index: usize) -> Self {
        let id = EntityId::new(format!("{room_id}#w{index}"));
        Self {
            base: EntityBase::new(EntityKind::Wall, id),
            room_id,
            index,
        }
    }

    #[inline]
    pub fn room_id(&self) -> &EntityId {
        &self.room_id
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    fn endpoints(&self, room: &Room) -> Result<(usize, usize), EngineError> {
        let count = room.points.len();
        if self.index >= count || count < 2 {
            return Err(vertex_out_of_range(&self.room_id, self.index));
        }
        Ok((self.index, (self.index + 1) % count))
    }

    /// 沿法向平移两端点 `offset`。偏移量先收窄到两端点都留在网格内；返回是否写入。
    fn shift(
        &self,
        ws: &mut Workspace,
        (a, b): (Point2, Point2),
        normal: DVec2,
        offset: f64,
    ) -> Result<bool, EngineError> {
        let half_grid = ws.half_grid();
        let room = room(ws, &self.room_id)?;
        let (start, end) = self.endpoints(room)?;
        let origin = room.origin().as_vec2();
        let (lo, hi) = [a, b]
            .iter()
            .fold((f64::NEG_INFINITY, f64::INFINITY), |range, point| {
                let world = point.as_vec2() + origin;
                let range = narrow_offset(world.x, normal.x, half_grid, range);
                narrow_offset(world.y, normal.y, half_grid, range)
            });
        let shift = Vector2::from(normal * clamp_range(offset, lo, hi));
        commit_points(
            ws,
            &self.room_id,
            &[(start, a.translate(shift)), (end, b.translate(shift))],
        )
    }
}

impl CanvasEntity for WallEntity {
    type Snapshot = (Point2, Point2);

    fn base(&self) -> &EntityBase<(Point2, Point2)> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase<(Point2, Point2)> {
        &mut self.base
    }

    fn draw(&self, ws: &mut Workspace, node: NodeId) -> Result<(), EngineError> {
        let room = room(ws, &self.room_id)?;
        let (start, end) = self.endpoints(room)?;
        let world = room.world_points();
        let (from, to) = (world[start], world[end]);
        ws.canvas.add(
            node,
            Shape::Line {
                from,
                to,
                width: WALL_STROKE_WIDTH,
                color: stroke(self.base.is_active()),
            },
            Some(self.base.owner(Part::Body)),
        )?;
        Ok(())
    }

    fn snapshot(&self, ws: &Workspace) -> Result<(Point2, Point2), EngineError> {
        let room = room(ws, &self.room_id)?;
        let (start, end) = self.endpoints(room)?;
        Ok((room.points[start], room.points[end]))
    }

    fn apply_drag(
        &mut self,
        ws: &mut Workspace,
        _part: Part,
        snapshot: &(Point2, Point2),
        delta: Vector2,
    ) -> Result<(), EngineError> {
        let (a, b) = *snapshot;
        let normal = edge_normal(a, b);
        if normal.length_squared() == 0.0 {
            return Ok(());
        }
        let offset = snap(delta.as_vec2().dot(normal), ws.settings.snap);
        self.shift(ws, (a, b), normal, offset)?;
        Ok(())
    }

    /// 把墙段中点移到 `(x, y)`（世界坐标），只保留法向分量。
    fn move_to(&mut self, ws: &mut Workspace, x: f64, y: f64) -> Result<(), EngineError> {
        let (a, b) = self.snapshot(ws)?;
        let origin = room(ws, &self.room_id)?.origin();
        let midpoint = Point2::from_vec((a.as_vec2() + b.as_vec2()) * 0.5 + origin.as_vec2());
        let delta = midpoint.vector_to(Point2::new(x, y));
        let normal = edge_normal(a, b);
        if normal.length_squared() == 0.0 {
            return Ok(());
        }
        if self.shift(ws, (a, b), normal, delta.as_vec2().dot(normal))? {
            Ok(())
        } else {
            Err(EngineError::InvalidPolygon)
        }
    }
}

#[cfg(test)]
mod tests {
    use homeplan_core::document::Group;

    use super::*;
    use crate::entity::test_support::workspace;

    fn setup() -> (Workspace, EntityId) {
        let mut group = Group::new(0.0, 96.0);
        let room = Room::new(
            0.0,
            0.0,
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(120.0, 0.0),
                Point2::new(120.0, 96.0),
                Point2::new(0.0, 96.0),
            ],
        );
        let id = room.room_id.clone();
        group.rooms.push(room);
        (workspace(group), id)
    }

    fn drag<E: CanvasEntity>(ws: &mut Workspace, entity: &mut E, to: Point2) {
        entity
            .pointer_down(ws, Part::Body, Point2::new(0.0, 0.0))
            .expect("press");
        entity.pointer_move(ws, to).expect("move");
        entity.pointer_up(ws).expect("release");
    }

    #[test]
    fn room_drag_snaps_and_stays_inside_grid() {
        let (mut ws, id) = setup();
        let mut entity = RoomEntity::new(id.clone());
        let layer = ws.layer;
        entity.render(&mut ws, layer).expect("render");

        drag(&mut ws, &mut entity, Point2::new(25.0, -7.0));
        let room = ws.group().expect("group").room(&id).expect("room").clone();
        assert_eq!((room.x, room.y), (24.0, -12.0));

        drag(&mut ws, &mut entity, Point2::new(5_000.0, 0.0));
        let room = ws.group().expect("group").room(&id).expect("room").clone();
        assert_eq!(room.x, 480.0);
        assert!(room.bounding_box().right() <= ws.half_grid());
    }

    #[test]
    fn point_drag_moves_single_vertex() {
        let (mut ws, id) = setup();
        let mut point = PointEntity::new(id.clone(), 2);
        let layer = ws.layer;
        point.render(&mut ws, layer).expect("render");
        drag(&mut ws, &mut point, Point2::new(27.0, 11.0));
        let room = ws.group().expect("group").room(&id).expect("room").clone();
        assert_eq!(room.points[2], Point2::new(144.0, 108.0));
        assert_eq!(room.points[1], Point2::new(120.0, 0.0));
    }

    #[test]
    fn wall_drag_moves_along_normal_only() {
        let (mut ws, id) = setup();
        // 右侧墙：顶点 1 -> 2
        let mut wall = WallEntity::new(id.clone(), 1);
        let layer = ws.layer;
        wall.render(&mut ws, layer).expect("render");
        drag(&mut ws, &mut wall, Point2::new(-25.0, 40.0));
        let room = ws.group().expect("group").room(&id).expect("room").clone();
        assert_eq!(room.points[1], Point2::new(96.0, 0.0));
        assert_eq!(room.points[2], Point2::new(96.0, 96.0));
    }

    fn room_points(ws: &Workspace, id: &EntityId) -> Vec<Point2> {
        ws.group().expect("group").room(id).expect("room").points.clone()
    }

    fn setup_with(points: Vec<Point2>) -> (Workspace, EntityId) {
        let mut group = Group::new(0.0, 96.0);
        let room = Room::new(0.0, 0.0, points);
        let id = room.room_id.clone();
        group.rooms.push(room);
        (workspace(group), id)
    }

    #[test]
    fn point_drag_that_would_cross_an_edge_is_ignored() {
        let (mut ws, id) = setup();
        let mut point = PointEntity::new(id.clone(), 2);
        let layer = ws.layer;
        point.render(&mut ws, layer).expect("render");

        // (120,96) -> (60,-48)：新边穿过底边
        drag(&mut ws, &mut point, Point2::new(-60.0, -144.0));
        let points = room_points(&ws, &id);
        assert_eq!(points[2], Point2::new(120.0, 96.0));
        assert!(is_simple_polygon(&points));
        assert_eq!(
            ws.group().expect("group").room(&id).expect("room").area(),
            120.0 * 96.0
        );

        assert!(matches!(
            point.set_xy(&mut ws, 60.0, -48.0),
            Err(EngineError::InvalidPolygon)
        ));
        assert_eq!(room_points(&ws, &id)[2], Point2::new(120.0, 96.0));
    }

    #[test]
    fn wall_drag_that_would_cross_an_edge_is_ignored() {
        // 右墙 1 -> 2 向左推过凹口顶点 (60,40) 时与边 3 -> 4 相交
        let (mut ws, id) = setup_with(vec![
            Point2::new(0.0, 0.0),
            Point2::new(120.0, 0.0),
            Point2::new(120.0, 96.0),
            Point2::new(60.0, 40.0),
            Point2::new(0.0, 96.0),
        ]);
        let mut wall = WallEntity::new(id.clone(), 1);
        let layer = ws.layer;
        wall.render(&mut ws, layer).expect("render");

        drag(&mut ws, &mut wall, Point2::new(-20.0, 0.0));
        let points = room_points(&ws, &id);
        assert_eq!(points[1], Point2::new(96.0, 0.0));
        assert_eq!(points[2], Point2::new(96.0, 96.0));

        drag(&mut ws, &mut wall, Point2::new(-80.0, 0.0));
        let points = room_points(&ws, &id);
        assert_eq!(points[1], Point2::new(96.0, 0.0));
        assert_eq!(points[2], Point2::new(96.0, 96.0));
        assert!(is_simple_polygon(&points));

        assert!(matches!(
            wall.set_xy(&mut ws, 12.0, 48.0),
            Err(EngineError::InvalidPolygon)
        ));
        assert_eq!(room_points(&ws, &id)[1], Point2::new(96.0, 0.0));
    }

    #[test]
    fn wall_drag_stops_at_grid_edge() {
        let (mut ws, id) = setup();
        let mut wall = WallEntity::new(id.clone(), 1);
        let layer = ws.layer;
        wall.render(&mut ws, layer).expect("render");

        drag(&mut ws, &mut wall, Point2::new(5_000.0, 0.0));
        let half_grid = ws.half_grid();
        let points = room_points(&ws, &id);
        assert_eq!(points[1], Point2::new(half_grid, 0.0));
        assert_eq!(points[2], Point2::new(half_grid, 96.0));
        let room = ws.group().expect("group").room(&id).expect("room").clone();
        assert!(room.bounding_box().right() <= half_grid);

        wall.set_xy(&mut ws, 9_000.0, 48.0).expect("set_xy");
        assert_eq!(room_points(&ws, &id)[1], Point2::new(half_grid, 0.0));
    }

    #[test]
    fn zero_length_wall_does_not_move() {
        let (mut ws, id) = setup_with(vec![
            Point2::new(0.0, 0.0),
            Point2::new(120.0, 0.0),
            Point2::new(120.0, 0.0),
            Point2::new(120.0, 96.0),
            Point2::new(0.0, 96.0),
        ]);
        let before = room_points(&ws, &id);
        let mut wall = WallEntity::new(id.clone(), 1);
        let layer = ws.layer;
        wall.render(&mut ws, layer).expect("render");

        drag(&mut ws, &mut wall, Point2::new(30.0, 30.0));
        assert_eq!(room_points(&ws, &id), before);
        wall.set_xy(&mut ws, 200.0, 200.0).expect("set_xy");
        assert_eq!(room_points(&ws, &id), before);
    }

    #[test]
    fn out_of_range_vertex_is_reported() {
        let (mut ws, id) = setup();
        let mut point = PointEntity::new(id, 9);
        let layer = ws.layer;
        assert!(matches!(
            point.render(&mut ws, layer),
            Err(EngineError::VertexOutOfRange { index: 9, .. })
        ));
    }
}
