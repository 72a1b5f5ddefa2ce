use homeplan_core::document::{EntityId, Group, Surface};
use homeplan_core::geometry::{Point2, Vector2};
use tracing::debug;

use super::opening::opening_vertices;
use super::{ACTIVE_STROKE, CanvasEntity, EntityBase, Workspace, missing, snap};
use crate::canvas::{NodeId, Part, Shape};
use crate::errors::EngineError;
use crate::selection::EntityKind;

/// 顶点与吸附点在 x 或 y 上相差不超过该值即视为对齐。
pub const ALIGNMENT_TOLERANCE: f64 = 1.0;

/// 非房间区域。激活时重建吸附点缓存，拖拽时据此给出对齐提示。
#[derive(Debug)]
pub struct SurfaceEntity {
    base: EntityBase<Point2>,
    snap_points: Vec<Point2>,
}

impl SurfaceEntity {
    pub fn new(id: EntityId) -> Self {
        Self {
            base: EntityBase::new(EntityKind::Surface, id),
            snap_points: Vec::new(),
        }
    }

    fn surface<'a>(&self, ws: &'a Workspace) -> Result<&'a Surface, EngineError> {
        ws.group()?
            .surface(self.base.id())
            .ok_or_else(|| missing(EntityKind::Surface, self.base.id()))
    }

    fn surface_mut<'a>(&self, ws: &'a mut Workspace) -> Result<&'a mut Surface, EngineError> {
        ws.group_mut()?
            .surface_mut(self.base.id())
            .ok_or_else(|| missing(EntityKind::Surface, self.base.id()))
    }

    #[inline]
    pub fn snap_points(&self) -> &[Point2] {
        &self.snap_points
    }

    /// 收集本层与紧邻下层中房间、其它区域和开口的全部顶点（世界坐标）。
    pub fn rebuild_snap_cache(&mut self, ws: &Workspace) -> Result<(), EngineError> {
        let mut points = Vec::new();
        collect_vertices(ws.group()?, self.base.id(), &mut points);
        if let Some(below) = ws.plan.group_below(ws.group).and_then(|index| ws.plan.group(index)) {
            collect_vertices(below, self.base.id(), &mut points);
        }
        debug!(surface = %self.base.id(), points = points.len(), "已重建吸附点缓存");
        self.snap_points = points;
        Ok(())
    }

    /// 与当前任一顶点在 x 或 y 上对齐的缓存点。
    pub fn alignment_candidates(&self, ws: &Workspace) -> Result<Vec<Point2>, EngineError> {
        let vertices = self.surface(ws)?.world_points();
        Ok(self
            .snap_points
            .iter()
            .filter(|candidate| {
                vertices.iter().any(|vertex| {
                    (candidate.x() - vertex.x()).abs() <= ALIGNMENT_TOLERANCE
                        || (candidate.y() - vertex.y()).abs() <= ALIGNMENT_TOLERANCE
                })
            })
            .copied()
            .collect())
    }
}

fn collect_vertices(group: &Group, exclude: &EntityId, points: &mut Vec<Point2>) {
    for room in &group.rooms {
        points.extend(room.world_points());
    }
    for surface in group.surfaces.iter().filter(|surface| &surface.surface_id != exclude) {
        points.extend(surface.world_points());
    }
    for opening in &group.openings {
        points.extend(opening_vertices(opening));
    }
}

impl CanvasEntity for SurfaceEntity {
    type Snapshot = Point2;

    fn base(&self) -> &EntityBase<Point2> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase<Point2> {
        &mut self.base
    }

    fn draw(&self, ws: &mut Workspace, node: NodeId) -> Result<(), EngineError> {
        let surface = self.surface(ws)?;
        let points = surface.world_points();
        let fill = surface.color.clone();
        let stroke = self.base.is_active().then(|| ACTIVE_STROKE.to_string());
        ws.canvas.add(
            node,
            Shape::Polygon {
                points,
                fill,
                stroke,
            },
            Some(self.base.owner(Part::Body)),
        )?;
        Ok(())
    }

    fn snapshot(&self, ws: &Workspace) -> Result<Point2, EngineError> {
        let surface = self.surface(ws)?;
        Ok(Point2::new(surface.x, surface.y))
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
        let surface = self.surface_mut(ws)?;
        surface.x = snap(target.x(), step);
        surface.y = snap(target.y(), step);
        Ok(())
    }

    fn move_to(&mut self, ws: &mut Workspace, x: f64, y: f64) -> Result<(), EngineError> {
        let surface = self.surface_mut(ws)?;
        surface.x = x;
        surface.y = y;
        Ok(())
    }

    fn on_activate(&mut self, ws: &mut Workspace) -> Result<(), EngineError> {
        self.rebuild_snap_cache(ws)
    }
}
