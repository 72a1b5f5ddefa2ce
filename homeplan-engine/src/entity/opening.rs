use homeplan_core::document::{
    EntityId, MIN_OPENING_WIDTH, Opening, OpeningKind, OpeningRotation,
};
use homeplan_core::geometry::{Point2, Vector2};

use super::{
    ACTIVE_STROKE, CanvasEntity, EntityBase, Workspace, clamp_range, missing,
};
use crate::canvas::{NodeId, Part, Shape};
use crate::errors::EngineError;
use crate::selection::EntityKind;
use crate::signal::EntitySignal;

/// 开口在平面上绘制的线宽。
const OPENING_STROKE_WIDTH: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningSnapshot {
    pub axis: f64,
    pub width: f64,
}

impl OpeningSnapshot {
    #[inline]
    fn low_edge(&self) -> f64 {
        self.axis - self.width * 0.5
    }

    #[inline]
    fn high_edge(&self) -> f64 {
        self.axis + self.width * 0.5
    }
}

/// 门、窗或空洞：主体沿墙轴拖动，两端手柄调整宽度。
#[derive(Debug)]
pub struct OpeningEntity {
    base: EntityBase<OpeningSnapshot>,
}

impl OpeningEntity {
    pub fn new(id: EntityId) -> Self {
        Self {
            base: EntityBase::new(EntityKind::Opening, id),
        }
    }

    fn opening<'a>(&self, ws: &'a Workspace) -> Result<&'a Opening, EngineError> {
        ws.group()?
            .opening(self.base.id())
            .ok_or_else(|| missing(EntityKind::Opening, self.base.id()))
    }

    fn opening_mut<'a>(&self, ws: &'a mut Workspace) -> Result<&'a mut Opening, EngineError> {
        ws.group_mut()?
            .opening_mut(self.base.id())
            .ok_or_else(|| missing(EntityKind::Opening, self.base.id()))
    }

    /// 直接设置宽度（保持中心），视为一次单步修改。
    pub fn set_width(&mut self, ws: &mut Workspace, width: f64) -> Result<(), EngineError> {
        self.base.ensure_alive()?;
        let half_grid = ws.half_grid();
        let opening = self.opening_mut(ws)?;
        opening.width = width;
        opening.clamp_to_grid(half_grid);
        self.rerender(ws)?;
        self.base.signals_mut().emit(EntitySignal::Update);
        Ok(())
    }
}

fn stroke_color(kind: OpeningKind) -> &'static str {
    match kind {
        OpeningKind::Empty => "#ffffff",
        OpeningKind::Door => "#8d6e63",
        OpeningKind::Window => "#4fc3f7",
    }
}

/// 沿开口轴向的分量。
fn along_axis(rotation: OpeningRotation, delta: Vector2) -> f64 {
    match rotation {
        OpeningRotation::Horizontal => delta.x(),
        OpeningRotation::Vertical => delta.y(),
    }
}

impl CanvasEntity for OpeningEntity {
    type Snapshot = OpeningSnapshot;

    fn base(&self) -> &EntityBase<OpeningSnapshot> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase<OpeningSnapshot> {
        &mut self.base
    }

    fn drag_parts(&self) -> &'static [Part] {
        &[Part::Body, Part::LeftHandle, Part::RightHandle]
    }

    fn draw(&self, ws: &mut Workspace, node: NodeId) -> Result<(), EngineError> {
        let opening = self.opening(ws)?.clone();
        let (low, high) = opening.endpoints();
        let color = if self.base.is_active() {
            ACTIVE_STROKE
        } else {
            stroke_color(opening.kind)
        };
        ws.canvas.add(
            node,
            Shape::Line {
                from: low,
                to: high,
                width: OPENING_STROKE_WIDTH,
                color: color.to_string(),
            },
            Some(self.base.owner(Part::Body)),
        )?;
        if self.base.is_active() {
            let size = ws.handle_size();
            for (center, part) in [(low, Part::LeftHandle), (high, Part::RightHandle)] {
                ws.canvas.add(
                    node,
                    Shape::Handle { center, size },
                    Some(self.base.owner(part)),
                )?;
            }
        }
        Ok(())
    }

    fn snapshot(&self, ws: &Workspace) -> Result<OpeningSnapshot, EngineError> {
        let opening = self.opening(ws)?;
        Ok(OpeningSnapshot {
            axis: opening.axis_coordinate(),
            width: opening.width,
        })
    }

    fn apply_drag(
        &mut self,
        ws: &mut Workspace,
        part: Part,
        snapshot: &OpeningSnapshot,
        delta: Vector2,
    ) -> Result<(), EngineError> {
        let half_grid = ws.half_grid();
        let opening = self.opening_mut(ws)?;
        let offset = along_axis(opening.rotation, delta);
        match part {
            Part::Body => {
                opening.set_axis_coordinate(snapshot.axis + offset);
            }
            Part::LeftHandle => {
                // 右端固定
                let fixed = snapshot.high_edge();
                let dragged = clamp_range(
                    snapshot.low_edge() + offset,
                    -half_grid,
                    fixed - MIN_OPENING_WIDTH,
                );
                opening.width = (fixed - dragged).max(MIN_OPENING_WIDTH);
                opening.set_axis_coordinate(fixed - opening.width * 0.5);
            }
            Part::RightHandle => {
                let fixed = snapshot.low_edge();
                let dragged = clamp_range(
                    snapshot.high_edge() + offset,
                    fixed + MIN_OPENING_WIDTH,
                    half_grid,
                );
                opening.width = (dragged - fixed).max(MIN_OPENING_WIDTH);
                opening.set_axis_coordinate(fixed + opening.width * 0.5);
            }
            Part::RadiusHandle => return Err(EngineError::UnsupportedPart(part)),
        }
        opening.clamp_to_grid(half_grid);
        Ok(())
    }

    fn move_to(&mut self, ws: &mut Workspace, x: f64, y: f64) -> Result<(), EngineError> {
        let half_grid = ws.half_grid();
        let opening = self.opening_mut(ws)?;
        opening.x = x;
        opening.y = y;
        opening.clamp_to_grid(half_grid);
        Ok(())
    }
}

/// 开口两端在平面上的位置，供吸附缓存使用。
pub(crate) fn opening_vertices(opening: &Opening) -> [Point2; 2] {
    let (low, high) = opening.endpoints();
    [low, high]
}
