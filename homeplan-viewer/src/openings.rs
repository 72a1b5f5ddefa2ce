use glam::DVec2;
use homeplan_core::document::{EntityId, Group, Opening, OpeningKind};
use homeplan_core::geometry::EPSILON;
use tracing::{debug, trace};

use crate::extrude::wall_block;
use crate::mesh::Mesh;
use crate::walls::WallSegment;

/// 窗台高度（相对楼层标高）。
pub const WINDOW_SILL: f64 = 30.0;

/// 墙体上被挖去的一段：沿墙长 `[from, to]`，竖向 `[bottom, top]`（世界高度）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cut {
    pub from: f64,
    pub to: f64,
    pub bottom: f64,
    pub top: f64,
}

/// 尚未网格化的墙体，挖洞在网格化时按列分段实现。
#[derive(Debug, Clone, PartialEq)]
pub struct WallSolid {
    pub segment: WallSegment,
    pub thickness: f64,
    pub bottom: f64,
    pub top: f64,
    pub cuts: Vec<Cut>,
}

/// 挖洞后留下的空隙，供门窗构件定位。
#[derive(Debug, Clone, PartialEq)]
pub struct Gap {
    pub opening_id: EntityId,
    pub kind: OpeningKind,
    pub start: DVec2,
    pub end: DVec2,
    pub bottom: f64,
    pub top: f64,
    pub thickness: f64,
}

impl WallSolid {
    pub fn new(segment: WallSegment, thickness: f64, bottom: f64, top: f64) -> Self {
        Self {
            segment,
            thickness,
            bottom,
            top,
            cuts: Vec::new(),
        }
    }

    /// 开口在本墙上的投影区间；方向不一致、不在墙线上或不相交时为 `None`。
    fn span_of(&self, opening: &Opening) -> Option<(f64, f64)> {
        let direction = self.segment.direction();
        let (a, b) = opening.endpoints();
        let opening_direction = (b.as_vec2() - a.as_vec2()).normalize_or_zero();
        if direction.perp_dot(opening_direction).abs() > EPSILON.sqrt() {
            return None;
        }
        let origin = self.segment.start.as_vec2();
        let center = (a.as_vec2() + b.as_vec2()) * 0.5;
        if direction.perp_dot(center - origin).abs() > self.thickness * 0.5 + EPSILON {
            return None;
        }
        let ta = (a.as_vec2() - origin).dot(direction);
        let tb = (b.as_vec2() - origin).dot(direction);
        let from = ta.min(tb).max(0.0);
        let to = ta.max(tb).min(self.segment.length());
        (to - from > EPSILON).then_some((from, to))
    }

    fn point_at(&self, t: f64) -> DVec2 {
        self.segment.start.as_vec2() + self.segment.direction() * t
    }

    /// 按挖洞边界把墙分列，每列只保留未被任何洞覆盖的竖向区段。
    pub fn to_mesh(&self) -> Mesh {
        let length = self.segment.length();
        let mut stops = vec![0.0, length];
        for cut in &self.cuts {
            stops.push(cut.from);
            stops.push(cut.to);
        }
        stops.sort_by(f64::total_cmp);
        stops.dedup_by(|a, b| (*a - *b).abs() <= EPSILON);

        let mut mesh = Mesh::new();
        for column in stops.windows(2) {
            let (from, to) = (column[0], column[1]);
            if to - from <= EPSILON {
                continue;
            }
            let middle = (from + to) * 0.5;
            let mut holes: Vec<(f64, f64)> = self
                .cuts
                .iter()
                .filter(|cut| cut.from <= middle && middle <= cut.to)
                .map(|cut| (cut.bottom.max(self.bottom), cut.top.min(self.top)))
                .filter(|(bottom, top)| top > bottom)
                .collect();
            holes.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut cursor = self.bottom;
            let (start, end) = (self.point_at(from), self.point_at(to));
            for (bottom, top) in holes {
                if bottom > cursor + EPSILON {
                    mesh.merge(&wall_block(start, end, self.thickness, cursor, bottom));
                }
                cursor = cursor.max(top);
            }
            if self.top > cursor + EPSILON {
                mesh.merge(&wall_block(start, end, self.thickness, cursor, self.top));
            }
        }
        mesh
    }
}

/// 开口的竖向范围：门从地面起，窗从窗台起，空洞贯通整层。
pub fn vertical_span(opening: &Opening, bottom: f64, top: f64) -> (f64, f64) {
    match opening.kind {
        OpeningKind::Empty => (bottom, top),
        OpeningKind::Door => (bottom, (bottom + opening.height).min(top)),
        OpeningKind::Window => {
            let sill = (bottom + WINDOW_SILL).min(top);
            (sill, (sill + opening.height).min(top))
        }
    }
}

/// 把楼层每个开口从与其相交的墙体中减去，返回产生的空隙。
pub fn cut_openings(walls: &mut [WallSolid], group: &Group) -> Vec<Gap> {
    let mut gaps = Vec::new();
    for opening in &group.openings {
        let mut hit = false;
        for wall in walls.iter_mut() {
            let Some((from, to)) = wall.span_of(opening) else {
                continue;
            };
            let (bottom, top) = vertical_span(opening, wall.bottom, wall.top);
            if top - bottom <= EPSILON {
                continue;
            }
            wall.cuts.push(Cut {
                from,
                to,
                bottom,
                top,
            });
            gaps.push(Gap {
                opening_id: opening.opening_id.clone(),
                kind: opening.kind,
                start: wall.point_at(from),
                end: wall.point_at(to),
                bottom,
                top,
                thickness: wall.thickness,
            });
            hit = true;
        }
        if !hit {
            trace!(opening = %opening.opening_id, "开口未落在任何墙上");
        }
    }
    debug!(openings = group.openings.len(), gaps = gaps.len(), "开口已挖切");
    gaps
}
