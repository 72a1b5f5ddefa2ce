use homeplan_core::document::{EntityId, Tree, TreeKind};
use homeplan_core::geometry::{Point2, Vector2};

use super::{ACTIVE_STROKE, CanvasEntity, EntityBase, Workspace, missing};
use crate::canvas::{NodeId, Part, Shape};
use crate::errors::EngineError;
use crate::selection::EntityKind;
use crate::signal::EntitySignal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeSnapshot {
    pub center: Point2,
    pub diameter: f64,
}

impl TreeSnapshot {
    /// 半径手柄位于树冠圆的最右侧。
    #[inline]
    fn handle(&self) -> Point2 {
        Point2::new(self.center.x() + self.diameter * 0.5, self.center.y())
    }
}

/// 树：主体拖动移动中心，半径手柄调整树冠直径。
#[derive(Debug)]
pub struct TreeEntity {
    base: EntityBase<TreeSnapshot>,
}

impl TreeEntity {
    pub fn new(id: EntityId) -> Self {
        Self {
            base: EntityBase::new(EntityKind::Tree, id),
        }
    }

    fn tree<'a>(&self, ws: &'a Workspace) -> Result<&'a Tree, EngineError> {
        ws.group()?
            .tree(self.base.id())
            .ok_or_else(|| missing(EntityKind::Tree, self.base.id()))
    }

    fn tree_mut<'a>(&self, ws: &'a mut Workspace) -> Result<&'a mut Tree, EngineError> {
        ws.group_mut()?
            .tree_mut(self.base.id())
            .ok_or_else(|| missing(EntityKind::Tree, self.base.id()))
    }

    /// 单步设置直径。结果不小于 1，也不超过当前中心允许的上限。
    pub fn set_diameter(&mut self, ws: &mut Workspace, diameter: f64) -> Result<(), EngineError> {
        self.base.ensure_alive()?;
        let half_grid = ws.half_grid();
        self.tree_mut(ws)?.set_diameter_clamped(diameter, half_grid);
        self.rerender(ws)?;
        self.base.signals_mut().emit(EntitySignal::Update);
        Ok(())
    }
}

fn canopy_fill(kind: TreeKind) -> &'static str {
    match kind {
        TreeKind::Conical => "#2e7d32",
        TreeKind::Round => "#43a047",
        TreeKind::Oval => "#66bb6a",
    }
}

impl CanvasEntity for TreeEntity {
    type Snapshot = TreeSnapshot;

    fn base(&self) -> &EntityBase<TreeSnapshot> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase<TreeSnapshot> {
        &mut self.base
    }

    fn drag_parts(&self) -> &'static [Part] {
        &[Part::Body, Part::RadiusHandle]
    }

    fn draw(&self, ws: &mut Workspace, node: NodeId) -> Result<(), EngineError> {
        let tree = self.tree(ws)?.clone();
        let fill = if self.base.is_active() {
            ACTIVE_STROKE
        } else {
            canopy_fill(tree.kind)
        };
        ws.canvas.add(
            node,
            Shape::Circle {
                center: tree.center(),
                radius: tree.radius(),
                fill: fill.to_string(),
            },
            Some(self.base.owner(Part::Body)),
        )?;
        if self.base.is_active() {
            let size = ws.handle_size();
            ws.canvas.add(
                node,
                Shape::Handle {
                    center: Point2::new(tree.x + tree.radius(), tree.y),
                    size,
                },
                Some(self.base.owner(Part::RadiusHandle)),
            )?;
        }
        Ok(())
    }

    fn snapshot(&self, ws: &Workspace) -> Result<TreeSnapshot, EngineError> {
        let tree = self.tree(ws)?;
        Ok(TreeSnapshot {
            center: tree.center(),
            diameter: tree.diameter,
        })
    }

    fn apply_drag(
        &mut self,
        ws: &mut Workspace,
        part: Part,
        snapshot: &TreeSnapshot,
        delta: Vector2,
    ) -> Result<(), EngineError> {
        let half_grid = ws.half_grid();
        let tree = self.tree_mut(ws)?;
        match part {
            Part::Body => {
                let target = snapshot.center.translate(delta);
                tree.set_center_clamped(target.x(), target.y(), half_grid);
            }
            Part::RadiusHandle => {
                let pointer = snapshot.handle().translate(delta);
                let diameter = 2.0 * tree.center().distance(pointer);
                tree.set_diameter_clamped(diameter, half_grid);
            }
            Part::LeftHandle | Part::RightHandle => {
                return Err(EngineError::UnsupportedPart(part));
            }
        }
        Ok(())
    }

    fn move_to(&mut self, ws: &mut Workspace, x: f64, y: f64) -> Result<(), EngineError> {
        let half_grid = ws.half_grid();
        self.tree_mut(ws)?.set_center_clamped(x, y, half_grid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use homeplan_core::document::{Group, MIN_TREE_DIAMETER};

    use super::*;
    use crate::entity::test_support::{record, workspace};

    fn setup(tree: Tree) -> (Workspace, TreeEntity) {
        let mut group = Group::new(0.0, 96.0);
        let id = tree.tree_id.clone();
        group.trees.push(tree);
        let mut ws = workspace(group);
        let mut entity = TreeEntity::new(id);
        let layer = ws.layer;
        entity.render(&mut ws, layer).expect("render tree");
        entity.mark_active(&mut ws, true).expect("activate");
        (ws, entity)
    }

    fn limit(tree: &Tree, half_grid: f64) -> f64 {
        2.0 * (half_grid - tree.x.abs()).min(half_grid - tree.y.abs())
    }

    #[test]
    fn radius_handle_uses_distance_from_center() {
        let (mut ws, mut entity) = setup(Tree::new(TreeKind::Round, 0.0, 0.0));
        entity
            .pointer_down(&ws, Part::RadiusHandle, Point2::new(60.0, 0.0))
            .expect("press");
        entity
            .pointer_move(&mut ws, Point2::new(60.0, 80.0))
            .expect("move");
        entity.pointer_up(&mut ws).expect("release");
        // 手柄从 (60, 0) 移到 (60, 80)，距中心 100
        assert_eq!(entity.tree(&ws).expect("tree").diameter, 200.0);
    }

    #[test]
    fn set_diameter_never_exceeds_grid_limit() {
        let (mut ws, mut entity) = setup(Tree::new(TreeKind::Conical, 450.0, -520.0));
        let half_grid = ws.half_grid();
        for diameter in [10.0, 5_000.0, 0.0, 161.0, 159.0, -3.0] {
            entity.set_diameter(&mut ws, diameter).expect("set diameter");
            let tree = entity.tree(&ws).expect("tree");
            assert!(tree.diameter <= limit(tree, half_grid) + 1e-9);
        }
        let tree = entity.tree(&ws).expect("tree");
        assert_eq!(tree.diameter, MIN_TREE_DIAMETER);
    }

    #[test]
    fn body_drag_keeps_canopy_inside_grid() {
        let (mut ws, mut entity) = setup(Tree::new(TreeKind::Oval, 0.0, 0.0));
        entity
            .pointer_down(&ws, Part::Body, Point2::new(0.0, 0.0))
            .expect("press");
        entity
            .pointer_move(&mut ws, Point2::new(2_000.0, 10.0))
            .expect("move");
        entity.pointer_up(&mut ws).expect("release");
        let tree = entity.tree(&ws).expect("tree");
        assert_eq!(tree.x, 540.0);
        assert_eq!(tree.y, 10.0);
    }

    #[test]
    fn set_diameter_requests_persistence() {
        let (mut ws, mut entity) = setup(Tree::new(TreeKind::Round, 0.0, 0.0));
        let log = record(entity.base_mut());
        entity.set_diameter(&mut ws, 80.0).expect("set diameter");
        assert_eq!(log.borrow().last(), Some(&EntitySignal::Update));
        assert!(!log.borrow().contains(&EntitySignal::LesserUpdate));
    }

    #[test]
    fn disposed_tree_rejects_changes() {
        let (mut ws, mut entity) = setup(Tree::new(TreeKind::Round, 0.0, 0.0));
        entity.dispose(&mut ws);
        assert!(entity.base().node().is_none());
        assert!(matches!(
            entity.set_xy(&mut ws, 1.0, 1.0),
            Err(EngineError::Disposed(_))
        ));
        assert!(matches!(
            entity.set_diameter(&mut ws, 10.0),
            Err(EngineError::Disposed(_))
        ));
    }
}
