use glam::DVec2;
use tracing::{debug, trace};

use crate::camera::Ray;
use crate::scene::{NodeContent, SceneGraph, SceneNodeId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub node: SceneNodeId,
    pub distance: f64,
    pub interactive: bool,
}

/// 视线与全部可见网格的交点，由近到远。
pub fn cast(graph: &SceneGraph, ray: &Ray) -> Vec<Hit> {
    let mut hits: Vec<Hit> = graph
        .iter()
        .filter(|(_, node)| node.visible)
        .filter_map(|(id, node)| {
            let NodeContent::Mesh(mesh) = &node.content else {
                return None;
            };
            mesh.intersect_ray(ray.origin, ray.direction)
                .map(|distance| Hit {
                    node: id,
                    distance,
                    interactive: node.category.is_interactive(),
                })
        })
        .collect();
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}

/// 悬停、按下与激活状态。按下后抬起之间没有移动才算点选，否则视为拖动相机。
#[derive(Debug, Default, Clone)]
pub struct Interaction {
    hovered: Option<SceneNodeId>,
    pressed: Option<SceneNodeId>,
    moved: bool,
    active: Option<SceneNodeId>,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn hovered(&self) -> Option<SceneNodeId> {
        self.hovered
    }

    #[inline]
    pub fn active(&self) -> Option<SceneNodeId> {
        self.active
    }

    /// 每帧更新悬停节点：过滤掉非交互类别后的最近命中，并同步高亮标记。
    pub fn update_hover(&mut self, graph: &mut SceneGraph, ray: &Ray) -> Option<SceneNodeId> {
        let hovered = cast(graph, ray)
            .into_iter()
            .find(|hit| hit.interactive)
            .map(|hit| hit.node);
        if hovered != self.hovered {
            trace!(?hovered, "悬停节点变化");
            if let Some(node) = self.hovered.and_then(|id| graph.node_mut(id)) {
                node.highlighted = false;
            }
            if let Some(node) = hovered.and_then(|id| graph.node_mut(id)) {
                node.highlighted = true;
            }
            self.hovered = hovered;
        }
        hovered
    }

    pub fn pointer_down(&mut self) {
        self.pressed = self.hovered;
        self.moved = false;
    }

    pub fn pointer_move(&mut self, delta: DVec2) {
        if self.pressed.is_some() && delta != DVec2::ZERO {
            self.moved = true;
        }
    }

    /// 抬起时若满足点选条件，返回新激活的节点。
    pub fn pointer_up(&mut self) -> Option<SceneNodeId> {
        let pressed = self.pressed.take();
        let moved = std::mem::take(&mut self.moved);
        match pressed {
            Some(node) if !moved && self.hovered == Some(node) => {
                debug!(node = node.index(), "激活场景节点");
                self.active = Some(node);
                Some(node)
            }
            Some(_) => {
                trace!(moved, "取消点选");
                None
            }
            None => None,
        }
    }

    /// 场景重建后节点编号失效，全部清空。
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;
    use homeplan_core::document::EntityId;

    use super::*;
    use crate::mesh::Mesh;
    use crate::scene::{Color, Material, NodeCategory, SceneNode};

    fn scene() -> (SceneGraph, SceneNodeId, SceneNodeId) {
        let mut graph = SceneGraph::new();
        let room = graph.add(SceneNode::mesh(
            "room",
            NodeCategory::Room {
                room_id: EntityId::new("r1"),
            },
            Mesh::cuboid(DVec3::new(0.0, 0.0, 0.0), DVec3::new(100.0, 100.0, 1.0)),
            Material::opaque(Color::WHITE),
        ));
        // 房间上方的屋顶比房间更近，但不可交互。
        let roof = graph.add(SceneNode::mesh(
            "roof",
            NodeCategory::Roof,
            Mesh::cuboid(DVec3::new(0.0, 0.0, 50.0), DVec3::new(100.0, 100.0, 51.0)),
            Material::opaque(Color::WHITE),
        ));
        (graph, room, roof)
    }

    fn down_ray(x: f64, y: f64) -> Ray {
        Ray {
            origin: DVec3::new(x, y, 100.0),
            direction: DVec3::NEG_Z,
        }
    }

    #[test]
    fn non_interactive_hits_are_skipped() {
        let (mut graph, room, roof) = scene();
        let hits = cast(&graph, &down_ray(30.0, 40.0));
        assert_eq!(hits.first().map(|hit| hit.node), Some(roof));

        let mut interaction = Interaction::new();
        assert_eq!(interaction.update_hover(&mut graph, &down_ray(30.0, 40.0)), Some(room));
        assert!(graph.node(room).expect("room").highlighted);
        assert_eq!(interaction.update_hover(&mut graph, &down_ray(300.0, 40.0)), None);
        assert!(!graph.node(room).expect("room").highlighted);
    }

    #[test]
    fn click_without_movement_activates() {
        let (mut graph, room, _) = scene();
        let mut interaction = Interaction::new();
        interaction.update_hover(&mut graph, &down_ray(30.0, 40.0));
        interaction.pointer_down();
        interaction.pointer_move(DVec2::ZERO);
        assert_eq!(interaction.pointer_up(), Some(room));
        assert_eq!(interaction.active(), Some(room));
    }

    #[test]
    fn movement_between_down_and_up_cancels() {
        let (mut graph, _, _) = scene();
        let mut interaction = Interaction::new();
        interaction.update_hover(&mut graph, &down_ray(30.0, 40.0));
        interaction.pointer_down();
        interaction.pointer_move(DVec2::new(3.0, 0.0));
        assert_eq!(interaction.pointer_up(), None);
        assert_eq!(interaction.active(), None);

        // 下一次干净的点击不受上一次拖动影响。
        interaction.pointer_down();
        assert!(interaction.pointer_up().is_some());
    }

    #[test]
    fn hidden_nodes_are_not_hit() {
        let (mut graph, room, _) = scene();
        if let Some(node) = graph.node_mut(room) {
            node.visible = false;
        }
        let mut interaction = Interaction::new();
        assert_eq!(interaction.update_hover(&mut graph, &down_ray(30.0, 40.0)), None);
    }
}
