use glam::{DVec2, DVec3};
use homeplan_core::document::{DEFAULT_GROUND_COLOR, FloorPlan, Tree, TreeKind};
use homeplan_core::geometry::Bounds2D;
use tracing::debug;

use crate::mesh::Mesh;
use crate::scene::{Color, FoliagePart, Material, NodeCategory, SceneGraph, SceneNode};
use crate::season::FoliageState;

const TRUNK_COLOR: Color = Color::rgb(0.36, 0.25, 0.16);
const SUBSOIL_COLOR: Color = Color::rgb(0.45, 0.33, 0.20);
const BEDROCK_COLOR: Color = Color::rgb(0.40, 0.40, 0.42);
const CANOPY_SIDES: usize = 16;
const BRANCH_COUNT: usize = 5;

/// 自上而下的地层：名称与厚度。
const STRATA: [(&str, f64); 3] = [("topsoil", 6.0), ("subsoil", 24.0), ("bedrock", 48.0)];

/// 地面范围：平面包围盒加四周留白；空平面退回固定对称框。
pub fn ground_bounds(plan: &FloorPlan, padding: f64, fallback_half_extent: f64) -> Bounds2D {
    plan.bounding_box()
        .or_fallback(fallback_half_extent)
        .expanded(padding)
}

/// 堆叠的水平地层，最上层顶面与最低楼层标高齐平。
pub fn build_ground(plan: &FloorPlan, bounds: &Bounds2D) -> Vec<SceneNode> {
    let surface = plan.lowest_elevation();
    let topsoil = Color::from_hex(&plan.appearance.ground_color)
        .or_else(|| Color::from_hex(DEFAULT_GROUND_COLOR))
        .unwrap_or(Color::rgb(0.29, 0.49, 0.18));
    let mut top = surface;
    STRATA
        .iter()
        .zip([topsoil, SUBSOIL_COLOR, BEDROCK_COLOR])
        .map(|((name, thickness), color)| {
            let bottom = top - thickness;
            let node = SceneNode::mesh(
                format!("ground:{name}"),
                NodeCategory::Environment,
                Mesh::cuboid(
                    DVec3::new(bounds.left(), bounds.top(), bottom),
                    DVec3::new(bounds.right(), bounds.bottom(), top),
                ),
                Material::opaque(color),
            );
            top = bottom;
            node
        })
        .collect()
}

/// 一棵树的节点：树干常显，树冠与枝干按季节互斥显示。
pub fn build_tree(tree: &Tree, ground: f64, foliage: FoliageState) -> Vec<SceneNode> {
    let center = DVec2::new(tree.x, tree.y);
    let radius = tree.radius().max(0.5);
    let height = tree.height.max(1.0);
    let trunk_top = ground + height * 0.4;
    let trunk_radius = (radius * 0.08).max(0.5);
    let crown_top = ground + height;

    let canopy = match tree.kind {
        TreeKind::Conical => Mesh::cone(center, radius, CANOPY_SIDES, trunk_top, crown_top),
        TreeKind::Round => {
            let r = radius.min((crown_top - trunk_top) * 0.5).max(0.5);
            Mesh::ellipsoid(center.extend(crown_top - r), r, r, CANOPY_SIDES, 8)
        }
        TreeKind::Oval => {
            let r_z = (crown_top - trunk_top) * 0.5;
            Mesh::ellipsoid(
                center.extend(trunk_top + r_z),
                radius * 0.75,
                r_z,
                CANOPY_SIDES,
                8,
            )
        }
    };

    let id = &tree.tree_id;
    let mut nodes = Vec::with_capacity(BRANCH_COUNT + 2);
    nodes.push(SceneNode::mesh(
        format!("tree:{id}:trunk"),
        NodeCategory::Environment,
        Mesh::prism(center, trunk_radius, 8, ground, trunk_top),
        Material::opaque(TRUNK_COLOR),
    ));

    let mut canopy = SceneNode::mesh(
        format!("tree:{id}:canopy"),
        NodeCategory::Environment,
        canopy,
        Material::opaque(foliage.color),
    )
    .with_foliage(FoliagePart::Canopy);
    canopy.visible = foliage.visible;
    nodes.push(canopy);

    let reach = radius * 0.7;
    let rise = (crown_top - trunk_top) * 0.6;
    for i in 0..BRANCH_COUNT {
        let angle = std::f64::consts::TAU * i as f64 / BRANCH_COUNT as f64;
        let tip = center + DVec2::new(angle.cos(), angle.sin()) * reach;
        let mut branch = SceneNode::mesh(
            format!("tree:{id}:branch:{i}"),
            NodeCategory::Environment,
            Mesh::beam(center.extend(trunk_top), tip.extend(trunk_top + rise), trunk_radius),
            Material::opaque(TRUNK_COLOR),
        )
        .with_foliage(FoliagePart::Branches);
        branch.visible = !foliage.visible;
        nodes.push(branch);
    }
    nodes
}

/// 全部树木，立于最低楼层标高处。
pub fn build_trees(plan: &FloorPlan, foliage: FoliageState) -> Vec<SceneNode> {
    let ground = plan.lowest_elevation();
    let nodes: Vec<SceneNode> = plan
        .groups
        .iter()
        .flat_map(|group| group.trees.iter())
        .flat_map(|tree| build_tree(tree, ground, foliage))
        .collect();
    debug!(nodes = nodes.len(), visible = foliage.visible, "已生成树木");
    nodes
}

/// 就地切换树冠与枝干，返回受影响的节点数。
pub fn apply_foliage(graph: &mut SceneGraph, foliage: FoliageState) -> usize {
    let mut touched = 0;
    for node in graph.iter_mut() {
        match node.foliage {
            Some(FoliagePart::Canopy) => {
                node.visible = foliage.visible;
                node.material.color = foliage.color;
            }
            Some(FoliagePart::Branches) => node.visible = !foliage.visible,
            None => continue,
        }
        touched += 1;
    }
    touched
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use homeplan_core::document::{Group, Room};
    use homeplan_core::geometry::Point2;

    use super::*;
    use crate::season::{SUMMER, WINTER};

    fn summer() -> FoliageState {
        FoliageState {
            color: SUMMER,
            visible: true,
        }
    }

    fn winter() -> FoliageState {
        FoliageState {
            color: WINTER,
            visible: false,
        }
    }

    fn plan_with_room(elevation: f64) -> FloorPlan {
        let mut group = Group::new(elevation, 96.0);
        group.rooms.push(Room::new(
            0.0,
            0.0,
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(100.0, 0.0),
                Point2::new(100.0, 50.0),
                Point2::new(0.0, 50.0),
            ],
        ));
        FloorPlan {
            groups: vec![group],
            appearance: Default::default(),
        }
    }

    #[test]
    fn ground_is_padded_and_flush_with_lowest_group() {
        let plan = plan_with_room(-12.0);
        let bounds = ground_bounds(&plan, 120.0, 180.0);
        assert_eq!(bounds.left(), -120.0);
        assert_eq!(bounds.right(), 220.0);

        let strata = build_ground(&plan, &bounds);
        assert_eq!(strata.len(), 3);
        let (min, max) = strata[0].as_mesh().and_then(Mesh::bounds).expect("mesh");
        assert_relative_eq!(max.z, -12.0);
        assert_relative_eq!(min.z, -18.0);
        assert_relative_eq!(min.y, -120.0);
        assert_relative_eq!(max.y, 170.0);
        assert_eq!(strata[0].material.color.to_hex(), DEFAULT_GROUND_COLOR);

        let (_, below) = strata[1].as_mesh().and_then(Mesh::bounds).expect("mesh");
        assert_relative_eq!(below.z, min.z);
    }

    #[test]
    fn empty_plan_falls_back_to_fixed_box() {
        let bounds = ground_bounds(&FloorPlan::default(), 120.0, 180.0);
        assert!(bounds.is_finite());
        assert_eq!(bounds.left(), -300.0);
        assert_eq!(bounds.bottom(), 300.0);
    }

    #[test]
    fn canopy_and_branches_are_complementary() {
        let tree = Tree::new(TreeKind::Conical, 50.0, 50.0);
        let nodes = build_tree(&tree, 0.0, summer());
        assert_eq!(nodes.len(), 2 + BRANCH_COUNT);
        for node in &nodes {
            match node.foliage {
                Some(FoliagePart::Canopy) => assert!(node.visible),
                Some(FoliagePart::Branches) => assert!(!node.visible),
                None => assert!(node.visible),
            }
        }

        let mut graph = SceneGraph::new();
        graph.extend(nodes);
        assert_eq!(apply_foliage(&mut graph, winter()), 1 + BRANCH_COUNT);
        for (_, node) in graph.iter() {
            match node.foliage {
                Some(FoliagePart::Canopy) => {
                    assert!(!node.visible);
                    assert_eq!(node.material.color, WINTER);
                }
                Some(FoliagePart::Branches) => assert!(node.visible),
                None => assert!(node.visible),
            }
        }
    }

    #[test]
    fn canopy_shapes_reach_tree_height() {
        for kind in [TreeKind::Conical, TreeKind::Round, TreeKind::Oval] {
            let tree = Tree::new(kind, 0.0, 0.0);
            let nodes = build_tree(&tree, 10.0, summer());
            let (_, max) = nodes[1].as_mesh().and_then(Mesh::bounds).expect("canopy");
            assert_relative_eq!(max.z, 10.0 + tree.height, epsilon = 1e-9);
        }
    }
}
