use homeplan_core::document::OpeningKind;

use crate::extrude::wall_block;
use crate::openings::Gap;
use crate::scene::{Color, Material, NodeCategory, SceneNode};

const DOOR_LEAF_THICKNESS: f64 = 1.5;
const GLASS_THICKNESS: f64 = 0.5;
const DOOR_COLOR: Color = Color::rgb(0.55, 0.43, 0.39);
const GLASS_COLOR: Color = Color::rgb(0.66, 0.85, 0.95);
const GLASS_OPACITY: f64 = 0.35;

/// 为挖切出的空隙生成门扇或玻璃；空洞不生成构件。
pub fn build_fixtures(gaps: &[Gap]) -> Vec<SceneNode> {
    gaps.iter().filter_map(fixture_for).collect()
}

fn fixture_for(gap: &Gap) -> Option<SceneNode> {
    let (thickness, material, label) = match gap.kind {
        OpeningKind::Empty => return None,
        OpeningKind::Door => (
            DOOR_LEAF_THICKNESS.min(gap.thickness),
            Material::opaque(DOOR_COLOR),
            "door",
        ),
        OpeningKind::Window => (
            GLASS_THICKNESS.min(gap.thickness),
            Material {
                color: GLASS_COLOR,
                opacity: GLASS_OPACITY,
            },
            "window",
        ),
    };
    let mesh = wall_block(gap.start, gap.end, thickness, gap.bottom, gap.top);
    if mesh.is_empty() {
        return None;
    }
    Some(SceneNode::mesh(
        format!("{label}:{}", gap.opening_id),
        NodeCategory::OpeningFixture,
        mesh,
        material,
    ))
}
