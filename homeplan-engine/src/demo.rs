use homeplan_core::document::{
    EntityId, FloorPlan, FloorPlanDocument, Group, LightSource, Opening, OpeningKind, OpeningRotation, Room,
    Surface, Tree, TreeKind,
};
use homeplan_core::geometry::Point2;
use homeplan_core::store::FloorPlanId;
use tracing::debug;

pub const SAMPLE_PLAN_ID: &str = "sample-home";

fn rect(width: f64, height: f64) -> Vec<Point2> {
    vec![
        Point2::new(0.0, 0.0),
        Point2::new(width, 0.0),
        Point2::new(width, height),
        Point2::new(0.0, height),
    ]
}

fn named_room(name: &str, x: f64, y: f64, width: f64, height: f64) -> Room {
    let mut room = Room::new(x, y, rect(width, height));
    room.name = Some(name.to_string());
    room
}

fn opening(kind: OpeningKind, rotation: OpeningRotation, x: f64, y: f64, width: f64) -> Opening {
    let mut opening = Opening::new(kind, x, y);
    opening.rotation = rotation;
    opening.width = width;
    if kind == OpeningKind::Window {
        opening.height = 48.0;
    }
    opening
}

fn light(x: f64, y: f64, temperature: f64) -> LightSource {
    LightSource {
        light_source_id: EntityId::generate(),
        x,
        y,
        brightness: 1.0,
        temperature,
    }
}

/// 两层小住宅的示例文档，供 CLI 演示与测试使用。
pub fn sample_home() -> FloorPlanDocument {
    let mut ground = Group::new(0.0, 96.0);
    ground.name = Some("一层".to_string());
    ground
        .rooms
        .push(named_room("客厅", -240.0, -180.0, 240.0, 192.0));
    ground
        .rooms
        .push(named_room("厨房", 0.0, -180.0, 168.0, 192.0));
    ground.openings.extend([
        opening(OpeningKind::Door, OpeningRotation::Horizontal, -120.0, 12.0, 36.0),
        opening(OpeningKind::Window, OpeningRotation::Horizontal, 84.0, -180.0, 48.0),
        opening(OpeningKind::Empty, OpeningRotation::Vertical, 0.0, -84.0, 48.0),
    ]);
    let mut patio = Surface::new(-240.0, 24.0, rect(192.0, 96.0));
    patio.color = "#b0a18c".to_string();
    ground.surfaces.push(patio);
    ground.trees.extend([
        Tree::new(TreeKind::Conical, 300.0, -240.0),
        Tree::new(TreeKind::Round, 300.0, 120.0),
        Tree::new(TreeKind::Oval, -420.0, 240.0),
    ]);
    ground
        .light_sources
        .extend([light(-120.0, -84.0, 2700.0), light(84.0, -84.0, 4000.0)]);

    let mut upper = Group::new(96.0, 96.0);
    upper.name = Some("二层".to_string());
    upper
        .rooms
        .push(named_room("卧室", -240.0, -180.0, 240.0, 192.0));
    upper.openings.push(opening(
        OpeningKind::Window,
        OpeningRotation::Vertical,
        -240.0,
        -84.0,
        60.0,
    ));
    upper.light_sources.push(light(-120.0, -84.0, 3000.0));

    let document = FloorPlanDocument {
        floor_plan_id: FloorPlanId::new(SAMPLE_PLAN_ID),
        name: "示例住宅".to_string(),
        data: FloorPlan {
            groups: vec![ground, upper],
            appearance: Default::default(),
        },
    };
    debug!(
        rooms = document
            .data
            .groups
            .iter()
            .map(|group| group.rooms.len())
            .sum::<usize>(),
        "已生成示例住宅"
    );
    document
}
