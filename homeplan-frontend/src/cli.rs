use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use homeplan_config::AppConfig;
use homeplan_core::document::{EntityId, FloorPlan};
use homeplan_core::store::FloorPlanId;
use homeplan_engine::command::{CommandBus, CommandContext, CommandRequest};
use homeplan_engine::{EditorSession, PointerInput};
use homeplan_viewer::Viewer;
use homeplan_viewer::season::FoliageState;
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{PlanSource, editor_settings, generate_options, load_plan, open_store};
use crate::picking::{RoomPicks, click_room};

/// 树拖拽的屏幕位移。
const TREE_DRAG: (f64, f64) = (24.0, 12.0);
const OPENING_WIDTH: f64 = 60.0;

#[derive(Debug, Clone, Default)]
pub struct DemoOptions {
    pub plan: Option<FloorPlanId>,
    pub date: Option<NaiveDate>,
}

/// 演示结束时的概览。
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub plan_id: FloorPlanId,
    pub source: PlanSource,
    pub room_areas: Vec<(String, f64)>,
    pub nodes_by_category: BTreeMap<&'static str, usize>,
    pub roof_facets: usize,
    pub date: NaiveDate,
    pub foliage: FoliageState,
    pub saves: usize,
    pub edits: Vec<String>,
    /// 三维视图点选后编辑器中激活的房间。
    pub active_room: Option<String>,
}

/// 加载平面，回放一小段编辑（拖动一棵树、调整一个开口宽度），
/// 写出防抖后的保存，再生成三维场景并在其中点选一个房间回传给编辑器。
pub fn run_demo(config: &AppConfig, options: &DemoOptions) -> Result<DemoReport, FrontendError> {
    let mut store = open_store(config);
    let loaded = load_plan(&store, options.plan.as_ref())?;
    let mut session = EditorSession::new(loaded.document, editor_settings(&config.editor))?;

    let mut edits = Vec::new();
    if let Some(edit) = drag_first_tree(&mut session)? {
        edits.push(edit);
    }
    if let Some(edit) = resize_first_opening(&mut session)? {
        edits.push(edit);
    }

    let mut saves = session.tick(Instant::now(), &mut store);
    saves += session.flush(&mut store);
    info!(saves, edits = edits.len(), "编辑回放完成");

    let mut viewer = Viewer::new(session.plan(), generate_options(&config.viewer, options.date)?)?;
    let picks = RoomPicks::attach(&mut viewer);
    let active_room = pick_room_in_scene(&mut session, &mut viewer, &picks)?;
    if let Some(label) = &active_room {
        edits.push(format!(
            "三维视图选中房间 {label}，编辑器当前楼层 {}",
            session.group_index()
        ));
    }

    let mut report = summarize(
        session.plan_id().clone(),
        loaded.source,
        session.plan(),
        &viewer,
        saves,
        edits,
    );
    report.active_room = active_room;
    let cancelled = session.shutdown();
    if cancelled > 0 {
        warn!(cancelled, "会话关闭时仍有未发出的保存");
    }
    Ok(report)
}

/// 用指针事件把当前楼层第一棵树拖动一小段距离。
fn drag_first_tree(session: &mut EditorSession) -> Result<Option<String>, FrontendError> {
    let Some(tree) = session
        .plan()
        .group(session.group_index())
        .and_then(|group| group.trees.first())
        .cloned()
    else {
        return Ok(None);
    };
    let view = session.view();
    let start = view.to_screen(tree.center());
    session.pointer_down(&PointerInput::mouse(start.x(), start.y()))?;
    session.pointer_move(&PointerInput::mouse(
        start.x() + TREE_DRAG.0,
        start.y() + TREE_DRAG.1,
    ))?;
    let release = session.pointer_up()?;
    if !release.is_some_and(|release| release.moved) {
        warn!(tree = %tree.tree_id, "树拖拽未生效");
        return Ok(None);
    }
    let moved = find_tree(session.plan(), &tree.tree_id).unwrap_or((tree.x, tree.y));
    Ok(Some(format!(
        "拖动树 {}: ({:.1}, {:.1}) -> ({:.1}, {:.1})",
        tree.tree_id, tree.x, tree.y, moved.0, moved.1
    )))
}

/// 通过命令总线调整当前楼层第一个开口的宽度。
fn resize_first_opening(session: &mut EditorSession) -> Result<Option<String>, FrontendError> {
    let Some(opening) = session
        .plan()
        .group(session.group_index())
        .and_then(|group| group.openings.first())
        .cloned()
    else {
        return Ok(None);
    };
    let bus = CommandBus::new();
    let width = OPENING_WIDTH.to_string();
    let mut context = CommandContext { session };
    dispatch_cli_command(
        &bus,
        CommandRequest::new("set_width", &[opening.opening_id.as_str(), width.as_str()]),
        &mut context,
    )?;
    Ok(Some(format!(
        "调整开口 {} 宽度: {:.1} -> {:.1}",
        opening.opening_id, opening.width, OPENING_WIDTH
    )))
}

/// 在三维视图中单击当前楼层第一个房间的上方，并把选中结果回传给编辑会话。
fn pick_room_in_scene(
    session: &mut EditorSession,
    viewer: &mut Viewer,
    picks: &RoomPicks,
) -> Result<Option<String>, FrontendError> {
    let Some(room) = session
        .plan()
        .group(session.group_index())
        .and_then(|group| group.rooms.first())
        .cloned()
    else {
        return Ok(None);
    };
    if click_room(viewer, &room).is_none() {
        warn!(room = %room.room_id, "三维点选未命中房间");
        return Ok(None);
    }
    let Some(active) = picks.apply(session)? else {
        return Ok(None);
    };
    Ok(session
        .plan()
        .groups
        .iter()
        .flat_map(|group| group.rooms.iter())
        .find(|room| room.room_id == active)
        .map(|room| room.name.clone().unwrap_or_else(|| room.room_id.to_string())))
}

fn find_tree(plan: &FloorPlan, id: &EntityId) -> Option<(f64, f64)> {
    plan.groups
        .iter()
        .flat_map(|group| group.trees.iter())
        .find(|tree| &tree.tree_id == id)
        .map(|tree| (tree.x, tree.y))
}

fn dispatch_cli_command(
    bus: &CommandBus,
    request: CommandRequest,
    context: &mut CommandContext<'_>,
) -> Result<(), FrontendError> {
    let response = bus.dispatch(&request, context);
    if response.success {
        if let Some(message) = response.message {
            println!("[命令] {message}");
        }
        Ok(())
    } else {
        Err(FrontendError::Command {
            command: request.name,
            message: response.message.unwrap_or_else(|| "未知错误".to_string()),
        })
    }
}

fn summarize(
    plan_id: FloorPlanId,
    source: PlanSource,
    plan: &FloorPlan,
    viewer: &Viewer,
    saves: usize,
    edits: Vec<String>,
) -> DemoReport {
    let room_areas = plan
        .groups
        .iter()
        .flat_map(|group| group.rooms.iter())
        .map(|room| {
            let label = room
                .name
                .clone()
                .unwrap_or_else(|| room.room_id.to_string());
            (label, room.area())
        })
        .collect();
    let mut nodes_by_category = BTreeMap::new();
    for (_, node) in viewer.scene().graph.iter() {
        *nodes_by_category.entry(node.category.label()).or_insert(0) += 1;
    }
    DemoReport {
        plan_id,
        source,
        room_areas,
        nodes_by_category,
        roof_facets: viewer.scene().roof_facets,
        date: viewer.options().date,
        foliage: viewer.scene().foliage,
        saves,
        edits,
        active_room: None,
    }
}

pub fn print_report(report: &DemoReport) {
    println!("住宅平面 CLI 演示");
    match &report.source {
        PlanSource::Store(path) => println!("已从存储加载平面 {}：{}", report.plan_id, path.display()),
        PlanSource::Sample => println!("使用内置示例住宅 {}", report.plan_id),
    }
    for edit in &report.edits {
        println!("  - {edit}");
    }
    println!("已发出保存请求 {} 次", report.saves);
    if let Some(room) = &report.active_room {
        println!("编辑器当前激活房间：{room}");
    }

    println!("房间面积：");
    for (name, area) in &report.room_areas {
        println!("  - {name}: {area:.1}");
    }
    println!("场景节点：");
    for (category, count) in &report.nodes_by_category {
        println!("  - {category}: {count}");
    }
    println!("屋顶坡面数: {}", report.roof_facets);
    println!(
        "{} 树冠{}，颜色 {}",
        report.date,
        if report.foliage.visible { "可见" } else { "隐藏" },
        report.foliage.color.to_hex()
    );
}
