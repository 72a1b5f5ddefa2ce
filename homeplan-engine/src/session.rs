use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use homeplan_core::document::{
    EntityId, FloorPlan, FloorPlanDocument, Opening, OpeningKind, OpeningRotation, Surface, Tree,
    TreeKind,
};
use homeplan_core::geometry::{Point2, Vector2, is_simple_polygon};
use homeplan_core::store::{FloorPlanCache, FloorPlanId, FloorPlanPersistence};
use tracing::{debug, info, trace};

use crate::canvas::{Canvas, NodeId, NodeOwner, Part, Shape};
use crate::drag::DragRelease;
use crate::entity::{
    EditorEntity, OpeningEntity, PointEntity, RoomEntity, SurfaceEntity, TreeEntity,
    WallEntity, Workspace, missing,
};
use crate::errors::EngineError;
use crate::persist::{DEFAULT_SAVE_DELAY, SaveScheduler};
use crate::selection::{ActiveEntity, EntityKind, SelectionManager};
use crate::signal::{EntitySignal, Signals, SubscriptionId};

pub const DEFAULT_GRID_SIZE: f64 = 1200.0;
pub const DEFAULT_SNAP: f64 = 12.0;
const GHOST_FILL: &str = "#e0e0e0";

/// 编辑器参数，由宿主从配置映射而来。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorSettings {
    /// 网格总边长，实体被限制在 `[-grid_size / 2, grid_size / 2]` 内。
    pub grid_size: f64,
    pub snap: f64,
    pub save_delay: Duration,
    pub view_scale: f64,
}

impl EditorSettings {
    #[inline]
    pub fn half_grid(&self) -> f64 {
        self.grid_size * 0.5
    }
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            snap: DEFAULT_SNAP,
            save_delay: DEFAULT_SAVE_DELAY,
            view_scale: 1.0,
        }
    }
}

/// 屏幕坐标与平面坐标的换算：`screen = world * scale + offset`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub scale: f64,
    pub offset: Vector2,
}

impl ViewTransform {
    pub fn new(scale: f64, offset: Vector2) -> Self {
        Self { scale, offset }
    }

    /// 非法缩放按 1 处理。
    #[inline]
    pub fn effective_scale(&self) -> f64 {
        if self.scale.is_finite() && self.scale > f64::EPSILON {
            self.scale
        } else {
            1.0
        }
    }

    pub fn to_world(&self, screen: Point2) -> Point2 {
        let shifted = screen.as_vec2() - self.offset.as_vec2();
        Point2::from_vec(shifted / self.effective_scale())
    }

    pub fn to_screen(&self, world: Point2) -> Point2 {
        Point2::from_vec(world.as_vec2() * self.effective_scale() + self.offset.as_vec2())
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(1.0, Vector2::zero())
    }
}

/// 宿主转发的指针事件载荷。
#[derive(Debug, Clone, PartialEq)]
pub enum PointerInput {
    Mouse { x: f64, y: f64 },
    /// 触摸事件，只使用第一个触点。
    Touch { touches: Vec<Point2> },
}

impl PointerInput {
    pub fn mouse(x: f64, y: f64) -> Self {
        Self::Mouse { x, y }
    }

    /// 屏幕坐标；没有触点的触摸事件返回 `None`。
    pub fn position(&self) -> Option<Point2> {
        match self {
            PointerInput::Mouse { x, y } => Some(Point2::new(*x, *y)),
            PointerInput::Touch { touches } => touches.first().copied(),
        }
    }
}

/// 选中状态变化，供工具栏等外部界面订阅。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSignal {
    Activated(ActiveEntity),
    Deactivated(ActiveEntity),
}

/// 单个平面图的编辑会话：持有文档、二维画布、实体、选中记录与保存调度器。
#[derive(Debug)]
pub struct EditorSession {
    plan_id: FloorPlanId,
    name: String,
    ws: Workspace,
    ghost_layer: NodeId,
    entities: Vec<EditorEntity>,
    selection: SelectionManager,
    selection_signals: Signals<SelectionSignal>,
    capture: Option<(EntityKind, EntityId)>,
    editing_room: Option<EntityId>,
    snap_highlights: Vec<Point2>,
    scheduler: SaveScheduler,
    save_requested: Rc<Cell<bool>>,
}

fn find_entity<'a>(
    entities: &'a mut [EditorEntity],
    kind: EntityKind,
    id: &EntityId,
) -> Result<&'a mut EditorEntity, EngineError> {
    entities
        .iter_mut()
        .find(|entity| entity.matches(kind, id))
        .ok_or_else(|| missing(kind, id))
}

impl EditorSession {
    /// 从缓存协作方取出文档并打开会话。
    pub fn open(
        cache: &dyn FloorPlanCache,
        id: &FloorPlanId,
        settings: EditorSettings,
    ) -> Result<Self, EngineError> {
        let document = cache.load(id)?;
        Self::new(document, settings)
    }

    pub fn new(document: FloorPlanDocument, settings: EditorSettings) -> Result<Self, EngineError> {
        let FloorPlanDocument {
            floor_plan_id,
            name,
            data,
        } = document;
        let mut canvas = Canvas::new();
        let root = canvas.root();
        let ghost_layer = canvas.add(root, Shape::Group, None)?;
        let layer = canvas.add(root, Shape::Group, None)?;
        let group = data.groups_by_elevation().first().copied().unwrap_or(0);

        let mut session = Self {
            plan_id: floor_plan_id,
            name,
            ws: Workspace {
                plan: data,
                group,
                canvas,
                settings,
                view: ViewTransform::new(settings.view_scale, Vector2::zero()),
                layer,
            },
            ghost_layer,
            entities: Vec::new(),
            selection: SelectionManager::new(),
            selection_signals: Signals::new(),
            capture: None,
            editing_room: None,
            snap_highlights: Vec::new(),
            scheduler: SaveScheduler::new(settings.save_delay),
            save_requested: Rc::new(Cell::new(false)),
        };
        session.build()?;
        info!(
            floor_plan = %session.plan_id,
            groups = session.ws.plan.groups.len(),
            entities = session.entities.len(),
            "编辑会话已打开"
        );
        Ok(session)
    }

    #[inline]
    pub fn plan_id(&self) -> &FloorPlanId {
        &self.plan_id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn plan(&self) -> &FloorPlan {
        &self.ws.plan
    }

    /// 以文档形式导出当前状态。
    pub fn document(&self) -> FloorPlanDocument {
        FloorPlanDocument {
            floor_plan_id: self.plan_id.clone(),
            name: self.name.clone(),
            data: self.ws.plan.clone(),
        }
    }

    #[inline]
    pub fn canvas(&self) -> &Canvas {
        &self.ws.canvas
    }

    #[inline]
    pub fn settings(&self) -> &EditorSettings {
        &self.ws.settings
    }

    #[inline]
    pub fn group_index(&self) -> usize {
        self.ws.group
    }

    #[inline]
    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    #[inline]
    pub fn active(&self) -> Option<&ActiveEntity> {
        self.selection.active()
    }

    #[inline]
    pub fn editing_room(&self) -> Option<&EntityId> {
        self.editing_room.as_ref()
    }

    /// 当前拖拽的区域与之对齐的吸附点。
    #[inline]
    pub fn snap_highlights(&self) -> &[Point2] {
        &self.snap_highlights
    }

    #[inline]
    pub fn entities(&self) -> &[EditorEntity] {
        &self.entities
    }

    pub fn entity(&self, kind: EntityKind, id: &EntityId) -> Option<&EditorEntity> {
        self.entities.iter().find(|entity| entity.matches(kind, id))
    }

    #[inline]
    pub fn scheduler(&self) -> &SaveScheduler {
        &self.scheduler
    }

    #[inline]
    pub fn view(&self) -> ViewTransform {
        self.ws.view
    }

    /// 更新视图变换，已渲染的手柄按新缩放重绘。
    pub fn set_view(&mut self, view: ViewTransform) -> Result<(), EngineError> {
        self.ws.view = view;
        for entity in &mut self.entities {
            entity.rerender(&mut self.ws)?;
        }
        Ok(())
    }

    /// 切换编辑的楼层：清空选中、释放现有实体并重建画布。
    pub fn switch_group(&mut self, index: usize) -> Result<(), EngineError> {
        if self.ws.plan.group(index).is_none() {
            return Err(EngineError::GroupNotFound(index));
        }
        self.deactivate_all()?;
        self.ws.group = index;
        self.build()?;
        debug!(group = index, "已切换楼层");
        Ok(())
    }

    fn build(&mut self) -> Result<(), EngineError> {
        self.capture = None;
        self.snap_highlights.clear();
        self.editing_room = None;
        for mut entity in self.entities.drain(..) {
            entity.dispose(&mut self.ws);
        }
        self.ws.canvas.clear_children(self.ghost_layer);
        self.ws.canvas.clear_children(self.ws.layer);

        let Some(group) = self.ws.plan.group(self.ws.group) else {
            return Ok(());
        };

        if let Some(below) = self
            .ws
            .plan
            .group_below(self.ws.group)
            .and_then(|index| self.ws.plan.group(index))
        {
            let outlines: Vec<Vec<Point2>> =
                below.rooms.iter().map(|room| room.world_points()).collect();
            for points in outlines {
                self.ws.canvas.add(
                    self.ghost_layer,
                    Shape::Polygon {
                        points,
                        fill: GHOST_FILL.to_string(),
                        stroke: None,
                    },
                    None,
                )?;
            }
        }

        // 绘制顺序：区域、房间、开口、树
        let mut spawned: Vec<EditorEntity> = Vec::new();
        spawned.extend(
            group
                .surfaces
                .iter()
                .map(|surface| EditorEntity::Surface(SurfaceEntity::new(surface.surface_id.clone()))),
        );
        spawned.extend(
            group
                .rooms
                .iter()
                .map(|room| EditorEntity::Room(RoomEntity::new(room.room_id.clone()))),
        );
        spawned.extend(
            group
                .openings
                .iter()
                .map(|opening| EditorEntity::Opening(OpeningEntity::new(opening.opening_id.clone()))),
        );
        spawned.extend(
            group
                .trees
                .iter()
                .map(|tree| EditorEntity::Tree(TreeEntity::new(tree.tree_id.clone()))),
        );
        for entity in spawned {
            self.spawn(entity)?;
        }
        Ok(())
    }

    fn spawn(&mut self, mut entity: EditorEntity) -> Result<(), EngineError> {
        let flag = Rc::clone(&self.save_requested);
        entity.subscribe(move |signal: &EntitySignal| {
            if *signal == EntitySignal::Update {
                flag.set(true);
            }
        });
        let layer = self.ws.layer;
        entity.render(&mut self.ws, layer)?;
        self.entities.push(entity);
        Ok(())
    }

    /// 订阅某个实体的信号。
    pub fn subscribe(
        &mut self,
        kind: EntityKind,
        id: &EntityId,
        listener: impl FnMut(&EntitySignal) + 'static,
    ) -> Result<SubscriptionId, EngineError> {
        Ok(find_entity(&mut self.entities, kind, id)?.subscribe(listener))
    }

    pub fn subscribe_selection(
        &mut self,
        listener: impl FnMut(&SelectionSignal) + 'static,
    ) -> SubscriptionId {
        self.selection_signals.subscribe(listener)
    }

    /// 激活或停用实体。激活时先停用当前占用任一槽位的实体，再填充本槽位。
    pub fn set_active(
        &mut self,
        kind: EntityKind,
        id: &EntityId,
        active: bool,
    ) -> Result<(), EngineError> {
        if !active {
            if self.selection.is_active(kind, id) {
                self.release_active()?;
            }
            if kind == EntityKind::Room && self.editing_room.as_ref() == Some(id) {
                self.close_room_editing();
            }
            return Ok(());
        }

        if self.selection.is_active(kind, id) {
            return Ok(());
        }
        let room_of_target = find_entity(&mut self.entities, kind, id)?
            .room_id()
            .cloned();

        self.release_active()?;
        let keeps_editing = match kind {
            EntityKind::Room | EntityKind::Point | EntityKind::Wall => {
                room_of_target.is_some() && room_of_target.as_ref() == self.editing_room.as_ref()
            }
            _ => false,
        };
        if !keeps_editing {
            self.close_room_editing();
        }

        self.selection.activate(kind, id.clone());
        find_entity(&mut self.entities, kind, id)?.mark_active(&mut self.ws, true)?;
        self.selection_signals
            .emit(SelectionSignal::Activated(ActiveEntity {
                kind,
                id: id.clone(),
            }));

        if kind == EntityKind::Room {
            self.open_room_editing(id)?;
        }
        Ok(())
    }

    /// 停用当前激活实体（若有），并结束房间编辑。
    pub fn deactivate_all(&mut self) -> Result<(), EngineError> {
        self.release_active()?;
        self.close_room_editing();
        Ok(())
    }

    /// 三维视图点选房间后的回传：房间在其他楼层时先切换楼层，再激活该房间。
    pub fn activate_room(&mut self, id: &EntityId) -> Result<(), EngineError> {
        let index = self
            .ws
            .plan
            .groups
            .iter()
            .position(|group| group.room(id).is_some())
            .ok_or_else(|| missing(EntityKind::Room, id))?;
        if index != self.ws.group {
            self.switch_group(index)?;
        }
        self.set_active(EntityKind::Room, id, true)
    }

    fn release_active(&mut self) -> Result<(), EngineError> {
        let Some(current) = self.selection.active().cloned() else {
            return Ok(());
        };
        if let Some(entity) = self
            .entities
            .iter_mut()
            .find(|entity| entity.matches(current.kind, &current.id))
        {
            entity.mark_active(&mut self.ws, false)?;
        }
        self.selection.deactivate(current.kind);
        self.selection_signals
            .emit(SelectionSignal::Deactivated(current));
        Ok(())
    }

    /// 为房间创建顶点与墙段实体，绘制在最上层。
    fn open_room_editing(&mut self, room_id: &EntityId) -> Result<(), EngineError> {
        if self.editing_room.as_ref() == Some(room_id) {
            return Ok(());
        }
        self.close_room_editing();
        let count = self
            .ws
            .group()?
            .room(room_id)
            .ok_or_else(|| missing(EntityKind::Room, room_id))?
            .points
            .len();
        for index in 0..count {
            self.spawn(EditorEntity::Wall(WallEntity::new(room_id.clone(), index)))?;
        }
        for index in 0..count {
            self.spawn(EditorEntity::Point(PointEntity::new(room_id.clone(), index)))?;
        }
        self.editing_room = Some(room_id.clone());
        debug!(room = %room_id, vertices = count, "进入房间编辑");
        Ok(())
    }

    fn close_room_editing(&mut self) {
        if self.editing_room.take().is_none() {
            return;
        }
        let ws = &mut self.ws;
        self.entities.retain_mut(|entity| {
            if matches!(entity.kind(), EntityKind::Point | EntityKind::Wall) {
                entity.dispose(ws);
                false
            } else {
                true
            }
        });
        if self
            .capture
            .as_ref()
            .is_some_and(|(kind, _)| matches!(kind, EntityKind::Point | EntityKind::Wall))
        {
            self.capture = None;
        }
    }

    /// 重绘房间及其顶点、墙段。
    fn refresh_room(&mut self, room_id: &EntityId) -> Result<(), EngineError> {
        for entity in &mut self.entities {
            if entity.room_id() == Some(room_id) {
                entity.rerender(&mut self.ws)?;
            }
        }
        Ok(())
    }

    /// 处理指针按下。命中实体主体时先激活它，随后开始拖拽；未命中时清空选中。
    pub fn pointer_down(&mut self, input: &PointerInput) -> Result<Option<NodeOwner>, EngineError> {
        let Some(screen) = input.position() else {
            trace!("指针按下事件缺少坐标，忽略");
            return Ok(None);
        };
        let world = self.ws.view.to_world(screen);
        let Some(owner) = self.ws.canvas.hit_test(world).cloned() else {
            self.deactivate_all()?;
            return Ok(None);
        };
        if owner.part == Part::Body {
            self.set_active(owner.kind, &owner.id, true)?;
        }
        find_entity(&mut self.entities, owner.kind, &owner.id)?.pointer_down(
            &self.ws,
            owner.part,
            screen,
        )?;
        self.capture = Some((owner.kind, owner.id.clone()));
        Ok(Some(owner))
    }

    /// 转发拖拽中的移动，返回是否更新了几何。
    pub fn pointer_move(&mut self, input: &PointerInput) -> Result<bool, EngineError> {
        let Some(screen) = input.position() else {
            trace!("指针移动事件缺少坐标，忽略");
            return Ok(false);
        };
        let Some((kind, id)) = self.capture.clone() else {
            return Ok(false);
        };
        let (moved, room) = {
            let entity = find_entity(&mut self.entities, kind, &id)?;
            let moved = entity.pointer_move(&mut self.ws, screen)?;
            if moved {
                if let EditorEntity::Surface(surface) = &*entity {
                    self.snap_highlights = surface.alignment_candidates(&self.ws)?;
                }
            }
            (moved, entity.room_id().cloned())
        };
        if moved {
            if let Some(room) = room {
                self.refresh_room(&room)?;
            }
        }
        Ok(moved)
    }

    pub fn pointer_up(&mut self) -> Result<Option<DragRelease>, EngineError> {
        let Some((kind, id)) = self.capture.take() else {
            return Ok(None);
        };
        self.snap_highlights.clear();
        let release = find_entity(&mut self.entities, kind, &id)?.pointer_up(&mut self.ws)?;
        Ok(Some(release))
    }

    /// 帧回调：把本帧产生的 `Update` 合并成一次保存登记，再发出已到期的保存。
    pub fn tick(&mut self, now: Instant, persistence: &mut dyn FloorPlanPersistence) -> usize {
        if self.save_requested.replace(false) {
            self.queue_save(now);
        }
        self.scheduler.poll(now, persistence)
    }

    /// 以当前文档的深拷贝登记一次保存。
    pub fn queue_save(&mut self, now: Instant) -> bool {
        self.scheduler
            .queue(self.plan_id.clone(), self.ws.plan.clone(), now)
    }

    /// 立即写出待保存的数据（退出前调用）。
    pub fn flush(&mut self, persistence: &mut dyn FloorPlanPersistence) -> usize {
        if self.save_requested.replace(false) {
            self.queue_save(Instant::now());
        }
        self.scheduler.flush(persistence)
    }

    /// 关闭会话：取消未发出的保存并释放全部实体。
    pub fn shutdown(&mut self) -> usize {
        let cancelled = self.scheduler.shutdown();
        self.capture = None;
        self.editing_room = None;
        self.selection.clear();
        for mut entity in self.entities.drain(..) {
            entity.dispose(&mut self.ws);
        }
        cancelled
    }

    pub fn set_xy(
        &mut self,
        kind: EntityKind,
        id: &EntityId,
        x: f64,
        y: f64,
    ) -> Result<(), EngineError> {
        let entity = find_entity(&mut self.entities, kind, id)?;
        entity.set_xy(&mut self.ws, x, y)?;
        let room = entity.room_id().cloned();
        if let Some(room) = room {
            self.refresh_room(&room)?;
        }
        Ok(())
    }

    pub fn set_diameter(&mut self, id: &EntityId, diameter: f64) -> Result<(), EngineError> {
        match find_entity(&mut self.entities, EntityKind::Tree, id)? {
            EditorEntity::Tree(tree) => tree.set_diameter(&mut self.ws, diameter),
            _ => Err(missing(EntityKind::Tree, id)),
        }
    }

    pub fn set_width(&mut self, id: &EntityId, width: f64) -> Result<(), EngineError> {
        match find_entity(&mut self.entities, EntityKind::Opening, id)? {
            EditorEntity::Opening(opening) => opening.set_width(&mut self.ws, width),
            _ => Err(missing(EntityKind::Opening, id)),
        }
    }

    pub fn bring_to_front(&mut self, kind: EntityKind, id: &EntityId) -> Result<(), EngineError> {
        let node = find_entity(&mut self.entities, kind, id)?
            .node()
            .ok_or(EngineError::NodeNotFound)?;
        if self.ws.canvas.bring_to_front(node) {
            Ok(())
        } else {
            Err(EngineError::NodeNotFound)
        }
    }

    /// 在当前楼层添加树并激活。中心被限制在网格内。
    pub fn add_tree(&mut self, kind: TreeKind, x: f64, y: f64) -> Result<EntityId, EngineError> {
        let half_grid = self.ws.half_grid();
        let mut tree = Tree::new(kind, 0.0, 0.0);
        tree.set_diameter_clamped(tree.diameter, half_grid);
        tree.set_center_clamped(x, y, half_grid);
        let id = tree.tree_id.clone();
        self.ws.group_mut()?.trees.push(tree);
        self.added(EditorEntity::Tree(TreeEntity::new(id.clone())))?;
        Ok(id)
    }

    pub fn add_opening(
        &mut self,
        kind: OpeningKind,
        rotation: OpeningRotation,
        x: f64,
        y: f64,
    ) -> Result<EntityId, EngineError> {
        let half_grid = self.ws.half_grid();
        let mut opening = Opening::new(kind, x, y);
        opening.rotation = rotation;
        opening.clamp_to_grid(half_grid);
        let id = opening.opening_id.clone();
        self.ws.group_mut()?.openings.push(opening);
        self.added(EditorEntity::Opening(OpeningEntity::new(id.clone())))?;
        Ok(id)
    }

    /// `points` 为相对 `(x, y)` 的局部坐标，必须构成简单多边形。
    pub fn add_surface(
        &mut self,
        x: f64,
        y: f64,
        points: Vec<Point2>,
    ) -> Result<EntityId, EngineError> {
        if !is_simple_polygon(&points) {
            return Err(EngineError::InvalidPolygon);
        }
        let surface = Surface::new(x, y, points);
        let id = surface.surface_id.clone();
        self.ws.group_mut()?.surfaces.push(surface);
        self.added(EditorEntity::Surface(SurfaceEntity::new(id.clone())))?;
        Ok(id)
    }

    fn added(&mut self, entity: EditorEntity) -> Result<(), EngineError> {
        let kind = entity.kind();
        let id = entity.id().clone();
        self.spawn(entity)?;
        self.set_active(kind, &id, true)?;
        find_entity(&mut self.entities, kind, &id)?.emit(EntitySignal::Update);
        info!(kind = kind.slot_name(), id = %id, "已添加实体");
        Ok(())
    }
}
