//! 画布实体：统一的渲染生命周期、拖拽协议与激活协议。
//!
//! 每种实体只需提供绘制、快照与几何更新；信号发射、重绘与拖拽状态由
//! [`CanvasEntity`] 的默认方法统一处理。

use homeplan_core::document::{EntityId, FloorPlan, Group};
use homeplan_core::geometry::{Point2, Vector2};

use crate::canvas::{Canvas, NodeId, NodeOwner, Part, Shape};
use crate::drag::{DragRelease, DragTracker};
use crate::errors::EngineError;
use crate::selection::EntityKind;
use crate::session::{EditorSettings, ViewTransform};
use crate::signal::{EntitySignal, Signals, SubscriptionId};

mod opening;
mod room;
mod surface;
mod tree;

pub use opening::{OpeningEntity, OpeningSnapshot};
pub use room::{PointEntity, RoomEntity, WallEntity};
pub use surface::{ALIGNMENT_TOLERANCE, SurfaceEntity};
pub use tree::{TreeEntity, TreeSnapshot};

pub(crate) const ACTIVE_STROKE: &str = "#1e88e5";
pub(crate) const IDLE_STROKE: &str = "#424242";
/// 手柄在屏幕上的边长（像素）。
pub(crate) const HANDLE_SCREEN_SIZE: f64 = 10.0;

/// 实体操作所需的共享状态：文档、当前楼层、画布与视图参数。
#[derive(Debug)]
pub struct Workspace {
    pub plan: FloorPlan,
    pub group: usize,
    pub canvas: Canvas,
    pub settings: EditorSettings,
    pub view: ViewTransform,
    /// 交互实体挂载的图层。
    pub layer: NodeId,
}

impl Workspace {
    pub fn group(&self) -> Result<&Group, EngineError> {
        self.plan
            .group(self.group)
            .ok_or(EngineError::GroupNotFound(self.group))
    }

    pub fn group_mut(&mut self) -> Result<&mut Group, EngineError> {
        let index = self.group;
        self.plan
            .group_mut(index)
            .ok_or(EngineError::GroupNotFound(index))
    }

    #[inline]
    pub fn half_grid(&self) -> f64 {
        self.settings.half_grid()
    }

    /// 手柄在平面坐标下的边长，使其屏幕尺寸不随缩放变化。
    #[inline]
    pub fn handle_size(&self) -> f64 {
        HANDLE_SCREEN_SIZE / self.view.effective_scale()
    }
}

pub(crate) fn missing(kind: EntityKind, id: &EntityId) -> EngineError {
    EngineError::EntityNotFound {
        kind,
        id: id.to_string(),
    }
}

/// 按步长吸附；步长非正时原样返回。
pub fn snap(value: f64, step: f64) -> f64 {
    if step > 0.0 && step.is_finite() {
        (value / step).round() * step
    } else {
        value
    }
}

/// 与 `f64::clamp` 相同，但区间为空（`lo > hi`）时取中点而非 panic。
pub fn clamp_range(value: f64, lo: f64, hi: f64) -> f64 {
    if lo > hi {
        (lo + hi) * 0.5
    } else {
        value.clamp(lo, hi)
    }
}

/// 实体的公共状态。
#[derive(Debug)]
pub struct EntityBase<S> {
    id: EntityId,
    kind: EntityKind,
    node: Option<NodeId>,
    signals: Signals<EntitySignal>,
    drag: DragTracker<S>,
    grabbed: Part,
    active: bool,
    disposed: bool,
}

impl<S: Clone> EntityBase<S> {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self {
            id,
            kind,
            node: None,
            signals: Signals::new(),
            drag: DragTracker::new(),
            grabbed: Part::Body,
            active: false,
            disposed: false,
        }
    }

    #[inline]
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[inline]
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[inline]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    #[inline]
    pub fn signals_mut(&mut self) -> &mut Signals<EntitySignal> {
        &mut self.signals
    }

    pub fn owner(&self, part: Part) -> NodeOwner {
        NodeOwner {
            kind: self.kind,
            id: self.id.clone(),
            part,
        }
    }

    fn ensure_alive(&self) -> Result<(), EngineError> {
        if self.disposed {
            Err(EngineError::Disposed(self.id.to_string()))
        } else {
            Ok(())
        }
    }
}

pub trait CanvasEntity {
    /// 拖拽开始时记录的几何快照。
    type Snapshot: Clone;

    fn base(&self) -> &EntityBase<Self::Snapshot>;
    fn base_mut(&mut self) -> &mut EntityBase<Self::Snapshot>;

    /// 可以按下并拖拽的部件。
    fn drag_parts(&self) -> &'static [Part] {
        &[Part::Body]
    }

    /// 在 `node` 下构建可视子树。
    fn draw(&self, ws: &mut Workspace, node: NodeId) -> Result<(), EngineError>;

    fn snapshot(&self, ws: &Workspace) -> Result<Self::Snapshot, EngineError>;

    /// 依据拖拽前快照与位移（平面单位）更新文档中的几何。
    fn apply_drag(
        &mut self,
        ws: &mut Workspace,
        part: Part,
        snapshot: &Self::Snapshot,
        delta: Vector2,
    ) -> Result<(), EngineError>;

    fn move_to(&mut self, ws: &mut Workspace, x: f64, y: f64) -> Result<(), EngineError>;

    /// 指针抬起时总会调用的清理钩子。
    fn end_drag(&mut self, _ws: &mut Workspace) {}

    fn on_activate(&mut self, _ws: &mut Workspace) -> Result<(), EngineError> {
        Ok(())
    }

    fn render(&mut self, ws: &mut Workspace, parent: NodeId) -> Result<NodeId, EngineError> {
        self.render_at(ws, parent, usize::MAX)
    }

    /// 在 `parent` 的第 `index` 个位置渲染。已渲染时直接返回现有节点。
    fn render_at(
        &mut self,
        ws: &mut Workspace,
        parent: NodeId,
        index: usize,
    ) -> Result<NodeId, EngineError> {
        self.base().ensure_alive()?;
        if let Some(node) = self.base().node.filter(|node| ws.canvas.contains(*node)) {
            return Ok(node);
        }
        let node = ws.canvas.insert(parent, index, Shape::Group, None)?;
        if let Err(err) = self.draw(ws, node) {
            ws.canvas.remove(node);
            return Err(err);
        }
        self.base_mut().node = Some(node);
        self.base_mut().signals.emit(EntitySignal::Render);
        Ok(node)
    }

    /// 销毁并在原位置重建可视子树。挂在实体上的监听者保持不变。
    fn rerender(&mut self, ws: &mut Workspace) -> Result<NodeId, EngineError> {
        self.base().ensure_alive()?;
        let layer = ws.layer;
        let (parent, index) = match self.base_mut().node.take() {
            Some(node) => ws.canvas.remove(node).unwrap_or((layer, usize::MAX)),
            None => (layer, usize::MAX),
        };
        self.render_at(ws, parent, index)
    }

    /// 移除可视子树与全部监听者。之后的任何操作都会返回 `Disposed`。
    fn dispose(&mut self, ws: &mut Workspace) {
        let base = self.base_mut();
        if base.disposed {
            return;
        }
        if let Some(node) = base.node.take() {
            ws.canvas.remove(node);
        }
        base.drag.cancel();
        base.signals.clear();
        base.active = false;
        base.disposed = true;
    }

    fn pointer_down(
        &mut self,
        ws: &Workspace,
        part: Part,
        mouse: Point2,
    ) -> Result<(), EngineError> {
        self.base().ensure_alive()?;
        if !self.drag_parts().contains(&part) {
            return Err(EngineError::UnsupportedPart(part));
        }
        let snapshot = self.snapshot(ws)?;
        let base = self.base_mut();
        base.grabbed = part;
        base.drag.press(mouse, snapshot);
        Ok(())
    }

    /// 返回本次移动是否更新了几何。
    fn pointer_move(&mut self, ws: &mut Workspace, mouse: Point2) -> Result<bool, EngineError> {
        self.base().ensure_alive()?;
        let scale = ws.view.effective_scale();
        let step = {
            let base = self.base_mut();
            base.drag.advance(mouse, scale, &mut base.signals)
        };
        let Some(step) = step else {
            return Ok(false);
        };
        let part = self.base().grabbed;
        self.apply_drag(ws, part, &step.snapshot, step.delta)?;
        self.base_mut().signals.emit(EntitySignal::LesserUpdate);
        self.rerender(ws)?;
        Ok(true)
    }

    fn pointer_up(&mut self, ws: &mut Workspace) -> Result<DragRelease, EngineError> {
        if self.base().disposed {
            return Ok(DragRelease { moved: false });
        }
        let release = {
            let base = self.base_mut();
            base.drag.release(&mut base.signals)
        };
        self.end_drag(ws);
        if release.moved {
            self.base_mut().signals.emit(EntitySignal::Update);
        }
        Ok(release)
    }

    /// 单步移动，立即触发持久化。
    fn set_xy(&mut self, ws: &mut Workspace, x: f64, y: f64) -> Result<(), EngineError> {
        self.base().ensure_alive()?;
        self.move_to(ws, x, y)?;
        self.rerender(ws)?;
        self.base_mut().signals.emit(EntitySignal::Update);
        Ok(())
    }

    /// 只切换本实体的激活标记与信号；跨实体互斥由会话保证。
    fn mark_active(&mut self, ws: &mut Workspace, active: bool) -> Result<(), EngineError> {
        self.base().ensure_alive()?;
        if self.base().active == active {
            return Ok(());
        }
        self.base_mut().active = active;
        if active {
            self.on_activate(ws)?;
            self.base_mut().signals.emit(EntitySignal::Activate);
        } else {
            self.base_mut().signals.emit(EntitySignal::Inactivate);
        }
        self.rerender(ws)?;
        Ok(())
    }
}

/// 会话持有的实体，按种类静态分发。
#[derive(Debug)]
pub enum EditorEntity {
    Room(RoomEntity),
    Point(PointEntity),
    Wall(WallEntity),
    Opening(OpeningEntity),
    Surface(SurfaceEntity),
    Tree(TreeEntity),
}

macro_rules! dispatch {
    ($value:expr, $entity:ident => $body:expr) => {
        match $value {
            EditorEntity::Room($entity) => $body,
            EditorEntity::Point($entity) => $body,
            EditorEntity::Wall($entity) => $body,
            EditorEntity::Opening($entity) => $body,
            EditorEntity::Surface($entity) => $body,
            EditorEntity::Tree($entity) => $body,
        }
    };
}

impl EditorEntity {
    pub fn id(&self) -> &EntityId {
        dispatch!(self, entity => entity.base().id())
    }

    pub fn kind(&self) -> EntityKind {
        dispatch!(self, entity => entity.base().kind())
    }

    pub fn node(&self) -> Option<NodeId> {
        dispatch!(self, entity => entity.base().node())
    }

    pub fn is_active(&self) -> bool {
        dispatch!(self, entity => entity.base().is_active())
    }

    pub fn is_dragging(&self) -> bool {
        dispatch!(self, entity => entity.base().is_dragging())
    }

    pub fn is_disposed(&self) -> bool {
        dispatch!(self, entity => entity.base().is_disposed())
    }

    pub fn matches(&self, kind: EntityKind, id: &EntityId) -> bool {
        self.kind() == kind && self.id() == id
    }

    /// 房间及其顶点、墙段所属的房间。
    pub fn room_id(&self) -> Option<&EntityId> {
        match self {
            EditorEntity::Room(room) => Some(room.base().id()),
            EditorEntity::Point(point) => Some(point.room_id()),
            EditorEntity::Wall(wall) => Some(wall.room_id()),
            _ => None,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&EntitySignal) + 'static) -> SubscriptionId {
        dispatch!(self, entity => entity.base_mut().signals_mut().subscribe(listener))
    }

    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        dispatch!(self, entity => entity.base_mut().signals_mut().unsubscribe(subscription))
    }

    pub fn emit(&mut self, signal: EntitySignal) {
        dispatch!(self, entity => entity.base_mut().signals_mut().emit(signal))
    }

    pub fn render(&mut self, ws: &mut Workspace, parent: NodeId) -> Result<NodeId, EngineError> {
        dispatch!(self, entity => entity.render(ws, parent))
    }

    pub fn rerender(&mut self, ws: &mut Workspace) -> Result<NodeId, EngineError> {
        dispatch!(self, entity => entity.rerender(ws))
    }

    pub fn dispose(&mut self, ws: &mut Workspace) {
        dispatch!(self, entity => entity.dispose(ws))
    }

    pub fn pointer_down(
        &mut self,
        ws: &Workspace,
        part: Part,
        mouse: Point2,
    ) -> Result<(), EngineError> {
        dispatch!(self, entity => entity.pointer_down(ws, part, mouse))
    }

    pub fn pointer_move(&mut self, ws: &mut Workspace, mouse: Point2) -> Result<bool, EngineError> {
        dispatch!(self, entity => entity.pointer_move(ws, mouse))
    }

    pub fn pointer_up(&mut self, ws: &mut Workspace) -> Result<DragRelease, EngineError> {
        dispatch!(self, entity => entity.pointer_up(ws))
    }

    pub fn set_xy(&mut self, ws: &mut Workspace, x: f64, y: f64) -> Result<(), EngineError> {
        dispatch!(self, entity => entity.set_xy(ws, x, y))
    }

    pub fn mark_active(&mut self, ws: &mut Workspace, active: bool) -> Result<(), EngineError> {
        dispatch!(self, entity => entity.mark_active(ws, active))
    }
}
