use homeplan_core::geometry::{Point2, Vector2};
use tracing::debug;

use crate::signal::{EntitySignal, Signals};

/// 拖拽状态机：`Idle -> Pressed -> Dragging -> Idle`。
#[derive(Debug, Clone)]
pub enum DragState<S> {
    Idle,
    /// 已按下但尚未移动。
    Pressed {
        /// 按下时的屏幕坐标。
        start: Point2,
        /// 拖拽前的几何快照。
        snapshot: S,
    },
    Dragging {
        start: Point2,
        snapshot: S,
    },
}

/// 单次移动的结果：快照与换算到平面单位的位移。
#[derive(Debug, Clone)]
pub struct DragMove<S> {
    pub snapshot: S,
    pub delta: Vector2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragRelease {
    /// 按下后是否发生过移动。
    pub moved: bool,
}

/// 各实体共用的拖拽协议实现，快照类型由实体种类决定。
#[derive(Debug, Clone)]
pub struct DragTracker<S> {
    state: DragState<S>,
}

impl<S: Clone> DragTracker<S> {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> &DragState<S> {
        &self.state
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        matches!(self.state, DragState::Idle)
    }

    #[inline]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// 记录起点与快照。
    pub fn press(&mut self, mouse: Point2, snapshot: S) {
        self.state = DragState::Pressed {
            start: mouse,
            snapshot,
        };
    }

    /// 处理一次指针移动。按下后的第一次移动发出且仅发出一次 `DragStart`。
    /// 位移按视图缩放换算：`(mouse - start) / scale`。
    pub fn advance(
        &mut self,
        mouse: Point2,
        scale: f64,
        signals: &mut Signals<EntitySignal>,
    ) -> Option<DragMove<S>> {
        let (start, snapshot) = match &self.state {
            DragState::Idle => return None,
            DragState::Pressed { start, snapshot } => {
                let (start, snapshot) = (*start, snapshot.clone());
                self.state = DragState::Dragging {
                    start,
                    snapshot: snapshot.clone(),
                };
                debug!("拖拽开始");
                signals.emit(EntitySignal::DragStart);
                (start, snapshot)
            }
            DragState::Dragging { start, snapshot } => (*start, snapshot.clone()),
        };
        let scale = if scale.is_finite() && scale > f64::EPSILON {
            scale
        } else {
            1.0
        };
        let delta = start.vector_to(mouse).scale(1.0 / scale);
        Some(DragMove { snapshot, delta })
    }

    /// 结束拖拽并回到 `Idle`；若发生过移动则发出 `DragStop`。
    pub fn release(&mut self, signals: &mut Signals<EntitySignal>) -> DragRelease {
        let previous = std::mem::replace(&mut self.state, DragState::Idle);
        let moved = matches!(previous, DragState::Dragging { .. });
        if moved {
            debug!("拖拽结束");
            signals.emit(EntitySignal::DragStop);
        }
        DragRelease { moved }
    }

    /// 直接回到 `Idle`，不发任何信号（实体释放时使用）。
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

impl<S: Clone> Default for DragTracker<S> {
    fn default() -> Self {
        Self::new()
    }
}
