use chrono::NaiveDate;
use glam::DVec2;
use homeplan_core::document::{EntityId, FloorPlan};
use homeplan_engine::signal::{Signals, SubscriptionId};
use tracing::{debug, info};

use crate::camera::{OrbitCamera, Ray};
use crate::environment::apply_foliage;
use crate::errors::ViewerError;
use crate::interaction::Interaction;
use crate::pipeline::{GenerateOptions, GeneratedScene, generate};
use crate::scene::{NodeCategory, SceneNodeId};
use crate::season::foliage_state;

/// 三维视图对外发出的信号。
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerSignal {
    /// 视图旋转角（度）变化。
    RotationChange(f64),
    /// 点选了房间。
    ChangeActiveRoom(EntityId),
}

/// 持有生成结果、相机、交互状态与信号的三维视图。
#[derive(Debug)]
pub struct Viewer {
    options: GenerateOptions,
    scene: GeneratedScene,
    camera: OrbitCamera,
    /// 相机取景后的基准方位角，旋转角在此基础上叠加。
    base_yaw: f64,
    rotation: f64,
    interaction: Interaction,
    signals: Signals<ViewerSignal>,
}

impl Viewer {
    pub fn new(plan: &FloorPlan, options: GenerateOptions) -> Result<Self, ViewerError> {
        let scene = generate(plan, &options)?;
        let mut camera = OrbitCamera::default();
        let top = plan
            .groups
            .iter()
            .map(|group| group.top())
            .fold(plan.lowest_elevation(), f64::max);
        camera.frame(&scene.bounds, plan.lowest_elevation(), top);
        let base_yaw = camera.yaw;
        let mut viewer = Self {
            options,
            scene,
            camera,
            base_yaw,
            rotation: 0.0,
            interaction: Interaction::new(),
            signals: Signals::new(),
        };
        viewer.apply_rotation(plan.appearance.rotation);
        Ok(viewer)
    }

    #[inline]
    pub fn scene(&self) -> &GeneratedScene {
        &self.scene
    }

    #[inline]
    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    #[inline]
    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    #[inline]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ViewerSignal) + 'static) -> SubscriptionId {
        self.signals.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.signals.unsubscribe(id)
    }

    /// 结构变化后整体重建。悬停与激活状态随旧节点一起作废。
    pub fn regenerate(&mut self, plan: &FloorPlan) -> Result<(), ViewerError> {
        self.scene = generate(plan, &self.options)?;
        self.interaction.reset();
        info!(nodes = self.scene.graph.len(), "三维场景已重建");
        Ok(())
    }

    /// 切换日期：只重新计算树冠颜色与可见性，不重建场景。
    pub fn set_date(&mut self, date: NaiveDate) {
        self.options.date = date;
        let foliage = foliage_state(date);
        let touched = apply_foliage(&mut self.scene.graph, foliage);
        self.scene.foliage = foliage;
        debug!(%date, visible = foliage.visible, nodes = touched, "季节状态已更新");
    }

    pub fn set_rotation(&mut self, degrees: f64) {
        self.apply_rotation(degrees);
        self.signals.emit(ViewerSignal::RotationChange(self.rotation));
    }

    fn apply_rotation(&mut self, degrees: f64) {
        self.rotation = degrees;
        self.camera.set_yaw(self.base_yaw + degrees);
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        if aspect.is_finite() && aspect > 0.0 {
            self.camera.aspect = aspect;
        }
    }

    /// 每帧调用：以指针的归一化设备坐标投射视线，返回悬停的房间。
    pub fn frame(&mut self, ndc: DVec2) -> Option<EntityId> {
        let ray = self.camera.ray(ndc);
        self.hover(&ray)
    }

    pub fn hover(&mut self, ray: &Ray) -> Option<EntityId> {
        let hovered = self.interaction.update_hover(&mut self.scene.graph, ray);
        hovered.and_then(|id| self.room_of(id))
    }

    pub fn pointer_down(&mut self) {
        self.interaction.pointer_down();
    }

    pub fn pointer_move(&mut self, delta: DVec2) {
        self.interaction.pointer_move(delta);
    }

    /// 按下与抬起之间没有移动时激活悬停的房间，并发出 `ChangeActiveRoom`。
    pub fn pointer_up(&mut self) -> Option<EntityId> {
        let node = self.interaction.pointer_up()?;
        let room_id = self.room_of(node)?;
        info!(room = %room_id, "三维视图中选中房间");
        self.signals
            .emit(ViewerSignal::ChangeActiveRoom(room_id.clone()));
        Some(room_id)
    }

    pub fn active_room(&self) -> Option<EntityId> {
        self.interaction
            .active()
            .and_then(|id| self.room_of(id))
    }

    fn room_of(&self, id: SceneNodeId) -> Option<EntityId> {
        match &self.scene.graph.node(id)?.category {
            NodeCategory::Room { room_id } => Some(room_id.clone()),
            _ => None,
        }
    }
}
