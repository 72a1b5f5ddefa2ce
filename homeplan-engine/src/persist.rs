use std::collections::HashMap;
use std::time::{Duration, Instant};

use homeplan_core::document::FloorPlan;
use homeplan_core::store::{FloorPlanId, FloorPlanPersistence};
use tracing::{debug, info, warn};

pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug)]
struct PendingSave {
    due: Instant,
    data: FloorPlan,
}

/// 按平面图标识做尾沿防抖的保存调度器，每个编辑会话持有一个。
///
/// 同一标识的新请求会替换尚未到期的旧请求并重新计时；不同标识互不影响。
/// 调度器不自行计时，由宿主在每帧调用 [`SaveScheduler::poll`]。
#[derive(Debug)]
pub struct SaveScheduler {
    delay: Duration,
    pending: HashMap<FloorPlanId, PendingSave>,
    shut_down: bool,
}

impl SaveScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
            shut_down: false,
        }
    }

    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &FloorPlanId) -> bool {
        self.pending.contains_key(id)
    }

    /// 登记一次保存。`data` 是调用时刻的深拷贝快照。关闭后返回 `false`。
    pub fn queue(&mut self, id: FloorPlanId, data: FloorPlan, now: Instant) -> bool {
        if self.shut_down {
            warn!(floor_plan = %id, "调度器已关闭，忽略保存请求");
            return false;
        }
        let due = now + self.delay;
        let replaced = self
            .pending
            .insert(id.clone(), PendingSave { due, data })
            .is_some();
        debug!(floor_plan = %id, replaced, "已登记保存请求");
        true
    }

    /// 发出所有已到期的保存，返回发出的请求数。失败只记录日志，不重试。
    pub fn poll(&mut self, now: Instant, persistence: &mut dyn FloorPlanPersistence) -> usize {
        let mut due: Vec<FloorPlanId> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.due <= now)
            .map(|(id, _)| id.clone())
            .collect();
        due.sort();
        self.dispatch(due, persistence)
    }

    /// 立即发出全部待保存请求。
    pub fn flush(&mut self, persistence: &mut dyn FloorPlanPersistence) -> usize {
        let mut all: Vec<FloorPlanId> = self.pending.keys().cloned().collect();
        all.sort();
        self.dispatch(all, persistence)
    }

    pub fn cancel(&mut self, id: &FloorPlanId) -> bool {
        self.pending.remove(id).is_some()
    }

    /// 取消全部待保存请求并拒绝后续登记，返回被取消的数量。
    pub fn shutdown(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        self.shut_down = true;
        info!(cancelled, "保存调度器已关闭");
        cancelled
    }

    fn dispatch(
        &mut self,
        ids: Vec<FloorPlanId>,
        persistence: &mut dyn FloorPlanPersistence,
    ) -> usize {
        let mut sent = 0;
        for id in ids {
            let Some(pending) = self.pending.remove(&id) else {
                continue;
            };
            sent += 1;
            match persistence.update(&id, pending.data) {
                Ok(()) => debug!(floor_plan = %id, "已发出保存请求"),
                Err(err) => warn!(floor_plan = %id, error = %err, "保存失败"),
            }
        }
        sent
    }
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use homeplan_core::document::Group;
    use homeplan_core::store::StoreError;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<(FloorPlanId, FloorPlan)>,
    }

    impl FloorPlanPersistence for Recorder {
        fn update(&mut self, id: &FloorPlanId, data: FloorPlan) -> Result<(), StoreError> {
            self.updates.push((id.clone(), data));
            Ok(())
        }
    }

    fn plan_with_elevation(elevation: f64) -> FloorPlan {
        let mut plan = FloorPlan::default();
        plan.groups.push(Group::new(elevation, 96.0));
        plan
    }

    #[test]
    fn burst_of_requests_results_in_single_update_with_last_snapshot() {
        let mut scheduler = SaveScheduler::default();
        let mut recorder = Recorder::default();
        let id = FloorPlanId::new("plan-1");
        let start = Instant::now();

        for step in 0..10u32 {
            let now = start + Duration::from_millis(u64::from(step) * 30);
            scheduler.queue(id.clone(), plan_with_elevation(f64::from(step)), now);
            assert_eq!(scheduler.poll(now, &mut recorder), 0);
        }

        let last = start + Duration::from_millis(270);
        assert_eq!(
            scheduler.poll(last + Duration::from_millis(299), &mut recorder),
            0
        );
        assert_eq!(
            scheduler.poll(last + DEFAULT_SAVE_DELAY, &mut recorder),
            1
        );
        assert_eq!(
            scheduler.poll(last + Duration::from_secs(5), &mut recorder),
            0
        );

        assert_eq!(recorder.updates.len(), 1);
        let (saved_id, data) = &recorder.updates[0];
        assert_eq!(saved_id, &id);
        assert_eq!(data.groups[0].elevation, 9.0);
    }

    #[test]
    fn different_plans_debounce_independently() {
        let mut scheduler = SaveScheduler::default();
        let mut recorder = Recorder::default();
        let start = Instant::now();
        scheduler.queue(FloorPlanId::new("a"), plan_with_elevation(0.0), start);
        scheduler.queue(
            FloorPlanId::new("b"),
            plan_with_elevation(1.0),
            start + Duration::from_millis(200),
        );

        assert_eq!(
            scheduler.poll(start + Duration::from_millis(300), &mut recorder),
            1
        );
        assert_eq!(recorder.updates[0].0.as_str(), "a");
        assert!(scheduler.is_pending(&FloorPlanId::new("b")));
        assert_eq!(
            scheduler.poll(start + Duration::from_millis(500), &mut recorder),
            1
        );
    }

    #[test]
    fn shutdown_cancels_pending_and_rejects_new_requests() {
        let mut scheduler = SaveScheduler::default();
        let mut recorder = Recorder::default();
        let start = Instant::now();
        scheduler.queue(FloorPlanId::new("a"), FloorPlan::default(), start);
        scheduler.queue(FloorPlanId::new("b"), FloorPlan::default(), start);

        assert_eq!(scheduler.shutdown(), 2);
        assert!(!scheduler.queue(FloorPlanId::new("a"), FloorPlan::default(), start));
        assert_eq!(
            scheduler.poll(start + Duration::from_secs(1), &mut recorder),
            0
        );
        assert!(recorder.updates.is_empty());
    }

    #[test]
    fn flush_sends_everything_immediately() {
        let mut scheduler = SaveScheduler::default();
        let mut recorder = Recorder::default();
        scheduler.queue(FloorPlanId::new("a"), FloorPlan::default(), Instant::now());
        assert_eq!(scheduler.flush(&mut recorder), 1);
        assert_eq!(scheduler.pending_len(), 0);
    }
}
