use std::cell::RefCell;
use std::rc::Rc;

use homeplan_core::document::{EntityId, Room};
use homeplan_core::geometry::{Point2, polygon_centroid};
use homeplan_engine::EditorSession;
use homeplan_viewer::camera::Ray;
use homeplan_viewer::{Viewer, ViewerSignal};
use tracing::debug;

use crate::errors::FrontendError;

/// 点选视线的起点高度，高于任何楼层与屋顶。
const PICK_HEIGHT: f64 = 10_000.0;

/// 收集三维视图发出的房间点选，交给编辑会话激活。
#[derive(Debug, Default)]
pub struct RoomPicks {
    pending: Rc<RefCell<Vec<EntityId>>>,
}

impl RoomPicks {
    /// 订阅 `viewer` 的 `ChangeActiveRoom`。
    pub fn attach(viewer: &mut Viewer) -> Self {
        let pending = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&pending);
        viewer.subscribe(move |signal| {
            if let ViewerSignal::ChangeActiveRoom(room) = signal {
                sink.borrow_mut().push(room.clone());
            }
        });
        Self { pending }
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// 按顺序激活收集到的房间，返回最后激活的一个。
    pub fn apply(&self, session: &mut EditorSession) -> Result<Option<EntityId>, FrontendError> {
        let picks: Vec<EntityId> = self.pending.borrow_mut().drain(..).collect();
        let mut last = None;
        for room in picks {
            session.activate_room(&room)?;
            debug!(room = %room, group = session.group_index(), "三维点选已回传编辑会话");
            last = Some(room);
        }
        Ok(last)
    }
}

/// 房间内部用于点选的平面点：重心与第一条边中点的中点，避开矩形剖分的对角线。
pub fn pick_point(room: &Room) -> Option<Point2> {
    let points = room.world_points();
    let centroid = polygon_centroid(&points)?;
    let (first, second) = (points.first()?, points.get(1)?);
    let edge_mid = (first.as_vec2() + second.as_vec2()) * 0.5;
    Some(Point2::from_vec((centroid.as_vec2() + edge_mid) * 0.5))
}

/// 在三维视图中单击房间上方：悬停、按下、不移动直接抬起。
/// 返回视图实际选中的房间，上层楼板可能挡住下层房间。
pub fn click_room(viewer: &mut Viewer, room: &Room) -> Option<EntityId> {
    let point = pick_point(room)?;
    viewer.hover(&Ray::vertical(point, PICK_HEIGHT))?;
    viewer.pointer_down();
    viewer.pointer_up()
}

#[cfg(test)]
mod tests {
    use homeplan_engine::EditorSettings;
    use homeplan_engine::demo::sample_home;
    use homeplan_engine::selection::EntityKind;
    use homeplan_engine::signal::EntitySignal;
    use homeplan_viewer::GenerateOptions;

    use super::*;

    fn editor_and_viewer() -> (EditorSession, Viewer) {
        let session =
            EditorSession::new(sample_home(), EditorSettings::default()).expect("session");
        let viewer = Viewer::new(session.plan(), GenerateOptions::default()).expect("viewer");
        (session, viewer)
    }

    #[test]
    fn scene_click_activates_room_in_editor() {
        let (mut session, mut viewer) = editor_and_viewer();
        let picks = RoomPicks::attach(&mut viewer);
        let ground = session.plan().groups[0].clone();
        let kitchen = ground.rooms[1].clone();
        let tree = ground.trees[0].tree_id.clone();

        let log = Rc::new(RefCell::new(Vec::new()));
        for (kind, id, label) in [
            (EntityKind::Tree, &tree, "tree"),
            (EntityKind::Room, &kitchen.room_id, "room"),
        ] {
            let sink = Rc::clone(&log);
            session
                .subscribe(kind, id, move |signal: &EntitySignal| {
                    sink.borrow_mut().push((label, *signal))
                })
                .expect("subscribe");
        }
        session
            .set_active(EntityKind::Tree, &tree, true)
            .expect("activate tree");
        log.borrow_mut().clear();

        assert_eq!(click_room(&mut viewer, &kitchen), Some(kitchen.room_id.clone()));
        assert_eq!(picks.pending(), 1);
        assert_eq!(
            picks.apply(&mut session).expect("apply"),
            Some(kitchen.room_id.clone())
        );
        assert_eq!(picks.pending(), 0);

        let active = session.selection().active().expect("active entity");
        assert_eq!(active.kind, EntityKind::Room);
        assert_eq!(active.id, kitchen.room_id);
        assert_eq!(session.selection().populated_slots(), 1);

        let log = log.borrow();
        let inactivate = log
            .iter()
            .position(|entry| *entry == ("tree", EntitySignal::Inactivate))
            .expect("tree inactivated");
        let activate = log
            .iter()
            .position(|entry| *entry == ("room", EntitySignal::Activate))
            .expect("room activated");
        assert!(inactivate < activate);
    }

    #[test]
    fn upper_floor_click_switches_editor_group() {
        let (mut session, mut viewer) = editor_and_viewer();
        let picks = RoomPicks::attach(&mut viewer);
        let living = session.plan().groups[0].rooms[0].clone();
        let bedroom = session.plan().groups[1].rooms[0].room_id.clone();

        // 客厅正上方是卧室楼板
        assert_eq!(click_room(&mut viewer, &living), Some(bedroom.clone()));
        picks.apply(&mut session).expect("apply");
        assert_eq!(session.group_index(), 1);
        assert_eq!(session.selection().slot(EntityKind::Room), Some(&bedroom));
    }

    #[test]
    fn dragging_the_camera_selects_nothing() {
        let (mut session, mut viewer) = editor_and_viewer();
        let picks = RoomPicks::attach(&mut viewer);
        let kitchen = session.plan().groups[0].rooms[1].clone();
        let point = pick_point(&kitchen).expect("pick point");

        assert!(viewer.hover(&Ray::vertical(point, PICK_HEIGHT)).is_some());
        viewer.pointer_down();
        viewer.pointer_move(glam::DVec2::new(8.0, 0.0));
        assert_eq!(viewer.pointer_up(), None);
        assert_eq!(picks.apply(&mut session).expect("apply"), None);
        assert!(session.selection().active().is_none());
    }

    #[test]
    fn pick_point_lies_inside_room_off_the_diagonals() {
        let kitchen = sample_home().data.groups[0].rooms[1].clone();
        let point = pick_point(&kitchen).expect("pick point");
        assert!(point.distance(Point2::new(84.0, -132.0)) < 1e-9);
    }
}
