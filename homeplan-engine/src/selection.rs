use homeplan_core::document::EntityId;
use tracing::debug;

/// 画布实体种类，每种对应选中记录中的一个槽位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Point,
    Wall,
    Opening,
    Surface,
    Tree,
    Room,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Point,
        EntityKind::Wall,
        EntityKind::Opening,
        EntityKind::Surface,
        EntityKind::Tree,
        EntityKind::Room,
    ];

    pub fn slot_name(self) -> &'static str {
        match self {
            EntityKind::Point => "active_point_entity",
            EntityKind::Wall => "active_wall_entity",
            EntityKind::Opening => "active_opening_entity",
            EntityKind::Surface => "active_surface_entity",
            EntityKind::Tree => "active_tree_entity",
            EntityKind::Room => "active_room_entity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEntity {
    pub kind: EntityKind,
    pub id: EntityId,
}

/// 编辑会话内唯一的选中记录。任意时刻所有种类合计至多一个槽位有值。
#[derive(Debug, Default)]
pub struct SelectionManager {
    active: Option<ActiveEntity>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn active(&self) -> Option<&ActiveEntity> {
        self.active.as_ref()
    }

    /// 指定种类槽位中的实体。
    pub fn slot(&self, kind: EntityKind) -> Option<&EntityId> {
        self.active
            .as_ref()
            .filter(|active| active.kind == kind)
            .map(|active| &active.id)
    }

    pub fn is_active(&self, kind: EntityKind, id: &EntityId) -> bool {
        self.slot(kind).is_some_and(|current| current == id)
    }

    #[inline]
    pub fn populated_slots(&self) -> usize {
        EntityKind::ALL
            .iter()
            .filter(|kind| self.slot(**kind).is_some())
            .count()
    }

    /// 填充 `kind` 槽位。若其它实体仍占用槽位，会先被清除并返回，
    /// 调用方应已对其完成停用（发出 inactivate）。
    pub fn activate(&mut self, kind: EntityKind, id: EntityId) -> Option<ActiveEntity> {
        let displaced = self.active.take();
        debug!(slot = kind.slot_name(), id = %id, "激活实体");
        self.active = Some(ActiveEntity { kind, id });
        displaced
    }

    /// 清空 `kind` 槽位，返回原先占用者。
    pub fn deactivate(&mut self, kind: EntityKind) -> Option<EntityId> {
        if self.active.as_ref().is_some_and(|active| active.kind == kind) {
            let previous = self.active.take().map(|active| active.id);
            if let Some(id) = &previous {
                debug!(slot = kind.slot_name(), id = %id, "停用实体");
            }
            previous
        } else {
            None
        }
    }

    pub fn clear(&mut self) -> Option<ActiveEntity> {
        self.active.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activating_another_kind_displaces_previous() {
        let mut selection = SelectionManager::new();
        let tree = EntityId::new("tree-1");
        let opening = EntityId::new("opening-1");

        assert!(selection.activate(EntityKind::Tree, tree.clone()).is_none());
        assert_eq!(selection.slot(EntityKind::Tree), Some(&tree));

        let displaced = selection
            .activate(EntityKind::Opening, opening.clone())
            .expect("tree should be displaced");
        assert_eq!(displaced.kind, EntityKind::Tree);
        assert!(selection.slot(EntityKind::Tree).is_none());
        assert_eq!(selection.slot(EntityKind::Opening), Some(&opening));
        assert_eq!(selection.populated_slots(), 1);
    }

    #[test]
    fn deactivate_only_clears_matching_slot() {
        let mut selection = SelectionManager::new();
        selection.activate(EntityKind::Room, EntityId::new("room"));
        assert!(selection.deactivate(EntityKind::Tree).is_none());
        assert_eq!(selection.populated_slots(), 1);
        assert_eq!(
            selection.deactivate(EntityKind::Room),
            Some(EntityId::new("room"))
        );
        assert_eq!(selection.populated_slots(), 0);
    }
}
