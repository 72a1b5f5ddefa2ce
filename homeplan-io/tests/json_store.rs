use std::fs;

use homeplan_core::document::{FloorPlan, FloorPlanDocument, Group, OpeningKind, TreeKind};
use homeplan_core::store::{FloorPlanCache, FloorPlanId, FloorPlanPersistence, StoreError};
use homeplan_io::{IoError, JsonStore};

const MINIMAL: &str = r#"{
    "floor_plan_id": "ignored",
    "name": "cabin",
    "data": {
        "groups": [{
            "elevation": 0,
            "height": 96,
            "rooms": [{
                "x": 0, "y": 0,
                "points": [[0, 0], [120, 0], [120, 96], [0, 96]]
            }],
            "openings": [{ "x": 60, "y": 0 }],
            "trees": [{ "x": 300, "y": 40 }]
        }]
    }
}"#;

#[test]
fn load_applies_documented_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("cabin.json"), MINIMAL).expect("seed");
    let store = JsonStore::new(dir.path());

    let document = store.load(&FloorPlanId::new("cabin")).expect("load");
    assert_eq!(document.floor_plan_id.as_str(), "cabin");
    assert_eq!(document.name, "cabin");
    assert_eq!(document.data.appearance.ground_color, "#4a7c2f");

    let group = &document.data.groups[0];
    assert!(!group.group_id.as_str().is_empty());
    assert!(!group.rooms[0].room_id.as_str().is_empty());
    assert_eq!(group.openings[0].kind, OpeningKind::Empty);
    assert_eq!(group.openings[0].width, 36.0);
    assert_eq!(group.openings[0].height, 78.0);
    assert_eq!(group.trees[0].kind, TreeKind::Round);
    assert_eq!(group.trees[0].diameter, 120.0);
    assert_eq!(group.rooms[0].area(), 120.0 * 96.0);
}

#[test]
fn update_rewrites_data_and_keeps_name() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("cabin.json"), MINIMAL).expect("seed");
    let mut store = JsonStore::new(dir.path());
    let id = FloorPlanId::new("cabin");

    let mut data = store.load(&id).expect("load").data;
    data.groups[0].trees[0].x = 250.0;
    data.groups.push(Group::new(96.0, 96.0));
    store.update(&id, data).expect("update");

    let reloaded = store.load(&id).expect("reload");
    assert_eq!(reloaded.name, "cabin");
    assert_eq!(reloaded.data.groups.len(), 2);
    assert_eq!(reloaded.data.groups[0].trees[0].x, 250.0);
    assert!(!dir.path().join("cabin.json.tmp").exists());
}

#[test]
fn update_creates_missing_document() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = JsonStore::new(dir.path().join("nested"));
    let id = FloorPlanId::new("fresh");
    store.update(&id, FloorPlan::default()).expect("update");
    assert_eq!(store.list().expect("list"), vec![id.clone()]);
    assert!(store.load(&id).expect("load").data.groups.is_empty());
}

#[test]
fn errors_map_to_store_errors() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("broken.json"), "{ not json").expect("seed");
    let store = JsonStore::new(dir.path());

    let missing = store.load(&FloorPlanId::new("absent")).expect_err("missing");
    assert!(matches!(missing, StoreError::NotFound(id) if id == "absent"));

    assert!(matches!(
        store.read(&FloorPlanId::new("broken")),
        Err(IoError::InvalidDocument { .. })
    ));
    let broken = store.load(&FloorPlanId::new("broken")).expect_err("broken");
    assert!(matches!(broken, StoreError::Backend { .. }));
}

#[test]
fn written_document_round_trips() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = JsonStore::new(dir.path());
    let document = FloorPlanDocument {
        floor_plan_id: FloorPlanId::new("empty"),
        name: "空白".to_string(),
        data: FloorPlan::default(),
    };
    let path = store.write(&document).expect("write");
    assert_eq!(path, dir.path().join("empty.json"));
    assert_eq!(store.read(&FloorPlanId::new("empty")).expect("read").name, "空白");
}
