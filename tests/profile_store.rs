//! Integration tests for the JSON profile store

use std::fs;
use tempfile::TempDir;
use wiimote_pad::mapping::profile::{
    GamepadTarget, MappingProfile, ProfileError, ProfileTemplate, CURRENT_VERSION,
};
use wiimote_pad::mapping::store::{JsonProfileStore, ProfileSortOrder, ProfileStore, StoreError};
use wiimote_pad::wiimote::types::DeviceButton;

fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

fn store() -> (TempDir, JsonProfileStore) {
    init_logger();
    let dir = TempDir::new().unwrap();
    let store = JsonProfileStore::new(dir.path().join("profiles")).unwrap();
    (dir, store)
}

#[test]
fn test_save_and_load_round_trip() {
    let (_dir, store) = store();
    let profile = ProfileTemplate::Fighting.create();

    let saved = store.save(&profile).unwrap();
    let loaded = store.load(&profile.name).unwrap();

    assert_eq!(loaded, saved);
    assert_eq!(loaded.binding(GamepadTarget::B), Some(DeviceButton::Two));
    assert!(store.dir().join("Fighting Game.json").exists());
}

#[test]
fn test_documents_are_pretty_json() {
    let (_dir, store) = store();
    store.save(&MappingProfile::default_profile()).unwrap();

    let text = fs::read_to_string(store.dir().join("Default.json")).unwrap();
    assert!(text.contains("\n  \"name\": \"Default\""));
}

#[test]
fn test_unsafe_names_are_sanitised() {
    let (_dir, store) = store();
    store.save(&MappingProfile::new("FPS/Shooter")).unwrap();

    assert!(store.dir().join("FPS_Shooter.json").exists());
    assert_eq!(store.list().unwrap(), vec!["FPS_Shooter"]);
    assert_eq!(store.load("FPS/Shooter").unwrap().name, "FPS/Shooter");
}

#[test]
fn test_list_puts_default_first_and_skips_other_files() {
    let (_dir, store) = store();
    store.ensure_defaults().unwrap();
    store.save(&MappingProfile::new("Arcade")).unwrap();
    fs::write(store.dir().join("notes.txt"), "not a profile").unwrap();

    let names = store.list().unwrap();
    assert_eq!(names[0], "Default");
    assert_eq!(names.len(), 4);
    assert!(names.contains(&"Arcade".to_string()));
}

#[test]
fn test_default_profile_cannot_be_deleted() {
    let (_dir, store) = store();
    store.ensure_defaults().unwrap();

    assert!(matches!(store.delete("Default"), Err(StoreError::Protected(_))));
    assert!(matches!(store.delete("default"), Err(StoreError::Protected(_))));
    assert!(matches!(store.delete("Nope"), Err(StoreError::NotFound(_))));

    let racing = ProfileTemplate::Racing.name();
    store.delete(racing).unwrap();
    assert!(!store.contains(racing).unwrap());
}

#[test]
fn test_load_migrates_legacy_document() {
    let (_dir, store) = store();
    fs::write(
        store.dir().join("Old.json"),
        r#"{ "name": "Renamed", "buttons": { "A": "Two", "Start": "Plus" } }"#,
    )
    .unwrap();

    let profile = store.load("Old").unwrap();
    assert_eq!(profile.name, "Old");
    assert_eq!(profile.version, CURRENT_VERSION);
    assert_eq!(profile.binding(GamepadTarget::Start), Some(DeviceButton::Plus));
    assert!(profile.created_at > 0);
}

#[test]
fn test_load_rejects_future_and_invalid_documents() {
    let (_dir, store) = store();
    fs::write(store.dir().join("Future.json"), r#"{ "name": "Future", "version": 9 }"#).unwrap();
    fs::write(
        store.dir().join("Broken.json"),
        r#"{ "name": "Broken", "version": 2,
             "accelerometer": { "enabled": true, "sensitivity": -1.0, "dead_zone": 2.0 } }"#,
    )
    .unwrap();
    fs::write(store.dir().join("Garbage.json"), "{ not json").unwrap();

    assert!(matches!(
        store.load("Future"),
        Err(StoreError::Profile(ProfileError::UnsupportedVersion { version: 9, .. }))
    ));
    match store.load("Broken") {
        Err(StoreError::Profile(ProfileError::Invalid { reasons, .. })) => {
            assert!(reasons.iter().any(|r| r.contains("sensitivity")));
            assert!(reasons.iter().any(|r| r.contains("dead zone")));
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert!(matches!(store.load("Garbage"), Err(StoreError::Json(_))));
    assert!(matches!(store.load("Missing"), Err(StoreError::NotFound(_))));

    // Unloadable documents are skipped when listing profiles
    assert!(store.profiles(ProfileSortOrder::Name).unwrap().is_empty());
}

#[test]
fn test_template_copies_get_unique_names() {
    let (_dir, store) = store();
    let first = store.create_from_template(ProfileTemplate::Party).unwrap();
    let second = store.create_from_template(ProfileTemplate::Party).unwrap();

    assert_eq!(first.name, "Party Game (Ultimate Chicken Horse)");
    assert_eq!(second.name, "Party Game (Ultimate Chicken Horse) (1)");
    assert_eq!(store.list().unwrap().len(), 2);
}

#[test]
fn test_template_copies_with_unsafe_names_do_not_overwrite() {
    let (_dir, store) = store();
    let first = store.create_from_template(ProfileTemplate::Shooter).unwrap();
    let second = store.create_from_template(ProfileTemplate::Shooter).unwrap();

    assert_eq!(first.name, "FPS/Shooter");
    assert_eq!(second.name, "FPS/Shooter (1)");
    assert!(store.contains("FPS/Shooter").unwrap());
    assert!(store.contains("FPS_Shooter").unwrap());
    assert_eq!(store.list().unwrap(), vec!["FPS_Shooter", "FPS_Shooter (1)"]);
}

#[test]
fn test_import_with_unsafe_name_does_not_overwrite() {
    let (dir, store) = store();
    let mut original = ProfileTemplate::Shooter.create();
    original.description = "mine".to_string();
    store.save(&original).unwrap();

    let mut shared = ProfileTemplate::Shooter.create();
    shared.description = "theirs".to_string();
    let exported = dir.path().join("theirs.json");
    fs::write(&exported, serde_json::to_string_pretty(&shared).unwrap()).unwrap();

    let imported = store.import_profile(&exported).unwrap();
    assert_eq!(imported.name, "FPS/Shooter (Imported 1)");
    assert_eq!(store.load("FPS/Shooter").unwrap().description, "mine");
    assert_eq!(store.load("FPS/Shooter (Imported 1)").unwrap().description, "theirs");
    assert_eq!(store.list().unwrap().len(), 2);
}

#[test]
fn test_export_then_import_keeps_both() {
    let (dir, store) = store();
    store.save(&ProfileTemplate::Shooter.create()).unwrap();

    let exported = dir.path().join("shared.json");
    store.export_profile("FPS_Shooter", &exported).unwrap();

    let imported = store.import_profile(&exported).unwrap();
    assert_eq!(imported.name, "FPS_Shooter (Imported 1)");
    assert_eq!(
        imported.binding(GamepadTarget::X),
        Some(DeviceButton::One)
    );
    assert_eq!(store.list().unwrap().len(), 2);
}

#[test]
fn test_profiles_sorted_by_usage() {
    let (_dir, store) = store();
    let mut busy = MappingProfile::new("Busy");
    busy.usage_count = 10;
    let mut idle = MappingProfile::new("Idle");
    idle.usage_count = 1;
    store.save(&idle).unwrap();
    store.save(&busy).unwrap();

    let names: Vec<String> = store
        .profiles(ProfileSortOrder::MostUsed)
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Busy", "Idle"]);
}
