use super::*;

#[tokio::test]
async fn get_returns_none_for_unset_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let value = storage.get("theme").await.expect("get");
    assert_eq!(value, None);
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("theme", "dark").await.expect("set");
    let value = storage.get("theme").await.expect("get");
    assert_eq!(value.as_deref(), Some("dark"));
}

#[tokio::test]
async fn set_overwrites_existing_value() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("theme", "dark").await.expect("set");
    storage.set("theme", "light").await.expect("overwrite");
    let value = storage.get("theme").await.expect("get");
    assert_eq!(value.as_deref(), Some("light"));
}

#[tokio::test]
async fn keys_are_independent() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("theme", "light").await.expect("set");
    storage.set("volume", "0.8").await.expect("set");
    assert_eq!(storage.get("theme").await.expect("get").as_deref(), Some("light"));
    assert_eq!(storage.get("volume").await.expect("get").as_deref(), Some("0.8"));
}

#[tokio::test]
async fn health_check_passes_on_fresh_database() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("healthy");
}

#[tokio::test]
async fn file_backed_url_creates_parent_directory() {
    let root = tempfile::tempdir().expect("temp root");
    let db_path = root.path().join("nested").join("settings.db");
    let url = format!("sqlite://{}", db_path.display());

    let storage = Storage::new(&url).await.expect("db");
    storage.set("theme", "dark").await.expect("set");

    assert!(db_path.parent().expect("parent").exists());

    // A second handle over the same file sees the persisted value.
    let reopened = Storage::new(&url).await.expect("reopen");
    assert_eq!(
        reopened.get("theme").await.expect("get").as_deref(),
        Some("dark")
    );
}

#[tokio::test]
async fn memory_settings_round_trip() {
    let store = MemorySettings::new();
    assert_eq!(store.get("theme").await.expect("get"), None);
    store.set("theme", "light").await.expect("set");
    assert_eq!(store.get("theme").await.expect("get").as_deref(), Some("light"));
}

#[test]
fn sqlite_path_ignores_memory_and_foreign_urls() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(sqlite_path("postgres://localhost/db"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/studio.db"),
        Some(PathBuf::from("./data/studio.db"))
    );
    assert_eq!(
        sqlite_path("sqlite://./data/studio.db?mode=rwc"),
        Some(PathBuf::from("./data/studio.db"))
    );
}
