use std::sync::Arc;

use anyhow::{Context, Result};
use shared::domain::Theme;
use storage::SettingsStore;
use tokio::sync::Mutex;
use tracing::debug;

/// Settings key the active theme is persisted under.
pub const THEME_KEY: &str = "theme";

/// Two-state theme machine over an injected settings store. Invariant:
/// after every successful transition the persisted value equals the active
/// state.
pub struct ThemeController {
    store: Arc<dyn SettingsStore>,
    active: Mutex<Theme>,
}

impl ThemeController {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            active: Mutex::new(Theme::default()),
        }
    }

    /// Applies the persisted preference, defaulting when unset or
    /// unparseable, and writes the applied state back.
    pub async fn load(&self) -> Result<Theme> {
        let saved = self
            .store
            .get(THEME_KEY)
            .await
            .context("failed to read theme preference")?;
        let theme = saved.as_deref().and_then(Theme::parse).unwrap_or_default();
        self.apply(theme).await?;
        Ok(theme)
    }

    /// Flips to the other theme, applying and persisting it.
    pub async fn toggle(&self) -> Result<Theme> {
        let next = self.active.lock().await.toggled();
        self.apply(next).await?;
        Ok(next)
    }

    pub async fn active(&self) -> Theme {
        *self.active.lock().await
    }

    async fn apply(&self, theme: Theme) -> Result<()> {
        *self.active.lock().await = theme;
        self.store
            .set(THEME_KEY, theme.as_str())
            .await
            .context("failed to persist theme preference")?;
        debug!(theme = theme.as_str(), "theme applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use storage::MemorySettings;

    struct FailingStore;

    #[async_trait]
    impl SettingsStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    #[tokio::test]
    async fn load_without_saved_preference_applies_and_persists_default() {
        let store = Arc::new(MemorySettings::new());
        let controller = ThemeController::new(store.clone());

        let theme = controller.load().await.expect("load");

        assert_eq!(theme, Theme::Dark);
        assert_eq!(controller.active().await, Theme::Dark);
        assert_eq!(
            store.get(THEME_KEY).await.expect("get").as_deref(),
            Some("dark")
        );
    }

    #[tokio::test]
    async fn load_restores_saved_preference() {
        let store = Arc::new(MemorySettings::new());
        store.set(THEME_KEY, "light").await.expect("seed");
        let controller = ThemeController::new(store.clone());

        assert_eq!(controller.load().await.expect("load"), Theme::Light);
        assert_eq!(controller.active().await, Theme::Light);
    }

    #[tokio::test]
    async fn load_treats_unparseable_value_as_unset() {
        let store = Arc::new(MemorySettings::new());
        store.set(THEME_KEY, "solarized").await.expect("seed");
        let controller = ThemeController::new(store.clone());

        assert_eq!(controller.load().await.expect("load"), Theme::Dark);
        assert_eq!(
            store.get(THEME_KEY).await.expect("get").as_deref(),
            Some("dark")
        );
    }

    #[tokio::test]
    async fn toggle_round_trips_and_mirrors_store_after_each_transition() {
        let store = Arc::new(MemorySettings::new());
        let controller = ThemeController::new(store.clone());
        controller.load().await.expect("load");

        assert_eq!(controller.toggle().await.expect("toggle"), Theme::Light);
        assert_eq!(
            store.get(THEME_KEY).await.expect("get").as_deref(),
            Some("light")
        );

        assert_eq!(controller.toggle().await.expect("toggle"), Theme::Dark);
        assert_eq!(
            store.get(THEME_KEY).await.expect("get").as_deref(),
            Some("dark")
        );
    }

    #[tokio::test]
    async fn store_failure_surfaces_to_the_caller() {
        let controller = ThemeController::new(Arc::new(FailingStore));
        let err = controller.load().await.expect_err("set must fail");
        assert!(err.to_string().contains("persist"));
    }
}
