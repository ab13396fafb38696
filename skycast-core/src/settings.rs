use std::{fmt, str::FromStr, sync::Arc};

use tracing::warn;

use crate::{
    StorageError,
    storage::{KeyValueStore, THEME_KEY},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(anyhow::anyhow!("Unknown theme '{value}'. Supported themes: light, dark.")),
        }
    }
}

/// User preferences backed by the key/value store.
#[derive(Debug)]
pub struct Settings {
    storage: Arc<dyn KeyValueStore>,
    theme: Theme,
}

impl Settings {
    /// Read preferences; anything missing or unreadable takes its default.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let theme = match storage.get(THEME_KEY) {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                warn!(error = %err, "ignoring stored theme");
                Theme::default()
            }),
            None => Theme::default(),
        };

        Self { storage, theme }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), StorageError> {
        self.storage.set(THEME_KEY, theme.as_str())?;
        self.theme = theme;
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> Result<Theme, StorageError> {
        let next = self.theme.toggled();
        self.set_theme(next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn theme_parse_and_display() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert_eq!(" light ".parse::<Theme>().unwrap(), Theme::Light);
        assert!("sepia".parse::<Theme>().unwrap_err().to_string().contains("Unknown theme"));
        assert_eq!(Theme::Dark.to_string(), "dark");
    }

    #[test]
    fn defaults_to_light() {
        let settings = Settings::load(Arc::new(MemoryStorage::new()));
        assert_eq!(settings.theme(), Theme::Light);
    }

    #[test]
    fn unreadable_theme_falls_back_to_light() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(THEME_KEY, "neon").unwrap();

        assert_eq!(Settings::load(storage).theme(), Theme::Light);
    }

    #[test]
    fn toggle_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let mut settings = Settings::load(storage.clone());

        assert_eq!(settings.toggle_theme().unwrap(), Theme::Dark);
        assert_eq!(storage.get(THEME_KEY).as_deref(), Some("dark"));
        assert_eq!(Settings::load(storage.clone()).theme(), Theme::Dark);

        assert_eq!(settings.toggle_theme().unwrap(), Theme::Light);
        assert_eq!(storage.get(THEME_KEY).as_deref(), Some("light"));
    }
}
