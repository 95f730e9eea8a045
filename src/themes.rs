//! Theme catalog loading

use std::path::Path;

use crate::types::Theme;

/// Built-in catalog used when no themes file is configured
const DEFAULT_THEMES: &[&str] = &[
    "Beach",
    "Hospital",
    "Airport",
    "Supermarket",
    "School",
    "Space station",
    "Pirate ship",
    "Movie theater",
    "Restaurant",
    "Soccer stadium",
    "Zoo",
    "Library",
    "Circus",
    "Bank",
    "Submarine",
    "Ski resort",
    "Wedding",
    "Police station",
    "Train",
    "Museum",
    "Camping trip",
    "Casino",
    "Farm",
    "Gym",
];

pub fn default_themes() -> Vec<Theme> {
    DEFAULT_THEMES
        .iter()
        .enumerate()
        .map(|(i, text)| Theme {
            id: format!("builtin-{}", i + 1),
            text: text.to_string(),
            active: true,
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ThemeLoadError {
    #[error("failed to read themes file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse themes file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("themes file contains no active themes")]
    Empty,

    #[error("duplicate theme id {0:?}")]
    DuplicateId(String),
}

/// Load a JSON array of themes from disk
pub fn load_themes(path: &Path) -> Result<Vec<Theme>, ThemeLoadError> {
    let raw = std::fs::read_to_string(path)?;
    let themes: Vec<Theme> = serde_json::from_str(&raw)?;

    let mut ids = std::collections::HashSet::new();
    for theme in &themes {
        if !ids.insert(theme.id.as_str()) {
            return Err(ThemeLoadError::DuplicateId(theme.id.clone()));
        }
    }
    if !themes.iter().any(|t| t.active) {
        return Err(ThemeLoadError::Empty);
    }
    Ok(themes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_catalog_is_larger_than_history_window() {
        let themes = default_themes();
        assert!(themes.len() > crate::game::assignment::HISTORY_WINDOW);
        assert!(themes.iter().all(|t| t.active));
    }

    #[test]
    fn test_load_themes_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":"a","text":"Castle"}},{{"id":"b","text":"Volcano","active":false}}]"#
        )
        .unwrap();

        let themes = load_themes(file.path()).unwrap();
        assert_eq!(themes.len(), 2);
        assert!(themes[0].active);
        assert!(!themes[1].active);
    }

    #[test]
    fn test_load_themes_rejects_all_inactive() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id":"a","text":"Castle","active":false}}]"#).unwrap();
        assert!(matches!(
            load_themes(file.path()),
            Err(ThemeLoadError::Empty)
        ));
    }

    #[test]
    fn test_load_themes_rejects_duplicates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":"a","text":"Castle"}},{{"id":"a","text":"Moat"}}]"#
        )
        .unwrap();
        assert!(matches!(
            load_themes(file.path()),
            Err(ThemeLoadError::DuplicateId(id)) if id == "a"
        ));
    }
}
