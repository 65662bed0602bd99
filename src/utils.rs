use dirs::data_dir;
use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
};

static DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let base = data_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    base.join("event-checkout")
});

pub fn data_root() -> PathBuf {
    DATA_ROOT.clone()
}

pub fn config_path() -> PathBuf {
    data_root().join("config.json")
}

pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// Joins a path fragment onto a base URL with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub fn is_absolute_url(value: &str) -> bool {
    value.starts_with("http")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_collapses_slashes() {
        assert_eq!(
            join_url("https://api.test/", "/uploads/a.png"),
            "https://api.test/uploads/a.png"
        );
        assert_eq!(join_url("https://api.test", "uploads"), "https://api.test/uploads");
    }

    #[test]
    fn config_lives_under_data_root() {
        assert!(config_path().starts_with(data_root()));
        assert!(data_root().ends_with("event-checkout"));
    }
}
