//! Where settings and the running program's state live on disk.
//!
//! Two files matter:
//!
//! - `settings.toml`: [`AppConfig`](super::AppConfig), in the config dir.
//! - `project.json`: the program's stage-level custom state, in the data
//!   dir.  Among other things it carries the classifier model reference
//!   chosen for this program (under `"Scratch.language"`), so reopening the
//!   program skips model selection.
//!
//! Config dir:
//!   Windows: %APPDATA%\sense-blocks\
//!   macOS:   ~/Library/Application Support/sense-blocks/
//!   Linux:   ~/.config/sense-blocks/
//!
//! Data dir:
//!   Windows: %LOCALAPPDATA%\sense-blocks\
//!   macOS:   ~/Library/Application Support/sense-blocks/
//!   Linux:   ~/.local/share/sense-blocks/
//!
//! `host.project_file` in the settings points the host at a different
//! program file; its parent directory becomes the data dir.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory of the program file.
    pub data_dir: PathBuf,
    /// The program's stage state, read at startup and written back whenever
    /// a model becomes ready and on exit.
    pub project_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "sense-blocks";
    const PROJECT_FILE: &'static str = "project.json";

    /// Platform paths via `dirs`, falling back to the current directory.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            project_file: data_dir.join(Self::PROJECT_FILE),
            config_dir,
            data_dir,
        }
    }

    /// Open `project_file` instead of the default program, when given.
    pub fn with_project_file(mut self, project_file: Option<PathBuf>) -> Self {
        if let Some(file) = project_file {
            self.data_dir = match file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            self.project_file = file;
        }
        self
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::classifier::ModelRef;
    use crate::lifecycle::{ModelRefStore, StageState, StageStore, LANGUAGE_STATE_KEY};

    #[test]
    fn default_program_file_lives_in_the_data_dir() {
        let paths = AppPaths::new();
        assert!(paths.settings_file.starts_with(&paths.config_dir));
        assert!(paths.project_file.starts_with(&paths.data_dir));
        assert!(paths
            .project_file
            .file_name()
            .is_some_and(|n| n == "project.json"));
    }

    #[test]
    fn configured_program_file_moves_the_data_dir() {
        let paths = AppPaths::new().with_project_file(Some("/tmp/demo/castle.json".into()));
        assert_eq!(paths.project_file, PathBuf::from("/tmp/demo/castle.json"));
        assert_eq!(paths.data_dir, PathBuf::from("/tmp/demo"));

        let bare = AppPaths::new().with_project_file(Some("castle.json".into()));
        assert_eq!(bare.data_dir, PathBuf::from("."));

        let default = AppPaths::new();
        let unchanged = AppPaths::new().with_project_file(None);
        assert_eq!(unchanged.project_file, default.project_file);
    }

    #[test]
    fn chosen_model_is_kept_in_the_program_file() {
        let dir = tempdir().expect("temp dir");
        let paths =
            AppPaths::new().with_project_file(Some(dir.path().join("programs").join("castle.json")));

        let store = StageStore::with_file(&paths.project_file).expect("open");
        store.save(&ModelRef::new("dd176c9e")).expect("save");
        assert!(paths.data_dir.is_dir());

        let state = StageState::load_from(&paths.project_file).expect("reload");
        assert!(state.custom_state.contains_key(LANGUAGE_STATE_KEY));
    }
}
