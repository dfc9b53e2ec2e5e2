//! Game installation and extract directory layout

use regex_lite::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Base game and expansion databases, relative to the game directory
pub const GAME_DATABASES: &[&str] = &[
    "database/database.arz",
    "survivalmode1/database/SurvivalMode1.arz",
    "survivalmode2/database/SurvivalMode2.arz",
    "gdx1/database/GDX1.arz",
    "gdx2/database/GDX2.arz",
];

/// Archive tool shipped with the game
pub const ARCHIVE_TOOL: &str = "ArchiveTool.exe";

const GAME_DATA_DIR: &str = "game_data";
const MODS_DIR: &str = "mods";

/// Where the game lives and where extracted databases are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    game_dir: PathBuf,
    data_dir: PathBuf,
}

impl GameLayout {
    pub fn new(game_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            game_dir: game_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    pub fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn archive_tool(&self) -> PathBuf {
        self.game_dir.join(ARCHIVE_TOOL)
    }

    /// All base game databases, installed or not
    pub fn database_paths(&self) -> Vec<PathBuf> {
        GAME_DATABASES
            .iter()
            .map(|relative| self.game_dir.join(relative))
            .collect()
    }

    /// Base game databases present in this installation
    pub fn existing_database_paths(&self) -> Vec<PathBuf> {
        self.database_paths()
            .into_iter()
            .filter(|path| path.is_file())
            .collect()
    }

    pub fn game_extract_path(&self) -> PathBuf {
        self.data_dir.join(GAME_DATA_DIR)
    }

    pub fn game_db_extract_path(&self) -> PathBuf {
        self.game_extract_path().join("database")
    }

    pub fn game_resources_extract_path(&self) -> PathBuf {
        self.game_extract_path().join("resources")
    }

    pub fn game_record_path(&self) -> PathBuf {
        self.game_extract_path().join("extract_info.json")
    }

    pub fn mods_extract_path(&self) -> PathBuf {
        self.data_dir.join(MODS_DIR)
    }

    pub fn mod_extract_path(&self, mod_name: &str) -> PathBuf {
        self.mods_extract_path().join(mod_name)
    }

    pub fn mod_record_path(&self, mod_name: &str) -> PathBuf {
        self.mods_extract_path().join(format!("{}.json", mod_name))
    }

    /// Create the extract directories
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.game_db_extract_path()).await?;
        tokio::fs::create_dir_all(self.game_resources_extract_path()).await?;
        tokio::fs::create_dir_all(self.mods_extract_path()).await?;
        Ok(())
    }
}

/// Mod databases (`mods/<name>/database/*.arz`) inside an installed mod
pub fn find_mod_databases(mod_path: &Path) -> Vec<PathBuf> {
    let re = Regex::new(r"(?i)^mods/[^/]+/database/[^/]+\.arz$").expect("valid regex");
    WalkDir::new(mod_path)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .strip_prefix(mod_path)
                .map(|relative| {
                    let relative: Vec<_> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().to_string())
                        .collect();
                    re.is_match(&relative.join("/"))
                })
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_layout_paths() {
        let layout = GameLayout::new("/games/gd", "/data/gdmods");
        assert_eq!(layout.archive_tool(), PathBuf::from("/games/gd/ArchiveTool.exe"));
        assert_eq!(
            layout.game_db_extract_path(),
            PathBuf::from("/data/gdmods/game_data/database")
        );
        assert_eq!(
            layout.game_record_path(),
            PathBuf::from("/data/gdmods/game_data/extract_info.json")
        );
        assert_eq!(
            layout.mod_extract_path("Foo"),
            PathBuf::from("/data/gdmods/mods/Foo")
        );
        assert_eq!(
            layout.mod_record_path("Foo"),
            PathBuf::from("/data/gdmods/mods/Foo.json")
        );
        assert_eq!(layout.database_paths().len(), GAME_DATABASES.len());
    }

    #[test]
    fn test_existing_databases_skip_missing_expansions() {
        let game = tempfile::tempdir().unwrap();
        for relative in ["database/database.arz", "gdx1/database/GDX1.arz"] {
            let path = game.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "db").unwrap();
        }
        let layout = GameLayout::new(game.path(), "/unused");
        let found = layout.existing_database_paths();
        assert_eq!(
            found,
            vec![
                game.path().join("database/database.arz"),
                game.path().join("gdx1/database/GDX1.arz"),
            ]
        );
    }

    #[test]
    fn test_find_mod_databases() {
        let mod_dir = tempfile::tempdir().unwrap();
        for relative in [
            "mods/Foo/database/Foo.arz",
            "mods/Foo/database/nested/Other.arz",
            "MODS/Foo/DATABASE/Upper.ARZ",
            "mods/Foo/resources/Foo.arc",
            "loose.arz",
        ] {
            let path = mod_dir.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        let mut found: Vec<_> = find_mod_databases(mod_dir.path())
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        found.sort();
        assert_eq!(found, vec!["Foo.arz", "Upper.ARZ"]);
    }

    #[tokio::test]
    async fn test_ensure_dirs() {
        let data = tempfile::tempdir().unwrap();
        let layout = GameLayout::new("/unused", data.path());
        layout.ensure_dirs().await.unwrap();
        assert!(layout.game_db_extract_path().is_dir());
        assert!(layout.game_resources_extract_path().is_dir());
        assert!(layout.mods_extract_path().is_dir());
    }
}
