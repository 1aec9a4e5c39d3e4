use std::env;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Cached path to the directory holding the content tables.
static DATA_ROOT: LazyLock<PathBuf> = LazyLock::new(detect_data_root);

/// The resolved data directory.
pub fn data_root() -> &'static Path {
    &DATA_ROOT
}

/// Directory that media paths in the video table are relative to: the parent
/// of the data directory (so `assets/videos/...` sits next to `data/`).
pub fn asset_root() -> PathBuf {
    DATA_ROOT
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn detect_data_root() -> PathBuf {
    let mut candidates = vec![PathBuf::from("jirai_engine/data"), PathBuf::from("data")];

    if let Ok(exe_path) = env::current_exe()
        && let Some(dir) = exe_path.parent()
    {
        candidates.push(dir.join("jirai_engine/data"));
        candidates.push(dir.join("data"));

        if let Some(parent) = dir.parent() {
            candidates.push(parent.join("jirai_engine/data"));
            candidates.push(parent.join("data"));
        }
    }

    candidates
        .into_iter()
        .find(|candidate| candidate.is_dir())
        .unwrap_or_else(|| PathBuf::from("jirai_engine/data"))
}
