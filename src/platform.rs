use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Resolves a tool name against PATH the way a shell would.
///
/// A name containing a path separator is checked as-is instead.
pub fn find_executable(tool: &OsStr) -> Option<PathBuf> {
    let candidate = Path::new(tool);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| executable_names(tool).map(move |name| dir.join(name)))
        .find(|path| is_executable(path))
}

fn executable_names(tool: &OsStr) -> impl Iterator<Item = PathBuf> {
    let plain = PathBuf::from(tool);
    let suffixed = (!std::env::consts::EXE_SUFFIX.is_empty())
        .then(|| plain.with_extension(std::env::consts::EXE_EXTENSION));
    std::iter::once(plain).chain(suffixed)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Default active directory (~/.local/share/dumpkeeper/backups or platform equivalent)
pub fn default_backup_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "dumpkeeper")
        .map(|dirs| dirs.data_dir().join("backups"))
        .unwrap_or_else(|| PathBuf::from("backups"))
}

/// Config file location (~/.config/dumpkeeper/config.toml or platform equivalent)
pub fn default_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "dumpkeeper")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
