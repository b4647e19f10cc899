use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// Platform base directory used when no explicit home_dir is configured.
/// Windows: %APPDATA%, everything else: $HOME.
fn platform_base() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "APPDATA";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";

    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("environment variable {var} is not set"))
}

/// Expand a leading `~` into the platform base directory.
fn expand_tilde(raw: &str) -> Result<PathBuf> {
    if raw == "~" {
        return platform_base();
    }
    if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        return Ok(platform_base()?.join(rest));
    }
    Ok(PathBuf::from(raw))
}

/// Resolve the server home directory into an absolute path.
///
/// - `None` resolves to `<platform base>/<default_subdir>`.
/// - `~` prefixes are expanded; relative paths are anchored at the current directory.
/// - When `create` is set the directory is created if missing.
pub fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf> {
    let path = match configured {
        Some(raw) => expand_tilde(raw.trim())?,
        None => platform_base()?.join(default_subdir),
    };

    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .context("cannot read current directory")?
            .join(path)
    };

    if create {
        std::fs::create_dir_all(&path)
            .with_context(|| format!("cannot create home dir {}", path.display()))?;
    }
    Ok(path)
}

/// Resolve `file` against `base_dir` unless it is already absolute.
pub fn resolve_under(base_dir: &Path, file: &str) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}
