//! Wrapper and profile script generation.
//!
//! The installed binary cannot run on its own: it needs the bundled and
//! fetched shared libraries on `LD_LIBRARY_PATH`, a bootstrap file location
//! and a headless rendering backend. This module writes a launcher that
//! sets all of that up relative to its own location, an alias for it, and a
//! profile snippet the platform sources at session start.

use crate::config::{BuildpackConfig, DEPS_DIR_NAME, EXECUTABLE_NAME, INSTALL_DIR_NAME};
use crate::error::{BuildpackError, Result};
use camino::{Utf8Path, Utf8PathBuf};

/// Name of the launcher alias.
pub const ALIAS_NAME: &str = "libreoffice";

/// File name of the profile snippet.
pub const PROFILE_SCRIPT_NAME: &str = "libreoffice.sh";

/// Library directories inside the dependency tree, in search order.
pub const DEPS_LIBRARY_DIRS: [&str; 4] = [
    "usr/lib/x86_64-linux-gnu",
    "lib/x86_64-linux-gnu",
    "usr/lib",
    "lib",
];

/// Exit status of the launcher when the binary is missing.
pub const MISSING_BINARY_STATUS: i32 = 127;

/// Result of wrapper script generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperResult {
    /// Path to the launcher script.
    pub wrapper_path: Utf8PathBuf,
    /// Path to the launcher alias.
    pub alias_path: Utf8PathBuf,
    /// Path to the profile snippet.
    pub profile_path: Utf8PathBuf,
}

/// Generates the launcher, its alias and the profile snippet.
///
/// Existing files are replaced.
///
/// # Errors
///
/// Returns [`BuildpackError::WrapperGeneration`] if any file cannot be
/// written.
pub fn generate_wrapper_scripts(config: &BuildpackConfig) -> Result<WrapperResult> {
    let bin_dir = config.bin_dir();
    let profile_dir = config.profile_dir();
    for dir in [&bin_dir, &profile_dir] {
        std::fs::create_dir_all(dir).map_err(|e| {
            BuildpackError::WrapperGeneration(format!("failed to create {dir}: {e}"))
        })?;
    }

    let wrapper_path = bin_dir.join(EXECUTABLE_NAME);
    write_script(&wrapper_path, &wrapper_script())?;

    let alias_path = bin_dir.join(ALIAS_NAME);
    create_alias(&alias_path)?;

    let profile_path = profile_dir.join(PROFILE_SCRIPT_NAME);
    write_script(&profile_path, &profile_script())?;

    Ok(WrapperResult {
        wrapper_path,
        alias_path,
        profile_path,
    })
}

/// `LD_LIBRARY_PATH` value for an application rooted at the shell
/// expression `root`, keeping any inherited value last.
///
/// ```
/// use libreoffice_buildpack::wrapper::library_path;
///
/// let value = library_path("$HOME");
/// assert!(value.starts_with("$HOME/libreoffice/program:$HOME/libreoffice-deps/usr/lib/x86_64-linux-gnu:"));
/// assert!(value.ends_with("${LD_LIBRARY_PATH:+:$LD_LIBRARY_PATH}"));
/// ```
#[must_use]
pub fn library_path(root: &str) -> String {
    let mut dirs = vec![format!("{root}/{INSTALL_DIR_NAME}/program")];
    dirs.extend(
        DEPS_LIBRARY_DIRS
            .iter()
            .map(|dir| format!("{root}/{DEPS_DIR_NAME}/{dir}")),
    );
    format!("{}${{LD_LIBRARY_PATH:+:$LD_LIBRARY_PATH}}", dirs.join(":"))
}

/// The launcher script placed at `<build>/bin/soffice`.
///
/// The application root is derived from the script's own location so the
/// build directory can be moved after compilation.
#[must_use]
pub fn wrapper_script() -> String {
    format!(
        r#"#!/bin/sh
ROOT="$(cd "$(dirname "$0")/.." && pwd)"
SOFFICE="$ROOT/{INSTALL_DIR_NAME}/program/{EXECUTABLE_NAME}"

export URE_BOOTSTRAP="vnd.sun.star.pathname:$ROOT/{INSTALL_DIR_NAME}/program/fundamentalrc"
export SAL_USE_VCLPLUGIN=svp
export LD_LIBRARY_PATH="{library_path}"
export HOME="${{HOME:-/tmp}}"
export DISPLAY="${{DISPLAY:-:99}}"

if [ ! -x "$SOFFICE" ]; then
    echo "{EXECUTABLE_NAME}: $SOFFICE is missing or not executable" >&2
    exit {MISSING_BINARY_STATUS}
fi

exec "$SOFFICE" "$@"
"#,
        library_path = library_path("$ROOT"),
    )
}

/// The profile snippet placed at `<build>/.profile.d/libreoffice.sh`.
///
/// At runtime the build directory is the application's home directory.
#[must_use]
pub fn profile_script() -> String {
    format!(
        r#"export PATH="$HOME/bin:$PATH"
export LD_LIBRARY_PATH="{library_path}"
export URE_BOOTSTRAP="vnd.sun.star.pathname:$HOME/{INSTALL_DIR_NAME}/program/fundamentalrc"
export SAL_USE_VCLPLUGIN=svp
"#,
        library_path = library_path("$HOME"),
    )
}

fn write_script(path: &Utf8Path, content: &str) -> Result<()> {
    #[cfg(unix)]
    return write_unix_script(path, content);

    #[cfg(not(unix))]
    std::fs::write(path, content).map_err(|e| {
        BuildpackError::WrapperGeneration(format!("failed to write {path}: {e}"))
    })
}

/// Writes an executable Unix shell script.
#[cfg(unix)]
fn write_unix_script(path: &Utf8Path, content: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, content).map_err(|e| {
        BuildpackError::WrapperGeneration(format!("failed to write {path}: {e}"))
    })?;

    // rwxr-xr-x
    let mut perms = std::fs::metadata(path)
        .map_err(|e| BuildpackError::WrapperGeneration(format!("failed to read permissions: {e}")))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).map_err(|e| {
        BuildpackError::WrapperGeneration(format!("failed to set permissions: {e}"))
    })?;

    Ok(())
}

/// Points `alias_path` at the launcher in the same directory.
fn create_alias(alias_path: &Utf8Path) -> Result<()> {
    if alias_path.symlink_metadata().is_ok() {
        std::fs::remove_file(alias_path).map_err(|e| {
            BuildpackError::WrapperGeneration(format!("failed to replace {alias_path}: {e}"))
        })?;
    }

    #[cfg(unix)]
    let linked = std::os::unix::fs::symlink(EXECUTABLE_NAME, alias_path);
    #[cfg(not(unix))]
    let linked = std::fs::copy(alias_path.with_file_name(EXECUTABLE_NAME), alias_path).map(|_| ());

    linked.map_err(|e| {
        BuildpackError::WrapperGeneration(format!("failed to create {alias_path}: {e}"))
    })
}
