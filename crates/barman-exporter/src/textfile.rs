use std::path::{Path, PathBuf};

use barman_exporter_core::platform::fs::{apply_mode, write_replace};

/// Destination and ownership for the node_exporter textfile.
pub(crate) struct TextfileTarget {
    pub path: PathBuf,
    pub user: String,
    pub group: String,
    pub mode: u32,
}

/// Replace the textfile with `body`, then set its owner and mode.
///
/// The collector never sees a partially written file: content goes to a
/// sibling temp file that is renamed into place.
pub(crate) fn write_textfile(target: &TextfileTarget, body: &str) -> Result<(), String> {
    write_replace(&target.path, body.as_bytes())
        .map_err(|e| format!("cannot write '{}': {e}", target.path.display()))?;
    apply_owner(&target.path, &target.user, &target.group)?;
    apply_mode(&target.path, target.mode)
        .map_err(|e| format!("cannot set mode on '{}': {e}", target.path.display()))?;
    tracing::info!(
        path = %target.path.display(),
        bytes = body.len(),
        mode = format!("{:o}", target.mode),
        "textfile written"
    );
    Ok(())
}

#[cfg(unix)]
fn apply_owner(path: &Path, user: &str, group: &str) -> Result<(), String> {
    use nix::unistd::{Group, User, chown};

    let uid = User::from_name(user)
        .map_err(|e| format!("cannot look up user '{user}': {e}"))?
        .ok_or_else(|| format!("unknown user '{user}'"))?
        .uid;
    let gid = Group::from_name(group)
        .map_err(|e| format!("cannot look up group '{group}': {e}"))?
        .ok_or_else(|| format!("unknown group '{group}'"))?
        .gid;
    chown(path, Some(uid), Some(gid))
        .map_err(|e| format!("cannot change owner of '{}' to {user}:{group}: {e}", path.display()))
}

#[cfg(not(unix))]
fn apply_owner(path: &Path, user: &str, group: &str) -> Result<(), String> {
    tracing::warn!(
        path = %path.display(),
        user,
        group,
        "file ownership is not supported on this platform; leaving owner unchanged"
    );
    Ok(())
}
