use std::path::{Component, Path, PathBuf};

/// Check that a manifest-supplied chunk file name is a single plain component.
///
/// Returns a description of the violation, if any.
pub fn check_file_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty file name".into());
    }
    if name.contains('/') || name.contains('\\') {
        return Err(format!("path separators not allowed: {name:?}"));
    }
    let rel = Path::new(name);
    if rel.is_absolute() {
        return Err(format!("absolute paths are not allowed: {name:?}"));
    }
    let mut comps = rel.components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) => Err(format!("parent traversal not allowed: {name:?}")),
        _ => Err(format!("not a plain file name: {name:?}")),
    }
}

/// Outcome of resolving a chunk file inside its directory.
#[derive(Debug)]
pub enum Resolved {
    /// Regular file (or not yet known to exist) at this path.
    File(PathBuf),
    /// Nothing on disk under this name.
    Missing(PathBuf),
}

/// Join `name` onto `dir`, refusing symlinks so reads never leave the chunk directory.
pub fn resolve_in(dir: &Path, name: &str) -> Result<Resolved, String> {
    check_file_name(name)?;
    let candidate = dir.join(name);
    match std::fs::symlink_metadata(&candidate) {
        Ok(m) if m.file_type().is_symlink() => {
            Err(format!("symlink encountered (not following): {candidate:?}"))
        }
        Ok(_) => Ok(Resolved::File(candidate)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Resolved::Missing(candidate)),
        // Permission errors and the like surface when the caller opens the file.
        Err(_) => Ok(Resolved::File(candidate)),
    }
}
