use crate::error::{PgkitError, Result};
use std::path::{Path, PathBuf};

/// Create `path` and its parents. Succeeds if the directory already exists.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.is_dir() {
        std::fs::create_dir_all(path).map_err(|e| PgkitError::filesystem(path, e))?;
    }
    Ok(())
}

/// Sibling path used while a file is being written.
pub fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.partial"))
}

/// Move a fully written `partial` file over `dest`, replacing any existing file.
pub fn replace_file(partial: &Path, dest: &Path) -> Result<()> {
    if let Err(e) = std::fs::rename(partial, dest) {
        let _ = std::fs::remove_file(partial);
        return Err(PgkitError::filesystem(dest, e));
    }
    Ok(())
}

/// Regular files directly inside `dir`, by name, sorted.
pub fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| PgkitError::filesystem(dir, e))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o755);
        std::fs::set_permissions(path, perms)?;
    }

    // On Windows, executable permission is determined by file extension
    #[cfg(windows)]
    {
        let _ = path;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ensure_dir_exists_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("PostgreSQL").join("bin");

        ensure_dir_exists(&nested).unwrap();
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_ensure_dir_fails_on_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("occupied");
        std::fs::write(&file, "x").unwrap();

        assert!(ensure_dir_exists(&file).is_err());
    }

    #[test]
    fn test_replace_file_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("psql.exe");
        std::fs::write(&dest, "old").unwrap();

        let partial = partial_path(&dest);
        assert_eq!(partial, root.path().join(".psql.exe.partial"));
        std::fs::write(&partial, "new").unwrap();

        replace_file(&partial, &dest).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "new");
        assert!(!partial.exists());
    }

    #[test]
    fn test_list_file_names_sorted() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("psql.exe"), "").unwrap();
        std::fs::write(root.path().join("pg_dump.exe"), "").unwrap();
        std::fs::create_dir(root.path().join("share")).unwrap();

        assert_eq!(
            list_file_names(root.path()).unwrap(),
            vec!["pg_dump.exe".to_string(), "psql.exe".to_string()]
        );
        assert!(list_file_names(&root.path().join("missing")).unwrap().is_empty());
    }
}
