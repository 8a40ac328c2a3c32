use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

/// Ensures that a directory exists at the specified path, creating it and any
/// missing parents if necessary.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

pub fn home_dir() -> Result<PathBuf> {
    let dir = std::env::var_os("HOME") // Unix/Linux/macOS
        .or_else(|| std::env::var_os("USERPROFILE")) // Windows
        .map(PathBuf::from);
    match dir {
        Some(dir) => Ok(dir),
        None => {
            bail!("could not determine home directory, please specify config path manually")
        }
    }
}

#[cfg(unix)]
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dir_exists() {
        let base_path = Path::new("_test_ensure_dir");
        fs::create_dir_all(base_path).unwrap();

        let nested_dir = base_path.join("parent/child");
        ensure_dir_exists(&nested_dir).unwrap();
        assert!(nested_dir.is_dir());

        // Existing directory is not an error
        ensure_dir_exists(&nested_dir).unwrap();
        assert!(nested_dir.is_dir());

        fs::remove_dir_all(base_path).unwrap();
    }
}
