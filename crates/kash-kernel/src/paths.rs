//! Home directory lookup and `~` handling.
//!
//! Expansion and contraction take the home directory as an argument so the
//! kernel can use the one captured in its [`Identity`](crate::identity::Identity)
//! instead of re-reading the environment on every line.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

/// Get the user's home directory.
///
/// Prefers the platform lookup, then `$HOME`, then `/`.
pub fn home_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Expand a leading `~` or `~/` against `home`.
///
/// `~user` forms are left alone.
pub fn expand_tilde(s: &str, home: &Path) -> PathBuf {
    if s == "~" {
        home.to_path_buf()
    } else if let Some(rest) = s.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(s)
    }
}

/// Render `path` with `home` abbreviated to `~`.
pub fn contract_home(path: &Path, home: &Path) -> String {
    if home == Path::new("/") {
        return path.display().to_string();
    }
    match path.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_dir_is_absolute() {
        assert!(home_dir().is_absolute());
    }

    #[test]
    fn test_expand_tilde_home() {
        let home = Path::new("/home/kash");
        assert_eq!(expand_tilde("~", home), PathBuf::from("/home/kash"));
        assert_eq!(expand_tilde("~/src/x", home), PathBuf::from("/home/kash/src/x"));
    }

    #[test]
    fn test_expand_tilde_passthrough() {
        let home = Path::new("/home/kash");
        assert_eq!(expand_tilde("/etc", home), PathBuf::from("/etc"));
        assert_eq!(expand_tilde("~other", home), PathBuf::from("~other"));
        assert_eq!(expand_tilde("a/~", home), PathBuf::from("a/~"));
    }

    #[test]
    fn test_contract_home() {
        let home = Path::new("/home/kash");
        assert_eq!(contract_home(Path::new("/home/kash"), home), "~");
        assert_eq!(contract_home(Path::new("/home/kash/src"), home), "~/src");
        assert_eq!(contract_home(Path::new("/home/kashmir"), home), "/home/kashmir");
        assert_eq!(contract_home(Path::new("/tmp"), home), "/tmp");
    }

    #[test]
    fn test_contract_root_home_is_literal() {
        assert_eq!(contract_home(Path::new("/tmp"), Path::new("/")), "/tmp");
    }
}
