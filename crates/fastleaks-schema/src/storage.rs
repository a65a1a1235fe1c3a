use std::path::{Path, PathBuf};

use crate::hash::Sha256Hash;
use crate::sanitize::sanitize_filename;

/// Compute the content-addressed path for a file, without touching the
/// filesystem.
///
/// Layout: `{root}/{sha[0:2]}/{sha[2:4]}/{sha}_{sanitized_filename}`. The two
/// two-hex-digit prefix directories bound fan-out per directory to 256
/// entries. Pure function of `(root, sha, sanitize(filename))` — the same
/// inputs always produce the same path.
pub fn storage_path(root: &Path, sha256: &Sha256Hash, filename: &str) -> PathBuf {
    let (p1, p2) = sha256.prefixes();
    let safe_name = sanitize_filename(filename);
    root.join(p1).join(p2).join(format!("{sha256}_{safe_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_spec() {
        let sha = Sha256Hash::parse(format!("ab12{}", "0".repeat(60))).unwrap();
        let path = storage_path(Path::new("/storage"), &sha, "leak.txt");
        assert_eq!(
            path,
            Path::new("/storage/ab/12").join(format!("{sha}_leak.txt"))
        );
    }

    #[test]
    fn is_pure_function_of_hash_and_sanitized_name() {
        let sha = Sha256Hash::parse(format!("cd34{}", "1".repeat(60))).unwrap();
        let a = storage_path(Path::new("/storage"), &sha, "re port.txt");
        let b = storage_path(Path::new("/storage"), &sha, "re_port.txt");
        assert_eq!(a, b);
    }

    #[test]
    fn different_roots_do_not_collide() {
        let sha = Sha256Hash::parse(format!("ef56{}", "2".repeat(60))).unwrap();
        let a = storage_path(Path::new("/storage"), &sha, "x.txt");
        let b = storage_path(Path::new("/other"), &sha, "x.txt");
        assert_ne!(a, b);
    }
}
