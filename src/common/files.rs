//! Small filesystem utilities.

use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use walkdir::WalkDir;

use super::{Error, Result};

/// Resolve a wildcard pattern to the single file it names
///
/// The walk starts at the longest leading part of the pattern without glob
/// metacharacters. Zero or several matches raise `InvalidWildcard`.
pub fn glob_file(pattern: &str) -> Result<PathBuf> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| Error::InvalidOperation(format!("invalid glob {pattern:?}: {e}")))?
        .compile_matcher();

    let root = literal_prefix(Path::new(pattern));
    let mut matches = Vec::new();
    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry during glob");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let p = entry.path();
        let candidate = if root == Path::new(".") {
            p.strip_prefix(".").unwrap_or(p)
        } else {
            p
        };
        if matcher.is_match(candidate) {
            matches.push(candidate.to_path_buf());
        }
    }

    if matches.len() != 1 {
        return Err(Error::InvalidWildcard {
            pattern: pattern.to_string(),
            count: matches.len(),
        });
    }
    Ok(matches.remove(0))
}

fn literal_prefix(pattern: &Path) -> PathBuf {
    let mut root = PathBuf::new();
    for comp in pattern.components() {
        let has_meta = match comp {
            Component::Normal(s) => s.to_string_lossy().contains(['*', '?', '[', '{']),
            _ => false,
        };
        if has_meta {
            break;
        }
        root.push(comp);
    }
    // The last literal component may itself be the file name
    if root == pattern {
        root.pop();
    }
    if root.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        root
    }
}

/// Copy the contents of `from` into `to`, creating `to` if needed
pub fn copy_dir_contents(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)?;
    let mut options = fs_extra::dir::CopyOptions::new();
    options.overwrite = true;
    options.content_only = true;
    fs_extra::dir::copy(from, to, &options).map_err(|e| {
        Error::Io(std::io::Error::other(format!(
            "copying {} to {}: {e}",
            from.display(),
            to.display()
        )))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_glob_single_match() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("result_1.json"), "{}").unwrap();
        fs::write(tmp.path().join("notes.txt"), "").unwrap();

        let pattern = format!("{}/result_*.json", tmp.path().display());
        assert_eq!(glob_file(&pattern).unwrap(), tmp.path().join("result_1.json"));
    }

    #[test]
    fn test_glob_no_match() {
        let tmp = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.json", tmp.path().display());
        assert!(matches!(
            glob_file(&pattern),
            Err(Error::InvalidWildcard { count: 0, .. })
        ));
    }

    #[test]
    fn test_glob_multiple_matches() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.json"), "{}").unwrap();
        fs::write(tmp.path().join("b.json"), "{}").unwrap();

        let pattern = format!("{}/*.json", tmp.path().display());
        assert!(matches!(
            glob_file(&pattern),
            Err(Error::InvalidWildcard { count: 2, .. })
        ));
    }

    #[test]
    fn test_glob_literal_path() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("exact.tsv");
        fs::write(&file, "a\tb\n").unwrap();
        assert_eq!(glob_file(&file.display().to_string()).unwrap(), file);
    }

    #[test]
    fn test_copy_dir_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("input");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested").join("data.json"), "[]").unwrap();
        let dst = tmp.path().join("run").join("input");

        copy_dir_contents(&src, &dst).unwrap();
        assert!(dst.join("nested").join("data.json").exists());
    }
}
