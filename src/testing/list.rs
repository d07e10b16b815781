//! Listing available tests

use std::io::Write;
use std::path::PathBuf;

use super::discovery::{find_all_tests, find_tests_by_tag, TestDir};
use super::tags::TagOp;
use crate::common::Result;

/// Lists the tests in the search directories, optionally filtered by tag
#[derive(Debug, Clone)]
pub struct ListRunner {
    search_dirs: Vec<PathBuf>,
    tags: Vec<String>,
    tag_op: TagOp,
}

impl ListRunner {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            tags: Vec::new(),
            tag_op: TagOp::default(),
        }
    }

    pub fn tags(mut self, tags: Vec<String>, op: TagOp) -> Self {
        self.tags = tags;
        self.tag_op = op;
        self
    }

    /// Sorted test names
    pub fn list(&self) -> Result<Vec<String>> {
        let tests = if self.tags.is_empty() {
            find_all_tests(&self.search_dirs)?
        } else {
            find_tests_by_tag(&self.tags, self.tag_op, &self.search_dirs)?
        };
        let mut names: Vec<String> = tests.iter().map(|p| TestDir::new(p).name()).collect();
        names.sort();
        Ok(names)
    }

    /// Print one name per line
    pub fn run(&self, out: &mut impl Write) -> Result<Vec<String>> {
        let names = self.list()?;
        for name in &names {
            writeln!(out, "{name}")?;
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::paths::CONFIG_FILE;
    use std::fs;

    #[test]
    fn test_list_sorted_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        for (name, tags) in [("zeta", "[Short]"), ("alpha", "[Long]"), ("mid", "[Short]")] {
            let dir = tmp.path().join(name);
            fs::create_dir(&dir).unwrap();
            fs::write(
                dir.join(CONFIG_FILE),
                format!("description: d\ninput_data: none\ntags: {tags}\nsteps: []\n"),
            )
            .unwrap();
        }

        let runner = ListRunner::new(vec![tmp.path().to_path_buf()]);
        let mut out = Vec::new();
        assert_eq!(runner.run(&mut out).unwrap(), ["alpha", "mid", "zeta"]);
        assert_eq!(String::from_utf8(out).unwrap(), "alpha\nmid\nzeta\n");

        let short = runner.tags(vec!["short".into()], TagOp::Any);
        assert_eq!(short.list().unwrap(), ["mid", "zeta"]);
    }
}
