//! Scaffolding new tests

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::common::paths::{CONFIG_FILE, DATE_FMT, INPUT_DIR};
use crate::common::Result;

const CONFIG_TEMPLATE: &str = r#"# Test configuration
description: "Describe what this test checks"
input_data: "Describe the files placed in input/"
author: {author}
created_on: "{date}"

# At least one runtime tag is required (Short, Medium or Long)
tags:
  - name: Short
    info: Runs in seconds
  - FunctionalTest

# Actions: subprocess, run_function, assert_eq, assert_in, assert_data_frame_contains, ...
steps:
  - action: subprocess
    command: [ls, input]
"#;

/// Creates new test directories from a template config
#[derive(Debug, Clone)]
pub struct TemplateRunner {
    dir: PathBuf,
    author: String,
}

impl TemplateRunner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            author: String::new(),
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Render the template config
    pub fn render(&self) -> String {
        // A JSON string literal is also a valid YAML scalar
        let author = serde_json::Value::String(self.author.clone()).to_string();
        CONFIG_TEMPLATE
            .replace("{author}", &author)
            .replace("{date}", &Local::now().format(DATE_FMT).to_string())
    }

    /// Create one test per name, skipping names that already exist
    pub fn run<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for name in names {
            let test = self.dir.join(name.as_ref());
            if test.exists() {
                tracing::warn!(path = %test.display(), "Test already exists, skipping");
                continue;
            }
            self.scaffold(&test)?;
            println!("Created {}", test.display());
            created.push(test);
        }
        Ok(created)
    }

    fn scaffold(&self, test: &Path) -> Result<()> {
        std::fs::create_dir_all(test.join(INPUT_DIR))?;
        std::fs::write(test.join(CONFIG_FILE), self.render())?;
        tracing::debug!(path = %test.display(), "Scaffolded test");
        Ok(())
    }
}
