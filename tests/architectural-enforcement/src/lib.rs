//! Architectural Enforcement Integration Tests
//!
//! Shared helpers for the tests in `tests/`, which enforce:
//! - No blocking or polling sleeps in library code
//! - No `println!`/`eprintln!` in library code (use `tracing`)
//! - No `unwrap()`/`expect()` in library code (propagate errors)
//!
//! Only production code is scanned: a file's `#[cfg(test)]` module and
//! everything after it are skipped, as are comment lines.

use std::fs;
use std::path::{Path, PathBuf};

/// Library source roots checked by the tests
pub const PRODUCTION_DIRS: &[&str] = &["simpx/core/src"];

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File the line is in
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Workspace root, two levels above this crate
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Production lines of a source file as `(line number, code)` pairs
///
/// Stops at the first `#[cfg(test)]`; drops comment lines and trailing
/// `//` comments.
#[must_use]
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(idx, line)| (idx + 1, line.split("//").next().unwrap_or(line)))
        .collect()
}

/// Scan every `.rs` file under the production roots with `is_violation`
pub fn scan(is_violation: impl Fn(&str) -> bool) -> Vec<Violation> {
    let mut violations = Vec::new();
    let root = workspace_root();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        {
            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };
            for (line, code) in production_lines(&content) {
                if is_violation(code) {
                    violations.push(Violation {
                        path: entry.path().to_path_buf(),
                        line,
                        text: code.trim().to_owned(),
                    });
                }
            }
        }
    }
    violations
}

/// Panic with a readable report if there are violations
pub fn report(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    let lines: Vec<String> = violations.iter().map(|v| format!("  {v}")).collect();
    panic!(
        "\n{rule}: found {} violation(s) in library code\n{}\n",
        violations.len(),
        lines.join("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_skip_tests_and_comments() {
        let source = "fn a() {}\n// println!(\"x\")\nlet x = 1; // trailing\n#[cfg(test)]\nmod tests { println!(); }\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(1, "fn a() {}"), (3, "let x = 1; ")]);
    }

    #[test]
    fn test_workspace_root_contains_core() {
        assert!(workspace_root().join("simpx/core/src/lib.rs").exists());
    }
}
