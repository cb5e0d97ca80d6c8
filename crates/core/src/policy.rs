//! Indexing Policy — merges the hardcoded denylist, gitignore, user globs,
//! and file-size caps into a single accept/reject decision per candidate
//! file. Gitignore handling reuses the `ignore` crate's `Gitignore`, the
//! same crate the teacher's `scan.rs` uses for its `WalkBuilder`.

use crate::config::Config;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

pub const GITIGNORE_DEPTH_CAP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCategory {
    Binary,
    Denylist,
    Ignored,
    Size,
    Pattern,
}

impl RejectCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectCategory::Binary => "binary",
            RejectCategory::Denylist => "denylist",
            RejectCategory::Ignored => "ignored",
            RejectCategory::Size => "size",
            RejectCategory::Pattern => "pattern",
        }
    }
}

pub struct Decision {
    pub should_index: bool,
    pub reason: Option<String>,
    pub category: Option<RejectCategory>,
}

impl Decision {
    fn accept() -> Self {
        Self { should_index: true, reason: None, category: None }
    }
    fn reject(category: RejectCategory, reason: impl Into<String>) -> Self {
        Self { should_index: false, reason: Some(reason.into()), category: Some(category) }
    }
}

const DENYLIST_DIRS: &[&str] = &["node_modules/", ".git/", "dist/", "build/"];
const DENYLIST_GLOBS: &[&str] = &["**/.env", "**/.env.*", "**/*.pem", "**/*.key"];
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "mp3", "mp4", "mov", "avi", "zip",
    "tar", "gz", "bz2", "7z", "rar", "exe", "dll", "so", "dylib", "bin", "o", "a", "class", "jar",
    "pdf", "woff", "woff2", "ttf", "eot", "wasm", "pyc", "db", "sqlite",
];

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

/// Decides, for each candidate file, whether it should be indexed.
pub struct IndexingPolicy {
    include: GlobSet,
    exclude: GlobSet,
    denylist_globs: GlobSet,
    respect_gitignore: bool,
    gitignore: Option<Gitignore>,
    max_file_size: u64,
    max_files: usize,
}

impl IndexingPolicy {
    pub fn new(project_root: &Path, config: &Config) -> Self {
        let gitignore = if config.respect_gitignore {
            load_gitignore(project_root)
        } else {
            None
        };

        Self {
            include: build_globset(&config.include),
            exclude: build_globset(&config.exclude),
            denylist_globs: build_globset(
                &DENYLIST_GLOBS.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            ),
            respect_gitignore: config.respect_gitignore,
            gitignore,
            max_file_size: config.max_file_size_bytes(),
            max_files: config.max_files,
        }
    }

    /// Evaluate a single candidate. `accepted_so_far` is the running count of
    /// files already accepted, used to enforce the file cap (step 6).
    pub fn evaluate(&self, rel_path: &str, size_bytes: u64, accepted_so_far: usize) -> Decision {
        let ext = rel_path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default();

        // 1. Hardcoded denylist (always blocks, even against user includes).
        if DENYLIST_DIRS.iter().any(|d| rel_path.starts_with(d) || rel_path.contains(&format!("/{d}")))
        {
            return Decision::reject(RejectCategory::Denylist, "matches the hardcoded denylist");
        }
        if self.denylist_globs.is_match(rel_path) {
            return Decision::reject(RejectCategory::Denylist, "credential file pattern");
        }
        if BINARY_EXTENSIONS.contains(&ext.as_str()) {
            return Decision::reject(RejectCategory::Binary, format!("binary extension .{ext}"));
        }

        // 2. User exclude globs.
        if self.exclude.is_match(rel_path) {
            return Decision::reject(RejectCategory::Pattern, "matches a user exclude pattern");
        }

        // 3. Gitignore.
        if self.respect_gitignore {
            if let Some(gi) = &self.gitignore {
                if gi.matched(rel_path, false).is_ignore() {
                    return Decision::reject(RejectCategory::Ignored, "matches .gitignore");
                }
            }
        }

        // 4. Size cap.
        if size_bytes > self.max_file_size {
            return Decision::reject(
                RejectCategory::Size,
                format!("{size_bytes} bytes exceeds the {}-byte cap", self.max_file_size),
            );
        }

        // 5. User include globs.
        if !self.include.is_match(rel_path) {
            return Decision::reject(RejectCategory::Pattern, "does not match any include pattern");
        }

        // 6. File cap.
        if accepted_so_far >= self.max_files {
            return Decision::reject(RejectCategory::Pattern, "maxFiles cap reached");
        }

        Decision::accept()
    }
}

/// Load `.gitignore` files from `project_root` downward, capped at
/// `GITIGNORE_DEPTH_CAP` levels of directory traversal.
fn load_gitignore(project_root: &Path) -> Option<Gitignore> {
    let mut builder = GitignoreBuilder::new(project_root);
    let mut added_any = false;
    let mut stack = vec![(project_root.to_path_buf(), 0usize)];
    while let Some((dir, depth)) = stack.pop() {
        if depth > GITIGNORE_DEPTH_CAP {
            continue;
        }
        let candidate = dir.join(".gitignore");
        if candidate.is_file() {
            if builder.add(&candidate).is_none() {
                added_any = true;
            }
        }
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() && !path.ends_with(".git") {
                    stack.push((path, depth + 1));
                }
            }
        }
    }
    if added_any {
        builder.build().ok()
    } else {
        None
    }
}
