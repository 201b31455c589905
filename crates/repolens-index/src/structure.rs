//! Text tree of a checked-out repository, baked into the chat system prompt.

use std::fmt::Write;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Directory names skipped outright. A directory is also skipped when its
/// name merely starts with one of these.
#[rustfmt::skip]
const EXCLUDED_DIRS: &[&str] = &[
    ".git", ".svn", ".hg", ".bzr",
    "__pycache__", "venv", "env", ".env", ".venv", "virtualenv",
    ".pytest_cache", ".coverage", "htmlcov", ".tox", "dist", "build", "eggs",
    ".idea", ".vscode", ".vs", ".eclipse", ".settings", ".project",
    ".classpath", ".factorypath", ".nbproject", ".metadata",
    "node_modules", "bower_components", "jspm_packages", ".npm", ".yarn",
    "target", "bin", "out", ".gradle", ".m2",
    "cmake-build-debug", "cmake-build-release", "Debug", "Release", "x64",
    "Win32", "obj", "libs", "lib", "CMakeFiles",
];

/// File names skipped; a leading `*` matches any prefix.
#[rustfmt::skip]
const EXCLUDED_FILES: &[&str] = &[
    ".gitattributes", ".gitignore",
    ".DS_Store", "Thumbs.db",
    "*.pyc", "*.pyo", "*.pyd", "*.so", "*.egg", "*.egg-info",
    ".coverage",
    "*.o", "*.obj", "*.exe", "*.out", "*.app", "*.dll", "*.dylib",
    "*.a", "*.lib", "*.la", "*.lo", "*.d", "*.gcda", "*.gcno", "*.dSYM", "*.sln",
    "npm-debug.log", "yarn-debug.log", "yarn-error.log",
    "*.min.js", "*.bundle.js", "*.map", ".eslintcache",
    "package-lock.json", "yarn.lock",
    "*.class", "*.jar", "*.war", "*.ear", "*.nar",
];

fn dir_excluded(name: &str) -> bool {
    EXCLUDED_DIRS.iter().any(|d| name.starts_with(d))
}

fn file_excluded(name: &str) -> bool {
    EXCLUDED_FILES.iter().any(|p| match p.strip_prefix('*') {
        Some(suffix) => name.ends_with(suffix),
        None => name == *p,
    })
}

/// Render `root` as a box-drawing tree headed by its own directory name.
///
/// Directories come before files; each group is sorted by name.
///
/// # Errors
///
/// Returns an IO error if a directory cannot be listed.
pub fn render_tree(root: &Path) -> Result<String> {
    let name = root
        .file_name()
        .map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().into_owned());
    let mut out = format!("├── {name}");
    render_dir(root, "", &mut out)?;
    Ok(out)
}

fn render_dir(dir: &Path, prefix: &str, out: &mut String) -> Result<()> {
    let mut entries: Vec<(bool, String)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_dir = entry.file_type()?.is_dir();
        let name = entry.file_name().to_string_lossy().into_owned();
        let excluded = if is_dir {
            dir_excluded(&name)
        } else {
            file_excluded(&name)
        };
        if !excluded {
            entries.push((is_dir, name));
        }
    }
    entries.sort_by(|(da, na), (db, nb)| db.cmp(da).then_with(|| na.cmp(nb)));

    let last = entries.len().saturating_sub(1);
    for (i, (is_dir, name)) in entries.iter().enumerate() {
        let connector = if i == last { "└──" } else { "├──" };
        let _ = write!(out, "\n{prefix}{connector} {name}");
        if *is_dir {
            let child = format!("{prefix}{}", if i == last { "    " } else { "│   " });
            render_dir(&dir.join(name), &child, out)?;
        }
    }
    Ok(())
}
