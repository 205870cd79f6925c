use std::io;
use std::path::{Component, Path, PathBuf};

use regex::{Captures, Regex};

/// Replace the tag of every `artifact:<tag>` reference in `content`.
///
/// A reference must start a line or follow whitespace, a quote, `/` or `=`,
/// so `nginx` matches `image: nginx:1.2` and `docker.io/library/nginx:1.2`
/// but not `my-nginx:1.2`. Returns `None` when nothing changes.
pub fn rewrite_references(content: &str, artifact: &str, version: &str) -> Option<String> {
    let pattern = reference_pattern(artifact)?;
    let mut changed = false;
    let rewritten = pattern.replace_all(content, |caps: &Captures<'_>| {
        if &caps[3] != version {
            changed = true;
        }
        format!("{}{}:{version}", &caps[1], &caps[2])
    });
    changed.then(|| rewritten.into_owned())
}

fn reference_pattern(artifact: &str) -> Option<Regex> {
    if artifact.is_empty() {
        return None;
    }
    Regex::new(&format!(
        r#"(?m)(^|[\s"'/=])({}):([A-Za-z0-9_][A-Za-z0-9_.\-]*)"#,
        regex::escape(artifact)
    ))
    .ok()
}

/// Files under `root` whose name ends in one of `extensions`, skipping `.git`.
pub fn matching_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let base = glob::Pattern::escape(&root.to_string_lossy());
    let mut files: Vec<PathBuf> = extensions
        .iter()
        .filter_map(|ext| glob::glob(&format!("{base}/**/*{ext}")).ok())
        .flat_map(|paths| paths.filter_map(Result::ok))
        .filter(|p| p.is_file() && !in_git_dir(root, p))
        .collect();
    files.sort();
    files.dedup();
    files
}

fn in_git_dir(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .map(|rel| rel.components().any(|c| c == Component::Normal(".git".as_ref())))
        .unwrap_or(false)
}

/// Rewrite references in every matching file under `root`, returning the files
/// that changed.
pub fn rewrite_tree(
    root: &Path,
    extensions: &[String],
    artifact: &str,
    version: &str,
) -> io::Result<Vec<PathBuf>> {
    let mut changed = Vec::new();
    for path in matching_files(root, extensions) {
        let Ok(content) = std::fs::read_to_string(&path) else {
            tracing::debug!(path = %path.display(), "Skipping non-UTF-8 file");
            continue;
        };
        if let Some(updated) = rewrite_references(&content, artifact, version) {
            std::fs::write(&path, updated)?;
            changed.push(path);
        }
    }
    Ok(changed)
}
