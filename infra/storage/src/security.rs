//! Path guard: turns untrusted folder and file names into paths that provably
//! stay inside the storage root.
//!
//! Folder and file names are sanitized as independent components, never as a
//! joined path string, so one component cannot smuggle separators into the
//! other. The joined result is then re-checked physically: existing ancestors
//! are canonicalized so a symlink planted inside the root cannot redirect a
//! write outside of it.

use crate::error::StorageError;
use std::path::{Component, Path, PathBuf};

/// Sanitizes one untrusted name component.
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`; whitespace and path separators
/// become `_`; everything else (NUL bytes, control and non-ASCII characters) is
/// dropped. Leading and trailing dots and underscores are trimmed, which also
/// neutralizes `.` and `..`. The result may be empty.
#[must_use]
pub fn sanitize_component(input: &str) -> String {
    let mapped: String = input
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') => Some(c),
            '/' | '\\' => Some('_'),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();

    mapped.trim_matches(|c| c == '.' || c == '_').to_owned()
}

/// Sanitizes an optional folder name, falling back to `default` when nothing
/// usable remains.
#[must_use]
pub fn folder_or_default(input: Option<&str>, default: &str) -> String {
    let sanitized = input.map(sanitize_component).unwrap_or_default();
    if sanitized.is_empty() { sanitize_component(default) } else { sanitized }
}

/// Sanitizes a component that must not be empty (file names, snapshot ids).
pub fn require_component(input: &str, what: &'static str) -> Result<String, StorageError> {
    let sanitized = sanitize_component(input);
    if sanitized.is_empty() {
        return Err(StorageError::containment(
            format!("{what} {input:?}"),
            "Name is empty after sanitization",
        ));
    }
    Ok(sanitized)
}

/// Name of an object that already exists: kept verbatim when it is a single
/// plain component, sanitized otherwise.
///
/// Restored snapshots may hold names that upload would never mint (spaces,
/// non-ASCII). Sanitizing those on lookup would make them unreachable, so
/// only new names go through [`sanitize_component`] unconditionally. The
/// result is still containment-checked by [`resolve`].
#[must_use]
pub fn lookup_component(input: &str) -> String {
    if is_plain_component(input) { input.to_owned() } else { sanitize_component(input) }
}

/// [`lookup_component`] for names that must not be empty.
pub fn require_lookup(input: &str, what: &'static str) -> Result<String, StorageError> {
    let name = lookup_component(input);
    if name.is_empty() {
        return Err(StorageError::containment(
            format!("{what} {input:?}"),
            "Name is empty after sanitization",
        ));
    }
    Ok(name)
}

fn is_plain_component(input: &str) -> bool {
    if input.is_empty() || input.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut parts = Path::new(input).components();
    matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None))
}

/// Builds `<root>/<folder>/<name>` from already sanitized components and
/// verifies containment. An empty `folder` addresses the root level.
pub(crate) fn resolve(root: &Path, folder: &str, name: &str) -> Result<PathBuf, StorageError> {
    let mut relative = PathBuf::new();
    if !folder.is_empty() {
        relative.push(single_component(folder)?);
    }
    if !name.is_empty() {
        relative.push(single_component(name)?);
    }

    contain(root, &root.join(relative))
}

/// Validates a relative, `/`-separated path coming from an archive entry and
/// resolves it under `root`.
///
/// Unlike user-facing names, archived components are not rewritten (a backup
/// must restore byte-identical names), so anything that is not a plain
/// component is rejected outright.
pub(crate) fn resolve_relative(root: &Path, relative: &str) -> Result<PathBuf, StorageError> {
    contain(root, &root.join(normalize_relative(relative)?))
}

/// Lexical validation of an archive-relative path.
pub(crate) fn normalize_relative(relative: &str) -> Result<PathBuf, StorageError> {
    if relative.contains('\0') || relative.contains('\\') {
        return Err(StorageError::containment(
            relative.to_owned(),
            "Entry name contains NUL or backslash",
        ));
    }

    let mut out = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(segment) => out.push(segment),
            Component::CurDir => {},
            Component::ParentDir => {
                return Err(StorageError::containment(
                    relative.to_owned(),
                    "Entry attempted to escape the root via '..'",
                ));
            },
            Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::containment(
                    relative.to_owned(),
                    "Absolute entry paths are not allowed",
                ));
            },
        }
    }

    if out.as_os_str().is_empty() {
        return Err(StorageError::containment(relative.to_owned(), "Entry name is empty"));
    }
    Ok(out)
}

fn single_component(component: &str) -> Result<&str, StorageError> {
    let mut parts = Path::new(component).components();
    match (parts.next(), parts.next()) {
        (Some(Component::Normal(_)), None) if !component.contains('\0') => Ok(component),
        _ => Err(StorageError::containment(
            component.to_owned(),
            "Component is not a single plain name",
        )),
    }
}

/// Verifies that `joined` is a strict descendant of `root`, physically.
///
/// `root` must already be canonical. When the target exists it is
/// canonicalized directly; otherwise the nearest existing ancestor is.
fn contain(root: &Path, joined: &Path) -> Result<PathBuf, StorageError> {
    if joined == root || !joined.starts_with(root) {
        return Err(StorageError::containment(
            joined.display().to_string(),
            "Path is outside the storage root",
        ));
    }

    let mut current = Some(joined);
    while let Some(path) = current {
        if path == root {
            return Ok(joined.to_path_buf());
        }

        match path.symlink_metadata() {
            Ok(_) => {
                return match path.canonicalize() {
                    Ok(canonical) if canonical.starts_with(root) && canonical != root => {
                        Ok(joined.to_path_buf())
                    },
                    Ok(canonical) if canonical == root && path != joined => {
                        Ok(joined.to_path_buf())
                    },
                    Ok(canonical) => Err(StorageError::containment(
                        canonical.display().to_string(),
                        "Existing path resolves outside the storage root",
                    )),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        Err(StorageError::containment(
                            path.display().to_string(),
                            "Dangling symlink inside the storage root",
                        ))
                    },
                    Err(e) => Err(StorageError::Io {
                        source: e,
                        context: Some(format!("Failed to verify {}", path.display()).into()),
                    }),
                };
            },
            Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory) => {
                current = path.parent();
            },
            Err(e) => {
                return Err(StorageError::Io {
                    source: e,
                    context: Some(format!("Failed to inspect {}", path.display()).into()),
                });
            },
        }
    }

    Err(StorageError::containment(
        joined.display().to_string(),
        "No ancestor within the storage root",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn canonical_root() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        (tmp, root)
    }

    #[test]
    fn sanitize_strips_traversal_and_separators() {
        assert_eq!(sanitize_component("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_component(".."), "");
        assert_eq!(sanitize_component("."), "");
        assert_eq!(sanitize_component("/abs/path.png"), "abs_path.png");
        assert_eq!(sanitize_component("a\\b.png"), "a_b.png");
        assert_eq!(sanitize_component("nul\0byte.png"), "nulbyte.png");
        assert_eq!(sanitize_component("my photo.PNG"), "my_photo.PNG");
        assert_eq!(sanitize_component("é.png"), "png");
    }

    #[test]
    fn folder_falls_back_to_default() {
        assert_eq!(folder_or_default(None, "default"), "default");
        assert_eq!(folder_or_default(Some(""), "default"), "default");
        assert_eq!(folder_or_default(Some("../.."), "default"), "default");
        assert_eq!(folder_or_default(Some("avatars"), "default"), "avatars");
    }

    #[test]
    fn require_rejects_empty_names() {
        let err = require_component("..", "file").unwrap_err();
        assert_eq!(err.code(), "containment");
        assert_eq!(require_component("a.png", "file").unwrap(), "a.png");
    }

    #[test]
    fn lookup_keeps_existing_plain_names() {
        assert_eq!(lookup_component("My Pics"), "My Pics");
        assert_eq!(lookup_component("été.png"), "été.png");
        assert_eq!(lookup_component("../secret.png"), "secret.png");
        assert_eq!(lookup_component(".."), "");
        assert_eq!(lookup_component("a\\b.png"), "a_b.png");
        assert_eq!(require_lookup("..", "file").unwrap_err().code(), "containment");
        assert_eq!(require_lookup("My Photo.png", "file").unwrap(), "My Photo.png");
    }

    #[test]
    fn resolve_stays_under_root() {
        let (_tmp, root) = canonical_root();
        let path = resolve(&root, "avatars", "a.png").unwrap();
        assert_eq!(path, root.join("avatars").join("a.png"));

        let top = resolve(&root, "", "a.png").unwrap();
        assert_eq!(top, root.join("a.png"));
    }

    #[test]
    fn resolve_rejects_unsanitized_components() {
        let (_tmp, root) = canonical_root();
        assert!(resolve(&root, "..", "a.png").is_err());
        assert!(resolve(&root, "a/b", "c.png").is_err());
        assert!(resolve(&root, "", "/etc/passwd").is_err());
        assert!(resolve(&root, "", "").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlink_escape() {
        let (_tmp, root) = canonical_root();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("escape")).unwrap();

        let err = resolve(&root, "escape", "a.png").unwrap_err();
        assert_eq!(err.code(), "containment");
    }

    #[test]
    fn resolve_walks_past_existing_file_ancestor() {
        let (_tmp, root) = canonical_root();
        std::fs::write(root.join("solo.png"), b"x").unwrap();

        let path = resolve_relative(&root, "solo.png/inner.png").unwrap();
        assert_eq!(path, root.join("solo.png").join("inner.png"));
    }

    #[test]
    fn normalize_relative_rejects_escapes() {
        assert!(normalize_relative("../x.png").is_err());
        assert!(normalize_relative("a/../../x.png").is_err());
        assert!(normalize_relative("/etc/passwd").is_err());
        assert!(normalize_relative("a\\..\\x").is_err());
        assert!(normalize_relative("").is_err());
        assert_eq!(normalize_relative("./a/b.png").unwrap(), PathBuf::from("a/b.png"));
    }
}
