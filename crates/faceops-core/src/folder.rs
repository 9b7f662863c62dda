//! Folder-to-identity extraction for bulk registration.
//!
//! A bulk import directory is laid out as `<root>/<person>/<image>`. Each
//! first-level subfolder names one identity; its first image is used as the
//! representative face.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Image extensions accepted for registration (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// One identity to register: display name plus its representative image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkCandidate<F = PathBuf> {
    pub name: String,
    pub file: F,
}

/// Whether `file_name` ends in `.` plus one of [`IMAGE_EXTENSIONS`].
///
/// Only the suffix is checked, so a bare `.jpg` qualifies too.
pub fn is_supported_image(file_name: &str) -> bool {
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    IMAGE_EXTENSIONS
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
}

/// Identity name for a `/`-separated relative path, if the file qualifies.
///
/// Needs at least `<root>/<person>/<file>`; the second segment is the name.
pub fn identity_for(relative_path: &str) -> Option<&str> {
    let segments: Vec<&str> = relative_path.split('/').collect();
    if segments.len() < 3 {
        return None;
    }
    let file_name = segments[segments.len() - 1];
    if !is_supported_image(file_name) {
        return None;
    }
    let name = segments[1];
    (!name.is_empty()).then_some(name)
}

/// Pick one representative file per identity from `(relative_path, file)` pairs.
///
/// The first qualifying file seen for an identity wins; later files for the
/// same identity and non-qualifying files are skipped.
pub fn extract_identities<F, I, S>(files: I) -> BTreeMap<String, F>
where
    I: IntoIterator<Item = (S, F)>,
    S: AsRef<str>,
{
    let mut selected = BTreeMap::new();
    for (relative_path, file) in files {
        let Some(name) = identity_for(relative_path.as_ref()) else {
            continue;
        };
        selected.entry(name.to_string()).or_insert(file);
    }
    selected
}

/// Flatten an identity map into ordered registration candidates.
pub fn into_candidates<F>(selected: BTreeMap<String, F>) -> Vec<BulkCandidate<F>> {
    selected
        .into_iter()
        .map(|(name, file)| BulkCandidate { name, file })
        .collect()
}

/// Walk `root` and select one image per first-level subfolder.
///
/// Entries are visited in file-name order so that "first image" is stable
/// across runs. Relative paths start with the root folder's own name, the
/// way a directory picker reports them. Unreadable entries are skipped.
pub fn scan_directory(root: &Path) -> Vec<BulkCandidate> {
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());

    let files = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let rel = e.path().strip_prefix(root).ok()?;
            let mut joined = root_name.clone();
            for component in rel.components() {
                joined.push('/');
                joined.push_str(&component.as_os_str().to_string_lossy());
            }
            Some((joined, e.into_path()))
        });

    let candidates = into_candidates(extract_identities(files));
    tracing::debug!(root = %root.display(), count = candidates.len(), "scanned bulk folder");
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_picks_first_file_per_folder() {
        let selected = extract_identities([
            ("faces/alice/a.jpg", "a.jpg"),
            ("faces/alice/b.jpg", "b.jpg"),
            ("faces/bob/c.png", "c.png"),
        ]);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected["alice"], "a.jpg");
        assert_eq!(selected["bob"], "c.png");
    }

    #[test]
    fn test_input_order_decides_winner() {
        let selected = extract_identities([
            ("faces/alice/z.jpg", 1),
            ("faces/alice/a.jpg", 2),
        ]);
        assert_eq!(selected["alice"], 1);
    }

    #[test]
    fn test_skips_shallow_and_non_images() {
        let selected = extract_identities([
            ("faces/loose.jpg", 1),
            ("faces/carol/notes.txt", 2),
            ("faces/carol/README", 3),
            ("faces/dave/Portrait.JPEG", 5),
        ]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected["dave"], 5);
    }

    #[test]
    fn test_suffix_only_file_name_qualifies() {
        let selected = extract_identities([("faces/carol/.jpg", 4), ("faces/carol/b.png", 5)]);
        assert_eq!(selected["carol"], 4);
    }

    #[test]
    fn test_nested_files_belong_to_first_level_folder() {
        let selected = extract_identities([("faces/erin/2019/old.bmp", "old")]);
        assert_eq!(selected["erin"], "old");
    }

    #[test]
    fn test_supported_extensions() {
        for name in ["a.jpg", "a.JPG", "a.jpeg", "a.png", "a.Bmp", ".jpg"] {
            assert!(is_supported_image(name), "{name}");
        }
        for name in ["a.gif", "a.jpg.txt", "jpg", "a."] {
            assert!(!is_supported_image(name), "{name}");
        }
    }

    #[test]
    fn test_into_candidates_is_sorted_by_name() {
        let candidates = into_candidates(extract_identities([
            ("r/zoe/1.png", 1),
            ("r/adam/1.png", 2),
        ]));
        let names: Vec<_> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["adam", "zoe"]);
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("import");
        for (person, file) in [
            ("alice", "b.jpg"),
            ("alice", "a.jpg"),
            ("bob", "c.png"),
            ("bob", "notes.txt"),
            ("empty", "readme.md"),
        ] {
            fs::create_dir_all(root.join(person)).unwrap();
            fs::write(root.join(person).join(file), b"x").unwrap();
        }
        fs::write(root.join("top.jpg"), b"x").unwrap();

        let candidates = scan_directory(&root);
        assert_eq!(
            candidates,
            vec![
                BulkCandidate {
                    name: "alice".into(),
                    file: root.join("alice").join("a.jpg"),
                },
                BulkCandidate {
                    name: "bob".into(),
                    file: root.join("bob").join("c.png"),
                },
            ]
        );
    }
}
