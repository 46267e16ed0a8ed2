use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use snafu::{ResultExt, Snafu};
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

use crate::ext::SystemTimeExt;
use crate::history::{Timestamp, Watermark};

/// Version-control directories whose contents never count as a change.
pub const PRUNED_DIRECTORIES: [&str; 2] = ["CVS", ".svn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// The first entry found to be newer than the watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub modified_at: SystemTime,
}

impl Modification {
    pub fn timestamp(&self) -> Timestamp {
        self.modified_at.to_timestamp()
    }
}

/// Walks `directory` depth-first and returns the first entry modified after
/// `watermark`, or `None` when nothing in the tree is newer.
///
/// The directory itself is inspected as well. Contents of
/// [`PRUNED_DIRECTORIES`] below it are skipped entirely, including their own
/// timestamps. Symbolic links are judged by their own timestamp and never
/// followed.
pub fn is_modified_after(
    directory: &Path,
    watermark: Watermark,
) -> Result<Option<Modification>, DetectionError> {
    debug!(
        "Scanning {} for changes after {}",
        directory.display(),
        watermark
    );

    let entries = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_pruned(entry));

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() > 0 => {
                warn!("Skipping unreadable entry in {}: {err}", directory.display());
                continue;
            }
            Err(err) => {
                return Err(err).context(WalkSnafu {
                    directory: directory.to_path_buf(),
                });
            }
        };
        let modified_at = entry
            .metadata()
            .map_err(io::Error::from)
            .and_then(|metadata| metadata.modified())
            .context(MetadataSnafu {
                path: entry.path().to_path_buf(),
            })?;

        if watermark.is_exceeded_by(modified_at) {
            let kind = if entry.file_type().is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            return Ok(Some(Modification {
                path: entry.into_path(),
                kind,
                modified_at,
            }));
        }
        trace!("{} is unchanged", entry.path().display());
    }

    Ok(None)
}

fn is_pruned(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| PRUNED_DIRECTORIES.contains(&name))
}

#[derive(Debug, Snafu)]
pub enum DetectionError {
    #[snafu(display("Failed to scan {}: {source}", directory.display()))]
    WalkError {
        directory: PathBuf,
        source: walkdir::Error,
    },
    #[snafu(display("Failed to read modification time of {}: {source}", path.display()))]
    MetadataError { path: PathBuf, source: io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        LONG_AGO, age_tree, lock_directory, set_mtime, unlock_directory, write_file,
    };
    use rstest::*;
    use std::fs;
    use tempfile::TempDir;

    const WATERMARK_SECS: u64 = LONG_AGO + 1_000;

    fn watermark() -> Watermark {
        Watermark::ArchivedAt(Timestamp::from_secs(WATERMARK_SECS as i64))
    }

    /// A subdirectory `project` with a nested file, everything older than the watermark.
    fn aged_project() -> TempDir {
        let root = TempDir::new().expect("Failed to create temp directory");
        write_file(&root.path().join("project/readme.txt"), "hello");
        write_file(&root.path().join("project/src/main.c"), "int main;");
        age_tree(root.path(), LONG_AGO);
        root
    }

    #[test]
    fn unchanged_tree_is_not_modified() {
        let root = aged_project();
        let result = is_modified_after(&root.path().join("project"), watermark()).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn never_archived_directory_is_modified() {
        let root = aged_project();
        let result = is_modified_after(&root.path().join("project"), Watermark::Never)
            .unwrap()
            .expect("Expected a modification");

        assert_eq!(result.kind, EntryKind::Directory);
        assert_eq!(result.path, root.path().join("project"));
    }

    #[test]
    fn directory_timestamp_counts() {
        let root = aged_project();
        let project = root.path().join("project");
        set_mtime(&project, WATERMARK_SECS + 1);

        let result = is_modified_after(&project, watermark())
            .unwrap()
            .expect("Expected a modification");

        assert_eq!(result.kind, EntryKind::Directory);
        assert_eq!(result.timestamp(), Timestamp::from_secs(WATERMARK_SECS as i64 + 1));
    }

    #[test]
    fn nested_file_is_found() {
        let root = aged_project();
        let main_c = root.path().join("project/src/main.c");
        set_mtime(&main_c, WATERMARK_SECS + 60);

        let result = is_modified_after(&root.path().join("project"), watermark())
            .unwrap()
            .expect("Expected a modification");

        assert_eq!(result.kind, EntryKind::File);
        assert_eq!(result.path, main_c);
    }

    #[test]
    fn timestamp_equal_to_watermark_is_not_a_change() {
        let root = aged_project();
        set_mtime(&root.path().join("project/readme.txt"), WATERMARK_SECS);

        let result = is_modified_after(&root.path().join("project"), watermark()).unwrap();

        assert_eq!(result, None);
    }

    #[test]
    fn empty_old_directory_is_not_modified() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let empty = root.path().join("empty");
        fs::create_dir(&empty).expect("Failed to create directory");
        set_mtime(&empty, LONG_AGO);

        assert_eq!(is_modified_after(&empty, watermark()).unwrap(), None);
        assert!(is_modified_after(&empty, Watermark::Never).unwrap().is_some());
    }

    #[rstest]
    #[case("CVS")]
    #[case(".svn")]
    fn version_control_directories_are_ignored(#[case] pruned: &str) {
        let root = TempDir::new().expect("Failed to create temp directory");
        let project = root.path().join("project");
        write_file(&project.join("readme.txt"), "hello");
        write_file(&project.join(pruned).join("Entries"), "/readme.txt/1.1///");
        write_file(&project.join("lib").join(pruned).join("Entries"), "");
        age_tree(&project, LONG_AGO);
        age_tree(&project.join(pruned), WATERMARK_SECS + 100);
        age_tree(&project.join("lib").join(pruned), WATERMARK_SECS + 100);

        assert_eq!(is_modified_after(&project, watermark()).unwrap(), None);
    }

    #[test]
    fn similarly_named_directories_are_inspected() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let project = root.path().join("project");
        write_file(&project.join("CVS-notes/todo.txt"), "later");
        age_tree(&project, LONG_AGO);
        set_mtime(&project.join("CVS-notes/todo.txt"), WATERMARK_SECS + 1);

        assert!(is_modified_after(&project, watermark()).unwrap().is_some());
    }

    #[test]
    fn top_level_directory_named_cvs_is_still_scanned() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let cvs = root.path().join("CVS");
        write_file(&cvs.join("Root"), ":pserver:anonymous@example.org:/cvs");
        age_tree(&cvs, LONG_AGO);
        set_mtime(&cvs.join("Root"), WATERMARK_SECS + 1);

        let result = is_modified_after(&cvs, watermark())
            .unwrap()
            .expect("Expected a modification");

        assert_eq!(result.path, cvs.join("Root"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let result = is_modified_after(&root.path().join("absent"), Watermark::Never);
        assert!(matches!(result, Err(DetectionError::WalkError { .. })));
    }

    #[test]
    fn unreadable_subtree_is_skipped() {
        let root = aged_project();
        let project = root.path().join("project");
        let locked = project.join("locked");
        fs::create_dir(&locked).expect("Failed to create directory");
        set_mtime(&locked, LONG_AGO);
        set_mtime(&project, LONG_AGO);
        if !lock_directory(&locked) {
            return;
        }

        let unchanged = is_modified_after(&project, watermark());
        set_mtime(&project.join("readme.txt"), WATERMARK_SECS + 1);
        let changed = is_modified_after(&project, watermark());
        unlock_directory(&locked);

        assert_eq!(unchanged.unwrap(), None);
        assert_eq!(changed.unwrap().map(|m| m.kind), Some(EntryKind::File));
    }

    #[test]
    fn unreadable_directory_itself_is_an_error() {
        let root = aged_project();
        let project = root.path().join("project");
        if !lock_directory(&project) {
            return;
        }

        let result = is_modified_after(&project, watermark());
        unlock_directory(&project);

        assert!(matches!(result, Err(DetectionError::WalkError { .. })));
    }
}
