//! Helpers shared by the unit tests.

use std::fs::{self, File, Permissions};
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, SystemTime};

use flate2::read::GzDecoder;
use walkdir::WalkDir;

/// Seconds since the epoch used for "old" entries in test trees.
pub const LONG_AGO: u64 = 1_000_000_000;

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    fs::write(path, contents).expect("Failed to write test file");
}

pub fn set_mtime(path: &Path, secs: u64) {
    File::open(path)
        .and_then(|file| file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)))
        .expect("Failed to set modification time");
}

/// Removes all access to `path`. Returns false when listing it still
/// succeeds, as it does for a privileged user; the directory is then
/// unlocked again.
pub fn lock_directory(path: &Path) -> bool {
    fs::set_permissions(path, Permissions::from_mode(0o000))
        .expect("Failed to lock directory");
    if fs::read_dir(path).is_ok() {
        unlock_directory(path);
        return false;
    }
    true
}

pub fn unlock_directory(path: &Path) {
    fs::set_permissions(path, Permissions::from_mode(0o755))
        .expect("Failed to unlock directory");
}

/// Stamps every entry below and including `root` with `secs`, children first.
pub fn age_tree(root: &Path, secs: u64) {
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = entry.expect("Failed to walk test tree");
        set_mtime(entry.path(), secs);
    }
}

/// Paths stored in a gzip-compressed tar archive, in archive order.
pub fn archive_entries(archive: &Path) -> Vec<String> {
    let file = File::open(archive).expect("Failed to open archive");
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive
        .entries()
        .expect("Failed to read archive entries")
        .map(|entry| {
            let entry = entry.expect("Failed to read archive entry");
            let path = entry.path().expect("Invalid entry path");
            path.to_string_lossy().trim_end_matches('/').to_string()
        })
        .collect()
}

/// Contents of the file stored at `member` inside the archive.
pub fn archive_member(archive: &Path, member: &str) -> Option<String> {
    let file = File::open(archive).expect("Failed to open archive");
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    for entry in archive.entries().expect("Failed to read archive entries") {
        let mut entry = entry.expect("Failed to read archive entry");
        if entry.path().expect("Invalid entry path") == Path::new(member) {
            let mut contents = String::new();
            entry
                .read_to_string(&mut contents)
                .expect("Failed to read archive member");
            return Some(contents);
        }
    }
    None
}
