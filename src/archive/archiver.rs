use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use derive_more::Display;
use flate2::Compression;
use flate2::write::GzEncoder;
use snafu::{ResultExt, Snafu, ensure};
use tar::Builder;
use tracing::{debug, info};

const ARCHIVE_PREFIX: &str = "z-backup-";
const ARCHIVE_SUFFIX: &str = ".tar.gz";
const PARTIAL_SUFFIX: &str = ".tmp";

/// File name of the archive produced for a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub struct ArchiveName(String);

impl ArchiveName {
    pub fn for_directory(directory: &str) -> Self {
        Self(format!("{ARCHIVE_PREFIX}{directory}{ARCHIVE_SUFFIX}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Packs subdirectories of `root` into gzip-compressed tarballs placed in `root`.
#[derive(Debug, Clone)]
pub struct Archiver {
    root: PathBuf,
    compression: Compression,
}

impl Archiver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compression: Compression::default(),
        }
    }

    /// Archives `directory` with everything below it, paths rooted at its name.
    ///
    /// The tarball is written under a temporary name and renamed over any
    /// previous archive only once it is complete. Setting `abandoned` stops
    /// the job at its next write; the partial file is removed and the
    /// previous archive, if any, stays in place.
    pub fn create_archive(
        &self,
        directory: &str,
        abandoned: &AtomicBool,
    ) -> Result<ArchiveName, ArchiveError> {
        let name = ArchiveName::for_directory(directory);
        ensure!(
            !abandoned.load(Ordering::Acquire),
            AbandonedSnafu {
                directory: directory.to_string()
            }
        );
        let destination = self.root.join(name.as_str());
        let partial = self.root.join(format!("{name}{PARTIAL_SUFFIX}"));

        let result = self
            .write_archive(directory, &partial, abandoned)
            .and_then(|()| {
                ensure!(
                    !abandoned.load(Ordering::Acquire),
                    AbandonedSnafu {
                        directory: directory.to_string()
                    }
                );
                fs::rename(&partial, &destination).context(RenameSnafu {
                    path: destination.clone(),
                })
            });

        if let Err(err) = result {
            debug!("Removing partial archive {}", partial.display());
            let _ = fs::remove_file(&partial);
            if abandoned.load(Ordering::Acquire) {
                return AbandonedSnafu {
                    directory: directory.to_string(),
                }
                .fail();
            }
            return Err(err);
        }

        info!("Created archive {}", destination.display());
        Ok(name)
    }

    fn write_archive(
        &self,
        directory: &str,
        partial: &Path,
        abandoned: &AtomicBool,
    ) -> Result<(), ArchiveError> {
        let file = File::create(partial).context(CreateSnafu {
            path: partial.to_path_buf(),
        })?;
        let output = Abandonable {
            inner: BufWriter::new(file),
            abandoned,
        };

        let mut builder = Builder::new(GzEncoder::new(output, self.compression));
        builder.follow_symlinks(false);
        builder
            .append_dir_all(directory, self.root.join(directory))
            .context(AppendSnafu {
                directory: directory.to_string(),
            })?;

        builder
            .into_inner()
            .and_then(GzEncoder::finish)
            .and_then(|mut writer| writer.flush())
            .context(FinishSnafu {
                path: partial.to_path_buf(),
            })
    }
}

/// Fails every write once `abandoned` is set.
struct Abandonable<'a, W> {
    inner: W,
    abandoned: &'a AtomicBool,
}

impl<W: Write> Abandonable<'_, W> {
    fn check(&self) -> io::Result<()> {
        if self.abandoned.load(Ordering::Acquire) {
            return Err(io::Error::other("archive abandoned"));
        }
        Ok(())
    }
}

impl<W: Write> Write for Abandonable<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check()?;
        self.inner.flush()
    }
}

#[derive(Debug, Snafu)]
pub enum ArchiveError {
    #[snafu(display("Archiving {directory} was abandoned"))]
    Abandoned { directory: String },
    #[snafu(display("Failed to create {}: {source}", path.display()))]
    CreateError { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to add {directory} to the archive: {source}"))]
    AppendError { directory: String, source: io::Error },
    #[snafu(display("Failed to finish writing {}: {source}", path.display()))]
    FinishError { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to move the archive into place at {}: {source}", path.display()))]
    RenameError { path: PathBuf, source: io::Error },
}
