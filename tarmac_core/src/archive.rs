//! Content-addressed archive construction.
//!
//! Every distinct file content is written once under
//! `<root>/.backing_store/<key>`; every file path in the tree becomes a
//! hard-link record pointing at that blob.

use crate::error::{Error, Result};
use crate::hash::{Algorithm, Hash};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tar::{EntryType, Header, HeaderMode};
use tracing::{debug, info};

/// Name of the backing-store directory, directly under the archive root.
///
/// An entry with this name at the top of the source tree is never archived.
pub const BACKING_STORE_DIR: &str = ".backing_store";

/// Options for a single build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Content hash used for dedup keys and blob names.
    pub algorithm: Algorithm,
}

/// Statistics from a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// File entries processed (each produced one link record).
    pub files: u64,
    /// Directories listed, the root included.
    pub directories: u64,
    /// Blob records written to the backing store.
    pub blobs_stored: u64,
    /// Hard-link records written.
    pub links_written: u64,
    /// Content bytes written to the backing store.
    pub bytes_stored: u64,
    /// Content bytes of files whose content was already stored.
    pub bytes_deduplicated: u64,
    /// Whether a pre-existing backing store at the source root was skipped.
    pub backing_store_skipped: bool,
}

/// Builds one archive over one run.
///
/// Owns the tar writer and the dedup table. Records are appended in
/// traversal order; nothing is buffered or reordered.
pub struct ArchiveBuilder<W: Write> {
    root_archive_path: PathBuf,
    archive: tar::Builder<W>,
    dedup: HashSet<Hash>,
    algorithm: Algorithm,
    pub(crate) stats: BuildStats,
}

impl<W: Write> ArchiveBuilder<W> {
    /// Create a builder writing to `writer`.
    ///
    /// `root_archive_path` is the name the source directory gets inside the
    /// archive; an empty path puts entries at the top level.
    pub fn new(writer: W, root_archive_path: impl Into<PathBuf>, options: BuildOptions) -> Self {
        Self {
            root_archive_path: root_archive_path.into(),
            archive: tar::Builder::new(writer),
            dedup: HashSet::new(),
            algorithm: options.algorithm,
            stats: BuildStats::default(),
        }
    }

    /// The archive path of the source root.
    pub fn root_archive_path(&self) -> &Path {
        &self.root_archive_path
    }

    /// The archive path a blob with this hash is stored under.
    pub fn blob_path(&self, hash: &Hash) -> PathBuf {
        self.root_archive_path
            .join(BACKING_STORE_DIR)
            .join(hash.to_key())
    }

    /// Whether content with this hash has already been stored in this run.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.dedup.contains(hash)
    }

    /// Statistics so far.
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Add one filesystem entry.
    ///
    /// `metadata` must be the non-following metadata of `entry_path`, as
    /// directory listing produces it. Directories are recursed into; anything
    /// else, symbolic links included, is opened and archived as file content.
    pub fn add_entry(
        &mut self,
        entry_path: &Path,
        archive_path: &Path,
        metadata: &fs::Metadata,
    ) -> Result<()> {
        if metadata.file_type().is_dir() {
            return self.walk_dir(entry_path, archive_path, false);
        }

        self.add_file(entry_path, archive_path, metadata)
    }

    /// Hash a file, store its content on first sight, and link its path.
    fn add_file(
        &mut self,
        entry_path: &Path,
        archive_path: &Path,
        metadata: &fs::Metadata,
    ) -> Result<()> {
        let mut file = File::open(entry_path).map_err(|e| Error::filesystem(entry_path, e))?;

        let (hash, len) = self.algorithm.hash_reader(&mut file)?;
        let blob_path = self.blob_path(&hash);
        self.stats.files += 1;

        if self.dedup.contains(&hash) {
            self.stats.bytes_deduplicated += len;
        } else {
            file.seek(SeekFrom::Start(0))?;
            self.append_blob(entry_path, &mut file, metadata, &blob_path, len)?;
            self.dedup.insert(hash);

            self.stats.blobs_stored += 1;
            self.stats.bytes_stored += len;
            debug!(blob = %blob_path.display(), source = %entry_path.display(), bytes = len, "stored blob");
        }

        self.append_link(archive_path, metadata, &blob_path)?;
        self.stats.links_written += 1;
        debug!(path = %archive_path.display(), blob = %blob_path.display(), "linked");

        Ok(())
    }

    /// Write a regular-file record holding exactly `len` bytes of `file`.
    fn append_blob(
        &mut self,
        entry_path: &Path,
        file: &mut File,
        metadata: &fs::Metadata,
        blob_path: &Path,
        len: u64,
    ) -> Result<()> {
        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(metadata, HeaderMode::Complete);
        // A symlink header cannot carry a body; the blob is the target's content.
        header.set_entry_type(EntryType::Regular);
        header.set_size(len);

        let mut body = CountingReader::new((&mut *file).take(len));
        self.archive.append_data(&mut header, blob_path, &mut body)?;

        let copied = body.count;
        if copied < len {
            return Err(Error::content_changed(entry_path, len, copied));
        }
        let extra = io::copy(file, &mut io::sink())?;
        if extra > 0 {
            return Err(Error::content_changed(entry_path, len, len + extra));
        }

        Ok(())
    }

    /// Write a bodiless hard-link record from `archive_path` to `blob_path`.
    fn append_link(
        &mut self,
        archive_path: &Path,
        metadata: &fs::Metadata,
        blob_path: &Path,
    ) -> Result<()> {
        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(metadata, HeaderMode::Complete);
        header.set_entry_type(EntryType::Link);
        header.set_size(0);

        self.archive.append_link(&mut header, archive_path, blob_path)?;
        Ok(())
    }

    /// Write the end-of-archive marker and hand back the writer.
    pub fn finish(self) -> Result<(W, BuildStats)> {
        let writer = self.archive.into_inner()?;
        Ok((writer, self.stats))
    }
}

/// Counts bytes read through it.
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Build a deduplicated archive of the directory at `source` into `writer`.
///
/// The source is made absolute first; its final component becomes the
/// archive root. On success the tar stream is finished and the writer is
/// returned for the caller to flush or finalize. On error the stream is
/// incomplete and must be discarded.
#[tracing::instrument(skip_all, fields(source = %source.display(), algorithm = %options.algorithm))]
pub fn build_archive<W: Write>(
    source: &Path,
    writer: W,
    options: BuildOptions,
) -> Result<(W, BuildStats)> {
    let root = resolve_root(source)?;
    let root_archive_path = root_archive_name(&root);

    let mut builder = ArchiveBuilder::new(writer, root_archive_path, options);
    builder.add_tree(&root)?;
    let (writer, stats) = builder.finish()?;

    info!(
        files = stats.files,
        blobs = stats.blobs_stored,
        bytes_stored = stats.bytes_stored,
        bytes_deduplicated = stats.bytes_deduplicated,
        "archive complete"
    );

    Ok((writer, stats))
}

/// Make `source` absolute and check that it is a directory.
pub fn resolve_root(source: &Path) -> Result<PathBuf> {
    let root = std::path::absolute(source).map_err(|e| Error::filesystem(source, e))?;
    let metadata = fs::metadata(&root).map_err(|e| Error::filesystem(&root, e))?;

    if !metadata.is_dir() {
        return Err(Error::filesystem(
            &root,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }

    Ok(root)
}

/// The name a source root gets inside the archive: its final component.
///
/// Paths ending in `..` are canonicalized first; the filesystem root has no
/// name and maps to an empty path.
pub fn root_archive_name(root: &Path) -> PathBuf {
    if let Some(name) = root.file_name() {
        return PathBuf::from(name);
    }

    fs::canonicalize(root)
        .ok()
        .and_then(|p| p.file_name().map(PathBuf::from))
        .unwrap_or_default()
}
