//! # Tarmac Core
//!
//! Builds a deduplicated, content-addressed tar archive from a directory tree.
//!
//! Each distinct file content is stored once, under
//! `<root>/.backing_store/<key>` where the key is the URL-safe base64 digest of
//! the content. Every file path in the tree becomes a hard-link record that
//! points at its blob, so any standard tar extractor restores the tree with
//! duplicates sharing one inode.
//!
//! ## Features
//!
//! - Content-addressed blobs keyed by SHA-512 (default) or BLAKE3
//! - One blob per distinct content, one link per file occurrence
//! - Single pass, streaming output to any `Write`
//! - Reserved `.backing_store` entry at the source root is never archived
//!
//! ## Example
//!
//! ```no_run
//! use tarmac_core::{build_archive, BuildOptions};
//! use std::fs::File;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let out = File::create("data.tar")?;
//! let (_out, stats) = build_archive(Path::new("./data"), out, BuildOptions::default())?;
//! println!("{} files, {} blobs", stats.files, stats.blobs_stored);
//! # Ok(())
//! # }
//! ```

mod archive;
mod error;
mod hash;
mod walk;

pub use archive::{
    ArchiveBuilder, BACKING_STORE_DIR, BuildOptions, BuildStats, build_archive, resolve_root,
    root_archive_name,
};
pub use error::{Error, Result};
pub use hash::{Algorithm, Hash};
