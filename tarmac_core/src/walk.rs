//! Directory traversal feeding the archive builder.

use crate::archive::{ArchiveBuilder, BACKING_STORE_DIR};
use crate::error::{Error, Result};
use std::io::Write;
use std::path::Path;
use tracing::{debug, trace};

impl<W: Write> ArchiveBuilder<W> {
    /// Archive everything under the source root `root`.
    ///
    /// A `.backing_store` entry directly under `root` is skipped.
    pub fn add_tree(&mut self, root: &Path) -> Result<()> {
        let archive_path = self.root_archive_path().to_path_buf();
        self.walk_dir(root, &archive_path, true)
    }

    /// Dispatch every immediate child of `dir` to [`ArchiveBuilder::add_entry`].
    ///
    /// Children are visited in file-name order. Any error stops the walk.
    pub(crate) fn walk_dir(&mut self, dir: &Path, archive_path: &Path, is_root: bool) -> Result<()> {
        trace!(dir = %dir.display(), "listing directory");
        self.stats.directories += 1;

        let walker = ignore::WalkBuilder::new(dir)
            .max_depth(Some(1)) // Only immediate children
            .standard_filters(false) // Every entry, hidden and ignored included
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| Error::listing(dir, e))?;

            // Skip the directory itself
            if entry.depth() == 0 {
                continue;
            }

            let name = entry.file_name();
            if is_root && name == BACKING_STORE_DIR {
                debug!(path = %entry.path().display(), "skipping reserved backing store");
                self.stats.backing_store_skipped = true;
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|e| Error::listing(entry.path(), e))?;

            self.add_entry(entry.path(), &archive_path.join(name), &metadata)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::archive::tests::{blobs, build, links, read_records};
    use crate::archive::{ArchiveBuilder, BACKING_STORE_DIR, BuildOptions};
    use crate::error::Error;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_root_backing_store_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        fs::create_dir_all(root.join(BACKING_STORE_DIR)).unwrap();
        fs::write(root.join(BACKING_STORE_DIR).join("stale"), b"old blob").unwrap();
        fs::write(root.join("kept.txt"), b"new").unwrap();

        let (records, stats) = build(&root, BuildOptions::default());

        assert!(stats.backing_store_skipped);
        assert_eq!(blobs(&records).len(), 1);
        assert_eq!(blobs(&records)[0].body, b"new");

        let link_map = links(&records);
        assert_eq!(link_map.len(), 1);
        assert!(link_map.contains_key("src/kept.txt"));
        assert!(!records.iter().any(|r| r.path.contains("stale")));
    }

    #[test]
    fn test_root_backing_store_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        fs::create_dir(&root).unwrap();
        fs::write(root.join(BACKING_STORE_DIR), b"a plain file").unwrap();

        let (records, stats) = build(&root, BuildOptions::default());

        assert!(stats.backing_store_skipped);
        assert!(records.is_empty());
    }

    #[test]
    fn test_nested_backing_store_is_ordinary_input() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        let nested = root.join("sub").join(BACKING_STORE_DIR);
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("file"), b"nested").unwrap();

        let (records, stats) = build(&root, BuildOptions::default());

        assert!(!stats.backing_store_skipped);
        let link_map = links(&records);
        assert!(link_map.contains_key("src/sub/.backing_store/file"));
        assert_eq!(stats.directories, 3);
    }

    #[test]
    fn test_hidden_files_are_included() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        fs::create_dir(&root).unwrap();
        fs::write(root.join(".hidden"), b"h").unwrap();
        fs::write(root.join(".gitignore"), b"*.log\n").unwrap();
        fs::write(root.join("debug.log"), b"log").unwrap();

        let (records, _) = build(&root, BuildOptions::default());

        let link_map = links(&records);
        assert_eq!(link_map.len(), 3);
        assert!(link_map.contains_key("src/.hidden"));
        assert!(link_map.contains_key("src/.gitignore"));
        assert!(link_map.contains_key("src/debug.log"));
    }

    #[test]
    fn test_children_visited_in_name_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("c"), b"3").unwrap();
        fs::write(root.join("a"), b"1").unwrap();
        fs::write(root.join("b").join("z"), b"2").unwrap();

        let (records, _) = build(&root, BuildOptions::default());

        let link_order: Vec<_> = records
            .iter()
            .filter(|r| r.link.is_some())
            .map(|r| r.path.as_str())
            .collect();
        assert_eq!(link_order, vec!["src/a", "src/b/z", "src/c"]);
    }

    #[test]
    fn test_walk_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut builder = ArchiveBuilder::new(Vec::new(), "src", BuildOptions::default());

        let result = builder.add_tree(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(Error::Filesystem { .. })));
    }

    #[test]
    fn test_add_tree_twice_dedups_across_calls() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("f"), b"once").unwrap();

        let mut builder = ArchiveBuilder::new(Vec::new(), "src", BuildOptions::default());
        builder.add_tree(&root).unwrap();
        builder.add_tree(&root).unwrap();
        let (bytes, stats) = builder.finish().unwrap();

        assert_eq!(stats.blobs_stored, 1);
        assert_eq!(stats.links_written, 2);
        assert_eq!(blobs(&read_records(&bytes)).len(), 1);
    }
}
