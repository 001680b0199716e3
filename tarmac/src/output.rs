//! Output plumbing for the CLI.
//!
//! The archive itself goes to stdout through an [`ArchiveSink`]. Everything
//! meant for humans (stats, errors) goes to stderr through a [`Reporter`],
//! in text or JSON format.

use anyhow::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::io::{self, Write};
use tarmac_core::BuildStats;

/// Destination of the archive bytes, optionally gzip-compressed.
pub enum ArchiveSink<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> ArchiveSink<W> {
    /// Wrap `inner`, compressing at `level` (0-9) when `compress` is set.
    pub fn new(inner: W, compress: bool, level: u32) -> Self {
        if compress {
            ArchiveSink::Gzip(GzEncoder::new(inner, Compression::new(level)))
        } else {
            ArchiveSink::Plain(inner)
        }
    }

    /// Write any compression trailer, flush, and return the inner writer.
    pub fn finish(self) -> io::Result<W> {
        let mut inner = match self {
            ArchiveSink::Plain(inner) => inner,
            ArchiveSink::Gzip(encoder) => encoder.finish()?,
        };
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for ArchiveSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ArchiveSink::Plain(inner) => inner.write(buf),
            ArchiveSink::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ArchiveSink::Plain(inner) => inner.flush(),
            ArchiveSink::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writes reports to stderr in the configured format.
pub struct Reporter {
    format: OutputFormat,
    stderr: io::Stderr,
}

impl Reporter {
    /// Create a new Reporter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stderr: io::stderr(),
        }
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Write a report using the configured format.
    ///
    /// The `text_fn` closure is called only in text mode.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stderr, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stderr, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error and its causes.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(&self.stderr, "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(&self.stderr, "Error: {:#}", error);
            }
        }
    }
}

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for a completed build.
#[derive(Debug, Serialize)]
pub struct BuildOutput {
    pub success: bool,
    pub result_code: u8,
    pub source: String,
    pub algorithm: String,
    pub compressed: bool,
    #[serde(flatten)]
    pub stats: BuildStats,
}

impl BuildOutput {
    /// Human-readable summary.
    pub fn to_text(&self) -> String {
        let stats = &self.stats;
        format!(
            "{} files in {} directories\n\
             {} blobs stored ({} bytes), {} links written\n\
             {} bytes deduplicated\n",
            stats.files,
            stats.directories,
            stats.blobs_stored,
            stats.bytes_stored,
            stats.links_written,
            stats.bytes_deduplicated,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_plain_sink_passes_bytes_through() {
        let mut sink = ArchiveSink::new(Vec::new(), false, 6);
        sink.write_all(b"archive bytes").unwrap();
        assert_eq!(sink.finish().unwrap(), b"archive bytes");
    }

    #[test]
    fn test_gzip_sink_compresses() {
        let payload = vec![b'x'; 10_000];
        let mut sink = ArchiveSink::new(Vec::new(), true, 9);
        sink.write_all(&payload).unwrap();
        let compressed = sink.finish().unwrap();

        assert!(compressed.len() < payload.len());
        // gzip magic
        assert_eq!(&compressed[..2], &[0x1f_u8, 0x8b]);

        let mut decoded = Vec::new();
        GzDecoder::new(&compressed[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_build_output_json_flattens_stats() {
        let output = BuildOutput {
            success: true,
            result_code: 0,
            source: "/data".to_string(),
            algorithm: "sha512".to_string(),
            compressed: false,
            stats: BuildStats {
                files: 3,
                blobs_stored: 2,
                ..BuildStats::default()
            },
        };

        let value: serde_json::Value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["files"], 3);
        assert_eq!(value["blobs_stored"], 2);
        assert_eq!(value["algorithm"], "sha512");
        assert!(output.to_text().contains("3 files"));
    }

    #[test]
    fn test_reporter_format() {
        assert!(Reporter::new(true).is_json());
        assert!(!Reporter::new(false).is_json());
    }
}
