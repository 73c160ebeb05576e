//! Single-writer zip archive shared by concurrent producers
//!
//! Producers build entry bytes concurrently (usually by downloading them) and
//! hand each finished entry to [`ArchiveWriter::append`]. The zip format
//! needs strictly sequential writes, so every physical write happens under
//! one mutex.

use crate::archive::{ArchiveEntry, ArchiveError, ArchiveResult};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Result of a successful [`ArchiveWriter::finalize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Where the archive was written
    pub path: PathBuf,

    /// Number of entries in the archive
    pub entries: usize,

    /// Size of the archive file on disk
    pub bytes: u64,
}

/// Byte destination underneath the zip writer
trait ArchiveSink: Write + Seek + Send {
    /// Flushes everything to durable storage and returns the final size
    fn sync_and_size(&mut self) -> io::Result<u64>;
}

impl ArchiveSink for BufWriter<File> {
    fn sync_and_size(&mut self) -> io::Result<u64> {
        self.flush()?;
        self.get_ref().sync_all()?;
        Ok(self.get_ref().metadata()?.len())
    }
}

struct WriterState {
    /// None once the archive has been finalized
    zip: Option<ZipWriter<Box<dyn ArchiveSink>>>,

    /// Paths written so far
    paths: HashSet<String>,
}

/// Append-only zip archive
///
/// `append` may be called from any number of tasks at once. `finalize` must
/// be called exactly once, after every producer is done; afterwards both
/// `append` and `finalize` fail with [`ArchiveError::Finalized`].
pub struct ArchiveWriter {
    path: PathBuf,
    compression_level: u32,
    state: Mutex<WriterState>,
}

impl ArchiveWriter {
    /// Creates the archive file, truncating anything already at `path`
    ///
    /// Missing parent directories are created.
    ///
    /// # Arguments
    ///
    /// * `path` - Destination of the zip file
    /// * `compression_level` - Deflate level, 0-9 (9 is smallest)
    pub fn create(path: impl AsRef<Path>, compression_level: u32) -> ArchiveResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ArchiveError::Create {
                    path: path.display().to_string(),
                    source,
                })?;
            }
        }

        let file = File::create(&path).map_err(|source| ArchiveError::Create {
            path: path.display().to_string(),
            source,
        })?;

        tracing::debug!("Created archive file {}", path.display());

        Ok(Self::with_sink(
            path,
            compression_level,
            Box::new(BufWriter::new(file)),
        ))
    }

    fn with_sink(path: PathBuf, compression_level: u32, sink: Box<dyn ArchiveSink>) -> Self {
        Self {
            path,
            compression_level: compression_level.min(9),
            state: Mutex::new(WriterState {
                zip: Some(ZipWriter::new(sink)),
                paths: HashSet::new(),
            }),
        }
    }

    /// Writes one entry into the archive
    ///
    /// Fails without touching the archive when the path was already written
    /// or the archive is finalized. A write that fails part way is rolled
    /// back, so the archive never holds a truncated entry and the path stays
    /// free; the archive stays open.
    pub fn append(&self, entry: ArchiveEntry) -> ArchiveResult<()> {
        let options = self.entry_options();
        let mut state = self.lock()?;
        let WriterState { zip, paths } = &mut *state;

        let zip = zip.as_mut().ok_or(ArchiveError::Finalized)?;

        if paths.contains(&entry.path) {
            return Err(ArchiveError::DuplicateEntry(entry.path));
        }

        zip.start_file(entry.path.as_str(), options)
            .map_err(|e| ArchiveError::Write {
                path: entry.path.clone(),
                cause: e.to_string(),
            })?;

        if let Err(e) = zip.write_all(&entry.content) {
            // The open entry would otherwise be committed by the next start_file or finish
            if let Err(abort) = zip.abort_file() {
                tracing::warn!("Could not roll back entry {}: {}", entry.path, abort);
            }
            return Err(ArchiveError::Write {
                path: entry.path,
                cause: e.to_string(),
            });
        }

        tracing::trace!("Appended {} ({} bytes)", entry.path, entry.content.len());
        paths.insert(entry.path);

        Ok(())
    }

    /// Writes the central directory and closes the file
    pub fn finalize(&self) -> ArchiveResult<ArchiveSummary> {
        let mut state = self.lock()?;
        let zip = state.zip.take().ok_or(ArchiveError::Finalized)?;

        let mut sink = zip.finish().map_err(|e| self.finalize_error(e))?;
        let bytes = sink.sync_and_size().map_err(|e| self.finalize_error(e))?;

        Ok(ArchiveSummary {
            path: self.path.clone(),
            entries: state.paths.len(),
            bytes,
        })
    }

    /// Returns true once `finalize` has been called
    pub fn is_finalized(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.zip.is_none())
            .unwrap_or(true)
    }

    /// Number of entries written so far
    pub fn entry_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.paths.len())
            .unwrap_or(0)
    }

    fn entry_options(&self) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(i64::from(self.compression_level)))
    }

    fn lock(&self) -> ArchiveResult<MutexGuard<'_, WriterState>> {
        self.state.lock().map_err(|_| ArchiveError::Poisoned)
    }

    fn finalize_error(&self, cause: impl std::fmt::Display) -> ArchiveError {
        ArchiveError::Finalize {
            path: self.path.display().to_string(),
            cause: cause.to_string(),
        }
    }
}

impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("path", &self.path)
            .field("compression_level", &self.compression_level)
            .field("entries", &self.entry_count())
            .field("finalized", &self.is_finalized())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let file = File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            entries.push((entry.name().to_string(), content));
        }
        entries.sort();
        entries
    }

    #[test]
    fn test_append_and_finalize() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.zip");

        let writer = ArchiveWriter::create(&path, 9).unwrap();
        writer
            .append(ArchiveEntry::new("Kettle/data.json", b"{}".to_vec()))
            .unwrap();
        writer
            .append(ArchiveEntry::new("Kettle/gallery/a.jpg", vec![1, 2, 3]))
            .unwrap();

        let summary = writer.finalize().unwrap();
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.path, path);
        assert_eq!(summary.bytes, std::fs::metadata(&path).unwrap().len());

        let entries = read_entries(&path);
        assert_eq!(
            entries,
            vec![
                ("Kettle/data.json".to_string(), b"{}".to_vec()),
                ("Kettle/gallery/a.jpg".to_string(), vec![1, 2, 3]),
            ]
        );
    }

    #[test]
    fn test_empty_archive_is_valid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.zip");

        let writer = ArchiveWriter::create(&path, 9).unwrap();
        let summary = writer.finalize().unwrap();

        assert_eq!(summary.entries, 0);
        assert!(summary.bytes > 0);
        assert!(read_entries(&path).is_empty());
    }

    #[test]
    fn test_append_after_finalize_fails() {
        let dir = TempDir::new().unwrap();
        let writer = ArchiveWriter::create(dir.path().join("a.zip"), 9).unwrap();
        writer.finalize().unwrap();

        let result = writer.append(ArchiveEntry::new("late.txt", b"x".to_vec()));
        assert!(matches!(result, Err(ArchiveError::Finalized)));
        assert!(writer.is_finalized());
    }

    #[test]
    fn test_double_finalize_fails() {
        let dir = TempDir::new().unwrap();
        let writer = ArchiveWriter::create(dir.path().join("a.zip"), 9).unwrap();

        writer.finalize().unwrap();
        assert!(matches!(writer.finalize(), Err(ArchiveError::Finalized)));
    }

    #[test]
    fn test_duplicate_path_rejected_without_damage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        let writer = ArchiveWriter::create(&path, 9).unwrap();

        writer
            .append(ArchiveEntry::new("x/data.json", b"first".to_vec()))
            .unwrap();
        let result = writer.append(ArchiveEntry::new("x/data.json", b"second".to_vec()));
        assert!(matches!(result, Err(ArchiveError::DuplicateEntry(p)) if p == "x/data.json"));

        assert!(!writer.is_finalized());
        writer.finalize().unwrap();
        assert_eq!(
            read_entries(&path),
            vec![("x/data.json".to_string(), b"first".to_vec())]
        );
    }

    #[test]
    fn test_create_truncates_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        let writer = ArchiveWriter::create(&path, 9).unwrap();
        let summary = writer.finalize().unwrap();

        assert!(summary.bytes < 4096);
        assert!(read_entries(&path).is_empty());
    }

    #[test]
    fn test_create_makes_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/a.zip");

        let writer = ArchiveWriter::create(&path, 9).unwrap();
        writer.finalize().unwrap();
        assert!(path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_are_serialized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        let writer = Arc::new(ArchiveWriter::create(&path, 9).unwrap());

        let mut handles = Vec::new();
        for i in 0..32 {
            let writer = Arc::clone(&writer);
            handles.push(tokio::spawn(async move {
                let content = vec![i as u8; 1024 + i];
                writer.append(ArchiveEntry::new(format!("p/gallery/{}.bin", i), content))
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let summary = writer.finalize().unwrap();
        assert_eq!(summary.entries, 32);

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 32);
        for (name, content) in entries {
            let i: usize = name
                .trim_start_matches("p/gallery/")
                .trim_end_matches(".bin")
                .parse()
                .unwrap();
            assert_eq!(content, vec![i as u8; 1024 + i]);
        }
    }

    /// In-memory sink that fails one write once its byte budget runs out
    #[derive(Clone, Default)]
    struct FlakySink {
        data: Arc<Mutex<io::Cursor<Vec<u8>>>>,
        budget: Arc<Mutex<Option<usize>>>,
    }

    impl FlakySink {
        fn fail_after(&self, bytes: usize) {
            *self.budget.lock().unwrap() = Some(bytes);
        }

        fn bytes(&self) -> Vec<u8> {
            self.data.lock().unwrap().get_ref().clone()
        }
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut budget = self.budget.lock().unwrap();
            if let Some(remaining) = *budget {
                if buf.len() > remaining {
                    *budget = None;
                    return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
                }
                *budget = Some(remaining - buf.len());
            }
            self.data.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FlakySink {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.data.lock().unwrap().seek(pos)
        }
    }

    impl ArchiveSink for FlakySink {
        fn sync_and_size(&mut self) -> io::Result<u64> {
            Ok(self.data.lock().unwrap().get_ref().len() as u64)
        }
    }

    /// Bytes that deflate cannot shrink
    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491_u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn test_failed_write_leaves_no_partial_entry() {
        let sink = FlakySink::default();
        let writer = ArchiveWriter::with_sink(PathBuf::from("mem.zip"), 9, Box::new(sink.clone()));
        let image = noise(256 * 1024);

        writer
            .append(ArchiveEntry::new("p/data.json", b"{}".to_vec()))
            .unwrap();

        // Room for the entry header, not for the image itself
        sink.fail_after(1024);
        let result = writer.append(ArchiveEntry::new("p/gallery/big.bin", image.clone()));
        assert!(matches!(result, Err(ArchiveError::Write { ref path, .. }) if path == "p/gallery/big.bin"));
        assert_eq!(writer.entry_count(), 1);

        // The path is still free and the archive still accepts entries
        writer
            .append(ArchiveEntry::new("p/gallery/big.bin", image.clone()))
            .unwrap();
        writer
            .append(ArchiveEntry::new("p/gallery/small.jpg", vec![7; 16]))
            .unwrap();
        let summary = writer.finalize().unwrap();
        assert_eq!(summary.entries, 3);

        let mut archive = zip::ZipArchive::new(io::Cursor::new(sink.bytes())).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["p/data.json", "p/gallery/big.bin", "p/gallery/small.jpg"]
        );

        let mut content = Vec::new();
        archive
            .by_name("p/gallery/big.bin")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, image);
    }
}
