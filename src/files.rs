// src/files.rs

use std::{
    collections::HashMap,
    io::SeekFrom,
    path::{Path, PathBuf},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncRead, AsyncSeekExt, BufReader, ReadBuf},
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, info};

use crate::error::{LoadError, Result};

/// One physical input file, opened once. Several tables can be packed into
/// the same file, so every scan takes the lock and starts from offset 0.
#[derive(Debug)]
pub struct SharedDataFile {
    name: String,
    path: PathBuf,
    file: Mutex<File>,
}

impl SharedDataFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for exclusive use of the file and rewind it.
    pub async fn lock_rewound(&self) -> Result<FileScan<'_>> {
        let mut guard = self.file.lock().await;
        guard
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|e| LoadError::io(format!("rewinding {}", self.path.display()), e))?;
        debug!(file = %self.name, "acquired and rewound");
        Ok(FileScan {
            name: &self.name,
            reader: BufReader::with_capacity(64 * 1024, LockedFile(guard)),
            buf: Vec::with_capacity(4 * 1024),
            line_number: 0,
        })
    }
}

/// Reads straight through the guard so the lock lives exactly as long as the reader.
struct LockedFile<'a>(MutexGuard<'a, File>);

impl AsyncRead for LockedFile<'_> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let file: &mut File = &mut self.get_mut().0;
        Pin::new(file).poll_read(cx, buf)
    }
}

/// A single front-to-back pass over a locked file. The lock is released
/// when the scan is dropped, whichever way the caller leaves.
pub struct FileScan<'a> {
    name: &'a str,
    reader: BufReader<LockedFile<'a>>,
    buf: Vec<u8>,
    line_number: usize,
}

impl<'a> FileScan<'a> {
    /// Next line without its terminator, or `None` at end of file.
    pub async fn next_line(&mut self) -> Result<Option<(usize, &[u8])>> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|e| LoadError::io(format!("reading from {}", self.name), e))?;
        if n == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        let mut end = self.buf.len();
        while end > 0 && matches!(self.buf[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        Ok(Some((self.line_number, &self.buf[..end])))
    }

    pub fn lines_read(&self) -> usize {
        self.line_number
    }
}

/// Filename → shared file. Built once before loading starts and never
/// mutated afterwards; only the per-file locks and cursors change.
#[derive(Debug, Default)]
pub struct DataFileRegistry {
    folder: PathBuf,
    files: HashMap<String, Arc<SharedDataFile>>,
}

impl DataFileRegistry {
    /// Open every name in `required`, failing on the first one missing.
    pub async fn open<P: AsRef<Path>>(folder: P, required: &[String]) -> Result<Self> {
        let folder = folder.as_ref().to_path_buf();
        info!(folder = %folder.display(), files = required.len(), "opening census data files");

        let mut files = HashMap::with_capacity(required.len());
        for name in required {
            let path = folder.join(name);
            let file = File::open(&path)
                .await
                .map_err(|source| LoadError::MissingFile {
                    folder: folder.clone(),
                    file: name.clone(),
                    source,
                })?;
            files.insert(
                name.clone(),
                Arc::new(SharedDataFile {
                    name: name.clone(),
                    path,
                    file: Mutex::new(file),
                }),
            );
        }
        Ok(Self { folder, files })
    }

    pub fn get(&self, name: &str) -> Option<Arc<SharedDataFile>> {
        self.files.get(name).cloned()
    }

    /// Like `get`, for files the run cannot proceed without.
    pub fn require(&self, name: &str) -> Result<Arc<SharedDataFile>> {
        self.get(name).ok_or_else(|| LoadError::Config {
            message: format!(
                "{} is not among the opened input files in {}",
                name,
                self.folder.display()
            ),
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
