//! Writer/Reader capability model
//!
//! The core never reaches for a concrete file type directly; every operation
//! goes through a `Writer` trait (cursor-style and positional `write_i16/i32/i64`,
//! `flush`, `force`, resize) and a parallel, independent `Reader` trait used
//! only by the bulk-load helpers. Two concrete backends implement `Writer`:
//!
//! - [`BufferedBackend`]: a plain `std::fs::File`, synced via [`durable_sync`].
//! - [`MappedBackend`]: a `memmap2::MmapMut` over the same file, remappable
//!   in place after a resize.
//!
//! Dispatch between them is by the [`IoMode`] tag recorded at open time, never
//! by runtime type inspection — see [`Backend`].

use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::durability::durable_sync;
use crate::error::{io_err, ArrayFileError, ArrayFileResult};

/// Selects the Writer/Reader backend for a given ArrayFile. Recorded at open
/// time and never re-derived; the persisted intent, not a runtime type test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    /// Conventional buffered channel: a `File`, synced with `durable_sync`.
    Buffered,
    /// Memory-mapped region; supports in-place remap on resize.
    Mapped,
}

/// Positional and cursor I/O, flush, force, and length control — the
/// capability surface the core needs from any backing storage.
pub trait Writer: Send {
    fn write_i16_at(&mut self, offset: u64, value: i16) -> ArrayFileResult<()>;
    fn write_i32_at(&mut self, offset: u64, value: i32) -> ArrayFileResult<()>;
    fn write_i64_at(&mut self, offset: u64, value: i64) -> ArrayFileResult<()>;
    fn write_bytes_at(&mut self, offset: u64, bytes: &[u8]) -> ArrayFileResult<()>;
    fn read_bytes_at(&self, offset: u64, len: usize) -> ArrayFileResult<Vec<u8>>;

    /// Propagate buffered writes to the OS (page cache). Not fsync.
    fn flush(&mut self) -> ArrayFileResult<()>;
    /// fsync-equivalent: durable on stable storage on return.
    fn force(&mut self) -> ArrayFileResult<()>;

    fn file_len(&self) -> ArrayFileResult<u64>;
    fn set_file_len(&mut self, new_len: u64) -> ArrayFileResult<()>;
}

/// `std::fs::File` backend. Every write goes straight to the file descriptor
/// (the OS page cache is the only buffering); `force()` is the only operation
/// that actually guarantees durability.
pub struct BufferedBackend {
    file: File,
    path: PathBuf,
}

impl BufferedBackend {
    pub fn open(path: &Path) -> ArrayFileResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| io_err(path, e, "failed to open array file"))?;
        Ok(Self { file, path: path.to_path_buf() })
    }

    /// Close and reopen the file handle against (possibly) a new path. Used
    /// by `set_array_length` when no remap capability is available.
    pub fn reopen(&mut self, path: &Path) -> ArrayFileResult<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| io_err(path, e, "failed to reopen array file"))?;
        self.file = file;
        self.path = path.to_path_buf();
        Ok(())
    }
}

impl Writer for BufferedBackend {
    fn write_i16_at(&mut self, offset: u64, value: i16) -> ArrayFileResult<()> {
        self.write_bytes_at(offset, &value.to_le_bytes())
    }

    fn write_i32_at(&mut self, offset: u64, value: i32) -> ArrayFileResult<()> {
        self.write_bytes_at(offset, &value.to_le_bytes())
    }

    fn write_i64_at(&mut self, offset: u64, value: i64) -> ArrayFileResult<()> {
        self.write_bytes_at(offset, &value.to_le_bytes())
    }

    fn write_bytes_at(&mut self, offset: u64, bytes: &[u8]) -> ArrayFileResult<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| io_err(&self.path, e, "seek failed"))?;
        self.file
            .write_all(bytes)
            .map_err(|e| io_err(&self.path, e, "write failed"))?;
        Ok(())
    }

    fn read_bytes_at(&self, offset: u64, len: usize) -> ArrayFileResult<Vec<u8>> {
        let mut file = self.file.try_clone().map_err(|e| io_err(&self.path, e, "clone for read failed"))?;
        file.seek(SeekFrom::Start(offset)).map_err(|e| io_err(&self.path, e, "seek failed"))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).map_err(|e| io_err(&self.path, e, "read failed"))?;
        Ok(buf)
    }

    fn flush(&mut self) -> ArrayFileResult<()> {
        self.file.flush().map_err(|e| io_err(&self.path, e, "flush failed"))
    }

    fn force(&mut self) -> ArrayFileResult<()> {
        durable_sync(&self.file).map_err(|e| io_err(&self.path, e, "durable_sync failed"))
    }

    fn file_len(&self) -> ArrayFileResult<u64> {
        Ok(self
            .file
            .metadata()
            .map_err(|e| io_err(&self.path, e, "stat failed"))?
            .len())
    }

    fn set_file_len(&mut self, new_len: u64) -> ArrayFileResult<()> {
        self.file
            .set_len(new_len)
            .map_err(|e| io_err(&self.path, e, "truncate/grow failed"))
    }
}

/// Memory-mapped backend. Writes land directly in the mapping; `flush()`
/// msyncs the mapping, `force()` additionally fsyncs the backing file
/// descriptor — the ordering a mapped writer needs for its dirty pages to
/// actually reach the platform's fsync-equivalent.
pub struct MappedBackend {
    file: File,
    path: PathBuf,
    mmap: MmapMut,
}

impl MappedBackend {
    pub fn open(path: &Path) -> ArrayFileResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| io_err(path, e, "failed to open array file"))?;
        let mmap = Self::map(&file, path)?;
        Ok(Self { file, path: path.to_path_buf(), mmap })
    }

    fn map(file: &File, path: &Path) -> ArrayFileResult<MmapMut> {
        let len = file.metadata().map_err(|e| io_err(path, e, "stat failed"))?.len();
        if len == 0 {
            // An empty file cannot be mapped; the caller always grows the
            // file to at least HEADER_SIZE before opening a mapped backend.
            return Err(io_err(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "cannot map empty file"),
                "map failed",
            ));
        }
        // SAFETY: `file` is open for read+write and has non-zero length
        // (checked above). The mapping is only observed/mutated through this
        // struct, which owns it exclusively.
        unsafe { MmapMut::map_mut(file).map_err(|e| io_err(path, e, "mmap failed")) }
    }

    /// Refresh the mapping after the backing file's size has changed.
    pub fn remap(&mut self) -> ArrayFileResult<()> {
        self.mmap.flush().map_err(|e| io_err(&self.path, e, "pre-remap flush failed"))?;
        self.mmap = Self::map(&self.file, &self.path)?;
        Ok(())
    }
}

impl Writer for MappedBackend {
    fn write_i16_at(&mut self, offset: u64, value: i16) -> ArrayFileResult<()> {
        self.write_bytes_at(offset, &value.to_le_bytes())
    }

    fn write_i32_at(&mut self, offset: u64, value: i32) -> ArrayFileResult<()> {
        self.write_bytes_at(offset, &value.to_le_bytes())
    }

    fn write_i64_at(&mut self, offset: u64, value: i64) -> ArrayFileResult<()> {
        self.write_bytes_at(offset, &value.to_le_bytes())
    }

    fn write_bytes_at(&mut self, offset: u64, bytes: &[u8]) -> ArrayFileResult<()> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.mmap.len() {
            return Err(io_err(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "write past mapped region"),
                "write failed",
            ));
        }
        self.mmap[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn read_bytes_at(&self, offset: u64, len: usize) -> ArrayFileResult<Vec<u8>> {
        let start = offset as usize;
        let end = start + len;
        if end > self.mmap.len() {
            return Err(io_err(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "read past mapped region"),
                "read failed",
            ));
        }
        Ok(self.mmap[start..end].to_vec())
    }

    fn flush(&mut self) -> ArrayFileResult<()> {
        self.mmap.flush().map_err(|e| io_err(&self.path, e, "mmap flush failed"))
    }

    fn force(&mut self) -> ArrayFileResult<()> {
        self.mmap.flush().map_err(|e| io_err(&self.path, e, "mmap flush failed"))?;
        durable_sync(&self.file).map_err(|e| io_err(&self.path, e, "durable_sync failed"))
    }

    fn file_len(&self) -> ArrayFileResult<u64> {
        Ok(self
            .file
            .metadata()
            .map_err(|e| io_err(&self.path, e, "stat failed"))?
            .len())
    }

    fn set_file_len(&mut self, new_len: u64) -> ArrayFileResult<()> {
        self.file
            .set_len(new_len)
            .map_err(|e| io_err(&self.path, e, "truncate/grow failed"))
    }
}

/// The two Writer backends, dispatched on by variant rather than by runtime
/// type inspection (the ArrayFile always knows which one it opened via
/// `IoMode`).
pub enum Backend {
    Buffered(BufferedBackend),
    Mapped(MappedBackend),
}

impl Backend {
    pub fn open(path: &Path, mode: IoMode) -> ArrayFileResult<Self> {
        match mode {
            IoMode::Buffered => Ok(Backend::Buffered(BufferedBackend::open(path)?)),
            IoMode::Mapped => Ok(Backend::Mapped(MappedBackend::open(path)?)),
        }
    }

    /// Refresh the Writer so a mapped region reflects the new
    /// file size, or reopen a buffered file descriptor against the same path.
    pub fn reopen_or_remap(&mut self, path: &Path) -> ArrayFileResult<()> {
        match self {
            Backend::Buffered(b) => b.reopen(path),
            Backend::Mapped(m) => m.remap(),
        }
    }

    /// Close the Writer and reopen it against a new path (the rename
    /// branch). Valid for both backends.
    pub fn reopen_at(&mut self, path: &Path, mode: IoMode) -> ArrayFileResult<()> {
        *self = Backend::open(path, mode)?;
        Ok(())
    }
}

impl Writer for Backend {
    fn write_i16_at(&mut self, offset: u64, value: i16) -> ArrayFileResult<()> {
        match self {
            Backend::Buffered(b) => b.write_i16_at(offset, value),
            Backend::Mapped(m) => m.write_i16_at(offset, value),
        }
    }

    fn write_i32_at(&mut self, offset: u64, value: i32) -> ArrayFileResult<()> {
        match self {
            Backend::Buffered(b) => b.write_i32_at(offset, value),
            Backend::Mapped(m) => m.write_i32_at(offset, value),
        }
    }

    fn write_i64_at(&mut self, offset: u64, value: i64) -> ArrayFileResult<()> {
        match self {
            Backend::Buffered(b) => b.write_i64_at(offset, value),
            Backend::Mapped(m) => m.write_i64_at(offset, value),
        }
    }

    fn write_bytes_at(&mut self, offset: u64, bytes: &[u8]) -> ArrayFileResult<()> {
        match self {
            Backend::Buffered(b) => b.write_bytes_at(offset, bytes),
            Backend::Mapped(m) => m.write_bytes_at(offset, bytes),
        }
    }

    fn read_bytes_at(&self, offset: u64, len: usize) -> ArrayFileResult<Vec<u8>> {
        match self {
            Backend::Buffered(b) => b.read_bytes_at(offset, len),
            Backend::Mapped(m) => m.read_bytes_at(offset, len),
        }
    }

    fn flush(&mut self) -> ArrayFileResult<()> {
        match self {
            Backend::Buffered(b) => b.flush(),
            Backend::Mapped(m) => m.flush(),
        }
    }

    fn force(&mut self) -> ArrayFileResult<()> {
        match self {
            Backend::Buffered(b) => b.force(),
            Backend::Mapped(m) => m.force(),
        }
    }

    fn file_len(&self) -> ArrayFileResult<u64> {
        match self {
            Backend::Buffered(b) => b.file_len(),
            Backend::Mapped(m) => m.file_len(),
        }
    }

    fn set_file_len(&mut self, new_len: u64) -> ArrayFileResult<()> {
        match self {
            Backend::Buffered(b) => b.set_file_len(new_len),
            Backend::Mapped(m) => m.set_file_len(new_len),
        }
    }
}

/// Independent, read-only reader used only by the bulk-load helpers. Opened
/// fresh for the duration of a single bulk load and released on every exit
/// path, including error — it never shares state with the handle's Writer.
pub struct FileReader {
    file: File,
    path: PathBuf,
}

impl FileReader {
    /// Open the reader. Returns `Ok(None)` if the file doesn't exist, letting
    /// bulk-load callers treat a missing file as "nothing to load" rather
    /// than an error.
    pub fn open(path: &Path) -> ArrayFileResult<Option<Self>> {
        match File::open(path) {
            Ok(file) => Ok(Some(Self { file, path: path.to_path_buf() })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(path, e, "failed to open array file for read")),
        }
    }

    pub fn position(&mut self, offset: u64) -> ArrayFileResult<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| io_err(&self.path, e, "seek failed"))?;
        Ok(())
    }

    pub fn file_len(&self) -> ArrayFileResult<u64> {
        Ok(self
            .file
            .metadata()
            .map_err(|e| io_err(&self.path, e, "stat failed"))?
            .len())
    }

    pub fn read_i16(&mut self) -> ArrayFileResult<i16> {
        let mut buf = [0u8; 2];
        self.file.read_exact(&mut buf).map_err(|e| io_err(&self.path, e, "read failed"))?;
        Ok(i16::from_le_bytes(buf))
    }

    pub fn read_i32(&mut self) -> ArrayFileResult<i32> {
        let mut buf = [0u8; 4];
        self.file.read_exact(&mut buf).map_err(|e| io_err(&self.path, e, "read failed"))?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn read_i64(&mut self) -> ArrayFileResult<i64> {
        let mut buf = [0u8; 8];
        self.file.read_exact(&mut buf).map_err(|e| io_err(&self.path, e, "read failed"))?;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_header_bytes(&mut self) -> ArrayFileResult<[u8; crate::header::HEADER_SIZE]> {
        self.position(0)?;
        let mut buf = [0u8; crate::header::HEADER_SIZE];
        self.file.read_exact(&mut buf).map_err(|e| io_err(&self.path, e, "header read failed"))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_buffered_write_read_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.dat");
        let mut w = BufferedBackend::open(&path).unwrap();
        w.set_file_len(32).unwrap();
        w.write_i32_at(8, 0xDEADBEEFu32 as i32).unwrap();
        w.flush().unwrap();
        let bytes = w.read_bytes_at(8, 4).unwrap();
        assert_eq!(i32::from_le_bytes(bytes.try_into().unwrap()), 0xDEADBEEFu32 as i32);
    }

    #[test]
    fn test_mapped_write_read_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m.dat");
        {
            let f = OpenOptions::new().create(true).write(true).open(&path).unwrap();
            f.set_len(64).unwrap();
        }
        let mut w = MappedBackend::open(&path).unwrap();
        w.write_i64_at(16, 42).unwrap();
        w.flush().unwrap();
        let bytes = w.read_bytes_at(16, 8).unwrap();
        assert_eq!(i64::from_le_bytes(bytes.try_into().unwrap()), 42);
    }

    #[test]
    fn test_mapped_remap_after_grow() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("grow.dat");
        {
            let f = OpenOptions::new().create(true).write(true).open(&path).unwrap();
            f.set_len(16).unwrap();
        }
        let mut w = MappedBackend::open(&path).unwrap();
        w.set_file_len(64).unwrap();
        w.remap().unwrap();
        w.write_i64_at(32, 7).unwrap();
        let bytes = w.read_bytes_at(32, 8).unwrap();
        assert_eq!(i64::from_le_bytes(bytes.try_into().unwrap()), 7);
    }

    #[test]
    fn test_file_reader_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.dat");
        assert!(FileReader::open(&path).unwrap().is_none());
    }

    #[test]
    fn test_file_reader_sequential_reads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seq.dat");
        {
            let mut w = BufferedBackend::open(&path).unwrap();
            w.set_file_len(8).unwrap();
            w.write_i32_at(0, 1).unwrap();
            w.write_i32_at(4, 2).unwrap();
            w.force().unwrap();
        }
        let mut r = FileReader::open(&path).unwrap().unwrap();
        assert_eq!(r.read_i32().unwrap(), 1);
        assert_eq!(r.read_i32().unwrap(), 2);
    }
}
