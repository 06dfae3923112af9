//! The ArrayFile handle: header management, positional element I/O, the
//! durable `update` protocol, and resize.
//!
//! All mutable state lives behind a single `parking_lot::Mutex`. Mutual
//! exclusion is only actually required between `update`, the `reset*`
//! family, and `set_array_length`; everything else (positional writes,
//! accessors) takes the same lock purely for memory safety. Callers still
//! own the discipline of not interleaving unsynchronized positional writes
//! with a serialized operation.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::entry::{ArrayBody, Entry, ElementWidth};
use crate::error::{ArrayFileError, ArrayFileResult};
use crate::header::{Header, HEADER_SIZE};
use crate::io::{Backend, FileReader, IoMode, Writer};

struct ArrayFileInner {
    path: PathBuf,
    mode: IoMode,
    backend: Backend,
    header: Header,
    closed: bool,
}

impl ArrayFileInner {
    fn ensure_open(&self) -> ArrayFileResult<()> {
        if self.closed {
            return Err(ArrayFileError::ClosedHandle { path: self.path.clone() });
        }
        Ok(())
    }

    fn body_offset(&self, pos: i32) -> u64 {
        Header::body_offset() + (pos as u64) * (self.header.element_size as u64)
    }

    fn save_header(&mut self) -> ArrayFileResult<()> {
        let bytes = self.header.to_bytes();
        self.backend.write_bytes_at(0, &bytes)?;
        self.backend.flush()?;
        Ok(())
    }

    fn write_hwm(&mut self, hwm: u64) -> ArrayFileResult<()> {
        self.header.hwm_scn = hwm;
        self.backend.write_i64_at(16, hwm as i64)?;
        Ok(())
    }

    fn write_lwm(&mut self, lwm: u64) -> ArrayFileResult<()> {
        self.header.lwm_scn = lwm;
        self.backend.write_i64_at(8, lwm as i64)?;
        Ok(())
    }

    fn write_array_length(&mut self, len: i32) -> ArrayFileResult<()> {
        self.header.array_length = len;
        self.backend.write_i32_at(24, len)?;
        Ok(())
    }

    fn write_version(&mut self, version: u64) -> ArrayFileResult<()> {
        self.header.storage_version = version;
        self.backend.write_i64_at(0, version as i64)?;
        Ok(())
    }

    fn write_element_size(&mut self, size: i32) -> ArrayFileResult<()> {
        if !matches!(size, 2 | 4 | 8) {
            return Err(ArrayFileError::InvalidElementSize { requested: size });
        }
        self.header.element_size = size;
        self.backend.write_i32_at(28, size)?;
        Ok(())
    }
}

/// A handle to a single ArrayFile. Owns the file's Writer exclusively;
/// concurrent access from multiple handles to the same path is not
/// supported.
pub struct ArrayFile {
    inner: Mutex<ArrayFileInner>,
}

impl ArrayFile {
    /// Open an existing ArrayFile, loading and validating its header.
    pub fn open(path: &Path, mode: IoMode) -> ArrayFileResult<Self> {
        let len = std::fs::metadata(path).map_err(|e| crate::error::io_err(path, e, "stat failed"))?.len();
        if len < HEADER_SIZE as u64 {
            return Err(crate::error::io_err(
                path,
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "file smaller than header"),
                "open failed",
            ));
        }
        let backend = Backend::open(path, mode)?;
        let header_bytes = backend.read_bytes_at(0, HEADER_SIZE)?;
        let mut buf = [0u8; HEADER_SIZE];
        buf.copy_from_slice(&header_bytes);
        let header = Header::from_bytes(&buf);
        header.check(path)?;

        Ok(Self {
            inner: Mutex::new(ArrayFileInner {
                path: path.to_path_buf(),
                mode,
                backend,
                header,
                closed: false,
            }),
        })
    }

    /// Create a new ArrayFile of the given length/width, zero-initialised.
    pub fn create(path: &Path, array_length: i32, element_size: i32, mode: IoMode) -> ArrayFileResult<Self> {
        if array_length < 0 {
            return Err(ArrayFileError::InvalidLength { requested: array_length as i64 });
        }
        ElementWidth::from_size(element_size)?;

        let header = Header::new(array_length, element_size);
        let total_len = header.expected_file_size();

        // Size and zero-fill the file as a buffered writer first; a mapped
        // backend can't open a zero-length file, so the eventual mapped
        // handle always sees a file that already has its final size.
        {
            let mut backend = Backend::open(path, IoMode::Buffered)?;
            backend.set_file_len(total_len)?;
            backend.write_bytes_at(0, &header.to_bytes())?;
            backend.force()?;
        }

        let backend = Backend::open(path, mode)?;
        Ok(Self {
            inner: Mutex::new(ArrayFileInner {
                path: path.to_path_buf(),
                mode,
                backend,
                header,
                closed: false,
            }),
        })
    }

    /// Read the five cached header fields as a tuple
    /// `(storage_version, lwm_scn, hwm_scn, array_length, element_size)`.
    pub fn header_snapshot(&self) -> (u64, u64, u64, i32, i32) {
        let inner = self.inner.lock();
        let h = &inner.header;
        (h.storage_version, h.lwm_scn, h.hwm_scn, h.array_length, h.element_size)
    }

    pub fn load_header(&self) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let bytes = inner.backend.read_bytes_at(0, HEADER_SIZE)?;
        let mut buf = [0u8; HEADER_SIZE];
        buf.copy_from_slice(&bytes);
        let header = Header::from_bytes(&buf);
        header.check(&inner.path)?;
        inner.header = header;
        Ok(())
    }

    /// Write all five cached header fields to their fixed offsets and flush.
    pub fn save_header(&self) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.save_header()
    }

    /// Write `storage_version` at its fixed offset and update the cached
    /// copy. Does not flush.
    pub fn write_version(&self, version: u64) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.write_version(version)
    }

    /// Write `element_size` at its fixed offset and update the cached copy.
    /// Does not flush. Rejects a size outside `{2, 4, 8}`.
    pub fn write_element_size(&self, size: i32) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.write_element_size(size)
    }

    /// Reject `lwm > hwm`; otherwise write HWM then LWM, each flushed.
    pub fn set_water_marks(&self, lwm: u64, hwm: u64) -> ArrayFileResult<()> {
        if lwm > hwm {
            return Err(ArrayFileError::InvalidWaterMarks { lwm, hwm });
        }
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.write_hwm(hwm)?;
        inner.backend.flush()?;
        inner.write_lwm(lwm)?;
        inner.backend.flush()?;
        Ok(())
    }

    /// Unsynchronised, unchecked positional write. Does not flush.
    pub fn write_i16(&self, index: i32, value: i16) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let offset = inner.body_offset(index);
        inner.backend.write_i16_at(offset, value)
    }

    pub fn write_i32(&self, index: i32, value: i32) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let offset = inner.body_offset(index);
        inner.backend.write_i32_at(offset, value)
    }

    pub fn write_i64(&self, index: i32, value: i64) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let offset = inner.body_offset(index);
        inner.backend.write_i64_at(offset, value)
    }

    /// Bulk-load the body sequentially using a fresh Reader. A missing file
    /// returns an empty body without error.
    pub fn load_array(path: &Path, width: ElementWidth) -> ArrayFileResult<ArrayBody> {
        let mut reader = match FileReader::open(path)? {
            Some(r) => r,
            None => return Ok(Self::empty_body(width)),
        };
        let file_len = reader.file_len()?;
        if file_len < HEADER_SIZE as u64 {
            return Ok(Self::empty_body(width));
        }
        let count = ((file_len - HEADER_SIZE as u64) / width.size() as u64) as usize;
        reader.position(HEADER_SIZE as u64)?;
        Ok(match width {
            ElementWidth::Int16 => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(reader.read_i16()?);
                }
                ArrayBody::Int16(v)
            }
            ElementWidth::Int32 => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(reader.read_i32()?);
                }
                ArrayBody::Int32(v)
            }
            ElementWidth::Int64 => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(reader.read_i64()?);
                }
                ArrayBody::Int64(v)
            }
        })
    }

    fn empty_body(width: ElementWidth) -> ArrayBody {
        match width {
            ElementWidth::Int16 => ArrayBody::Int16(Vec::new()),
            ElementWidth::Int32 => ArrayBody::Int32(Vec::new()),
            ElementWidth::Int64 => ArrayBody::Int64(Vec::new()),
        }
    }

    /// `reset(array)`: overwrite the body. Does not touch water marks.
    /// Serialized with `update`/`set_array_length`.
    pub fn reset(&self, array: &ArrayBody) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.backend.flush()?;
        Self::write_body(&mut inner, array)?;
        inner.backend.flush()?;
        Ok(())
    }

    /// `reset(array, scn)`: as above, plus `hwm = lwm = scn`, flushed.
    pub fn reset_with_scn(&self, array: &ArrayBody, scn: u64) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.backend.flush()?;
        Self::write_body(&mut inner, array)?;
        inner.write_hwm(scn)?;
        inner.write_lwm(scn)?;
        inner.backend.flush()?;
        Ok(())
    }

    fn write_body(inner: &mut ArrayFileInner, array: &ArrayBody) -> ArrayFileResult<()> {
        let offset0 = Header::body_offset();
        let element_size = array.width().size() as u64;
        match array {
            ArrayBody::Int16(v) => {
                for (i, val) in v.iter().enumerate() {
                    inner.backend.write_i16_at(offset0 + i as u64 * element_size, *val)?;
                }
            }
            ArrayBody::Int32(v) => {
                for (i, val) in v.iter().enumerate() {
                    inner.backend.write_i32_at(offset0 + i as u64 * element_size, *val)?;
                }
            }
            ArrayBody::Int64(v) => {
                for (i, val) in v.iter().enumerate() {
                    inner.backend.write_i64_at(offset0 + i as u64 * element_size, *val)?;
                }
            }
        }
        Ok(())
    }

    /// `reset_all(value)`: fill every element with an 8-byte value. Only
    /// valid when `element_size == 8`.
    pub fn reset_all(&self, value: i64) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        if inner.header.element_size != 8 {
            return Err(ArrayFileError::ElementSizeMismatch {
                actual: inner.header.element_size,
                required: 8,
            });
        }
        inner.backend.flush()?;
        let offset0 = Header::body_offset();
        let n = inner.header.array_length as u64;
        for i in 0..n {
            inner.backend.write_i64_at(offset0 + i * 8, value)?;
        }
        inner.backend.flush()?;
        Ok(())
    }

    /// The durable update protocol. HWM-write, flush, data-writes,
    /// flush, LWM-write, flush — strictly ordered.
    pub fn update(&self, entries: &[Entry]) -> ArrayFileResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut flattened: Vec<(i32, crate::entry::ElementValue)> = Vec::new();
        let mut batch_max_scn: u64 = 0;
        for entry in entries {
            batch_max_scn = batch_max_scn.max(entry.max_scn);
            for ev in &entry.values {
                flattened.push((ev.pos, ev.value));
            }
        }
        if flattened.is_empty() {
            return Ok(());
        }
        flattened.sort_by_key(|(pos, _)| *pos);

        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let max_scn_batch = batch_max_scn.max(inner.header.hwm_scn);

        // Publish intent.
        inner.write_hwm(max_scn_batch)?;
        inner.backend.flush()?;

        // Apply, sorted.
        for (pos, value) in &flattened {
            let offset = inner.body_offset(*pos);
            match value {
                crate::entry::ElementValue::Int16(v) => inner.backend.write_i16_at(offset, *v)?,
                crate::entry::ElementValue::Int32(v) => inner.backend.write_i32_at(offset, *v)?,
                crate::entry::ElementValue::Int64(v) => inner.backend.write_i64_at(offset, *v)?,
            }
        }
        inner.backend.flush()?;

        // Commit.
        inner.write_lwm(max_scn_batch)?;
        inner.backend.flush()?;

        Ok(())
    }

    /// Resize the array. `rename_to` is the optional rename target in
    /// step 5; `None` uses remap-or-reopen in place.
    pub fn set_array_length(&self, new_length: i32, rename_to: Option<&Path>) -> ArrayFileResult<()> {
        if new_length < 0 {
            return Err(ArrayFileError::InvalidLength { requested: new_length as i64 });
        }
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        if new_length == inner.header.array_length {
            return Ok(());
        }

        inner.backend.flush()?;

        let new_file_size = Header::body_offset() + (new_length as u64) * (inner.header.element_size as u64);
        inner.backend.set_file_len(new_file_size)?;

        inner.write_array_length(new_length)?;
        inner.backend.flush()?;

        match rename_to {
            Some(target) => {
                // Rename failure degrades to a no-rename continuation; the
                // operation still succeeds against the original path.
                match std::fs::rename(&inner.path, target) {
                    Ok(()) => inner.path = target.to_path_buf(),
                    Err(e) => eprintln!(
                        "[ArrayFile] rename {} -> {} failed, continuing on original path: {}",
                        inner.path.display(),
                        target.display(),
                        e
                    ),
                }
                let mode = inner.mode;
                let path = inner.path.clone();
                inner.backend.reopen_at(&path, mode)?;
            }
            None => {
                let path = inner.path.clone();
                inner.backend.reopen_or_remap(&path)?;
            }
        }

        Ok(())
    }

    /// fsync-equivalent checkpoint. Callers following `Config::scratch()`'s
    /// `ForcePolicy::OnCheckpoint` invoke this explicitly instead of forcing
    /// after every `update`/`reset` commit.
    pub fn checkpoint(&self) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.backend.force()
    }

    /// Flush and release the Writer. Further operations error with
    /// `ClosedHandle`.
    pub fn close(&self) -> ArrayFileResult<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }
        inner.backend.flush()?;
        inner.closed = true;
        Ok(())
    }
}

impl Drop for ArrayFile {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if !inner.closed {
            let _ = inner.backend.flush();
        }
    }
}
