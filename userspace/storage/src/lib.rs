// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Byte-addressable misc device access for boot control metadata
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests (file-backed + in-memory devices, short transfers)
//!
//! PUBLIC API:
//!   - MiscDevice: read/write a fixed-length region at a byte offset
//!   - FileDevice: path-backed device, one open/seek/transfer/close per call
//!   - MemDevice: in-memory device for tests and fixtures
//!   - StorageError: error types
//!
//! DEPENDENCIES:
//!   - libc (unix): O_SYNC for durable writes
//!   - parking_lot: MemDevice interior lock
//!   - thiserror: error types

#![forbid(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

/// Misc device access error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The device could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Seeking to the requested offset failed.
    #[error("failed to seek to offset {offset}: {source}")]
    Seek {
        offset: u64,
        #[source]
        source: io::Error,
    },
    /// The read syscall itself failed.
    #[error("read failed at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: io::Error,
    },
    /// The write (or the trailing sync) failed.
    #[error("write failed at offset {offset}: {source}")]
    Write {
        offset: u64,
        #[source]
        source: io::Error,
    },
    /// The device ended before the full region was read.
    #[error("short read at offset {offset}: got {actual} of {expected} bytes")]
    ShortRead { offset: u64, expected: usize, actual: usize },
    /// The device stopped accepting bytes before the full region was written.
    #[error("short write at offset {offset}: wrote {actual} of {expected} bytes")]
    ShortWrite { offset: u64, expected: usize, actual: usize },
    /// Region lies outside an in-memory device.
    #[error("region {offset}+{len} exceeds device size {size}")]
    OutOfRange { offset: u64, len: usize, size: usize },
}

impl StorageError {
    /// OS error code behind this failure, when there is one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Open { source, .. }
            | Self::Seek { source, .. }
            | Self::Read { source, .. }
            | Self::Write { source, .. } => source.raw_os_error(),
            Self::ShortRead { .. } | Self::ShortWrite { .. } | Self::OutOfRange { .. } => None,
        }
    }
}

/// A raw storage region addressed by byte offset.
///
/// Every call either transfers the whole buffer or fails; partial transfers are
/// reported as [`StorageError::ShortRead`] / [`StorageError::ShortWrite`].
pub trait MiscDevice {
    /// Fill `buf` with the bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write all of `data` at `offset`; returns once the data is durable.
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), StorageError>;
}

impl<T: MiscDevice + ?Sized> MiscDevice for &T {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        (**self).write_at(offset, data)
    }
}

impl<T: MiscDevice + ?Sized> MiscDevice for Arc<T> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        (**self).write_at(offset, data)
    }
}

// ============================================================================
// FileDevice
// ============================================================================

/// Device node (or image file) addressed by path.
///
/// No handle is cached: each call opens the path, seeks, transfers and drops
/// the handle before returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDevice {
    path: PathBuf,
}

impl FileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_read(&self) -> Result<File, StorageError> {
        File::open(&self.path).map_err(|source| StorageError::Open {
            path: self.path.clone(),
            source,
        })
    }

    fn open_write(&self) -> Result<File, StorageError> {
        let mut opts = OpenOptions::new();
        opts.write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.custom_flags(libc::O_SYNC);
        }
        opts.open(&self.path).map_err(|source| StorageError::Open {
            path: self.path.clone(),
            source,
        })
    }
}

fn seek_to(file: &mut File, offset: u64) -> Result<(), StorageError> {
    file.seek(SeekFrom::Start(offset))
        .map(|_| ())
        .map_err(|source| StorageError::Seek { offset, source })
}

impl MiscDevice for FileDevice {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        let mut file = self.open_read()?;
        seek_to(&mut file, offset)?;

        let mut filled = 0usize;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(StorageError::ShortRead {
                        offset,
                        expected: buf.len(),
                        actual: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(StorageError::Read { offset, source }),
            }
        }
        debug!("storage: read {} bytes at {} from {}", buf.len(), offset, self.path.display());
        Ok(())
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        let mut file = self.open_write()?;
        seek_to(&mut file, offset)?;

        let mut written = 0usize;
        while written < data.len() {
            match file.write(&data[written..]) {
                Ok(0) => {
                    return Err(StorageError::ShortWrite {
                        offset,
                        expected: data.len(),
                        actual: written,
                    })
                }
                Ok(n) => written += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(StorageError::Write { offset, source }),
            }
        }

        // O_SYNC already made each write durable on unix.
        #[cfg(not(unix))]
        file.sync_all().map_err(|source| StorageError::Write { offset, source })?;

        debug!("storage: wrote {} bytes at {} to {}", data.len(), offset, self.path.display());
        Ok(())
    }
}

// ============================================================================
// MemDevice
// ============================================================================

/// In-memory device for testing.
#[derive(Debug, Default)]
pub struct MemDevice {
    bytes: Mutex<Vec<u8>>,
}

impl MemDevice {
    /// Zero-filled device of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self::from_bytes(vec![0u8; size])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes: Mutex::new(bytes) }
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }

    /// Copy of the whole device contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    /// Raw mutable access (for corruption tests and fixtures).
    pub fn with_raw_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.bytes.lock())
    }

    fn range(offset: u64, len: usize, size: usize) -> Result<std::ops::Range<usize>, StorageError> {
        let out_of_range = || StorageError::OutOfRange { offset, len, size };
        let start = usize::try_from(offset).map_err(|_| out_of_range())?;
        let end = start.checked_add(len).ok_or_else(out_of_range)?;
        if end > size {
            return Err(out_of_range());
        }
        Ok(start..end)
    }
}

impl MiscDevice for MemDevice {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        let bytes = self.bytes.lock();
        let range = Self::range(offset, buf.len(), bytes.len())?;
        buf.copy_from_slice(&bytes[range]);
        Ok(())
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        let mut bytes = self.bytes.lock();
        let range = Self::range(offset, data.len(), bytes.len())?;
        bytes[range].copy_from_slice(data);
        Ok(())
    }
}
