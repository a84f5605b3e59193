// Storage abstraction used by the uploader. The B2 client in `api`
// implements it for real uploads; tests implement it in memory.

use crate::error::Result;
use crate::naming::ObjectKey;
use std::io::{self, Read};
use std::path::Path;

/// Receives the cumulative number of bytes sent during an upload.
pub type ProgressFn = Box<dyn FnMut(u64) + Send>;

/// A stored object as reported by the backend. The id is whatever the
/// backend needs to address this exact object for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub key: String,
    pub id: String,
    pub size: Option<u64>,
}

pub trait ObjectStore {
    /// Metadata lookup. A missing object is `Ok(None)`, never an error.
    fn find(&self, key: &str) -> Result<Option<ObjectHandle>>;

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Send the file at `local_path` under `key`. Failures are returned as
    /// they happen; retrying is up to the caller.
    fn upload(
        &self,
        local_path: &Path,
        key: &ObjectKey,
        progress: Option<ProgressFn>,
    ) -> Result<ObjectHandle>;

    /// Remove the object. Returns `Error::NotFound` when it is already gone.
    fn delete(&self, handle: &ObjectHandle) -> Result<()>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn find(&self, key: &str) -> Result<Option<ObjectHandle>> {
        (**self).find(key)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }

    fn upload(
        &self,
        local_path: &Path,
        key: &ObjectKey,
        progress: Option<ProgressFn>,
    ) -> Result<ObjectHandle> {
        (**self).upload(local_path, key, progress)
    }

    fn delete(&self, handle: &ObjectHandle) -> Result<()> {
        (**self).delete(handle)
    }
}

/// Reader adapter that reports the running total of bytes read.
pub struct ProgressReader<R> {
    inner: R,
    read: u64,
    progress: Option<ProgressFn>,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, progress: Option<ProgressFn>) -> Self {
        Self {
            inner,
            read: 0,
            progress,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.read
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.read += n as u64;
            if let Some(report) = self.progress.as_mut() {
                report(self.read);
            }
        }
        Ok(n)
    }
}
