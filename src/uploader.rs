// Upload and delete flows on top of an `ObjectStore`.
//
// The uploader does no terminal I/O. It returns typed errors and lets the
// caller decide how to present them.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::naming::{self, ObjectKey};
use crate::store::{ObjectStore, ProgressFn};
use percent_encoding::percent_decode_str;
use rand::Rng;
use std::path::PathBuf;
use tracing::info;

/// A local file to upload and, optionally, the name to store it under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub name: Option<String>,
    /// Normalized extension with a leading dot, or empty.
    pub extension: String,
}

impl UploadRequest {
    /// Extension is taken from the path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = naming::extension_of(&path);
        Self {
            path,
            name: None,
            extension,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub key: ObjectKey,
    pub url: String,
    pub size: Option<u64>,
}

pub struct Uploader<S> {
    store: S,
    config: Config,
}

impl<S: ObjectStore> Uploader<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Pick a free key, upload the file under it and return the public URL.
    pub fn upload(&self, request: &UploadRequest, progress: Option<ProgressFn>) -> Result<UploadResult> {
        self.upload_with_rng(request, progress, &mut rand::thread_rng())
    }

    pub fn upload_with_rng<R: Rng + ?Sized>(
        &self,
        request: &UploadRequest,
        progress: Option<ProgressFn>,
        rng: &mut R,
    ) -> Result<UploadResult> {
        if !request.path.is_file() {
            return Err(Error::NotFound(request.path.display().to_string()));
        }

        let key = naming::resolve(
            &self.store,
            &self.config.prefix,
            request.name.as_deref(),
            &request.extension,
            self.config.name_length,
            rng,
        )?;
        let handle = self.store.upload(&request.path, &key, progress)?;
        let url = naming::resolve_url(&self.config.base_url, &key);
        info!(key = %key, url = %url, "uploaded");

        Ok(UploadResult {
            key,
            url,
            size: handle.size,
        })
    }

    /// Delete by bare name (relative to the prefix), by key, or by the public URL.
    /// An object that is already gone is reported as `Error::NotFound`.
    pub fn delete(&self, reference: &str) -> Result<String> {
        let key = self.key_for(reference);
        let handle = self
            .store
            .find(&key)?
            .ok_or_else(|| Error::NotFound(key.clone()))?;
        self.store.delete(&handle)?;
        info!(key = %key, "deleted");
        Ok(key)
    }

    /// Turn what the user typed into a bucket key. A public URL maps back
    /// to its key; a name that already carries the prefix is used as is.
    pub fn key_for(&self, reference: &str) -> String {
        let reference = reference.trim();
        let base = self.config.base_url.trim_end_matches('/');
        if let Some(key) = reference
            .strip_prefix(base)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
        {
            return percent_decode_str(key).decode_utf8_lossy().into_owned();
        }

        let name = reference.trim_start_matches('/');
        if !self.config.prefix.is_empty() && name.starts_with(&self.config.prefix) {
            name.to_string()
        } else {
            format!("{}{}", self.config.prefix, name)
        }
    }
}
