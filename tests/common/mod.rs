// In-memory `ObjectStore` shared by the integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use uclip::config::{Config, StoredConfig};
use uclip::naming::ObjectKey;
use uclip::store::{ObjectHandle, ObjectStore, ProgressFn, ProgressReader};
use uclip::{Error, Result};

#[derive(Default)]
pub struct MemoryStore {
    objects: RefCell<BTreeMap<String, ObjectHandle>>,
    checks: RefCell<Vec<String>>,
    /// Number of upcoming existence checks that report "taken" regardless.
    busy_checks: Cell<usize>,
    fail_upload: RefCell<Option<Error>>,
    next_id: Cell<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every existence check reports the key as taken.
    pub fn always_taken() -> Self {
        let store = Self::default();
        store.busy_checks.set(usize::MAX);
        store
    }

    /// The first `n` existence checks report the key as taken.
    pub fn busy_for(n: usize) -> Self {
        let store = Self::default();
        store.busy_checks.set(n);
        store
    }

    pub fn insert(&self, key: &str) {
        let id = self.fresh_id();
        self.objects.borrow_mut().insert(
            key.to_string(),
            ObjectHandle {
                key: key.to_string(),
                id,
                size: Some(0),
            },
        );
    }

    pub fn fail_next_upload(&self, err: Error) {
        *self.fail_upload.borrow_mut() = Some(err);
    }

    pub fn checks(&self) -> Vec<String> {
        self.checks.borrow().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.borrow().keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.borrow().contains_key(key)
    }

    fn fresh_id(&self) -> String {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        format!("4_z{:08}", id)
    }
}

impl ObjectStore for MemoryStore {
    fn find(&self, key: &str) -> Result<Option<ObjectHandle>> {
        self.checks.borrow_mut().push(key.to_string());
        let busy = self.busy_checks.get();
        if busy > 0 {
            if busy != usize::MAX {
                self.busy_checks.set(busy - 1);
            }
            return Ok(Some(ObjectHandle {
                key: key.to_string(),
                id: "busy".into(),
                size: None,
            }));
        }
        Ok(self.objects.borrow().get(key).cloned())
    }

    fn upload(
        &self,
        local_path: &Path,
        key: &ObjectKey,
        progress: Option<ProgressFn>,
    ) -> Result<ObjectHandle> {
        if let Some(err) = self.fail_upload.borrow_mut().take() {
            return Err(err);
        }
        let mut reader = ProgressReader::new(File::open(local_path)?, progress);
        let mut buf = [0u8; 1024];
        while reader.read(&mut buf)? > 0 {}

        let handle = ObjectHandle {
            key: key.as_str().to_string(),
            id: self.fresh_id(),
            size: Some(reader.bytes_read()),
        };
        self.objects
            .borrow_mut()
            .insert(handle.key.clone(), handle.clone());
        Ok(handle)
    }

    fn delete(&self, handle: &ObjectHandle) -> Result<()> {
        match self.objects.borrow_mut().remove(&handle.key) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(handle.key.clone())),
        }
    }
}

pub fn config(prefix: &str, name_length: usize, base_url: &str) -> Config {
    Config::from_stored(StoredConfig {
        key_id: Some("0012ab".into()),
        application_key: Some("K001secret".into()),
        bucket: Some("screenshots".into()),
        prefix: Some(prefix.into()),
        base_url: Some(base_url.into()),
        name_length: Some(name_length),
    })
    .unwrap()
}
