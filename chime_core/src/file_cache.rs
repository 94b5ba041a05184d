//! Reference-counted encoded file bytes, keyed by path.
//!
//! Each path is read and registered with the native mixer once, no matter how
//! many sounds are loaded from it. The entry goes away with the last sound.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ChimeError, Result};
use crate::native::NativeMixer;
use crate::vfs::VirtualFileSystem;

#[derive(Debug)]
pub struct FileBufferEntry {
    bytes: Arc<[u8]>,
    refs: usize,
}

impl FileBufferEntry {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn refs(&self) -> usize {
        self.refs
    }
}

#[derive(Debug, Default)]
pub struct FileBufferCache {
    entries: HashMap<String, FileBufferEntry>,
}

impl FileBufferCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reference on `path`, reading and registering it on first use.
    ///
    /// Bytes come from `source` when given, otherwise from the filesystem.
    /// On failure no entry is left behind.
    pub fn load(
        &mut self,
        path: &str,
        source: Option<&dyn VirtualFileSystem>,
        native: &dyn NativeMixer,
    ) -> Result<()> {
        if let Some(entry) = self.entries.get_mut(path) {
            entry.refs += 1;
            return Ok(());
        }

        let bytes: Arc<[u8]> = match source {
            Some(fs) => {
                if !fs.exists(path) {
                    return Err(ChimeError::sound_init(path, "not found in virtual file system"));
                }
                fs.read(path).map_err(|e| ChimeError::sound_init(path, e))?
            }
            None => std::fs::read(path).map_err(|e| ChimeError::sound_init(path, e))?,
        }
        .into();

        native
            .register_encoded(path, Arc::clone(&bytes))
            .map_err(|e| ChimeError::sound_init(path, e))?;

        debug!(path, size = bytes.len(), "registered file buffer");
        self.entries.insert(path.to_string(), FileBufferEntry { bytes, refs: 1 });
        Ok(())
    }

    /// Drop a reference on `path`, unregistering it with the last one.
    pub fn unload(&mut self, path: &str, native: &dyn NativeMixer) -> Result<()> {
        let Some(entry) = self.entries.get_mut(path) else {
            return Err(ChimeError::InternalConsistency(format!(
                "no file buffer for `{path}` while unloading"
            )));
        };

        entry.refs -= 1;
        if entry.refs > 0 {
            return Ok(());
        }

        self.entries.remove(path);
        native.unregister_encoded(path)?;
        debug!(path, "released file buffer");
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&FileBufferEntry> {
        self.entries.get(path)
    }

    pub fn refcount(&self, path: &str) -> usize {
        self.entries.get(path).map_or(0, |entry| entry.refs)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
