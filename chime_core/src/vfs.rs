//! Byte sources for sound files other than the local filesystem.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::RwLock;

/// "Does this path exist, give me its bytes."
pub trait VirtualFileSystem: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// In-memory file table, e.g. assets unpacked from an archive at startup.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.files.write().insert(path.into(), bytes.into());
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl VirtualFileSystem for MemoryFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .get(path)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("`{path}` not in file table")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_file_system() {
        let fs = MemoryFileSystem::new();
        assert!(fs.is_empty());

        fs.insert("sfx/jump.wav", vec![1u8, 2, 3]);
        assert!(fs.exists("sfx/jump.wav"));
        assert_eq!(fs.read("sfx/jump.wav").unwrap(), vec![1, 2, 3]);

        let err = fs.read("sfx/land.wav").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        assert!(fs.remove("sfx/jump.wav"));
        assert!(!fs.exists("sfx/jump.wav"));
    }
}
