//! Whole-file read/write helpers
//!
//! Failure is signaled by `None`/`false` plus a logged diagnostic; callers
//! decide whether that is fatal (the renderer treats a failed shader read
//! as a fatal bring-up error).

use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;

use crate::foundation::memory::{ScratchAllocator, ScratchBlock};

/// Whether `path` exists and is a regular file.
pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Size of `path` in bytes, or `None` with a logged diagnostic.
pub fn file_size(path: &Path) -> Option<u64> {
    match fs::metadata(path) {
        Ok(meta) => Some(meta.len()),
        Err(err) => {
            log::error!("failed to stat file {}: {}", path.display(), err);
            None
        }
    }
}

/// Last-modified timestamp of `path`, or `None` with a logged diagnostic.
pub fn modified_timestamp(path: &Path) -> Option<SystemTime> {
    match fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(ts) => Some(ts),
        Err(err) => {
            log::error!("failed to read timestamp of {}: {}", path.display(), err);
            None
        }
    }
}

/// Read the whole file at `path` into `scratch`.
///
/// Returns the staged block, or `None` with a logged diagnostic when the
/// file cannot be read or the arena has no room for it.
pub fn read_file(path: &Path, scratch: &mut ScratchAllocator) -> Option<ScratchBlock> {
    let size = file_size(path)? as usize;
    let block = scratch.alloc(size)?;

    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) => {
            log::error!("failed to open file {}: {}", path.display(), err);
            return None;
        }
    };

    if let Err(err) = file.read_exact(scratch.bytes_mut(block)) {
        log::error!("failed to read file {}: {}", path.display(), err);
        return None;
    }

    Some(block)
}

/// Write `data` to `path`, truncating any existing file.
pub fn write_file(path: &Path, data: &[u8]) -> bool {
    match fs::write(path, data) {
        Ok(()) => true,
        Err(err) => {
            log::error!("failed to write file {}: {}", path.display(), err);
            false
        }
    }
}

/// Copy `src` to `dst`, staging the contents through `scratch`.
pub fn copy_file(src: &Path, dst: &Path, scratch: &mut ScratchAllocator) -> bool {
    match read_file(src, scratch) {
        Some(block) => write_file(dst, scratch.bytes(block)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ember_file_io_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_write_then_read_through_arena() {
        let path = temp_path("roundtrip");
        let mut scratch = ScratchAllocator::with_capacity(256).unwrap();

        assert!(write_file(&path, b"void main() {}\n"));
        let block = read_file(&path, &mut scratch).unwrap();
        assert_eq!(scratch.bytes(block), b"void main() {}\n");
        assert_eq!(file_size(&path), Some(15));
        assert!(file_exists(&path));
        assert!(modified_timestamp(&path).is_some());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let mut scratch = ScratchAllocator::with_capacity(64).unwrap();
        let path = temp_path("does_not_exist");

        assert!(!file_exists(&path));
        assert!(file_size(&path).is_none());
        assert!(read_file(&path, &mut scratch).is_none());
        assert_eq!(scratch.used(), 0);
    }

    #[test]
    fn test_oversized_file_fails_without_arena_damage() {
        let path = temp_path("oversized");
        assert!(write_file(&path, &[0xab; 128]));

        let mut scratch = ScratchAllocator::with_capacity(64).unwrap();
        assert!(read_file(&path, &mut scratch).is_none());
        assert_eq!(scratch.used(), 0);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_copy_file() {
        let src = temp_path("copy_src");
        let dst = temp_path("copy_dst");
        let mut scratch = ScratchAllocator::with_capacity(256).unwrap();

        assert!(write_file(&src, b"#version 330 core"));
        assert!(copy_file(&src, &dst, &mut scratch));

        let mut check = ScratchAllocator::with_capacity(256).unwrap();
        let block = read_file(&dst, &mut check).unwrap();
        assert_eq!(check.bytes(block), b"#version 330 core");

        let _ = fs::remove_file(&src);
        let _ = fs::remove_file(&dst);
    }
}
