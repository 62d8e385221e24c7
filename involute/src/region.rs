//! Shared and file-backed memory regions.
//!
//! The edge pruning table is too large to rebuild per process, so it
//! lives in a System V shared memory segment keyed by a fixed constant;
//! every solver process on the machine attaches to the same physical
//! pages. The result database is an ordinary file mapped read-write.
//! Huge pages are requested first for the segment and quietly skipped
//! where the kernel has none configured.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};

// 1 GiB pages, as log2.
const HUGE_SHIFT: libc::c_int = 30;

/// An attached System V shared memory segment.
///
/// The segment outlives the process; dropping this handle only detaches.
/// Freeing the physical pages is an explicit [`SharedSegment::remove`].
pub struct SharedSegment {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: the segment is a fixed region of process memory; synchronization
// of its contents is the accessors' concern, the handle itself carries no
// thread affinity.
unsafe impl Send for SharedSegment {}
// SAFETY: as above.
unsafe impl Sync for SharedSegment {}

impl SharedSegment {
    /// Attaches to the segment under `key`, creating it if absent. The
    /// requested length is rounded up to whole huge pages, with a plain
    /// page retry when no huge pages are configured. None when the kernel
    /// refuses both.
    pub fn get_or_create(key: u32, len: usize) -> Option<SharedSegment> {
        let pages = len.div_ceil(1 << HUGE_SHIFT);
        let len = pages << HUGE_SHIFT;

        // SAFETY: shmget/shmat are called with a length the kernel
        // validates; failures are reported by return value, not UB.
        unsafe {
            let base = 0o600 | libc::IPC_CREAT;
            let mut id = libc::shmget(
                key as libc::key_t,
                len,
                base | libc::SHM_HUGETLB | (HUGE_SHIFT << libc::MAP_HUGE_SHIFT),
            );
            if id == -1 {
                id = libc::shmget(key as libc::key_t, len, base);
            }
            if id == -1 {
                return None;
            }
            let ptr = libc::shmat(id, std::ptr::null(), 0);
            if ptr == usize::MAX as *mut libc::c_void {
                return None;
            }
            Some(SharedSegment {
                ptr: ptr.cast(),
                len,
            })
        }
    }

    /// Schedules the segment under `key` for destruction once every
    /// process has detached. Missing segments are ignored.
    pub fn remove(key: u32) -> bool {
        // SAFETY: IPC_RMID with a null buf is the documented removal call.
        unsafe {
            let id = libc::shmget(key as libc::key_t, 0, 0);
            id != -1 && libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut()) == 0
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        // SAFETY: ptr came from shmat and is detached exactly once.
        unsafe {
            libc::shmdt(self.ptr.cast());
        }
    }
}

/// Maps `path` read-write at exactly `len` bytes.
///
/// With `create` set the file is created or resized to `len`; otherwise a
/// length mismatch is an error, catching truncated or foreign files
/// before any page fault can.
pub fn map_file(path: &Path, len: u64, create: bool) -> io::Result<(std::fs::File, MmapMut)> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(create)
        .open(path)?;
    if create {
        file.set_len(len)?;
    } else if file.metadata()?.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} is not {len} bytes", path.display()),
        ));
    }
    // SAFETY: the callers hold an exclusive advisory lock on the file (or
    // coordinate through in-file locks) for the lifetime of the map, so
    // no other process truncates it underneath us.
    let map = unsafe { MmapOptions::new().len(len as usize).map_mut(&file)? };
    Ok((file, map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_file_creates_and_reopens() {
        let path = std::env::temp_dir().join("involute-map-test.bin");
        let _ = std::fs::remove_file(&path);

        let (_f, mut map) = map_file(&path, 4096, true).unwrap();
        map[0] = 0x42;
        map[4095] = 0x24;
        map.flush().unwrap();
        drop(map);

        let (_f, map) = map_file(&path, 4096, false).unwrap();
        assert_eq!(map[0], 0x42);
        assert_eq!(map[4095], 0x24);
        drop(map);

        assert!(map_file(&path, 8192, false).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
