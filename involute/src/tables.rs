//! On-disk caching of generated lookup tables.
//!
//! Tables live in a single directory as raw native-endian dumps; they
//! are machine-local caches, regenerated from scratch whenever a load
//! comes up short. The directory defaults to `tables/` under the working
//! directory and may be overridden with [`set_dir`] or the
//! `INVOLUTE_TABLES` environment variable. Saves go through a temporary
//! file and a rename so that a crash never leaves a truncated table
//! behind under the real name.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static DIR: OnceLock<PathBuf> = OnceLock::new();

/// Overrides the table directory. Only effective before the first table
/// access; later calls are ignored.
pub fn set_dir(dir: PathBuf) {
    let _ = DIR.set(dir);
}

fn dir() -> &'static Path {
    DIR.get_or_init(|| {
        std::env::var_os("INVOLUTE_TABLES").map_or_else(|| PathBuf::from("tables"), PathBuf::from)
    })
}

/// Table elements that may be read and written as raw bytes.
///
/// # Safety
///
/// Implementors must be plain old data: no padding, no niches, every bit
/// pattern valid.
pub unsafe trait Plain: Copy {}

// SAFETY: bare integers have no padding and accept any bit pattern.
unsafe impl Plain for u8 {}
// SAFETY: as above.
unsafe impl Plain for u16 {}
// SAFETY: as above.
unsafe impl Plain for u32 {}
// SAFETY: as above.
unsafe impl Plain for u64 {}

fn as_bytes<T: Plain>(table: &[T]) -> &[u8] {
    // SAFETY: Plain elements have no padding, so the allocation is fully
    // initialized for `size_of_val` bytes.
    unsafe { std::slice::from_raw_parts(table.as_ptr().cast(), size_of_val(table)) }
}

fn as_bytes_mut<T: Plain>(table: &mut [T]) -> &mut [u8] {
    // SAFETY: Plain elements accept any bit pattern, so arbitrary byte
    // writes cannot produce an invalid value.
    unsafe { std::slice::from_raw_parts_mut(table.as_mut_ptr().cast(), size_of_val(table)) }
}

/// Path of `filename` inside the table directory.
pub fn full_path(filename: &str) -> PathBuf {
    dir().join(filename)
}

pub fn exists(filename: &str) -> bool {
    full_path(filename).exists()
}

/// Fills `table` from a saved dump. False when the file is missing or
/// shorter than the table; the contents of `table` are then unspecified
/// and the caller regenerates.
pub fn load<T: Plain>(filename: &str, table: &mut [T]) -> bool {
    let Ok(mut f) = File::open(full_path(filename)) else {
        return false;
    };
    f.read_exact(as_bytes_mut(table)).is_ok()
}

pub fn save<T: Plain>(filename: &str, table: &[T]) -> io::Result<()> {
    fs::create_dir_all(dir())?;
    let path = full_path(filename);
    let tmp = full_path(&format!("{filename}.tmp"));
    let mut f = File::create(&tmp)?;
    f.write_all(as_bytes(table))?;
    f.sync_all()?;
    fs::rename(tmp, path)
}

/// Saves `table` and then grows the file to `full_len` bytes of zeros, so
/// a later load of the full length succeeds with the tail blank.
pub fn save_and_extend<T: Plain>(filename: &str, table: &[T], full_len: u64) -> io::Result<()> {
    fs::create_dir_all(dir())?;
    let path = full_path(filename);
    let tmp = full_path(&format!("{filename}.resize"));
    let mut f = File::create(&tmp)?;
    f.write_all(as_bytes(table))?;
    f.set_len(full_len)?;
    f.sync_all()?;
    fs::rename(tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let name = "test-save-load.dat";
        let table: Vec<u32> = (0..1000u32).map(|i| i.wrapping_mul(2_654_435_761)).collect();
        save(name, &table).unwrap();
        assert!(exists(name));

        let mut loaded = vec![0u32; 1000];
        assert!(load(name, &mut loaded));
        assert_eq!(loaded, table);

        // A longer read than was saved must fail rather than truncate.
        let mut too_long = vec![0u32; 1001];
        assert!(!load(name, &mut too_long));

        fs::remove_file(full_path(name)).unwrap();
    }

    #[test]
    fn load_of_missing_file_is_false() {
        let mut table = [0u64; 4];
        assert!(!load("test-no-such-table.dat", &mut table));
    }

    #[test]
    fn extend_pads_with_zeros() {
        let name = "test-extend.dat";
        let table = [0xabu8; 16];
        save_and_extend(name, &table, 64).unwrap();

        let mut full = [0u8; 64];
        assert!(load(name, &mut full));
        assert_eq!(&full[..16], &table);
        assert!(full[16..].iter().all(|&b| b == 0));

        fs::remove_file(full_path(name)).unwrap();
    }
}
