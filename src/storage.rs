//! Crash-safe file writes.
//!
//! Used by the local store to persist objects and by the file-sink
//! retrieval to materialize a downloaded object.

use anyhow::{Context, Result};
use log::warn;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::crypto::aead::secure_random;

/// A file that is only ever replaced as a whole.
///
/// Readers of the path see either the previous content or the complete
/// new content, never a partial write.
#[derive(Clone, Debug)]
pub struct AtomicFile {
    path: PathBuf,
}

impl AtomicFile {
    /// Creates a new AtomicFile for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns `true` if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the entire file into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    /// Replaces the file content with `data`.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        self.write_from(&mut &data[..])?;
        Ok(())
    }

    /// Streams `reader` into the file using an atomic write and returns
    /// the number of bytes written.
    ///
    /// 1. Copy into a temporary file with random name next to the target
    /// 2. Sync the temporary file to disk
    /// 3. Atomically replace the target with the temporary file
    /// 4. Sync the parent directory
    ///
    /// If reading fails midway the temporary file is removed and the
    /// target is left untouched. Once the rename succeeds the complete
    /// content is in place; a failure to sync the directory afterwards is
    /// only logged.
    ///
    /// Creates parent directories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub fn write_from(&self, reader: &mut dyn Read) -> Result<u64> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.random_tmp_path()?;

        // securely create temp file (fail if exists)
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .context("failed to create temporary file")?;

        let written = match copy_and_sync(reader, &mut tmp_file) {
            Ok(n) => n,
            Err(e) => {
                drop(tmp_file);
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };
        drop(tmp_file);

        if let Err(e) = self.atomic_replace(&tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        settle_parent_sync(&self.path, self.sync_parent_dir());

        Ok(written)
    }

    /// Syncs the parent directory so a rename is persisted.
    #[cfg(not(target_os = "windows"))]
    fn sync_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                File::open(parent)?.sync_all()?;
            }
        }
        Ok(())
    }

    /// Directories cannot be opened for syncing on Windows; `ReplaceFileW`
    /// already writes through.
    #[cfg(target_os = "windows")]
    fn sync_parent_dir(&self) -> Result<()> {
        Ok(())
    }

    /// Returns the path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generates a unique temporary file path in the same directory.
    ///
    /// Format: `filename.tmp.<randomhex>`
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut buf = [0u8; 8]; // 64 bit entropy
        secure_random(&mut buf)?;

        let rand_string = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();

        let file_name = self
            .path
            .file_name()
            .with_context(|| format!("'{}' has no file name", self.path.display()))?
            .to_string_lossy();

        let tmp_name = format!("{}.tmp.{}", file_name, rand_string);

        Ok(self.path.with_file_name(tmp_name))
    }

    /// Atomically replaces the target file with the temporary file.
    ///
    /// Uses Windows `ReplaceFileW` API with `REPLACEFILE_WRITE_THROUGH` flag
    /// when the target exists; a plain rename otherwise.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        if !self.path.exists() {
            fs::rename(tmp_path, &self.path)?;
            return Ok(());
        }

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY:
        // - Strings are valid UTF-16 and null-terminated
        // - Pointers remain valid during the call
        // - Windows does not retain the pointers after return
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).context("atomic replace failed");
        }

        Ok(())
    }

    /// Atomically replaces the target file with the temporary file.
    ///
    /// On Unix, `rename()` is atomic when both paths are on the same filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}

fn settle_parent_sync(path: &Path, synced: Result<()>) {
    if let Err(e) = synced {
        warn!(
            "wrote {} but could not sync its directory: {e:#}",
            path.display()
        );
    }
}

fn copy_and_sync(reader: &mut dyn Read, file: &mut File) -> Result<u64> {
    let written = io::copy(reader, file)?;
    file.sync_all()?; //fsync file
    Ok(written)
}
