//! Flash filesystem adapter for the ringtone store.
//!
//! Implements [`RingtoneStore`] on top of `std::fs`.
//!
//! - **`target_os = "espidf"`**: the SPIFFS partition is registered with
//!   the ESP-IDF VFS at [`MOUNT_POINT`], after which plain `std::fs` calls
//!   reach it.
//! - **`not(target_os = "espidf")`**: any host directory acts as the
//!   partition, which is what the tests use.
//!
//! A reader captures the file size at open time. If the file is replaced
//! or truncated underneath it, reads simply return what the old handle can
//! still see (possibly end of file early), which the playback controller
//! treats as end of stream.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::app::ports::{AssetReader, AssetWriter, RingtoneStore, StorageUsage};
use crate::error::StorageError;

/// VFS path the ringtone partition is mounted at.
pub const MOUNT_POINT: &str = "/spiffs";

pub struct FlashStore {
    root: PathBuf,
    /// Partition size reported on host, where there is no partition table.
    #[cfg_attr(target_os = "espidf", allow(dead_code))]
    capacity: u32,
}

impl FlashStore {
    /// Register the SPIFFS partition and open the store on it.
    ///
    /// The partition is formatted if it cannot be mounted.
    #[cfg(target_os = "espidf")]
    pub fn mount() -> Result<Self, StorageError> {
        use esp_idf_svc::sys::{esp_vfs_spiffs_conf_t, esp_vfs_spiffs_register, ESP_OK};

        let conf = esp_vfs_spiffs_conf_t {
            base_path: c"/spiffs".as_ptr(),
            partition_label: core::ptr::null(),
            max_files: 4,
            format_if_mount_failed: true,
        };
        // SAFETY: `conf` outlives the call; the VFS copies the base path.
        let ret = unsafe { esp_vfs_spiffs_register(&conf) };
        if ret != ESP_OK {
            log::error!("FlashStore: SPIFFS mount failed ({})", ret);
            return Err(StorageError::MountFailed);
        }

        let store = Self {
            root: PathBuf::from(MOUNT_POINT),
            capacity: 0,
        };
        let usage = store.usage();
        info!(
            "FlashStore: mounted {} ({} / {} bytes used)",
            MOUNT_POINT, usage.used_bytes, usage.total_bytes
        );
        Ok(store)
    }

    /// Open a store rooted at a host directory, creating it if needed.
    pub fn open_dir(root: impl Into<PathBuf>, capacity: u32) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|_| StorageError::MountFailed)?;
        info!("FlashStore: using {}", root.display());
        Ok(Self { root, capacity })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn open_error(e: &io::Error) -> StorageError {
    match e.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound,
        io::ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::OpenFailed,
    }
}

impl RingtoneStore for FlashStore {
    type Reader = FlashReader;
    type Writer = FlashWriter;

    fn open_read(&mut self, name: &str) -> Result<FlashReader, StorageError> {
        let file = File::open(self.path(name)).map_err(|e| open_error(&e))?;
        let len = file
            .metadata()
            .map_err(|_| StorageError::OpenFailed)?
            .len();
        Ok(FlashReader {
            file,
            position: 0,
            size: u32::try_from(len).unwrap_or(u32::MAX),
        })
    }

    fn open_write(&mut self, name: &str) -> Result<FlashWriter, StorageError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.path(name))
            .map_err(|e| open_error(&e))?;
        Ok(FlashWriter { file, written: 0 })
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(_) => Err(StorageError::DeleteFailed),
        }
    }

    fn asset_size(&self, name: &str) -> Option<u32> {
        fs::metadata(self.path(name))
            .ok()
            .filter(fs::Metadata::is_file)
            .map(|m| u32::try_from(m.len()).unwrap_or(u32::MAX))
    }

    #[cfg(target_os = "espidf")]
    fn usage(&self) -> StorageUsage {
        let mut total: usize = 0;
        let mut used: usize = 0;
        // SAFETY: null label selects the default SPIFFS partition.
        let ret = unsafe {
            esp_idf_svc::sys::esp_spiffs_info(core::ptr::null(), &mut total, &mut used)
        };
        if ret != esp_idf_svc::sys::ESP_OK {
            return StorageUsage::default();
        }
        StorageUsage {
            total_bytes: total as u32,
            used_bytes: used as u32,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn usage(&self) -> StorageUsage {
        let used = fs::read_dir(&self.root)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter_map(|e| e.metadata().ok())
                    .filter(fs::Metadata::is_file)
                    .map(|m| m.len())
                    .sum::<u64>()
            })
            .unwrap_or(0);
        StorageUsage {
            total_bytes: self.capacity,
            used_bytes: u32::try_from(used).unwrap_or(u32::MAX),
        }
    }
}

// ── Handles ───────────────────────────────────────────────────

pub struct FlashReader {
    file: File,
    position: u32,
    size: u32,
}

impl AssetReader for FlashReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let n = self.file.read(buf).map_err(|_| StorageError::ReadFailed)?;
        self.position = self.position.saturating_add(n as u32);
        Ok(n)
    }

    fn position(&self) -> u32 {
        self.position
    }

    fn size(&self) -> u32 {
        self.size
    }
}

pub struct FlashWriter {
    file: File,
    written: u32,
}

impl AssetWriter for FlashWriter {
    fn write(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.file.write_all(data).map_err(|e| match e.kind() {
            io::ErrorKind::StorageFull => StorageError::Full,
            _ => StorageError::WriteFailed,
        })?;
        self.written = self.written.saturating_add(data.len() as u32);
        Ok(())
    }

    fn bytes_written(&self) -> u32 {
        self.written
    }

    fn close(mut self) -> Result<u32, StorageError> {
        self.file.flush().map_err(|_| StorageError::WriteFailed)?;
        Ok(self.written)
    }
}
