//! Stable per-install device identifier.
//!
//! The id tags every outbound request and live channel frame so the session
//! can recognise its own echoes. It is created once, kept in the durable
//! backend under `device_id`, and only regenerated after storage is wiped or
//! [`DeviceIdProvider::reset`] is called.
//!
//! Format: `device_<unix millis>_<6 digit random suffix>`. Uniqueness is not
//! cryptographically enforced.

use leaguer_storage::{KeyValueBackend, StorageKeys};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Generate a fresh identifier.
pub fn generate_device_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("device_{}_{:06}", millis, suffix)
}

/// Hands out the install's device id.
pub struct DeviceIdProvider {
    durable: Arc<dyn KeyValueBackend>,
    cached: Mutex<Option<String>>,
}

impl DeviceIdProvider {
    pub fn new(durable: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            durable,
            cached: Mutex::new(None),
        }
    }

    /// Return the device id, loading or creating it on first use.
    ///
    /// Never fails. If the backend cannot be read or written the id is kept in
    /// memory for the life of this provider.
    pub fn get_device_id(&self) -> String {
        let mut cached = self.cached.lock();
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        match self.durable.get(StorageKeys::DEVICE_ID) {
            Ok(Some(id)) if !id.trim().is_empty() => {
                debug!(device_id = %id, "Loaded device id");
                *cached = Some(id.clone());
                return id;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read device id, generating a new one"),
        }

        let id = generate_device_id();
        match self.durable.set(StorageKeys::DEVICE_ID, &id) {
            Ok(()) => info!(device_id = %id, "Generated device id"),
            Err(e) => {
                warn!(device_id = %id, error = %e, "Failed to persist device id, keeping it in memory")
            }
        }
        *cached = Some(id.clone());
        id
    }

    /// Forget the id in memory and in the durable backend.
    pub fn reset(&self) {
        *self.cached.lock() = None;
        if let Err(e) = self.durable.delete(StorageKeys::DEVICE_ID) {
            warn!(error = %e, "Failed to delete stored device id");
        }
        debug!("Device id reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leaguer_storage::{FileBackend, MemoryBackend, StorageError, StorageResult};
    use tempfile::tempdir;

    /// Backend whose every operation fails.
    struct BrokenBackend;

    impl KeyValueBackend for BrokenBackend {
        fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Backend("quota exceeded".to_string()))
        }

        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Backend("access denied".to_string()))
        }

        fn delete(&self, _key: &str) -> StorageResult<bool> {
            Err(StorageError::Backend("access denied".to_string()))
        }

        fn keys(&self) -> StorageResult<Vec<String>> {
            Err(StorageError::Backend("access denied".to_string()))
        }
    }

    fn assert_well_formed(id: &str) {
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3, "unexpected id {}", id);
        assert_eq!(parts[0], "device");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_generated_id_format() {
        assert_well_formed(&generate_device_id());
    }

    #[test]
    fn test_id_is_stable_within_process() {
        let provider = DeviceIdProvider::new(Arc::new(MemoryBackend::new()));

        let first = provider.get_device_id();
        let second = provider.get_device_id();
        assert_eq!(first, second);
        assert_well_formed(&first);
    }

    #[test]
    fn test_id_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let first = DeviceIdProvider::new(Arc::new(FileBackend::open(&path).unwrap()))
            .get_device_id();
        let second = DeviceIdProvider::new(Arc::new(FileBackend::open(&path).unwrap()))
            .get_device_id();

        assert_eq!(first, second);
    }

    #[test]
    fn test_id_regenerated_after_storage_cleared() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let first = DeviceIdProvider::new(Arc::new(FileBackend::open(&path).unwrap()))
            .get_device_id();

        std::fs::remove_file(&path).unwrap();

        let second = DeviceIdProvider::new(Arc::new(FileBackend::open(&path).unwrap()))
            .get_device_id();
        assert_ne!(first, second);
    }

    #[test]
    fn test_reset_forces_new_id() {
        let backend = Arc::new(MemoryBackend::new());
        let provider = DeviceIdProvider::new(backend.clone());

        let first = provider.get_device_id();
        provider.reset();
        assert!(backend.get(StorageKeys::DEVICE_ID).unwrap().is_none());

        let second = provider.get_device_id();
        assert_ne!(first, second);
        assert_eq!(backend.get(StorageKeys::DEVICE_ID).unwrap(), Some(second));
    }

    #[test]
    fn test_broken_storage_still_yields_stable_id() {
        let provider = DeviceIdProvider::new(Arc::new(BrokenBackend));

        let first = provider.get_device_id();
        assert_well_formed(&first);
        assert_eq!(provider.get_device_id(), first);

        provider.reset();
    }
}
