use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::CaptureResult;

pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_RESULT_CAPACITY: usize = 64;

/// Short-lived hand-off between the capture POST and the result page.
///
/// Each stored result is addressed by a random 128-bit hex id. Reading does
/// not consume it, so the result page can be reloaded until the entry
/// expires. Entries older than the TTL are dropped lazily; when full, the
/// oldest entry is evicted.
pub struct ResultStore {
    entries: Mutex<HashMap<String, (Instant, CaptureResult)>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: DEFAULT_RESULT_TTL,
            capacity: DEFAULT_RESULT_CAPACITY,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Store a result and return the id that retrieves it.
    pub fn insert(&self, result: CaptureResult) -> String {
        let mut raw = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut raw);
        let id = hex::encode(raw);

        let mut entries = self.lock();
        let now = Instant::now();
        entries.retain(|_, (stored_at, _)| now.duration_since(*stored_at) < self.ttl);
        while entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, (stored_at, _))| *stored_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
        entries.insert(id.clone(), (now, result));
        id
    }

    /// Result for `id`, if present and not expired.
    pub fn get(&self, id: &str) -> Option<CaptureResult> {
        let entries = self.lock();
        let (stored_at, result) = entries.get(id)?;
        if stored_at.elapsed() >= self.ttl {
            return None;
        }
        Some(result.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Instant, CaptureResult)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::NutritionRecord;
    use std::path::PathBuf;

    fn result(label: &str) -> CaptureResult {
        CaptureResult {
            prediction: label.to_string(),
            image_path: PathBuf::from("static/uploads/captured_image.jpg"),
            nutrition: NutritionRecord::unavailable(),
        }
    }

    #[test]
    fn ids_are_32_hex_chars_and_distinct() {
        let store = ResultStore::new();
        let a = store.insert(result("Apple"));
        let b = store.insert(result("Apple"));
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn results_survive_repeated_reads() {
        let store = ResultStore::new();
        let id = store.insert(result("Pizza"));
        assert_eq!(store.get(&id).map(|r| r.prediction), Some("Pizza".to_string()));
        assert_eq!(store.get(&id).map(|r| r.prediction), Some("Pizza".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_id_is_none() {
        let store = ResultStore::new();
        assert!(store.get("deadbeef").is_none());
    }

    #[test]
    fn expired_results_are_not_returned() {
        let store = ResultStore::new().with_ttl(Duration::ZERO);
        let id = store.insert(result("Soda"));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let store = ResultStore::new().with_capacity(2);
        let first = store.insert(result("Apple"));
        std::thread::sleep(Duration::from_millis(2));
        let second = store.insert(result("Banana"));
        std::thread::sleep(Duration::from_millis(2));
        let third = store.insert(result("Carrot"));
        assert_eq!(store.len(), 2);
        assert!(store.get(&first).is_none());
        assert!(store.get(&second).is_some());
        assert!(store.get(&third).is_some());
    }
}
