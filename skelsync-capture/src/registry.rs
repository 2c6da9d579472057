//! Dense camera id assignment for transient camera keys.

use skelsync_data::CameraId;
use std::collections::HashMap;
use std::hash::Hash;

/// Hands out camera ids 0, 1, 2, ... to keys in first-seen order.
///
/// Keys are whatever identifies a camera on the ingestion side, e.g. the
/// sender's socket address. The first key seen becomes the reference camera.
#[derive(Debug, Clone)]
pub struct CameraRegistry<K> {
    ids: HashMap<K, CameraId>,
    keys: Vec<K>,
}

impl<K: Eq + Hash + Clone> CameraRegistry<K> {
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            keys: Vec::new(),
        }
    }

    /// Id for `key`, assigning the next free one if the key is new.
    pub fn id_for(&mut self, key: &K) -> CameraId {
        if let Some(&id) = self.ids.get(key) {
            return id;
        }
        let id = self.keys.len() as CameraId;
        self.ids.insert(key.clone(), id);
        self.keys.push(key.clone());
        id
    }

    pub fn get(&self, key: &K) -> Option<CameraId> {
        self.ids.get(key).copied()
    }

    pub fn key(&self, camera_id: CameraId) -> Option<&K> {
        usize::try_from(camera_id).ok().and_then(|i| self.keys.get(i))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Registered keys in id order.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }
}

impl<K: Eq + Hash + Clone> Default for CameraRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[test]
    fn test_first_seen_order() {
        let a: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        let b: SocketAddr = "10.0.0.2:4000".parse().unwrap();
        let mut registry = CameraRegistry::new();

        assert_eq!(registry.id_for(&a), 0);
        assert_eq!(registry.id_for(&b), 1);
        assert_eq!(registry.id_for(&a), 0);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.keys(), &[a, b]);
        assert_eq!(registry.get(&b), Some(1));
        assert_eq!(registry.key(1), Some(&b));
    }

    #[test]
    fn test_unknown_lookups() {
        let registry: CameraRegistry<String> = CameraRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.get(&"kinect".to_string()), None);
        assert_eq!(registry.key(-1), None);
        assert_eq!(registry.key(0), None);
    }
}
