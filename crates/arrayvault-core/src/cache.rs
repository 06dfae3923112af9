//! Object-cache facade
//!
//! A thin adapter over any ArrayFile-backed object cache, applying an
//! optional inbound transform before `set` and an optional outbound
//! transform after `get`. Every other operation is a faithful passthrough.

/// The minimal surface a collaborator cache must expose to be wrapped.
pub trait ObjectStore {
    fn get_object_id_start(&self) -> i64;
    fn get_object_id_count(&self) -> i64;
    fn get(&self, id: i64) -> Option<Vec<u8>>;
    fn set(&mut self, id: i64, value: Vec<u8>);
    fn delete(&mut self, id: i64);
    fn persist(&mut self) -> crate::error::ArrayFileResult<()>;
}

/// A boxed byte-buffer mutator applied in place.
pub type Transform = Box<dyn Fn(&mut Vec<u8>) + Send + Sync>;

/// Wraps a collaborator cache `C`, applying `inbound` before every `set` and
/// `outbound` after every `get`. A `None` transform is a passthrough.
pub struct TransformedObjectCache<C: ObjectStore> {
    inner: C,
    inbound: Option<Transform>,
    outbound: Option<Transform>,
}

impl<C: ObjectStore> TransformedObjectCache<C> {
    pub fn new(inner: C) -> Self {
        Self { inner, inbound: None, outbound: None }
    }

    pub fn with_inbound(mut self, transform: Transform) -> Self {
        self.inbound = Some(transform);
        self
    }

    pub fn with_outbound(mut self, transform: Transform) -> Self {
        self.outbound = Some(transform);
        self
    }

    pub fn get_object_id_start(&self) -> i64 {
        self.inner.get_object_id_start()
    }

    pub fn get_object_id_count(&self) -> i64 {
        self.inner.get_object_id_count()
    }

    pub fn get(&self, id: i64) -> Option<Vec<u8>> {
        let mut value = self.inner.get(id)?;
        if let Some(transform) = &self.outbound {
            transform(&mut value);
        }
        Some(value)
    }

    pub fn set(&mut self, id: i64, mut value: Vec<u8>) {
        if let Some(transform) = &self.inbound {
            transform(&mut value);
        }
        self.inner.set(id, value);
    }

    pub fn delete(&mut self, id: i64) {
        self.inner.delete(id);
    }

    pub fn persist(&mut self) -> crate::error::ArrayFileResult<()> {
        self.inner.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapStore {
        data: HashMap<i64, Vec<u8>>,
        start: i64,
    }

    impl ObjectStore for MapStore {
        fn get_object_id_start(&self) -> i64 {
            self.start
        }
        fn get_object_id_count(&self) -> i64 {
            self.data.len() as i64
        }
        fn get(&self, id: i64) -> Option<Vec<u8>> {
            self.data.get(&id).cloned()
        }
        fn set(&mut self, id: i64, value: Vec<u8>) {
            self.data.insert(id, value);
        }
        fn delete(&mut self, id: i64) {
            self.data.remove(&id);
        }
        fn persist(&mut self) -> crate::error::ArrayFileResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_passthrough_with_no_transforms() {
        let mut cache = TransformedObjectCache::new(MapStore { data: HashMap::new(), start: 0 });
        cache.set(1, vec![1, 2, 3]);
        assert_eq!(cache.get(1), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_inbound_and_outbound_transforms_apply() {
        let mut cache = TransformedObjectCache::new(MapStore { data: HashMap::new(), start: 0 })
            .with_inbound(Box::new(|v: &mut Vec<u8>| v.push(0xFF)))
            .with_outbound(Box::new(|v: &mut Vec<u8>| v.insert(0, 0xAA)));
        cache.set(1, vec![1, 2]);
        assert_eq!(cache.get(1), Some(vec![0xAA, 1, 2, 0xFF]));
    }

    #[test]
    fn test_delete_and_counts_passthrough() {
        let mut cache = TransformedObjectCache::new(MapStore { data: HashMap::new(), start: 7 });
        cache.set(1, vec![9]);
        assert_eq!(cache.get_object_id_start(), 7);
        assert_eq!(cache.get_object_id_count(), 1);
        cache.delete(1);
        assert_eq!(cache.get_object_id_count(), 0);
        assert_eq!(cache.get(1), None);
    }
}
