use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use super::CollectionObserver;
use crate::error::Result;
use crate::node::Child;

/// A hash map that reports entering and leaving keys and values separately.
pub struct ObservableMap<K, V> {
    inner: RefCell<HashMap<K, V>>,
    observer: Rc<dyn CollectionObserver>,
}

impl<K: Child + Eq + Hash, V: Child> ObservableMap<K, V> {
    pub fn new(inner: HashMap<K, V>, observer: Rc<dyn CollectionObserver>) -> Self {
        ObservableMap {
            inner: RefCell::new(inner),
            observer,
        }
    }

    pub fn borrow(&self) -> Ref<'_, HashMap<K, V>> {
        self.inner.borrow()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.borrow().contains_key(key)
    }

    /// Insert `value` under `key`, returning the value it replaced.
    ///
    /// The key is only reported when it was not present yet; a replaced value
    /// is reported as leaving.
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>> {
        let new_key = !self.contains_key(&key);
        if new_key {
            self.observer.on_add(&key)?;
        }
        if let Err(err) = self.observer.on_add(&value) {
            if new_key {
                self.observer.on_remove(&key);
            }
            return Err(err);
        }

        let old = self.inner.borrow_mut().insert(key, value);
        if let Some(old) = &old {
            self.observer.on_remove(old);
        }
        Ok(old)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let entry = self.inner.borrow_mut().remove_entry(key);
        entry.map(|(key, value)| {
            self.observer.on_remove(&key);
            self.observer.on_remove(&value);
            value
        })
    }

    pub fn clear(&self) {
        let removed: Vec<(K, V)> = self.inner.borrow_mut().drain().collect();
        for (key, value) in &removed {
            self.observer.on_remove(key);
            self.observer.on_remove(value);
        }
    }

    pub fn retain(&self, mut keep: impl FnMut(&K, &V) -> bool) {
        let mut removed: Vec<(K, V)> = Vec::new();
        {
            let mut inner = self.inner.borrow_mut();
            for (key, value) in std::mem::take(&mut *inner) {
                if keep(&key, &value) {
                    inner.insert(key, value);
                } else {
                    removed.push((key, value));
                }
            }
        }
        for (key, value) in &removed {
            self.observer.on_remove(key);
            self.observer.on_remove(value);
        }
    }

    pub fn extend(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        for (key, value) in entries {
            self.insert(key, value)?;
        }
        Ok(())
    }
}

impl<K: Child + Eq + Hash + Clone, V: Child + Clone> ObservableMap<K, V> {
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.borrow().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner.borrow().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<V> {
        self.inner.borrow().values().cloned().collect()
    }
}
