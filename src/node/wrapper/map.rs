use std::any::Any;
use std::cell::Ref;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use serde::{Serialize, Serializer};

use super::{propagate_add, propagate_remove, CopyParents, Wrapper};
use crate::error::Result;
use crate::node::{Child, ChildRef, ParentAware, ParentList, ParentRef};
use crate::observ::ObservableMap;

/// Wrapper around a `HashMap`. Keys and values are tracked independently.
pub struct MapWrapper<K, V> {
    parents: Rc<ParentList>,
    map: ObservableMap<K, V>,
}

impl<K: Child + Eq + Hash + 'static, V: Child + 'static> MapWrapper<K, V> {
    pub fn new() -> Self {
        Self::from(HashMap::new())
    }

    pub fn borrow(&self) -> Ref<'_, HashMap<K, V>> {
        self.map.borrow()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn insert(&self, key: K, value: V) -> Result<Option<V>> {
        self.map.insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.map.remove(key)
    }

    pub fn clear(&self) {
        self.map.clear()
    }

    pub fn retain(&self, keep: impl FnMut(&K, &V) -> bool) {
        self.map.retain(keep)
    }

    pub fn extend(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        self.map.extend(entries)
    }
}

impl<K: Child + Eq + Hash + Clone + 'static, V: Child + Clone + 'static> MapWrapper<K, V> {
    pub fn get(&self, key: &K) -> Option<V> {
        self.map.get(key)
    }

    pub fn keys(&self) -> Vec<K> {
        self.map.keys()
    }

    pub fn values(&self) -> Vec<V> {
        self.map.values()
    }
}

impl<K: Child + Eq + Hash + 'static, V: Child + 'static> From<HashMap<K, V>> for MapWrapper<K, V> {
    fn from(inner: HashMap<K, V>) -> Self {
        let parents = Rc::new(ParentList::new());
        let observer = Rc::new(CopyParents::new(Rc::clone(&parents)));
        MapWrapper {
            parents,
            map: ObservableMap::new(inner, observer),
        }
    }
}

impl<K: Child + Eq + Hash + 'static, V: Child + 'static> Default for MapWrapper<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Child + Eq + Hash + 'static, V: Child + 'static> ParentAware for MapWrapper<K, V> {
    fn parent_list(&self) -> &ParentList {
        &self.parents
    }

    fn as_wrapper(&self) -> Option<&dyn Wrapper> {
        Some(self)
    }

    fn add_parent(&self, parent: Option<&ParentRef>) -> Result<()> {
        propagate_add(self, parent)
    }

    fn remove_parent(&self, parent: Option<&ParentRef>) {
        propagate_remove(self, parent)
    }
}

impl<K: Child + Eq + Hash + 'static, V: Child + 'static> Wrapper for MapWrapper<K, V> {
    /// All keys followed by all values.
    fn actual_children(&self) -> Vec<ChildRef> {
        let map = self.map.borrow();
        map.keys()
            .filter_map(Child::child_ref)
            .chain(map.values().filter_map(Child::child_ref))
            .collect()
    }

    fn unwrap_any(&self) -> Ref<'_, dyn Any> {
        Ref::map(self.map.borrow(), |inner| inner as &dyn Any)
    }
}

impl<K: Child + Eq + Hash + 'static, V: Child + PartialEq + 'static> PartialEq for MapWrapper<K, V> {
    fn eq(&self, other: &Self) -> bool {
        *self.borrow() == *other.borrow()
    }
}

impl<K: Child + Eq + Hash + 'static, V: Child + PartialEq + 'static> PartialEq<HashMap<K, V>>
    for MapWrapper<K, V>
{
    fn eq(&self, other: &HashMap<K, V>) -> bool {
        *self.borrow() == *other
    }
}

impl<K: Child + Eq + Hash + 'static, V: Child + Eq + 'static> Eq for MapWrapper<K, V> {}

impl<K: Child + Eq + Hash + fmt::Debug + 'static, V: Child + fmt::Debug + 'static> fmt::Debug
    for MapWrapper<K, V>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.borrow(), f)
    }
}

impl<K, V> Serialize for MapWrapper<K, V>
where
    K: Child + Eq + Hash + Serialize + 'static,
    V: Child + Serialize + 'static,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.borrow().serialize(serializer)
    }
}
