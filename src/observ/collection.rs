use std::cell::{Ref, RefCell};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::hash::Hash;
use std::rc::Rc;

use super::CollectionObserver;
use crate::error::Result;
use crate::node::Child;

/// The operations an [`ObservableCollection`] needs from its backing store.
pub trait Collection: Default + 'static {
    type Item: Child;

    /// Whether inserting an element already present is a no-op.
    const DISTINCT: bool = false;

    fn item_count(&self) -> usize;
    fn contains_item(&self, item: &Self::Item) -> bool;
    fn insert_item(&mut self, item: Self::Item);
    fn take_item(&mut self, item: &Self::Item) -> Option<Self::Item>;
    fn visit_items(&self, visit: &mut dyn FnMut(&Self::Item));
    fn into_items(self) -> Vec<Self::Item>;
}

impl<E: Child + PartialEq + 'static> Collection for Vec<E> {
    type Item = E;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn contains_item(&self, item: &E) -> bool {
        self.contains(item)
    }

    fn insert_item(&mut self, item: E) {
        self.push(item);
    }

    fn take_item(&mut self, item: &E) -> Option<E> {
        let index = self.iter().position(|candidate| candidate == item)?;
        Some(self.remove(index))
    }

    fn visit_items(&self, visit: &mut dyn FnMut(&E)) {
        self.iter().for_each(visit);
    }

    fn into_items(self) -> Vec<E> {
        self
    }
}

impl<E: Child + PartialEq + 'static> Collection for VecDeque<E> {
    type Item = E;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn contains_item(&self, item: &E) -> bool {
        self.contains(item)
    }

    fn insert_item(&mut self, item: E) {
        self.push_back(item);
    }

    fn take_item(&mut self, item: &E) -> Option<E> {
        let index = self.iter().position(|candidate| candidate == item)?;
        self.remove(index)
    }

    fn visit_items(&self, visit: &mut dyn FnMut(&E)) {
        self.iter().for_each(visit);
    }

    fn into_items(self) -> Vec<E> {
        self.into()
    }
}

impl<E: Child + Eq + Hash + 'static> Collection for HashSet<E> {
    type Item = E;
    const DISTINCT: bool = true;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn contains_item(&self, item: &E) -> bool {
        self.contains(item)
    }

    fn insert_item(&mut self, item: E) {
        self.insert(item);
    }

    fn take_item(&mut self, item: &E) -> Option<E> {
        self.take(item)
    }

    fn visit_items(&self, visit: &mut dyn FnMut(&E)) {
        self.iter().for_each(visit);
    }

    fn into_items(self) -> Vec<E> {
        self.into_iter().collect()
    }
}

impl<E: Child + Ord + 'static> Collection for BTreeSet<E> {
    type Item = E;
    const DISTINCT: bool = true;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn contains_item(&self, item: &E) -> bool {
        self.contains(item)
    }

    fn insert_item(&mut self, item: E) {
        self.insert(item);
    }

    fn take_item(&mut self, item: &E) -> Option<E> {
        self.take(item)
    }

    fn visit_items(&self, visit: &mut dyn FnMut(&E)) {
        self.iter().for_each(visit);
    }

    fn into_items(self) -> Vec<E> {
        self.into_iter().collect()
    }
}

/// A generic collection that reports entering and leaving elements.
pub struct ObservableCollection<C> {
    inner: RefCell<C>,
    observer: Rc<dyn CollectionObserver>,
}

impl<C: Collection> ObservableCollection<C> {
    pub fn new(inner: C, observer: Rc<dyn CollectionObserver>) -> Self {
        ObservableCollection {
            inner: RefCell::new(inner),
            observer,
        }
    }

    pub fn borrow(&self) -> Ref<'_, C> {
        self.inner.borrow()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().item_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, item: &C::Item) -> bool {
        self.inner.borrow().contains_item(item)
    }

    /// Insert `item`. Returns `false` if a distinct collection already held it.
    pub fn insert(&self, item: C::Item) -> Result<bool> {
        if C::DISTINCT && self.contains(&item) {
            return Ok(false);
        }
        self.observer.on_add(&item)?;
        self.inner.borrow_mut().insert_item(item);
        Ok(true)
    }

    pub fn remove(&self, item: &C::Item) -> bool {
        let taken = self.inner.borrow_mut().take_item(item);
        match taken {
            Some(taken) => {
                self.observer.on_remove(&taken);
                true
            }
            None => false,
        }
    }

    /// Remove an element chosen by `take`, e.g. the front of a queue.
    pub fn take_with(&self, take: impl FnOnce(&mut C) -> Option<C::Item>) -> Option<C::Item> {
        let taken = take(&mut *self.inner.borrow_mut());
        if let Some(taken) = &taken {
            self.observer.on_remove(taken);
        }
        taken
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.inner.borrow_mut()).into_items();
        for item in &removed {
            self.observer.on_remove(item);
        }
    }

    pub fn retain(&self, mut keep: impl FnMut(&C::Item) -> bool) {
        let items = std::mem::take(&mut *self.inner.borrow_mut()).into_items();
        let (kept, removed): (Vec<_>, Vec<_>) = items.into_iter().partition(|item| keep(item));
        {
            let mut inner = self.inner.borrow_mut();
            for item in kept {
                inner.insert_item(item);
            }
        }
        for item in &removed {
            self.observer.on_remove(item);
        }
    }

    pub fn extend(&self, items: impl IntoIterator<Item = C::Item>) -> Result<()> {
        for item in items {
            self.insert(item)?;
        }
        Ok(())
    }

    pub fn visit(&self, mut visit: impl FnMut(&C::Item)) {
        self.inner.borrow().visit_items(&mut visit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observ::testing::Recorder;

    #[test]
    fn test_set_insert_of_present_item_does_not_notify() {
        let recorder = Rc::new(Recorder::default());
        let set = ObservableCollection::new(HashSet::from([1u32]), recorder.clone());
        assert!(!set.insert(1).unwrap());
        assert!(set.insert(2).unwrap());
        assert_eq!(*recorder.added.borrow(), 1);
    }

    #[test]
    fn test_queue_take_with_notifies_removal() {
        let recorder = Rc::new(Recorder::default());
        let queue = ObservableCollection::new(VecDeque::from(vec![1u32, 2]), recorder.clone());
        assert_eq!(queue.take_with(VecDeque::pop_front), Some(1));
        assert_eq!(queue.take_with(VecDeque::pop_front), Some(2));
        assert_eq!(queue.take_with(VecDeque::pop_front), None);
        assert_eq!(*recorder.removed.borrow(), 2);
    }

    #[test]
    fn test_retain_keeps_vec_order() {
        let recorder = Rc::new(Recorder::default());
        let items = ObservableCollection::new(vec![5u32, 1, 4, 2], recorder.clone());
        items.retain(|item| *item > 1);
        assert_eq!(*items.borrow(), vec![5, 4, 2]);
        assert_eq!(*recorder.removed.borrow(), 1);
    }
}
