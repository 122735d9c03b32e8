use std::any::Any;
use std::cell::Ref;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde::{Serialize, Serializer};

use super::{propagate_add, propagate_remove, CopyParents, Wrapper};
use crate::error::Result;
use crate::node::{Child, ChildRef, ParentAware, ParentList, ParentRef};
use crate::observ::{Collection, ObservableCollection};

/// Wrapper around any [`Collection`]: `Vec`, `VecDeque`, `HashSet` or `BTreeSet`.
pub struct CollectionWrapper<C> {
    parents: Rc<ParentList>,
    collection: ObservableCollection<C>,
}

pub type SetWrapper<E> = CollectionWrapper<HashSet<E>>;
pub type QueueWrapper<E> = CollectionWrapper<VecDeque<E>>;

impl<C: Collection> CollectionWrapper<C> {
    pub fn new() -> Self {
        Self::from(C::default())
    }

    pub fn borrow(&self) -> Ref<'_, C> {
        self.collection.borrow()
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn contains(&self, item: &C::Item) -> bool {
        self.collection.contains(item)
    }

    pub fn insert(&self, item: C::Item) -> Result<bool> {
        self.collection.insert(item)
    }

    pub fn remove(&self, item: &C::Item) -> bool {
        self.collection.remove(item)
    }

    pub fn clear(&self) {
        self.collection.clear()
    }

    pub fn retain(&self, keep: impl FnMut(&C::Item) -> bool) {
        self.collection.retain(keep)
    }

    pub fn extend(&self, items: impl IntoIterator<Item = C::Item>) -> Result<()> {
        self.collection.extend(items)
    }
}

impl<E: Child + PartialEq + 'static> CollectionWrapper<VecDeque<E>> {
    /// Append to the back of the queue.
    pub fn push_back(&self, element: E) -> Result<()> {
        self.collection.insert(element).map(|_| ())
    }

    /// Take the head of the queue.
    pub fn pop_front(&self) -> Option<E> {
        self.collection.take_with(VecDeque::pop_front)
    }
}

impl<E: Child + PartialEq + Clone + 'static> CollectionWrapper<VecDeque<E>> {
    /// The head of the queue, without removing it.
    pub fn front(&self) -> Option<E> {
        self.collection.borrow().front().cloned()
    }
}

impl<C: Collection> From<C> for CollectionWrapper<C> {
    fn from(inner: C) -> Self {
        let parents = Rc::new(ParentList::new());
        let observer = Rc::new(CopyParents::new(Rc::clone(&parents)));
        CollectionWrapper {
            parents,
            collection: ObservableCollection::new(inner, observer),
        }
    }
}

impl<C: Collection> Default for CollectionWrapper<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Collection> ParentAware for CollectionWrapper<C> {
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

impl<C: Collection> Wrapper for CollectionWrapper<C> {
    fn actual_children(&self) -> Vec<ChildRef> {
        let mut children = Vec::new();
        self.collection.visit(|item| children.extend(item.child_ref()));
        children
    }

    fn unwrap_any(&self) -> Ref<'_, dyn Any> {
        Ref::map(self.collection.borrow(), |inner| inner as &dyn Any)
    }
}

impl<C: Collection + PartialEq> PartialEq for CollectionWrapper<C> {
    fn eq(&self, other: &Self) -> bool {
        *self.borrow() == *other.borrow()
    }
}

impl<C: Collection + PartialEq> PartialEq<C> for CollectionWrapper<C> {
    fn eq(&self, other: &C) -> bool {
        *self.borrow() == *other
    }
}

impl<C: Collection + Eq> Eq for CollectionWrapper<C> {}

impl<C: Collection + Hash> Hash for CollectionWrapper<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.borrow().hash(state)
    }
}

impl<C: Collection + fmt::Debug> fmt::Debug for CollectionWrapper<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.borrow(), f)
    }
}

impl<C: Collection + Serialize> Serialize for CollectionWrapper<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.borrow().serialize(serializer)
    }
}
