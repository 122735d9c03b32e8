use std::any::Any;
use std::cell::Ref;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde::{Serialize, Serializer};

use super::{propagate_add, propagate_remove, CopyParents, Wrapper};
use crate::error::Result;
use crate::node::{Child, ChildRef, ParentAware, ParentList, ParentRef};
use crate::observ::ObservableList;

/// Wrapper around a `Vec` with list semantics and sub-range views.
pub struct ListWrapper<E> {
    parents: Rc<ParentList>,
    list: ObservableList<E>,
}

impl<E: Child + 'static> ListWrapper<E> {
    pub fn new() -> Self {
        Self::from(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn with_items<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
        self.list.with_items(f)
    }

    pub fn push(&self, element: E) -> Result<()> {
        self.list.push(element)
    }

    pub fn insert(&self, index: usize, element: E) -> Result<()> {
        self.list.insert(index, element)
    }

    pub fn set(&self, index: usize, element: E) -> Result<E> {
        self.list.set(index, element)
    }

    pub fn remove(&self, index: usize) -> E {
        self.list.remove(index)
    }

    pub fn pop(&self) -> Option<E> {
        self.list.pop()
    }

    pub fn clear(&self) {
        self.list.clear()
    }

    pub fn retain(&self, keep: impl FnMut(&E) -> bool) {
        self.list.retain(keep)
    }

    pub fn extend(&self, elements: impl IntoIterator<Item = E>) -> Result<()> {
        self.list.extend(elements)
    }

    /// A view of `from..to` backed by this list.
    ///
    /// Elements entering or leaving through the view gain or lose this
    /// list's parents. The view keeps its own parent list.
    pub fn sub_list(&self, from: usize, to: usize) -> ListWrapper<E> {
        ListWrapper {
            parents: Rc::new(ParentList::new()),
            list: self.list.sub_list(from, to),
        }
    }
}

impl<E: Child + Clone + 'static> ListWrapper<E> {
    pub fn get(&self, index: usize) -> Option<E> {
        self.list.get(index)
    }

    pub fn to_vec(&self) -> Vec<E> {
        self.list.to_vec()
    }
}

impl<E: Child + PartialEq + 'static> ListWrapper<E> {
    pub fn contains(&self, element: &E) -> bool {
        self.list.contains(element)
    }

    pub fn index_of(&self, element: &E) -> Option<usize> {
        self.list.index_of(element)
    }

    pub fn remove_item(&self, element: &E) -> bool {
        self.list.remove_item(element)
    }
}

impl<E: Child + 'static> From<Vec<E>> for ListWrapper<E> {
    fn from(items: Vec<E>) -> Self {
        let parents = Rc::new(ParentList::new());
        let observer = Rc::new(CopyParents::new(Rc::clone(&parents)));
        ListWrapper {
            parents,
            list: ObservableList::new(items, observer),
        }
    }
}

impl<E: Child + 'static> Default for ListWrapper<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Child + 'static> ParentAware for ListWrapper<E> {
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

impl<E: Child + 'static> Wrapper for ListWrapper<E> {
    fn actual_children(&self) -> Vec<ChildRef> {
        self.list
            .with_items(|items| items.iter().filter_map(Child::child_ref).collect())
    }

    fn unwrap_any(&self) -> Ref<'_, dyn Any> {
        self.list.backing()
    }
}

impl<E: Child + PartialEq + 'static> PartialEq for ListWrapper<E> {
    fn eq(&self, other: &Self) -> bool {
        self.with_items(|a| other.with_items(|b| a == b))
    }
}

impl<E: Child + PartialEq + 'static> PartialEq<Vec<E>> for ListWrapper<E> {
    fn eq(&self, other: &Vec<E>) -> bool {
        self.with_items(|items| items == other.as_slice())
    }
}

impl<E: Child + PartialEq + 'static> PartialEq<ListWrapper<E>> for Vec<E> {
    fn eq(&self, other: &ListWrapper<E>) -> bool {
        other == self
    }
}

impl<E: Child + Eq + 'static> Eq for ListWrapper<E> {}

impl<E: Child + Hash + 'static> Hash for ListWrapper<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.with_items(|items| items.hash(state))
    }
}

impl<E: Child + fmt::Debug + 'static> fmt::Debug for ListWrapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_items(|items| f.debug_list().entries(items).finish())
    }
}

impl<E: Child + Serialize + 'static> Serialize for ListWrapper<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.with_items(|items| items.serialize(serializer))
    }
}
