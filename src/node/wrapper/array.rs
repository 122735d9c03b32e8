use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde::{Serialize, Serializer};

use super::{propagate_add, propagate_remove, CopyParents, Wrapper};
use crate::error::Result;
use crate::node::{Child, ChildRef, ParentAware, ParentList, ParentRef};
use crate::observ::CollectionObserver;

/// Fixed-length wrapper around a boxed slice.
///
/// Use `Option<_>` elements for slots that may be empty; empty slots are not
/// children. Construction from a borrowed slice and [`to_vec`] copy the
/// elements, so no outside alias can change the tracked contents.
///
/// [`to_vec`]: ArrayWrapper::to_vec
pub struct ArrayWrapper<E> {
    parents: Rc<ParentList>,
    observer: CopyParents,
    elements: RefCell<Box<[E]>>,
}

impl<E: Child + 'static> ArrayWrapper<E> {
    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the element at `index`, returning the old one. The new
    /// element gains the wrapper's parents and the old one loses them.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn set(&self, index: usize, element: E) -> Result<E> {
        let len = self.len();
        assert!(index < len, "index out of bounds: the len is {len} but the index is {index}");

        self.observer.on_add(&element)?;
        let old = std::mem::replace(&mut self.elements.borrow_mut()[index], element);
        self.observer.on_remove(&old);
        Ok(old)
    }

    pub fn with_elements<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
        f(&self.elements.borrow()[..])
    }
}

impl<E: Child + Default + 'static> ArrayWrapper<E> {
    /// An array of `len` default elements.
    pub fn with_len(len: usize) -> Self {
        Self::from((0..len).map(|_| E::default()).collect::<Vec<_>>())
    }
}

impl<E: Child + Clone + 'static> ArrayWrapper<E> {
    pub fn get(&self, index: usize) -> Option<E> {
        self.elements.borrow().get(index).cloned()
    }

    /// A copy of the current contents.
    pub fn to_vec(&self) -> Vec<E> {
        self.elements.borrow().to_vec()
    }
}

impl<E: Child + 'static> From<Box<[E]>> for ArrayWrapper<E> {
    fn from(elements: Box<[E]>) -> Self {
        let parents = Rc::new(ParentList::new());
        ArrayWrapper {
            observer: CopyParents::new(Rc::clone(&parents)),
            parents,
            elements: RefCell::new(elements),
        }
    }
}

impl<E: Child + 'static> From<Vec<E>> for ArrayWrapper<E> {
    fn from(elements: Vec<E>) -> Self {
        Self::from(elements.into_boxed_slice())
    }
}

impl<E: Child + Clone + 'static> From<&[E]> for ArrayWrapper<E> {
    fn from(elements: &[E]) -> Self {
        Self::from(elements.to_vec())
    }
}

impl<E: Child + 'static> Default for ArrayWrapper<E> {
    fn default() -> Self {
        Self::from(Vec::new())
    }
}

impl<E: Child + 'static> ParentAware for ArrayWrapper<E> {
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

impl<E: Child + 'static> Wrapper for ArrayWrapper<E> {
    fn actual_children(&self) -> Vec<ChildRef> {
        self.elements
            .borrow()
            .iter()
            .filter_map(Child::child_ref)
            .collect()
    }

    fn unwrap_any(&self) -> Ref<'_, dyn Any> {
        Ref::map(self.elements.borrow(), |elements| elements as &dyn Any)
    }
}

impl<E: Child + PartialEq + 'static> PartialEq for ArrayWrapper<E> {
    fn eq(&self, other: &Self) -> bool {
        *self.elements.borrow() == *other.elements.borrow()
    }
}

impl<E: Child + PartialEq + 'static> PartialEq<Vec<E>> for ArrayWrapper<E> {
    fn eq(&self, other: &Vec<E>) -> bool {
        **self.elements.borrow() == **other
    }
}

impl<E: Child + Eq + 'static> Eq for ArrayWrapper<E> {}

impl<E: Child + Hash + 'static> Hash for ArrayWrapper<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.elements.borrow().hash(state)
    }
}

impl<E: Child + fmt::Debug + 'static> fmt::Debug for ArrayWrapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self.elements.borrow(), f)
    }
}

impl<E: Child + Serialize + 'static> Serialize for ArrayWrapper<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.elements.borrow().serialize(serializer)
    }
}
