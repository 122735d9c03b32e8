use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use super::CollectionObserver;
use crate::error::Result;
use crate::node::Child;

/// Bounds of a sub-range view into a shared backing vector.
///
/// Structural changes made through a view also resize every enclosing view.
struct Window {
    offset: usize,
    len: Cell<usize>,
    outer: Option<Rc<Window>>,
}

fn resize(window: &Option<Rc<Window>>, grow: usize, shrink: usize) {
    let mut current = window.clone();
    while let Some(w) = current {
        w.len.set(w.len.get() + grow - shrink);
        current = w.outer.clone();
    }
}

/// A list that reports entering and leaving elements.
pub struct ObservableList<E> {
    items: Rc<RefCell<Vec<E>>>,
    window: Option<Rc<Window>>,
    observer: Rc<dyn CollectionObserver>,
}

impl<E: Child> ObservableList<E> {
    pub fn new(items: Vec<E>, observer: Rc<dyn CollectionObserver>) -> Self {
        ObservableList {
            items: Rc::new(RefCell::new(items)),
            window: None,
            observer,
        }
    }

    fn bounds(&self) -> (usize, usize) {
        match &self.window {
            Some(window) => (window.offset, window.len.get()),
            None => (0, self.items.borrow().len()),
        }
    }

    pub fn len(&self) -> usize {
        self.bounds().1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` over the visible elements.
    pub fn with_items<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
        let (offset, len) = self.bounds();
        let items = self.items.borrow();
        f(&items[offset..offset + len])
    }

    pub fn push(&self, element: E) -> Result<()> {
        let len = self.len();
        self.insert(len, element)
    }

    /// Insert `element` at `index`, shifting later elements right.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&self, index: usize, element: E) -> Result<()> {
        let (offset, len) = self.bounds();
        assert!(index <= len, "insertion index (is {index}) should be <= len (is {len})");

        self.observer.on_add(&element)?;
        self.items.borrow_mut().insert(offset + index, element);
        resize(&self.window, 1, 0);
        Ok(())
    }

    /// Replace the element at `index`, returning the old one.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn set(&self, index: usize, element: E) -> Result<E> {
        let (offset, len) = self.bounds();
        assert!(index < len, "index out of bounds: the len is {len} but the index is {index}");

        self.observer.on_add(&element)?;
        let old = std::mem::replace(&mut self.items.borrow_mut()[offset + index], element);
        self.observer.on_remove(&old);
        Ok(old)
    }

    /// Remove and return the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove(&self, index: usize) -> E {
        let (offset, len) = self.bounds();
        assert!(index < len, "removal index (is {index}) should be < len (is {len})");

        let old = self.items.borrow_mut().remove(offset + index);
        resize(&self.window, 0, 1);
        self.observer.on_remove(&old);
        old
    }

    pub fn pop(&self) -> Option<E> {
        match self.len() {
            0 => None,
            len => Some(self.remove(len - 1)),
        }
    }

    pub fn clear(&self) {
        let (offset, len) = self.bounds();
        let removed: Vec<E> = self.items.borrow_mut().drain(offset..offset + len).collect();
        resize(&self.window, 0, removed.len());
        for element in &removed {
            self.observer.on_remove(element);
        }
    }

    /// Keep only the elements for which `keep` returns `true`.
    pub fn retain(&self, mut keep: impl FnMut(&E) -> bool) {
        let (offset, len) = self.bounds();
        let mut removed = Vec::new();
        {
            let mut items = self.items.borrow_mut();
            let mut index = offset;
            let mut end = offset + len;
            while index < end {
                if keep(&items[index]) {
                    index += 1;
                } else {
                    removed.push(items.remove(index));
                    end -= 1;
                }
            }
        }
        resize(&self.window, 0, removed.len());
        for element in &removed {
            self.observer.on_remove(element);
        }
    }

    pub fn extend(&self, elements: impl IntoIterator<Item = E>) -> Result<()> {
        for element in elements {
            self.push(element)?;
        }
        Ok(())
    }

    /// A view of `from..to` that shares storage and observer with this list.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn sub_list(&self, from: usize, to: usize) -> ObservableList<E> {
        let (offset, len) = self.bounds();
        assert!(from <= to && to <= len, "range {from}..{to} out of bounds for len {len}");

        ObservableList {
            items: Rc::clone(&self.items),
            window: Some(Rc::new(Window {
                offset: offset + from,
                len: Cell::new(to - from),
                outer: self.window.clone(),
            })),
            observer: Rc::clone(&self.observer),
        }
    }
}

impl<E: Child + Clone> ObservableList<E> {
    pub fn get(&self, index: usize) -> Option<E> {
        self.with_items(|items| items.get(index).cloned())
    }

    pub fn to_vec(&self) -> Vec<E> {
        self.with_items(<[E]>::to_vec)
    }
}

impl<E: Child + PartialEq> ObservableList<E> {
    pub fn contains(&self, element: &E) -> bool {
        self.with_items(|items| items.contains(element))
    }

    pub fn index_of(&self, element: &E) -> Option<usize> {
        self.with_items(|items| items.iter().position(|item| item == element))
    }

    /// Remove the first element equal to `element`.
    pub fn remove_item(&self, element: &E) -> bool {
        match self.index_of(element) {
            Some(index) => {
                self.remove(index);
                true
            }
            None => false,
        }
    }
}

impl<E: 'static> ObservableList<E> {
    /// The whole backing vector, including elements outside this view.
    pub fn backing(&self) -> Ref<'_, dyn Any> {
        Ref::map(self.items.borrow(), |items| items as &dyn Any)
    }
}
