use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{Node, NodeRef};

/// A non-owning handle to a parent node, compared by node identity.
#[derive(Clone)]
pub struct ParentRef(Weak<dyn Node>);

impl ParentRef {
    pub fn of<T: Node + 'static>(node: &Rc<T>) -> Self {
        let node: NodeRef = node.clone();
        ParentRef(Rc::downgrade(&node))
    }

    pub fn upgrade(&self) -> Option<NodeRef> {
        self.0.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Whether this handle points at `node`.
    pub fn points_to(&self, node: &dyn Node) -> bool {
        self.addr() == node as *const dyn Node as *const ()
    }

    fn addr(&self) -> *const () {
        self.0.as_ptr() as *const ()
    }
}

impl From<&NodeRef> for ParentRef {
    fn from(node: &NodeRef) -> Self {
        ParentRef(Rc::downgrade(node))
    }
}

impl PartialEq for ParentRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ParentRef {}

impl fmt::Debug for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParentRef({:p})", self.addr())
    }
}

/// Ordered parent storage shared by every parent-aware implementation.
#[derive(Default)]
pub struct ParentList {
    entries: RefCell<Vec<ParentRef>>,
}

impl ParentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.prune();
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, parent: ParentRef) {
        self.entries.borrow_mut().push(parent);
    }

    /// Remove the first occurrence of `parent`. Returns whether one was found.
    pub fn remove_one(&self, parent: &ParentRef) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.iter().position(|entry| entry == parent) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Swap in `entries` wholesale, as when undoing a rejected store.
    pub fn replace(&self, entries: Vec<ParentRef>) {
        *self.entries.borrow_mut() = entries;
    }

    pub fn contains(&self, parent: &ParentRef) -> bool {
        self.entries.borrow().contains(parent)
    }

    /// Number of occurrences of `parent`.
    pub fn occurrences(&self, parent: &ParentRef) -> usize {
        self.entries.borrow().iter().filter(|entry| *entry == parent).count()
    }

    /// Live entries in insertion order.
    pub fn refs(&self) -> Vec<ParentRef> {
        self.prune();
        self.entries.borrow().clone()
    }

    /// Live parents in insertion order.
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.entries
            .borrow()
            .iter()
            .filter_map(ParentRef::upgrade)
            .collect()
    }

    /// Drop entries whose node no longer exists. A parent that is dropped
    /// without detaching itself leaves such entries behind.
    fn prune(&self) {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(ParentRef::is_alive);
        if entries.len() != before {
            log::trace!("pruned {} dropped parent(s)", before - entries.len());
        }
    }
}

impl fmt::Debug for ParentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.borrow().iter()).finish()
    }
}
