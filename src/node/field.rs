//! Storage cells used by woven types.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{AsParentAware, ChildRef, ParentAware, ParentList, ParentRef};

/// A value that may or may not be parent-aware.
///
/// Generated code and wrappers only ever see field values and container
/// elements through this trait, so the parent-aware check happens at the
/// operation site rather than being fixed by the declared type.
pub trait Child {
    fn parent_aware(&self) -> Option<&dyn ParentAware> {
        None
    }

    fn child_ref(&self) -> Option<ChildRef> {
        None
    }
}

impl<T: ?Sized + AsParentAware> Child for Rc<T> {
    fn parent_aware(&self) -> Option<&dyn ParentAware> {
        Some((**self).as_parent_aware())
    }

    fn child_ref(&self) -> Option<ChildRef> {
        Some(Rc::clone(self).into_parent_aware())
    }
}

impl<C: Child> Child for Option<C> {
    fn parent_aware(&self) -> Option<&dyn ParentAware> {
        self.as_ref().and_then(Child::parent_aware)
    }

    fn child_ref(&self) -> Option<ChildRef> {
        self.as_ref().and_then(Child::child_ref)
    }
}

macro_rules! inert_child {
    ($($ty:ty),* $(,)?) => {
        $(impl Child for $ty {})*
    };
}

inert_child!(
    String,
    &'static str,
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
);

/// Interior-mutable storage for one field of a woven type.
///
/// Woven nodes live behind `Rc`, so stores go through `&self`.
#[derive(Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Field<T>(RefCell<T>);

impl<T> Field<T> {
    pub fn new(value: T) -> Self {
        Field(RefCell::new(value))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Store `value` without any parent bookkeeping, returning the old value.
    pub fn replace(&self, value: T) -> T {
        self.0.replace(value)
    }

    pub fn into_inner(self) -> T {
        self.0.into_inner()
    }
}

impl<T: Clone> Field<T> {
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T: Clone> Clone for Field<T> {
    fn clone(&self) -> Self {
        Field::new(self.get())
    }
}

impl<T: fmt::Debug> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0.borrow(), f)
    }
}

impl<T: PartialEq> PartialEq for Field<T> {
    fn eq(&self, other: &Self) -> bool {
        *self.0.borrow() == *other.0.borrow()
    }
}

impl<T: Eq> Eq for Field<T> {}

impl<T: Hash> Hash for Field<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.borrow().hash(state)
    }
}

/// Hidden per-node state added to every woven type.
///
/// Clones start out fresh: a copied node has no parents and no identity until
/// it is adopted. Equality and hashing ignore the state entirely so derives on
/// the woven type keep comparing only user data.
#[derive(Default)]
pub struct NodeState {
    parents: ParentList,
    me: OnceCell<ParentRef>,
}

impl NodeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parents(&self) -> &ParentList {
        &self.parents
    }

    /// This node's own handle, once bound.
    pub fn me(&self) -> Option<&ParentRef> {
        self.me.get()
    }

    pub fn bind(&self, me: ParentRef) -> bool {
        self.me.set(me).is_ok()
    }

    pub fn is_bound(&self) -> bool {
        self.me.get().is_some()
    }
}

impl Clone for NodeState {
    fn clone(&self) -> Self {
        NodeState::new()
    }
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeState")
            .field("parents", &self.parents.len())
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl PartialEq for NodeState {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for NodeState {}

impl Hash for NodeState {
    fn hash<H: Hasher>(&self, _state: &mut H) {}
}

/// Storage of a wrap-substitute field.
///
/// A deserializer or a struct literal produces the bare container; it is
/// swapped for the wrapper on first read, on store, or when the owning node
/// registers its fields.
pub enum Substitute<D, W> {
    Bare(D),
    Wrapped(Rc<W>),
}

impl<D: Default, W> Substitute<D, W> {
    pub fn is_wrapped(&self) -> bool {
        matches!(self, Substitute::Wrapped(_))
    }

    /// The wrapper, constructing it from the bare value first if needed.
    pub fn wrapped(&mut self, wrap: fn(D) -> W) -> Rc<W> {
        match self {
            Substitute::Wrapped(wrapper) => Rc::clone(wrapper),
            Substitute::Bare(bare) => {
                let wrapper = Rc::new(wrap(std::mem::take(bare)));
                *self = Substitute::Wrapped(Rc::clone(&wrapper));
                wrapper
            }
        }
    }
}

impl<D, W> From<D> for Substitute<D, W> {
    fn from(bare: D) -> Self {
        Substitute::Bare(bare)
    }
}

impl<D: Default, W> Default for Substitute<D, W> {
    fn default() -> Self {
        Substitute::Bare(D::default())
    }
}

impl<D: Clone, W> Clone for Substitute<D, W> {
    fn clone(&self) -> Self {
        match self {
            Substitute::Bare(bare) => Substitute::Bare(bare.clone()),
            Substitute::Wrapped(wrapper) => Substitute::Wrapped(Rc::clone(wrapper)),
        }
    }
}

impl<D: fmt::Debug, W: fmt::Debug> fmt::Debug for Substitute<D, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Substitute::Bare(bare) => fmt::Debug::fmt(bare, f),
            Substitute::Wrapped(wrapper) => fmt::Debug::fmt(&**wrapper, f),
        }
    }
}

impl<D: PartialEq, W: PartialEq + PartialEq<D>> PartialEq for Substitute<D, W> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Substitute::Bare(a), Substitute::Bare(b)) => a == b,
            (Substitute::Wrapped(a), Substitute::Wrapped(b)) => **a == **b,
            (Substitute::Wrapped(w), Substitute::Bare(d))
            | (Substitute::Bare(d), Substitute::Wrapped(w)) => **w == *d,
        }
    }
}

impl<D, W: ParentAware> Child for Substitute<D, W> {
    fn parent_aware(&self) -> Option<&dyn ParentAware> {
        match self {
            Substitute::Wrapped(wrapper) => Some(&**wrapper),
            Substitute::Bare(_) => None,
        }
    }

    fn child_ref(&self) -> Option<ChildRef> {
        match self {
            Substitute::Wrapped(wrapper) => Some(Rc::clone(wrapper) as ChildRef),
            Substitute::Bare(_) => None,
        }
    }
}

impl<D: Serialize, W: Serialize> Serialize for Substitute<D, W> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Substitute::Bare(bare) => bare.serialize(serializer),
            Substitute::Wrapped(wrapper) => wrapper.serialize(serializer),
        }
    }
}

impl<'de, D: Deserialize<'de>, W> Deserialize<'de> for Substitute<D, W> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> std::result::Result<Self, De::Error> {
        D::deserialize(deserializer).map(Substitute::Bare)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_state_clone_is_unbound() {
        let state = NodeState::new();
        assert!(!state.is_bound());
        let copy = state.clone();
        assert!(!copy.is_bound());
        assert_eq!(state, copy);
    }

    #[test]
    fn test_field_replace_returns_old_value() {
        let field = Field::new(String::from("a"));
        assert_eq!(field.replace(String::from("b")), "a");
        assert_eq!(field.get(), "b");
    }

    #[test]
    fn test_substitute_wraps_once() {
        let mut slot: Substitute<Vec<u8>, String> = Substitute::Bare(vec![104, 105]);
        let first = slot.wrapped(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        let second = slot.wrapped(|_| String::from("unused"));
        assert_eq!(*first, "hi");
        assert!(Rc::ptr_eq(&first, &second));
    }
}
