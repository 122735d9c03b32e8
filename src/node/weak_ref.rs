use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::AsParentAware;

/// A back-reference to a parent-aware object that does not count as a parent
/// link.
///
/// On read, the reference clears itself for good once the target has no
/// parents left (or has been dropped). A cleared reference never returns the
/// original object again, even if that object later gains new parents.
pub struct WeakRef<T: ?Sized> {
    target: RefCell<Option<Weak<T>>>,
}

impl<T: ?Sized + AsParentAware> WeakRef<T> {
    pub fn new(target: &Rc<T>) -> Self {
        WeakRef {
            target: RefCell::new(Some(Rc::downgrade(target))),
        }
    }

    pub fn empty() -> Self {
        WeakRef {
            target: RefCell::new(None),
        }
    }

    /// The target, unless it is no longer referenced by any parent.
    pub fn get(&self) -> Option<Rc<T>> {
        let mut slot = self.target.borrow_mut();
        let current = slot.as_ref().and_then(Weak::upgrade);
        match current {
            Some(target) if target.as_parent_aware().parent_count() > 0 => Some(target),
            _ => {
                *slot = None;
                None
            }
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.target.borrow().is_none()
    }
}

impl<T: ?Sized + AsParentAware> From<Rc<T>> for WeakRef<T> {
    fn from(target: Rc<T>) -> Self {
        WeakRef::new(&target)
    }
}

impl<T: ?Sized + AsParentAware> From<Option<Rc<T>>> for WeakRef<T> {
    fn from(target: Option<Rc<T>>) -> Self {
        match target {
            Some(target) => WeakRef::new(&target),
            None => WeakRef::empty(),
        }
    }
}

impl<T: ?Sized + AsParentAware> Default for WeakRef<T> {
    fn default() -> Self {
        WeakRef::empty()
    }
}

impl<T: ?Sized> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        WeakRef {
            target: RefCell::new(self.target.borrow().clone()),
        }
    }
}

impl<T: ?Sized> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.target.borrow() {
            Some(weak) => write!(f, "WeakRef({:p})", weak.as_ptr() as *const ()),
            None => f.write_str("WeakRef(cleared)"),
        }
    }
}

impl<T: ?Sized> PartialEq for WeakRef<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&*self.target.borrow(), &*other.target.borrow()) {
            (Some(a), Some(b)) => a.as_ptr() as *const () == b.as_ptr() as *const (),
            (None, None) => true,
            _ => false,
        }
    }
}

// Back-references are not persisted; a deserialized reference starts cleared.
impl<T: ?Sized> Serialize for WeakRef<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_none()
    }
}

impl<'de, T: ?Sized + AsParentAware> Deserialize<'de> for WeakRef<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(WeakRef::empty())
    }
}
