//! Parent-aware stand-ins for containers
//!
//! A wrapper sits between a node and the parent-aware elements it logically
//! holds. Parents added to the wrapper are copied onto every element, and
//! elements entering or leaving the container gain or lose the wrapper's
//! current parents.

use std::any::Any;
use std::cell::Ref;
use std::rc::Rc;

pub mod array;
pub mod collection;
pub mod list;
pub mod map;

pub use array::ArrayWrapper;
pub use collection::{CollectionWrapper, QueueWrapper, SetWrapper};
pub use list::ListWrapper;
pub use map::MapWrapper;

use super::{Child, ChildRef, ParentAware, ParentList, ParentRef};
use crate::error::Result;
use crate::observ::CollectionObserver;
use crate::persist::bind_unbound;

pub trait Wrapper: ParentAware {
    /// The wrapper's immediate parent-aware elements, not flattened.
    fn actual_children(&self) -> Vec<ChildRef>;

    /// The wrapped container, for equality checks across wrapper types.
    fn unwrap_any(&self) -> Ref<'_, dyn Any>;
}

/// Borrow the container inside `wrapper` as a `C`.
pub fn unwrap_as<C: Any>(wrapper: &dyn Wrapper) -> Option<Ref<'_, C>> {
    Ref::filter_map(wrapper.unwrap_any(), |inner| inner.downcast_ref::<C>()).ok()
}

/// Copies the owning wrapper's parents onto entering elements and removes
/// them from leaving ones.
pub struct CopyParents {
    parents: Rc<ParentList>,
}

impl CopyParents {
    pub fn new(parents: Rc<ParentList>) -> Self {
        CopyParents { parents }
    }
}

impl CollectionObserver for CopyParents {
    fn on_add(&self, element: &dyn Child) -> Result<()> {
        let Some(aware) = element.parent_aware() else {
            return Ok(());
        };
        let parents = self.parents.refs();
        if !parents.is_empty() {
            bind_unbound(element)?;
        }
        add_all(aware, &parents)
    }

    fn on_remove(&self, element: &dyn Child) {
        if let Some(element) = element.parent_aware() {
            for parent in self.parents.refs() {
                element.remove_parent(Some(&parent));
            }
        }
    }
}

/// Add every parent in `parents` to `element`, undoing partial work on failure.
fn add_all(element: &dyn ParentAware, parents: &[ParentRef]) -> Result<()> {
    for (index, parent) in parents.iter().enumerate() {
        if let Err(err) = element.add_parent(Some(parent)) {
            for added in &parents[..index] {
                element.remove_parent(Some(added));
            }
            return Err(err);
        }
    }
    Ok(())
}

/// Add `parent` to the wrapper's own list and to every current element.
///
/// If an element rejects the parent, everything done so far is undone.
pub(crate) fn propagate_add(wrapper: &dyn Wrapper, parent: Option<&ParentRef>) -> Result<()> {
    let Some(parent) = parent else {
        return Ok(());
    };
    if !parent.is_alive() {
        return Ok(());
    }

    wrapper.parent_list().push(parent.clone());
    let children = wrapper.actual_children();
    for (index, child) in children.iter().enumerate() {
        if let Err(err) = child.add_parent(Some(parent)) {
            for added in &children[..index] {
                added.remove_parent(Some(parent));
            }
            wrapper.parent_list().remove_one(parent);
            return Err(err);
        }
    }
    Ok(())
}

pub(crate) fn propagate_remove(wrapper: &dyn Wrapper, parent: Option<&ParentRef>) {
    let Some(parent) = parent else {
        return;
    };
    if wrapper.parent_list().remove_one(parent) {
        for child in wrapper.actual_children() {
            child.remove_parent(Some(parent));
        }
    }
}
