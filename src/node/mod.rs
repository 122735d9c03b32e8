//! Parent-aware runtime core
//!
//! Every woven type and every container wrapper implements [`ParentAware`].
//! Woven types additionally implement [`Node`], which makes them eligible to
//! be parents themselves. Parents are stored as weak handles compared by
//! allocation address, so the child-to-parent direction never keeps a parent
//! alive.

use std::any::Any;
use std::rc::Rc;

pub mod field;
pub mod parents;
pub mod util;
pub mod weak_ref;
pub mod wrapper;

pub use field::{Child, Field, NodeState, Substitute};
pub use parents::{ParentList, ParentRef};
pub use weak_ref::WeakRef;
pub use wrapper::Wrapper;

use crate::error::{Error, Result};
use crate::persist::Unmarshaller;

/// A shared handle to any parent-aware value, as returned by [`Node::children`].
pub type ChildRef = Rc<dyn ParentAware>;

/// A shared handle to a node, as returned by [`ParentAware::parents`].
pub type NodeRef = Rc<dyn Node>;

/// Upcasting helpers, implemented for every sized [`ParentAware`] type.
pub trait AsParentAware {
    fn as_any(&self) -> &dyn Any;
    fn as_parent_aware(&self) -> &dyn ParentAware;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
    fn into_parent_aware(self: Rc<Self>) -> Rc<dyn ParentAware>;
    fn type_name(&self) -> &'static str;
}

impl<T: ParentAware> AsParentAware for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_parent_aware(&self) -> &dyn ParentAware {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn into_parent_aware(self: Rc<Self>) -> Rc<dyn ParentAware> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// An object that knows which nodes currently reference it.
///
/// Invariant: `parent_count() == parents().len()`. The parent list keeps
/// insertion order and multiplicity, since one node may reference the same
/// object through more than one path.
pub trait ParentAware: AsParentAware + 'static {
    /// Storage backing the parent list.
    fn parent_list(&self) -> &ParentList;

    /// Whether `parent` may legally reference this object.
    fn accepts_parent(&self, parent: &dyn Node) -> bool {
        let _ = parent;
        true
    }

    fn as_wrapper(&self) -> Option<&dyn Wrapper> {
        None
    }

    fn as_node(&self) -> Option<&dyn Node> {
        None
    }

    fn into_node(self: Rc<Self>) -> Option<NodeRef> {
        None
    }

    /// Snapshot of the current parents in insertion order.
    fn parents(&self) -> Vec<NodeRef> {
        self.parent_list().nodes()
    }

    fn parent_count(&self) -> usize {
        self.parent_list().len()
    }

    /// The unique parent, `None` without parents, or an error when two or
    /// more distinct nodes reference this object.
    fn single_parent(&self) -> Result<Option<NodeRef>> {
        let refs = self.parent_list().refs();
        let mut distinct: Vec<&ParentRef> = Vec::new();
        for parent in &refs {
            if !distinct.contains(&parent) {
                distinct.push(parent);
            }
        }

        match distinct.as_slice() {
            [] => Ok(None),
            [only] => Ok(only.upgrade()),
            _ => Err(Error::MultipleParents {
                object: self.type_name().to_string(),
                count: distinct.len(),
            }),
        }
    }

    /// Append `parent` after validating it against [`accepts_parent`].
    ///
    /// `None` and dropped parents are ignored. A rejected parent leaves the
    /// list unchanged.
    ///
    /// [`accepts_parent`]: ParentAware::accepts_parent
    fn add_parent(&self, parent: Option<&ParentRef>) -> Result<()> {
        let Some(parent) = parent else {
            return Ok(());
        };
        let Some(node) = parent.upgrade() else {
            return Ok(());
        };

        if !self.accepts_parent(&*node) {
            return Err(Error::illegal_parent(self.type_name(), node.type_name()));
        }

        self.parent_list().push(parent.clone());
        Ok(())
    }

    /// Remove exactly one occurrence of `parent`, if present.
    fn remove_parent(&self, parent: Option<&ParentRef>) {
        if let Some(parent) = parent {
            self.parent_list().remove_one(parent);
        }
    }
}

/// A parent-aware object that may itself be a parent.
pub trait Node: ParentAware {
    fn node_state(&self) -> &NodeState;

    /// All parent-aware values referenced by this node, with wrappers
    /// flattened into their elements.
    fn children(&self) -> Vec<ChildRef>;

    /// Same as `children().len()` without building the list.
    fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Children reached through owning references only (weak fields are
    /// skipped). Used when binding freshly built or deserialized graphs.
    fn owned_children(&self) -> Vec<ChildRef> {
        self.children()
    }

    /// The embedded base node, if this node extends another tracked type.
    fn base_node(&self) -> Option<&dyn Node> {
        None
    }

    /// Record this node's own shared handle. Returns `false` if it was
    /// already bound.
    fn bind(&self, me: &ParentRef) -> bool {
        self.node_state().bind(me.clone())
    }

    /// Add this node as a parent of every value it currently holds.
    fn register_fields(&self) -> Result<()> {
        Ok(())
    }

    /// Post-deserialization lifecycle callback.
    fn after_unmarshal(&self, unmarshaller: &Unmarshaller, parent: Option<&NodeRef>) -> Result<()> {
        let _ = (unmarshaller, parent);
        self.register_fields()
    }
}
