//! Binding of freshly built or deserialized node graphs.
//!
//! A woven node only knows its own identity once it lives in an `Rc`. Until
//! then, stores into its fields perform no parent bookkeeping. [`adopt`] and
//! [`Unmarshaller`] place a graph behind `Rc`s, bind every node reachable
//! through owning references, and register each node as a parent of its field
//! values.

use std::io::Read;
use std::rc::Rc;

use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::hooks::collect_children;
use crate::node::{Child, Node, NodeRef, ParentRef};

/// Place `value` behind an `Rc` and register it, and every unbound node it
/// owns, as a parent of its field values.
pub fn adopt<T: Node>(value: T) -> Result<Rc<T>> {
    let node = Rc::new(value);
    let handle: NodeRef = node.clone();
    settle(&handle, None, &mut |node, _| node.register_fields())?;
    Ok(node)
}

/// Bind and register every unbound node that `value` stands for.
///
/// Called when a value enters a bound node, so that a node built with a plain
/// `Rc::new` tracks its own stores from then on. Already bound nodes are left
/// alone.
pub(crate) fn bind_unbound(value: &dyn Child) -> Result<()> {
    let mut children = Vec::new();
    collect_children(value, &mut children);
    for child in children {
        if let Some(node) = child.into_node() {
            if !node.node_state().is_bound() {
                log::debug!("binding {} on first store", node.type_name());
                settle(&node, None, &mut |node, _| node.register_fields())?;
            }
        }
    }
    Ok(())
}

/// Visit `node` and then, depth first, every unbound node it owns. Children
/// are settled before their parent's callback runs, the same order in which
/// a deserializer finishes them.
fn settle(
    node: &NodeRef,
    parent: Option<&NodeRef>,
    callback: &mut dyn FnMut(&NodeRef, Option<&NodeRef>) -> Result<()>,
) -> Result<()> {
    if !node.bind(&ParentRef::from(node)) {
        return Ok(());
    }

    for child in node.owned_children() {
        if let Some(child) = child.into_node() {
            settle(&child, Some(node), callback)?;
        }
    }

    log::trace!("settling {}", node.type_name());
    callback(node, parent)
}

/// Deserialization driver that runs [`Node::after_unmarshal`] on every node
/// of a freshly deserialized graph, innermost nodes first.
#[derive(Debug, Default)]
pub struct Unmarshaller {
    _private: (),
}

impl Unmarshaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_str<T: Node + DeserializeOwned>(&self, json: &str) -> Result<Rc<T>> {
        let value: T = serde_json::from_str(json)?;
        self.finish(value)
    }

    pub fn from_reader<T: Node + DeserializeOwned, R: Read>(&self, reader: R) -> Result<Rc<T>> {
        let value: T = serde_json::from_reader(reader)?;
        self.finish(value)
    }

    /// Run the lifecycle callbacks on an already deserialized value.
    pub fn finish<T: Node>(&self, value: T) -> Result<Rc<T>> {
        let node = Rc::new(value);
        let handle: NodeRef = node.clone();
        settle(&handle, None, &mut |node, parent| node.after_unmarshal(self, parent))?;
        log::debug!("unmarshalled {}", std::any::type_name::<T>());
        Ok(node)
    }
}
