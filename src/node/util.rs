use std::collections::HashSet;
use std::rc::Rc;

use super::{Node, NodeRef, ParentAware, ParentRef};

/// The first ancestor of `object` that is a `T`.
///
/// Direct parents are checked first in list order, then each parent's own
/// ancestry is searched in the same order. Nodes already visited are skipped,
/// so cyclic graphs terminate.
pub fn first_parent_of_type<T: Node>(object: &dyn ParentAware) -> Option<Rc<T>> {
    let mut visited = HashSet::new();
    search(object.parents(), &mut visited)
}

fn search<T: Node>(parents: Vec<NodeRef>, visited: &mut HashSet<*const ()>) -> Option<Rc<T>> {
    for parent in &parents {
        if parent.as_any().is::<T>() {
            return parent.clone().into_any().downcast::<T>().ok();
        }
    }

    for parent in parents {
        let addr = Rc::as_ptr(&parent) as *const ();
        if !visited.insert(addr) {
            continue;
        }
        if let Some(found) = search::<T>(parent.parents(), visited) {
            return Some(found);
        }
    }

    None
}

/// Whether `parent` is a `T`, or embeds a `T` as its base node.
pub fn is_node_of<T: Node>(parent: &dyn Node) -> bool {
    if parent.as_any().is::<T>() {
        return true;
    }
    parent.base_node().map_or(false, |base| is_node_of::<T>(base))
}

/// Number of times `parent` occurs among the parents of `object`.
pub fn parent_occurrences(object: &dyn ParentAware, parent: &ParentRef) -> usize {
    object.parent_list().occurrences(parent)
}
