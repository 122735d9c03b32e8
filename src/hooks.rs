//! Runtime entry points called by woven code.
//!
//! These are public so that generated code in downstream crates can reach
//! them, but they are not meant to be called by hand.

use std::rc::Rc;

use crate::error::Result;
use crate::node::{AsParentAware, Child, ChildRef, Field, ParentRef, Substitute, WeakRef};
use crate::persist::bind_unbound;

// =================================================================================
// Parents
// =================================================================================

/// Add `me` to the parents of `value`, if it is parent-aware and `me` is bound.
pub fn add_parent(value: &dyn Child, me: Option<&ParentRef>) -> Result<()> {
    match (value.parent_aware(), me) {
        (Some(value), Some(me)) => value.add_parent(Some(me)),
        _ => Ok(()),
    }
}

/// Remove one occurrence of `me` from the parents of `value`.
pub fn remove_parent(value: &dyn Child, me: Option<&ParentRef>) {
    if let (Some(value), Some(me)) = (value.parent_aware(), me) {
        value.remove_parent(Some(me));
    }
}

// =================================================================================
// Children
// =================================================================================

/// Append the children `value` stands for: nothing for absent or
/// non-parent-aware values, the elements of a wrapper (recursively), or the
/// value itself.
pub fn collect_children(value: &dyn Child, out: &mut Vec<ChildRef>) {
    if let Some(child) = value.child_ref() {
        flatten(child, out);
    }
}

fn flatten(child: ChildRef, out: &mut Vec<ChildRef>) {
    match child.as_wrapper() {
        Some(wrapper) => {
            for element in wrapper.actual_children() {
                flatten(element, out);
            }
        }
        None => out.push(child),
    }
}

/// Number of children `value` stands for, without collecting them.
pub fn count_children(value: &dyn Child) -> usize {
    match value.parent_aware() {
        Some(child) => match child.as_wrapper() {
            Some(wrapper) => wrapper
                .actual_children()
                .iter()
                .map(|element| count_children(element))
                .sum(),
            None => 1,
        },
        None => 0,
    }
}

// =================================================================================
// Stores
// =================================================================================

/// Tracked store: `me` leaves the old value's parents, the new value is
/// stored, and `me` joins its parents. If the new value rejects `me`, the
/// old value is put back with `me` at its former position and the error is
/// returned.
///
/// An unbound node entering a bound one is bound first, so that its own
/// stores are tracked from then on.
pub fn store<T: Child>(field: &Field<T>, value: T, me: Option<&ParentRef>) -> Result<T> {
    let Some(me) = me else {
        log::trace!("store into an unbound node; parents are registered on adoption");
        return Ok(field.replace(value));
    };

    bind_unbound(&value)?;
    let snapshot = ParentSnapshot::take(&*field.borrow(), me);
    remove_parent(&*field.borrow(), Some(me));
    let old = field.replace(value);

    if let Err(err) = add_parent(&*field.borrow(), Some(me)) {
        field.replace(old);
        snapshot.restore();
        return Err(err);
    }
    Ok(old)
}

/// Parent lists of a value, and of the elements of a wrapper value, taken
/// before `me` is removed from them.
struct ParentSnapshot {
    lists: Vec<(ChildRef, Vec<ParentRef>)>,
}

impl ParentSnapshot {
    fn take(value: &dyn Child, me: &ParentRef) -> Self {
        let mut lists = Vec::new();
        if let Some(child) = value.child_ref() {
            Self::collect(child, me, &mut lists);
        }
        ParentSnapshot { lists }
    }

    fn collect(child: ChildRef, me: &ParentRef, lists: &mut Vec<(ChildRef, Vec<ParentRef>)>) {
        if !child.parent_list().contains(me) {
            return;
        }
        if let Some(wrapper) = child.as_wrapper() {
            for element in wrapper.actual_children() {
                Self::collect(element, me, lists);
            }
        }
        let refs = child.parent_list().refs();
        lists.push((child, refs));
    }

    fn restore(self) {
        for (child, refs) in self.lists {
            child.parent_list().replace(refs);
        }
    }
}

/// Tracked store for contexts that cannot return an error.
///
/// # Panics
///
/// Panics if the new value does not accept this node as a parent. The field
/// keeps its old value.
pub fn store_or_panic<T: Child>(field: &Field<T>, value: T, me: Option<&ParentRef>) -> T {
    match store(field, value, me) {
        Ok(old) => old,
        Err(err) => panic!("{err}"),
    }
}

/// Store into a weak field. No parent bookkeeping happens.
pub fn store_weak<T: ?Sized + AsParentAware>(field: &Field<WeakRef<T>>, value: Option<Rc<T>>) {
    field.replace(WeakRef::from(value));
}

/// Read a weak field, clearing it for good if its target has no parents.
pub fn read_weak<T: ?Sized + AsParentAware>(field: &Field<WeakRef<T>>) -> Option<Rc<T>> {
    field.borrow().get()
}

// =================================================================================
// Wrapper substitution
// =================================================================================

/// Read a wrap-substitute field, wrapping a bare value in place first.
pub fn read_substitute<D: Default, W>(
    field: &Field<Substitute<D, W>>,
    wrap: fn(D) -> W,
) -> Rc<W> {
    field.borrow_mut().wrapped(wrap)
}

/// Optional variant of [`read_substitute`].
pub fn read_optional_substitute<D: Default, W>(
    field: &Field<Option<Substitute<D, W>>>,
    wrap: fn(D) -> W,
) -> Option<Rc<W>> {
    field.borrow_mut().as_mut().map(|slot| slot.wrapped(wrap))
}

/// Wrap a bare value that a deserializer or constructor left in the field.
pub fn substitute_in_place<D: Default, W>(field: &Field<Substitute<D, W>>, wrap: fn(D) -> W) {
    field.borrow_mut().wrapped(wrap);
}

/// Optional variant of [`substitute_in_place`].
pub fn substitute_optional_in_place<D: Default, W>(
    field: &Field<Option<Substitute<D, W>>>,
    wrap: fn(D) -> W,
) {
    if let Some(slot) = field.borrow_mut().as_mut() {
        slot.wrapped(wrap);
    }
}

/// Constructor shape every wrap-substitute wrapper must provide.
#[diagnostic::on_unimplemented(
    message = "cannot construct wrapper `{Self}` from `{A}`",
    label = "wrap-substitute field needs `{Self}: From<{A}>`",
    note = "specify the constructor argument type with `#[timber(wrap(Wrapper, arg = Type))]`"
)]
pub trait WrapFrom<A> {
    fn wrap_from(arg: A) -> Self;
}

impl<W: From<A>, A> WrapFrom<A> for W {
    fn wrap_from(arg: A) -> Self {
        W::from(arg)
    }
}

/// Wrap `bare` right away, for stores into a wrap-substitute field.
pub fn wrap_now<D, W>(bare: D, wrap: fn(D) -> W) -> Substitute<D, W> {
    Substitute::Wrapped(Rc::new(wrap(bare)))
}

// =================================================================================
// Callbacks
// =================================================================================

/// Lets a user-written lifecycle callback return either `()` or a `Result`.
pub trait CallbackOutcome {
    fn into_result(self) -> Result<()>;
}

impl CallbackOutcome for () {
    fn into_result(self) -> Result<()> {
        Ok(())
    }
}

impl<E: Into<crate::error::Error>> CallbackOutcome for std::result::Result<(), E> {
    fn into_result(self) -> Result<()> {
        self.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_store_skips_bookkeeping() {
        let field: Field<Option<String>> = Field::new(None);
        let old = store(&field, Some(String::from("x")), None).unwrap();
        assert_eq!(old, None);
        assert_eq!(field.get().as_deref(), Some("x"));
    }

    #[test]
    fn test_non_parent_aware_values_have_no_children() {
        let mut out = Vec::new();
        collect_children(&Some(String::from("x")), &mut out);
        assert!(out.is_empty());
        assert_eq!(count_children(&7u32), 0);
    }
}
