//! Observable containers
//!
//! Each container shape detects its own mutations and reports entering and
//! leaving elements to a [`CollectionObserver`]. What happens on those
//! notifications is decided by the observer, so the propagation policy is
//! written once and shared by every shape.
//!
//! Insertions notify before the container changes, so a rejected element
//! leaves the container untouched. Removals notify after the element is gone.

pub mod collection;
pub mod list;
pub mod map;

pub use collection::{Collection, ObservableCollection};
pub use list::ObservableList;
pub use map::ObservableMap;

use crate::error::Result;
use crate::node::Child;

/// Receives add/remove notifications from an observable container.
pub trait CollectionObserver {
    fn on_add(&self, element: &dyn Child) -> Result<()>;
    fn on_remove(&self, element: &dyn Child);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use super::CollectionObserver;
    use crate::error::{Error, Result};
    use crate::node::Child;

    /// Counts notifications and optionally rejects every addition.
    #[derive(Default)]
    pub struct Recorder {
        pub added: RefCell<usize>,
        pub removed: RefCell<usize>,
        pub reject: bool,
    }

    impl CollectionObserver for Recorder {
        fn on_add(&self, _element: &dyn Child) -> Result<()> {
            if self.reject {
                return Err(Error::internal("rejected"));
            }
            *self.added.borrow_mut() += 1;
            Ok(())
        }

        fn on_remove(&self, _element: &dyn Child) {
            *self.removed.borrow_mut() += 1;
        }
    }
}
