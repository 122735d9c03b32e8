//! timber: automatic parent tracking for object graphs
//!
//! Types in a tracked graph learn which nodes currently reference them
//! without any hand-written bookkeeping. The [`weave`] engine rewrites a
//! tracked type's definition and methods to maintain parent lists on every
//! field store, synthesizes child accessors and a post-deserialization hook,
//! and makes weak back-references clear themselves lazily. The wrapper
//! containers in [`node::wrapper`] extend the same bookkeeping through lists,
//! sets, queues, maps and arrays.

pub mod cli;
pub mod error;
pub mod hooks;
pub mod node;
pub mod observ;
pub mod persist;
pub mod weave;

pub use error::{Error, Result};
pub use node::util::first_parent_of_type;
pub use node::wrapper::{
    ArrayWrapper, CollectionWrapper, ListWrapper, MapWrapper, QueueWrapper, SetWrapper, Wrapper,
};
pub use node::{
    AsParentAware, Child, ChildRef, Field, Node, NodeRef, NodeState, ParentAware, ParentList,
    ParentRef, Substitute, WeakRef,
};
pub use persist::{adopt, Unmarshaller};
pub use weave::{WeaveOptions, WeaveOutcome, Weaver};
