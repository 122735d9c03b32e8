//! Metadata indexing pass
//!
//! Read-only visitors over a tracked type's definition and impl blocks. Each
//! indexer fills a disjoint part of one [`TypeMetadata`]; their order does not
//! matter, and all of them finish before any transformation stage runs.

mod callbacks;
mod class_types;
mod fields;
mod weak_fields;
mod wrap_fields;

pub use callbacks::{CallbacksIndexer, AFTER_UNMARSHAL};
pub use class_types::ClassTypesIndexer;
pub use fields::FieldsIndexer;
pub use weak_fields::WeakFieldsIndexer;
pub use wrap_fields::WrapSubstitutedFieldsIndexer;

use std::collections::BTreeSet;

use syn::{ItemImpl, ItemStruct, Type};

use super::index_file::{AllowedParentIndex, TrackedTypes};
use super::metadata::TypeMetadata;
use super::types;

/// Trait for indexers
pub trait Indexer {
    /// Get the name of this indexer
    fn name(&self) -> &'static str;

    /// Record what this indexer knows about `item` into `metadata`
    fn index(
        &self,
        item: &ItemStruct,
        ctx: &IndexContext<'_>,
        metadata: &mut TypeMetadata,
    ) -> syn::Result<()>;
}

/// Everything an indexer may consult besides the struct itself.
pub struct IndexContext<'a> {
    pub module_path: &'a str,
    pub tracked: &'a TrackedTypes,
    pub allowed_parents: &'a AllowedParentIndex,
    /// Names of structs in the current module marked `#[timber(node)]`.
    pub local_nodes: &'a BTreeSet<String>,
    /// Impl blocks of the type being indexed.
    pub impls: &'a [ItemImpl],
}

impl<'a> IndexContext<'a> {
    pub fn identity_of(&self, name: &str) -> String {
        format!("{}::{}", self.module_path, name)
    }

    /// Whether `ty` names a tracked type.
    pub fn is_tracked_type(&self, ty: &Type) -> bool {
        let Type::Path(path) = ty else {
            return false;
        };
        let segments: Vec<String> = path
            .path
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();
        match segments.as_slice() {
            [name] => {
                self.local_nodes.contains(name) || self.tracked.contains(&self.identity_of(name))
            }
            _ => self.tracked.contains(&segments.join("::")),
        }
    }
}

/// The default indexer set.
pub fn default_indexers() -> Vec<Box<dyn Indexer + Send + Sync>> {
    vec![
        Box::new(ClassTypesIndexer),
        Box::new(FieldsIndexer),
        Box::new(WeakFieldsIndexer),
        Box::new(WrapSubstitutedFieldsIndexer),
        Box::new(CallbacksIndexer),
    ]
}

/// Run every indexer over `item`.
pub fn index_type(
    indexers: &[Box<dyn Indexer + Send + Sync>],
    item: &ItemStruct,
    ctx: &IndexContext<'_>,
) -> syn::Result<TypeMetadata> {
    let name = item.ident.to_string();
    let mut metadata = TypeMetadata::new(item.ident.clone(), ctx.identity_of(&name));
    for indexer in indexers {
        log::trace!("running indexer {} on {}", indexer.name(), name);
        indexer.index(item, ctx, &mut metadata)?;
    }
    Ok(metadata)
}

/// Fields of a named struct, or an error for tuple and unit structs.
pub(crate) fn named_fields(item: &ItemStruct) -> syn::Result<&syn::FieldsNamed> {
    match &item.fields {
        syn::Fields::Named(fields) => Ok(fields),
        _ => Err(syn::Error::new_spanned(
            &item.ident,
            "tracked types must be structs with named fields",
        )),
    }
}

pub(crate) fn is_reference_type(ty: &Type) -> bool {
    types::is_reference(ty)
}
