//! Weaving engine
//!
//! Rewrites the definitions and impl blocks of tracked types so that parent
//! lists stay current without hand-written bookkeeping. The engine works on
//! the items of one module at a time:
//!
//! 1. Every struct whose identity is in the tracked-type index, or which is
//!    marked `#[timber(node)]`, is selected together with its impl blocks.
//! 2. The [`indexer`]s gather a [`TypeMetadata`] record for it.
//! 3. The [`transform`] stages rewrite it and generate its trait impls.
//! 4. Struct literals of woven types anywhere in the module are adapted to
//!    the new field storage, and every `#[timber(...)]` marker is removed.
//!
//! A type that fails to weave is emitted unchanged and reported in
//! [`WeaveOutcome::failures`]; the other types are still woven.

pub mod index_file;
pub mod indexer;
pub mod markers;
pub mod metadata;
pub mod rewrite;
pub mod transform;
pub mod types;

pub use index_file::{AllowedParentIndex, TrackedTypes, DEFAULT_INDEX_NAME};
pub use metadata::{FieldKind, MetadataReport, TypeMetadata};

use std::collections::{BTreeMap, BTreeSet};

use proc_macro2::TokenStream;
use syn::{Item, ItemImpl, ItemStruct};

use crate::error::Error;
use indexer::{default_indexers, index_type, IndexContext, Indexer};
use markers::{has_marker, strip_markers, Marker};
use rewrite::{LiteralRewriter, LiteralRules};
use transform::{default_transformers, Transformer, TypeTarget};

/// Inputs of one weaving run.
#[derive(Debug, Clone)]
pub struct WeaveOptions {
    /// Path of the module whose items are woven, e.g. `crate::shapes`.
    pub module_path: String,
    pub tracked: TrackedTypes,
    pub allowed_parents: AllowedParentIndex,
}

impl WeaveOptions {
    pub fn new(module_path: impl Into<String>) -> Self {
        WeaveOptions {
            module_path: module_path.into(),
            tracked: TrackedTypes::new(),
            allowed_parents: AllowedParentIndex::new(),
        }
    }

    pub fn with_tracked(mut self, tracked: TrackedTypes) -> Self {
        self.tracked = tracked;
        self
    }

    pub fn with_allowed_parents(mut self, allowed_parents: AllowedParentIndex) -> Self {
        self.allowed_parents = allowed_parents;
        self
    }
}

/// A tracked type that could not be woven.
#[derive(Debug)]
pub struct TypeFailure {
    pub type_name: String,
    pub error: syn::Error,
}

impl TypeFailure {
    pub fn to_error(&self) -> Error {
        Error::Weave {
            type_name: self.type_name.clone(),
            message: self.error.to_string(),
        }
    }
}

/// Result of weaving the items of one module.
#[derive(Debug)]
pub struct WeaveOutcome {
    pub items: Vec<Item>,
    pub woven: Vec<TypeMetadata>,
    pub failures: Vec<TypeFailure>,
}

impl WeaveOutcome {
    /// One `compile_error!` per failed type.
    pub fn compile_errors(&self) -> TokenStream {
        self.failures
            .iter()
            .map(|failure| failure.error.to_compile_error())
            .collect()
    }
}

pub struct Weaver<'o> {
    options: &'o WeaveOptions,
    indexers: Vec<Box<dyn Indexer + Send + Sync>>,
    transformers: Vec<Box<dyn Transformer + Send + Sync>>,
}

impl<'o> Weaver<'o> {
    pub fn new(options: &'o WeaveOptions) -> Self {
        Weaver {
            options,
            indexers: default_indexers(),
            transformers: default_transformers(),
        }
    }

    /// Metadata of every tracked struct in `items`, without rewriting
    /// anything.
    pub fn inspect(&self, items: &[Item]) -> Vec<syn::Result<TypeMetadata>> {
        let local_nodes = local_nodes(items);
        tracked_structs(items, self.options, &local_nodes)
            .into_iter()
            .filter_map(|index| match &items[index] {
                Item::Struct(item) => Some(item),
                _ => None,
            })
            .map(|item| {
                let impls: Vec<ItemImpl> = impls_of(items, &item.ident)
                    .into_iter()
                    .filter_map(|index| match &items[index] {
                        Item::Impl(imp) => Some(imp.clone()),
                        _ => None,
                    })
                    .collect();
                let ctx = self.context(&local_nodes, &impls);
                index_type(&self.indexers, item, &ctx)
            })
            .collect()
    }

    pub fn weave_items(&self, items: Vec<Item>) -> WeaveOutcome {
        let local_nodes = local_nodes(&items);
        let selected = tracked_structs(&items, self.options, &local_nodes);
        let selected_names: BTreeSet<String> = selected
            .iter()
            .filter_map(|&index| match &items[index] {
                Item::Struct(item) => Some(item.ident.to_string()),
                _ => None,
            })
            .collect();
        let mut slots: Vec<Option<Item>> = items.into_iter().map(Some).collect();
        let mut generated: BTreeMap<usize, Vec<Item>> = BTreeMap::new();
        let mut rules = LiteralRules::new();
        let mut woven = Vec::new();
        let mut failures = Vec::new();

        for index in selected {
            let Some(Item::Struct(item)) = slots[index].take() else {
                continue;
            };
            let impl_slots = impls_of_slots(&slots, &item.ident);
            let impls: Vec<ItemImpl> = impl_slots
                .iter()
                .filter_map(|&slot| match slots[slot].take() {
                    Some(Item::Impl(imp)) => Some(imp),
                    _ => None,
                })
                .collect();

            let type_name = item.ident.to_string();
            match self.weave_type(item.clone(), impls.clone(), &local_nodes) {
                Ok((metadata, target)) => {
                    log::debug!("wove {}", metadata.identity);
                    let parts = target.into_items();
                    slots[index] = Some(parts.item);
                    for (slot, imp) in impl_slots.iter().zip(parts.impls) {
                        slots[*slot] = Some(imp);
                    }
                    generated.insert(index, parts.generated);
                    rules.insert(type_name, parts.literal_rules);
                    woven.push(metadata);
                }
                Err(error) => {
                    log::warn!("failed to weave {type_name}: {error}");
                    slots[index] = Some(Item::Struct(item));
                    for (slot, imp) in impl_slots.iter().zip(impls) {
                        slots[*slot] = Some(Item::Impl(imp));
                    }
                    failures.push(TypeFailure { type_name, error });
                }
            }
        }

        let mut items = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            items.extend(slot);
            if let Some(extra) = generated.remove(&index) {
                items.extend(extra);
            }
        }

        LiteralRewriter::new(&rules).rewrite_items(&mut items);
        strip_all_markers(&mut items, &selected_names);

        WeaveOutcome {
            items,
            woven,
            failures,
        }
    }

    fn weave_type(
        &self,
        item: ItemStruct,
        impls: Vec<ItemImpl>,
        local_nodes: &BTreeSet<String>,
    ) -> syn::Result<(TypeMetadata, TypeTarget)> {
        let metadata = {
            let ctx = self.context(local_nodes, &impls);
            index_type(&self.indexers, &item, &ctx)?
        };

        let mut target = TypeTarget::new(item, impls);
        for transformer in &self.transformers {
            log::trace!("running {} on {}", transformer.name(), metadata.identity);
            transformer.transform(&mut target, &metadata)?;
        }
        Ok((metadata, target))
    }

    fn context<'a>(&'a self, local_nodes: &'a BTreeSet<String>, impls: &'a [ItemImpl]) -> IndexContext<'a> {
        IndexContext {
            module_path: &self.options.module_path,
            tracked: &self.options.tracked,
            allowed_parents: &self.options.allowed_parents,
            local_nodes,
            impls,
        }
    }
}

/// Names of structs marked `#[timber(node)]`.
fn local_nodes(items: &[Item]) -> BTreeSet<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Item::Struct(item) if has_marker(&item.attrs, |marker| matches!(marker, Marker::Node)) => {
                Some(item.ident.to_string())
            }
            _ => None,
        })
        .collect()
}

/// Positions of the structs to weave.
fn tracked_structs(items: &[Item], options: &WeaveOptions, local_nodes: &BTreeSet<String>) -> Vec<usize> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Item::Struct(item) => {
                let name = item.ident.to_string();
                let identity = format!("{}::{}", options.module_path, name);
                (local_nodes.contains(&name) || options.tracked.contains(&identity)).then_some(index)
            }
            _ => None,
        })
        .collect()
}

fn is_impl_of(imp: &ItemImpl, ident: &syn::Ident) -> bool {
    types::last_ident(&imp.self_ty).map_or(false, |name| *ident == name)
}

fn impls_of(items: &[Item], ident: &syn::Ident) -> Vec<usize> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Item::Impl(imp) if is_impl_of(imp, ident) => Some(index),
            _ => None,
        })
        .collect()
}

fn impls_of_slots(slots: &[Option<Item>], ident: &syn::Ident) -> Vec<usize> {
    slots
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| match slot {
            Some(Item::Impl(imp)) if is_impl_of(imp, ident) => Some(index),
            _ => None,
        })
        .collect()
}

fn strip_all_markers(items: &mut [Item], tracked: &BTreeSet<String>) {
    for item in items {
        let Item::Struct(item) = item else {
            continue;
        };
        let mut stripped = strip_markers(&mut item.attrs);
        for field in item.fields.iter_mut() {
            stripped |= strip_markers(&mut field.attrs);
        }
        if stripped && !tracked.contains(&item.ident.to_string()) {
            log::warn!("{} carries timber markers but is not tracked", item.ident);
        }
    }
}
