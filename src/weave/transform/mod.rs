//! Transformation pass
//!
//! Code-synthesis stages applied to one tracked type in a fixed order:
//!
//! 1. [`ParentWatcher`]: field storage, tracked stores, accessors, the
//!    `ParentAware` impl and detaching on drop.
//! 2. [`ChildAccessors`]: `children`, `child_count` and `owned_children`.
//! 3. [`UnmarshalHook`]: `register_fields` and `after_unmarshal`. Runs after
//!    the parent watcher so its own stores are not intercepted again.
//! 4. [`WeakRefWatcher`]: weak storage and lazy clearing on every read,
//!    including reads in code generated by the earlier stages.
//!
//! Each stage adds to a shared [`TypeTarget`]; the target is turned back into
//! items once all stages have run.

mod child_accessors;
mod parent_watcher;
mod unmarshal_hook;
mod weak_ref_watcher;

pub use child_accessors::ChildAccessors;
pub use parent_watcher::ParentWatcher;
pub use unmarshal_hook::UnmarshalHook;
pub use weak_ref_watcher::WeakRefWatcher;

use std::collections::BTreeMap;

use quote::quote;
use syn::{parse_quote, Ident, ImplItemFn, Item, ItemImpl, ItemStruct};

use super::metadata::TypeMetadata;
use super::rewrite::{state_field, AccessPolicy, FieldAccessRewriter, LiteralWrap};

/// Trait for transformation stages
pub trait Transformer {
    /// Get the name of this stage
    fn name(&self) -> &'static str;

    /// Apply this stage to `target`
    fn transform(&self, target: &mut TypeTarget, metadata: &TypeMetadata) -> syn::Result<()>;
}

/// The default stage order.
pub fn default_transformers() -> Vec<Box<dyn Transformer + Send + Sync>> {
    vec![
        Box::new(ParentWatcher),
        Box::new(ChildAccessors),
        Box::new(UnmarshalHook),
        Box::new(WeakRefWatcher),
    ]
}

/// A tracked type being rewritten, plus everything generated for it so far.
pub struct TypeTarget {
    pub item: ItemStruct,
    /// The type's own impl blocks, rewritten in place.
    pub impls: Vec<ItemImpl>,
    /// Generated inherent methods.
    pub accessors: Vec<ImplItemFn>,
    pub parent_aware: Vec<ImplItemFn>,
    pub node: Vec<ImplItemFn>,
    pub drop: Option<ImplItemFn>,
    /// How struct literals of this type are adapted, per field.
    pub literal_rules: BTreeMap<String, LiteralWrap>,
}

/// Items produced for one woven type.
pub struct WovenItems {
    pub item: Item,
    pub impls: Vec<Item>,
    pub generated: Vec<Item>,
    pub literal_rules: BTreeMap<String, LiteralWrap>,
}

impl TypeTarget {
    pub fn new(item: ItemStruct, impls: Vec<ItemImpl>) -> Self {
        TypeTarget {
            item,
            impls,
            accessors: Vec::new(),
            parent_aware: Vec::new(),
            node: Vec::new(),
            drop: None,
            literal_rules: BTreeMap::new(),
        }
    }

    pub fn ident(&self) -> &Ident {
        &self.item.ident
    }

    /// Add a generated inherent method unless the user already wrote one
    /// with that name.
    pub fn add_accessor(&mut self, metadata: &TypeMetadata, method: ImplItemFn) {
        let name = method.sig.ident.to_string();
        if metadata.user_methods.contains(&name) {
            log::debug!("{} defines {name} itself; not generating it", metadata.identity);
            return;
        }
        self.accessors.push(method);
    }

    /// Run `policy` over the user impls and, when `generated` is set, over
    /// every method generated so far.
    pub fn rewrite_accesses<P: AccessPolicy>(&mut self, policy: &P, generated: bool) -> syn::Result<()> {
        let mut rewriter = FieldAccessRewriter::new(policy);
        for item in &mut self.impls {
            rewriter.rewrite_impl(item);
        }
        if generated {
            use syn::visit_mut::VisitMut;
            for method in self
                .accessors
                .iter_mut()
                .chain(self.parent_aware.iter_mut())
                .chain(self.node.iter_mut())
                .chain(self.drop.iter_mut())
            {
                rewriter.visit_impl_item_fn_mut(method);
            }
        }
        rewriter.finish()
    }

    pub fn into_items(self) -> WovenItems {
        let name = &self.item.ident;
        let mut generated = Vec::new();

        if !self.accessors.is_empty() {
            let accessors = &self.accessors;
            generated.push(parse_quote! {
                #[allow(dead_code)]
                impl #name {
                    #(#accessors)*
                }
            });
        }

        let parent_aware = &self.parent_aware;
        generated.push(parse_quote! {
            impl ::timber::ParentAware for #name {
                #(#parent_aware)*
            }
        });

        let node = &self.node;
        generated.push(parse_quote! {
            impl ::timber::Node for #name {
                #(#node)*
            }
        });

        if let Some(drop) = &self.drop {
            generated.push(parse_quote! {
                impl ::core::ops::Drop for #name {
                    #drop
                }
            });
        }

        WovenItems {
            item: Item::Struct(self.item),
            impls: self.impls.into_iter().map(Item::Impl).collect(),
            generated,
            literal_rules: self.literal_rules,
        }
    }
}

/// `self.__timber_state.me()`
pub(crate) fn me() -> proc_macro2::TokenStream {
    let state = state_field();
    quote!(self.#state.me())
}
