use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::parse_quote;

use super::{Transformer, TypeTarget};
use crate::weave::metadata::{FieldInfo, FieldKind, TypeMetadata};

/// Synthesizes `children`, `child_count` and `owned_children`.
///
/// Children of a tracked base come first, then every non-primitive field in
/// declaration order, with wrappers flattened into their elements.
pub struct ChildAccessors;

impl Transformer for ChildAccessors {
    fn name(&self) -> &'static str {
        "child-accessors"
    }

    fn transform(&self, target: &mut TypeTarget, metadata: &TypeMetadata) -> syn::Result<()> {
        let all = [FieldKind::Reference, FieldKind::Wrapped, FieldKind::Weak];
        let owned = [FieldKind::Reference, FieldKind::Wrapped];

        let base = metadata.tracked_base().map(|base| &base.field);
        let (children_init, count_init, owned_init) = match base {
            Some(base) => (
                quote!(::timber::Node::children(&self.#base)),
                quote!(::timber::Node::child_count(&self.#base)),
                quote!(::timber::Node::owned_children(&self.#base)),
            ),
            None => (
                quote!(::std::vec::Vec::new()),
                quote!(0usize),
                quote!(::std::vec::Vec::new()),
            ),
        };

        let collect: Vec<_> = metadata
            .fields_of(&all)
            .map(|field| {
                let value = field_value(field, metadata);
                quote!(::timber::hooks::collect_children(#value, &mut children);)
            })
            .collect();
        let count: Vec<_> = metadata
            .fields_of(&all)
            .map(|field| {
                let value = field_value(field, metadata);
                quote!(count += ::timber::hooks::count_children(#value);)
            })
            .collect();
        let collect_owned: Vec<_> = metadata
            .fields_of(&owned)
            .map(|field| {
                let value = field_value(field, metadata);
                quote!(::timber::hooks::collect_children(#value, &mut children);)
            })
            .collect();

        target.node.push(parse_quote! {
            fn children(&self) -> ::std::vec::Vec<::timber::ChildRef> {
                #[allow(unused_mut)]
                let mut children: ::std::vec::Vec<::timber::ChildRef> = #children_init;
                #(#collect)*
                children
            }
        });
        target.node.push(parse_quote! {
            fn child_count(&self) -> usize {
                #[allow(unused_mut)]
                let mut count: usize = #count_init;
                #(#count)*
                count
            }
        });
        target.node.push(parse_quote! {
            fn owned_children(&self) -> ::std::vec::Vec<::timber::ChildRef> {
                #[allow(unused_mut)]
                let mut children: ::std::vec::Vec<::timber::ChildRef> = #owned_init;
                #(#collect_owned)*
                children
            }
        });
        Ok(())
    }
}

/// A `&dyn Child` expression for the current value of `field`.
///
/// Weak fields are read as plain `self.f`; the weak watcher rewrites that read
/// later, so lazy clearing also applies here.
fn field_value(field: &FieldInfo, metadata: &TypeMetadata) -> TokenStream {
    let name = &field.name;
    match metadata.kind(field) {
        FieldKind::Wrapped => {
            let helper = format_ident!("__timber_wrap_{}", name);
            let optional = metadata
                .wrapped_fields
                .get(&name.to_string())
                .map_or(false, |spec| spec.optional);
            if optional {
                quote!(&::timber::hooks::read_optional_substitute(&self.#name, Self::#helper))
            } else {
                quote!(&::timber::hooks::read_substitute(&self.#name, Self::#helper))
            }
        }
        FieldKind::Weak => quote!(&self.#name),
        _ => quote!(&*self.#name.borrow()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use quote::ToTokens;
    use syn::{parse_quote, ItemStruct};

    use super::*;
    use crate::weave::index_file::{AllowedParentIndex, TrackedTypes};
    use crate::weave::indexer::{default_indexers, index_type, IndexContext};

    #[test]
    fn test_children_follow_declaration_order_after_base() {
        let tracked: TrackedTypes = ["crate::Shape"].into_iter().collect();
        let allowed = AllowedParentIndex::new();
        let local = BTreeSet::new();
        let ctx = IndexContext {
            module_path: "crate",
            tracked: &tracked,
            allowed_parents: &allowed,
            local_nodes: &local,
            impls: &[],
        };
        let item: ItemStruct = parse_quote! {
            struct Circle {
                #[timber(base)]
                shape: Shape,
                second: Rc<Leaf>,
                #[timber(weak)]
                owner: Option<Rc<Group>>,
                first: Rc<Leaf>,
            }
        };
        let metadata = index_type(&default_indexers(), &item, &ctx).unwrap();
        let mut target = TypeTarget::new(item, Vec::new());
        ChildAccessors.transform(&mut target, &metadata).unwrap();

        let children = target.node[0].to_token_stream().to_string();
        let base = children.find("children (& self . shape)").unwrap();
        let second = children.find("self . second").unwrap();
        let owner = children.find("self . owner").unwrap();
        let first = children.find("self . first").unwrap();
        assert!(base < second && second < owner && owner < first);

        let owned = target.node[2].to_token_stream().to_string();
        assert!(!owned.contains("owner"));
    }
}
