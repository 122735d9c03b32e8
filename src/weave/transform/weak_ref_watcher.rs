use quote::format_ident;
use syn::{parse_quote, Expr, Fields, Ident};

use super::{Transformer, TypeTarget};
use crate::weave::metadata::TypeMetadata;
use crate::weave::rewrite::{AccessPolicy, LiteralWrap, StoreSite};

/// Turns weak fields into [`WeakRef`](crate::WeakRef) storage and routes every
/// read through a check that clears the field once its target has no
/// parents left.
pub struct WeakRefWatcher;

impl Transformer for WeakRefWatcher {
    fn name(&self) -> &'static str {
        "weak-ref-watcher"
    }

    fn transform(&self, target: &mut TypeTarget, metadata: &TypeMetadata) -> syn::Result<()> {
        if metadata.weak_fields.is_empty() {
            return Ok(());
        }

        if let Fields::Named(fields) = &mut target.item.fields {
            for field in fields.named.iter_mut() {
                let Some(weak) = field
                    .ident
                    .as_ref()
                    .and_then(|name| metadata.weak_fields.get(&name.to_string()))
                else {
                    continue;
                };
                let pointee = &weak.target;
                field.ty = parse_quote!(::timber::Field<::timber::WeakRef<#pointee>>);
                if metadata.has_serde {
                    field.attrs.push(parse_quote!(#[serde(skip)]));
                }
            }
        }

        target.rewrite_accesses(&LazyClearing { metadata }, true)?;

        for (name, weak) in &metadata.weak_fields {
            let Some(field) = metadata.field(name) else {
                continue;
            };
            let ident = &field.name;
            let vis = &field.vis;
            let pointee = &weak.target;
            let setter = format_ident!("set_{}", ident);

            target.add_accessor(
                metadata,
                parse_quote! {
                    #vis fn #ident(&self) -> ::core::option::Option<::std::rc::Rc<#pointee>> {
                        ::timber::hooks::read_weak(&self.#ident)
                    }
                },
            );
            target.add_accessor(
                metadata,
                parse_quote! {
                    #vis fn #setter(&self, value: ::core::option::Option<::std::rc::Rc<#pointee>>) {
                        ::timber::hooks::store_weak(&self.#ident, value)
                    }
                },
            );
            target.literal_rules.insert(name.clone(), LiteralWrap::Weak);
        }
        Ok(())
    }
}

struct LazyClearing<'m> {
    metadata: &'m TypeMetadata,
}

impl AccessPolicy for LazyClearing<'_> {
    fn read(&self, field: &Ident) -> Option<Expr> {
        self.metadata
            .weak_fields
            .contains_key(&field.to_string())
            .then(|| parse_quote!(::timber::hooks::read_weak(&self.#field)))
    }

    fn store(&self, field: &Ident, value: Expr, _site: StoreSite) -> Option<Expr> {
        self.metadata
            .weak_fields
            .contains_key(&field.to_string())
            .then(|| parse_quote!(::timber::hooks::store_weak(&self.#field, #value)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use quote::ToTokens;
    use syn::{parse_quote, ItemImpl, ItemStruct};

    use super::*;
    use crate::weave::index_file::{AllowedParentIndex, TrackedTypes};
    use crate::weave::indexer::{default_indexers, index_type, IndexContext};
    use crate::weave::transform::ChildAccessors;

    #[test]
    fn test_weak_reads_in_user_and_generated_code() {
        let impls: Vec<ItemImpl> = vec![parse_quote! {
            impl Leaf {
                fn owner_name(&self) -> Option<String> {
                    self.owner.as_ref().map(|owner| owner.name.clone())
                }

                fn detach(&self) {
                    self.owner = None;
                }
            }
        }];
        let item: ItemStruct = parse_quote! {
            #[derive(serde::Serialize)]
            struct Leaf {
                #[timber(weak)]
                owner: Option<Rc<Group>>,
            }
        };
        let tracked = TrackedTypes::new();
        let allowed = AllowedParentIndex::new();
        let local = BTreeSet::new();
        let ctx = IndexContext {
            module_path: "crate",
            tracked: &tracked,
            allowed_parents: &allowed,
            local_nodes: &local,
            impls: &impls,
        };
        let metadata = index_type(&default_indexers(), &item, &ctx).unwrap();
        let mut target = TypeTarget::new(item, impls);
        ChildAccessors.transform(&mut target, &metadata).unwrap();
        WeakRefWatcher.transform(&mut target, &metadata).unwrap();

        let storage = target.item.to_token_stream().to_string();
        assert!(storage.contains(":: timber :: WeakRef < Group >"));
        assert!(storage.contains("serde (skip)"));

        let user = target.impls[0].to_token_stream().to_string();
        assert!(user.contains(":: timber :: hooks :: read_weak (& self . owner) . as_ref ()"));
        assert!(user.contains(":: timber :: hooks :: store_weak (& self . owner , None)"));

        let children = target.node[0].to_token_stream().to_string();
        assert!(children.contains("collect_children (& :: timber :: hooks :: read_weak (& self . owner)"));
    }
}
