use syn::visit::{self, Visit};
use syn::{FnArg, ImplItemFn, ItemImpl, ItemStruct};

use super::{IndexContext, Indexer};
use crate::weave::metadata::TypeMetadata;

/// Name of the persistence lifecycle callback.
pub const AFTER_UNMARSHAL: &str = "after_unmarshal";

/// Scans the impl blocks of a type for a custom `after_unmarshal`, a user
/// `Drop`, and inherent method names that generated accessors must not
/// shadow.
pub struct CallbacksIndexer;

impl Indexer for CallbacksIndexer {
    fn name(&self) -> &'static str {
        "callbacks"
    }

    fn index(
        &self,
        _item: &ItemStruct,
        ctx: &IndexContext<'_>,
        metadata: &mut TypeMetadata,
    ) -> syn::Result<()> {
        let mut visitor = CallbackVisitor {
            metadata,
            inherent: false,
            error: None,
        };
        for item in ctx.impls {
            visitor.visit_item_impl(item);
        }
        match visitor.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct CallbackVisitor<'m> {
    metadata: &'m mut TypeMetadata,
    inherent: bool,
    error: Option<syn::Error>,
}

impl<'ast, 'm> Visit<'ast> for CallbackVisitor<'m> {
    fn visit_item_impl(&mut self, item: &'ast ItemImpl) {
        match &item.trait_ {
            Some((_, path, _)) => {
                self.inherent = false;
                if path.segments.last().map_or(false, |segment| segment.ident == "Drop") {
                    self.metadata.user_drop = true;
                }
                if path
                    .segments
                    .last()
                    .map_or(false, |segment| segment.ident == "ParentAware" || segment.ident == "Node")
                {
                    self.error.get_or_insert_with(|| {
                        syn::Error::new_spanned(
                            path,
                            "tracked types get their ParentAware and Node impls generated",
                        )
                    });
                }
            }
            None => self.inherent = true,
        }
        visit::visit_item_impl(self, item);
    }

    fn visit_impl_item_fn(&mut self, method: &'ast ImplItemFn) {
        if !self.inherent {
            return;
        }
        let name = method.sig.ident.to_string();
        if name == AFTER_UNMARSHAL {
            let has_receiver = matches!(method.sig.inputs.first(), Some(FnArg::Receiver(_)));
            if has_receiver && method.sig.inputs.len() == 3 {
                self.metadata.custom_after_unmarshal = true;
            } else {
                self.error.get_or_insert_with(|| {
                    syn::Error::new_spanned(
                        &method.sig,
                        "`after_unmarshal` must take `&self`, the unmarshaller and the parent",
                    )
                });
            }
        }
        self.metadata.user_methods.insert(name);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::weave::index_file::{AllowedParentIndex, TrackedTypes};
    use syn::parse_quote;

    #[test]
    fn test_finds_callback_drop_and_methods() {
        let impls: Vec<ItemImpl> = vec![
            parse_quote! {
                impl Group {
                    fn after_unmarshal(&self, _u: &Unmarshaller, _p: Option<&NodeRef>) {}
                    fn leaves(&self) -> usize { 0 }
                }
            },
            parse_quote! {
                impl Drop for Group {
                    fn drop(&mut self) {}
                }
            },
        ];
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
        let item: ItemStruct = parse_quote!(struct Group {});
        let mut metadata = TypeMetadata::new(item.ident.clone(), "crate::Group".into());
        CallbacksIndexer.index(&item, &ctx, &mut metadata).unwrap();

        assert!(metadata.custom_after_unmarshal);
        assert!(metadata.user_drop);
        assert!(metadata.user_methods.contains("leaves"));
        assert!(!metadata.user_methods.contains("drop"));
    }
}
