use quote::{format_ident, quote};
use syn::{parse_quote, ImplItem};

use super::{me, Transformer, TypeTarget};
use crate::weave::indexer::AFTER_UNMARSHAL;
use crate::weave::metadata::{FieldKind, TypeMetadata};

/// Name a user-written `after_unmarshal` is moved to.
const RENAMED_CALLBACK: &str = "__timber_after_unmarshal";

/// Synthesizes `register_fields` and `after_unmarshal`.
///
/// Both cover only this type's own fields: bare wrap-substitute values are
/// wrapped first, then this node joins the parents of every non-weak field
/// value. A tracked base is handled by calling its own implementation, and a
/// user-written callback runs last.
pub struct UnmarshalHook;

impl Transformer for UnmarshalHook {
    fn name(&self) -> &'static str {
        "unmarshal-hook"
    }

    fn transform(&self, target: &mut TypeTarget, metadata: &TypeMetadata) -> syn::Result<()> {
        if metadata.custom_after_unmarshal {
            rename_callback(target);
        }

        let own = metadata.has_registered_fields();
        if own {
            let wrap = metadata.fields_of(&[FieldKind::Wrapped]).map(|field| {
                let name = &field.name;
                let helper = format_ident!("__timber_wrap_{}", name);
                let optional = metadata.wrapped_fields[&name.to_string()].optional;
                if optional {
                    quote!(::timber::hooks::substitute_optional_in_place(&self.#name, Self::#helper);)
                } else {
                    quote!(::timber::hooks::substitute_in_place(&self.#name, Self::#helper);)
                }
            });
            let register = metadata
                .fields_of(&[FieldKind::Reference, FieldKind::Wrapped])
                .map(|field| {
                    let name = &field.name;
                    quote!(::timber::hooks::add_parent(&*self.#name.borrow(), me)?;)
                });
            let me = me();
            target.accessors.push(parse_quote! {
                #[doc(hidden)]
                fn __timber_register_own(&self) -> ::timber::Result<()> {
                    #(#wrap)*
                    let me = #me;
                    #(#register)*
                    ::core::result::Result::Ok(())
                }
            });
        }

        let base = metadata.tracked_base().map(|base| &base.field);
        let base_register = base.map(|base| quote!(::timber::Node::register_fields(&self.#base)?;));
        let base_callback = base.map(|base| {
            quote!(::timber::Node::after_unmarshal(&self.#base, unmarshaller, parent)?;)
        });
        let own_register = own.then(|| quote!(self.__timber_register_own()?;));
        let user_callback = if metadata.custom_after_unmarshal {
            let renamed = format_ident!("{}", RENAMED_CALLBACK);
            quote!(::timber::hooks::CallbackOutcome::into_result(self.#renamed(unmarshaller, parent)))
        } else {
            quote!(::core::result::Result::Ok(()))
        };

        target.node.push(parse_quote! {
            fn register_fields(&self) -> ::timber::Result<()> {
                #base_register
                #own_register
                ::core::result::Result::Ok(())
            }
        });
        target.node.push(parse_quote! {
            fn after_unmarshal(
                &self,
                unmarshaller: &::timber::Unmarshaller,
                parent: ::core::option::Option<&::timber::NodeRef>,
            ) -> ::timber::Result<()> {
                let _ = (unmarshaller, parent);
                #base_callback
                #own_register
                #user_callback
            }
        });
        Ok(())
    }
}

fn rename_callback(target: &mut TypeTarget) {
    let renamed = format_ident!("{}", RENAMED_CALLBACK);
    for item in target.impls.iter_mut().filter(|item| item.trait_.is_none()) {
        for member in item.items.iter_mut() {
            if let ImplItem::Fn(method) = member {
                if method.sig.ident == AFTER_UNMARSHAL {
                    method.sig.ident = renamed.clone();
                }
            }
        }
    }
}
