use proc_macro2::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::{parse_quote, Expr, Field, Fields, Ident, ImplItemFn, Type};

use super::{me, Transformer, TypeTarget};
use crate::weave::metadata::{FieldInfo, FieldKind, TypeMetadata, WrapSpec};
use crate::weave::rewrite::{state_field, AccessPolicy, LiteralWrap, StoreSite};

/// Makes every store into a reference or wrap-substitute field keep the
/// parent lists of the old and new values up to date.
pub struct ParentWatcher;

impl Transformer for ParentWatcher {
    fn name(&self) -> &'static str {
        "parent-watcher"
    }

    fn transform(&self, target: &mut TypeTarget, metadata: &TypeMetadata) -> syn::Result<()> {
        rewrite_storage(target, metadata)?;
        target.rewrite_accesses(&TrackedStores { metadata }, false)?;

        for field in metadata.fields_of(&[FieldKind::Reference, FieldKind::Wrapped]) {
            match metadata.wrapped_fields.get(&field.name.to_string()) {
                Some(spec) => {
                    target.accessors.push(wrap_helper(field, spec));
                    add_wrapped_accessors(target, metadata, field, spec);
                    target.literal_rules.insert(
                        field.name.to_string(),
                        LiteralWrap::Substitute {
                            optional: spec.optional,
                        },
                    );
                }
                None => {
                    add_reference_accessors(target, metadata, field);
                    target
                        .literal_rules
                        .insert(field.name.to_string(), LiteralWrap::Field);
                }
            }
        }

        add_parent_aware(target, metadata);
        add_node_state(target, metadata);
        add_drop(target, metadata);
        Ok(())
    }
}

// =================================================================================
// Storage
// =================================================================================

fn rewrite_storage(target: &mut TypeTarget, metadata: &TypeMetadata) -> syn::Result<()> {
    let ident = target.item.ident.clone();
    let Fields::Named(fields) = &mut target.item.fields else {
        return Err(syn::Error::new_spanned(
            ident,
            "tracked types must be structs with named fields",
        ));
    };

    for field in fields.named.iter_mut() {
        let Some(info) = field.ident.as_ref().and_then(|name| metadata.field(&name.to_string())) else {
            continue;
        };
        match metadata.kind(info) {
            FieldKind::Reference => {
                let ty = &field.ty;
                field.ty = parse_quote!(::timber::Field<#ty>);
            }
            FieldKind::Wrapped => {
                let spec = &metadata.wrapped_fields[&info.name.to_string()];
                field.ty = substitute_storage(spec);
            }
            FieldKind::Value | FieldKind::Weak => {}
        }
    }

    let state = state_field();
    let mut hidden: Field = if metadata.has_serde {
        parse_quote!(#[serde(skip)] #state: ::timber::NodeState)
    } else {
        parse_quote!(#state: ::timber::NodeState)
    };
    hidden.attrs.insert(0, parse_quote!(#[doc(hidden)]));
    fields.named.push(hidden);
    Ok(())
}

fn substitute_storage(spec: &WrapSpec) -> Type {
    let WrapSpec { bare, wrapper, .. } = spec;
    if spec.optional {
        parse_quote!(::timber::Field<::core::option::Option<::timber::Substitute<#bare, #wrapper>>>)
    } else {
        parse_quote!(::timber::Field<::timber::Substitute<#bare, #wrapper>>)
    }
}

// =================================================================================
// Access rewriting
// =================================================================================

struct TrackedStores<'m> {
    metadata: &'m TypeMetadata,
}

impl TrackedStores<'_> {
    fn kind(&self, field: &Ident) -> Option<FieldKind> {
        let info = self.metadata.field(&field.to_string())?;
        match self.metadata.kind(info) {
            kind @ (FieldKind::Reference | FieldKind::Wrapped) => Some(kind),
            _ => None,
        }
    }
}

impl AccessPolicy for TrackedStores<'_> {
    fn read(&self, field: &Ident) -> Option<Expr> {
        match self.kind(field)? {
            FieldKind::Wrapped => Some(read_wrapped(field, &self.metadata.wrapped_fields[&field.to_string()])),
            _ => Some(parse_quote!(::timber::Field::get(&self.#field))),
        }
    }

    fn store(&self, field: &Ident, value: Expr, site: StoreSite) -> Option<Expr> {
        let value = match self.kind(field)? {
            FieldKind::Wrapped => wrap_value(field, &self.metadata.wrapped_fields[&field.to_string()], quote!(#value)),
            _ => quote!(#value),
        };
        let me = me();
        Some(if site.fallible {
            parse_quote!({
                let _ = ::timber::hooks::store(&self.#field, #value, #me)?;
            })
        } else {
            parse_quote!({
                let _ = ::timber::hooks::store_or_panic(&self.#field, #value, #me);
            })
        })
    }
}

fn wrap_helper_name(field: &Ident) -> Ident {
    format_ident!("__timber_wrap_{}", field)
}

fn read_wrapped(field: &Ident, spec: &WrapSpec) -> Expr {
    let helper = wrap_helper_name(field);
    if spec.optional {
        parse_quote!(::timber::hooks::read_optional_substitute(&self.#field, Self::#helper))
    } else {
        parse_quote!(::timber::hooks::read_substitute(&self.#field, Self::#helper))
    }
}

/// A bare value converted to what the field stores.
fn wrap_value(field: &Ident, spec: &WrapSpec, value: TokenStream) -> TokenStream {
    let helper = wrap_helper_name(field);
    if spec.optional {
        quote!(::core::option::Option::map(#value, |bare| ::timber::hooks::wrap_now(bare, Self::#helper)))
    } else {
        quote!(::timber::hooks::wrap_now(#value, Self::#helper))
    }
}

// =================================================================================
// Accessors
// =================================================================================

/// Builds the wrapper from a bare value. Spanned at the marker, so a missing
/// constructor is reported there.
fn wrap_helper(field: &FieldInfo, spec: &WrapSpec) -> ImplItemFn {
    let helper = wrap_helper_name(&field.name);
    let bare = &spec.bare;
    let wrapper = &spec.wrapper;
    let arg = spec.ctor_arg();
    let tokens = quote_spanned! {spec.span=>
        #[doc(hidden)]
        fn #helper(bare: #bare) -> #wrapper {
            <#wrapper as ::timber::hooks::WrapFrom<#arg>>::wrap_from(::core::convert::Into::<#arg>::into(bare))
        }
    };
    parse_quote!(#tokens)
}

fn add_reference_accessors(target: &mut TypeTarget, metadata: &TypeMetadata, field: &FieldInfo) {
    let FieldInfo { name, ty, vis, .. } = field;
    let setter = format_ident!("set_{}", name);
    let me = me();

    target.add_accessor(
        metadata,
        parse_quote! {
            #vis fn #name(&self) -> #ty {
                ::timber::Field::get(&self.#name)
            }
        },
    );
    target.add_accessor(
        metadata,
        parse_quote! {
            /// Store a new value, returning the old one. Fails without any
            /// change if the new value does not accept this node as a parent.
            #vis fn #setter(&self, value: #ty) -> ::timber::Result<#ty> {
                ::timber::hooks::store(&self.#name, value, #me)
            }
        },
    );
}

fn add_wrapped_accessors(target: &mut TypeTarget, metadata: &TypeMetadata, field: &FieldInfo, spec: &WrapSpec) {
    let FieldInfo { name, ty, vis, .. } = field;
    let setter = format_ident!("set_{}", name);
    let wrapper = &spec.wrapper;
    let read = read_wrapped(name, spec);
    let stored = wrap_value(name, spec, quote!(value));
    let me = me();
    let returned: Type = if spec.optional {
        parse_quote!(::core::option::Option<::std::rc::Rc<#wrapper>>)
    } else {
        parse_quote!(::std::rc::Rc<#wrapper>)
    };

    target.add_accessor(
        metadata,
        parse_quote! {
            #vis fn #name(&self) -> #returned {
                #read
            }
        },
    );
    target.add_accessor(
        metadata,
        parse_quote! {
            #vis fn #setter(&self, value: #ty) -> ::timber::Result<()> {
                ::timber::hooks::store(&self.#name, #stored, #me).map(|_| ())
            }
        },
    );
}

// =================================================================================
// Trait surface
// =================================================================================

fn add_parent_aware(target: &mut TypeTarget, metadata: &TypeMetadata) {
    let state = state_field();
    target.parent_aware.push(parse_quote! {
        fn parent_list(&self) -> &::timber::ParentList {
            self.#state.parents()
        }
    });

    if !metadata.allowed_parents.is_empty() {
        let checks = metadata
            .allowed_parents
            .iter()
            .map(|ty| quote!(::timber::node::util::is_node_of::<#ty>(parent)));
        target.parent_aware.push(parse_quote! {
            fn accepts_parent(&self, parent: &dyn ::timber::Node) -> bool {
                false #(|| #checks)*
            }
        });
    }

    target.parent_aware.push(parse_quote! {
        fn as_node(&self) -> ::core::option::Option<&dyn ::timber::Node> {
            ::core::option::Option::Some(self)
        }
    });
    target.parent_aware.push(parse_quote! {
        fn into_node(self: ::std::rc::Rc<Self>) -> ::core::option::Option<::timber::NodeRef> {
            ::core::option::Option::Some(self)
        }
    });
}

fn add_node_state(target: &mut TypeTarget, metadata: &TypeMetadata) {
    let state = state_field();
    target.node.push(parse_quote! {
        fn node_state(&self) -> &::timber::NodeState {
            &self.#state
        }
    });

    if let Some(base) = metadata.tracked_base() {
        let field = &base.field;
        target.node.push(parse_quote! {
            fn base_node(&self) -> ::core::option::Option<&dyn ::timber::Node> {
                ::core::option::Option::Some(&self.#field)
            }
        });
        target.node.push(parse_quote! {
            fn bind(&self, me: &::timber::ParentRef) -> bool {
                let bound = self.#state.bind(me.clone());
                ::timber::Node::bind(&self.#field, me);
                bound
            }
        });
    }
}

fn add_drop(target: &mut TypeTarget, metadata: &TypeMetadata) {
    if metadata.user_drop {
        log::warn!(
            "{} implements Drop itself; its field values prune it from their parents lazily",
            metadata.identity
        );
        return;
    }

    let detach = metadata
        .fields_of(&[FieldKind::Reference, FieldKind::Wrapped])
        .map(|field| {
            let name = &field.name;
            quote!(::timber::hooks::remove_parent(&*self.#name.borrow(), me);)
        })
        .collect::<Vec<_>>();
    if detach.is_empty() {
        return;
    }

    let state = state_field();
    target.drop = Some(parse_quote! {
        fn drop(&mut self) {
            let me = self.#state.me();
            #(#detach)*
        }
    });
}
