use quote::ToTokens;
use syn::ItemStruct;

use super::{named_fields, IndexContext, Indexer};
use crate::error::Error;
use crate::weave::markers::{parse_markers, Marker};
use crate::weave::metadata::{TypeMetadata, WrapSpec};
use crate::weave::types;

/// Records `#[timber(wrap(...))]` fields together with their wrapper type and
/// constructor argument type.
pub struct WrapSubstitutedFieldsIndexer;

impl Indexer for WrapSubstitutedFieldsIndexer {
    fn name(&self) -> &'static str {
        "wrap-substituted-fields"
    }

    fn index(
        &self,
        item: &ItemStruct,
        _ctx: &IndexContext<'_>,
        metadata: &mut TypeMetadata,
    ) -> syn::Result<()> {
        for field in &named_fields(item)?.named {
            let Some(name) = &field.ident else {
                continue;
            };
            let markers = parse_markers(&field.attrs)?;
            let weak = markers.iter().any(|marker| matches!(marker, Marker::Weak));

            for marker in markers {
                let Marker::Wrap { wrapper, arg, span } = marker else {
                    continue;
                };
                let construction_error = |reason: &str| {
                    let err = Error::WrapperConstruction {
                        wrapper: render(&wrapper),
                        expected: render(arg.as_ref().unwrap_or(&field.ty)),
                        field: name.to_string(),
                    };
                    syn::Error::new(span, format!("{err} ({reason})"))
                };

                if weak {
                    return Err(construction_error("a weak field cannot be wrap-substituted"));
                }
                if metadata.wrapped_fields.contains_key(&name.to_string()) {
                    return Err(construction_error("the field already has a wrapper"));
                }

                let (bare, optional) = match types::option_inner(&field.ty) {
                    Some(inner) => (inner.clone(), true),
                    None => (field.ty.clone(), false),
                };
                if types::rc_inner(&bare).is_some() {
                    return Err(construction_error("shared `Rc` values cannot be substituted"));
                }

                metadata.wrapped_fields.insert(
                    name.to_string(),
                    WrapSpec {
                        wrapper,
                        bare,
                        arg,
                        optional,
                        span,
                    },
                );
            }
        }
        Ok(())
    }
}

fn render(tokens: &impl ToTokens) -> String {
    tokens.to_token_stream().to_string().replace(' ', "")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::weave::index_file::{AllowedParentIndex, TrackedTypes};
    use syn::parse_quote;

    fn run(item: ItemStruct) -> syn::Result<TypeMetadata> {
        let tracked = TrackedTypes::new();
        let allowed = AllowedParentIndex::new();
        let local = BTreeSet::new();
        let ctx = IndexContext {
            module_path: "crate",
            tracked: &tracked,
            allowed_parents: &allowed,
            local_nodes: &local,
            impls: &[],
        };
        let mut metadata = TypeMetadata::new(item.ident.clone(), "crate::Group".into());
        WrapSubstitutedFieldsIndexer.index(&item, &ctx, &mut metadata)?;
        Ok(metadata)
    }

    #[test]
    fn test_optional_container_is_unwrapped() {
        let metadata = run(parse_quote! {
            struct Group {
                #[timber(wrap(ListWrapper<Rc<Leaf>>))]
                leaves: Option<Vec<Rc<Leaf>>>,
            }
        })
        .unwrap();
        let spec = &metadata.wrapped_fields["leaves"];
        assert!(spec.optional);
        assert_eq!(render(&spec.bare), "Vec<Rc<Leaf>>");
        assert_eq!(render(spec.ctor_arg()), "Vec<Rc<Leaf>>");
    }

    #[test]
    fn test_weak_wrap_conflict_names_the_field() {
        let err = run(parse_quote! {
            struct Group {
                #[timber(weak, wrap(ListWrapper<Rc<Leaf>>))]
                owner: Option<Rc<Group>>,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("'owner'"));
    }
}
