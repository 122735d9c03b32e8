use syn::{ItemStruct, Type};

use super::{named_fields, IndexContext, Indexer};
use crate::weave::markers::{parse_markers, Marker};
use crate::weave::metadata::{BaseInfo, TypeMetadata};

/// Records the base field, the allowed parents and the derive surface.
pub struct ClassTypesIndexer;

impl Indexer for ClassTypesIndexer {
    fn name(&self) -> &'static str {
        "class-types"
    }

    fn index(
        &self,
        item: &ItemStruct,
        ctx: &IndexContext<'_>,
        metadata: &mut TypeMetadata,
    ) -> syn::Result<()> {
        if !item.generics.params.is_empty() {
            return Err(syn::Error::new_spanned(
                &item.generics,
                "tracked types cannot have generic parameters",
            ));
        }

        for marker in parse_markers(&item.attrs)? {
            match marker {
                Marker::Parent(ty) => metadata.allowed_parents.push(ty),
                Marker::Node => {}
                _ => {
                    return Err(syn::Error::new_spanned(
                        &item.ident,
                        "only `node` and `parent` markers are allowed on a type",
                    ))
                }
            }
        }

        for identity in ctx.allowed_parents.allowed_for(&metadata.identity) {
            match syn::parse_str::<Type>(identity) {
                Ok(ty) => metadata.allowed_parents.push(ty),
                Err(err) => log::warn!(
                    "ignoring allowed parent {identity} of {}: {err}",
                    metadata.identity
                ),
            }
        }

        for field in &named_fields(item)?.named {
            let is_base = parse_markers(&field.attrs)?
                .iter()
                .any(|marker| matches!(marker, Marker::Base));
            if !is_base {
                continue;
            }
            if metadata.base.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "a tracked type may embed at most one `#[timber(base)]` field",
                ));
            }
            let Some(ident) = field.ident.clone() else {
                continue;
            };
            metadata.base = Some(BaseInfo {
                field: ident,
                ty: field.ty.clone(),
                tracked: ctx.is_tracked_type(&field.ty),
            });
        }

        metadata.has_serde = derives_serde(item);
        Ok(())
    }
}

/// Whether the struct derives `Serialize` or `Deserialize`.
fn derives_serde(item: &ItemStruct) -> bool {
    let mut found = false;
    for attr in item.attrs.iter().filter(|attr| attr.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(last) = meta.path.segments.last() {
                if last.ident == "Serialize" || last.ident == "Deserialize" {
                    found = true;
                }
            }
            Ok(())
        });
    }
    found
}
