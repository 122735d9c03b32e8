use syn::spanned::Spanned;
use syn::ItemStruct;

use super::{is_reference_type, named_fields, IndexContext, Indexer};
use crate::weave::markers::{parse_markers, Marker};
use crate::weave::metadata::{FieldInfo, TypeMetadata};

/// Records the declared fields in order and classifies each one.
pub struct FieldsIndexer;

impl Indexer for FieldsIndexer {
    fn name(&self) -> &'static str {
        "fields"
    }

    fn index(
        &self,
        item: &ItemStruct,
        _ctx: &IndexContext<'_>,
        metadata: &mut TypeMetadata,
    ) -> syn::Result<()> {
        for field in &named_fields(item)?.named {
            let Some(name) = field.ident.clone() else {
                continue;
            };
            if name.to_string().starts_with("__timber") {
                return Err(syn::Error::new_spanned(
                    &name,
                    "field names starting with `__timber` are reserved",
                ));
            }
            let markers = parse_markers(&field.attrs)?;
            if markers.iter().any(|marker| matches!(marker, Marker::Base)) {
                continue;
            }
            if let Some(marker) = markers
                .iter()
                .find(|marker| matches!(marker, Marker::Node | Marker::Parent(_)))
            {
                let what = if matches!(marker, Marker::Node) { "node" } else { "parent" };
                return Err(syn::Error::new_spanned(
                    field,
                    format!("`{what}` is a type marker and cannot be placed on a field"),
                ));
            }

            metadata.fields.push(FieldInfo {
                reference: is_reference_type(&field.ty),
                span: field.span(),
                name,
                ty: field.ty.clone(),
                vis: field.vis.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::weave::index_file::{AllowedParentIndex, TrackedTypes};
    use crate::weave::metadata::FieldKind;
    use syn::parse_quote;

    #[test]
    fn test_fields_keep_declaration_order() {
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
        let item: ItemStruct = parse_quote! {
            struct Group {
                name: String,
                first: Option<Rc<Leaf>>,
                count: usize,
                second: Rc<dyn Shape>,
            }
        };
        let mut metadata = TypeMetadata::new(item.ident.clone(), "crate::Group".into());
        FieldsIndexer.index(&item, &ctx, &mut metadata).unwrap();

        let kinds: Vec<_> = metadata.fields.iter().map(|field| metadata.kind(field)).collect();
        assert_eq!(
            kinds,
            [FieldKind::Value, FieldKind::Reference, FieldKind::Value, FieldKind::Reference]
        );
    }

    #[test]
    fn test_tuple_structs_are_rejected() {
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
        let item: ItemStruct = parse_quote!(struct Pair(Rc<Leaf>, Rc<Leaf>););
        let mut metadata = TypeMetadata::new(item.ident.clone(), "crate::Pair".into());
        assert!(FieldsIndexer.index(&item, &ctx, &mut metadata).is_err());
    }
}
