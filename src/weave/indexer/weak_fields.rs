use syn::ItemStruct;

use super::{named_fields, IndexContext, Indexer};
use crate::weave::markers::{parse_markers, Marker};
use crate::weave::metadata::{TypeMetadata, WeakField};
use crate::weave::types;

/// Records `#[timber(weak)]` fields. A weak field must be `Option<Rc<T>>`.
pub struct WeakFieldsIndexer;

impl Indexer for WeakFieldsIndexer {
    fn name(&self) -> &'static str {
        "weak-fields"
    }

    fn index(
        &self,
        item: &ItemStruct,
        _ctx: &IndexContext<'_>,
        metadata: &mut TypeMetadata,
    ) -> syn::Result<()> {
        for field in &named_fields(item)?.named {
            let markers = parse_markers(&field.attrs)?;
            if !markers.iter().any(|marker| matches!(marker, Marker::Weak)) {
                continue;
            }
            let Some(name) = &field.ident else {
                continue;
            };

            let target = types::option_inner(&field.ty)
                .and_then(types::rc_inner)
                .ok_or_else(|| {
                    syn::Error::new_spanned(
                        &field.ty,
                        "weak fields must be declared as `Option<Rc<T>>`",
                    )
                })?;
            metadata.weak_fields.insert(
                name.to_string(),
                WeakField {
                    target: target.clone(),
                },
            );
        }
        Ok(())
    }
}
