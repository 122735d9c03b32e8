use std::collections::{BTreeMap, BTreeSet};

use proc_macro2::Span;
use quote::ToTokens;
use serde::Serialize;
use syn::{Ident, Type, Visibility};

// =================================================================================
// Per-type metadata
// =================================================================================

/// Structural facts about one tracked type, gathered before any rewriting.
///
/// Each indexer fills a disjoint part of the record. The record lives for one
/// weaving invocation only.
#[derive(Debug, Clone)]
pub struct TypeMetadata {
    pub ident: Ident,
    /// Fully qualified identity, e.g. `crate::shapes::Group`.
    pub identity: String,
    pub base: Option<BaseInfo>,
    /// Named fields in declaration order, the base field excluded.
    pub fields: Vec<FieldInfo>,
    pub weak_fields: BTreeMap<String, WeakField>,
    pub wrapped_fields: BTreeMap<String, WrapSpec>,
    pub allowed_parents: Vec<Type>,
    pub custom_after_unmarshal: bool,
    pub user_drop: bool,
    pub user_methods: BTreeSet<String>,
    pub has_serde: bool,
}

/// The embedded "superclass" of a tracked type.
#[derive(Debug, Clone)]
pub struct BaseInfo {
    pub field: Ident,
    pub ty: Type,
    pub tracked: bool,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: Ident,
    pub ty: Type,
    pub vis: Visibility,
    /// Whether the field holds a shared reference that may be parent-aware.
    pub reference: bool,
    pub span: Span,
}

/// A weak field, declared as `Option<Rc<target>>`.
#[derive(Debug, Clone)]
pub struct WeakField {
    pub target: Type,
}

/// A wrap-substitute field and how to build its wrapper.
#[derive(Debug, Clone)]
pub struct WrapSpec {
    pub wrapper: Type,
    /// The bare container type; the declared type with any `Option` removed.
    pub bare: Type,
    /// Constructor argument type; defaults to `bare`.
    pub arg: Option<Type>,
    pub optional: bool,
    pub span: Span,
}

impl WrapSpec {
    pub fn ctor_arg(&self) -> &Type {
        self.arg.as_ref().unwrap_or(&self.bare)
    }
}

/// How generated code treats a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Left untouched: scalars, strings, owned values.
    Value,
    /// A shared reference with tracked stores.
    Reference,
    /// A container substituted by a wrapper.
    Wrapped,
    /// A back-reference cleared lazily on read.
    Weak,
}

impl TypeMetadata {
    pub fn new(ident: Ident, identity: String) -> Self {
        TypeMetadata {
            ident,
            identity,
            base: None,
            fields: Vec::new(),
            weak_fields: BTreeMap::new(),
            wrapped_fields: BTreeMap::new(),
            allowed_parents: Vec::new(),
            custom_after_unmarshal: false,
            user_drop: false,
            user_methods: BTreeSet::new(),
            has_serde: false,
        }
    }

    pub fn kind(&self, field: &FieldInfo) -> FieldKind {
        let name = field.name.to_string();
        if self.weak_fields.contains_key(&name) {
            FieldKind::Weak
        } else if self.wrapped_fields.contains_key(&name) {
            FieldKind::Wrapped
        } else if field.reference {
            FieldKind::Reference
        } else {
            FieldKind::Value
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Fields of the given kinds, in declaration order.
    pub fn fields_of<'a>(
        &'a self,
        kinds: &'a [FieldKind],
    ) -> impl Iterator<Item = &'a FieldInfo> + 'a {
        self.fields
            .iter()
            .filter(move |field| kinds.contains(&self.kind(field)))
    }

    pub fn tracked_base(&self) -> Option<&BaseInfo> {
        self.base.as_ref().filter(|base| base.tracked)
    }

    /// Whether any own field needs registering after construction or
    /// deserialization.
    pub fn has_registered_fields(&self) -> bool {
        self.fields_of(&[FieldKind::Reference, FieldKind::Wrapped])
            .next()
            .is_some()
    }

    pub fn report(&self) -> MetadataReport {
        MetadataReport {
            identity: self.identity.clone(),
            base: self.base.as_ref().map(|base| BaseReport {
                field: base.field.to_string(),
                ty: render(&base.ty),
                tracked: base.tracked,
            }),
            fields: self
                .fields
                .iter()
                .map(|field| FieldReport {
                    name: field.name.to_string(),
                    ty: render(&field.ty),
                    kind: format!("{:?}", self.kind(field)).to_lowercase(),
                })
                .collect(),
            weak_fields: self.weak_fields.keys().cloned().collect(),
            wrapped_fields: self
                .wrapped_fields
                .iter()
                .map(|(name, spec)| {
                    (
                        name.clone(),
                        WrapReport {
                            wrapper: render(&spec.wrapper),
                            arg: render(spec.ctor_arg()),
                        },
                    )
                })
                .collect(),
            allowed_parents: self.allowed_parents.iter().map(render).collect(),
            custom_after_unmarshal: self.custom_after_unmarshal,
        }
    }
}

fn render(ty: &Type) -> String {
    ty.to_token_stream().to_string().replace(' ', "")
}

// =================================================================================
// Serializable summary
// =================================================================================

/// JSON-friendly view of a [`TypeMetadata`], printed by `timber inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataReport {
    pub identity: String,
    pub base: Option<BaseReport>,
    pub fields: Vec<FieldReport>,
    pub weak_fields: Vec<String>,
    pub wrapped_fields: BTreeMap<String, WrapReport>,
    pub allowed_parents: Vec<String>,
    pub custom_after_unmarshal: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BaseReport {
    pub field: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub tracked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldReport {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WrapReport {
    pub wrapper: String,
    pub arg: String,
}
