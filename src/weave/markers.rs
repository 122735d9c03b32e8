//! `#[timber(...)]` marker attributes.
//!
//! Type markers: `node`, `parent = Type` (repeatable).
//! Field markers: `base`, `weak`, `wrap(Wrapper)`, `wrap(Wrapper, arg = Type)`.

use proc_macro2::Span;
use syn::spanned::Spanned;
use syn::{Attribute, Ident, Token, Type};

pub const MARKER: &str = "timber";

#[derive(Debug, Clone)]
pub enum Marker {
    Node,
    Parent(Type),
    Base,
    Weak,
    Wrap {
        wrapper: Type,
        arg: Option<Type>,
        span: Span,
    },
}

pub fn is_marker(attr: &Attribute) -> bool {
    attr.path().is_ident(MARKER)
}

/// Parse every marker in `attrs`. Non-timber attributes are ignored.
pub fn parse_markers(attrs: &[Attribute]) -> syn::Result<Vec<Marker>> {
    let mut markers = Vec::new();
    for attr in attrs.iter().filter(|attr| is_marker(attr)) {
        let span = attr.span();
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("node") {
                markers.push(Marker::Node);
            } else if meta.path.is_ident("base") {
                markers.push(Marker::Base);
            } else if meta.path.is_ident("weak") {
                markers.push(Marker::Weak);
            } else if meta.path.is_ident("parent") {
                let ty: Type = meta.value()?.parse()?;
                markers.push(Marker::Parent(ty));
            } else if meta.path.is_ident("wrap") {
                let content;
                syn::parenthesized!(content in meta.input);
                let wrapper: Type = content.parse()?;
                let mut arg = None;
                if content.peek(Token![,]) {
                    content.parse::<Token![,]>()?;
                    if !content.is_empty() {
                        let key: Ident = content.parse()?;
                        if key != "arg" {
                            return Err(syn::Error::new(
                                key.span(),
                                "expected `arg = Type` after the wrapper type",
                            ));
                        }
                        content.parse::<Token![=]>()?;
                        arg = Some(content.parse::<Type>()?);
                    }
                }
                if !content.is_empty() {
                    return Err(content.error("unexpected tokens in `wrap(...)`"));
                }
                markers.push(Marker::Wrap { wrapper, arg, span });
            } else {
                return Err(meta.error(
                    "unknown timber marker; expected `node`, `parent`, `base`, `weak` or `wrap`",
                ));
            }
            Ok(())
        })?;
    }
    Ok(markers)
}

pub fn has_marker(attrs: &[Attribute], matches: impl Fn(&Marker) -> bool) -> bool {
    parse_markers(attrs).map_or(false, |markers| markers.iter().any(matches))
}

/// Remove every `#[timber(...)]` attribute. Returns whether any was removed.
pub fn strip_markers(attrs: &mut Vec<Attribute>) -> bool {
    let before = attrs.len();
    attrs.retain(|attr| !is_marker(attr));
    attrs.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_parse_wrap_with_arg() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[timber(wrap(ListWrapper<Rc<Leaf>>, arg = Vec<Rc<Leaf>>))])];
        let markers = parse_markers(&attrs).unwrap();
        assert!(matches!(&markers[..], [Marker::Wrap { arg: Some(_), .. }]));
    }

    #[test]
    fn test_parse_combined_markers() {
        let attrs: Vec<Attribute> = vec![
            parse_quote!(#[derive(Debug)]),
            parse_quote!(#[timber(node, parent = Group, parent = crate::tree::Root)]),
        ];
        let markers = parse_markers(&attrs).unwrap();
        assert_eq!(markers.len(), 3);
        assert!(matches!(markers[0], Marker::Node));
        assert!(matches!(markers[2], Marker::Parent(_)));
    }

    #[test]
    fn test_unknown_marker_is_rejected() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[timber(strong)])];
        assert!(parse_markers(&attrs).is_err());
    }

    #[test]
    fn test_strip_keeps_other_attributes() {
        let mut attrs: Vec<Attribute> = vec![parse_quote!(#[timber(weak)]), parse_quote!(#[serde(default)])];
        assert!(strip_markers(&mut attrs));
        assert_eq!(attrs.len(), 1);
    }
}
