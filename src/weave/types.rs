//! Syntactic classification of field types.
//!
//! The engine only sees token trees, so every decision here is made from the
//! written type. A field is a *reference* when it holds `Rc<T>` or
//! `Option<Rc<T>>` and `T` is not a primitive. Everything else is a value and
//! stays untouched.

use syn::{GenericArgument, PathArguments, Type, TypeParamBound};

const SCALARS: &[&str] = &[
    "bool", "char", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128",
    "usize", "f32", "f64", "str", "String", "PathBuf", "Path", "OsString", "OsStr",
];

/// Std containers that are primitive exactly when all their type arguments are.
const TRANSPARENT: &[&str] = &[
    "Vec", "VecDeque", "HashMap", "HashSet", "BTreeMap", "BTreeSet", "Option", "Box", "Cell",
    "RefCell",
];

/// Trait objects that can never be parent-aware.
const INERT_TRAITS: &[&str] = &["Fn", "FnMut", "FnOnce", "Any", "Error", "Debug", "Display"];

/// Whether `ty` behaves like a Java primitive: never parent-aware, never
/// containing anything parent-aware.
pub fn is_primitive(ty: &Type) -> bool {
    match ty {
        Type::Path(path) if path.qself.is_none() => {
            let Some(segment) = path.path.segments.last() else {
                return false;
            };
            let name = segment.ident.to_string();
            if SCALARS.contains(&name.as_str()) {
                return matches!(segment.arguments, PathArguments::None);
            }
            if name == "Rc" || name == "Arc" {
                return type_args(ty).iter().all(|arg| is_primitive(arg));
            }
            TRANSPARENT.contains(&name.as_str())
                && type_args(ty).iter().all(|arg| is_primitive(arg))
        }
        Type::Reference(reference) => is_primitive(&reference.elem),
        Type::Tuple(tuple) => tuple.elems.iter().all(is_primitive),
        Type::Array(array) => is_primitive(&array.elem),
        Type::Slice(slice) => is_primitive(&slice.elem),
        Type::Paren(paren) => is_primitive(&paren.elem),
        Type::Group(group) => is_primitive(&group.elem),
        Type::TraitObject(object) => object.bounds.iter().all(|bound| match bound {
            TypeParamBound::Trait(bound) => bound
                .path
                .segments
                .last()
                .map_or(false, |segment| INERT_TRAITS.contains(&segment.ident.to_string().as_str())),
            _ => true,
        }),
        Type::BareFn(_) | Type::Never(_) | Type::Ptr(_) => true,
        _ => false,
    }
}

/// The last path segment's name, if `ty` is a plain path type.
pub fn last_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) if path.qself.is_none() => {
            path.path.segments.last().map(|segment| segment.ident.to_string())
        }
        Type::Group(group) => last_ident(&group.elem),
        Type::Paren(paren) => last_ident(&paren.elem),
        _ => None,
    }
}

/// The generic type arguments of the last path segment.
pub fn type_args(ty: &Type) -> Vec<&Type> {
    let Type::Path(path) = ty else {
        return Vec::new();
    };
    let Some(segment) = path.path.segments.last() else {
        return Vec::new();
    };
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// `X` for a type written `Wrapper<X>` whose last segment is `wrapper`.
pub fn single_arg<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if last_ident(ty).as_deref() != Some(wrapper) {
        return None;
    }
    match type_args(ty).as_slice() {
        [inner] => Some(inner),
        _ => None,
    }
}

pub fn option_inner(ty: &Type) -> Option<&Type> {
    single_arg(ty, "Option")
}

pub fn rc_inner(ty: &Type) -> Option<&Type> {
    single_arg(ty, "Rc")
}

/// The pointee of `Rc<T>` or `Option<Rc<T>>`.
pub fn shared_pointee(ty: &Type) -> Option<&Type> {
    rc_inner(ty).or_else(|| option_inner(ty).and_then(rc_inner))
}

/// Whether a field of type `ty` is a tracked reference.
pub fn is_reference(ty: &Type) -> bool {
    shared_pointee(ty).map_or(false, |pointee| !is_primitive(pointee))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_scalars_and_strings_are_primitive() {
        assert!(is_primitive(&parse_quote!(u32)));
        assert!(is_primitive(&parse_quote!(String)));
        assert!(is_primitive(&parse_quote!(&'static str)));
        assert!(is_primitive(&parse_quote!(Option<Vec<(i32, f64)>>)));
        assert!(is_primitive(&parse_quote!(Rc<str>)));
        assert!(is_primitive(&parse_quote!(Box<dyn Fn(u8) -> u8>)));
    }

    #[test]
    fn test_user_types_are_not_primitive() {
        assert!(!is_primitive(&parse_quote!(Leaf)));
        assert!(!is_primitive(&parse_quote!(Vec<Rc<Leaf>>)));
        assert!(!is_primitive(&parse_quote!(dyn Shape)));
    }

    #[test]
    fn test_reference_fields() {
        assert!(is_reference(&parse_quote!(Rc<Leaf>)));
        assert!(is_reference(&parse_quote!(Option<Rc<dyn Shape>>)));
        assert!(is_reference(&parse_quote!(std::rc::Rc<crate::tree::Leaf>)));
        assert!(!is_reference(&parse_quote!(Rc<String>)));
        assert!(!is_reference(&parse_quote!(Leaf)));
        assert!(!is_reference(&parse_quote!(Vec<Rc<Leaf>>)));
    }

    #[test]
    fn test_shared_pointee() {
        let ty: Type = parse_quote!(Option<Rc<Group>>);
        assert_eq!(last_ident(shared_pointee(&ty).unwrap()).as_deref(), Some("Group"));
        assert!(shared_pointee(&parse_quote!(Option<Group>)).is_none());
    }
}
