//! Attribute macro for weaving parent tracking into a module.
//!
//! # Usage
//!
//! ```ignore
//! #[timber_macros::weave(index = "nodes.index")]
//! mod tree {
//!     use std::rc::Rc;
//!
//!     #[timber(node)]
//!     pub struct Group {
//!         pub first: Option<Rc<Leaf>>,
//!         #[timber(wrap(timber::ListWrapper<Rc<Leaf>>))]
//!         pub rest: Vec<Rc<Leaf>>,
//!     }
//!
//!     #[timber(node, parent = Group)]
//!     pub struct Leaf {
//!         pub name: String,
//!         #[timber(weak)]
//!         pub owner: Option<Rc<Group>>,
//!     }
//! }
//! ```
//!
//! Index paths are relative to the crate's manifest directory. Without a
//! `path` argument the module is assumed to sit at `crate::<name>`.

use std::path::PathBuf;

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
    Ident, ItemMod, LitStr, Token,
};
use timber::weave::{AllowedParentIndex, TrackedTypes, WeaveOptions, Weaver};

/// Arguments to the weave attribute
#[derive(Default)]
struct WeaveArgs {
    index: Vec<String>,
    allowed_parents: Vec<String>,
    path: Option<String>,
}

enum WeaveArg {
    Index(String),
    AllowedParents(String),
    Path(String),
}

impl Parse for WeaveArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let ident: Ident = input.parse()?;
        input.parse::<Token![=]>()?;
        let lit: LitStr = input.parse()?;
        match ident.to_string().as_str() {
            "index" => Ok(WeaveArg::Index(lit.value())),
            "allowed_parents" => Ok(WeaveArg::AllowedParents(lit.value())),
            "path" => Ok(WeaveArg::Path(lit.value())),
            other => Err(syn::Error::new(
                ident.span(),
                format!("unknown weave argument `{other}`; expected `index`, `allowed_parents` or `path`"),
            )),
        }
    }
}

impl Parse for WeaveArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = WeaveArgs::default();
        for arg in Punctuated::<WeaveArg, Token![,]>::parse_terminated(input)? {
            match arg {
                WeaveArg::Index(path) => args.index.push(path),
                WeaveArg::AllowedParents(path) => args.allowed_parents.push(path),
                WeaveArg::Path(path) => args.path = Some(path),
            }
        }
        Ok(args)
    }
}

fn manifest_relative(paths: &[String]) -> Vec<PathBuf> {
    let root = std::env::var_os("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .unwrap_or_default();
    paths.iter().map(|path| root.join(path)).collect()
}

/// Weave parent tracking into every tracked struct of an inline module.
///
/// Structs are tracked when listed in one of the `index` files or marked
/// `#[timber(node)]`. A struct that cannot be woven is left unchanged and
/// reported as a compile error.
#[proc_macro_attribute]
pub fn weave(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as WeaveArgs);
    let mut module = parse_macro_input!(item as ItemMod);

    let Some((brace, items)) = module.content.take() else {
        return syn::Error::new_spanned(
            &module.ident,
            "#[weave] needs an inline module: `mod name { ... }`",
        )
        .to_compile_error()
        .into();
    };

    let module_path = args
        .path
        .clone()
        .unwrap_or_else(|| format!("crate::{}", module.ident));
    let options = WeaveOptions::new(module_path)
        .with_tracked(TrackedTypes::load(&manifest_relative(&args.index)))
        .with_allowed_parents(AllowedParentIndex::load(&manifest_relative(
            &args.allowed_parents,
        )));

    let outcome = Weaver::new(&options).weave_items(items);
    let errors = outcome.compile_errors();
    module.content = Some((brace, outcome.items));

    quote!(#module #errors).into()
}
