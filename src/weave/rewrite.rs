//! Syntax rewriting shared by the transformation stages.
//!
//! [`FieldAccessRewriter`] walks method bodies and replaces `self.f` reads,
//! `self.f = value` stores and illegal borrows according to an
//! [`AccessPolicy`]. [`LiteralRewriter`] adapts struct literals of woven
//! types to their new field storage.

use std::collections::BTreeMap;

use proc_macro2::{TokenStream, TokenTree};
use quote::{quote, ToTokens};
use syn::parse::ParseStream;
use syn::punctuated::Punctuated;
use syn::visit_mut::{self, VisitMut};
use syn::{
    parse_quote, Expr, ExprClosure, FieldValue, Ident, ImplItemFn, Item, ItemImpl, Macro, Member,
    ReturnType, Token,
};

use super::types;

/// Methods that would mutate a temporary copy once a read is rewritten.
const MUTATING_METHODS: &[&str] = &[
    "take",
    "replace",
    "insert",
    "get_or_insert",
    "get_or_insert_with",
    "as_mut",
    "as_deref_mut",
];

/// `f` for an expression written `self.f`.
pub fn self_field(expr: &Expr) -> Option<&Ident> {
    let Expr::Field(access) = expr else {
        return None;
    };
    let Expr::Path(base) = &*access.base else {
        return None;
    };
    if !base.path.is_ident("self") {
        return None;
    }
    match &access.member {
        Member::Named(ident) => Some(ident),
        Member::Unnamed(_) => None,
    }
}

// =================================================================================
// Field access rewriting
// =================================================================================

/// Where a store is being rewritten.
#[derive(Debug, Clone, Copy)]
pub struct StoreSite {
    /// The enclosing fn returns a `Result`, so a rejected store may be
    /// propagated with `?` instead of panicking.
    pub fallible: bool,
}

/// Decides how accesses to particular fields are rewritten.
pub trait AccessPolicy {
    /// Replacement for a read of `self.field`, or `None` to leave it alone.
    fn read(&self, field: &Ident) -> Option<Expr>;

    /// Replacement for `self.field = value`, or `None` to leave it alone.
    fn store(&self, field: &Ident, value: Expr, site: StoreSite) -> Option<Expr>;

    /// Hint appended to diagnostics about `field`.
    fn hint(&self, field: &Ident) -> String {
        format!("use the generated `set_{field}` accessor instead")
    }
}

pub struct FieldAccessRewriter<'p, P: AccessPolicy> {
    policy: &'p P,
    fallible: Vec<bool>,
    pub errors: Vec<syn::Error>,
}

impl<'p, P: AccessPolicy> FieldAccessRewriter<'p, P> {
    pub fn new(policy: &'p P) -> Self {
        FieldAccessRewriter {
            policy,
            fallible: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Rewrite every method of `item`.
    pub fn rewrite_impl(&mut self, item: &mut ItemImpl) {
        self.visit_item_impl_mut(item);
    }

    /// Fold the collected diagnostics into one error.
    pub fn finish(self) -> syn::Result<()> {
        let mut errors = self.errors.into_iter();
        match errors.next() {
            None => Ok(()),
            Some(mut first) => {
                for err in errors {
                    first.combine(err);
                }
                Err(first)
            }
        }
    }

    fn site(&self) -> StoreSite {
        StoreSite {
            fallible: self.fallible.last().copied().unwrap_or(false),
        }
    }

    fn handles(&self, field: &Ident) -> bool {
        self.policy.read(field).is_some()
    }

    fn rewrite_store(&mut self, expr: &mut Expr) -> Option<Expr> {
        let Expr::Assign(assign) = expr else {
            return None;
        };
        let field = self_field(&assign.left)?.clone();
        if !self.handles(&field) {
            return None;
        }
        self.visit_expr_mut(&mut assign.right);
        let value = (*assign.right).clone();
        self.policy.store(&field, value, self.site())
    }

    fn check_borrow(&mut self, expr: &Expr) -> bool {
        match expr {
            Expr::Reference(reference) if reference.mutability.is_some() => {
                if let Some(field) = self_field(&reference.expr) {
                    if self.handles(field) {
                        let hint = self.policy.hint(field);
                        self.errors.push(syn::Error::new_spanned(
                            reference,
                            format!("field `{field}` of a tracked type cannot be borrowed mutably; {hint}"),
                        ));
                        return true;
                    }
                }
                false
            }
            Expr::MethodCall(call) if MUTATING_METHODS.contains(&call.method.to_string().as_str()) => {
                if let Some(field) = self_field(&call.receiver) {
                    if self.handles(field) {
                        let hint = self.policy.hint(field);
                        self.errors.push(syn::Error::new_spanned(
                            call,
                            format!(
                                "`{}` would modify a copy of tracked field `{field}`; {hint}",
                                call.method
                            ),
                        ));
                        return true;
                    }
                }
                false
            }
            _ => false,
        }
    }
}

impl<'p, P: AccessPolicy> VisitMut for FieldAccessRewriter<'p, P> {
    fn visit_impl_item_fn_mut(&mut self, method: &mut ImplItemFn) {
        self.fallible.push(returns_result(&method.sig.output));
        visit_mut::visit_impl_item_fn_mut(self, method);
        self.fallible.pop();
    }

    fn visit_expr_closure_mut(&mut self, closure: &mut ExprClosure) {
        self.fallible.push(false);
        visit_mut::visit_expr_closure_mut(self, closure);
        self.fallible.pop();
    }

    fn visit_item_mut(&mut self, _item: &mut Item) {
        // Nested items have their own `self`.
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if self.check_borrow(expr) {
            return;
        }
        if let Some(replacement) = self.rewrite_store(expr) {
            *expr = replacement;
            return;
        }
        if let Some(field) = self_field(expr) {
            if let Some(replacement) = self.policy.read(field) {
                *expr = replacement;
                return;
            }
        }
        visit_mut::visit_expr_mut(self, expr);
    }

    fn visit_macro_mut(&mut self, mac: &mut Macro) {
        if !visit_macro_body(mac, |expr| self.visit_expr_mut(expr)) && mentions_self(mac.tokens.clone()) {
            log::warn!(
                "body of `{}!` is not a list of expressions; field accesses inside it are left as written",
                mac.path.to_token_stream()
            );
        }
    }
}

/// Expressions inside a macro body: either `a, b, c` or the repeat form
/// `value; len`.
enum MacroBody {
    List(Punctuated<Expr, Token![,]>),
    Repeat { value: Expr, semi: Token![;], len: Expr },
}

impl MacroBody {
    fn parse(mac: &Macro) -> Option<Self> {
        if let Ok(list) = mac.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
            return Some(MacroBody::List(list));
        }
        mac.parse_body_with(|input: ParseStream| -> syn::Result<Self> {
            Ok(MacroBody::Repeat {
                value: input.parse()?,
                semi: input.parse()?,
                len: input.parse()?,
            })
        })
        .ok()
    }

    fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            MacroBody::List(list) => list.iter_mut().collect(),
            MacroBody::Repeat { value, len, .. } => vec![value, len],
        }
    }

    fn into_tokens(self) -> TokenStream {
        match self {
            MacroBody::List(list) => list.into_token_stream(),
            MacroBody::Repeat { value, semi, len } => quote!(#value #semi #len),
        }
    }
}

/// Run `visit` over every expression of a macro body and write the result
/// back. Returns `false` if the body could not be parsed.
fn visit_macro_body(mac: &mut Macro, mut visit: impl FnMut(&mut Expr)) -> bool {
    let Some(mut body) = MacroBody::parse(mac) else {
        return false;
    };
    for expr in body.exprs_mut() {
        visit(expr);
    }
    mac.tokens = body.into_tokens();
    true
}

fn mentions_self(tokens: TokenStream) -> bool {
    tokens.into_iter().any(|tree| match tree {
        TokenTree::Ident(ident) => ident == "self",
        TokenTree::Group(group) => mentions_self(group.stream()),
        _ => false,
    })
}

fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Default => false,
        ReturnType::Type(_, ty) => types::last_ident(ty).as_deref() == Some("Result"),
    }
}

// =================================================================================
// Struct literal rewriting
// =================================================================================

/// How a field value in a struct literal is adapted to its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralWrap {
    Field,
    Substitute { optional: bool },
    Weak,
}

impl LiteralWrap {
    fn apply(self, value: &Expr) -> Expr {
        match self {
            LiteralWrap::Field => parse_quote!(::timber::Field::new(#value)),
            LiteralWrap::Substitute { optional: false } => {
                parse_quote!(::timber::Field::new(::timber::Substitute::Bare(#value)))
            }
            LiteralWrap::Substitute { optional: true } => parse_quote!(
                ::timber::Field::new(::core::option::Option::map(#value, ::timber::Substitute::Bare))
            ),
            LiteralWrap::Weak => parse_quote!(::timber::Field::new(::timber::WeakRef::from(#value))),
        }
    }
}

/// Literal rules per woven type name.
pub type LiteralRules = BTreeMap<String, BTreeMap<String, LiteralWrap>>;

/// Name of the hidden per-node state field.
pub fn state_field() -> Ident {
    Ident::new("__timber_state", proc_macro2::Span::call_site())
}

pub struct LiteralRewriter<'r> {
    rules: &'r LiteralRules,
    self_types: Vec<Option<String>>,
}

impl<'r> LiteralRewriter<'r> {
    pub fn new(rules: &'r LiteralRules) -> Self {
        LiteralRewriter {
            rules,
            self_types: Vec::new(),
        }
    }

    pub fn rewrite_items(&mut self, items: &mut [Item]) {
        for item in items {
            self.visit_item_mut(item);
        }
    }

    fn rules_for(&self, path: &syn::Path) -> Option<&'r BTreeMap<String, LiteralWrap>> {
        let name = path.segments.last()?.ident.to_string();
        let name = if name == "Self" {
            self.self_types.last().cloned().flatten()?
        } else {
            name
        };
        self.rules.get(&name)
    }
}

impl<'r> VisitMut for LiteralRewriter<'r> {
    fn visit_item_impl_mut(&mut self, item: &mut ItemImpl) {
        self.self_types.push(types::last_ident(&item.self_ty));
        visit_mut::visit_item_impl_mut(self, item);
        self.self_types.pop();
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        visit_mut::visit_expr_mut(self, expr);

        let Expr::Struct(literal) = expr else {
            return;
        };
        let Some(rules) = self.rules_for(&literal.path) else {
            return;
        };

        for field in literal.fields.iter_mut() {
            let Member::Named(name) = &field.member else {
                continue;
            };
            if let Some(wrap) = rules.get(&name.to_string()) {
                field.expr = wrap.apply(&field.expr);
                field.colon_token.get_or_insert_with(Default::default);
            }
        }
        if literal.rest.is_none() {
            let state = state_field();
            let value: FieldValue = parse_quote!(#state: ::timber::NodeState::new());
            literal.fields.push(value);
        }
    }

    fn visit_macro_mut(&mut self, mac: &mut Macro) {
        visit_macro_body(mac, |expr| self.visit_expr_mut(expr));
    }
}
