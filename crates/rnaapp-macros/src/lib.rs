use proc_macro::TokenStream;

use quote::quote;
use syn::{Attribute, Expr, ExprPath, ItemStruct, Meta, Token, parse::Parser, spanned::Spanned};

/// Declares a form action handler.
///
/// ```ignore
/// #[Action(id = ActionId::Submit)]
/// pub struct Submit;
///
/// impl Submit {
///     fn run<S: ParamStore, C: Connector>(
///         ctrl: &mut Controller<S, C>,
///         dialogs: &mut dyn Dialogs,
///     ) -> Result<()> { ... }
/// }
/// ```
///
/// Generates `ID`, an `exec` entry point that reports any error from `run`
/// through `Dialogs::error`, and `register` for the action registry.
#[proc_macro_attribute]
#[allow(non_snake_case)]
pub fn Action(attr: TokenStream, item: TokenStream) -> TokenStream {
    match action_impl(attr, item) {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expr_path(expr: &Expr) -> syn::Result<syn::Path> {
    match expr {
        Expr::Path(ExprPath { path, .. }) => Ok(path.clone()),
        _ => Err(syn::Error::new(
            expr.span(),
            "expected path (e.g. ActionId::Submit)",
        )),
    }
}

fn drop_our_attrs(attrs: &[Attribute]) -> Vec<Attribute> {
    attrs
        .iter()
        .filter(|a| {
            let Meta::Path(p) = &a.meta else {
                return true;
            };
            let Some(ident) = p.get_ident() else {
                return true;
            };
            ident != "Action"
        })
        .cloned()
        .collect()
}

fn action_impl(attr: TokenStream, item: TokenStream) -> syn::Result<proc_macro2::TokenStream> {
    let mut st: ItemStruct = syn::parse(item)?;
    st.attrs = drop_our_attrs(&st.attrs);
    let struct_ident = st.ident.clone();

    let parser = syn::punctuated::Punctuated::<Meta, Token![,]>::parse_terminated;
    let metas = parser.parse(attr)?;

    let mut id: Option<syn::Path> = None;

    for m in metas {
        let Meta::NameValue(nv) = m else {
            return Err(syn::Error::new(m.span(), "expected key = value"));
        };
        let Some(key) = nv.path.get_ident().map(|i| i.to_string()) else {
            return Err(syn::Error::new(nv.path.span(), "expected ident key"));
        };
        match key.as_str() {
            "id" => id = Some(expr_path(&nv.value)?),
            other => {
                return Err(syn::Error::new(
                    nv.path.span(),
                    format!("unknown Action attribute key '{other}'"),
                ));
            }
        }
    }

    let id = id.ok_or_else(|| syn::Error::new(struct_ident.span(), "Action: missing id"))?;

    let expanded = quote! {
        #st

        impl #struct_ident {
            pub const ID: crate::params::ActionId = #id;

            pub fn exec<S, C>(
                ctrl: &mut crate::controller::Controller<S, C>,
                dialogs: &mut dyn crate::ui::Dialogs,
            )
            where
                S: crate::paramfile::ParamStore,
                C: crate::remote::Connector,
            {
                let _span = ::tracing::info_span!("action", id = %Self::ID).entered();
                ::tracing::debug!("action started");

                // Actions are all-or-nothing: the first error ends the action
                // and is shown to the user as a single message.
                match Self::run(ctrl, dialogs) {
                    Ok(()) => ::tracing::debug!("action finished"),
                    Err(e) => {
                        ::tracing::warn!(error = %e, "action failed");
                        dialogs.error(&e.to_string());
                    }
                }
            }

            pub fn register<S, C>(
                reg: &mut crate::controller::ActionRegistry<S, C>,
            ) -> crate::Result<()>
            where
                S: crate::paramfile::ParamStore,
                C: crate::remote::Connector,
            {
                reg.add(Self::ID, Self::exec::<S, C>)
            }
        }
    };

    Ok(expanded)
}
