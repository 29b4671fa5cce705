use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input,
    spanned::Spanned,
    BinOp, Block, Expr, Ident, Pat, Stmt, Token, UnOp,
};

struct GraphInput {
    tape: Expr,
    block: Block,
}

impl Parse for GraphInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let tape = input.parse()?;
        input.parse::<Token![=>]>()?;
        let block = input.parse()?;
        Ok(Self { tape, block })
    }
}

/// Build a computation graph on a tape from plain arithmetic.
///
/// ```ignore
/// graph! { tape => {
///     let x = 2.;
///     let y = x * sin(x) + 3.;
/// }}
/// ```
///
/// Literal bindings become named variables; literals inside expressions are
/// constants. The expansion uses `?`, so it must appear in a function whose
/// error type converts from `revgrad::AdError`.
#[proc_macro]
pub fn graph(input: TokenStream) -> TokenStream {
    // Parse the input tokens into a syntax tree
    let GraphInput { tape, block } = parse_macro_input!(input as GraphInput);
    let tape = match &tape {
        Expr::Path(_) => quote! { #tape },
        _ => quote! { (#tape) },
    };

    let mut objs = vec![];

    for stmt in &block.stmts {
        traverse_stmt(&tape, stmt, &mut objs);
    }

    let expanded = quote! {
        #(#objs)*
    };

    TokenStream::from(expanded)
}

fn traverse_stmt(tape: &TokenStream2, input: &Stmt, terms: &mut Vec<TokenStream2>) {
    match input {
        Stmt::Local(local) => {
            if let (Pat::Ident(id), Some(init)) = (&local.pat as &Pat, &local.init) {
                let name = id.ident.clone();
                let ex = &init.expr;
                let ts = match ex as &Expr {
                    Expr::Lit(lit) => quote! {
                        let #name = #tape.variable(
                            stringify!(#name),
                            ::revgrad::Tensor::from_scalar(#lit as f64),
                        );
                    },
                    Expr::Path(path) => quote! {
                        let #name = #path;
                    },
                    _ => match traverse_expr(tape, ex, terms) {
                        Ok(res) => quote! {
                            let #name = #res;
                        },
                        Err(e) => e.to_compile_error(),
                    },
                };
                terms.push(ts);
            }
        }
        Stmt::Expr(ex, _) => {
            if let Err(e) = traverse_expr(tape, ex, terms) {
                terms.push(e.to_compile_error());
            }
        }
        _ => (),
    }
}

fn var_name(terms: &[TokenStream2]) -> String {
    format!("_a{}", terms.len())
}

/// Returns the tokens of an operand: an identifier bound to a node, or a
/// constant.
fn traverse_expr(
    tape: &TokenStream2,
    input: &Expr,
    terms: &mut Vec<TokenStream2>,
) -> syn::Result<TokenStream2> {
    match input {
        Expr::Binary(ex) => {
            let lhs = traverse_expr(tape, &ex.left, terms)?;
            let rhs = traverse_expr(tape, &ex.right, terms)?;
            let method = match ex.op {
                BinOp::Add(_) => quote! { add },
                BinOp::Sub(_) => quote! { sub },
                BinOp::Mul(_) => quote! { mul },
                BinOp::Div(_) => quote! { div },
                _ => {
                    return Err(syn::Error::new(
                        ex.op.span(),
                        "unsupported operator; use pow(a, b) for powers",
                    ))
                }
            };
            let name = Ident::new(&var_name(terms), ex.span());
            terms.push(quote! {
                let #name = #tape.#method(#lhs, #rhs)?;
            });
            Ok(quote! { #name })
        }
        Expr::Unary(ex) => {
            let UnOp::Neg(_) = ex.op else {
                return Err(syn::Error::new(ex.op.span(), "unsupported operator"));
            };
            let arg = traverse_expr(tape, &ex.expr, terms)?;
            let name = Ident::new(&var_name(terms), ex.span());
            terms.push(quote! {
                let #name = #tape.neg(#arg)?;
            });
            Ok(quote! { #name })
        }
        Expr::Paren(ex) => traverse_expr(tape, &ex.expr, terms),
        Expr::Lit(lit) => Ok(quote! { #lit as f64 }),
        Expr::Path(path) => path
            .path
            .segments
            .last()
            .map(|seg| {
                let ident = &seg.ident;
                quote! { #ident }
            })
            .ok_or_else(|| syn::Error::new(path.span(), "empty path")),
        Expr::Call(call) => {
            let Expr::Path(func) = &call.func as &Expr else {
                return Err(syn::Error::new(call.func.span(), "expected a function name"));
            };
            let Some(func) = func.path.segments.last().map(|seg| seg.ident.clone()) else {
                return Err(syn::Error::new(call.func.span(), "expected a function name"));
            };
            let args = call
                .args
                .iter()
                .map(|arg| traverse_expr(tape, arg, terms))
                .collect::<syn::Result<Vec<_>>>()?;
            let name = Ident::new(&var_name(terms), call.span());
            terms.push(quote! {
                let #name = #tape.#func(#(#args),*)?;
            });
            Ok(quote! { #name })
        }
        _ => Err(syn::Error::new(input.span(), "unsupported expression")),
    }
}
