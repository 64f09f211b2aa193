use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{
    Data, DeriveInput, Expr, ExprLit, Field, Fields, Ident, Lit, LitStr, Meta, Result,
    ext::IdentExt, parse_macro_input,
};

/// Derive `argtree::Bind`, registering every named field as an option.
///
/// Field attributes, all inside `#[arg(...)]`:
///
/// - `name = "..."`: option name; defaults to the field name with `_` as `-`
/// - `alias = "..."`: extra names, repeatable or comma-separated
/// - `help = "..."`: help text; defaults to the field's doc comment
/// - `metavar = "..."`: value placeholder in help output
/// - `required`, `positional`
/// - `rest`: capture every remaining token (`Vec<String>` fields)
/// - `subcommand`: the field's type derives `Bind` and becomes a child parser
/// - `skip`: leave the field alone
///
/// ```ignore
/// #[derive(argtree::Bind, Default)]
/// struct Cli {
///     /// Print more.
///     #[arg(alias = "v")]
///     verbose: bool,
///     #[arg(positional, required)]
///     input: String,
///     #[arg(subcommand, help = "Run the thing")]
///     run: RunArgs,
/// }
/// ```
#[proc_macro_derive(Bind, attributes(arg))]
pub fn derive_bind(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_bind(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct FieldSpec {
    name: Option<String>,
    aliases: Vec<String>,
    help: Option<String>,
    metavar: Option<String>,
    required: bool,
    positional: bool,
    rest: bool,
    subcommand: bool,
    skip: bool,
}

fn expand_bind(input: DeriveInput) -> Result<proc_macro2::TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Bind cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Bind can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Bind can only be derived for structs",
            ));
        }
    };

    let mut bound: Vec<&Ident> = Vec::new();
    let mut registrations: Vec<proc_macro2::TokenStream> = Vec::new();
    for field in fields {
        let spec = parse_field(field)?;
        if spec.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        registrations.push(registration(ident, field, &spec));
        bound.push(ident);
    }

    let ident = &input.ident;
    Ok(quote! {
        impl<'__argtree> ::argtree::Bind<'__argtree> for #ident {
            fn bind(&'__argtree mut self, parser: &mut ::argtree::ArgParser<'__argtree>) {
                let Self { #(#bound,)* .. } = self;
                #(#registrations)*
            }
        }
    })
}

fn parse_field(field: &Field) -> Result<FieldSpec> {
    let mut spec = FieldSpec::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("arg") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                spec.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("alias") {
                let list = meta.value()?.parse::<LitStr>()?.value();
                spec.aliases.extend(
                    list.split(',')
                        .map(str::trim)
                        .filter(|alias| !alias.is_empty())
                        .map(String::from),
                );
            } else if meta.path.is_ident("help") {
                spec.help = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("metavar") {
                spec.metavar = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("required") {
                spec.required = true;
            } else if meta.path.is_ident("positional") {
                spec.positional = true;
            } else if meta.path.is_ident("rest") {
                spec.rest = true;
            } else if meta.path.is_ident("subcommand") {
                spec.subcommand = true;
            } else if meta.path.is_ident("skip") {
                spec.skip = true;
            } else {
                return Err(meta.error("unsupported arg option"));
            }
            Ok(())
        })?;
    }

    if spec.help.is_none() {
        spec.help = doc_comment(field);
    }

    if spec.subcommand {
        let conflicting = spec.positional
            || spec.rest
            || spec.required
            || spec.metavar.is_some()
            || !spec.aliases.is_empty();
        if conflicting {
            return Err(syn::Error::new_spanned(
                field,
                "`subcommand` only combines with `name` and `help`",
            ));
        }
    }
    if spec.positional && !spec.aliases.is_empty() {
        return Err(syn::Error::new_spanned(
            field,
            "positional fields cannot have aliases",
        ));
    }

    Ok(spec)
}

/// Doc comment lines joined into one paragraph.
fn doc_comment(field: &Field) -> Option<String> {
    let lines: Vec<String> = field
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Some(s.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

fn registration(ident: &Ident, field: &Field, spec: &FieldSpec) -> proc_macro2::TokenStream {
    let name = spec
        .name
        .clone()
        .unwrap_or_else(|| ident.unraw().to_string().replace('_', "-"));
    let name = LitStr::new(&name, Span::call_site());
    let help = spec
        .help
        .as_deref()
        .map(|help| LitStr::new(help, Span::call_site()));

    if spec.subcommand {
        let description = help.map(|help| quote! { .description(#help) });
        return quote! {
            {
                let mut child = parser.subparser() #description;
                ::argtree::Bind::bind(#ident, &mut child);
                parser.add_subparser(#name, child);
            }
        };
    }

    let ty = &field.ty;
    let mut arg = match (spec.rest, spec.positional) {
        (true, true) => quote! { ::argtree::values::rest_positional(#name, #ident) },
        (true, false) => quote! { ::argtree::values::rest(#name, #ident) },
        (false, true) => quote! { <#ty as ::argtree::Value<'__argtree>>::positional(#name, #ident) },
        (false, false) => quote! { <#ty as ::argtree::Value<'__argtree>>::option(#name, #ident) },
    };
    if spec.required {
        arg = quote! { #arg.required() };
    }
    if let Some(help) = help {
        arg = quote! { #arg.help(#help) };
    }
    if let Some(metavar) = &spec.metavar {
        let metavar = LitStr::new(metavar, Span::call_site());
        arg = quote! { #arg.metavar(#metavar) };
    }

    if spec.aliases.is_empty() {
        quote! { parser.add_option(#arg); }
    } else {
        let aliases = spec
            .aliases
            .iter()
            .map(|alias| LitStr::new(alias, Span::call_site()));
        quote! { parser.add_option_with_alias(#arg, &[#(#aliases),*]); }
    }
}
