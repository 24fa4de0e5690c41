//! Derive macro for simple-container
//!
//! `#[derive(Inject)]` generates an `Inject` implementation: the injection
//! metadata of the struct and a constructor that takes the resolved values
//! in field order.
//!
//! # Example
//!
//! ```rust,ignore
//! use simple_container::{Container, Factory, Inject};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str);
//! }
//!
//! #[derive(Inject)]
//! #[inject(implements(dyn Logger))]
//! struct ConsoleLogger;
//!
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) {
//!         println!("{message}");
//!     }
//! }
//!
//! #[derive(Inject)]
//! struct UserService {
//!     #[inject]
//!     logger: Arc<dyn Logger>,
//!     #[inject(id = "primary")]
//!     db: Arc<Database>,
//!     #[inject(optional)]
//!     cache: Option<Arc<Cache>>,
//!     #[inject(all)]
//!     plugins: Vec<Arc<dyn Plugin>>,
//!     #[inject(factory)]
//!     sessions: Factory<Session>,
//!     #[inject(member)]
//!     metrics: Option<Arc<Metrics>>,
//!     // Non-injected fields use Default
//!     request_count: u64,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident, LitStr, Token, Type};

/// Derive macro for `simple_container::Inject`.
///
/// # Field attributes
///
/// - `#[inject]` - Required constructor dependency. The field type must be `Arc<T>`.
/// - `#[inject(optional)]` - `Option<Arc<T>>`, `None` when `T` is unbound.
/// - `#[inject(all)]` - `Vec<Arc<T>>`, every Multiple binding of `T`.
/// - `#[inject(factory)]` - `Factory<T>`, a deferred producer.
/// - `#[inject(member)]` - Injected after construction instead of as a
///   constructor parameter. Required and factory members are wrapped in `Option`.
/// - `id = "..."` and `tag = "..."` - Qualify the lookup; combine with any of the above.
///
/// Fields without `#[inject]` use `Default::default()`.
///
/// # Struct attributes
///
/// - `#[inject(implements(dyn TraitA, dyn TraitB))]` - The struct can be
///   bound to these trait-object contracts.
#[proc_macro_derive(Inject, attributes(inject))]
pub fn derive_inject(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_inject(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_inject(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields: Vec<&syn::Field> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Inject can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Inject can only be derived for structs",
            ));
        }
    };

    let contracts = parse_contracts(&input.attrs)?;

    let mut params = Vec::new();
    let mut members = Vec::new();
    let mut field_inits = Vec::new();
    let mut member_assigns = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };

        let Some(options) = parse_field(&field.attrs)? else {
            field_inits.push(quote! {
                #field_name: ::std::default::Default::default()
            });
            continue;
        };

        let inner_type = options
            .inner_type(&field.ty)
            .ok_or_else(|| syn::Error::new_spanned(&field.ty, options.expected_shape()))?;
        let point = options.point(field_name, inner_type);

        if options.member {
            let take = options.take(&Ident::new("_members", proc_macro2::Span::call_site()), inner_type);
            let value = match options.kind {
                Kind::Required | Kind::Factory => quote! { ::std::option::Option::Some(#take) },
                Kind::Optional | Kind::All => take,
            };
            members.push(point);
            field_inits.push(quote! {
                #field_name: ::std::default::Default::default()
            });
            member_assigns.push(quote! {
                self.#field_name = #value;
            });
        } else {
            let take = options.take(&Ident::new("_args", proc_macro2::Span::call_site()), inner_type);
            params.push(point);
            field_inits.push(quote! {
                #field_name: #take
            });
        }
    }

    let inject_fn = if member_assigns.is_empty() {
        quote! {}
    } else {
        quote! {
            fn inject(
                &mut self,
                _members: &mut ::simple_container::Arguments,
            ) -> ::simple_container::Result<()> {
                #(#member_assigns)*
                ::std::result::Result::Ok(())
            }
        }
    };

    let implements = contracts.iter().map(|contract| {
        quote! {
            impl #impl_generics ::simple_container::Implements<#contract> for #name #ty_generics #where_clause {
                #[inline]
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<#contract> {
                    self
                }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::simple_container::Inject for #name #ty_generics #where_clause {
            fn describe() -> ::simple_container::TypeMetadata {
                ::simple_container::TypeMetadata::of::<Self>()
                    #(.param(#params))*
                    #(.member(#members))*
            }

            fn construct(
                _args: &mut ::simple_container::Arguments,
            ) -> ::simple_container::Result<Self> {
                ::std::result::Result::Ok(Self {
                    #(#field_inits),*
                })
            }

            #inject_fn
        }

        #(#implements)*
    })
}

// =============================================================================
// Attribute parsing
// =============================================================================

#[derive(Clone, Copy, Default, PartialEq, Eq)]
enum Kind {
    #[default]
    Required,
    Optional,
    All,
    Factory,
}

#[derive(Default)]
struct InjectOptions {
    kind: Kind,
    member: bool,
    id: Option<LitStr>,
    tag: Option<LitStr>,
}

impl InjectOptions {
    /// The `T` the field asks for
    fn inner_type<'a>(&self, ty: &'a Type) -> Option<&'a Type> {
        let ty = if self.member && matches!(self.kind, Kind::Required | Kind::Factory) {
            extract_generic_arg(ty, "Option")?
        } else {
            ty
        };

        match self.kind {
            Kind::Required => extract_arc_inner_type(ty),
            Kind::Optional => extract_option_arc_inner_type(ty),
            Kind::All => extract_generic_arg(ty, "Vec").and_then(extract_arc_inner_type),
            Kind::Factory => extract_generic_arg(ty, "Factory"),
        }
    }

    fn expected_shape(&self) -> &'static str {
        match (self.member, self.kind) {
            (false, Kind::Required) => "Fields marked with #[inject] must have type Arc<T>",
            (true, Kind::Required) => "Fields marked with #[inject(member)] must have type Option<Arc<T>>",
            (_, Kind::Optional) => "Fields marked with #[inject(optional)] must have type Option<Arc<T>>",
            (_, Kind::All) => "Fields marked with #[inject(all)] must have type Vec<Arc<T>>",
            (false, Kind::Factory) => "Fields marked with #[inject(factory)] must have type Factory<T>",
            (true, Kind::Factory) => {
                "Fields marked with #[inject(member, factory)] must have type Option<Factory<T>>"
            }
        }
    }

    fn point(&self, field_name: &Ident, inner_type: &Type) -> TokenStream2 {
        let point_name = field_name.to_string();
        let constructor = match self.kind {
            Kind::Required => quote! { required },
            Kind::Optional => quote! { optional },
            Kind::All => quote! { all },
            Kind::Factory => quote! { factory },
        };

        let mut point = quote! {
            ::simple_container::InjectionPoint::#constructor::<#inner_type>(#point_name)
        };
        if let Some(id) = &self.id {
            point = quote! { #point.with_id(#id) };
        }
        if let Some(tag) = &self.tag {
            point = quote! { #point.with_tag(#tag) };
        }
        point
    }

    fn take(&self, source: &Ident, inner_type: &Type) -> TokenStream2 {
        match self.kind {
            Kind::Required => quote! { #source.next::<#inner_type>()? },
            Kind::Optional => quote! { #source.next_optional::<#inner_type>()? },
            Kind::All => quote! { #source.next_all::<#inner_type>()? },
            Kind::Factory => quote! { #source.next_factory::<#inner_type>()? },
        }
    }
}

/// Parse the `#[inject]` attribute of a field, if any
fn parse_field(attrs: &[Attribute]) -> syn::Result<Option<InjectOptions>> {
    let Some(attr) = attrs.iter().find(|attr| attr.path().is_ident("inject")) else {
        return Ok(None);
    };

    let mut options = InjectOptions::default();
    if attr.meta.require_path_only().is_ok() {
        return Ok(Some(options));
    }

    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("optional") {
            options.kind = Kind::Optional;
        } else if meta.path.is_ident("all") {
            options.kind = Kind::All;
        } else if meta.path.is_ident("factory") {
            options.kind = Kind::Factory;
        } else if meta.path.is_ident("member") {
            options.member = true;
        } else if meta.path.is_ident("id") {
            options.id = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("tag") {
            options.tag = Some(meta.value()?.parse()?);
        } else {
            return Err(meta.error(
                "unsupported inject option; expected optional, all, factory, member, id or tag",
            ));
        }
        Ok(())
    })?;

    Ok(Some(options))
}

/// Parse `#[inject(implements(...))]` on the struct
fn parse_contracts(attrs: &[Attribute]) -> syn::Result<Vec<Type>> {
    let mut contracts = Vec::new();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("inject")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("implements") {
                let content;
                syn::parenthesized!(content in meta.input);
                let types = Punctuated::<Type, Token![,]>::parse_terminated(&content)?;
                contracts.extend(types);
                Ok(())
            } else {
                Err(meta.error("expected `implements(...)`"))
            }
        })?;
    }
    Ok(contracts)
}

/// Extract T from Wrapper<T>, matching on the last path segment
fn extract_generic_arg<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty {
        let segment = type_path.path.segments.last()?;
        if segment.ident == wrapper {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                    return Some(inner);
                }
            }
        }
    }
    None
}

/// Extract T from Arc<T>
fn extract_arc_inner_type(ty: &Type) -> Option<&Type> {
    extract_generic_arg(ty, "Arc")
}

/// Extract T from Option<Arc<T>>
fn extract_option_arc_inner_type(ty: &Type) -> Option<&Type> {
    extract_generic_arg(ty, "Option").and_then(extract_arc_inner_type)
}
