////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use proc_macro2::Span;
use syn::{
    parse::{Parse, ParseStream},
    spanned::Spanned,
    Attribute,
    Error,
    Expr,
    Field,
    ImplItemFn,
    ItemFn,
    ItemImpl,
    ItemStruct,
    Lit,
    LitStr,
    Meta,
    Result,
};

pub const UNSPECIFIED: u16 = 1 << 0;
pub const DUMP: u16 = 1 << 1;
pub const INCLUDED: u16 = 1 << 2;
pub const EXCLUDED: u16 = 1 << 3;
pub const RENAME: u16 = 1 << 4;
pub const NOT_NIL: u16 = 1 << 5;
pub const PROMISE: u16 = 1 << 6;
pub const METHODS: u16 = 1 << 7;

pub struct Attrs {
    span: Span,
    specified: bool,
    dump: Option<Span>,
    included: Option<Span>,
    excluded: Option<Span>,
    name: Option<LitStr>,
    not_nil: Option<Span>,
    promise: Option<Span>,
    methods: Option<Span>,
}

impl Attrs {
    pub fn check(&self, mask: u16) -> Result<()> {
        if mask & UNSPECIFIED == 0 {
            if !self.specified {
                return Err(self.error(mask));
            }
        }

        if mask & DUMP == 0 {
            if let Some(span) = &self.dump {
                return Err(Error::new(
                    *span,
                    "Export dump marker is not applicable here.",
                ));
            }
        }

        if mask & INCLUDED == 0 {
            if let Some(span) = &self.included {
                return Err(Error::new(
                    *span,
                    "Inclusion marker is not applicable here.",
                ));
            }
        }

        if mask & EXCLUDED == 0 {
            if let Some(span) = &self.excluded {
                return Err(Error::new(
                    *span,
                    "Exclusion marker is not applicable here.",
                ));
            }
        }

        if mask & RENAME == 0 {
            if let Some(name) = &self.name {
                return Err(Error::new(name.span(), "Renaming is not applicable here."));
            }
        }

        if mask & NOT_NIL == 0 {
            if let Some(span) = &self.not_nil {
                return Err(Error::new(*span, "Not-nil marker is not applicable here."));
            }
        }

        if mask & PROMISE == 0 {
            if let Some(span) = &self.promise {
                return Err(Error::new(*span, "Promise marker is not applicable here."));
            }
        }

        if mask & METHODS == 0 {
            if let Some(span) = &self.methods {
                return Err(Error::new(*span, "Methods marker is not applicable here."));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn dump(&self) -> Option<Span> {
        self.dump
    }

    #[inline]
    pub fn specified(&self) -> bool {
        self.specified
    }

    #[inline]
    pub fn excluded(&self) -> bool {
        self.excluded.is_some()
    }

    #[inline]
    pub fn not_nil(&self) -> bool {
        self.not_nil.is_some()
    }

    #[inline]
    pub fn promise(&self) -> bool {
        self.promise.is_some()
    }

    #[inline]
    pub fn methods(&self) -> bool {
        self.methods.is_some()
    }

    #[inline]
    pub fn rename(&self) -> Option<String> {
        self.name.as_ref().map(LitStr::value)
    }

    fn append(&mut self, attr: Attr) -> Result<()> {
        match attr {
            Attr::None => {}

            Attr::Dump(span) => {
                if self.dump.is_some() {
                    return Err(Error::new(span, "Duplicate dump export mode marker."));
                }

                self.dump = Some(span);
            }

            Attr::Included(span) => {
                if self.included.is_some() {
                    return Err(Error::new(span, "Duplicate inclusion marker."));
                }

                if self.excluded.is_some() {
                    return Err(Error::new(
                        span,
                        "Inclusion marker conflicts with exclusion.",
                    ));
                }

                self.included = Some(span);
            }

            Attr::Excluded(span) => {
                if self.excluded.is_some() {
                    return Err(Error::new(span, "Duplicate exclusion marker."));
                }

                if self.included.is_some() {
                    return Err(Error::new(
                        span,
                        "Exclusion marker conflicts with inclusion.",
                    ));
                }

                self.excluded = Some(span);
            }

            Attr::Name(name) => {
                if self.name.is_some() {
                    return Err(Error::new(name.span(), "Duplicate name."));
                }

                if name.value().is_empty() {
                    return Err(Error::new(name.span(), "Empty names are not allowed."));
                }

                self.name = Some(name);
            }

            Attr::NotNil(span) => {
                if self.not_nil.is_some() {
                    return Err(Error::new(span, "Duplicate not-nil marker."));
                }

                self.not_nil = Some(span);
            }

            Attr::Promise(span) => {
                if self.promise.is_some() {
                    return Err(Error::new(span, "Duplicate promise marker."));
                }

                self.promise = Some(span);
            }

            Attr::Methods(span) => {
                if self.methods.is_some() {
                    return Err(Error::new(span, "Duplicate methods marker."));
                }

                self.methods = Some(span);
            }
        }

        Ok(())
    }

    fn error(&self, mask: u16) -> Error {
        let mut variants = Vec::new();

        if mask & INCLUDED > 0 {
            if mask & UNSPECIFIED > 0 {
                variants.push("#[export] inclusion");
            }
            variants.push("#[export(include)] inclusion");
        }

        if mask & EXCLUDED > 0 {
            variants.push("#[export(exclude)] exclusion");
        }

        if mask & RENAME > 0 {
            variants.push("#[export(name \"<new name>\")] renaming");
        }

        if mask & NOT_NIL > 0 {
            variants.push("#[export(not_nil)] not-nil marker");
        }

        if mask & PROMISE > 0 {
            variants.push("#[export(promise)] promise marker");
        }

        if mask & METHODS > 0 {
            variants.push("#[export(methods)] methods marker");
        }

        if variants.is_empty() {
            return Error::new(self.span, "Export attribute is not applicable here.");
        }

        Error::new(
            self.span,
            format!("Expected one of: {}.", variants.join(", ")),
        )
    }
}

pub trait Exportable: inner::WithAttributes {
    #[inline]
    fn drain_attrs(&mut self) -> Result<Attrs> {
        let span = self.span();
        let attributes = self.attributes_mut();

        let mut export_attributes = Vec::with_capacity(attributes.len().min(1));

        attributes.retain(|attribute| {
            if attribute.path().is_ident("export") {
                export_attributes.push(attribute.clone());
                return false;
            }

            true
        });

        let mut result = Attrs {
            span,
            specified: !export_attributes.is_empty(),
            dump: None,
            included: None,
            excluded: None,
            name: None,
            not_nil: None,
            promise: None,
            methods: None,
        };

        for attribute in export_attributes {
            let attr = match &attribute.meta {
                Meta::List(meta) => meta.parse_args::<Attr>()?,
                Meta::NameValue(meta) => {
                    return Err(Error::new(
                        meta.eq_token.span,
                        "Name-value attribute format is not supported.",
                    ))
                }
                Meta::Path(..) => continue,
            };

            result.append(attr)?;
        }

        Ok(result)
    }

    fn rust_doc(&self) -> Option<LitStr> {
        let mut result = None;

        for attribute in self.attributes() {
            let Meta::NameValue(meta) = &attribute.meta else {
                continue;
            };

            let Some(ident) = meta.path.get_ident() else {
                continue;
            };

            let Expr::Lit(value) = &meta.value else {
                continue;
            };

            let Lit::Str(value) = &value.lit else {
                continue;
            };

            if ident != "doc" {
                continue;
            }

            match &mut result {
                None => result = Some((value.value(), value.span())),

                Some((result, _)) => {
                    result.push('\n');
                    result.push_str(&value.value());
                }
            }
        }

        result.map(|(text, span)| LitStr::new(&text, span))
    }
}

impl<T: inner::WithAttributes> Exportable for T {}

mod inner {
    use super::*;

    pub trait WithAttributes: Spanned {
        fn attributes(&self) -> &Vec<Attribute>;

        fn attributes_mut(&mut self) -> &mut Vec<Attribute>;
    }

    macro_rules! with_attributes {
        ($($ty:ty),*) => {$(
            impl WithAttributes for $ty {
                #[inline(always)]
                fn attributes(&self) -> &Vec<Attribute> {
                    &self.attrs
                }

                #[inline(always)]
                fn attributes_mut(&mut self) -> &mut Vec<Attribute> {
                    &mut self.attrs
                }
            }
        )*};
    }

    with_attributes!(ItemStruct, ItemImpl, ItemFn, ImplItemFn, Field);
}

enum Attr {
    None,
    Dump(Span),
    Included(Span),
    Excluded(Span),
    Name(LitStr),
    NotNil(Span),
    Promise(Span),
    Methods(Span),
}

impl Parse for Attr {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.is_empty() {
            return Ok(Self::None);
        }

        let lookahead = input.lookahead1();

        let attr = if lookahead.peek(keyword::dump) {
            Self::Dump(input.parse::<keyword::dump>()?.span)
        } else if lookahead.peek(keyword::include) {
            Self::Included(input.parse::<keyword::include>()?.span)
        } else if lookahead.peek(keyword::exclude) {
            Self::Excluded(input.parse::<keyword::exclude>()?.span)
        } else if lookahead.peek(keyword::not_nil) {
            Self::NotNil(input.parse::<keyword::not_nil>()?.span)
        } else if lookahead.peek(keyword::promise) {
            Self::Promise(input.parse::<keyword::promise>()?.span)
        } else if lookahead.peek(keyword::methods) {
            Self::Methods(input.parse::<keyword::methods>()?.span)
        } else if lookahead.peek(keyword::name) {
            let _ = input.parse::<keyword::name>()?;

            Self::Name(input.parse::<LitStr>()?)
        } else {
            return Err(lookahead.error());
        };

        if !input.is_empty() {
            return Err(input.error("Unexpected token."));
        }

        Ok(attr)
    }
}

mod keyword {
    syn::custom_keyword!(dump);
    syn::custom_keyword!(include);
    syn::custom_keyword!(exclude);
    syn::custom_keyword!(name);
    syn::custom_keyword!(not_nil);
    syn::custom_keyword!(promise);
    syn::custom_keyword!(methods);
}
