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

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote_spanned};
use syn::{
    spanned::Spanned,
    Error,
    FnArg,
    GenericArgument,
    Ident,
    LitStr,
    Pat,
    PathArguments,
    Result,
    ReturnType,
    Signature,
    Type,
};

use crate::utils::Facade;

pub enum Receiver {
    None,
    Ref,
    Mut,
    Shared,
}

pub struct FnParam {
    pub name: LitStr,
    pub ident: Ident,
    pub ty: Type,
}

pub struct FnShape {
    pub span: Span,
    pub receiver: Receiver,
    pub params: Vec<FnParam>,
    pub output: Option<Type>,
    pub is_async: bool,
}

impl FnShape {
    pub fn new(signature: &Signature) -> Result<Self> {
        let span = signature.ident.span();

        if let Some(token) = &signature.unsafety {
            return Err(Error::new(
                token.span,
                "Unsafe functions cannot be exported.",
            ));
        }

        if let Some(abi) = &signature.abi {
            return Err(Error::new(
                abi.extern_token.span,
                "Functions with explicit ABI cannot be exported.",
            ));
        }

        if let Some(variadic) = &signature.variadic {
            return Err(Error::new(
                variadic.span(),
                "Variadic functions cannot be exported.",
            ));
        }

        if !signature.generics.params.is_empty() {
            return Err(Error::new(
                signature.generics.span(),
                "Generic functions cannot be exported.",
            ));
        }

        let mut receiver = Receiver::None;
        let mut params = Vec::with_capacity(signature.inputs.len());

        for (index, input) in signature.inputs.iter().enumerate() {
            match input {
                FnArg::Receiver(input) => {
                    if input.colon_token.is_some() {
                        return Err(Error::new(
                            input.span(),
                            "Typed receivers are not supported. Use \"&self\", \
                            \"&mut self\", or \"this: Shared<Self>\".",
                        ));
                    }

                    if input.reference.is_none() {
                        return Err(Error::new(
                            input.self_token.span,
                            "Methods that consume the receiver cannot be exported.",
                        ));
                    }

                    receiver = match input.mutability.is_some() {
                        true => Receiver::Mut,
                        false => Receiver::Ref,
                    };
                }

                FnArg::Typed(input) => {
                    let binding = match input.pat.as_ref() {
                        Pat::Ident(pat) => Some(pat.ident.to_string()),
                        _ => None,
                    };

                    if index == 0 && binding.as_deref() == Some("this") && is_shared_self(&input.ty) {
                        receiver = Receiver::Shared;
                        continue;
                    }

                    check_type(&input.ty)?;

                    let position = params.len();

                    let name = binding
                        .map(|name| name.trim_start_matches("r#").to_string())
                        .unwrap_or_else(|| format!("arg{position}"));

                    params.push(FnParam {
                        name: LitStr::new(&name, input.pat.span()),
                        ident: format_ident!("__tether_arg{}", position),
                        ty: input.ty.as_ref().clone(),
                    });
                }
            }
        }

        let output = match &signature.output {
            ReturnType::Default => None,

            ReturnType::Type(_, ty) => {
                check_type(ty)?;

                Some(ty.as_ref().clone())
            }
        };

        Ok(Self {
            span,
            receiver,
            params,
            output,
            is_async: signature.asyncness.is_some(),
        })
    }

    // Tokens of a `Vec<Param>` expression.
    pub fn params(&self) -> TokenStream {
        let runtime = self.span.face_runtime();

        let params = self.params.iter().map(|param| {
            let name = &param.name;
            let ty = &param.ty;

            quote_spanned!(param.name.span()=> #runtime::Param {
                name: #name,
                ty: #runtime::TypeDescriptor::of::<#ty>,
            })
        });

        quote_spanned!(self.span=> ::std::vec![#(#params),*])
    }

    // Tokens of a `Vec<TypeRef>` expression.
    pub fn results(&self) -> TokenStream {
        let runtime = self.span.face_runtime();
        let vec = self.span.face_vec();

        match &self.output {
            None => quote_spanned!(self.span=> #vec::new()),
            Some(ty) => quote_spanned!(ty.span()=> <#ty as #runtime::Returns>::types()),
        }
    }

    // Statements that decode the `args` vector into the parameter variables.
    pub fn decode(&self) -> TokenStream {
        let runtime = self.span.face_runtime();
        let arity = self.params.len();

        let takes = self.params.iter().map(|param| {
            let ident = &param.ident;
            let ty = &param.ty;

            quote_spanned!(ty.span()=> let #ident = __tether_args.take::<#ty>()?;)
        });

        quote_spanned!(self.span=>
            #[allow(unused_mut)]
            let mut __tether_args = #runtime::Arguments::new(args, #arity)?;
            #(#takes)*
        )
    }

    pub fn idents(&self) -> impl Iterator<Item = &Ident> + '_ {
        self.params.iter().map(|param| &param.ident)
    }
}

fn check_type(ty: &Type) -> Result<()> {
    match ty {
        Type::Reference(ty) => Err(Error::new(
            ty.and_token.span,
            "Reference types cannot cross the bridge. Use an owned type instead.",
        )),

        Type::ImplTrait(ty) => Err(Error::new(
            ty.impl_token.span,
            "Impl trait types cannot cross the bridge.",
        )),

        Type::Infer(ty) => Err(Error::new(
            ty.underscore_token.span,
            "Inferred types are not allowed here.",
        )),

        Type::Paren(ty) => check_type(&ty.elem),

        Type::Group(ty) => check_type(&ty.elem),

        _ => Ok(()),
    }
}

fn is_shared_self(ty: &Type) -> bool {
    let Type::Path(ty) = ty else {
        return false;
    };

    let Some(segment) = ty.path.segments.last() else {
        return false;
    };

    if segment.ident != "Shared" {
        return false;
    }

    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return false;
    };

    if arguments.args.len() != 1 {
        return false;
    }

    match arguments.args.first() {
        Some(GenericArgument::Type(Type::Path(inner))) => inner.path.is_ident("Self"),
        _ => false,
    }
}
