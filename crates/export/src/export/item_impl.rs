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

use proc_macro2::TokenStream;
use quote::quote_spanned;
use syn::{spanned::Spanned, Error, ImplItem, ItemImpl, LitStr, Result, Visibility};

use crate::{
    export::ExportConfig,
    utils::{
        doc_option,
        Exportable,
        Facade,
        FnShape,
        Receiver,
        DUMP,
        EXCLUDED,
        INCLUDED,
        PROMISE,
        RENAME,
        UNSPECIFIED,
    },
};

pub fn export_item_impl(item: &mut ItemImpl) -> Result<ExportConfig> {
    let attrs = item.drain_attrs()?;

    attrs.check(UNSPECIFIED | DUMP | EXCLUDED)?;

    if let Some((_, path, _)) = &item.trait_ {
        return Err(Error::new(
            path.span(),
            "Trait implementations cannot be exported. Export an inherent \
            implementation instead.",
        ));
    }

    if !item.generics.params.is_empty() {
        return Err(Error::new(
            item.generics.span(),
            "Generic implementations cannot be exported.",
        ));
    }

    if let Some(token) = &item.unsafety {
        return Err(Error::new(
            token.span,
            "Unsafe implementations cannot be exported.",
        ));
    }

    let self_ty = &item.self_ty;
    let span = self_ty.span();
    let runtime = span.face_runtime();

    let mut methods = Vec::new();
    let mut names = Vec::<String>::new();

    for impl_item in &mut item.items {
        let ImplItem::Fn(function) = impl_item else {
            continue;
        };

        let fn_attrs = function.drain_attrs()?;

        fn_attrs.check(UNSPECIFIED | INCLUDED | EXCLUDED | RENAME | PROMISE)?;

        if fn_attrs.excluded() {
            continue;
        }

        let public = matches!(&function.vis, Visibility::Public(..));

        if !public && !fn_attrs.specified() {
            continue;
        }

        let shape = FnShape::new(&function.sig)?;

        let ident = &function.sig.ident;
        let fn_span = ident.span();

        if let Receiver::None = &shape.receiver {
            if fn_attrs.specified() {
                return Err(Error::new(
                    fn_span,
                    "Functions without a receiver cannot be exported as methods. \
                    Export a free function instead.",
                ));
            }

            continue;
        }

        if shape.is_async && !matches!(&shape.receiver, Receiver::Shared) {
            return Err(Error::new(
                fn_span,
                "Asynchronous methods must take the receiver as \"this: Shared<Self>\".",
            ));
        }

        let name = fn_attrs
            .rename()
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());

        if names.contains(&name) {
            return Err(Error::new(
                fn_span,
                format!("Duplicate exported method name \"{name}\"."),
            ));
        }

        let name_lit = LitStr::new(&name, fn_span);

        names.push(name);

        let doc = doc_option(fn_span, function.rust_doc());
        let params = shape.params();
        let results = shape.results();
        let decode = shape.decode();
        let promise = fn_attrs.promise();
        let is_async = shape.is_async;
        let args = shape.idents().collect::<Vec<_>>();

        let call = match &shape.receiver {
            Receiver::Ref => quote_spanned!(fn_span=>
                #runtime::Invocation::ready(#runtime::borrow_receiver::<Self, _>(
                    receiver,
                    move |this| Self::#ident(this, #(#args),*),
                )?)
            ),

            Receiver::Mut => quote_spanned!(fn_span=>
                #runtime::Invocation::ready(#runtime::borrow_receiver_mut::<Self, _>(
                    receiver,
                    move |this| Self::#ident(this, #(#args),*),
                )?)
            ),

            Receiver::Shared if is_async => quote_spanned!(fn_span=>
                #runtime::Invocation::pending(Self::#ident(
                    #runtime::shared_receiver::<Self>(receiver)?,
                    #(#args),*
                ))
            ),

            _ => quote_spanned!(fn_span=>
                #runtime::Invocation::ready(Self::#ident(
                    #runtime::shared_receiver::<Self>(receiver)?,
                    #(#args),*
                ))
            ),
        };

        methods.push(quote_spanned!(fn_span=>
            #runtime::MethodMeta {
                signature: #runtime::Signature {
                    name: #name_lit,
                    doc: #doc,
                    params: #params,
                    results: #results,
                    promise: #promise,
                    is_async: #is_async,
                },
                invoke: |receiver, args| {
                    let invocation = || -> #runtime::BridgeResult<#runtime::Invocation> {
                        #decode

                        ::std::result::Result::Ok(#call)
                    };

                    match invocation() {
                        ::std::result::Result::Ok(invocation) => invocation,
                        ::std::result::Result::Err(error) => {
                            #runtime::Invocation::Ready(::std::result::Result::Err(error))
                        }
                    }
                },
            }
        ));
    }

    let stream: TokenStream = quote_spanned!(span=>
        impl #runtime::ExportedMethods for #self_ty {
            fn methods() -> ::std::vec::Vec<#runtime::MethodMeta> {
                ::std::vec![#(#methods),*]
            }
        }
    );

    Ok(ExportConfig {
        dump: attrs.dump(),
        stream: match attrs.excluded() {
            true => None,
            false => Some(stream),
        },
    })
}
