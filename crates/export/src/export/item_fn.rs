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
use quote::{format_ident, quote_spanned};
use syn::{Error, ItemFn, LitStr, Result};

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
        PROMISE,
        RENAME,
        UNSPECIFIED,
    },
};

const MAX_ARITY: usize = 6;

pub fn export_item_fn(item: &mut ItemFn) -> Result<ExportConfig> {
    let attrs = item.drain_attrs()?;

    attrs.check(UNSPECIFIED | DUMP | EXCLUDED | RENAME | PROMISE)?;

    let shape = FnShape::new(&item.sig)?;

    let ident = &item.sig.ident;
    let span = ident.span();

    if !matches!(&shape.receiver, Receiver::None) {
        return Err(Error::new(
            span,
            "Methods must be exported through their implementation block.",
        ));
    }

    if shape.params.len() > MAX_ARITY {
        return Err(Error::new(
            span,
            format!("Exported functions cannot have more than {MAX_ARITY} parameters."),
        ));
    }

    let runtime = span.face_runtime();
    let vis = &item.vis;

    let name = LitStr::new(
        &attrs
            .rename()
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string()),
        span,
    );

    let constructor = match shape.is_async {
        true => format_ident!("future", span = span),
        false => format_ident!("new", span = span),
    };

    let names = shape.params.iter().map(|param| &param.name);
    let promise = attrs.promise();
    let doc = doc_option(span, item.rust_doc());
    let export_fn = format_ident!("__tether_export_{}", ident, span = span);

    let stream: TokenStream = quote_spanned!(span=>
        #[doc(hidden)]
        #[allow(non_snake_case)]
        #vis fn #export_fn() -> #runtime::Func {
            #runtime::Func::#constructor(#name, #ident)
                .with_params(&[#(#names),*])
                .with_promise(#promise)
                .with_doc(#doc)
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
