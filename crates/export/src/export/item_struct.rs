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
use syn::{spanned::Spanned, Error, Fields, ItemStruct, LitStr, Result, Visibility};

use crate::{
    export::ExportConfig,
    utils::{
        doc_option,
        Exportable,
        Facade,
        DUMP,
        EXCLUDED,
        INCLUDED,
        METHODS,
        NOT_NIL,
        RENAME,
        UNSPECIFIED,
    },
};

pub fn export_item_struct(item: &mut ItemStruct) -> Result<ExportConfig> {
    let attrs = item.drain_attrs()?;

    attrs.check(UNSPECIFIED | DUMP | EXCLUDED | RENAME | METHODS)?;

    if !item.generics.params.is_empty() {
        return Err(Error::new(
            item.generics.span(),
            "Generic structs cannot be exported.",
        ));
    }

    let span = item.ident.span();
    let runtime = span.face_runtime();
    let option = span.face_option();
    let result = span.face_result();
    let boxed = span.face_box();
    let default = span.face_default();
    let vec = span.face_vec();

    let fields = match &mut item.fields {
        Fields::Named(fields) => &mut fields.named,

        Fields::Unnamed(fields) => {
            return Err(Error::new(
                fields.span(),
                "Tuple structs cannot be exported.",
            ))
        }

        Fields::Unit => {
            return Err(Error::new(
                item.ident.span(),
                "Unit structs cannot be exported. Add named fields or use a type alias.",
            ))
        }
    };

    let mut field_metas = Vec::with_capacity(fields.len());
    let mut names = Vec::<String>::with_capacity(fields.len());

    for field in fields.iter_mut() {
        let field_attrs = field.drain_attrs()?;

        field_attrs.check(UNSPECIFIED | INCLUDED | EXCLUDED | RENAME | NOT_NIL)?;

        if field_attrs.excluded() {
            continue;
        }

        let public = matches!(&field.vis, Visibility::Public(..));

        if !public && !field_attrs.specified() {
            continue;
        }

        let Some(ident) = &field.ident else {
            continue;
        };

        let name = field_attrs
            .rename()
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());

        if names.contains(&name) {
            return Err(Error::new(
                ident.span(),
                format!("Duplicate exported field name \"{name}\"."),
            ));
        }

        let span = ident.span();
        let name_lit = LitStr::new(&name, span);
        let ty = &field.ty;
        let not_nil = field_attrs.not_nil();

        names.push(name);

        field_metas.push(quote_spanned!(span=>
            #runtime::FieldMeta {
                name: #name_lit,
                ty: #runtime::TypeDescriptor::of::<#ty>,
                not_nil: #not_nil,
                get: |this| #option::Some(
                    &this.downcast_ref::<Self>()?.#ident as &dyn #runtime::Reflect,
                ),
                get_mut: |this| #option::Some(
                    &mut this.downcast_mut::<Self>()?.#ident as &mut dyn #runtime::Reflect,
                ),
                set: |this, value| {
                    #runtime::record_mut::<Self>(this)?.#ident = #runtime::downcast::<#ty>(value)?;

                    #result::Ok(())
                },
            }
        ));
    }

    let ident = &item.ident;

    let name = LitStr::new(
        &attrs.rename().unwrap_or_else(|| ident.to_string()),
        ident.span(),
    );

    let doc = doc_option(span, item.rust_doc());

    let methods = match attrs.methods() {
        true => quote_spanned!(span=> <Self as #runtime::ExportedMethods>::methods()),
        false => quote_spanned!(span=> #vec::new()),
    };

    let stream: TokenStream = quote_spanned!(span=>
        impl #runtime::Reflect for #ident {
            fn describe() -> #runtime::TypeDescriptor {
                #runtime::TypeDescriptor::new::<Self>(#runtime::TypeKind::Record(
                    #runtime::RecordMeta {
                        fields: ::std::vec![#(#field_metas),*],
                        methods: #methods,
                    },
                ))
                .with_name(#name)
                .with_doc(#doc)
                .with_zero(|| #boxed::new(<Self as #default>::default()))
            }

            #[inline(always)]
            fn view(&self) -> #runtime::View<'_> {
                #runtime::View::Record
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
