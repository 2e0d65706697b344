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

//! # Tether Macros Crate
//!
//! This is a helper crate of Tether, a type-directed value bridge between
//! compiled Rust code and a single-threaded dynamic host.
//!
//! The [export] attribute macro introspects Rust structs, their inherent
//! implementation blocks, and free functions, and generates the metadata that
//! the bridge needs to convert their values and to call them from the host.
//! The [func] macro obtains the function object of an exported free function.
//!
//! Use these macros through the re-exports of the main `tether` crate.

mod export;
mod utils;

use proc_macro::TokenStream;
use quote::{format_ident, quote_spanned};
use syn::{parse_macro_input, spanned::Spanned, Path};

use crate::export::ExportItem;

/// Exports Rust code to the bridge.
///
/// ```ignore
/// use tether::{export, func, runtime::Shared};
///
/// /// A two-dimensional point.
/// #[export]
/// #[export(methods)]
/// #[derive(Default)]
/// pub struct Point {
///     pub x: f64,
///     pub y: f64,
///
///     #[export(name "label")]
///     #[export(not_nil)]
///     tag: Option<Vec<String>>,
/// }
///
/// #[export]
/// impl Point {
///     pub fn length(&self) -> f64 {
///         (self.x * self.x + self.y * self.y).sqrt()
///     }
///
///     pub fn shift(&mut self, dx: f64) {
///         self.x += dx;
///     }
///
///     pub async fn later(this: Shared<Self>) -> f64 {
///         this.borrow().x
///     }
/// }
///
/// #[export]
/// pub fn add(a: u32, b: u32) -> u32 {
///     a + b
/// }
///
/// let add = func!(add);
/// ```
///
/// ## Exportable Items
///
/// - Struct declarations with named fields: `struct Foo { .. }`. The macro
///   implements the `Reflect` trait for the struct. The struct must implement
///   [Default]: the bridge uses the default value as the zero value of the
///   type.
/// - Inherent implementation blocks: `impl Foo { .. }`. The macro implements
///   the `ExportedMethods` trait with the methods of this block. Mark the
///   struct with `#[export(methods)]` to attach these methods to the struct
///   type.
/// - Free functions: `fn foo() {}`. The macro generates a hidden constructor
///   of the function object. Use the [func] macro to call it.
///
/// Generic items, tuple structs, enums, and traits cannot be exported.
///
/// ## Export Options
///
/// Each `#[export(..)]` attribute carries at most one option:
///
/// - `#[export(name "<name>")]` renames the struct, the field, the method, or
///   the function on the host side.
/// - `#[export(include)]` (or a bare `#[export]`) exports a private field or
///   method. Public fields and methods are exported by default.
/// - `#[export(exclude)]` skips a field or a method, or disables the export
///   of the whole item.
/// - `#[export(not_nil)]` marks a field whose absent sequence or mapping
///   value is exposed as an empty host array or object.
/// - `#[export(promise)]` forces the promise call mode of a method or a
///   function.
/// - `#[export(methods)]` attaches the exported methods of the struct's
///   implementation block to the struct type.
/// - `#[export(dump)]` shows the generated code as a compile error. This
///   option is available in debug builds only.
///
/// ## Methods
///
/// Exported methods take the receiver as `&self`, `&mut self`, or
/// `this: Shared<Self>`. Asynchronous methods must use the latter form.
/// Parameters and results must be owned reflectable types: references and
/// `impl Trait` types cannot cross the bridge. Associated functions without a
/// receiver are not exported.
#[proc_macro_attribute]
pub fn export(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr = proc_macro2::TokenStream::from(attr);
    let attr_span = attr.span();

    let input = TokenStream::from_iter(
        TokenStream::from(quote_spanned!(attr_span=> #[export(#attr)]))
            .into_iter()
            .chain(item),
    );

    let output = parse_macro_input!(input as ExportItem);
    output.into()
}

/// Returns the `Func` object of a free function exported with the [export]
/// macro.
///
/// The argument is a path to the function: `func!(my_module::my_function)`.
#[proc_macro]
pub fn func(input: TokenStream) -> TokenStream {
    let mut path = parse_macro_input!(input as Path);

    let span = path.span();

    let Some(last) = path.segments.last_mut() else {
        return syn::Error::new(span, "Expected a function path.")
            .to_compile_error()
            .into();
    };

    let span = last.ident.span();

    last.ident = format_ident!("__tether_export_{}", last.ident, span = span);

    TokenStream::from(quote_spanned!(span=> #path()))
}
