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

//! # Tether
//!
//! Tether is a type-directed value bridge between compiled Rust code and a
//! single-threaded dynamic host, such as a JavaScript engine.
//!
//! The bridge converts Rust values into host values and back, guided by the
//! static type descriptors of the Rust types. It exposes Rust functions to
//! the host, wraps host functions into typed Rust callables, and keeps
//! shared Rust objects and their host-side mirrors in a stable one-to-one
//! relation.
//!
//! ## Crate Structure
//!
//! - The [runtime] module describes the Rust side of the bridge: the
//!   [Reflect](runtime::Reflect) trait, type descriptors, function objects,
//!   shared cells, and error types.
//! - The [host] module is a reference implementation of the host realm: a
//!   dynamic value model with objects, arrays, byte buffers, functions,
//!   promises, and a job queue.
//! - The [bridge] module contains the converters, the function bridge, the
//!   identity cache, and the mirrors.
//! - The [exposition] module exposes compiled entities under the host's
//!   namespace tree and generates the matching TypeScript declarations and
//!   JS bindings.
//!
//! Use the [export] attribute macro to make your structs, their methods, and
//! free functions available to the bridge, and the [func] macro to obtain the
//! function object of an exported free function.
//!
//! ```
//! use tether::{bridge::{Bridge, BridgeConfig}, host::Realm};
//!
//! let realm = Realm::new();
//! let bridge = Bridge::new(BridgeConfig::new());
//!
//! let host = bridge.to_host(&realm, &vec![1u8, 2, 3]).unwrap();
//! let back = bridge.from_host::<Vec<u8>>(&realm, &host).unwrap();
//!
//! assert_eq!(back, [1, 2, 3]);
//! ```

extern crate self as tether;

pub mod bridge;
pub mod exposition;
pub mod host;
pub mod runtime;

pub use tether_export::{export, func};
