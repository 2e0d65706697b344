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

//! A reference single-threaded host realm.
//!
//! The realm models the parts of a JavaScript-like engine that the bridge
//! relies on: values and reference-counted objects with ordered data and
//! accessor properties, functions, byte buffers, error objects, promises with
//! `then`/`catch` reactions, a job queue, a finalization queue for reclaimed
//! objects, and a local executor for compiled asynchronous tasks.

mod object;
mod promise;
mod realm;
mod value;

pub(crate) use crate::host::{
    object::{FinalizationQueue, ObjectClass},
    promise::PromiseSlot,
};
pub use crate::host::{
    object::{HostObject, NativeFunction, ObjectKind, Property, WeakHostObject},
    promise::{PromiseResolvers, PromiseState},
    realm::{Realm, WeakRealm},
    value::{format_number, HostResult, HostValue},
};
