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

use ahash::{AHashMap, AHashSet};

/// Configuration options of a [Bridge](crate::bridge::Bridge).
///
/// The [Default] implementation provides canonical options. The method tables
/// are keyed by the user-facing type name (e.g., `"Point"`) and the exported
/// method name.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct BridgeConfig {
    /// The name of the global property that receives the failure text of a
    /// synchronous bridged call. The trampoline (see
    /// [Bridge::trampoline](crate::bridge::Bridge::trampoline)) re-throws the
    /// stored text as a host `Error` and clears the property.
    ///
    /// The default value is `"__tetherError"`.
    pub error_slot: &'static str,

    /// The methods that are never installed on mirrors, even if they are
    /// exported.
    ///
    /// The default table is empty.
    pub denied_methods: AHashMap<&'static str, AHashSet<&'static str>>,

    /// The methods that always run in promise mode, in addition to the methods
    /// with the explicit `#[export(promise)]` marker.
    ///
    /// The default table is empty.
    pub promise_methods: AHashMap<&'static str, AHashSet<&'static str>>,
}

impl Default for BridgeConfig {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeConfig {
    /// The default constructor for this configuration object.
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            error_slot: "__tetherError",
            denied_methods: AHashMap::new(),
            promise_methods: AHashMap::new(),
        }
    }

    /// Adds a method to the deny table.
    #[inline(always)]
    pub fn deny_method(mut self, type_name: &'static str, method: &'static str) -> Self {
        let _ = self
            .denied_methods
            .entry(type_name)
            .or_default()
            .insert(method);

        self
    }

    /// Adds a method to the promise-override table.
    #[inline(always)]
    pub fn promise_method(mut self, type_name: &'static str, method: &'static str) -> Self {
        let _ = self
            .promise_methods
            .entry(type_name)
            .or_default()
            .insert(method);

        self
    }

    #[inline(always)]
    pub(crate) fn is_denied(&self, type_name: &str, method: &str) -> bool {
        self.denied_methods
            .get(type_name)
            .map(|methods| methods.contains(method))
            .unwrap_or(false)
    }

    #[inline(always)]
    pub(crate) fn is_promise_override(&self, type_name: &str, method: &str) -> bool {
        self.promise_methods
            .get(type_name)
            .map(|methods| methods.contains(method))
            .unwrap_or(false)
    }
}
