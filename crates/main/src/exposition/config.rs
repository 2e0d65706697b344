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

use crate::bridge::BridgeConfig;

/// Configuration options of an [Exposer](crate::exposition::Exposer).
///
/// The [Default] implementation provides canonical options.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ExposerConfig {
    /// The name of the global property that holds the exposed object tree.
    ///
    /// Every exposed entity is stored under the
    /// `<root>.<app>.<package>.<name>` path of the host's global object.
    ///
    /// The default value is `"tether"`.
    pub root: &'static str,

    /// The name of the application namespace inside the root object.
    ///
    /// The default value is `"app"`.
    pub app: &'static str,

    /// The quote character of the string literals in the generated JS
    /// bindings.
    ///
    /// The default value is `'\''`.
    pub quote: char,

    /// Whether the last entry of each generated namespace object literal
    /// should end with a comma.
    ///
    /// The default value is `false`.
    pub trailing_comma: bool,

    /// The name of the generated function that assigns the exported
    /// bindings.
    ///
    /// The default value is `"initializeTether"`.
    pub init_fn: &'static str,

    /// The configuration of the bridge context that the exposer creates.
    ///
    /// The generated trampoline reads the error slot of this configuration.
    pub bridge: BridgeConfig,
}

impl Default for ExposerConfig {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl ExposerConfig {
    /// The default constructor for the configuration.
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            root: "tether",
            app: "app",
            quote: '\'',
            trailing_comma: false,
            init_fn: "initializeTether",
            bridge: BridgeConfig::new(),
        }
    }

    /// Returns a configuration with the specified application name and the
    /// default values of all other options.
    #[inline(always)]
    pub fn for_app(app: &'static str) -> Self {
        Self {
            app,
            ..Self::new()
        }
    }
}
