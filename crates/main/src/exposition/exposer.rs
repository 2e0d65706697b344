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

use log::debug;

use crate::{
    bridge::Bridge,
    exposition::{
        bindings::render_bindings,
        config::ExposerConfig,
        declaration::render_declarations,
        definition::{DefinitionTree, Entity},
        namespace::{sanitize, store},
    },
    host::Realm,
    runtime::{BridgeResult, Func, Reflect},
};

/// Exposes compiled functions and values to the host under the application
/// namespace, and generates the matching TypeScript declarations and JS
/// bindings.
///
/// Each exposed entity is stored under the `<root>.<app>.<package>.<name>`
/// path of the host's global object. Package and entity names are sanitized:
/// every non-word character turns into `_`.
///
/// ```
/// use tether::{
///     exposition::{Exposer, ExposerConfig},
///     host::Realm,
///     runtime::Func,
/// };
///
/// let realm = Realm::new();
/// let mut exposer = Exposer::new(ExposerConfig::for_app("demo"));
///
/// let add = Func::new("add", |a: u32, b: u32| a + b).with_params(&["a", "b"]);
///
/// exposer.expose_fn(&realm, "math", &add).unwrap();
///
/// let (declarations, _bindings) = exposer.build();
///
/// assert!(declarations.contains("function add(a: number, b: number): number;"));
/// ```
pub struct Exposer {
    config: ExposerConfig,
    bridge: Bridge,
    tree: DefinitionTree,
}

impl Exposer {
    /// Creates an exposer with a new bridge context.
    pub fn new(config: ExposerConfig) -> Self {
        let bridge = Bridge::new(config.bridge.clone());

        Self {
            config,
            bridge,
            tree: DefinitionTree::default(),
        }
    }

    /// Returns the configuration of this exposer.
    #[inline(always)]
    pub fn config(&self) -> &ExposerConfig {
        &self.config
    }

    /// Returns the bridge context that converts the exposed entities.
    #[inline(always)]
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Bridges a compiled function and stores it under the `package`
    /// namespace. The function's own name is the entity name.
    ///
    /// The host function runs in promise mode if the function has the promise
    /// marker, is asynchronous, or accepts a callable parameter.
    #[inline(always)]
    pub fn expose_fn(&mut self, realm: &Realm, package: &str, func: &Func) -> BridgeResult<()> {
        self.expose_fn_with(realm, package, func, false)
    }

    /// Same as [expose_fn](Self::expose_fn), but forces the promise mode if
    /// `promise` is true.
    pub fn expose_fn_with(
        &mut self,
        realm: &Realm,
        package: &str,
        func: &Func,
        promise: bool,
    ) -> BridgeResult<()> {
        let package = sanitize(package);
        let name = sanitize(func.signature().name);

        self.tree.ensure_unique(&package, &name)?;

        let function = self.bridge.bridge_func_with(realm, func, promise)?;

        let mut signature = func.signature().clone();
        signature.promise |= promise;

        self.tree.add_entity(
            self.bridge.config(),
            package.clone(),
            name.clone(),
            Entity::Function(signature),
        )?;

        store(
            realm,
            &[self.config.root, self.config.app, package.as_str(), name.as_str()],
            function,
        )?;

        debug!("Exposed function \"{package}.{name}\".");

        Ok(())
    }

    /// Converts a compiled value and stores it under the `package` namespace
    /// with the specified `name`.
    pub fn expose_value(
        &mut self,
        realm: &Realm,
        package: &str,
        name: &str,
        value: &dyn Reflect,
    ) -> BridgeResult<()> {
        let package = sanitize(package);
        let name = sanitize(name);

        self.tree.ensure_unique(&package, &name)?;

        let host = self.bridge.to_host(realm, value)?;

        self.tree.add_entity(
            self.bridge.config(),
            package.clone(),
            name.clone(),
            Entity::Value(value.descriptor()),
        )?;

        store(
            realm,
            &[self.config.root, self.config.app, package.as_str(), name.as_str()],
            host,
        )?;

        debug!("Exposed value \"{package}.{name}\" of \"{}\".", value.descriptor());

        Ok(())
    }

    /// Renders the TypeScript declarations and the JS bindings of everything
    /// exposed so far.
    ///
    /// Packages, definitions and entities are sorted by name, so the output
    /// does not depend on the exposure order.
    pub fn build(&self) -> (String, String) {
        let declarations = render_declarations(&self.config, &self.tree);
        let bindings = render_bindings(&self.config, &self.tree);

        (
            String::from(declarations.trim()),
            String::from(bindings.trim()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::BridgeError;

    fn add(a: u32, b: u32) -> u32 {
        a + b
    }

    #[test]
    fn test_bindings() {
        let realm = Realm::new();
        let mut exposer = Exposer::new(ExposerConfig::new());

        let func = Func::new("add", add).with_params(&["a", "b"]);

        exposer.expose_fn(&realm, "my-math", &func).unwrap();
        exposer
            .expose_value(&realm, "my-math", "limit", &100u32)
            .unwrap();

        let (declarations, bindings) = exposer.build();

        assert!(declarations.contains("export declare namespace my_math {"));
        assert!(declarations.contains("const limit: number;"));
        assert!(declarations.contains("function add(a: number, b: number): number;"));

        assert!(bindings.starts_with("const wrap = (fn) => {"));
        assert!(bindings.contains("if (globalThis['__tetherError']) {"));
        assert!(bindings.contains("export let my_math;"));
        assert!(bindings.ends_with(
            "export const initializeTether = () => {\n  \
            my_math = {\n    \
            add: wrap(globalThis['tether']['app']['my_math']['add']),\n    \
            limit: globalThis['tether']['app']['my_math']['limit']\n  \
            };\n\
            };",
        ));

        let root = realm.get_global("tether").unwrap();
        let app = realm.get(&root, "app").unwrap();
        let package = realm.get(&app, "my_math").unwrap();

        assert_eq!(realm.get(&package, "limit").unwrap().as_number(), Some(100.0));
    }

    #[test]
    fn test_duplicate_entity() {
        let realm = Realm::new();
        let mut exposer = Exposer::new(ExposerConfig::for_app("demo"));

        exposer.expose_value(&realm, "pkg", "x", &1u8).unwrap();

        let error = exposer.expose_value(&realm, "pkg", "x", &2u8).unwrap_err();

        assert!(matches!(error, BridgeError::BuildFailure { .. }));

        let root = realm.get_global("tether").unwrap();
        let app = realm.get(&root, "demo").unwrap();
        let package = realm.get(&app, "pkg").unwrap();

        assert_eq!(realm.get(&package, "x").unwrap().as_number(), Some(1.0));
    }
}
