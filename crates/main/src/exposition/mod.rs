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

//! Exposure of compiled entities under the host's namespace tree and
//! generation of the matching TypeScript declarations and JS bindings.
//!
//! The [Exposer] stores every exposed function or value under the
//! `<root>.<app>.<package>.<name>` path of the host's global object, and keeps
//! a definition registry of the exposed entities and of every exported struct
//! reachable from them. The [Exposer::build] function renders this registry
//! into two files:
//!
//!  - A TypeScript declaration file with one `namespace` per package that
//!    declares the exported structs as interfaces and the exposed entities as
//!    functions and constants.
//!  - A JS module that exports one binding per package and an initializer
//!    function assigning these bindings. The exposed functions are wrapped
//!    into a trampoline that re-throws the failures of synchronous calls.

mod bindings;
mod config;
mod declaration;
mod definition;
mod exposer;
mod namespace;

pub use crate::exposition::{config::ExposerConfig, exposer::Exposer};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::{HostValue, Realm},
        runtime::Func,
    };

    fn exposer(realm: &Realm) -> Exposer {
        let mut exposer = Exposer::new(ExposerConfig::for_app("demo"));

        let add = Func::new("add", |a: u32, b: u32| a + b).with_params(&["a", "b"]);
        let split = Func::new("split", |value: u32| (value / 10, value % 10)).with_params(&["value"]);
        let later = Func::future("later", |value: u32| async move { value }).with_params(&["value"]);

        exposer.expose_fn(realm, "math", &add).unwrap();
        exposer.expose_fn(realm, "math", &split).unwrap();
        exposer.expose_fn(realm, "math", &later).unwrap();

        exposer
            .expose_value(realm, "values", "primes", &vec![2u16, 3, 5])
            .unwrap();
        exposer
            .expose_value(realm, "values", "label", &Some(String::from("x")))
            .unwrap();

        exposer
    }

    #[test]
    fn test_declarations() {
        let realm = Realm::new();
        let (declarations, _) = exposer(&realm).build();

        assert_eq!(
            declarations,
            r#"export declare namespace math {
  function add(a: number, b: number): number;
  function later(value: number): Promise<number>;
  function split(value: number): [number, number];
}
export declare namespace values {
  const label: string | undefined;
  const primes: Array<number>;
}
export const initializeTether: () => void;"#,
        );
    }

    #[test]
    fn test_bindings() {
        let realm = Realm::new();
        let (_, bindings) = exposer(&realm).build();

        assert_eq!(
            bindings,
            r#"const wrap = (fn) => {
  return (...args) => {
    const result = fn.call(undefined, ...args);
    if (globalThis['__tetherError']) {
      const error = new Error(globalThis['__tetherError']);
      globalThis['__tetherError'] = undefined;
      throw error;
    }
    return result;
  }
};

export let math;
export let values;

export const initializeTether = () => {
  math = {
    add: wrap(globalThis['tether']['demo']['math']['add']),
    later: wrap(globalThis['tether']['demo']['math']['later']),
    split: wrap(globalThis['tether']['demo']['math']['split'])
  };
  values = {
    label: globalThis['tether']['demo']['values']['label'],
    primes: globalThis['tether']['demo']['values']['primes']
  };
};"#,
        );
    }

    #[test]
    fn test_namespace_storage() {
        let realm = Realm::new();
        let _exposer = exposer(&realm);

        let root = realm.get_global("tether").unwrap();
        let app = realm.get(&root, "demo").unwrap();
        let math = realm.get(&app, "math").unwrap();
        let add = realm.get(&math, "add").unwrap();

        let sum = realm
            .call(
                &add,
                &HostValue::Undefined,
                &[HostValue::Number(40.0), HostValue::Number(2.0)],
            )
            .unwrap();

        assert_eq!(sum.as_number(), Some(42.0));

        let values = realm.get(&app, "values").unwrap();
        let label = realm.get(&values, "label").unwrap();

        assert_eq!(label.as_str(), Some("x"));
    }

    #[test]
    fn test_duplicates_and_sanitizing() {
        let realm = Realm::new();
        let mut exposer = Exposer::new(ExposerConfig::new());

        exposer.expose_value(&realm, "my-pkg", "a b", &1u8).unwrap();

        let duplicate = exposer.expose_value(&realm, "my-pkg", "a_b", &2u8);

        assert!(duplicate.is_err());

        let root = realm.get_global("tether").unwrap();
        let app = realm.get(&root, "app").unwrap();
        let package = realm.get(&app, "my_pkg").unwrap();

        assert_eq!(realm.get(&package, "a_b").unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn test_forced_promise() {
        let realm = Realm::new();
        let mut exposer = Exposer::new(ExposerConfig::new());

        let config = ExposerConfig {
            trailing_comma: true,
            quote: '"',
            ..ExposerConfig::new()
        };

        let mut quoted = Exposer::new(config);

        let double = Func::new("double", |value: f64| value * 2.0);

        exposer.expose_fn_with(&realm, "math", &double, true).unwrap();
        quoted.expose_fn(&realm, "other", &double).unwrap();

        let (declarations, _) = exposer.build();

        assert!(declarations.contains("function double(arg0: number): Promise<number>;"));

        let (_, bindings) = quoted.build();

        assert!(bindings.contains(r#"double: wrap(globalThis["tether"]["app"]["other"]["double"]),"#));
        assert!(bindings.contains(r#"if (globalThis["__tetherError"])"#));
    }
}
