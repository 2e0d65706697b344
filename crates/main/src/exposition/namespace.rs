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

use compact_str::CompactString;
use log::trace;

use crate::{
    bridge::thrown_message,
    host::{HostValue, Realm},
    runtime::{BridgeError, BridgeResult},
};

/// Replaces every non-word character of a namespace segment with `_`.
pub(crate) fn sanitize(segment: &str) -> CompactString {
    segment
        .chars()
        .map(|character| match character.is_ascii_alphanumeric() || character == '_' {
            true => character,
            false => '_',
        })
        .collect()
}

/// Stores a value under the dotted `path` of the realm's global object,
/// creating the missing intermediate objects.
///
/// An intermediate segment that holds a non-object value is replaced with a
/// new object.
pub(crate) fn store(realm: &Realm, path: &[&str], value: HostValue) -> BridgeResult<()> {
    let Some((name, parents)) = path.split_last() else {
        return Err(BridgeError::invalid("a non-empty namespace path"));
    };

    let mut target = HostValue::Object(realm.global().clone());

    for segment in parents {
        let next = realm.get(&target, segment).map_err(thrown)?;

        target = match next {
            HostValue::Object(object) => HostValue::Object(object),

            _ => {
                trace!("Creating the namespace object \"{segment}\".");

                let object = HostValue::Object(realm.new_object());

                realm
                    .set(&target, segment, object.clone())
                    .map_err(thrown)?;

                object
            }
        };
    }

    realm.set(&target, name, value).map_err(thrown)
}

#[inline(always)]
fn thrown(thrown: HostValue) -> BridgeError {
    BridgeError::failure(thrown_message(&thrown))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("geometry"), "geometry");
        assert_eq!(sanitize("my-package.v2"), "my_package_v2");
        assert_eq!(sanitize("a b"), "a_b");
    }

    #[test]
    fn test_store_creates_parents() {
        let realm = Realm::new();

        store(&realm, &["root", "app", "pkg", "x"], HostValue::Number(1.0)).unwrap();
        store(&realm, &["root", "app", "pkg", "y"], HostValue::Number(2.0)).unwrap();

        let root = realm.get_global("root").unwrap();
        let app = realm.get(&root, "app").unwrap();
        let package = realm.get(&app, "pkg").unwrap();

        assert_eq!(realm.get(&package, "x").unwrap().as_number(), Some(1.0));
        assert_eq!(realm.get(&package, "y").unwrap().as_number(), Some(2.0));
    }

    #[test]
    fn test_store_replaces_scalars() {
        let realm = Realm::new();

        realm.set_global("root", HostValue::Bool(true)).unwrap();

        store(&realm, &["root", "x"], HostValue::Null).unwrap();

        let root = realm.get_global("root").unwrap();

        assert!(root.as_object().is_some());
        assert!(realm.get(&root, "x").unwrap().is_nullish());
    }
}
