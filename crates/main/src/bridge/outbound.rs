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

use std::rc::Rc;

use compact_str::CompactString;
use log::error;

use crate::{
    bridge::{mirror::mirror, Bridge},
    host::{HostValue, Property, Realm},
    runtime::{
        BridgeError,
        BridgeResult,
        ErasedCell,
        FunctionValue,
        Reflect,
        TypeDescriptor,
        TypeKind,
        View,
    },
};

/// Converts a compiled value into a host value.
///
/// If `not_nil` is true, an absent sequence, byte buffer or mapping becomes an
/// empty host container instead of `undefined`.
pub(super) fn convert(
    bridge: &Bridge,
    realm: &Realm,
    value: &dyn Reflect,
    not_nil: bool,
) -> BridgeResult<HostValue> {
    match value.view() {
        View::Bool(value) => Ok(HostValue::Bool(value)),

        // Integers beyond 2^53 lose precision.
        View::Int(value) => Ok(HostValue::Number(value as f64)),
        View::Uint(value) => Ok(HostValue::Number(value as f64)),

        View::Float(value) => Ok(HostValue::Number(value)),

        View::Str(value) => Ok(HostValue::String(CompactString::from(value))),

        View::Bytes(bytes) => Ok(realm.new_buffer(bytes)),

        View::Sequence(sequence) => {
            let mut elements = Vec::with_capacity(sequence.len());

            for index in 0..sequence.len() {
                let Some(element) = sequence.element(index) else {
                    return Err(BridgeError::invalid(format!(
                        "element {index} of a sequence with {} elements",
                        sequence.len(),
                    )));
                };

                elements.push(convert(bridge, realm, element, false)?);
            }

            Ok(realm.new_array(elements))
        }

        View::Mapping(mapping) => {
            let object = realm.new_object();

            for (key, value) in mapping.entries() {
                let key = convert(bridge, realm, key, false)?.to_property_key();
                let value = convert(bridge, realm, value, false)?;

                object.define(key, Property::Data(value));
            }

            Ok(HostValue::Object(object))
        }

        View::Optional(Some(inner)) => convert(bridge, realm, inner, not_nil),

        View::Optional(None) => match not_nil {
            true => Ok(empty(realm, value.descriptor())),
            false => Ok(HostValue::Undefined),
        },

        View::Pointer(inner) => convert(bridge, realm, inner, not_nil),

        View::Shared(cell) => shared(bridge, realm, cell, not_nil),

        View::Record => snapshot(bridge, realm, value),

        View::Function(FunctionValue::Nil) => Ok(HostValue::Undefined),

        View::Function(FunctionValue::Host(function)) => Ok(HostValue::Object(function.clone())),

        View::Function(FunctionValue::Compiled(func)) => bridge.bridge_func(realm, func),

        View::Error(message) => Ok(realm.new_error(message)),

        View::Unsupported(kind) => {
            let descriptor = value.descriptor();

            error!(
                "Cannot convert a value of \"{descriptor}\": {} values are not supported.",
                kind.shape(),
            );

            Err(BridgeError::unsupported(descriptor, kind.shape()))
        }
    }
}

fn shared(
    bridge: &Bridge,
    realm: &Realm,
    cell: Rc<dyn ErasedCell>,
    not_nil: bool,
) -> BridgeResult<HostValue> {
    if let Some(meta) = cell.descriptor().record() {
        return mirror(bridge, realm, cell, meta);
    }

    let content = cell.read()?;

    convert(bridge, realm, &*content, not_nil)
}

// A record held by value has no stable address, so the host receives a
// detached copy of its exported fields.
fn snapshot(bridge: &Bridge, realm: &Realm, value: &dyn Reflect) -> BridgeResult<HostValue> {
    let descriptor = value.descriptor();

    let Some(meta) = descriptor.record() else {
        return Err(BridgeError::invalid(format!(
            "an exported struct instead of \"{descriptor}\"",
        )));
    };

    let object = realm.new_object();

    for field in &meta.fields {
        let Some(field_value) = (field.get)(value.as_any()) else {
            continue;
        };

        let field_value = convert(bridge, realm, field_value, field.not_nil)?;

        object.define(field.name, Property::Data(field_value));
    }

    Ok(HostValue::Object(object))
}

// The empty host container for an absent value of an optional type.
fn empty(realm: &Realm, descriptor: &TypeDescriptor) -> HostValue {
    let TypeKind::Optional { inner, .. } = descriptor.kind() else {
        return HostValue::Undefined;
    };

    match inner().kind() {
        TypeKind::Bytes => realm.new_buffer(&[]),
        TypeKind::Sequence { .. } | TypeKind::Array { .. } => realm.new_array(Vec::new()),
        TypeKind::Mapping { .. } => HostValue::Object(realm.new_object()),
        _ => HostValue::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::{
        host::ObjectKind,
        runtime::{SequenceView, Shared},
    };

    // Reports more elements than it can lend.
    struct Truncated(Vec<u32>);

    impl Reflect for Truncated {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::new::<Self>(TypeKind::Sequence {
                element: TypeDescriptor::of::<u32>,
                assemble: |_| Ok(Box::new(Truncated(Vec::new()))),
            })
        }

        fn view(&self) -> View<'_> {
            View::Sequence(self)
        }
    }

    impl SequenceView for Truncated {
        fn len(&self) -> usize {
            self.0.len() + 1
        }

        fn element(&self, index: usize) -> Option<&dyn Reflect> {
            self.0.get(index).map(|element| element as &dyn Reflect)
        }
    }

    #[test]
    fn test_not_nil_containers() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let sequence = convert(&bridge, &realm, &None::<Vec<u32>>, true).unwrap();
        assert_eq!(sequence.as_object().unwrap().kind(), ObjectKind::Array);

        let bytes = convert(&bridge, &realm, &None::<Vec<u8>>, true).unwrap();
        assert_eq!(bytes.as_object().unwrap().length(), Some(0));
        assert_eq!(bytes.as_object().unwrap().kind(), ObjectKind::Buffer);

        let mapping = convert(
            &bridge,
            &realm,
            &None::<std::collections::HashMap<String, u8>>,
            true,
        )
        .unwrap();
        assert_eq!(mapping.as_object().unwrap().kind(), ObjectKind::Plain);

        let scalar = convert(&bridge, &realm, &None::<u8>, true).unwrap();
        assert!(scalar.is_undefined());
    }

    #[test]
    fn test_sequences() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let deque = VecDeque::from([String::from("a"), String::from("b")]);
        let host = bridge.to_host(&realm, &deque).unwrap();

        assert_eq!(realm.get(&host, "length").unwrap().as_number(), Some(2.0));
        assert_eq!(realm.get(&host, "1").unwrap().as_str(), Some("b"));

        let array = bridge.to_host(&realm, &[1.5f64, 2.5]).unwrap();
        assert_eq!(realm.get(&array, "0").unwrap().as_number(), Some(1.5));
    }

    #[test]
    fn test_shared_scalar() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let cell = Shared::new(Some(Box::new(7u8)));
        let host = bridge.to_host(&realm, &cell).unwrap();

        assert_eq!(host.as_number(), Some(7.0));
        assert_eq!(bridge.cache_len(), 0);
    }

    #[test]
    fn test_missing_sequence_element() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let error = bridge.to_host(&realm, &Truncated(vec![1, 2])).unwrap_err();

        assert!(matches!(error, BridgeError::InvalidValue { .. }));
        assert_eq!(
            error.to_string(),
            "Invalid value: element 2 of a sequence with 3 elements.",
        );
    }
}
