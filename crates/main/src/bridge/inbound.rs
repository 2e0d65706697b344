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

use std::{any::TypeId, rc::Rc};

use futures::FutureExt;
use log::{error, trace};

use crate::{
    bridge::{
        alive,
        mirror::mirror_link,
        settle::{settle, thrown_message},
        unsupported,
        Bridge,
        Converter,
        ConverterSlot,
    },
    host::{format_number, HostObject, HostValue, Realm, WeakRealm},
    runtime::{
        AnyValue,
        BridgeError,
        BridgeResult,
        Failure,
        HostCallable,
        Outputs,
        TypeDescriptor,
        TypeKind,
    },
};

/// Builds the inbound converter of a type.
///
/// The converters of nested types are resolved through the bridge's slots and
/// registered in the `transaction`.
pub(super) fn build(
    bridge: &Bridge,
    descriptor: &'static TypeDescriptor,
    transaction: &mut Vec<TypeId>,
) -> BridgeResult<Converter> {
    Ok(match descriptor.kind() {
        TypeKind::Bool => converter(descriptor, move |_, _, value| match value {
            HostValue::Bool(value) => Ok(Box::new(*value)),
            _ => Err(mismatch(descriptor, value, "a boolean")),
        }),

        TypeKind::Int { signed, make, .. } => {
            let signed = *signed;
            let make = *make;

            converter(descriptor, move |_, _, value| {
                let wide = match value {
                    HostValue::Number(number) => integral(descriptor, *number, signed)?,

                    HostValue::String(string) => match string.trim().parse::<i128>() {
                        Ok(wide) => wide,

                        Err(_) => match string.trim().parse::<f64>() {
                            Ok(number) => integral(descriptor, number, signed)?,
                            Err(_) => {
                                return Err(BridgeError::conversion(
                                    descriptor,
                                    printable(value),
                                    "the string is not a number",
                                ))
                            }
                        },
                    },

                    _ => return Err(mismatch(descriptor, value, "a number")),
                };

                make(wide).ok_or_else(|| {
                    BridgeError::conversion(descriptor, printable(value), "the number is out of range")
                })
            })
        }

        TypeKind::Float { make, .. } => {
            let make = *make;

            converter(descriptor, move |_, _, value| match value {
                HostValue::Number(number) => Ok(make(*number)),

                HostValue::String(string) => match string.trim().parse::<f64>() {
                    Ok(number) => Ok(make(number)),
                    Err(_) => Err(BridgeError::conversion(
                        descriptor,
                        printable(value),
                        "the string is not a number",
                    )),
                },

                _ => Err(mismatch(descriptor, value, "a number")),
            })
        }

        TypeKind::String => converter(descriptor, move |_, _, value| match value {
            HostValue::String(string) => Ok(Box::new(string.to_string())),
            HostValue::Number(..) | HostValue::Bool(..) => Ok(Box::new(value.to_string())),
            _ => Err(mismatch(descriptor, value, "a string")),
        }),

        TypeKind::Bytes => converter(descriptor, move |_, _, value| {
            if let Some(object) = value.as_object() {
                if let Some(bytes) = object.with_buffer(<[u8]>::to_vec) {
                    return Ok(Box::new(bytes));
                }

                if let Some(elements) = object.array_elements() {
                    let mut bytes = Vec::with_capacity(elements.len());

                    for element in &elements {
                        let byte = element
                            .as_number()
                            .and_then(|number| cast::u8(number).ok())
                            .ok_or_else(|| {
                                BridgeError::conversion(
                                    descriptor,
                                    printable(element),
                                    "expected a byte",
                                )
                            })?;

                        bytes.push(byte);
                    }

                    return Ok(Box::new(bytes));
                }
            }

            Err(mismatch(descriptor, value, "a byte buffer"))
        }),

        TypeKind::Sequence { element, assemble } | TypeKind::Array {
            element, assemble, ..
        } => {
            let slot = bridge.converter_slot(element(), transaction)?;
            let assemble = *assemble;

            converter(descriptor, move |bridge, realm, value| {
                let elements = elements(value).ok_or_else(|| mismatch(descriptor, value, "an array"))?;

                let converted = elements
                    .iter()
                    .map(|element| slot.convert(bridge, realm, element))
                    .collect::<BridgeResult<Vec<_>>>()?;

                assemble(converted)
            })
        }

        TypeKind::Mapping {
            key,
            value,
            assemble,
        } => {
            let key_slot = bridge.converter_slot(key(), transaction)?;
            let value_slot = bridge.converter_slot(value(), transaction)?;
            let assemble = *assemble;

            converter(descriptor, move |bridge, realm, value| {
                let Some(object) = value.as_object() else {
                    return Err(mismatch(descriptor, value, "an object"));
                };

                let entries = realm
                    .entries(object)
                    .map_err(|thrown| BridgeError::failure(thrown_message(&thrown)))?;

                let mut converted = Vec::with_capacity(entries.len());

                for (key, value) in entries {
                    let key = key_slot.convert(bridge, realm, &HostValue::String(key))?;
                    let value = value_slot.convert(bridge, realm, &value)?;

                    converted.push((key, value));
                }

                assemble(converted)
            })
        }

        TypeKind::Optional { inner, wrap } => {
            let slot = bridge.converter_slot(inner(), transaction)?;
            let wrap = *wrap;

            converter(descriptor, move |bridge, realm, value| {
                wrap(Some(slot.convert(bridge, realm, value)?))
            })
        }

        TypeKind::Pointer { inner, wrap } => {
            let slot = bridge.converter_slot(inner(), transaction)?;
            let wrap = *wrap;

            converter(descriptor, move |bridge, realm, value| {
                wrap(slot.convert(bridge, realm, value)?)
            })
        }

        TypeKind::Shared { inner, wrap, adopt } => {
            let inner = inner();
            let slot = bridge.converter_slot(inner, transaction)?;
            let wrap = *wrap;
            let adopt = *adopt;

            converter(descriptor, move |bridge, realm, value| {
                if let Some(link) = mirror_link(value) {
                    if link.cell().descriptor().id() == inner.id() {
                        if let Some(cell) = adopt(link.cell().clone()) {
                            trace!("Adopted a \"{descriptor}\" cell from its mirror.");

                            return Ok(cell);
                        }
                    }
                }

                wrap(slot.convert(bridge, realm, value)?)
            })
        }

        TypeKind::Record(meta) => {
            let mut fields = Vec::with_capacity(meta.fields.len());

            for field in &meta.fields {
                fields.push((field, bridge.converter_slot((field.ty)(), transaction)?));
            }

            converter(descriptor, move |bridge, realm, value| {
                if value.as_object().is_none() {
                    return Err(mismatch(descriptor, value, "an object"));
                }

                let mut record = zero(descriptor)?;

                for (field, slot) in &fields {
                    let field_value = realm
                        .get(value, field.name)
                        .map_err(|thrown| BridgeError::failure(thrown_message(&thrown)))?;

                    let converted = slot.convert(bridge, realm, &field_value)?;

                    (field.set)(&mut *record, converted)?;
                }

                Ok(record)
            })
        }

        TypeKind::Function(meta) => {
            for param in (meta.params)() {
                if let Some(found) = param().find_unsupported() {
                    error!(
                        "Cannot build a converter of \"{descriptor}\": parameter type \"{found}\" \
                        is not supported.",
                    );

                    return Err(unsupported(found));
                }
            }

            let mut results = Vec::new();

            for result in (meta.results)() {
                results.push(bridge.converter_slot(result(), transaction)?);
            }

            let results: Rc<[Rc<ConverterSlot>]> = results.into();
            let from_host = meta.from_host;

            converter(descriptor, move |bridge, realm, value| {
                match value.as_object().filter(|_| value.is_callable()) {
                    Some(function) => Ok(from_host(host_callable(
                        bridge,
                        realm,
                        function.clone(),
                        results.clone(),
                    ))),

                    None => Err(mismatch(descriptor, value, "a function")),
                }
            })
        }

        TypeKind::Error => converter(descriptor, |_, _, value| {
            Ok(Box::new(Failure::new(thrown_message(value))))
        }),

        TypeKind::Unsupported(kind) => {
            error!(
                "Cannot build a converter of \"{descriptor}\": {} values are not supported.",
                kind.shape(),
            );

            return Err(BridgeError::unsupported(descriptor, kind.shape()));
        }
    })
}

// Wraps a conversion function with the absent value handling shared by all
// kinds: `undefined` and `null` become the zero value of the type.
fn converter(
    descriptor: &'static TypeDescriptor,
    convert: impl Fn(&Bridge, &Realm, &HostValue) -> BridgeResult<AnyValue> + 'static,
) -> Converter {
    Rc::new(move |bridge, realm, value| {
        if value.is_nullish() {
            return zero(descriptor);
        }

        convert(bridge, realm, value)
    })
}

#[inline(always)]
fn zero(descriptor: &'static TypeDescriptor) -> BridgeResult<AnyValue> {
    descriptor.zero().ok_or_else(|| {
        BridgeError::invalid(format!("a zero value of \"{descriptor}\""))
    })
}

// Truncates a host number towards zero.
fn integral(descriptor: &'static TypeDescriptor, number: f64, signed: bool) -> BridgeResult<i128> {
    if !number.is_finite() {
        return Err(BridgeError::conversion(
            descriptor,
            format_number(number),
            "the number is not finite",
        ));
    }

    let wide = match signed {
        true => cast::i64(number).map(i128::from),
        false => cast::u64(number).map(i128::from),
    };

    wide.map_err(|error| BridgeError::conversion(descriptor, format_number(number), error.to_string()))
}

fn elements(value: &HostValue) -> Option<Vec<HostValue>> {
    let object = value.as_object()?;

    if let Some(elements) = object.array_elements() {
        return Some(elements);
    }

    object.with_buffer(|bytes| {
        bytes
            .iter()
            .map(|byte| HostValue::Number(*byte as f64))
            .collect()
    })
}

fn host_callable(
    bridge: &Bridge,
    realm: &Realm,
    function: HostObject,
    results: Rc<[Rc<ConverterSlot>]>,
) -> HostCallable {
    let bridge = bridge.clone();
    let weak = realm.downgrade();
    let target = HostValue::Object(function.clone());

    HostCallable::new(function, move |args: Outputs| {
        let bridge = bridge.clone();
        let weak = weak.clone();
        let target = target.clone();
        let results = results.clone();

        async move {
            let pending = {
                let realm = alive(&weak)?;

                let args = args
                    .iter()
                    .map(|arg| bridge.to_host(&realm, &**arg))
                    .collect::<BridgeResult<Vec<_>>>()?;

                let returned = realm
                    .call(&target, &HostValue::Undefined, &args)
                    .map_err(|thrown| BridgeError::failure(thrown_message(&thrown)))?;

                settle(&realm, returned)
            };

            let resolved = pending.await?;
            let realm = alive(&weak)?;

            spread(&bridge, &realm, &results, resolved)
        }
        .boxed_local()
    })
}

// Distributes the settled value of a host function over the declared
// results: several results are read from the elements of a host array.
fn spread(
    bridge: &Bridge,
    realm: &Realm,
    results: &[Rc<ConverterSlot>],
    resolved: HostValue,
) -> BridgeResult<Vec<AnyValue>> {
    match results {
        [] => Ok(Vec::new()),

        [single] => Ok(vec![single.convert(bridge, realm, &resolved)?]),

        _ => {
            let elements = resolved
                .as_object()
                .and_then(HostObject::array_elements)
                .ok_or_else(|| {
                    BridgeError::invalid(format!("an array of {} results", results.len()))
                })?;

            results
                .iter()
                .enumerate()
                .map(|(index, slot)| {
                    let element = elements.get(index).cloned().unwrap_or_default();

                    slot.convert(bridge, realm, &element)
                })
                .collect()
        }
    }
}

#[inline(always)]
fn mismatch(descriptor: &'static TypeDescriptor, value: &HostValue, expected: &str) -> BridgeError {
    BridgeError::conversion(descriptor, printable(value), format!("expected {expected}"))
}

fn printable(value: &HostValue) -> String {
    match value {
        HostValue::String(string) => format!("\"{string}\""),
        HostValue::Object(object) => format!("[object {:?}]", object.kind()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::BTreeMap};

    use super::*;
    use crate::runtime::{Callback, Shared};

    #[test]
    fn test_bytes_from_array() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let array = realm.new_array(vec![HostValue::Number(1.0), HostValue::Number(255.0)]);

        assert_eq!(
            bridge.from_host::<Vec<u8>>(&realm, &array).unwrap(),
            vec![1, 255],
        );

        let invalid = realm.new_array(vec![HostValue::Number(256.0)]);

        assert!(bridge.from_host::<Vec<u8>>(&realm, &invalid).is_err());
    }

    #[test]
    fn test_fixed_array_length() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let pair = realm.new_array(vec![HostValue::Number(1.0), HostValue::Number(2.0)]);
        assert_eq!(bridge.from_host::<[u32; 2]>(&realm, &pair).unwrap(), [1, 2]);

        let triple = realm.new_array(vec![
            HostValue::Number(1.0),
            HostValue::Number(2.0),
            HostValue::Number(3.0),
        ]);

        assert!(matches!(
            bridge.from_host::<[u32; 2]>(&realm, &triple),
            Err(BridgeError::ArityMismatch {
                expected: 2,
                actual: 3
            }),
        ));
    }

    #[test]
    fn test_nested_shapes() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let inner = realm.new_object();
        inner.define(
            "a",
            crate::host::Property::Data(realm.new_array(vec![HostValue::from("x")])),
        );

        let value = bridge
            .from_host::<BTreeMap<String, Option<Vec<String>>>>(&realm, &HostValue::Object(inner))
            .unwrap();

        assert_eq!(
            value.get("a").cloned().flatten(),
            Some(vec![String::from("x")]),
        );
    }

    #[test]
    fn test_shared_wraps_plain_values() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let cell = bridge
            .from_host::<Shared<u32>>(&realm, &HostValue::Number(5.0))
            .unwrap();

        assert_eq!(*cell.borrow(), 5);
    }

    #[test]
    fn test_host_callback() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let function = realm.new_function("add", |_, _, args| {
            let sum = args.iter().filter_map(HostValue::as_number).sum::<f64>();

            Ok(HostValue::Number(sum))
        });

        let callback = bridge
            .from_host::<Callback<(u32, u32), u32>>(&realm, &function)
            .unwrap();

        assert!(callback
            .host_function()
            .unwrap()
            .ptr_eq(function.as_object().unwrap()));

        let outcome = Rc::new(RefCell::new(None));

        {
            let outcome = outcome.clone();

            realm.spawn(async move {
                *outcome.borrow_mut() = Some(callback.call((2, 3)).await);
            });
        }

        realm.run_until_idle();

        assert_eq!(outcome.borrow_mut().take().unwrap().unwrap(), 5);
    }

    #[test]
    fn test_host_callback_multiple_results() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let function = realm.new_function("pair", |realm, _, _| {
            let (promise, resolvers) = realm.new_promise();

            resolvers.resolve(
                realm,
                realm.new_array(vec![HostValue::from("left"), HostValue::Bool(true)]),
            );

            Ok(HostValue::Object(promise))
        });

        let callback = bridge
            .from_host::<Callback<(), (String, bool)>>(&realm, &function)
            .unwrap();

        let outcome = Rc::new(RefCell::new(None));

        {
            let outcome = outcome.clone();

            realm.spawn(async move {
                *outcome.borrow_mut() = Some(callback.call(()).await);
            });
        }

        realm.run_until_idle();

        assert_eq!(
            outcome.borrow_mut().take().unwrap().unwrap(),
            (String::from("left"), true),
        );
    }
}
