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

//! The value-marshalling engine.
//!
//! A [Bridge] converts compiled values into host values (the outbound
//! direction), host values into compiled values of a requested type (the
//! inbound direction), and wraps compiled functions into host functions.
//!
//! ```
//! use tether::{bridge::Bridge, host::Realm};
//!
//! let realm = Realm::new();
//! let bridge = Bridge::default();
//!
//! let host = bridge.to_host(&realm, &vec![1u32, 2, 3]).unwrap();
//! let back = bridge.from_host::<Vec<u32>>(&realm, &host).unwrap();
//!
//! assert_eq!(back, [1, 2, 3]);
//! ```

mod cache;
mod config;
mod function;
mod inbound;
mod mirror;
mod outbound;
mod settle;

use std::{any::TypeId, cell::RefCell, fmt::Debug, rc::Rc};

use ahash::AHashMap;
use compact_str::CompactString;
use log::debug;

pub use crate::bridge::config::BridgeConfig;
pub(crate) use crate::bridge::settle::thrown_message;
use crate::{
    bridge::cache::IdentityCache,
    host::{HostValue, Property, Realm, WeakRealm},
    runtime::{
        downcast,
        AnyValue,
        BridgeError,
        BridgeResult,
        Func,
        Reflect,
        TypeDescriptor,
        TypeKind,
    },
};

/// A type-directed inbound conversion function.
pub(crate) type Converter = Rc<dyn Fn(&Bridge, &Realm, &HostValue) -> BridgeResult<AnyValue>>;

/// A bridge context.
///
/// The context owns the inbound converters built so far (one per distinct
/// compiled type) and the identity cache of the mirrors it has produced. The
/// object is a cheap reference-counted handle: clones share the same context.
///
/// The context is single-threaded and should be used with one realm.
#[derive(Clone)]
pub struct Bridge(Rc<BridgeInner>);

struct BridgeInner {
    config: BridgeConfig,
    converters: RefCell<AHashMap<TypeId, Rc<ConverterSlot>>>,
    cache: Rc<IdentityCache>,
}

impl Default for Bridge {
    #[inline(always)]
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl Debug for Bridge {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Bridge")
            .field("config", &self.0.config)
            .field("converters", &self.converters_len())
            .field("mirrors", &self.cache_len())
            .finish()
    }
}

impl Bridge {
    /// Creates a new bridge context.
    pub fn new(config: BridgeConfig) -> Self {
        Self(Rc::new(BridgeInner {
            config,
            converters: RefCell::new(AHashMap::new()),
            cache: Rc::new(IdentityCache::new()),
        }))
    }

    /// Returns the configuration of this context.
    #[inline(always)]
    pub fn config(&self) -> &BridgeConfig {
        &self.0.config
    }

    /// Converts a compiled value into a host value.
    ///
    /// Structured values held in [Shared](crate::runtime::Shared) cells become
    /// identity-cached mirrors. Fails with
    /// [UnsupportedKind](BridgeError::UnsupportedKind) if the value, or any
    /// value nested in it, has no host counterpart.
    #[inline(always)]
    pub fn to_host(&self, realm: &Realm, value: &dyn Reflect) -> BridgeResult<HostValue> {
        outbound::convert(self, realm, value, false)
    }

    /// Converts a host value into a compiled value of type `T`.
    ///
    /// Absent host values (`undefined` and `null`) turn into the zero value of
    /// the type.
    pub fn from_host<T: Reflect>(&self, realm: &Realm, value: &HostValue) -> BridgeResult<T> {
        let value = self.from_host_erased(realm, TypeDescriptor::of::<T>(), value)?;

        downcast::<T>(value)
    }

    /// Converts a host value into a type-erased compiled value of the type
    /// described by `descriptor`.
    pub fn from_host_erased(
        &self,
        realm: &Realm,
        descriptor: &'static TypeDescriptor,
        value: &HostValue,
    ) -> BridgeResult<AnyValue> {
        self.converter(descriptor)?.convert(self, realm, value)
    }

    /// Builds the inbound converter of a type ahead of time.
    ///
    /// Fails with [UnsupportedKind](BridgeError::UnsupportedKind) if the type
    /// cannot be converted.
    #[inline(always)]
    pub fn prepare(&self, descriptor: &'static TypeDescriptor) -> BridgeResult<()> {
        let _ = self.converter(descriptor)?;

        Ok(())
    }

    /// Wraps a compiled function into a host function.
    ///
    /// The host function runs in promise mode if the function has an explicit
    /// promise marker, is asynchronous, or accepts a callable parameter.
    #[inline(always)]
    pub fn bridge_func(&self, realm: &Realm, func: &Func) -> BridgeResult<HostValue> {
        function::bridge(self, realm, func, false)
    }

    /// Wraps a compiled function into a host function, forcing the promise
    /// mode if `promise` is true.
    #[inline(always)]
    pub fn bridge_func_with(
        &self,
        realm: &Realm,
        func: &Func,
        promise: bool,
    ) -> BridgeResult<HostValue> {
        function::bridge(self, realm, func, promise)
    }

    /// Wraps a bridged host function into a trampoline that re-throws the
    /// failures of synchronous calls.
    ///
    /// A synchronous bridged call reports its failure through the global error
    /// slot (see [BridgeConfig::error_slot]) and returns `undefined`. The
    /// trampoline calls the wrapped function, and if the slot is set after the
    /// call, clears it and throws a host `Error` with the stored text.
    pub fn trampoline(&self, realm: &Realm, function: &HostValue) -> HostValue {
        let name = match realm.get(function, "name") {
            Ok(HostValue::String(name)) => name,
            _ => CompactString::default(),
        };

        let bridge = self.clone();
        let function = function.clone();

        realm.new_function(name, move |realm, this, args| {
            let result = realm.call(&function, this, args)?;

            match bridge.take_error(realm) {
                Some(message) => Err(realm.new_error(message)),
                None => Ok(result),
            }
        })
    }

    /// Reads and clears the global error slot.
    pub fn take_error(&self, realm: &Realm) -> Option<String> {
        let slot = self.0.config.error_slot;

        let message = match realm.global().property(slot)? {
            Property::Data(HostValue::Undefined) => None,
            Property::Data(HostValue::String(message)) => Some(message.to_string()),
            Property::Data(other) => Some(other.to_string()),
            Property::Accessor { .. } => None,
        };

        let _ = realm.global().delete(slot);

        message
    }

    /// Returns the number of entries in the mirror identity cache.
    #[inline(always)]
    pub fn cache_len(&self) -> usize {
        self.0.cache.len()
    }

    /// Returns the number of inbound converters built by this context.
    #[inline(always)]
    pub fn converters_len(&self) -> usize {
        self.0.converters.borrow().len()
    }

    #[inline(always)]
    pub(crate) fn cache(&self) -> &Rc<IdentityCache> {
        &self.0.cache
    }

    /// Returns the converter of a type, building it and the converters of its
    /// nested types on the first request.
    ///
    /// If the build fails, every converter slot registered during the build is
    /// removed, so the context never keeps a partially built shape.
    pub(crate) fn converter(
        &self,
        descriptor: &'static TypeDescriptor,
    ) -> BridgeResult<Rc<ConverterSlot>> {
        if let Some(slot) = self.0.converters.borrow().get(&descriptor.id()) {
            return Ok(slot.clone());
        }

        let mut transaction = Vec::new();

        match self.converter_slot(descriptor, &mut transaction) {
            Ok(slot) => {
                debug!(
                    "Built {} converter(s) for \"{descriptor}\".",
                    transaction.len(),
                );

                Ok(slot)
            }

            Err(error) => {
                let mut converters = self.0.converters.borrow_mut();

                for id in transaction {
                    let _ = converters.remove(&id);
                }

                Err(error)
            }
        }
    }

    // The slot is registered before the nested converters are built, so a
    // self-referential shape finds its own slot instead of recursing.
    pub(crate) fn converter_slot(
        &self,
        descriptor: &'static TypeDescriptor,
        transaction: &mut Vec<TypeId>,
    ) -> BridgeResult<Rc<ConverterSlot>> {
        if let Some(slot) = self.0.converters.borrow().get(&descriptor.id()) {
            return Ok(slot.clone());
        }

        let slot = Rc::new(ConverterSlot::new(descriptor));

        let _ = self
            .0
            .converters
            .borrow_mut()
            .insert(descriptor.id(), slot.clone());

        transaction.push(descriptor.id());

        let converter = inbound::build(self, descriptor, transaction)?;

        *slot.converter.borrow_mut() = Some(converter);

        Ok(slot)
    }
}

/// A converter registered in a bridge context.
pub(crate) struct ConverterSlot {
    descriptor: &'static TypeDescriptor,
    converter: RefCell<Option<Converter>>,
}

impl ConverterSlot {
    #[inline(always)]
    fn new(descriptor: &'static TypeDescriptor) -> Self {
        Self {
            descriptor,
            converter: RefCell::new(None),
        }
    }

    pub(crate) fn convert(
        &self,
        bridge: &Bridge,
        realm: &Realm,
        value: &HostValue,
    ) -> BridgeResult<AnyValue> {
        let converter = self.converter.borrow().clone();

        match converter {
            Some(converter) => converter(bridge, realm, value),
            None => Err(BridgeError::invalid(format!(
                "a built converter of \"{}\"",
                self.descriptor,
            ))),
        }
    }
}

#[inline(always)]
pub(crate) fn alive(realm: &WeakRealm) -> BridgeResult<Realm> {
    realm
        .upgrade()
        .ok_or_else(|| BridgeError::failure("The host realm is no longer available."))
}

// Turns a descriptor found by TypeDescriptor::find_unsupported into an error.
pub(crate) fn unsupported(found: &'static TypeDescriptor) -> BridgeError {
    let shape = match found.kind() {
        TypeKind::Unsupported(kind) => kind.shape(),
        _ => "Unknown",
    };

    BridgeError::unsupported(found, shape)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::mpsc::Sender};

    use super::*;
    use crate::runtime::{Complex, Failure};

    #[test]
    fn test_primitive_roundtrip() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let host = bridge.to_host(&realm, &-12i32).unwrap();
        assert_eq!(host.as_number(), Some(-12.0));
        assert_eq!(bridge.from_host::<i32>(&realm, &host).unwrap(), -12);

        let host = bridge.to_host(&realm, &String::from("text")).unwrap();
        assert_eq!(bridge.from_host::<String>(&realm, &host).unwrap(), "text");

        let host = bridge.to_host(&realm, &true).unwrap();
        assert!(bridge.from_host::<bool>(&realm, &host).unwrap());

        let host = bridge.to_host(&realm, &0.5f32).unwrap();
        assert_eq!(bridge.from_host::<f32>(&realm, &host).unwrap(), 0.5);
    }

    #[test]
    fn test_mapping_keys() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let mut map = HashMap::new();
        let _ = map.insert(1u16, String::from("one"));
        let _ = map.insert(20u16, String::from("twenty"));

        let host = bridge.to_host(&realm, &map).unwrap();
        let object = host.as_object().unwrap();

        assert_eq!(
            realm.get(&host, "20").unwrap().as_str(),
            Some("twenty"),
        );
        assert_eq!(object.keys().len(), 2);

        let back = bridge.from_host::<HashMap<u16, String>>(&realm, &host).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_absent_values() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        assert_eq!(
            bridge.from_host::<u64>(&realm, &HostValue::Undefined).unwrap(),
            0,
        );
        assert_eq!(
            bridge.from_host::<Option<String>>(&realm, &HostValue::Null).unwrap(),
            None,
        );
        assert!(bridge
            .from_host::<Vec<u8>>(&realm, &HostValue::Undefined)
            .unwrap()
            .is_empty());

        let host = bridge.to_host(&realm, &None::<Vec<u32>>).unwrap();
        assert!(host.is_undefined());
    }

    #[test]
    fn test_numeric_strings() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        assert_eq!(
            bridge.from_host::<u32>(&realm, &HostValue::from("42")).unwrap(),
            42,
        );
        assert_eq!(
            bridge.from_host::<f64>(&realm, &HostValue::from(" 2.5 ")).unwrap(),
            2.5,
        );

        for (value, message) in [
            (HostValue::from("forty"), "the string is not a number"),
            (HostValue::Number(f64::NAN), "the number is not finite"),
            (HostValue::Number(300.0), "the number is out of range"),
        ] {
            match bridge.from_host::<u8>(&realm, &value) {
                Err(BridgeError::ConversionFailure { reason, .. }) => assert_eq!(reason, message),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        assert!(matches!(
            bridge.from_host::<u32>(&realm, &HostValue::Number(-1.0)),
            Err(BridgeError::ConversionFailure { .. }),
        ));
    }

    #[test]
    fn test_failure_values() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let host = bridge.to_host(&realm, &Failure::new("broken")).unwrap();

        assert_eq!(realm.get(&host, "message").unwrap().as_str(), Some("broken"));
        assert_eq!(
            bridge.from_host::<Failure>(&realm, &host).unwrap().message(),
            "broken",
        );

        let none = bridge.to_host(&realm, &None::<Failure>).unwrap();
        assert!(none.is_undefined());
    }

    #[test]
    fn test_unsupported_kinds() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let outbound = bridge
            .to_host(&realm, &Complex { re: 1.0f64, im: 0.0 })
            .unwrap_err();
        assert!(outbound.is_unsupported());

        let inbound = bridge
            .from_host::<Vec<Sender<u8>>>(&realm, &HostValue::Undefined)
            .unwrap_err();
        assert!(inbound.is_unsupported());

        // A failed build leaves no partially built converters behind.
        assert_eq!(bridge.converters_len(), 0);
    }

    #[test]
    fn test_error_slot() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        assert_eq!(bridge.take_error(&realm), None);

        realm
            .set_global(bridge.config().error_slot, HostValue::from("bad"))
            .unwrap();

        assert_eq!(bridge.take_error(&realm).as_deref(), Some("bad"));
        assert_eq!(bridge.take_error(&realm), None);
    }
}
