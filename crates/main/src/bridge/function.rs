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

use std::{
    any::Any,
    cell::RefCell,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

use futures::FutureExt;
use log::{debug, error, warn};

use crate::{
    bridge::{alive, outbound, unsupported, Bridge, ConverterSlot},
    host::{HostValue, Realm, WeakRealm},
    runtime::{AnyValue, BridgeError, BridgeResult, Func, Invocation, Outputs, Signature},
};

/// Wraps a compiled function into a host function.
///
/// The signature is validated eagerly, but the argument converters are built
/// on the first call.
pub(super) fn bridge(
    bridge: &Bridge,
    realm: &Realm,
    func: &Func,
    promise: bool,
) -> BridgeResult<HostValue> {
    let signature = func.signature();

    validate(signature)?;

    let promise = promise || signature.is_promise();

    debug!(
        "Bridging {signature} in {} mode.",
        if promise { "promise" } else { "synchronous" },
    );

    let wrapper = Rc::new(BridgedFunction {
        bridge: bridge.clone(),
        func: func.clone(),
        promise,
        converters: RefCell::new(None),
    });

    Ok(realm.new_function(signature.name, move |realm, _, args| {
        Ok(match wrapper.promise {
            false => wrapper.call_sync(realm, args),
            true => wrapper.clone().call_promise(realm, args),
        })
    }))
}

fn validate(signature: &Signature) -> BridgeResult<()> {
    let types = signature
        .params
        .iter()
        .map(|param| param.ty)
        .chain(signature.results.iter().copied());

    for ty in types {
        if let Some(found) = ty().find_unsupported() {
            error!("Cannot bridge {signature}: type \"{found}\" is not supported.");

            return Err(BridgeError::build(
                format!("function \"{}\"", signature.name),
                unsupported(found),
            ));
        }
    }

    Ok(())
}

struct BridgedFunction {
    bridge: Bridge,
    func: Func,
    promise: bool,
    converters: RefCell<Option<Rc<[Rc<ConverterSlot>]>>>,
}

impl BridgedFunction {
    // Failures are reported through the global error slot.
    fn call_sync(&self, realm: &Realm, args: &[HostValue]) -> HostValue {
        let outcome = catch_unwind(AssertUnwindSafe(|| -> BridgeResult<HostValue> {
            let args = self.convert_args(realm, args)?;

            let outputs = match self.func.invoke(args) {
                Invocation::Ready(result) => result?,

                Invocation::Pending(..) => {
                    return Err(BridgeError::failure(
                        "An asynchronous function cannot complete synchronously.",
                    ))
                }
            };

            self.results(realm, outputs)
        }));

        let message = match outcome {
            Ok(Ok(value)) => return value,
            Ok(Err(error)) => error.to_string(),
            Err(payload) => panic_message(payload),
        };

        warn!("Bridged function \"{}\" failed: {message}", self.name());

        let slot = self.bridge.config().error_slot;

        if let Err(thrown) = realm.set_global(slot, HostValue::String(message.into())) {
            error!("Failed to write the error slot \"{slot}\": {thrown}");
        }

        HostValue::Undefined
    }

    // The returned Promise settles when the spawned task completes.
    fn call_promise(self: Rc<Self>, realm: &Realm, args: &[HostValue]) -> HostValue {
        let (promise, resolvers) = realm.new_promise();
        let weak = realm.downgrade();
        let args = args.to_vec();

        realm.spawn(async move {
            let outcome = AssertUnwindSafe(self.clone().run(weak.clone(), args))
                .catch_unwind()
                .await;

            let Some(realm) = weak.upgrade() else {
                return;
            };

            let message = match outcome {
                Ok(Ok(value)) => {
                    resolvers.resolve(&realm, value);
                    return;
                }

                Ok(Err(error)) => error.to_string(),
                Err(payload) => panic_message(payload),
            };

            warn!("Bridged function \"{}\" failed: {message}", self.name());

            resolvers.reject(&realm, realm.new_error(message));
        });

        HostValue::Object(promise)
    }

    async fn run(self: Rc<Self>, realm: WeakRealm, args: Vec<HostValue>) -> BridgeResult<HostValue> {
        let invocation = {
            let realm = alive(&realm)?;
            let args = self.convert_args(&realm, &args)?;

            self.func.invoke(args)
        };

        let outputs = invocation.complete().await?;
        let realm = alive(&realm)?;

        self.results(&realm, outputs)
    }

    fn convert_args(
        &self,
        realm: &Realm,
        args: &[HostValue],
    ) -> BridgeResult<Vec<AnyValue>> {
        let arity = self.func.signature().arity();

        if args.len() != arity {
            return Err(BridgeError::ArityMismatch {
                expected: arity,
                actual: args.len(),
            });
        }

        let converters = self.converters()?;

        converters
            .iter()
            .zip(args)
            .map(|(converter, arg)| converter.convert(&self.bridge, realm, arg))
            .collect()
    }

    fn converters(&self) -> BridgeResult<Rc<[Rc<ConverterSlot>]>> {
        if let Some(converters) = self.converters.borrow().as_ref() {
            return Ok(converters.clone());
        }

        let converters = self
            .func
            .signature()
            .params
            .iter()
            .map(|param| self.bridge.converter((param.ty)()))
            .collect::<BridgeResult<Rc<[_]>>>()?;

        *self.converters.borrow_mut() = Some(converters.clone());

        Ok(converters)
    }

    fn results(&self, realm: &Realm, outputs: Outputs) -> BridgeResult<HostValue> {
        match outputs.as_slice() {
            [] => Ok(HostValue::Undefined),

            [single] => outbound::convert(&self.bridge, realm, &**single, false),

            many => {
                let elements = many
                    .iter()
                    .map(|output| outbound::convert(&self.bridge, realm, &**output, false))
                    .collect::<BridgeResult<Vec<_>>>()?;

                Ok(realm.new_array(elements))
            }
        }
    }

    #[inline(always)]
    fn name(&self) -> &'static str {
        self.func.signature().name
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let message = match payload.downcast_ref::<&str>() {
        Some(message) => *message,
        None => match payload.downcast_ref::<String>() {
            Some(message) => message.as_str(),
            None => "unknown panic",
        },
    };

    format!("Panic: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::PromiseState,
        runtime::{Callback, Failure},
    };

    fn fulfilled(value: &HostValue) -> HostValue {
        match value.as_object().and_then(|object| object.promise_state()) {
            Some(PromiseState::Fulfilled(value)) => value,
            other => panic!("the promise is not fulfilled: {other:?}"),
        }
    }

    fn rejection(realm: &Realm, value: &HostValue) -> String {
        match value.as_object().and_then(|object| object.promise_state()) {
            Some(PromiseState::Rejected(reason)) => realm
                .get(&reason, "message")
                .unwrap()
                .as_str()
                .unwrap()
                .to_string(),
            other => panic!("the promise is not rejected: {other:?}"),
        }
    }

    #[test]
    fn test_sync_call() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let func = Func::new("split", |value: u32| (value / 10, value % 10));
        let function = bridge.bridge_func(&realm, &func).unwrap();

        let result = realm
            .call(&function, &HostValue::Undefined, &[HostValue::Number(42.0)])
            .unwrap();

        assert_eq!(realm.get(&result, "0").unwrap().as_number(), Some(4.0));
        assert_eq!(realm.get(&result, "1").unwrap().as_number(), Some(2.0));

        let unit = bridge
            .bridge_func(&realm, &Func::new("unit", || ()))
            .unwrap();

        assert!(realm
            .call(&unit, &HostValue::Undefined, &[])
            .unwrap()
            .is_undefined());
    }

    #[test]
    fn test_sync_failure_through_trampoline() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let func = Func::new("fail", |reason: String| -> Result<(), Failure> {
            Err(Failure::new(reason))
        });

        let raw = bridge.bridge_func(&realm, &func).unwrap();

        let result = realm
            .call(&raw, &HostValue::Undefined, &[HostValue::from("first")])
            .unwrap();

        assert!(result.is_undefined());
        assert_eq!(bridge.take_error(&realm).as_deref(), Some("first"));

        let wrapped = bridge.trampoline(&realm, &raw);

        let thrown = realm
            .call(&wrapped, &HostValue::Undefined, &[HostValue::from("second")])
            .unwrap_err();

        assert_eq!(realm.get(&thrown, "message").unwrap().as_str(), Some("second"));
        assert_eq!(bridge.take_error(&realm), None);
    }

    #[test]
    fn test_arity_mismatch() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let func = Func::new("one", |_value: u8| ());
        let function = bridge.trampoline(&realm, &bridge.bridge_func(&realm, &func).unwrap());

        let thrown = realm
            .call(
                &function,
                &HostValue::Undefined,
                &[HostValue::Null, HostValue::Null, HostValue::Null],
            )
            .unwrap_err();

        assert_eq!(
            realm.get(&thrown, "message").unwrap().as_str(),
            Some("Expected 1 argument, got 3."),
        );
    }

    #[test]
    fn test_panic_translation() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let func = Func::new("explode", || -> u8 { panic!("kaboom") });
        let function = bridge.trampoline(&realm, &bridge.bridge_func(&realm, &func).unwrap());

        let thrown = realm
            .call(&function, &HostValue::Undefined, &[])
            .unwrap_err();

        assert_eq!(
            realm.get(&thrown, "message").unwrap().as_str(),
            Some("Panic: kaboom"),
        );
    }

    #[test]
    fn test_promise_modes() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let marked = bridge
            .bridge_func(&realm, &Func::new("marked", || 1u8).with_promise(true))
            .unwrap();
        let forced = bridge
            .bridge_func_with(&realm, &Func::new("forced", || 2u8), true)
            .unwrap();
        let future = bridge
            .bridge_func(&realm, &Func::future("future", || async { 3u8 }))
            .unwrap();
        let plain = bridge
            .bridge_func(&realm, &Func::new("plain", || 4u8))
            .unwrap();

        let marked = realm.call(&marked, &HostValue::Undefined, &[]).unwrap();
        let forced = realm.call(&forced, &HostValue::Undefined, &[]).unwrap();
        let future = realm.call(&future, &HostValue::Undefined, &[]).unwrap();
        let plain = realm.call(&plain, &HostValue::Undefined, &[]).unwrap();

        assert!(marked.as_object().unwrap().promise_state().unwrap().is_pending());
        assert_eq!(plain.as_number(), Some(4.0));

        realm.run_until_idle();

        assert_eq!(fulfilled(&marked).as_number(), Some(1.0));
        assert_eq!(fulfilled(&forced).as_number(), Some(2.0));
        assert_eq!(fulfilled(&future).as_number(), Some(3.0));
    }

    #[test]
    fn test_promise_failure() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let func = Func::future("fail", || async { Err::<(), _>(Failure::new("late")) });
        let function = bridge.bridge_func(&realm, &func).unwrap();

        let promise = realm.call(&function, &HostValue::Undefined, &[]).unwrap();
        realm.run_until_idle();

        assert_eq!(rejection(&realm, &promise), "late");
        assert_eq!(bridge.take_error(&realm), None);
    }

    #[test]
    fn test_reentrant_callback() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let func = Func::future("twice", |callback: Callback<u32, u32>| async move {
            let first = callback.call(1).await?;
            let second = callback.call(first).await?;

            Ok::<_, BridgeError>(second)
        });

        assert!(func.signature().is_promise());

        let function = bridge.bridge_func(&realm, &func).unwrap();

        let increment = realm.new_function("increment", |realm, _, args| {
            let value = args.first().and_then(HostValue::as_number).unwrap_or(0.0);
            let (promise, resolvers) = realm.new_promise();

            resolvers.resolve(realm, HostValue::Number(value + 10.0));

            Ok(HostValue::Object(promise))
        });

        let promise = realm
            .call(&function, &HostValue::Undefined, &[increment])
            .unwrap();

        realm.run_until_idle();

        assert_eq!(fulfilled(&promise).as_number(), Some(21.0));
    }

    #[test]
    fn test_unsupported_signature() {
        let realm = Realm::new();
        let bridge = Bridge::default();

        let func = Func::new("channel", |_sender: std::sync::mpsc::Sender<u8>| ());
        let error = bridge.bridge_func(&realm, &func).unwrap_err();

        assert!(matches!(error, BridgeError::BuildFailure { .. }));
        assert!(error.is_unsupported());
    }
}
