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

use std::sync::mpsc::{channel, Sender};

use tether::{
    bridge::Bridge,
    export,
    func,
    host::{HostValue, PromiseState, Realm},
    runtime::{BridgeError, Callback, Complex, Failure},
};

/// Adds two numbers.
#[export]
pub fn add(a: u32, b: u32) -> u32 {
    a + b
}

#[export(name "checkedDivide")]
pub fn divide(a: i32, b: i32) -> Result<i32, Failure> {
    match b {
        0 => Err(Failure::new("Division by zero.")),
        _ => Ok(a / b),
    }
}

#[export]
#[export(promise)]
pub fn divide_later(a: i32, b: i32) -> Result<i32, Failure> {
    divide(a, b)
}

#[export]
pub async fn fetch(key: String) -> Option<String> {
    match key.as_str() {
        "known" => Some(String::from("value")),
        _ => None,
    }
}

#[export]
pub fn checksum(bytes: Vec<u8>) -> (usize, u64) {
    (bytes.len(), bytes.iter().map(|byte| *byte as u64).sum())
}

#[export]
pub fn echo(bytes: Vec<u8>) -> Vec<u8> {
    bytes
}

#[export]
pub async fn apply(callback: Callback<u32, u32>, value: u32) -> Result<u32, BridgeError> {
    callback.call(value).await
}

mod nested {
    use tether::export;

    #[export]
    pub fn negate(value: bool) -> bool {
        !value
    }
}

fn settled(value: &HostValue) -> PromiseState {
    value
        .as_object()
        .and_then(|object| object.promise_state())
        .expect("a promise")
}

fn message(realm: &Realm, error: &HostValue) -> String {
    realm
        .get(error, "message")
        .unwrap()
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_exported_signatures() {
    let add = func!(add);

    assert_eq!(add.signature().to_string(), "fn add(a: u32, b: u32) -> u32");
    assert_eq!(add.signature().doc, Some(" Adds two numbers."));
    assert!(!add.signature().is_promise());

    assert_eq!(func!(divide).signature().name, "checkedDivide");
    assert!(func!(divide_later).signature().is_promise());
    assert!(func!(fetch).signature().is_async);
    assert!(func!(apply).signature().is_promise());
    assert_eq!(func!(nested::negate).signature().arity(), 1);
}

#[test]
fn test_sync_calls() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let add = bridge.bridge_func(&realm, &func!(add)).unwrap();
    let negate = bridge.bridge_func(&realm, &func!(nested::negate)).unwrap();

    let sum = realm
        .call(
            &add,
            &HostValue::Undefined,
            &[HostValue::Number(40.0), HostValue::from("2")],
        )
        .unwrap();

    assert_eq!(sum.as_number(), Some(42.0));

    let negated = realm
        .call(&negate, &HostValue::Undefined, &[HostValue::Bool(false)])
        .unwrap();

    assert_eq!(negated.as_bool(), Some(true));
}

#[test]
fn test_failure_translation() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let divide = bridge.bridge_func(&realm, &func!(divide)).unwrap();
    let divide = bridge.trampoline(&realm, &divide);
    let divide_later = bridge.bridge_func(&realm, &func!(divide_later)).unwrap();

    let args = [HostValue::Number(1.0), HostValue::Number(0.0)];

    let thrown = realm
        .call(&divide, &HostValue::Undefined, &args)
        .unwrap_err();

    let promise = realm
        .call(&divide_later, &HostValue::Undefined, &args)
        .unwrap();

    realm.run_until_idle();

    let PromiseState::Rejected(reason) = settled(&promise) else {
        panic!("the promise is not rejected");
    };

    assert_eq!(message(&realm, &thrown), "Division by zero.");
    assert_eq!(message(&realm, &reason), message(&realm, &thrown));
    assert_eq!(bridge.take_error(&realm), None);

    let quotient = realm
        .call(
            &divide,
            &HostValue::Undefined,
            &[HostValue::Number(9.0), HostValue::Number(3.0)],
        )
        .unwrap();

    assert_eq!(quotient.as_number(), Some(3.0));
}

#[test]
fn test_async_calls() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let fetch = bridge.bridge_func(&realm, &func!(fetch)).unwrap();

    let known = realm
        .call(&fetch, &HostValue::Undefined, &[HostValue::from("known")])
        .unwrap();
    let unknown = realm
        .call(&fetch, &HostValue::Undefined, &[HostValue::from("other")])
        .unwrap();

    assert!(settled(&known).is_pending());

    realm.run_until_idle();

    match settled(&known) {
        PromiseState::Fulfilled(value) => assert_eq!(value.as_str(), Some("value")),
        other => panic!("unexpected state: {other:?}"),
    }

    match settled(&unknown) {
        PromiseState::Fulfilled(value) => assert!(value.is_undefined()),
        other => panic!("unexpected state: {other:?}"),
    }
}

#[test]
fn test_host_callback_argument() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let apply = bridge.bridge_func(&realm, &func!(apply)).unwrap();

    let triple = realm.new_function("triple", |_, _, args| {
        let value = args.first().and_then(HostValue::as_number).unwrap_or(0.0);

        Ok(HostValue::Number(value * 3.0))
    });

    let promise = realm
        .call(
            &apply,
            &HostValue::Undefined,
            &[triple, HostValue::Number(7.0)],
        )
        .unwrap();

    realm.run_until_idle();

    match settled(&promise) {
        PromiseState::Fulfilled(value) => assert_eq!(value.as_number(), Some(21.0)),
        other => panic!("unexpected state: {other:?}"),
    }
}

#[test]
fn test_byte_buffers() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let checksum = bridge.bridge_func(&realm, &func!(checksum)).unwrap();
    let echo = bridge.bridge_func(&realm, &func!(echo)).unwrap();

    for length in [0usize, 1, 10_000_000] {
        let bytes = (0..length).map(|index| (index % 251) as u8).collect::<Vec<_>>();
        let expected = bytes.iter().map(|byte| *byte as u64).sum::<u64>();

        let buffer = realm.new_buffer(&bytes);

        let result = realm
            .call(&checksum, &HostValue::Undefined, &[buffer.clone()])
            .unwrap();

        assert_eq!(
            realm.get(&result, "0").unwrap().as_number(),
            Some(length as f64),
        );
        assert_eq!(
            realm.get(&result, "1").unwrap().as_number(),
            Some(expected as f64),
        );

        let echoed = realm
            .call(&echo, &HostValue::Undefined, &[buffer])
            .unwrap();

        let echoed_length = echoed
            .as_object()
            .and_then(|object| object.with_buffer(|bytes| bytes.len()));

        assert_eq!(echoed_length, Some(length));
    }
}

#[test]
fn test_unsupported_kinds() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let complex = bridge.to_host(&realm, &Complex { re: 1.0f64, im: 2.0 });

    assert!(complex.unwrap_err().is_unsupported());

    let (sender, _receiver) = channel::<u8>();

    assert!(bridge.to_host(&realm, &sender).unwrap_err().is_unsupported());

    let byte = 7u8;
    let pointer = &byte as *const u8;

    assert!(bridge.to_host(&realm, &pointer).unwrap_err().is_unsupported());

    let object = realm.new_object();
    let object = HostValue::Object(object);

    assert!(bridge
        .from_host::<Complex<f64>>(&realm, &object)
        .unwrap_err()
        .is_unsupported());
    assert!(bridge
        .from_host::<*const u8>(&realm, &HostValue::Number(1.0))
        .unwrap_err()
        .is_unsupported());
    assert!(bridge
        .from_host::<Sender<u8>>(&realm, &HostValue::Undefined)
        .unwrap_err()
        .is_unsupported());

    let channel = tether::runtime::Func::new("send", |_sender: Option<Sender<u8>>| ());
    let error = bridge.bridge_func(&realm, &channel).unwrap_err();

    assert!(error.is_unsupported());
    assert_eq!(bridge.converters_len(), 0);
}
