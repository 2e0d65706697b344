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

use tether::{
    bridge::BridgeConfig,
    export,
    exposition::{Exposer, ExposerConfig},
    func,
    host::{HostValue, PromiseState, Realm},
    runtime::{BridgeResultExt, Shared},
};

#[export]
#[export(methods)]
#[derive(Default)]
pub struct Counter {
    pub value: u32,
    pub label: Option<String>,

    #[export(not_nil)]
    pub items: Option<Vec<u16>>,
}

#[export]
impl Counter {
    pub fn increment(&mut self, by: u32) -> u32 {
        self.value += by;
        self.value
    }

    pub async fn settle(this: Shared<Self>) -> u32 {
        this.borrow().value
    }

    pub fn touch(&self) {}

    pub fn reset(&mut self) {
        self.value = 0;
    }
}

#[export]
pub fn counter(start: u32) -> Shared<Counter> {
    Shared::new(Counter {
        value: start,
        ..Counter::default()
    })
}

#[export]
pub fn total(counters: Vec<Counter>) -> u32 {
    counters.iter().map(|counter| counter.value).sum()
}

fn exposer(realm: &Realm) -> Exposer {
    let mut config = ExposerConfig::for_app("demo");

    config.bridge = BridgeConfig::new()
        .deny_method("Counter", "reset")
        .promise_method("Counter", "touch");

    let mut exposer = Exposer::new(config);

    exposer
        .expose_fn(realm, "counters", &func!(counter))
        .expect_blame("Cannot expose counter");
    exposer
        .expose_fn(realm, "counters", &func!(total))
        .expect_blame("Cannot expose total");

    exposer
}

#[test]
fn test_record_declarations() {
    let realm = Realm::new();
    let (declarations, _) = exposer(&realm).build();

    assert_eq!(
        declarations,
        r#"export declare namespace counters {
  interface Counter {
    value: number;
    label?: string;
    items: Array<number>;
    increment(by: number): number;
    settle(): Promise<number>;
    touch(): Promise<void>;
  }
  function counter(start: number): counters.Counter;
  function total(counters: Array<counters.Counter>): number;
}
export const initializeTether: () => void;"#,
    );
}

#[test]
fn test_exposed_record_calls() {
    let realm = Realm::new();
    let exposer = exposer(&realm);

    let root = realm.get_global("tether").unwrap();
    let app = realm.get(&root, "demo").unwrap();
    let package = realm.get(&app, "counters").unwrap();
    let counter = realm.get(&package, "counter").unwrap();

    let mirror = realm
        .call(&counter, &HostValue::Undefined, &[HostValue::Number(5.0)])
        .unwrap();

    let increment = realm.get(&mirror, "increment").unwrap();
    let value = realm
        .call(&increment, &mirror, &[HostValue::Number(2.0)])
        .unwrap();

    assert_eq!(value.as_number(), Some(7.0));
    assert!(mirror.as_object().unwrap().property("reset").is_none());

    let touch = realm.get(&mirror, "touch").unwrap();
    let promise = realm.call(&touch, &mirror, &[]).unwrap();
    let state = || promise.as_object().and_then(|object| object.promise_state());

    assert!(matches!(state(), Some(PromiseState::Pending)));

    realm.run_until_idle();

    match state() {
        Some(PromiseState::Fulfilled(value)) => assert!(value.is_undefined()),
        other => panic!("the promise is not fulfilled: {other:?}"),
    }
    assert_eq!(exposer.bridge().cache_len(), 1);

    let items = realm.get(&mirror, "items").unwrap();

    assert_eq!(items.as_object().unwrap().length(), Some(0));

    let total = realm.get(&package, "total").unwrap();
    let sum = realm
        .call(
            &total,
            &HostValue::Undefined,
            &[realm.new_array(vec![mirror.clone(), mirror])],
        )
        .unwrap();

    assert_eq!(sum.as_number(), Some(14.0));
}
