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
    bridge::{Bridge, BridgeConfig},
    export,
    host::{HostValue, PromiseState, Realm},
    runtime::{Failure, Func, Shared, TypeDescriptor},
};

/// A labeled point.
#[export]
#[export(methods)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,

    #[export(name "label")]
    pub tag: Option<String>,

    #[export(not_nil)]
    pub history: Option<Vec<f64>>,

    #[export]
    weight: u32,

    #[export(exclude)]
    pub secret: u8,

    hidden: u8,
}

#[export]
impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn shift(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    #[export(name "weigh")]
    pub fn set_weight(&mut self, weight: u32) -> u32 {
        let previous = self.weight;
        self.weight = weight;
        previous
    }

    pub async fn delayed_x(this: Shared<Self>) -> f64 {
        this.borrow().x
    }

    #[export(exclude)]
    pub fn internal(&self) -> u8 {
        self.hidden
    }
}

#[export]
#[derive(Default)]
pub struct Segment {
    pub start: Point,
    pub end: Shared<Point>,
}

#[export]
#[export(methods)]
#[derive(Default)]
pub struct Gauge {
    pub level: u32,
}

#[export]
impl Gauge {
    pub fn check(&self) -> Result<u32, Failure> {
        match self.level {
            0 => Err(Failure::new("The gauge is empty.")),
            level => Ok(level),
        }
    }

    pub fn fill(&mut self) -> u32 {
        self.level += 1;
        self.level
    }

    #[export(promise)]
    pub fn peek(&self) -> u32 {
        self.level
    }
}

fn number(realm: &Realm, target: &HostValue, key: &str) -> Option<f64> {
    realm.get(target, key).unwrap().as_number()
}

#[test]
fn test_record_descriptor() {
    let descriptor = TypeDescriptor::of::<Point>();
    let meta = descriptor.record().unwrap();

    let fields = meta
        .fields
        .iter()
        .map(|field| field.name)
        .collect::<Vec<_>>();

    assert_eq!(fields, ["x", "y", "label", "history", "weight"]);
    assert!(meta.field("history").unwrap().not_nil);
    assert!(!meta.field("x").unwrap().not_nil);

    let methods = meta
        .methods
        .iter()
        .map(|method| method.signature.name)
        .collect::<Vec<_>>();

    assert_eq!(methods, ["length", "shift", "weigh", "delayed_x"]);
    assert_eq!(descriptor.name(), "Point");
    assert_eq!(descriptor.doc(), Some(" A labeled point."));

    let shift = meta.method("shift").unwrap();

    assert_eq!(shift.signature.to_string(), "fn shift(dx: f64, dy: f64)");
    assert!(!shift.signature.is_promise());
    assert!(meta.method("delayed_x").unwrap().signature.is_promise());
}

#[test]
fn test_record_snapshot() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let point = Point {
        tag: Some(String::from("origin")),
        weight: 7,
        secret: 1,
        ..Point::new(3.0, 4.0)
    };

    let host = bridge.to_host(&realm, &point).unwrap();
    let object = host.as_object().unwrap();

    assert_eq!(number(&realm, &host, "x"), Some(3.0));
    assert_eq!(realm.get(&host, "label").unwrap().as_str(), Some("origin"));
    assert_eq!(number(&realm, &host, "weight"), Some(7.0));
    assert!(object.property("secret").is_none());
    assert!(object.property("hidden").is_none());

    let history = realm.get(&host, "history").unwrap();

    assert_eq!(history.as_object().unwrap().length(), Some(0));

    // A snapshot is detached from the source value.
    assert_eq!(bridge.cache_len(), 0);

    let back = bridge.from_host::<Point>(&realm, &host).unwrap();

    assert_eq!(back.x, 3.0);
    assert_eq!(back.tag.as_deref(), Some("origin"));
    assert_eq!(back.weight, 7);
    assert_eq!(back.secret, 0);
    assert_eq!(back.history, Some(Vec::new()));
}

#[test]
fn test_mirror_identity_and_eviction() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let point = Shared::new(Point::new(1.0, 2.0));

    let first = bridge.to_host(&realm, &point).unwrap();
    let second = bridge.to_host(&realm, &point.clone()).unwrap();

    assert!(first.strict_equals(&second));
    assert_eq!(bridge.cache_len(), 1);

    let other = bridge.to_host(&realm, &Shared::new(Point::new(1.0, 2.0))).unwrap();

    assert!(!first.strict_equals(&other));

    drop(other);
    realm.run_until_idle();

    assert_eq!(bridge.cache_len(), 1);

    drop(first);
    drop(second);
    realm.run_until_idle();

    assert_eq!(bridge.cache_len(), 0);

    let rebuilt = bridge.to_host(&realm, &point).unwrap();

    assert_eq!(number(&realm, &rebuilt, "x"), Some(1.0));
    assert_eq!(bridge.cache_len(), 1);
}

#[test]
fn test_mirror_field_liveness() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let point = Shared::new(Point::new(1.0, 2.0));
    let mirror = bridge.to_host(&realm, &point).unwrap();

    point.borrow_mut().x = 10.0;

    assert_eq!(number(&realm, &mirror, "x"), Some(10.0));

    realm.set(&mirror, "y", HostValue::Number(20.0)).unwrap();
    realm.set(&mirror, "label", HostValue::from("moved")).unwrap();

    assert_eq!(point.borrow().y, 20.0);
    assert_eq!(point.borrow().tag.as_deref(), Some("moved"));

    realm.set(&mirror, "label", HostValue::Undefined).unwrap();

    assert_eq!(point.borrow().tag, None);
    assert!(realm.get(&mirror, "label").unwrap().is_undefined());
}

#[test]
fn test_mirror_methods() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let point = Shared::new(Point::new(3.0, 4.0));
    let mirror = bridge.to_host(&realm, &point).unwrap();

    let length = realm.get(&mirror, "length").unwrap();

    assert_eq!(
        realm.call(&length, &mirror, &[]).unwrap().as_number(),
        Some(5.0),
    );

    let shift = realm.get(&mirror, "shift").unwrap();

    realm
        .call(
            &shift,
            &mirror,
            &[HostValue::Number(1.0), HostValue::Number(1.0)],
        )
        .unwrap();

    assert_eq!(point.borrow().x, 4.0);
    assert_eq!(number(&realm, &mirror, "y"), Some(5.0));

    let weigh = realm.get(&mirror, "weigh").unwrap();
    let previous = realm.call(&weigh, &mirror, &[HostValue::Number(9.0)]).unwrap();

    assert_eq!(previous.as_number(), Some(0.0));
    assert_eq!(number(&realm, &mirror, "weight"), Some(9.0));
    assert!(mirror.as_object().unwrap().property("internal").is_none());

    let delayed = realm.get(&mirror, "delayed_x").unwrap();
    let promise = realm.call(&delayed, &mirror, &[]).unwrap();

    realm.run_until_idle();

    match promise.as_object().unwrap().promise_state() {
        Some(PromiseState::Fulfilled(value)) => assert_eq!(value.as_number(), Some(4.0)),
        other => panic!("the promise is not fulfilled: {other:?}"),
    }
}

#[test]
fn test_denied_method() {
    let realm = Realm::new();
    let bridge = Bridge::new(BridgeConfig::new().deny_method("Point", "shift"));

    let mirror = bridge.to_host(&realm, &Shared::new(Point::default())).unwrap();
    let object = mirror.as_object().unwrap();

    assert!(object.property("shift").is_none());
    assert!(object.property("length").is_some());
}

#[test]
fn test_nested_records() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let end = Shared::new(Point::new(5.0, 5.0));

    let segment = Shared::new(Segment {
        start: Point::new(1.0, 1.0),
        end: end.clone(),
    });

    let mirror = bridge.to_host(&realm, &segment).unwrap();

    // A record nested by value is mirrored through its parent's memory.
    let start = realm.get(&mirror, "start").unwrap();

    realm.set(&start, "x", HostValue::Number(-1.0)).unwrap();

    assert_eq!(segment.borrow().start.x, -1.0);

    // A shared record keeps its own identity.
    let end_mirror = realm.get(&mirror, "end").unwrap();
    let direct = bridge.to_host(&realm, &end).unwrap();

    assert!(end_mirror.strict_equals(&direct));

    // Passing a mirror back adopts the original cell.
    let adopted = bridge.from_host::<Shared<Point>>(&realm, &direct).unwrap();

    assert_eq!(adopted.address(), end.address());
}

#[test]
fn test_failing_method_throws() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let gauge = Shared::new(Gauge::default());
    let mirror = bridge.to_host(&realm, &gauge).unwrap();

    let check = realm.get(&mirror, "check").unwrap();
    let thrown = realm.call(&check, &mirror, &[]).unwrap_err();

    assert_eq!(
        realm.get(&thrown, "message").unwrap().as_str(),
        Some("The gauge is empty."),
    );
    assert_eq!(bridge.take_error(&realm), None);

    let ready = bridge
        .bridge_func(&realm, &Func::new("ready", || 1u8))
        .unwrap();
    let ready = bridge.trampoline(&realm, &ready);

    assert_eq!(
        realm
            .call(&ready, &HostValue::Undefined, &[])
            .unwrap()
            .as_number(),
        Some(1.0),
    );

    let fill = realm.get(&mirror, "fill").unwrap();

    realm.call(&fill, &mirror, &[]).unwrap();

    assert_eq!(
        realm.call(&check, &mirror, &[]).unwrap().as_number(),
        Some(1.0),
    );
}

#[test]
fn test_promise_method() {
    let realm = Realm::new();
    let bridge = Bridge::default();

    let meta = TypeDescriptor::of::<Gauge>().record().unwrap();

    assert!(meta.method("peek").unwrap().signature.is_promise());
    assert!(!meta.method("fill").unwrap().signature.is_promise());

    let gauge = Shared::new(Gauge { level: 3 });
    let mirror = bridge.to_host(&realm, &gauge).unwrap();

    let peek = realm.get(&mirror, "peek").unwrap();
    let promise = realm.call(&peek, &mirror, &[]).unwrap();
    let state = || promise.as_object().and_then(|object| object.promise_state());

    assert!(matches!(state(), Some(PromiseState::Pending)));

    realm.run_until_idle();

    match state() {
        Some(PromiseState::Fulfilled(value)) => assert_eq!(value.as_number(), Some(3.0)),
        other => panic!("the promise is not fulfilled: {other:?}"),
    }
}
