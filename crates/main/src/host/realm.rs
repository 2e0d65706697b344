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
    cell::RefCell,
    collections::VecDeque,
    fmt::{Debug, Formatter},
    future::Future,
    rc::{Rc, Weak},
};

use compact_str::{format_compact, CompactString};
use futures::{
    executor::{LocalPool, LocalSpawner},
    task::LocalSpawnExt,
};
use log::{error, trace};

use crate::host::{
    promise::promise_then,
    FinalizationQueue,
    HostObject,
    HostResult,
    HostValue,
    ObjectClass,
    PromiseResolvers,
    PromiseSlot,
    Property,
};

type Job = Box<dyn FnOnce(&Realm)>;

/// A single-threaded host realm.
///
/// The realm owns the global object, the job queue (promise reactions), the
/// finalization queue (callbacks of reclaimed objects), and a local executor
/// that runs compiled asynchronous tasks. Nothing happens in the background:
/// queued work runs when you call [Realm::run_until_idle].
///
/// ```
/// use tether::host::{HostValue, Realm};
///
/// let realm = Realm::new();
///
/// let twice = realm.new_function("twice", |_, _, args| {
///     let value = args.first().and_then(HostValue::as_number).unwrap_or(0.0);
///
///     Ok(HostValue::Number(value * 2.0))
/// });
///
/// let result = realm.call(&twice, &HostValue::Undefined, &[HostValue::Number(21.0)]);
///
/// assert_eq!(result.unwrap().as_number(), Some(42.0));
/// ```
#[derive(Clone)]
pub struct Realm(Rc<RealmInner>);

/// A weak reference to a [Realm].
#[derive(Clone)]
pub struct WeakRealm(Weak<RealmInner>);

impl WeakRealm {
    /// Returns the realm if it is still alive.
    #[inline(always)]
    pub fn upgrade(&self) -> Option<Realm> {
        self.0.upgrade().map(Realm)
    }
}

struct RealmInner {
    global: HostObject,
    jobs: RefCell<VecDeque<Job>>,
    finalization: Rc<FinalizationQueue>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    then: HostValue,
    catch: HostValue,
}

impl Default for Realm {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Realm {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Realm")
            .field("jobs", &self.0.jobs.borrow().len())
            .field("finalization", &self.0.finalization.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Realm {
    /// Creates a new realm with an empty global object.
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();

        let then = native_function("then", |realm, this, args| {
            let on_fulfilled = args.first().cloned().unwrap_or_default();
            let on_rejected = args.get(1).cloned().unwrap_or_default();

            promise_then(realm, this, on_fulfilled, on_rejected)
        });

        let catch = native_function("catch", |realm, this, args| {
            let on_rejected = args.first().cloned().unwrap_or_default();

            promise_then(realm, this, HostValue::Undefined, on_rejected)
        });

        Self(Rc::new(RealmInner {
            global: HostObject::new(ObjectClass::Plain),
            jobs: RefCell::new(VecDeque::new()),
            finalization: Rc::new(RefCell::new(VecDeque::new())),
            pool: RefCell::new(pool),
            spawner,
            then,
            catch,
        }))
    }

    /// Creates a weak reference to this realm.
    #[inline(always)]
    pub fn downgrade(&self) -> WeakRealm {
        WeakRealm(Rc::downgrade(&self.0))
    }

    /// Returns the global object.
    #[inline(always)]
    pub fn global(&self) -> &HostObject {
        &self.0.global
    }

    /// Reads a property of the global object.
    #[inline(always)]
    pub fn get_global(&self, key: &str) -> HostResult {
        self.get(&HostValue::Object(self.0.global.clone()), key)
    }

    /// Writes a property of the global object.
    #[inline(always)]
    pub fn set_global(&self, key: &str, value: HostValue) -> HostResult<()> {
        self.set(&HostValue::Object(self.0.global.clone()), key, value)
    }

    /// Creates an empty ordinary object.
    #[inline(always)]
    pub fn new_object(&self) -> HostObject {
        HostObject::new(ObjectClass::Plain)
    }

    /// Creates an array.
    #[inline(always)]
    pub fn new_array(&self, elements: Vec<HostValue>) -> HostValue {
        HostValue::Object(HostObject::new(ObjectClass::Array(RefCell::new(elements))))
    }

    /// Creates a byte buffer holding a copy of `bytes`.
    #[inline(always)]
    pub fn new_buffer(&self, bytes: &[u8]) -> HostValue {
        HostValue::Object(HostObject::new(ObjectClass::Buffer(RefCell::new(
            bytes.to_vec(),
        ))))
    }

    /// Creates an error object with the given message.
    #[inline(always)]
    pub fn new_error(&self, message: impl Into<CompactString>) -> HostValue {
        let error = HostObject::new(ObjectClass::Error);

        error.define("message", Property::Data(HostValue::String(message.into())));

        HostValue::Object(error)
    }

    /// Creates an error object of the `TypeError` class.
    pub fn new_type_error(&self, message: impl Into<CompactString>) -> HostValue {
        let error = self.new_error(message);

        if let HostValue::Object(object) = &error {
            object.define("name", Property::Data(HostValue::from("TypeError")));
        }

        error
    }

    /// Creates a native function.
    #[inline(always)]
    pub fn new_function(
        &self,
        name: impl Into<CompactString>,
        function: impl Fn(&Realm, &HostValue, &[HostValue]) -> HostResult + 'static,
    ) -> HostValue {
        native_function(name, function)
    }

    /// Creates a pending promise and its resolving functions.
    pub fn new_promise(&self) -> (HostObject, PromiseResolvers) {
        let promise = HostObject::new(ObjectClass::Promise(RefCell::new(PromiseSlot::new())));
        let resolvers = PromiseResolvers::new(promise.clone());

        (promise, resolvers)
    }

    /// Reads a property of a value. Accessor properties call their getters.
    ///
    /// Reading a property of `undefined` or `null` throws a `TypeError`.
    pub fn get(&self, target: &HostValue, key: &str) -> HostResult {
        let object = match target {
            HostValue::Object(object) => object,

            HostValue::Undefined | HostValue::Null => {
                return Err(self.new_type_error(format_compact!(
                    "Cannot read properties of {target} (reading '{key}')"
                )));
            }

            HostValue::String(string) if key == "length" => {
                return Ok(HostValue::Number(string.chars().count() as f64));
            }

            _ => return Ok(HostValue::Undefined),
        };

        if let Some(property) = object.property(key) {
            return match property {
                Property::Data(value) => Ok(value),
                Property::Accessor { get: Some(get), .. } => self.call(&get, target, &[]),
                Property::Accessor { get: None, .. } => Ok(HostValue::Undefined),
            };
        }

        match object.class() {
            ObjectClass::Array(..) | ObjectClass::Buffer(..) => {
                if key == "length" || key == "byteLength" {
                    return Ok(HostValue::Number(object.length().unwrap_or(0) as f64));
                }

                match key.parse::<usize>() {
                    Ok(index) => Ok(object.element(index).unwrap_or_default()),
                    Err(_) => Ok(HostValue::Undefined),
                }
            }

            ObjectClass::Function { name, .. } if key == "name" => {
                Ok(HostValue::String(name.clone()))
            }

            ObjectClass::Promise(..) if key == "then" => Ok(self.0.then.clone()),

            ObjectClass::Promise(..) if key == "catch" => Ok(self.0.catch.clone()),

            ObjectClass::Error if key == "name" => Ok(HostValue::from("Error")),

            _ => Ok(HostValue::Undefined),
        }
    }

    /// Writes a property of a value. Accessor properties call their setters.
    ///
    /// Writing a property of `undefined` or `null` throws a `TypeError`.
    /// Writes to other primitive values are ignored.
    pub fn set(&self, target: &HostValue, key: &str, value: HostValue) -> HostResult<()> {
        let object = match target {
            HostValue::Object(object) => object,

            HostValue::Undefined | HostValue::Null => {
                return Err(self.new_type_error(format_compact!(
                    "Cannot set properties of {target} (setting '{key}')"
                )));
            }

            _ => return Ok(()),
        };

        match object.property(key) {
            Some(Property::Accessor { set: Some(set), .. }) => {
                let _ = self.call(&set, target, &[value])?;

                return Ok(());
            }

            Some(Property::Accessor { set: None, .. }) => return Ok(()),

            _ => (),
        }

        if let Ok(index) = key.parse::<usize>() {
            if object.set_element(index, value.clone()) {
                return Ok(());
            }
        }

        object.define(key, Property::Data(value));

        Ok(())
    }

    /// Defines a batch of own properties on an object.
    pub fn define_properties<K: Into<CompactString>>(
        &self,
        object: &HostObject,
        properties: impl IntoIterator<Item = (K, Property)>,
    ) {
        for (key, property) in properties {
            object.define(key, property);
        }
    }

    /// Returns the enumerable own entries of an object: the elements of arrays
    /// and buffers, or the own properties of other objects in definition
    /// order. Accessor properties are read through their getters.
    pub fn entries(&self, object: &HostObject) -> HostResult<Vec<(CompactString, HostValue)>> {
        if let Some(length) = object.length() {
            return Ok((0..length)
                .map(|index| {
                    (
                        format_compact!("{index}"),
                        object.element(index).unwrap_or_default(),
                    )
                })
                .collect());
        }

        let target = HostValue::Object(object.clone());
        let mut entries = Vec::new();

        for key in object.keys() {
            let value = self.get(&target, &key)?;

            entries.push((key, value));
        }

        Ok(entries)
    }

    /// Calls a function with the given `this` value and arguments.
    ///
    /// Throws a `TypeError` if `function` is not callable.
    pub fn call(&self, function: &HostValue, this: &HostValue, args: &[HostValue]) -> HostResult {
        let native = match function.as_object().map(HostObject::class) {
            Some(ObjectClass::Function { native, .. }) => native.clone(),
            _ => return Err(self.not_a_function(function)),
        };

        native(self, this, args)
    }

    /// Registers a callback that runs after the object is reclaimed.
    ///
    /// The callback is queued when the last reference to the object is
    /// dropped, and runs during the next [Realm::run_until_idle] call.
    pub fn register_finalizer(&self, object: &HostObject, callback: impl FnOnce() + 'static) {
        object.add_finalizer(Rc::downgrade(&self.0.finalization), Box::new(callback));
    }

    /// Queues a job. Jobs run in FIFO order during [Realm::run_until_idle].
    #[inline(always)]
    pub fn enqueue_job(&self, job: impl FnOnce(&Realm) + 'static) {
        self.0.jobs.borrow_mut().push_back(Box::new(job));
    }

    /// Spawns a task on the realm's local executor.
    pub fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        if let Err(spawn_error) = self.0.spawner.spawn_local(task) {
            error!("Failed to spawn a realm task: {spawn_error}");
        }
    }

    /// Runs queued jobs, finalization callbacks and spawned tasks until none
    /// of them can make progress.
    ///
    /// Nested calls (e.g., from inside a running task) run jobs and
    /// finalizers but do not poll the tasks.
    pub fn run_until_idle(&self) {
        loop {
            let mut turns = 0usize;

            while let Some(job) = self.next_job() {
                job(self);
                turns += 1;
            }

            while let Some(finalizer) = self.next_finalizer() {
                finalizer();
                turns += 1;
            }

            match self.0.pool.try_borrow_mut() {
                Ok(mut pool) => pool.run_until_stalled(),
                Err(_) => trace!("Skipping task polling in a nested realm loop."),
            }

            trace!("Realm loop turn processed {turns} job(s) and finalizer(s).");

            if self.0.jobs.borrow().is_empty() && self.0.finalization.borrow().is_empty() {
                break;
            }
        }
    }

    #[inline(always)]
    fn next_job(&self) -> Option<Job> {
        self.0.jobs.borrow_mut().pop_front()
    }

    #[inline(always)]
    fn next_finalizer(&self) -> Option<Box<dyn FnOnce()>> {
        self.0.finalization.borrow_mut().pop_front()
    }

    fn not_a_function(&self, function: &HostValue) -> HostValue {
        self.new_type_error(format_compact!("{} is not a function", function.type_of()))
    }
}

fn native_function(
    name: impl Into<CompactString>,
    function: impl Fn(&Realm, &HostValue, &[HostValue]) -> HostResult + 'static,
) -> HostValue {
    HostValue::Object(HostObject::new(ObjectClass::Function {
        name: name.into(),
        native: Rc::new(function),
    }))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::host::PromiseState;

    #[test]
    fn test_accessors() {
        let realm = Realm::new();
        let object = realm.new_object();
        let storage = Rc::new(Cell::new(1.0));

        let getter = {
            let storage = storage.clone();

            realm.new_function("get", move |_, _, _| Ok(HostValue::Number(storage.get())))
        };

        let setter = {
            let storage = storage.clone();

            realm.new_function("set", move |_, _, args| {
                storage.set(args.first().and_then(HostValue::as_number).unwrap_or(0.0));

                Ok(HostValue::Undefined)
            })
        };

        realm.define_properties(
            &object,
            [(
                "value",
                Property::Accessor {
                    get: Some(getter),
                    set: Some(setter),
                },
            )],
        );

        let target = HostValue::Object(object);

        assert_eq!(realm.get(&target, "value").unwrap().as_number(), Some(1.0));
        realm.set(&target, "value", HostValue::Number(7.0)).unwrap();
        assert_eq!(storage.get(), 7.0);
        assert_eq!(realm.get(&target, "value").unwrap().as_number(), Some(7.0));
    }

    #[test]
    fn test_distant_array_writes() {
        let realm = Realm::new();
        let array = realm.new_array(vec![]);

        realm.set(&array, "2", HostValue::Number(3.0)).unwrap();
        realm
            .set(&array, "18446744073709551615", HostValue::Number(1.0))
            .unwrap();
        realm
            .set(&array, "4000000000", HostValue::Number(2.0))
            .unwrap();

        let object = array.as_object().unwrap();

        assert_eq!(object.length(), Some(3));
        assert_eq!(realm.get(&array, "2").unwrap().as_number(), Some(3.0));
        assert_eq!(
            realm
                .get(&array, "18446744073709551615")
                .unwrap()
                .as_number(),
            Some(1.0),
        );
        assert_eq!(realm.get(&array, "4000000000").unwrap().as_number(), Some(2.0));
    }

    #[test]
    fn test_promise_chain() {
        let realm = Realm::new();
        let (promise, resolvers) = realm.new_promise();

        let on_fulfilled = realm.new_function("onFulfilled", |_, _, args| {
            let value = args.first().and_then(HostValue::as_number).unwrap_or(0.0);

            Ok(HostValue::Number(value + 1.0))
        });

        let promise = HostValue::Object(promise);
        let then = realm.get(&promise, "then").unwrap();
        let derived = realm.call(&then, &promise, &[on_fulfilled]).unwrap();

        resolvers.resolve(&realm, HostValue::Number(1.0));
        realm.run_until_idle();

        match derived.as_object().and_then(HostObject::promise_state) {
            Some(PromiseState::Fulfilled(value)) => assert_eq!(value.as_number(), Some(2.0)),
            _ => panic!("derived promise is not fulfilled"),
        }
    }

    #[test]
    fn test_thenable_adoption() {
        let realm = Realm::new();
        let (inner, inner_resolvers) = realm.new_promise();
        let (outer, outer_resolvers) = realm.new_promise();

        outer_resolvers.resolve(&realm, HostValue::Object(inner));
        realm.run_until_idle();
        assert!(outer.promise_state().unwrap().is_pending());

        inner_resolvers.reject(&realm, HostValue::from("nope"));
        realm.run_until_idle();

        match outer.promise_state() {
            Some(PromiseState::Rejected(reason)) => assert_eq!(reason.as_str(), Some("nope")),
            _ => panic!("outer promise did not adopt the inner state"),
        }
    }

    #[test]
    fn test_finalization() {
        let realm = Realm::new();
        let finalized = Rc::new(Cell::new(false));
        let object = realm.new_object();

        {
            let finalized = finalized.clone();

            realm.register_finalizer(&object, move || finalized.set(true));
        }

        realm.run_until_idle();
        assert!(!finalized.get());

        drop(object);
        assert!(!finalized.get());

        realm.run_until_idle();
        assert!(finalized.get());
    }

    #[test]
    fn test_call_non_function() {
        let realm = Realm::new();

        let thrown = realm
            .call(&HostValue::Number(1.0), &HostValue::Undefined, &[])
            .unwrap_err();

        assert_eq!(
            realm.get(&thrown, "message").unwrap().as_str(),
            Some("number is not a function"),
        );
        assert_eq!(realm.get(&thrown, "name").unwrap().as_str(), Some("TypeError"));
    }
}
