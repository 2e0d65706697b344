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

use std::{cell::Cell, mem::take, rc::Rc};

use log::trace;

use crate::host::{HostObject, HostValue, ObjectClass, Realm};

/// The state of a host promise.
#[derive(Clone, Debug)]
pub enum PromiseState {
    /// The promise is not settled yet.
    Pending,

    /// The promise is fulfilled with a value.
    Fulfilled(HostValue),

    /// The promise is rejected with a reason.
    Rejected(HostValue),
}

impl PromiseState {
    /// Returns true if the promise is not settled yet.
    #[inline(always)]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

pub(crate) struct PromiseSlot {
    state: PromiseState,
    reactions: Vec<Reaction>,
}

impl PromiseSlot {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Self {
            state: PromiseState::Pending,
            reactions: Vec::new(),
        }
    }

    #[inline(always)]
    pub(crate) fn state(&self) -> &PromiseState {
        &self.state
    }
}

#[derive(Clone)]
struct Reaction {
    on_fulfilled: HostValue,
    on_rejected: HostValue,
    derived: PromiseResolvers,
}

/// The resolving functions of a host promise.
///
/// Only the first call to [resolve](Self::resolve) or [reject](Self::reject)
/// has an effect. Resolving a promise with a thenable value makes the promise
/// follow that value.
#[derive(Clone)]
pub struct PromiseResolvers {
    promise: HostObject,
    resolved: Rc<Cell<bool>>,
}

impl PromiseResolvers {
    #[inline(always)]
    pub(crate) fn new(promise: HostObject) -> Self {
        Self {
            promise,
            resolved: Rc::new(Cell::new(false)),
        }
    }

    /// Returns the promise object these functions settle.
    #[inline(always)]
    pub fn promise(&self) -> &HostObject {
        &self.promise
    }

    /// Resolves the promise with a value.
    pub fn resolve(&self, realm: &Realm, value: HostValue) {
        if self.resolved.replace(true) {
            return;
        }

        resolve_promise(realm, &self.promise, value);
    }

    /// Rejects the promise with a reason.
    pub fn reject(&self, realm: &Realm, reason: HostValue) {
        if self.resolved.replace(true) {
            return;
        }

        settle(realm, &self.promise, PromiseState::Rejected(reason));
    }

    /// Creates a pair of host functions that resolve and reject the promise.
    pub fn functions(&self, realm: &Realm) -> (HostValue, HostValue) {
        let resolvers = self.clone();

        let resolve = realm.new_function("resolve", move |realm, _, args| {
            resolvers.resolve(realm, args.first().cloned().unwrap_or_default());

            Ok(HostValue::Undefined)
        });

        let resolvers = self.clone();

        let reject = realm.new_function("reject", move |realm, _, args| {
            resolvers.reject(realm, args.first().cloned().unwrap_or_default());

            Ok(HostValue::Undefined)
        });

        (resolve, reject)
    }
}

fn resolve_promise(realm: &Realm, promise: &HostObject, value: HostValue) {
    if let HostValue::Object(object) = &value {
        if object.ptr_eq(promise) {
            let error = realm.new_type_error("Chaining cycle detected for promise");

            settle(realm, promise, PromiseState::Rejected(error));

            return;
        }

        let then = match realm.get(&value, "then") {
            Ok(then) => then,

            Err(error) => {
                settle(realm, promise, PromiseState::Rejected(error));

                return;
            }
        };

        if then.is_callable() {
            let resolvers = PromiseResolvers::new(promise.clone());

            realm.enqueue_job(move |realm| {
                let (resolve, reject) = resolvers.functions(realm);

                if let Err(error) = realm.call(&then, &value, &[resolve, reject]) {
                    resolvers.reject(realm, error);
                }
            });

            return;
        }
    }

    settle(realm, promise, PromiseState::Fulfilled(value));
}

fn settle(realm: &Realm, promise: &HostObject, state: PromiseState) {
    let ObjectClass::Promise(slot) = promise.class() else {
        return;
    };

    let reactions = {
        let mut slot = slot.borrow_mut();

        if !slot.state.is_pending() {
            return;
        }

        slot.state = state.clone();

        take(&mut slot.reactions)
    };

    trace!(
        "Promise {:#x} settled with {} reaction(s).",
        promise.address(),
        reactions.len(),
    );

    for reaction in reactions {
        let state = state.clone();

        realm.enqueue_job(move |realm| run_reaction(realm, reaction, state));
    }
}

fn run_reaction(realm: &Realm, reaction: Reaction, state: PromiseState) {
    let outcome = match state {
        PromiseState::Pending => return,

        PromiseState::Fulfilled(value) => match reaction.on_fulfilled.is_callable() {
            true => realm.call(&reaction.on_fulfilled, &HostValue::Undefined, &[value]),
            false => Ok(value),
        },

        PromiseState::Rejected(reason) => match reaction.on_rejected.is_callable() {
            true => realm.call(&reaction.on_rejected, &HostValue::Undefined, &[reason]),
            false => Err(reason),
        },
    };

    match outcome {
        Ok(value) => reaction.derived.resolve(realm, value),
        Err(reason) => reaction.derived.reject(realm, reason),
    }
}

// The built-in `then` method of promise objects.
pub(crate) fn promise_then(
    realm: &Realm,
    this: &HostValue,
    on_fulfilled: HostValue,
    on_rejected: HostValue,
) -> Result<HostValue, HostValue> {
    let Some(promise) = this.as_object() else {
        return Err(realm.new_type_error("Promise.prototype.then called on a non-object"));
    };

    let ObjectClass::Promise(slot) = promise.class() else {
        return Err(realm.new_type_error("Promise.prototype.then called on a non-promise"));
    };

    let (derived, derived_resolvers) = realm.new_promise();

    let reaction = Reaction {
        on_fulfilled,
        on_rejected,
        derived: derived_resolvers,
    };

    let settled = {
        let mut slot = slot.borrow_mut();

        match &slot.state {
            PromiseState::Pending => {
                slot.reactions.push(reaction.clone());

                None
            }

            state => Some(state.clone()),
        }
    };

    if let Some(state) = settled {
        realm.enqueue_job(move |realm| run_reaction(realm, reaction, state));
    }

    Ok(HostValue::Object(derived))
}
