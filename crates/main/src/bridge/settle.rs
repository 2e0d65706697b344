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

use std::{cell::RefCell, future::Future, rc::Rc};

use futures::channel::oneshot;

use crate::{
    host::{HostValue, Property, Realm},
    runtime::{BridgeError, BridgeResult},
};

type Settlement = Result<HostValue, HostValue>;

/// Subscribes to the settlement of a host value.
///
/// If the value is a thenable, the returned future resolves when the thenable
/// settles: with the fulfillment value, or with a
/// [RuntimeFailure](BridgeError::RuntimeFailure) carrying the rejection text.
/// Other values are returned as they are.
///
/// The returned future does not hold the realm, so a task awaiting it never
/// keeps the realm alive.
pub(crate) fn settle(
    realm: &Realm,
    value: HostValue,
) -> impl Future<Output = BridgeResult<HostValue>> + 'static {
    let subscription = subscribe(realm, value);

    async move {
        match subscription? {
            Subscription::Ready(value) => Ok(value),

            Subscription::Pending(receiver) => match receiver.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(reason)) => Err(BridgeError::failure(thrown_message(&reason))),
                Err(_) => Err(BridgeError::failure(
                    "The host promise was dropped before settlement.",
                )),
            },
        }
    }
}

/// Extracts the failure text from a thrown host value: the `message` property
/// of an error object, or the printed value itself.
pub(crate) fn thrown_message(thrown: &HostValue) -> String {
    if let Some(object) = thrown.as_object() {
        if let Some(Property::Data(HostValue::String(message))) = object.property("message") {
            return message.to_string();
        }
    }

    thrown.to_string()
}

enum Subscription {
    Ready(HostValue),
    Pending(oneshot::Receiver<Settlement>),
}

fn subscribe(realm: &Realm, value: HostValue) -> BridgeResult<Subscription> {
    if value.as_object().is_none() {
        return Ok(Subscription::Ready(value));
    }

    let then = realm
        .get(&value, "then")
        .map_err(|thrown| BridgeError::failure(thrown_message(&thrown)))?;

    if !then.is_callable() {
        return Ok(Subscription::Ready(value));
    }

    let (sender, receiver) = oneshot::channel::<Settlement>();
    let sender = Rc::new(RefCell::new(Some(sender)));

    let on_fulfilled = {
        let sender = sender.clone();

        realm.new_function("", move |_, _, args| {
            if let Some(sender) = sender.borrow_mut().take() {
                let _ = sender.send(Ok(args.first().cloned().unwrap_or_default()));
            }

            Ok(HostValue::Undefined)
        })
    };

    let on_rejected = realm.new_function("", move |_, _, args| {
        if let Some(sender) = sender.borrow_mut().take() {
            let _ = sender.send(Err(args.first().cloned().unwrap_or_default()));
        }

        Ok(HostValue::Undefined)
    });

    let _ = realm
        .call(&then, &value, &[on_fulfilled, on_rejected])
        .map_err(|thrown| BridgeError::failure(thrown_message(&thrown)))?;

    Ok(Subscription::Pending(receiver))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_settle_plain_value() {
        let realm = Realm::new();
        let future = settle(&realm, HostValue::Number(3.0));

        let value = futures::executor::block_on(future).unwrap();

        assert_eq!(value.as_number(), Some(3.0));
    }

    #[test]
    fn test_settle_rejected_promise() {
        let realm = Realm::new();
        let (promise, resolvers) = realm.new_promise();
        let outcome = Rc::new(RefCell::new(None));
        let finished = Rc::new(Cell::new(false));

        {
            let future = settle(&realm, HostValue::Object(promise));
            let outcome = outcome.clone();
            let finished = finished.clone();

            realm.spawn(async move {
                *outcome.borrow_mut() = Some(future.await);
                finished.set(true);
            });
        }

        realm.run_until_idle();
        assert!(!finished.get());

        resolvers.reject(&realm, realm.new_error("denied"));
        realm.run_until_idle();

        match outcome.borrow_mut().take() {
            Some(Err(error)) => assert_eq!(error.to_string(), "denied"),
            _ => panic!("rejection was not observed"),
        };
    }
}
