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
    fmt::{Debug, Formatter},
    marker::PhantomData,
    rc::Rc,
};

use futures::future::LocalBoxFuture;

use crate::{
    host::HostObject,
    runtime::{
        AnyValue,
        BridgeError,
        BridgeResult,
        CallbackMeta,
        Func,
        FunctionValue,
        Outputs,
        Params,
        Reflect,
        ReflectBase,
        TypeDescriptor,
        TypeKind,
        View,
    },
};

/// A callable value that can cross the bridge in both directions.
///
/// The `A` parameter is the list of arguments, and the `R` parameter is the
/// list of results (see [Params]): `Callback<(u32, String), bool>` accepts
/// two arguments and returns a single boolean.
///
/// A Callback received from the host wraps the host function. Calling it
/// converts the arguments to host values, calls the host function, awaits the
/// returned Promise (if any), and converts the settled value back into `R`.
/// Passing such a Callback back to the host yields the original host function.
///
/// A Callback created from a [Func] calls the compiled function directly and
/// crosses the bridge as a bridged host function.
///
/// Bridged functions that accept callbacks always run in promise mode, so the
/// compiled code can await the callback calls.
pub struct Callback<A: Params = (), R: Params = ()> {
    inner: CallbackInner,
    marker: PhantomData<fn(A) -> R>,
}

#[derive(Clone)]
enum CallbackInner {
    Nil,
    Host(HostCallable),
    Compiled(Func),
}

impl<A: Params, R: Params> Clone for Callback<A, R> {
    #[inline(always)]
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            marker: PhantomData,
        }
    }
}

impl<A: Params, R: Params> Default for Callback<A, R> {
    #[inline(always)]
    fn default() -> Self {
        Self::nil()
    }
}

impl<A: Params, R: Params> Debug for Callback<A, R> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            CallbackInner::Nil => formatter.write_str("Callback(nil)"),
            CallbackInner::Host(..) => formatter.write_str("Callback(host)"),
            CallbackInner::Compiled(func) => formatter.debug_tuple("Callback").field(func).finish(),
        }
    }
}

impl<A: Params, R: Params> From<Func> for Callback<A, R> {
    #[inline(always)]
    fn from(func: Func) -> Self {
        Self::new(func)
    }
}

impl<A: Params, R: Params> Callback<A, R> {
    /// Creates an uninitialized callback. Calling it fails, and the host
    /// observes it as `undefined`.
    #[inline(always)]
    pub fn nil() -> Self {
        Self {
            inner: CallbackInner::Nil,
            marker: PhantomData,
        }
    }

    /// Creates a callback that calls a compiled function.
    #[inline(always)]
    pub fn new(func: Func) -> Self {
        Self {
            inner: CallbackInner::Compiled(func),
            marker: PhantomData,
        }
    }

    /// Returns true if the callback is uninitialized.
    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(&self.inner, CallbackInner::Nil)
    }

    /// Returns the wrapped host function if this callback came from the host.
    #[inline(always)]
    pub fn host_function(&self) -> Option<&HostObject> {
        match &self.inner {
            CallbackInner::Host(host) => Some(&host.function),
            _ => None,
        }
    }

    /// Calls the callback.
    ///
    /// Fails with [BridgeError::InvalidValue] if the callback is nil, and with
    /// [BridgeError::RuntimeFailure] if the host function throws or its
    /// Promise rejects.
    pub async fn call(&self, args: A) -> BridgeResult<R> {
        match &self.inner {
            CallbackInner::Nil => Err(BridgeError::invalid("a nil callback")),

            CallbackInner::Host(host) => {
                let values = (host.call)(args.into_values()).await?;

                R::from_values(values)
            }

            CallbackInner::Compiled(func) => {
                let args = args
                    .into_values()
                    .into_iter()
                    .map(ReflectBase::into_any)
                    .collect();

                let outputs = func.invoke(args).complete().await?;

                R::from_values(outputs.into_iter().map(ReflectBase::into_any).collect())
            }
        }
    }
}

impl<A: Params, R: Params> Reflect for Callback<A, R> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Function(CallbackMeta {
            params: A::types,
            results: R::types,
            from_host: |host| {
                Box::new(Callback::<A, R> {
                    inner: CallbackInner::Host(host),
                    marker: PhantomData,
                })
            },
        }))
        .with_zero(|| Box::new(Callback::<A, R>::nil()))
    }

    fn view(&self) -> View<'_> {
        View::Function(match &self.inner {
            CallbackInner::Nil => FunctionValue::Nil,
            CallbackInner::Host(host) => FunctionValue::Host(&host.function),
            CallbackInner::Compiled(func) => FunctionValue::Compiled(func),
        })
    }
}

/// A host function prepared for calls from the compiled side.
///
/// The inbound converter creates this object when the host passes a function
/// where a [Callback] is expected.
#[derive(Clone)]
pub struct HostCallable {
    function: HostObject,
    call: Rc<dyn Fn(Outputs) -> LocalBoxFuture<'static, BridgeResult<Vec<AnyValue>>>>,
}

impl HostCallable {
    #[inline(always)]
    pub(crate) fn new(
        function: HostObject,
        call: impl Fn(Outputs) -> LocalBoxFuture<'static, BridgeResult<Vec<AnyValue>>> + 'static,
    ) -> Self {
        Self {
            function,
            call: Rc::new(call),
        }
    }

    /// Returns the wrapped host function.
    #[inline(always)]
    pub fn function(&self) -> &HostObject {
        &self.function
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn test_compiled_callback() {
        let callback = Callback::<(u32, u32), u32>::new(Func::new("sum", |a: u32, b: u32| a + b));

        assert!(!callback.is_nil());
        assert_eq!(block_on(callback.call((2, 3))).unwrap(), 5);
    }

    #[test]
    fn test_nil_callback() {
        let callback = Callback::<u32, ()>::default();

        assert!(callback.is_nil());
        assert!(matches!(
            block_on(callback.call(1)),
            Err(BridgeError::InvalidValue { .. }),
        ));
    }

    #[test]
    fn test_callback_descriptor() {
        let descriptor = TypeDescriptor::of::<Callback<(String, bool), f64>>();

        let TypeKind::Function(meta) = descriptor.kind() else {
            panic!("callback is not a function");
        };

        assert_eq!((meta.params)().len(), 2);
        assert_eq!((meta.results)().len(), 1);
        assert!(descriptor.is_function());
    }
}
