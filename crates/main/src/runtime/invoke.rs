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
    fmt::{Debug, Display, Formatter},
    future::Future,
    rc::Rc,
    vec::IntoIter,
};

use futures::{future::LocalBoxFuture, FutureExt};

use crate::runtime::{
    downcast,
    AnyValue,
    BridgeError,
    BridgeResult,
    ErasedCell,
    Reflect,
    Shared,
    TypeDescriptor,
    TypeRef,
};

/// The results of a compiled function call, in declaration order.
pub type Outputs = Vec<Box<dyn Reflect>>;

/// The signature of a bridged function or method.
///
/// The Function Bridge uses this object to build the argument converters and
/// to choose between the synchronous and the promise call modes. The
/// exposition module uses it to render declarations.
///
/// The [Display] implementation renders a canonical view of the signature,
/// such as `fn foo(x: usize, y: bool) -> f32`.
///
/// ```
/// use tether::runtime::{Param, Signature, TypeDescriptor};
///
/// let signature = Signature {
///     params: vec![Param {
///         name: "x",
///         ty: TypeDescriptor::of::<usize>,
///     }],
///     results: vec![TypeDescriptor::of::<f32>],
///     ..Signature::new("foo")
/// };
///
/// assert_eq!(signature.to_string(), "fn foo(x: usize) -> f32");
/// ```
#[derive(Clone)]
pub struct Signature {
    /// The name of the function.
    pub name: &'static str,

    /// The RustDoc documentation of the function, if available.
    pub doc: Option<&'static str>,

    /// The parameters, excluding the receiver.
    pub params: Vec<Param>,

    /// The result types. An empty vector means the function returns nothing.
    pub results: Vec<TypeRef>,

    /// The explicit promise marker (`#[export(promise)]`).
    pub promise: bool,

    /// True if the function is asynchronous.
    pub is_async: bool,
}

impl Debug for Signature {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for Signature {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_async {
            formatter.write_str("async ")?;
        }

        formatter.write_fmt(format_args!("fn {}(", self.name))?;

        let mut first = true;

        for param in &self.params {
            match first {
                true => first = false,
                false => formatter.write_str(", ")?,
            }

            formatter.write_fmt(format_args!("{}: {}", param.name, (param.ty)()))?;
        }

        formatter.write_str(")")?;

        match self.results.len() {
            0 => Ok(()),
            1 => formatter.write_fmt(format_args!(" -> {}", (self.results[0])())),
            _ => {
                formatter.write_str(" -> (")?;

                let mut first = true;

                for result in &self.results {
                    match first {
                        true => first = false,
                        false => formatter.write_str(", ")?,
                    }

                    formatter.write_fmt(format_args!("{}", result()))?;
                }

                formatter.write_str(")")
            }
        }
    }
}

impl Signature {
    /// Creates a signature of a synchronous function with the given name that
    /// has no parameters and no results.
    #[inline(always)]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            doc: None,
            params: Vec::new(),
            results: Vec::new(),
            promise: false,
            is_async: false,
        }
    }

    /// Returns the number of parameters.
    #[inline(always)]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Returns true if the host always receives a Promise from this function.
    ///
    /// This is the case for the functions with an explicit promise marker, for
    /// the asynchronous functions, and for the functions with at least one
    /// callable parameter.
    pub fn is_promise(&self) -> bool {
        if self.promise || self.is_async {
            return true;
        }

        self.params.iter().any(|param| (param.ty)().is_function())
    }

    /// Returns an iterator over the parameter names.
    #[inline(always)]
    pub fn param_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().map(|param| param.name)
    }
}

/// A function parameter.
#[derive(Clone, Copy)]
pub struct Param {
    /// The name of the parameter.
    pub name: &'static str,

    /// The type of the parameter.
    pub ty: TypeRef,
}

impl Debug for Param {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("{}: {}", self.name, (self.ty)()))
    }
}

/// The metadata of an exported method.
pub struct MethodMeta {
    /// The method signature, excluding the receiver.
    pub signature: Signature,

    /// Invokes the method on the receiver stored in the cell.
    pub invoke: fn(&Rc<dyn ErasedCell>, Vec<AnyValue>) -> Invocation,
}

/// Exported methods of an exported struct.
///
/// Implemented by the [export](crate::export) macro on `impl` blocks.
pub trait ExportedMethods: Reflect {
    /// Returns the metadata of the exported methods in declaration order.
    fn methods() -> Vec<MethodMeta>;
}

/// The outcome of a compiled call.
pub enum Invocation {
    /// The call has completed synchronously.
    Ready(BridgeResult<Outputs>),

    /// The call continues asynchronously.
    Pending(LocalBoxFuture<'static, BridgeResult<Outputs>>),
}

impl Invocation {
    /// Wraps the results of a completed call.
    #[inline(always)]
    pub fn ready<R: Returns>(result: R) -> Self {
        Self::Ready(result.into_outputs())
    }

    /// Wraps a future that produces the results of the call.
    #[inline(always)]
    pub fn pending<R: Returns>(future: impl Future<Output = R> + 'static) -> Self {
        Self::Pending(async move { future.await.into_outputs() }.boxed_local())
    }

    /// Awaits the results regardless of the call mode.
    pub async fn complete(self) -> BridgeResult<Outputs> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

/// A compiled function that can cross the bridge.
///
/// Create Func objects from Rust closures and functions with up to six
/// parameters using [Func::new] (synchronous) or [Func::future]
/// (asynchronous), or use the [export](crate::export) macro on a free function
/// and obtain its Func object with the [func](crate::func) macro.
///
/// ```
/// use tether::runtime::Func;
///
/// let add = Func::new("add", |a: u32, b: u32| a + b).with_params(&["a", "b"]);
///
/// assert_eq!(add.signature().to_string(), "fn add(a: u32, b: u32) -> u32");
/// ```
#[derive(Clone)]
pub struct Func(Rc<FuncInner>);

struct FuncInner {
    signature: Signature,
    body: Rc<dyn Fn(Vec<AnyValue>) -> Invocation>,
}

impl Debug for Func {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0.signature, formatter)
    }
}

impl Func {
    /// Wraps a synchronous Rust function.
    pub fn new<M>(name: &'static str, function: impl SyncFn<M>) -> Self {
        let signature = Signature {
            params: params_of(SyncFn::<M>::params_of(&function)),
            results: SyncFn::<M>::results_of(&function),
            ..Signature::new(name)
        };

        Self::from_raw(signature, move |args| Invocation::Ready(function.call(args)))
    }

    /// Wraps an asynchronous Rust function.
    pub fn future<M>(name: &'static str, function: impl AsyncFn<M>) -> Self {
        let signature = Signature {
            params: params_of(AsyncFn::<M>::params_of(&function)),
            results: AsyncFn::<M>::results_of(&function),
            is_async: true,
            ..Signature::new(name)
        };

        Self::from_raw(signature, move |args| Invocation::Pending(function.call(args)))
    }

    /// Creates a function object from a signature and a type-erased body.
    ///
    /// The body receives the inbound-converted arguments whose types match the
    /// signature's parameters.
    pub fn from_raw(
        signature: Signature,
        body: impl Fn(Vec<AnyValue>) -> Invocation + 'static,
    ) -> Self {
        Self(Rc::new(FuncInner {
            signature,
            body: Rc::new(body),
        }))
    }

    /// Renames the parameters. Extra names are ignored.
    pub fn with_params(self, names: &[&'static str]) -> Self {
        self.map_signature(|signature| {
            for (param, name) in signature.params.iter_mut().zip(names) {
                param.name = name;
            }
        })
    }

    /// Sets the explicit promise marker.
    pub fn with_promise(self, promise: bool) -> Self {
        self.map_signature(|signature| signature.promise = promise)
    }

    /// Sets the RustDoc documentation.
    pub fn with_doc(self, doc: Option<&'static str>) -> Self {
        self.map_signature(|signature| signature.doc = doc)
    }

    /// Returns the signature of this function.
    #[inline(always)]
    pub fn signature(&self) -> &Signature {
        &self.0.signature
    }

    /// Calls the function with type-erased arguments.
    #[inline(always)]
    pub fn invoke(&self, args: Vec<AnyValue>) -> Invocation {
        (self.0.body)(args)
    }

    /// Returns true if both objects refer to the same function instance.
    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn map_signature(self, map: impl FnOnce(&mut Signature)) -> Self {
        let mut signature = self.0.signature.clone();

        map(&mut signature);

        Self(Rc::new(FuncInner {
            signature,
            body: self.0.body.clone(),
        }))
    }
}

fn params_of(types: Vec<TypeRef>) -> Vec<Param> {
    const NAMES: [&str; 6] = ["arg0", "arg1", "arg2", "arg3", "arg4", "arg5"];

    types
        .into_iter()
        .enumerate()
        .map(|(index, ty)| Param {
            name: NAMES.get(index).copied().unwrap_or("arg"),
            ty,
        })
        .collect()
}

/// A synchronous Rust function with up to six reflectable parameters.
///
/// The `M` parameter is a marker that distinguishes the function arities.
pub trait SyncFn<M>: 'static {
    /// Returns the parameter types.
    fn params_of(&self) -> Vec<TypeRef>;

    /// Returns the result types.
    fn results_of(&self) -> Vec<TypeRef>;

    /// Calls the function with type-erased arguments.
    fn call(&self, args: Vec<AnyValue>) -> BridgeResult<Outputs>;
}

/// An asynchronous Rust function with up to six reflectable parameters.
///
/// The `M` parameter is a marker that distinguishes the function arities.
pub trait AsyncFn<M>: 'static {
    /// Returns the parameter types.
    fn params_of(&self) -> Vec<TypeRef>;

    /// Returns the result types.
    fn results_of(&self) -> Vec<TypeRef>;

    /// Calls the function with type-erased arguments.
    fn call(&self, args: Vec<AnyValue>) -> LocalBoxFuture<'static, BridgeResult<Outputs>>;
}

macro_rules! impl_fn {
    ($($arg:ident: $ty:ident),*) => {
        impl<F, R, $($ty,)*> SyncFn<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + 'static,
            R: Returns,
            $($ty: Reflect,)*
        {
            #[inline(always)]
            fn params_of(&self) -> Vec<TypeRef> {
                vec![$(TypeDescriptor::of::<$ty>,)*]
            }

            #[inline(always)]
            fn results_of(&self) -> Vec<TypeRef> {
                R::types()
            }

            #[allow(unused_mut)]
            fn call(&self, args: Vec<AnyValue>) -> BridgeResult<Outputs> {
                let mut args = Arguments::new(args, impl_fn!(@count $($ty)*))?;

                $(let $arg = args.take::<$ty>()?;)*

                self($($arg),*).into_outputs()
            }
        }

        impl<F, Fut, R, $($ty,)*> AsyncFn<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Fut + 'static,
            Fut: Future<Output = R> + 'static,
            R: Returns,
            $($ty: Reflect,)*
        {
            #[inline(always)]
            fn params_of(&self) -> Vec<TypeRef> {
                vec![$(TypeDescriptor::of::<$ty>,)*]
            }

            #[inline(always)]
            fn results_of(&self) -> Vec<TypeRef> {
                R::types()
            }

            #[allow(unused_mut)]
            fn call(&self, args: Vec<AnyValue>) -> LocalBoxFuture<'static, BridgeResult<Outputs>> {
                let decoded = (|| -> BridgeResult<_> {
                    let mut args = Arguments::new(args, impl_fn!(@count $($ty)*))?;

                    Ok(($(args.take::<$ty>()?,)*))
                })();

                match decoded {
                    Ok(($($arg,)*)) => {
                        let future = self($($arg),*);

                        async move { future.await.into_outputs() }.boxed_local()
                    }

                    Err(error) => async move { Err(error) }.boxed_local(),
                }
            }
        }
    };

    (@count) => { 0usize };

    (@count $head:ident $($tail:ident)*) => { 1usize + impl_fn!(@count $($tail)*) };
}

impl_fn!();
impl_fn!(a1: A1);
impl_fn!(a1: A1, a2: A2);
impl_fn!(a1: A1, a2: A2, a3: A3);
impl_fn!(a1: A1, a2: A2, a3: A3, a4: A4);
impl_fn!(a1: A1, a2: A2, a3: A3, a4: A4, a5: A5);
impl_fn!(a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6);

/// A cursor over the inbound-converted arguments of a call.
pub struct Arguments {
    values: IntoIter<AnyValue>,
}

impl Arguments {
    /// Creates a cursor, or fails with [BridgeError::ArityMismatch] if the
    /// number of arguments differs from `arity`.
    #[inline]
    pub fn new(values: Vec<AnyValue>, arity: usize) -> BridgeResult<Self> {
        if values.len() != arity {
            return Err(BridgeError::ArityMismatch {
                expected: arity,
                actual: values.len(),
            });
        }

        Ok(Self {
            values: values.into_iter(),
        })
    }

    /// Takes the next argument.
    #[inline]
    pub fn take<T: 'static>(&mut self) -> BridgeResult<T> {
        match self.values.next() {
            Some(value) => downcast::<T>(value),
            None => Err(BridgeError::invalid("a missing argument")),
        }
    }
}

/// Immutably borrows the receiver of a method call.
pub fn borrow_receiver<T: Reflect, R>(
    cell: &Rc<dyn ErasedCell>,
    method: impl FnOnce(&T) -> R,
) -> BridgeResult<R> {
    let content = cell.read()?;

    match content.as_any().downcast_ref::<T>() {
        Some(receiver) => Ok(method(receiver)),
        None => Err(mismatched_receiver(cell.as_ref())),
    }
}

/// Mutably borrows the receiver of a method call.
pub fn borrow_receiver_mut<T: Reflect, R>(
    cell: &Rc<dyn ErasedCell>,
    method: impl FnOnce(&mut T) -> R,
) -> BridgeResult<R> {
    let mut content = cell.write()?;

    match content.as_any_mut().downcast_mut::<T>() {
        Some(receiver) => Ok(method(receiver)),
        None => Err(mismatched_receiver(cell.as_ref())),
    }
}

/// Recovers the [Shared] receiver of an asynchronous method call.
///
/// Fails if the receiver is a record nested by value inside another cell.
pub fn shared_receiver<T: Reflect>(cell: &Rc<dyn ErasedCell>) -> BridgeResult<Shared<T>> {
    match Shared::<T>::from_erased(cell.clone()) {
        Some(shared) => Ok(shared),
        None => Err(BridgeError::invalid(format!(
            "a standalone \"{}\" receiver",
            TypeDescriptor::of::<T>(),
        ))),
    }
}

#[inline(always)]
fn mismatched_receiver(cell: &dyn ErasedCell) -> BridgeError {
    BridgeError::invalid(format!(
        "a receiver of type \"{}\"",
        cell.descriptor(),
    ))
}

/// A list of values passed to or returned from a callable.
///
/// Implemented for `()`, any [Reflect] type (a single value), and tuples of up
/// to six [Reflect] types.
pub trait Params: Sized + 'static {
    /// Returns the value types.
    fn types() -> Vec<TypeRef>;

    /// Builds the list out of type-erased values.
    fn from_values(values: Vec<AnyValue>) -> BridgeResult<Self>;

    /// Splits the list into separate values.
    fn into_values(self) -> Outputs;
}

impl Params for () {
    #[inline(always)]
    fn types() -> Vec<TypeRef> {
        Vec::new()
    }

    #[inline(always)]
    fn from_values(_values: Vec<AnyValue>) -> BridgeResult<Self> {
        Ok(())
    }

    #[inline(always)]
    fn into_values(self) -> Outputs {
        Vec::new()
    }
}

impl<T: Reflect> Params for T {
    #[inline(always)]
    fn types() -> Vec<TypeRef> {
        vec![TypeDescriptor::of::<T>]
    }

    #[inline(always)]
    fn from_values(values: Vec<AnyValue>) -> BridgeResult<Self> {
        Arguments::new(values, 1)?.take::<T>()
    }

    #[inline(always)]
    fn into_values(self) -> Outputs {
        vec![Box::new(self)]
    }
}

macro_rules! impl_params {
    ($count:expr; $($arg:ident: $ty:ident),+) => {
        impl<$($ty: Reflect,)+> Params for ($($ty,)+) {
            #[inline(always)]
            fn types() -> Vec<TypeRef> {
                vec![$(TypeDescriptor::of::<$ty>,)+]
            }

            fn from_values(values: Vec<AnyValue>) -> BridgeResult<Self> {
                let mut values = Arguments::new(values, $count)?;

                Ok(($(values.take::<$ty>()?,)+))
            }

            fn into_values(self) -> Outputs {
                let ($($arg,)+) = self;

                vec![$(Box::new($arg),)+]
            }
        }
    };
}

impl_params!(2; a1: A1, a2: A2);
impl_params!(3; a1: A1, a2: A2, a3: A3);
impl_params!(4; a1: A1, a2: A2, a3: A3, a4: A4);
impl_params!(5; a1: A1, a2: A2, a3: A3, a4: A4, a5: A5);
impl_params!(6; a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6);

/// The return value of a bridged Rust function.
///
/// Implemented for every [Params] list and for [Result] of a [Params] list:
/// an [Err] turns into a [RuntimeFailure](BridgeError::RuntimeFailure) carrying
/// the error's [Display] text.
pub trait Returns: 'static {
    /// Returns the result types.
    fn types() -> Vec<TypeRef>;

    /// Converts the returned value into the call outputs.
    fn into_outputs(self) -> BridgeResult<Outputs>;
}

impl<P: Params> Returns for P {
    #[inline(always)]
    fn types() -> Vec<TypeRef> {
        P::types()
    }

    #[inline(always)]
    fn into_outputs(self) -> BridgeResult<Outputs> {
        Ok(self.into_values())
    }
}

impl<P: Params, E: Display + 'static> Returns for Result<P, E> {
    #[inline(always)]
    fn types() -> Vec<TypeRef> {
        P::types()
    }

    #[inline(always)]
    fn into_outputs(self) -> BridgeResult<Outputs> {
        match self {
            Ok(ok) => Ok(ok.into_values()),
            Err(error) => Err(BridgeError::failure(error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn test_sync_function() {
        let concat = Func::new("concat", |a: String, b: u8| format!("{a}{b}"))
            .with_params(&["prefix", "number"]);

        assert_eq!(
            concat.signature().to_string(),
            "fn concat(prefix: String, number: u8) -> String",
        );
        assert!(!concat.signature().is_promise());

        let Invocation::Ready(Ok(outputs)) =
            concat.invoke(vec![Box::new(String::from("x")), Box::new(5u8)])
        else {
            panic!("synchronous call failed");
        };

        assert_eq!(outputs.len(), 1);
        assert_eq!(
            outputs[0].as_any().downcast_ref::<String>().map(String::as_str),
            Some("x5"),
        );
    }

    #[test]
    fn test_arity_mismatch() {
        let unit = Func::new("unit", || ());

        match unit.invoke(vec![Box::new(1u8)]) {
            Invocation::Ready(Err(BridgeError::ArityMismatch { expected, actual })) => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }

            _ => panic!("arity mismatch was not detected"),
        }
    }

    #[test]
    fn test_error_result() {
        let fail = Func::new("fail", || -> Result<u8, String> { Err(String::from("boom")) });

        assert_eq!(fail.signature().results.len(), 1);

        match fail.invoke(Vec::new()) {
            Invocation::Ready(Err(error)) => assert_eq!(error.to_string(), "boom"),
            _ => panic!("error result was not translated"),
        }
    }

    #[test]
    fn test_async_function() {
        let double = Func::future("double", |value: u32| async move { value * 2 });

        assert!(double.signature().is_async);
        assert!(double.signature().is_promise());

        let outputs = block_on(double.invoke(vec![Box::new(21u32)]).complete()).unwrap();

        assert_eq!(outputs[0].as_any().downcast_ref::<u32>(), Some(&42));
    }

    #[test]
    fn test_multiple_results() {
        let split = Func::new("split", |value: u32| (value / 10, value % 10));

        assert_eq!(split.signature().to_string(), "fn split(arg0: u32) -> (u32, u32)");

        let outputs = block_on(split.invoke(vec![Box::new(42u32)]).complete()).unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[1].as_any().downcast_ref::<u32>(), Some(&2));
    }
}
