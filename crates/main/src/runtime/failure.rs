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
    error::Error as StdError,
    fmt::{Display, Formatter},
    sync::mpsc::{Receiver, Sender},
};

use crate::runtime::{BridgeError, Reflect, TypeDescriptor, TypeKind, Unsupported, View};

/// A value with error semantics.
///
/// The host receives a Failure as a native `Error` object with the same
/// message. Use `Option<Failure>` for a value that may carry no error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Failure {
    message: String,
}

impl Display for Failure {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl StdError for Failure {}

impl From<BridgeError> for Failure {
    #[inline(always)]
    fn from(error: BridgeError) -> Self {
        Self::new(error.to_string())
    }
}

impl From<String> for Failure {
    #[inline(always)]
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for Failure {
    #[inline(always)]
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl Failure {
    /// Creates a failure with the given message.
    #[inline(always)]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    #[inline(always)]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Reflect for Failure {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Error)
            .with_name("Failure")
            .with_zero(|| Box::new(Failure::default()))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Error(&self.message)
    }
}

/// A complex number.
///
/// The host has no complex number type, so these values never cross the
/// bridge. Any attempt fails with
/// [UnsupportedKind](BridgeError::UnsupportedKind).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Complex<F> {
    /// The real part.
    pub re: F,

    /// The imaginary part.
    pub im: F,
}

macro_rules! reflect_unsupported {
    ($(impl<$($param:ident),*> $ty:ty => $kind:ident;)*) => {$(
        impl<$($param: 'static),*> Reflect for $ty {
            #[inline(always)]
            fn describe() -> TypeDescriptor {
                TypeDescriptor::new::<Self>(TypeKind::Unsupported(Unsupported::$kind))
            }

            #[inline(always)]
            fn view(&self) -> View<'_> {
                View::Unsupported(Unsupported::$kind)
            }
        }
    )*};
}

reflect_unsupported! {
    impl<T> Sender<T> => Channel;
    impl<T> Receiver<T> => Channel;
    impl<F> Complex<F> => Complex;
    impl<T> *const T => RawPointer;
    impl<T> *mut T => RawPointer;
    impl<> Box<dyn Any> => Interface;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_descriptors() {
        for descriptor in [
            TypeDescriptor::of::<Sender<u8>>(),
            TypeDescriptor::of::<Complex<f64>>(),
            TypeDescriptor::of::<*const u8>(),
            TypeDescriptor::of::<Box<dyn Any>>(),
        ] {
            assert!(matches!(descriptor.kind(), TypeKind::Unsupported(..)));
            assert!(descriptor.zero().is_none());
            assert!(std::ptr::eq(
                descriptor.find_unsupported().unwrap(),
                descriptor
            ));
        }

        let nested = TypeDescriptor::of::<Vec<Option<Receiver<String>>>>();

        assert_eq!(nested.find_unsupported().unwrap().name(), "Receiver<String>");
        assert!(TypeDescriptor::of::<Vec<Option<String>>>()
            .find_unsupported()
            .is_none());
    }
}
