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
    error::Error as StdError,
    fmt::{Debug, Display, Formatter},
    result::Result as StdResult,
};

use crate::runtime::TypeDescriptor;

/// A result of a bridge API call, which can either be a normal value or a
/// [BridgeError].
pub type BridgeResult<T> = StdResult<T, BridgeError>;

/// A helper trait for the [BridgeResult] object.
///
/// Exposure code usually runs once during program setup, where a failure to
/// build a mirror or a converter is fatal. The
/// [expect_blame](Self::expect_blame) function unwraps the value or panics with
/// the full error description.
pub trait BridgeResultExt {
    /// The [Ok] type of the underlying [Result].
    type OkType;

    /// If the result is [Ok], returns the underlying data; otherwise, panics
    /// with the `message` followed by the error description.
    fn expect_blame(self, message: &str) -> Self::OkType;
}

impl<T> BridgeResultExt for BridgeResult<T> {
    type OkType = T;

    #[inline(always)]
    #[track_caller]
    fn expect_blame(self, message: &str) -> Self::OkType {
        match self {
            Ok(ok) => ok,
            Err(error) => panic!("{message}\n{error}"),
        }
    }
}

/// Represents any error that may occur while marshalling values between the
/// compiled program and the host, or while invoking bridged functions.
///
/// Construction-time errors (descriptor, converter and mirror builds) are
/// returned to the code that triggered the exposure. Call-time errors never
/// reach Rust callers directly: the Function Bridge translates them into a
/// thrown host exception or a rejected host Promise.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    /// The value's shape cannot be represented on the other side (channels,
    /// complex numbers, raw pointers, unconstrained interfaces).
    UnsupportedKind {
        /// The user-facing name of the unsupported type.
        type_name: &'static str,

        /// A short description of the unsupported shape.
        shape: &'static str,
    },

    /// The bridge received an absent or uninitialized value in a position
    /// where a live value is required (e.g., invoking a nil callback).
    InvalidValue {
        /// What was expected at this position.
        context: String,
    },

    /// A bridged function was called with the wrong number of arguments.
    ArityMismatch {
        /// The number of declared parameters.
        expected: usize,

        /// The number of provided arguments.
        actual: usize,
    },

    /// A host value could not be converted into the requested compiled type
    /// (e.g., an unparseable numeric string).
    ConversionFailure {
        /// The user-facing name of the target type.
        type_name: &'static str,

        /// A printable representation of the offending host value.
        value: String,

        /// The reason of the failure.
        reason: String,
    },

    /// A mirror or a bridged function could not be constructed because one of
    /// its nested types cannot be converted.
    BuildFailure {
        /// The entity being built (e.g., `"mirror of Foo"`).
        entity: String,

        /// The underlying conversion error.
        cause: Box<BridgeError>,
    },

    /// An unrecoverable fault during a bridged call: a compiled function
    /// returned an error, panicked, or a host callback threw.
    RuntimeFailure {
        /// The failure text.
        message: String,
    },
}

impl Display for BridgeError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedKind { type_name, shape } => formatter.write_fmt(format_args!(
                "{shape} values cannot be bridged (type \"{type_name}\")."
            )),

            Self::InvalidValue { context } => {
                formatter.write_fmt(format_args!("Invalid value: {context}."))
            }

            Self::ArityMismatch { expected, actual } => formatter.write_fmt(format_args!(
                "Expected {expected} argument{}, got {actual}.",
                if *expected == 1 { "" } else { "s" },
            )),

            Self::ConversionFailure {
                type_name,
                value,
                reason,
            } => formatter.write_fmt(format_args!(
                "Cannot convert {value} into \"{type_name}\": {reason}."
            )),

            Self::BuildFailure { entity, cause } => {
                formatter.write_fmt(format_args!("Failed to build {entity}: {cause}"))
            }

            Self::RuntimeFailure { message } => formatter.write_str(message),
        }
    }
}

impl StdError for BridgeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::BuildFailure { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl BridgeError {
    #[inline(always)]
    pub(crate) fn unsupported(descriptor: &TypeDescriptor, shape: &'static str) -> Self {
        Self::UnsupportedKind {
            type_name: descriptor.name(),
            shape,
        }
    }

    #[inline(always)]
    pub(crate) fn conversion(
        descriptor: &TypeDescriptor,
        value: impl Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::ConversionFailure {
            type_name: descriptor.name(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    #[inline(always)]
    pub(crate) fn invalid(context: impl Into<String>) -> Self {
        Self::InvalidValue {
            context: context.into(),
        }
    }

    #[inline(always)]
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self::RuntimeFailure {
            message: message.into(),
        }
    }

    #[inline(always)]
    pub(crate) fn build(entity: impl Into<String>, cause: BridgeError) -> Self {
        Self::BuildFailure {
            entity: entity.into(),
            cause: Box::new(cause),
        }
    }

    /// Returns true if this error, or the error that caused a build failure,
    /// is an [UnsupportedKind](Self::UnsupportedKind) error.
    pub fn is_unsupported(&self) -> bool {
        match self {
            Self::UnsupportedKind { .. } => true,
            Self::BuildFailure { cause, .. } => cause.is_unsupported(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_failure_chain() {
        let error = BridgeError::build(
            "mirror of Foo",
            BridgeError::UnsupportedKind {
                type_name: "Sender<u8>",
                shape: "Channel",
            },
        );

        assert!(error.is_unsupported());
        assert!(error.source().is_some());
        assert_eq!(
            error.to_string(),
            "Failed to build mirror of Foo: Channel values cannot be bridged (type \"Sender<u8>\").",
        );
    }

    #[test]
    fn test_arity_message() {
        let error = BridgeError::ArityMismatch {
            expected: 1,
            actual: 3,
        };

        assert_eq!(error.to_string(), "Expected 1 argument, got 3.");
    }

    #[test]
    #[should_panic(expected = "Setup failed\nExpected 2 arguments, got 0.")]
    fn test_expect_blame() {
        let result: BridgeResult<()> = Err(BridgeError::ArityMismatch {
            expected: 2,
            actual: 0,
        });

        result.expect_blame("Setup failed");
    }
}
