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

use std::fmt::{Debug, Display, Formatter};

use compact_str::{format_compact, CompactString};

use crate::host::{HostObject, ObjectKind};

/// The result of a host operation. The [Err] variant holds the thrown value.
pub type HostResult<T = HostValue> = Result<T, HostValue>;

/// A value of the host realm.
///
/// Primitive values are stored inline. Objects are reference-counted, and
/// cloning a HostValue that holds an object clones the reference, not the
/// object.
#[derive(Clone, Default)]
pub enum HostValue {
    /// The `undefined` value.
    #[default]
    Undefined,

    /// The `null` value.
    Null,

    /// A boolean.
    Bool(bool),

    /// A number (IEEE-754 double).
    Number(f64),

    /// A string.
    String(CompactString),

    /// An object (including arrays, buffers, functions, promises and errors).
    Object(HostObject),
}

impl Debug for HostValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(string) => Debug::fmt(string.as_str(), formatter),
            Self::Object(object) => Debug::fmt(object, formatter),
            _ => Display::fmt(self, formatter),
        }
    }
}

impl Display for HostValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undefined => formatter.write_str("undefined"),
            Self::Null => formatter.write_str("null"),
            Self::Bool(value) => Display::fmt(value, formatter),
            Self::Number(value) => formatter.write_str(&format_number(*value)),
            Self::String(value) => formatter.write_str(value),
            Self::Object(object) => Display::fmt(object, formatter),
        }
    }
}

impl PartialEq for HostValue {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<bool> for HostValue {
    #[inline(always)]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for HostValue {
    #[inline(always)]
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for HostValue {
    #[inline(always)]
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for HostValue {
    #[inline(always)]
    fn from(value: &str) -> Self {
        Self::String(CompactString::from(value))
    }
}

impl From<String> for HostValue {
    #[inline(always)]
    fn from(value: String) -> Self {
        Self::String(CompactString::from(value))
    }
}

impl From<CompactString> for HostValue {
    #[inline(always)]
    fn from(value: CompactString) -> Self {
        Self::String(value)
    }
}

impl From<HostObject> for HostValue {
    #[inline(always)]
    fn from(value: HostObject) -> Self {
        Self::Object(value)
    }
}

impl HostValue {
    /// Returns true for `undefined`.
    #[inline(always)]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns true for `undefined` and `null`.
    #[inline(always)]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Returns true if the value is a function object.
    #[inline(always)]
    pub fn is_callable(&self) -> bool {
        match self {
            Self::Object(object) => object.kind() == ObjectKind::Function,
            _ => false,
        }
    }

    /// Returns the object if this value is an object.
    #[inline(always)]
    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the number if this value is a number.
    #[inline(always)]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string if this value is a string.
    #[inline(always)]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the boolean if this value is a boolean.
    #[inline(always)]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the name of the value's type as reported by the host's
    /// `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(..) => "boolean",
            Self::Number(..) => "number",
            Self::String(..) => "string",
            Self::Object(object) if object.kind() == ObjectKind::Function => "function",
            Self::Object(..) => "object",
        }
    }

    /// Compares two values the way the host's `===` operator does. Objects
    /// are equal only if they are the same object.
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Null, Self::Null) => true,
            (Self::Bool(this), Self::Bool(other)) => this == other,
            (Self::Number(this), Self::Number(other)) => this == other,
            (Self::String(this), Self::String(other)) => this == other,
            (Self::Object(this), Self::Object(other)) => this.ptr_eq(other),
            _ => false,
        }
    }

    /// Converts the value into a property key the way the host stringifies
    /// primitive values.
    #[inline(always)]
    pub fn to_property_key(&self) -> CompactString {
        match self {
            Self::String(value) => value.clone(),
            _ => format_compact!("{self}"),
        }
    }
}

/// Formats a number the way the host prints it: integral values have no
/// fractional part, and the negative zero prints as `0`.
pub fn format_number(value: f64) -> CompactString {
    if value.is_nan() {
        return CompactString::from("NaN");
    }

    if value.is_infinite() {
        return match value.is_sign_positive() {
            true => CompactString::from("Infinity"),
            false => CompactString::from("-Infinity"),
        };
    }

    if value == 0.0 {
        return CompactString::from("0");
    }

    format_compact!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_format() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.25), "1.25");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(HostValue::from(42).to_property_key(), "42");
    }

    #[test]
    fn test_strict_equality() {
        assert_eq!(HostValue::from("a"), HostValue::from("a"));
        assert_ne!(HostValue::Undefined, HostValue::Null);
        assert_ne!(HostValue::Number(f64::NAN), HostValue::Number(f64::NAN));
        assert!(HostValue::Null.is_nullish());
        assert_eq!(HostValue::Null.type_of(), "object");
    }
}
