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
    any::{type_name, Any, TypeId},
    collections::{BTreeMap, HashMap, VecDeque},
    hash::Hash,
    mem::size_of,
    rc::Rc,
};

use crate::{
    host::HostObject,
    runtime::{
        AnyValue,
        BridgeError,
        BridgeResult,
        ErasedCell,
        Func,
        TypeDescriptor,
        TypeKind,
        Unsupported,
    },
};

/// A Rust type whose values can cross the bridge.
///
/// The trait describes the shape of the type ([describe](Self::describe)) and
/// exposes a borrowed structural view of a value ([view](Self::view)) that the
/// outbound converter walks.
///
/// The crate implements this trait for the primitive Rust types, [String],
/// standard collections, [Option], [Box], [Shared](crate::runtime::Shared),
/// [Callback](crate::runtime::Callback) and
/// [Failure](crate::runtime::Failure). For your own structs, use the
/// [export](crate::export) attribute macro.
pub trait Reflect: ReflectBase + 'static {
    /// Builds the descriptor of this type.
    ///
    /// The bridge calls this function at most once per type. Use
    /// [TypeDescriptor::of] to obtain the registered descriptor instead.
    fn describe() -> TypeDescriptor
    where
        Self: Sized;

    /// Returns a structural view of this value.
    fn view(&self) -> View<'_>;
}

/// An object-safe companion of the [Reflect] trait implemented automatically
/// for every reflectable type.
pub trait ReflectBase: 'static {
    /// Returns this value as a type-erased reference.
    fn as_any(&self) -> &dyn Any;

    /// Returns this value as a type-erased mutable reference.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Converts the boxed value into a type-erased box.
    fn into_any(self: Box<Self>) -> AnyValue;

    /// Returns the descriptor of this value's type.
    fn descriptor(&self) -> &'static TypeDescriptor;
}

impl<T: Reflect> ReflectBase for T {
    #[inline(always)]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline(always)]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    #[inline(always)]
    fn into_any(self: Box<Self>) -> AnyValue {
        self
    }

    #[inline(always)]
    fn descriptor(&self) -> &'static TypeDescriptor {
        TypeDescriptor::of::<T>()
    }
}

/// A borrowed structural view of a compiled value.
pub enum View<'a> {
    /// A boolean.
    Bool(bool),

    /// A signed integer.
    Int(i64),

    /// An unsigned integer.
    Uint(u64),

    /// A floating-point number.
    Float(f64),

    /// A string.
    Str(&'a str),

    /// A byte buffer.
    Bytes(&'a [u8]),

    /// A sequence or a fixed array of non-byte elements.
    Sequence(&'a dyn SequenceView),

    /// A key-value mapping.
    Mapping(&'a dyn MappingView),

    /// A value that may be absent.
    Optional(Option<&'a dyn Reflect>),

    /// An owning pointer.
    Pointer(&'a dyn Reflect),

    /// A shared addressable cell.
    Shared(Rc<dyn ErasedCell>),

    /// An exported struct held by value.
    Record,

    /// A callable value.
    Function(FunctionValue<'a>),

    /// A value with error semantics carrying the failure text.
    Error(&'a str),

    /// A value that cannot cross the bridge.
    Unsupported(Unsupported),
}

/// The content of a callable value.
pub enum FunctionValue<'a> {
    /// An uninitialized callable.
    Nil,

    /// A function of the host.
    Host(&'a HostObject),

    /// A compiled function.
    Compiled(&'a Func),
}

/// A random-access view of a sequence.
pub trait SequenceView {
    /// Returns the number of elements.
    fn len(&self) -> usize;

    /// Returns true if the sequence is empty.
    #[inline(always)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows an element by its index.
    fn element(&self, index: usize) -> Option<&dyn Reflect>;
}

/// An entries view of a mapping.
pub trait MappingView {
    /// Returns all key-value pairs of the mapping.
    fn entries(&self) -> Vec<(&dyn Reflect, &dyn Reflect)>;
}

/// Unwraps a type-erased value into the concrete type `T`.
///
/// Fails with [BridgeError::InvalidValue] if the value has a different type.
#[inline]
pub fn downcast<T: 'static>(value: AnyValue) -> BridgeResult<T> {
    match value.downcast::<T>() {
        Ok(value) => Ok(*value),
        Err(_) => Err(BridgeError::invalid(format!(
            "expected a value of type \"{}\"",
            type_name::<T>(),
        ))),
    }
}

impl Reflect for bool {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Bool)
            .with_name("bool")
            .with_zero(|| Box::new(false))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Bool(*self)
    }
}

macro_rules! reflect_int {
    ($signed:expr, $variant:ident, $wide:ty, [$($ty:ty),*]) => {$(
        impl Reflect for $ty {
            fn describe() -> TypeDescriptor {
                TypeDescriptor::new::<Self>(TypeKind::Int {
                    signed: $signed,
                    bits: (size_of::<Self>() * 8) as u8,
                    make: |value| {
                        <$ty>::try_from(value)
                            .ok()
                            .map(|value| Box::new(value) as AnyValue)
                    },
                })
                .with_name(stringify!($ty))
                .with_zero(|| Box::new(<$ty>::default()))
            }

            #[inline(always)]
            fn view(&self) -> View<'_> {
                View::$variant(*self as $wide)
            }
        }
    )*};
}

reflect_int!(true, Int, i64, [i8, i16, i32, i64, isize]);
reflect_int!(false, Uint, u64, [u8, u16, u32, u64, usize]);

impl Reflect for f32 {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Float {
            bits: 32,
            make: |value| Box::new(value as f32),
        })
        .with_name("f32")
        .with_zero(|| Box::new(0.0f32))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Float(*self as f64)
    }
}

impl Reflect for f64 {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Float {
            bits: 64,
            make: |value| Box::new(value),
        })
        .with_name("f64")
        .with_zero(|| Box::new(0.0f64))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Float(*self)
    }
}

impl Reflect for String {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::String)
            .with_name("String")
            .with_zero(|| Box::new(String::new()))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Str(self.as_str())
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn describe() -> TypeDescriptor {
        // Byte vectors are transferred as a whole buffer.
        if TypeId::of::<T>() == TypeId::of::<u8>() {
            return TypeDescriptor::new::<Self>(TypeKind::Bytes)
                .with_name("Vec<u8>")
                .with_zero(|| Box::new(Vec::<T>::new()));
        }

        TypeDescriptor::new::<Self>(TypeKind::Sequence {
            element: TypeDescriptor::of::<T>,
            assemble: |elements| {
                let elements = elements
                    .into_iter()
                    .map(downcast::<T>)
                    .collect::<BridgeResult<Vec<T>>>()?;

                Ok(Box::new(elements))
            },
        })
        .with_zero(|| Box::new(Vec::<T>::new()))
    }

    fn view(&self) -> View<'_> {
        if let Some(bytes) = self.as_any().downcast_ref::<Vec<u8>>() {
            return View::Bytes(bytes.as_slice());
        }

        View::Sequence(self)
    }
}

impl<T: Reflect> SequenceView for Vec<T> {
    #[inline(always)]
    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline(always)]
    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        self.get(index).map(|element| element as &dyn Reflect)
    }
}

impl<T: Reflect> Reflect for VecDeque<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Sequence {
            element: TypeDescriptor::of::<T>,
            assemble: |elements| {
                let elements = elements
                    .into_iter()
                    .map(downcast::<T>)
                    .collect::<BridgeResult<VecDeque<T>>>()?;

                Ok(Box::new(elements))
            },
        })
        .with_zero(|| Box::new(VecDeque::<T>::new()))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Sequence(self)
    }
}

impl<T: Reflect> SequenceView for VecDeque<T> {
    #[inline(always)]
    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    #[inline(always)]
    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        self.get(index).map(|element| element as &dyn Reflect)
    }
}

impl<T: Reflect + Default, const N: usize> Reflect for [T; N] {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Array {
            element: TypeDescriptor::of::<T>,
            len: N,
            assemble: |elements| {
                let actual = elements.len();

                let elements = elements
                    .into_iter()
                    .map(downcast::<T>)
                    .collect::<BridgeResult<Vec<T>>>()?;

                match <[T; N]>::try_from(elements) {
                    Ok(array) => Ok(Box::new(array)),
                    Err(_) => Err(BridgeError::ArityMismatch {
                        expected: N,
                        actual,
                    }),
                }
            },
        })
        .with_zero(|| Box::new(std::array::from_fn::<T, N, _>(|_| T::default())))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Sequence(self)
    }
}

impl<T: Reflect, const N: usize> SequenceView for [T; N] {
    #[inline(always)]
    fn len(&self) -> usize {
        N
    }

    #[inline(always)]
    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        self.get(index).map(|element| element as &dyn Reflect)
    }
}

impl<K: Reflect + Eq + Hash, V: Reflect> Reflect for HashMap<K, V> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Mapping {
            key: TypeDescriptor::of::<K>,
            value: TypeDescriptor::of::<V>,
            assemble: |entries| {
                let mut map = HashMap::<K, V>::with_capacity(entries.len());

                for (key, value) in entries {
                    let _ = map.insert(downcast::<K>(key)?, downcast::<V>(value)?);
                }

                Ok(Box::new(map))
            },
        })
        .with_zero(|| Box::new(HashMap::<K, V>::new()))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Mapping(self)
    }
}

impl<K: Reflect + Eq + Hash, V: Reflect> MappingView for HashMap<K, V> {
    fn entries(&self) -> Vec<(&dyn Reflect, &dyn Reflect)> {
        self.iter()
            .map(|(key, value)| (key as &dyn Reflect, value as &dyn Reflect))
            .collect()
    }
}

impl<K: Reflect + Ord, V: Reflect> Reflect for BTreeMap<K, V> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Mapping {
            key: TypeDescriptor::of::<K>,
            value: TypeDescriptor::of::<V>,
            assemble: |entries| {
                let mut map = BTreeMap::<K, V>::new();

                for (key, value) in entries {
                    let _ = map.insert(downcast::<K>(key)?, downcast::<V>(value)?);
                }

                Ok(Box::new(map))
            },
        })
        .with_zero(|| Box::new(BTreeMap::<K, V>::new()))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Mapping(self)
    }
}

impl<K: Reflect + Ord, V: Reflect> MappingView for BTreeMap<K, V> {
    fn entries(&self) -> Vec<(&dyn Reflect, &dyn Reflect)> {
        self.iter()
            .map(|(key, value)| (key as &dyn Reflect, value as &dyn Reflect))
            .collect()
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Optional {
            inner: TypeDescriptor::of::<T>,
            wrap: |value| match value {
                None => Ok(Box::new(None::<T>)),
                Some(value) => Ok(Box::new(Some(downcast::<T>(value)?))),
            },
        })
        .with_zero(|| Box::new(None::<T>))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Optional(self.as_ref().map(|value| value as &dyn Reflect))
    }
}

impl<T: Reflect + Default> Reflect for Box<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Pointer {
            inner: TypeDescriptor::of::<T>,
            wrap: |value| Ok(Box::new(Box::new(downcast::<T>(value)?))),
        })
        .with_zero(|| Box::new(Box::<T>::default()))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Pointer(self.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_vector_kind() {
        assert!(matches!(
            TypeDescriptor::of::<Vec<u8>>().kind(),
            TypeKind::Bytes
        ));
        assert!(matches!(
            TypeDescriptor::of::<Vec<u16>>().kind(),
            TypeKind::Sequence { .. }
        ));

        let bytes = vec![1u8, 2, 3];

        match bytes.view() {
            View::Bytes(slice) => assert_eq!(slice, &[1, 2, 3]),
            _ => panic!("byte vector is not viewed as bytes"),
        }
    }

    #[test]
    fn test_descriptor_identity() {
        let first = TypeDescriptor::of::<Option<Vec<String>>>();
        let second = TypeDescriptor::of::<Option<Vec<String>>>();

        assert!(std::ptr::eq(first, second));
        assert_eq!(first.name(), "Option<Vec<String>>");
        assert_eq!(TypeDescriptor::of::<usize>().name(), "usize");
    }

    #[test]
    fn test_integer_narrowing() {
        let TypeKind::Int { make, signed, bits } = TypeDescriptor::of::<u8>().kind() else {
            panic!("u8 is not an integer");
        };

        assert!(!signed);
        assert_eq!(*bits, 8);
        assert!(make(255).is_some());
        assert!(make(256).is_none());
        assert!(make(-1).is_none());
    }

    #[test]
    fn test_array_assemble() {
        let TypeKind::Array { assemble, len, .. } = TypeDescriptor::of::<[u16; 2]>().kind() else {
            panic!("[u16; 2] is not an array");
        };

        assert_eq!(*len, 2);

        let array = assemble(vec![Box::new(3u16), Box::new(4u16)]).unwrap();
        assert_eq!(downcast::<[u16; 2]>(array).unwrap(), [3, 4]);

        assert!(assemble(vec![Box::new(3u16)]).is_err());
    }
}
