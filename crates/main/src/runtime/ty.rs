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
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    sync::RwLock,
};

use ahash::{AHashMap, AHashSet};
use lady_deirdre::sync::Lazy;

use crate::runtime::{BridgeError, BridgeResult, HostCallable, MethodMeta, Reflect};

/// A type-erased compiled value produced by the inbound conversion.
///
/// The box always holds a value of the exact Rust type described by the
/// [TypeDescriptor] that produced it.
pub type AnyValue = Box<dyn Any>;

/// A lazy reference to the descriptor of a nested type.
///
/// Descriptors of composite types refer to their components through function
/// pointers rather than direct references, so building a descriptor of a
/// self-referential type never recurses into itself.
pub type TypeRef = fn() -> &'static TypeDescriptor;

/// Immutable metadata describing the shape of a compiled value.
///
/// The bridge builds exactly one descriptor per distinct Rust type. You obtain
/// a `'static` reference to it through the [TypeDescriptor::of] function or
/// through the [ReflectBase::descriptor](crate::runtime::ReflectBase::descriptor)
/// function of a value.
///
/// The [Display] implementation prints the user-facing name of the type
/// (e.g., `"usize"` or `"Vec<String>"`).
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
    doc: Option<&'static str>,
    kind: TypeKind,
    zero: Option<fn() -> AnyValue>,
}

impl PartialEq for TypeDescriptor {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id.eq(&other.id)
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl Debug for TypeDescriptor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Display for TypeDescriptor {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name)
    }
}

impl TypeDescriptor {
    /// Returns the descriptor of the Rust type `T`, building and registering it
    /// on the first request.
    pub fn of<T: Reflect>() -> &'static Self {
        static REGISTRY: Lazy<RwLock<AHashMap<TypeId, &'static TypeDescriptor>>> =
            Lazy::new(|| RwLock::new(AHashMap::new()));

        let id = TypeId::of::<T>();

        {
            let registry = REGISTRY
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            if let Some(descriptor) = registry.get(&id) {
                return descriptor;
            }
        }

        let descriptor = T::describe();

        let mut registry = REGISTRY
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        registry
            .entry(id)
            .or_insert_with(|| Box::leak(Box::new(descriptor)))
    }

    /// Creates a new descriptor of the Rust type `T` with the specified `kind`.
    ///
    /// The name of the descriptor is the Rust type name with all module paths
    /// stripped. This function is intended to be called from the
    /// [Reflect::describe] implementations only.
    pub fn new<T: 'static>(kind: TypeKind) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: Box::leak(short_name(type_name::<T>()).into_boxed_str()),
            doc: None,
            kind,
            zero: None,
        }
    }

    /// Overrides the user-facing name of the type.
    #[inline(always)]
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Sets the RustDoc documentation of the type.
    #[inline(always)]
    pub fn with_doc(mut self, doc: Option<&'static str>) -> Self {
        self.doc = doc;
        self
    }

    /// Sets the constructor of the zero value of the type. The inbound
    /// converter uses it whenever the host supplies an absent value.
    #[inline(always)]
    pub fn with_zero(mut self, zero: fn() -> AnyValue) -> Self {
        self.zero = Some(zero);
        self
    }

    /// Returns the [TypeId] of the original Rust type.
    #[inline(always)]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the user-facing name of the type.
    #[inline(always)]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the RustDoc documentation of the type, if any.
    #[inline(always)]
    pub fn doc(&self) -> Option<&'static str> {
        self.doc
    }

    /// Returns the shape of the type.
    #[inline(always)]
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Creates the zero value of this type, or returns None if the type does
    /// not have one (unsupported types).
    #[inline(always)]
    pub fn zero(&self) -> Option<AnyValue> {
        self.zero.map(|zero| zero())
    }

    /// Returns the record metadata if this type is an exported struct.
    #[inline(always)]
    pub fn record(&self) -> Option<&RecordMeta> {
        match &self.kind {
            TypeKind::Record(meta) => Some(meta),
            _ => None,
        }
    }

    /// Returns true if this type is a function (callback) type.
    #[inline(always)]
    pub fn is_function(&self) -> bool {
        matches!(&self.kind, TypeKind::Function(..))
    }

    /// Returns true if the host may observe an absent value of this type.
    ///
    /// This is the case for optional values and callables, and for pointers
    /// and shared cells around them.
    pub fn is_nilable(&self) -> bool {
        match &self.kind {
            TypeKind::Optional { .. } | TypeKind::Function(..) => true,
            TypeKind::Pointer { inner, .. } | TypeKind::Shared { inner, .. } => inner().is_nilable(),
            _ => false,
        }
    }

    /// Looks for a nested type that cannot be bridged.
    ///
    /// Walks through the elements, keys, values, fields, parameters and results
    /// reachable from this type and returns the first descriptor of the
    /// [Unsupported](TypeKind::Unsupported) kind.
    pub fn find_unsupported(&'static self) -> Option<&'static TypeDescriptor> {
        let mut visited = AHashSet::new();

        self.walk_unsupported(&mut visited)
    }

    fn walk_unsupported(
        &'static self,
        visited: &mut AHashSet<TypeId>,
    ) -> Option<&'static TypeDescriptor> {
        if !visited.insert(self.id) {
            return None;
        }

        match &self.kind {
            TypeKind::Unsupported(..) => Some(self),

            TypeKind::Sequence { element, .. } | TypeKind::Array { element, .. } => {
                element().walk_unsupported(visited)
            }

            TypeKind::Mapping { key, value, .. } => {
                if let Some(found) = key().walk_unsupported(visited) {
                    return Some(found);
                }

                value().walk_unsupported(visited)
            }

            TypeKind::Optional { inner, .. }
            | TypeKind::Pointer { inner, .. }
            | TypeKind::Shared { inner, .. } => inner().walk_unsupported(visited),

            TypeKind::Record(meta) => meta
                .fields
                .iter()
                .find_map(|field| (field.ty)().walk_unsupported(visited)),

            TypeKind::Function(meta) => (meta.params)()
                .into_iter()
                .chain((meta.results)())
                .find_map(|ty| ty().walk_unsupported(visited)),

            _ => None,
        }
    }
}

/// The shape of a compiled value.
///
/// Every variant that has nested components refers to them lazily through
/// [TypeRef] pointers and carries the functions that assemble a compiled value
/// out of the inbound-converted components.
#[non_exhaustive]
pub enum TypeKind {
    /// The [bool] type.
    Bool,

    /// Any Rust integer type.
    Int {
        /// True for signed integers.
        signed: bool,

        /// The number of bits.
        bits: u8,

        /// Narrows a wide integer into the exact Rust type, or returns None if
        /// the number does not fit.
        make: fn(i128) -> Option<AnyValue>,
    },

    /// The [f32] or [f64] type.
    Float {
        /// The number of bits.
        bits: u8,

        /// Converts a host number into the exact Rust type.
        make: fn(f64) -> AnyValue,
    },

    /// The [String] type.
    String,

    /// A byte buffer (`Vec<u8>`) transferred in bulk.
    Bytes,

    /// A variable-length sequence of elements.
    Sequence {
        /// The element type.
        element: TypeRef,

        /// Builds the sequence out of converted elements.
        assemble: fn(Vec<AnyValue>) -> BridgeResult<AnyValue>,
    },

    /// A fixed-length array.
    Array {
        /// The element type.
        element: TypeRef,

        /// The array length.
        len: usize,

        /// Builds the array out of exactly `len` converted elements.
        assemble: fn(Vec<AnyValue>) -> BridgeResult<AnyValue>,
    },

    /// A key-value mapping.
    Mapping {
        /// The key type.
        key: TypeRef,

        /// The value type.
        value: TypeRef,

        /// Builds the mapping out of converted entries.
        assemble: fn(Vec<(AnyValue, AnyValue)>) -> BridgeResult<AnyValue>,
    },

    /// A value that may be absent (`Option<T>`).
    Optional {
        /// The type of the present value.
        inner: TypeRef,

        /// Wraps the converted inner value.
        wrap: fn(Option<AnyValue>) -> BridgeResult<AnyValue>,
    },

    /// An owning pointer (`Box<T>`).
    Pointer {
        /// The pointee type.
        inner: TypeRef,

        /// Wraps the converted pointee.
        wrap: fn(AnyValue) -> BridgeResult<AnyValue>,
    },

    /// A shared addressable cell ([Shared](crate::runtime::Shared)).
    Shared {
        /// The type of the cell's content.
        inner: TypeRef,

        /// Allocates a new cell around the converted content.
        wrap: fn(AnyValue) -> BridgeResult<AnyValue>,

        /// Recovers the cell of this type from a type-erased cell, or returns
        /// None if the erased cell has a different type.
        adopt: fn(std::rc::Rc<dyn crate::runtime::ErasedCell>) -> Option<AnyValue>,
    },

    /// An exported struct.
    Record(RecordMeta),

    /// A callable value ([Callback](crate::runtime::Callback)).
    Function(CallbackMeta),

    /// A value with error semantics ([Failure](crate::runtime::Failure)).
    Error,

    /// A value that has no host counterpart.
    Unsupported(Unsupported),
}

impl Debug for TypeKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => formatter.write_str("Bool"),
            Self::Int { signed, bits, .. } => formatter
                .debug_struct("Int")
                .field("signed", signed)
                .field("bits", bits)
                .finish(),
            Self::Float { bits, .. } => formatter.debug_struct("Float").field("bits", bits).finish(),
            Self::String => formatter.write_str("String"),
            Self::Bytes => formatter.write_str("Bytes"),
            Self::Sequence { .. } => formatter.write_str("Sequence"),
            Self::Array { len, .. } => formatter.debug_struct("Array").field("len", len).finish(),
            Self::Mapping { .. } => formatter.write_str("Mapping"),
            Self::Optional { .. } => formatter.write_str("Optional"),
            Self::Pointer { .. } => formatter.write_str("Pointer"),
            Self::Shared { .. } => formatter.write_str("Shared"),
            Self::Record(meta) => formatter
                .debug_struct("Record")
                .field("fields", &meta.fields.len())
                .field("methods", &meta.methods.len())
                .finish(),
            Self::Function(..) => formatter.write_str("Function"),
            Self::Error => formatter.write_str("Error"),
            Self::Unsupported(unsupported) => formatter
                .debug_tuple("Unsupported")
                .field(unsupported)
                .finish(),
        }
    }
}

/// A category of compiled values that cannot cross the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Unsupported {
    /// Channel endpoints (`Sender<T>`, `Receiver<T>`).
    Channel,

    /// Complex numbers.
    Complex,

    /// Raw pointers (`*const T`, `*mut T`).
    RawPointer,

    /// Type-erased values (`Box<dyn Any>`).
    Interface,
}

impl Unsupported {
    /// Returns a short human-readable description of this category.
    #[inline(always)]
    pub fn shape(self) -> &'static str {
        match self {
            Self::Channel => "Channel",
            Self::Complex => "Complex number",
            Self::RawPointer => "Raw pointer",
            Self::Interface => "Unconstrained interface",
        }
    }
}

/// The metadata of an exported struct.
pub struct RecordMeta {
    /// The exported fields in declaration order.
    pub fields: Vec<FieldMeta>,

    /// The exported methods in declaration order.
    pub methods: Vec<MethodMeta>,
}

impl RecordMeta {
    /// Looks up an exported field by its host-visible name.
    #[inline]
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Looks up an exported method by its host-visible name.
    #[inline]
    pub fn method(&self, name: &str) -> Option<&MethodMeta> {
        self.methods.iter().find(|method| method.signature.name == name)
    }
}

/// The metadata of an exported struct field.
///
/// The accessor functions receive the struct value as a type-erased
/// reference. They return None (or fail) if the value has a different type.
pub struct FieldMeta {
    /// The host-visible name of the field.
    pub name: &'static str,

    /// The field type.
    pub ty: TypeRef,

    /// If true, an absent sequence or mapping in this field is exposed as an
    /// empty host array or object instead of `undefined`.
    pub not_nil: bool,

    /// Borrows the field value.
    pub get: fn(&dyn Any) -> Option<&dyn Reflect>,

    /// Mutably borrows the field value.
    pub get_mut: fn(&mut dyn Any) -> Option<&mut dyn Reflect>,

    /// Replaces the field value with an inbound-converted value.
    pub set: fn(&mut dyn Any, AnyValue) -> BridgeResult<()>,
}

/// Downcasts a type-erased record for a field update.
///
/// The field setters generated by the [export](crate::export) macro use this
/// function.
#[inline]
pub fn record_mut<T: 'static>(record: &mut dyn Any) -> BridgeResult<&mut T> {
    match record.downcast_mut::<T>() {
        Some(record) => Ok(record),
        None => Err(BridgeError::invalid(format!(
            "a record of type \"{}\"",
            short_name(type_name::<T>()),
        ))),
    }
}

/// The metadata of a callable type.
pub struct CallbackMeta {
    /// The parameter types.
    pub params: fn() -> Vec<TypeRef>,

    /// The result types.
    pub results: fn() -> Vec<TypeRef>,

    /// Wraps a host function into a compiled callable of this type.
    pub from_host: fn(HostCallable) -> AnyValue,
}

/// Strips module paths from a Rust type name:
/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
fn short_name(full: &str) -> String {
    let mut result = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut characters = full.chars().peekable();

    while let Some(character) = characters.next() {
        match character {
            ':' if characters.peek() == Some(&':') => {
                let _ = characters.next();
                result.truncate(segment_start);
            }

            character if character.is_alphanumeric() || character == '_' => {
                result.push(character)
            }

            character => {
                result.push(character);
                segment_start = result.len();
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("u8"), "u8");
        assert_eq!(
            short_name("alloc::vec::Vec<alloc::string::String>"),
            "Vec<String>"
        );
        assert_eq!(
            short_name("std::collections::hash::map::HashMap<u32, core::option::Option<f64>>"),
            "HashMap<u32, Option<f64>>",
        );
    }
}
