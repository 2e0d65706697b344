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
    cell::RefCell,
    collections::VecDeque,
    fmt::{Debug, Display, Formatter},
    mem::take,
    rc::{Rc, Weak},
};

use compact_str::CompactString;

use crate::host::{HostResult, HostValue, PromiseSlot, PromiseState, Realm};

// The largest number of holes a single array write may create.
const MAX_ELEMENT_GAP: usize = 1 << 16;

/// A native function of the host realm.
///
/// The function receives the realm, the `this` value and the arguments, and
/// either returns a value or throws one.
pub type NativeFunction = Rc<dyn Fn(&Realm, &HostValue, &[HostValue]) -> HostResult>;

pub(crate) type FinalizationQueue = RefCell<VecDeque<Box<dyn FnOnce()>>>;

/// The class of a host object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// An ordinary object.
    Plain,

    /// An array.
    Array,

    /// A byte buffer (`Uint8Array`).
    Buffer,

    /// A function.
    Function,

    /// A promise.
    Promise,

    /// An error.
    Error,
}

/// A property of a host object.
#[derive(Clone, Debug)]
pub enum Property {
    /// A plain value.
    Data(HostValue),

    /// A pair of accessor functions. Reading the property calls the getter,
    /// writing the property calls the setter.
    Accessor {
        /// The getter function, if any.
        get: Option<HostValue>,

        /// The setter function, if any.
        set: Option<HostValue>,
    },
}

/// A reference to a host object.
///
/// Objects are reference-counted. When the last reference is dropped, the
/// object's registered finalizers are scheduled on the owning realm's
/// finalization queue.
#[derive(Clone)]
pub struct HostObject(Rc<ObjectCell>);

/// A weak reference to a host object that does not keep it alive.
#[derive(Clone)]
pub struct WeakHostObject(Weak<ObjectCell>);

impl WeakHostObject {
    /// Returns the object if it is still alive.
    #[inline(always)]
    pub fn upgrade(&self) -> Option<HostObject> {
        self.0.upgrade().map(HostObject)
    }
}

pub(crate) struct ObjectCell {
    class: ObjectClass,
    properties: RefCell<Vec<(CompactString, Property)>>,
    internal: RefCell<Option<Rc<dyn Any>>>,
    finalizers: RefCell<Vec<Finalizer>>,
}

impl Drop for ObjectCell {
    fn drop(&mut self) {
        for finalizer in take(self.finalizers.get_mut()) {
            let Some(queue) = finalizer.queue.upgrade() else {
                continue;
            };

            if let Ok(mut queue) = queue.try_borrow_mut() {
                queue.push_back(finalizer.callback);
            };
        }
    }
}

pub(crate) enum ObjectClass {
    Plain,
    Array(RefCell<Vec<HostValue>>),
    Buffer(RefCell<Vec<u8>>),
    Function {
        name: CompactString,
        native: NativeFunction,
    },
    Promise(RefCell<PromiseSlot>),
    Error,
}

struct Finalizer {
    queue: Weak<FinalizationQueue>,
    callback: Box<dyn FnOnce()>,
}

impl Debug for HostObject {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0.class {
            ObjectClass::Array(elements) => match elements.try_borrow() {
                Ok(elements) => formatter.debug_list().entries(elements.iter()).finish(),
                Err(_) => formatter.write_str("[Array]"),
            },

            ObjectClass::Plain => {
                let mut debug = formatter.debug_map();

                if let Ok(properties) = self.0.properties.try_borrow() {
                    for (key, property) in properties.iter() {
                        match property {
                            Property::Data(value) => debug.entry(&key.as_str(), value),
                            Property::Accessor { .. } => debug.entry(&key.as_str(), &"<accessor>"),
                        };
                    }
                }

                debug.finish()
            }

            _ => Display::fmt(self, formatter),
        }
    }
}

impl Display for HostObject {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0.class {
            ObjectClass::Plain => formatter.write_str("[object Object]"),

            ObjectClass::Array(elements) => match elements.try_borrow() {
                Ok(elements) => {
                    let mut first = true;

                    for element in elements.iter() {
                        match first {
                            true => first = false,
                            false => formatter.write_str(",")?,
                        }

                        if !element.is_nullish() {
                            Display::fmt(element, formatter)?;
                        }
                    }

                    Ok(())
                }

                Err(_) => formatter.write_str("[object Array]"),
            },

            ObjectClass::Buffer(..) => formatter.write_str("[object Uint8Array]"),

            ObjectClass::Function { name, .. } => {
                formatter.write_fmt(format_args!("function {name}() {{ [native code] }}"))
            }

            ObjectClass::Promise(..) => formatter.write_str("[object Promise]"),

            ObjectClass::Error => {
                let message = match self.property("message") {
                    Some(Property::Data(message)) => message,
                    _ => HostValue::Undefined,
                };

                match message.is_undefined() {
                    true => formatter.write_str("Error"),
                    false => formatter.write_fmt(format_args!("Error: {message}")),
                }
            }
        }
    }
}

impl HostObject {
    #[inline(always)]
    pub(crate) fn new(class: ObjectClass) -> Self {
        Self(Rc::new(ObjectCell {
            class,
            properties: RefCell::new(Vec::new()),
            internal: RefCell::new(None),
            finalizers: RefCell::new(Vec::new()),
        }))
    }

    #[inline(always)]
    pub(crate) fn class(&self) -> &ObjectClass {
        &self.0.class
    }

    /// Returns the class of this object.
    pub fn kind(&self) -> ObjectKind {
        match &self.0.class {
            ObjectClass::Plain => ObjectKind::Plain,
            ObjectClass::Array(..) => ObjectKind::Array,
            ObjectClass::Buffer(..) => ObjectKind::Buffer,
            ObjectClass::Function { .. } => ObjectKind::Function,
            ObjectClass::Promise(..) => ObjectKind::Promise,
            ObjectClass::Error => ObjectKind::Error,
        }
    }

    /// Returns true if both references point to the same object.
    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the address of the object, which is unique among live objects.
    #[inline(always)]
    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Creates a weak reference to this object.
    #[inline(always)]
    pub fn downgrade(&self) -> WeakHostObject {
        WeakHostObject(Rc::downgrade(&self.0))
    }

    /// Returns the own property with the given key, if any.
    pub fn property(&self, key: &str) -> Option<Property> {
        let properties = self.0.properties.borrow();

        properties
            .iter()
            .find(|(candidate, _)| candidate.as_str() == key)
            .map(|(_, property)| property.clone())
    }

    /// Defines or redefines an own property. New properties are appended
    /// after the existing ones.
    pub fn define(&self, key: impl Into<CompactString>, property: Property) {
        let key = key.into();
        let mut properties = self.0.properties.borrow_mut();

        match properties.iter_mut().find(|(candidate, _)| *candidate == key) {
            Some((_, existing)) => *existing = property,
            None => properties.push((key, property)),
        }
    }

    /// Removes an own property. Returns true if the property existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut properties = self.0.properties.borrow_mut();
        let before = properties.len();

        properties.retain(|(candidate, _)| candidate.as_str() != key);

        properties.len() != before
    }

    /// Returns the keys of the own properties in definition order.
    pub fn keys(&self) -> Vec<CompactString> {
        self.0
            .properties
            .borrow()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Returns a copy of the array elements, or None if this object is not an
    /// array.
    pub fn array_elements(&self) -> Option<Vec<HostValue>> {
        match &self.0.class {
            ObjectClass::Array(elements) => Some(elements.borrow().clone()),
            _ => None,
        }
    }

    /// Returns the number of array elements or buffer bytes.
    pub fn length(&self) -> Option<usize> {
        match &self.0.class {
            ObjectClass::Array(elements) => Some(elements.borrow().len()),
            ObjectClass::Buffer(bytes) => Some(bytes.borrow().len()),
            _ => None,
        }
    }

    /// Gives access to the content of a byte buffer, or returns None if this
    /// object is not a buffer.
    pub fn with_buffer<R>(&self, read: impl FnOnce(&[u8]) -> R) -> Option<R> {
        match &self.0.class {
            ObjectClass::Buffer(bytes) => Some(read(bytes.borrow().as_slice())),
            _ => None,
        }
    }

    /// Returns the current state of a promise, or None if this object is not a
    /// promise.
    pub fn promise_state(&self) -> Option<PromiseState> {
        match &self.0.class {
            ObjectClass::Promise(slot) => Some(slot.borrow().state().clone()),
            _ => None,
        }
    }

    /// Returns the hidden internal slot of the object.
    #[inline(always)]
    pub fn internal(&self) -> Option<Rc<dyn Any>> {
        self.0.internal.borrow().clone()
    }

    /// Sets the hidden internal slot of the object. The slot is invisible to
    /// the host code.
    #[inline(always)]
    pub fn set_internal(&self, value: Rc<dyn Any>) {
        *self.0.internal.borrow_mut() = Some(value);
    }

    pub(crate) fn set_element(&self, index: usize, value: HostValue) -> bool {
        match &self.0.class {
            ObjectClass::Array(elements) => {
                let mut elements = elements.borrow_mut();

                // Writes far past the end are stored as named properties.
                if index > elements.len().saturating_add(MAX_ELEMENT_GAP) {
                    return false;
                }

                let Some(length) = index.checked_add(1) else {
                    return false;
                };

                if length > elements.len() {
                    elements.resize(length, HostValue::Undefined);
                }

                elements[index] = value;

                true
            }

            ObjectClass::Buffer(bytes) => {
                let mut bytes = bytes.borrow_mut();

                if let (Some(byte), Some(number)) = (bytes.get_mut(index), value.as_number()) {
                    *byte = number as u8;
                }

                true
            }

            _ => false,
        }
    }

    pub(crate) fn element(&self, index: usize) -> Option<HostValue> {
        match &self.0.class {
            ObjectClass::Array(elements) => {
                Some(elements.borrow().get(index).cloned().unwrap_or_default())
            }

            ObjectClass::Buffer(bytes) => Some(
                bytes
                    .borrow()
                    .get(index)
                    .map(|byte| HostValue::Number(*byte as f64))
                    .unwrap_or_default(),
            ),

            _ => None,
        }
    }

    pub(crate) fn add_finalizer(&self, queue: Weak<FinalizationQueue>, callback: Box<dyn FnOnce()>) {
        self.0
            .finalizers
            .borrow_mut()
            .push(Finalizer { queue, callback });
    }
}
