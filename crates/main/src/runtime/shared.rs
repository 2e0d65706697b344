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
    cell::{Ref, RefCell, RefMut},
    fmt::{Debug, Formatter},
    rc::Rc,
};

use crate::runtime::{
    downcast,
    BridgeError,
    BridgeResult,
    FieldMeta,
    Reflect,
    TypeDescriptor,
    TypeKind,
    View,
};

/// An addressable compiled value shared between Rust code and the host.
///
/// When a Shared cell holding an exported struct crosses the bridge, the host
/// receives a mirror object whose properties read and write the cell's content
/// directly. Passing the same cell twice yields the same mirror, and passing
/// the mirror back recovers this very cell.
///
/// The cell is single-threaded. Borrowing the content while the host holds a
/// conflicting borrow (e.g., from inside a bridged method call) fails with a
/// [RuntimeFailure](BridgeError::RuntimeFailure) instead of panicking.
pub struct Shared<T: Reflect>(Rc<RefCell<T>>);

impl<T: Reflect> Clone for Shared<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Reflect + Debug> Debug for Shared<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0.try_borrow() {
            Ok(content) => formatter.debug_tuple("Shared").field(&*content).finish(),
            Err(_) => formatter.write_str("Shared(<borrowed>)"),
        }
    }
}

impl<T: Reflect + Default> Default for Shared<T> {
    #[inline(always)]
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Reflect> PartialEq for Shared<T> {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Reflect> Eq for Shared<T> {}

impl<T: Reflect> Shared<T> {
    /// Allocates a new cell.
    #[inline(always)]
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Immutably borrows the content.
    ///
    /// Panics if the content is currently mutably borrowed.
    #[inline(always)]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Mutably borrows the content.
    ///
    /// Panics if the content is currently borrowed.
    #[inline(always)]
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Returns the address of the content. The address is stable for the
    /// lifetime of the cell.
    #[inline(always)]
    pub fn address(&self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Returns the type-erased version of this cell.
    #[inline(always)]
    pub fn erase(&self) -> Rc<dyn ErasedCell> {
        self.0.clone()
    }

    /// Recovers a typed cell from a type-erased one.
    ///
    /// Returns None if the erased cell holds a different type, or if it is a
    /// projection of another cell's field.
    #[inline]
    pub fn from_erased(cell: Rc<dyn ErasedCell>) -> Option<Self> {
        cell.into_any_rc().downcast::<RefCell<T>>().ok().map(Self)
    }
}

impl<T: Reflect + Default> Reflect for Shared<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(TypeKind::Shared {
            inner: TypeDescriptor::of::<T>,
            wrap: |value| Ok(Box::new(Shared::new(downcast::<T>(value)?))),
            adopt: |cell| Shared::<T>::from_erased(cell).map(|cell| Box::new(cell) as _),
        })
        .with_zero(|| Box::new(Shared::<T>::default()))
    }

    #[inline(always)]
    fn view(&self) -> View<'_> {
        View::Shared(self.erase())
    }
}

/// A type-erased addressable cell.
///
/// Implemented by the content of [Shared] cells and by the projections of
/// record fields nested by value inside them.
pub trait ErasedCell: 'static {
    /// Returns the descriptor of the cell's content type.
    fn descriptor(&self) -> &'static TypeDescriptor;

    /// Returns the current address of the content.
    fn address(&self) -> usize;

    /// Immutably borrows the content.
    fn read(&self) -> BridgeResult<Ref<'_, dyn Reflect>>;

    /// Mutably borrows the content.
    fn write(&self) -> BridgeResult<RefMut<'_, dyn Reflect>>;

    /// Converts the cell into a type-erased reference-counted pointer.
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Reflect> ErasedCell for RefCell<T> {
    #[inline(always)]
    fn descriptor(&self) -> &'static TypeDescriptor {
        TypeDescriptor::of::<T>()
    }

    #[inline(always)]
    fn address(&self) -> usize {
        self.as_ptr() as usize
    }

    fn read(&self) -> BridgeResult<Ref<'_, dyn Reflect>> {
        match self.try_borrow() {
            Ok(content) => Ok(Ref::map(content, |content| content as &dyn Reflect)),
            Err(_) => Err(busy(TypeDescriptor::of::<T>())),
        }
    }

    fn write(&self) -> BridgeResult<RefMut<'_, dyn Reflect>> {
        match self.try_borrow_mut() {
            Ok(content) => Ok(RefMut::map(content, |content| content as &mut dyn Reflect)),
            Err(_) => Err(busy(TypeDescriptor::of::<T>())),
        }
    }

    #[inline(always)]
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// A live view of a record field that is nested by value inside another cell.
pub(crate) struct Projection {
    parent: Rc<dyn ErasedCell>,
    field: &'static FieldMeta,
}

impl Projection {
    #[inline(always)]
    pub(crate) fn new(parent: Rc<dyn ErasedCell>, field: &'static FieldMeta) -> Self {
        Self { parent, field }
    }
}

impl ErasedCell for Projection {
    #[inline(always)]
    fn descriptor(&self) -> &'static TypeDescriptor {
        (self.field.ty)()
    }

    fn address(&self) -> usize {
        let Ok(parent) = self.parent.read() else {
            return 0;
        };

        match (self.field.get)(parent.as_any()) {
            Some(value) => value as *const dyn Reflect as *const () as usize,
            None => 0,
        }
    }

    fn read(&self) -> BridgeResult<Ref<'_, dyn Reflect>> {
        let get = self.field.get;
        let parent = self.parent.read()?;

        Ref::filter_map(parent, |parent| get(parent.as_any()))
            .map_err(|_| missing_field(self.field))
    }

    fn write(&self) -> BridgeResult<RefMut<'_, dyn Reflect>> {
        let get_mut = self.field.get_mut;
        let parent = self.parent.write()?;

        RefMut::filter_map(parent, |parent| get_mut(parent.as_any_mut()))
            .map_err(|_| missing_field(self.field))
    }

    #[inline(always)]
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

#[inline(always)]
fn busy(descriptor: &TypeDescriptor) -> BridgeError {
    BridgeError::failure(format!(
        "The value of type \"{descriptor}\" is already borrowed.",
    ))
}

#[inline(always)]
fn missing_field(field: &FieldMeta) -> BridgeError {
    BridgeError::invalid(format!("field \"{}\" of a mismatched record", field.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erasure_roundtrip() {
        let cell = Shared::new(10u32);
        let erased = cell.erase();

        assert_eq!(erased.address(), cell.address());
        assert_eq!(erased.descriptor().name(), "u32");

        let recovered = Shared::<u32>::from_erased(erased.clone()).unwrap();
        assert_eq!(recovered, cell);

        assert!(Shared::<u64>::from_erased(erased).is_none());
    }

    #[test]
    fn test_busy_cell() {
        let cell = Shared::new(String::from("hello"));
        let erased = cell.erase();

        let guard = cell.borrow_mut();
        assert!(erased.read().is_err());
        drop(guard);

        let content = erased.read().unwrap();
        assert_eq!(content.as_any().downcast_ref::<String>().unwrap(), "hello");
    }
}
