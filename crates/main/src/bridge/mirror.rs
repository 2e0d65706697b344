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

use std::rc::Rc;

use log::{debug, error};

use crate::{
    bridge::{cache::MirrorKey, function, outbound, Bridge, ConverterSlot},
    host::{HostObject, HostValue, Property, Realm},
    runtime::{BridgeError, BridgeResult, ErasedCell, FieldMeta, Func, Projection, RecordMeta},
};

/// The hidden link from a mirror to the cell it represents.
pub(crate) struct MirrorLink {
    cell: Rc<dyn ErasedCell>,
}

impl MirrorLink {
    #[inline(always)]
    pub(crate) fn cell(&self) -> &Rc<dyn ErasedCell> {
        &self.cell
    }
}

/// Returns the link of a mirror object, or None if the value is not a mirror.
pub(crate) fn mirror_link(value: &HostValue) -> Option<Rc<MirrorLink>> {
    value
        .as_object()?
        .internal()?
        .downcast::<MirrorLink>()
        .ok()
}

/// Returns the mirror of a cell that holds an exported struct described by
/// `meta`.
///
/// The mirror is identity-cached by the address and the type of the cell's
/// content: while the host keeps the mirror reachable, every conversion of the
/// same cell yields the same host object.
pub(super) fn mirror(
    bridge: &Bridge,
    realm: &Realm,
    cell: Rc<dyn ErasedCell>,
    meta: &'static RecordMeta,
) -> BridgeResult<HostValue> {
    let key = MirrorKey {
        address: cell.address(),
        ty: cell.descriptor().id(),
    };

    let mirror = bridge
        .cache()
        .fetch(realm, key, || build(bridge, realm, &cell, meta, key))?;

    Ok(HostValue::Object(mirror))
}

fn build(
    bridge: &Bridge,
    realm: &Realm,
    cell: &Rc<dyn ErasedCell>,
    meta: &'static RecordMeta,
    key: MirrorKey,
) -> BridgeResult<HostObject> {
    let descriptor = cell.descriptor();
    let entity = || format!("mirror of \"{descriptor}\"");

    let mut properties = Vec::with_capacity(meta.fields.len() + meta.methods.len());

    for field in &meta.fields {
        let slot = bridge.converter((field.ty)()).map_err(|cause| {
            error!("Cannot build the \"{}\" field of a {}.", field.name, entity());

            BridgeError::build(entity(), cause)
        })?;

        properties.push((
            field.name,
            Property::Accessor {
                get: Some(getter(bridge, realm, cell, field)),
                set: Some(setter(bridge, realm, cell, field, slot)),
            },
        ));
    }

    let config = bridge.config();

    for method in &meta.methods {
        let name = method.signature.name;

        if config.is_denied(descriptor.name(), name) {
            debug!("Skipping the denied method \"{name}\" of \"{descriptor}\".");
            continue;
        }

        let promise =
            method.signature.promise || config.is_promise_override(descriptor.name(), name);

        let invoke = method.invoke;
        let receiver = cell.clone();

        let func = Func::from_raw(method.signature.clone(), move |args| invoke(&receiver, args));

        let function = function::bridge(bridge, realm, &func, promise)
            .map_err(|cause| BridgeError::build(entity(), cause))?;

        // Methods are called directly on the mirror, so synchronous failures
        // must be rethrown here rather than by the generated bindings.
        let function = match promise {
            true => function,
            false => bridge.trampoline(realm, &function),
        };

        properties.push((name, Property::Data(function)));
    }

    let object = realm.new_object();

    object.set_internal(Rc::new(MirrorLink { cell: cell.clone() }));
    realm.define_properties(&object, properties);

    debug!("Built a {} at {:#x}.", entity(), key.address);

    Ok(object)
}

// Accessor failures are thrown directly: there is no trampoline around host
// property access.
fn getter(
    bridge: &Bridge,
    realm: &Realm,
    cell: &Rc<dyn ErasedCell>,
    field: &'static FieldMeta,
) -> HostValue {
    let bridge = bridge.clone();
    let cell = cell.clone();

    realm.new_function(field.name, move |realm, _, _| {
        read_field(&bridge, realm, &cell, field).map_err(|error| realm.new_error(error.to_string()))
    })
}

fn setter(
    bridge: &Bridge,
    realm: &Realm,
    cell: &Rc<dyn ErasedCell>,
    field: &'static FieldMeta,
    slot: Rc<ConverterSlot>,
) -> HostValue {
    let bridge = bridge.clone();
    let cell = cell.clone();

    realm.new_function(field.name, move |realm, _, args| {
        let value = args.first().cloned().unwrap_or_default();

        match write_field(&bridge, realm, &cell, field, &slot, &value) {
            Ok(()) => Ok(HostValue::Undefined),
            Err(error) => Err(realm.new_error(error.to_string())),
        }
    })
}

fn read_field(
    bridge: &Bridge,
    realm: &Realm,
    cell: &Rc<dyn ErasedCell>,
    field: &'static FieldMeta,
) -> BridgeResult<HostValue> {
    // Records nested by value are mirrored through a projection, so writes to
    // the nested mirror reach the parent's memory.
    if let Some(meta) = (field.ty)().record() {
        let projection: Rc<dyn ErasedCell> = Rc::new(Projection::new(cell.clone(), field));

        return mirror(bridge, realm, projection, meta);
    }

    let content = cell.read()?;

    let Some(value) = (field.get)(content.as_any()) else {
        return Err(BridgeError::invalid(format!(
            "field \"{}\" of \"{}\"",
            field.name,
            cell.descriptor(),
        )));
    };

    outbound::convert(bridge, realm, value, field.not_nil)
}

fn write_field(
    bridge: &Bridge,
    realm: &Realm,
    cell: &Rc<dyn ErasedCell>,
    field: &'static FieldMeta,
    slot: &ConverterSlot,
    value: &HostValue,
) -> BridgeResult<()> {
    // The value is converted before the cell is borrowed: the conversion may
    // read the same cell through another mirror.
    let converted = slot.convert(bridge, realm, value)?;

    let mut content = cell.write()?;

    (field.set)(content.as_any_mut(), converted)
}
