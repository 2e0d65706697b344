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

use std::{any::TypeId, collections::BTreeMap};

use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use log::debug;

use crate::{
    bridge::BridgeConfig,
    exposition::namespace::sanitize,
    runtime::{BridgeError, BridgeResult, Signature, TypeDescriptor, TypeKind},
};

/// The exposed entities and the record definitions of one application.
#[derive(Default)]
pub(crate) struct DefinitionTree {
    packages: BTreeMap<CompactString, Package>,
    records: AHashMap<TypeId, RecordPath>,
}

/// The contents of one exposed package.
#[derive(Default)]
pub(crate) struct Package {
    pub(crate) entities: BTreeMap<CompactString, Entity>,
    pub(crate) definitions: BTreeMap<CompactString, &'static TypeDescriptor>,

    // Keyed by the owner interface name ("" for free functions) and the
    // function name.
    pub(crate) functions: BTreeMap<(CompactString, &'static str), FuncMeta>,
}

/// An exposed function or value.
pub(crate) enum Entity {
    Function(Signature),
    Value(&'static TypeDescriptor),
}

/// The declaration metadata of a function or a method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FuncMeta {
    pub(crate) params: Vec<&'static str>,
    pub(crate) promise: bool,
}

/// The declared location of a record type.
#[derive(Clone)]
pub(crate) struct RecordPath {
    pub(crate) package: CompactString,
    pub(crate) name: CompactString,
}

impl DefinitionTree {
    #[inline(always)]
    pub(crate) fn packages(&self) -> &BTreeMap<CompactString, Package> {
        &self.packages
    }

    #[inline(always)]
    pub(crate) fn record_path(&self, descriptor: &TypeDescriptor) -> Option<&RecordPath> {
        self.records.get(&descriptor.id())
    }

    #[inline(always)]
    pub(crate) fn contains(&self, package: &str, name: &str) -> bool {
        self.packages
            .get(package)
            .map(|layer| layer.entities.contains_key(name))
            .unwrap_or(false)
    }

    /// Fails if the package already contains an entity with this name.
    pub(crate) fn ensure_unique(&self, package: &str, name: &str) -> BridgeResult<()> {
        if !self.contains(package, name) {
            return Ok(());
        }

        Err(BridgeError::build(
            format!("entity \"{package}.{name}\""),
            BridgeError::invalid(format!(
                "a name that the \"{package}\" namespace does not contain yet",
            )),
        ))
    }

    /// Records an exposed entity and every record type reachable from it.
    pub(crate) fn add_entity(
        &mut self,
        config: &BridgeConfig,
        package: CompactString,
        name: CompactString,
        entity: Entity,
    ) -> BridgeResult<()> {
        self.ensure_unique(&package, &name)?;

        let mut visited = AHashSet::new();

        match &entity {
            Entity::Function(signature) => {
                self.add_signature(config, &package, "", signature, false, &mut visited)?
            }

            Entity::Value(descriptor) => {
                self.add_type(config, &package, *descriptor, &mut visited)?
            }
        }

        let _ = self
            .packages
            .entry(package)
            .or_default()
            .entities
            .insert(name, entity);

        Ok(())
    }

    fn add_signature(
        &mut self,
        config: &BridgeConfig,
        package: &CompactString,
        owner: &str,
        signature: &Signature,
        promise: bool,
        visited: &mut AHashSet<TypeId>,
    ) -> BridgeResult<()> {
        for param in &signature.params {
            self.add_type(config, package, (param.ty)(), visited)?;
        }

        for result in &signature.results {
            self.add_type(config, package, result(), visited)?;
        }

        let meta = FuncMeta {
            params: signature.param_names().collect(),
            promise: promise || signature.is_promise(),
        };

        let _ = self
            .packages
            .entry(package.clone())
            .or_default()
            .functions
            .insert((CompactString::from(owner), signature.name), meta);

        Ok(())
    }

    fn add_type(
        &mut self,
        config: &BridgeConfig,
        package: &CompactString,
        descriptor: &'static TypeDescriptor,
        visited: &mut AHashSet<TypeId>,
    ) -> BridgeResult<()> {
        if !visited.insert(descriptor.id()) {
            return Ok(());
        }

        match descriptor.kind() {
            TypeKind::Sequence { element, .. } | TypeKind::Array { element, .. } => {
                self.add_type(config, package, element(), visited)
            }

            TypeKind::Mapping { key, value, .. } => {
                self.add_type(config, package, key(), visited)?;
                self.add_type(config, package, value(), visited)
            }

            TypeKind::Optional { inner, .. }
            | TypeKind::Pointer { inner, .. }
            | TypeKind::Shared { inner, .. } => self.add_type(config, package, inner(), visited),

            TypeKind::Function(meta) => {
                for ty in (meta.params)().into_iter().chain((meta.results)()) {
                    self.add_type(config, package, ty(), visited)?;
                }

                Ok(())
            }

            TypeKind::Record(meta) => {
                if self.records.contains_key(&descriptor.id()) {
                    return Ok(());
                }

                let name = sanitize(descriptor.name());
                let layer = self.packages.entry(package.clone()).or_default();

                if layer.definitions.contains_key(&name) {
                    return Err(BridgeError::build(
                        format!("definition of \"{descriptor}\""),
                        BridgeError::invalid(format!(
                            "a type name that the \"{package}\" namespace does not declare yet",
                        )),
                    ));
                }

                debug!("Declaring \"{descriptor}\" as \"{package}.{name}\".");

                let _ = layer.definitions.insert(name.clone(), descriptor);
                let _ = self.records.insert(
                    descriptor.id(),
                    RecordPath {
                        package: package.clone(),
                        name: name.clone(),
                    },
                );

                for field in &meta.fields {
                    self.add_type(config, package, (field.ty)(), visited)?;
                }

                for method in &meta.methods {
                    let method_name = method.signature.name;

                    if config.is_denied(descriptor.name(), method_name) {
                        continue;
                    }

                    let promise = config.is_promise_override(descriptor.name(), method_name);

                    self.add_signature(config, package, &name, &method.signature, promise, visited)?;
                }

                Ok(())
            }

            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Func;

    #[test]
    fn test_function_meta() {
        let mut tree = DefinitionTree::default();
        let config = BridgeConfig::new();

        let func = Func::new("add", |a: u32, b: u32| a + b).with_params(&["a", "b"]);

        tree.add_entity(
            &config,
            CompactString::from("math"),
            CompactString::from("add"),
            Entity::Function(func.signature().clone()),
        )
        .unwrap();

        let package = &tree.packages()["math"];
        let meta = &package.functions[&(CompactString::default(), "add")];

        assert_eq!(meta.params, ["a", "b"]);
        assert!(!meta.promise);
        assert!(tree.contains("math", "add"));
    }

    #[test]
    fn test_duplicate_entity() {
        let mut tree = DefinitionTree::default();
        let config = BridgeConfig::new();

        for attempt in 0..2 {
            let result = tree.add_entity(
                &config,
                CompactString::from("values"),
                CompactString::from("x"),
                Entity::Value(TypeDescriptor::of::<u8>()),
            );

            assert_eq!(result.is_ok(), attempt == 0);
        }
    }
}
