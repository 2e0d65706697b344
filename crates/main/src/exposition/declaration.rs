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

use std::fmt::Write;

use compact_str::CompactString;

use crate::{
    exposition::{
        config::ExposerConfig,
        definition::{DefinitionTree, Entity, FuncMeta, Package},
    },
    runtime::{Signature, TypeDescriptor, TypeKind, TypeRef},
};

const INDENT: &str = "  ";

/// Renders the TypeScript declarations of the exposed packages.
pub(crate) fn render_declarations(config: &ExposerConfig, tree: &DefinitionTree) -> String {
    let mut output = String::new();

    for (package_name, package) in tree.packages() {
        let printer = DeclarationPrinter { tree, package };

        let _ = writeln!(output, "export declare namespace {package_name} {{");

        for (name, descriptor) in &package.definitions {
            printer.print_interface(&mut output, name, descriptor);
        }

        for (name, entity) in &package.entities {
            printer.print_entity(&mut output, name, entity);
        }

        output.push_str("}\n");
    }

    let _ = write!(output, "export const {}: () => void;", config.init_fn);

    output
}

struct DeclarationPrinter<'a> {
    tree: &'a DefinitionTree,
    package: &'a Package,
}

impl<'a> DeclarationPrinter<'a> {
    fn print_interface(&self, output: &mut String, name: &str, descriptor: &TypeDescriptor) {
        let Some(meta) = descriptor.record() else {
            return;
        };

        let _ = writeln!(output, "{INDENT}interface {name} {{");

        for field in &meta.fields {
            let ty = (field.ty)();
            let optional = ty.is_nilable() && !field.not_nil;

            let _ = writeln!(
                output,
                "{INDENT}{INDENT}{}{}: {};",
                field.name,
                if optional { "?" } else { "" },
                self.type_name(ty, false),
            );
        }

        for method in &meta.methods {
            let Some(function) = self.function_meta(name, method.signature.name) else {
                continue;
            };

            let _ = writeln!(
                output,
                "{INDENT}{INDENT}{};",
                self.signature(&method.signature, function),
            );
        }

        let _ = writeln!(output, "{INDENT}}}");
    }

    fn print_entity(&self, output: &mut String, name: &str, entity: &Entity) {
        match entity {
            Entity::Function(signature) => {
                let fallback;

                let function = match self.function_meta("", signature.name) {
                    Some(function) => function,
                    None => {
                        fallback = FuncMeta {
                            params: signature.param_names().collect(),
                            promise: signature.is_promise(),
                        };

                        &fallback
                    }
                };

                let _ = writeln!(
                    output,
                    "{INDENT}function {};",
                    self.signature(signature, function),
                );
            }

            Entity::Value(descriptor) => {
                let _ = writeln!(
                    output,
                    "{INDENT}const {name}: {}{};",
                    self.type_name(descriptor, false),
                    if descriptor.is_nilable() { " | undefined" } else { "" },
                );
            }
        }
    }

    #[inline(always)]
    fn function_meta(&self, owner: &str, name: &'static str) -> Option<&'a FuncMeta> {
        self.package
            .functions
            .get(&(CompactString::from(owner), name))
    }

    // Renders `name(a: T, b?: U): R` with the promise wrapper applied.
    fn signature(&self, signature: &Signature, function: &FuncMeta) -> String {
        let mut result = String::new();

        result.push_str(signature.name);
        result.push('(');

        for (index, param) in signature.params.iter().enumerate() {
            if index > 0 {
                result.push_str(", ");
            }

            let ty = (param.ty)();
            let name = function.params.get(index).copied().unwrap_or(param.name);

            let _ = write!(
                result,
                "{name}{}: {}",
                if ty.is_nilable() { "?" } else { "" },
                self.type_name(ty, true),
            );
        }

        result.push_str("): ");
        result.push_str(&self.results(&signature.results, function.promise));

        result
    }

    fn results(&self, results: &[TypeRef], promise: bool) -> String {
        let inner = match results {
            [] => String::from("void"),

            [single] => self.result_name(single()),

            many => {
                let names = many
                    .iter()
                    .map(|ty| self.result_name(ty()))
                    .collect::<Vec<_>>();

                format!("[{}]", names.join(", "))
            }
        };

        match promise {
            true => format!("Promise<{inner}>"),
            false => inner,
        }
    }

    fn result_name(&self, descriptor: &TypeDescriptor) -> String {
        let name = self.type_name(descriptor, false);

        match descriptor.is_nilable() {
            true => format!("({name} | undefined)"),
            false => name,
        }
    }

    /// Renders the TypeScript type of a compiled type.
    ///
    /// If `host_provided` is true, the host supplies values of this type, so
    /// its callables may return a Promise.
    fn type_name(&self, descriptor: &TypeDescriptor, host_provided: bool) -> String {
        match descriptor.kind() {
            TypeKind::Bool => String::from("boolean"),
            TypeKind::Int { .. } | TypeKind::Float { .. } => String::from("number"),
            TypeKind::String => String::from("string"),
            TypeKind::Bytes => String::from("Uint8Array"),
            TypeKind::Error => String::from("Error"),

            TypeKind::Sequence { element, .. } | TypeKind::Array { element, .. } => {
                format!("Array<{}>", self.element_name(element(), host_provided))
            }

            TypeKind::Mapping { key, value, .. } => format!(
                "Record<{}, {}>",
                self.element_name(key(), host_provided),
                self.element_name(value(), host_provided),
            ),

            TypeKind::Optional { inner, .. }
            | TypeKind::Pointer { inner, .. }
            | TypeKind::Shared { inner, .. } => self.type_name(inner(), host_provided),

            TypeKind::Record(..) => match self.tree.record_path(descriptor) {
                Some(path) => format!("{}.{}", path.package, path.name),
                None => String::from("unknown"),
            },

            TypeKind::Function(meta) => {
                let mut result = String::from("(");

                for (index, param) in (meta.params)().into_iter().enumerate() {
                    if index > 0 {
                        result.push_str(", ");
                    }

                    let param = param();

                    let _ = write!(
                        result,
                        "arg{}{}: {}",
                        index + 1,
                        if param.is_nilable() { "?" } else { "" },
                        self.type_name(param, !host_provided),
                    );
                }

                result.push_str(") => ");

                let results = (meta.results)();

                match host_provided {
                    true => {
                        let inner = self.results(&results, false);

                        let _ = write!(result, "{inner} | Promise<{inner}>");
                    }

                    false => result.push_str(&self.results(&results, false)),
                }

                result
            }

            _ => String::from("unknown"),
        }
    }

    fn element_name(&self, descriptor: &TypeDescriptor, host_provided: bool) -> String {
        let name = self.type_name(descriptor, host_provided);

        match descriptor.is_nilable() {
            true => format!("{name} | undefined"),
            false => name,
        }
    }
}
