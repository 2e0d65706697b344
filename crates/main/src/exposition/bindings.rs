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

use crate::exposition::{
    config::ExposerConfig,
    definition::{DefinitionTree, Entity},
};

/// Renders the JS module that binds the exposed packages.
///
/// The module declares one `export let` binding per package and an
/// initializer function that assigns them. Exposed functions are wrapped into
/// the trampoline that re-throws the failures reported through the error slot.
pub(crate) fn render_bindings(config: &ExposerConfig, tree: &DefinitionTree) -> String {
    let quote = config.quote;
    let slot = format!("globalThis[{quote}{}{quote}]", config.bridge.error_slot);

    let mut output = String::new();

    let _ = write!(
        output,
        "const wrap = (fn) => {{\n\
        \x20 return (...args) => {{\n\
        \x20   const result = fn.call(undefined, ...args);\n\
        \x20   if ({slot}) {{\n\
        \x20     const error = new Error({slot});\n\
        \x20     {slot} = undefined;\n\
        \x20     throw error;\n\
        \x20   }}\n\
        \x20   return result;\n\
        \x20 }}\n\
        }};\n\n",
    );

    for package_name in tree.packages().keys() {
        let _ = writeln!(output, "export let {package_name};");
    }

    let _ = writeln!(output, "\nexport const {} = () => {{", config.init_fn);

    for (package_name, package) in tree.packages() {
        let _ = writeln!(output, "  {package_name} = {{");

        let count = package.entities.len();

        for (index, (name, entity)) in package.entities.iter().enumerate() {
            let path = [config.root, config.app, package_name.as_str(), name.as_str()]
                .iter()
                .map(|segment| format!("[{quote}{segment}{quote}]"))
                .collect::<String>();

            let comma = match config.trailing_comma || index + 1 < count {
                true => ",",
                false => "",
            };

            let _ = match entity {
                Entity::Function(..) => {
                    writeln!(output, "    {name}: wrap(globalThis{path}){comma}")
                }

                Entity::Value(..) => writeln!(output, "    {name}: globalThis{path}{comma}"),
            };
        }

        output.push_str("  };\n");
    }

    output.push_str("};");

    output
}
