//! Hook stubs for methods carrying an address annotation.

use tracing::{debug, info};

use crate::error::LayoutError;
use crate::layout::LayoutEngine;
use crate::types::members::MethodRef;
use crate::types::MetadataProvider;
use crate::utils::{sanitize_identifier, sanitize_type_name, NameTable};

pub const RECEIVER_NAME: &str = "self";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookRecord {
    pub declaring_type: String,
    pub method: String,
    /// Unique name in the generated namespace.
    pub name: String,
    pub offset: String,
}

/// The two text fragments produced for one hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedHook {
    pub record: HookRecord,
    pub body: String,
    pub install: String,
}

#[derive(Default)]
pub struct HookEmitter {
    hooks: Vec<EmittedHook>,
    names: NameTable,
}

/// `<DeclaringType>_<Method>` with dots replaced.
pub fn hook_base_name(method: &MethodRef) -> String {
    let raw = format!("{}_{}", sanitize_type_name(&method.declaring.name), method.name);
    sanitize_identifier(&raw.replace('.', "_"))
}

impl HookEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hooks(&self) -> &[EmittedHook] {
        &self.hooks
    }

    pub fn records(&self) -> impl Iterator<Item = &HookRecord> {
        self.hooks.iter().map(|h| &h.record)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Emits a hook for `method`, or returns `None` when it is not eligible
    /// (no address annotation, or a constructor).
    pub fn emit<P: MetadataProvider + ?Sized>(
        &mut self,
        layout: &mut LayoutEngine,
        provider: &P,
        method: &MethodRef,
    ) -> Result<Option<&EmittedHook>, LayoutError> {
        let Some(address) = &method.address else {
            return Ok(None);
        };
        if method.is_constructor {
            debug!(method = ?method, "skipping annotated constructor");
            return Ok(None);
        }

        let name = self.names.claim(&hook_base_name(method));

        let return_type = match &method.return_type {
            Some(t) => layout.spell_type(provider, t)?,
            None => "void".to_string(),
        };

        let mut params = vec![];
        if !method.is_static {
            params.push((
                layout.spell_type(provider, &method.declaring)?,
                RECEIVER_NAME.to_string(),
            ));
        }
        for (i, p) in method.parameters.iter().enumerate() {
            let param_name = if p.name.is_empty() {
                format!("arg{}", i)
            } else {
                sanitize_identifier(&p.name)
            };
            params.push((layout.spell_type(provider, &p.ty)?, param_name));
        }

        let mut body = format!("MAKE_HOOK({}, {}, {}", name, address.offset, return_type);
        for (ty, param_name) in &params {
            body.push_str(&format!(", {} {}", ty, param_name));
        }
        body.push_str(") {\n");
        body.push_str(&format!("\tlog(\"Called {} Hook!\");\n", name));
        body.push('\t');
        if method.return_type.is_some() {
            body.push_str("return ");
        }
        let args: Vec<&str> = params.iter().map(|(_, n)| n.as_str()).collect();
        body.push_str(&format!("{}({});\n}}\n", name, args.join(", ")));

        let install = format!(
            "\tlog(\"Attempting to install hook: {} at offset: {}\");\n\tINSTALL_HOOK({});\n",
            name, address.offset, name
        );

        info!(hook = %name, offset = %address.offset, "emitted hook");
        self.hooks.push(EmittedHook {
            record: HookRecord {
                declaring_type: method.declaring.type_name(),
                method: method.name.clone(),
                name,
                offset: address.offset.clone(),
            },
            body,
            install,
        });
        Ok(self.hooks.last())
    }

    /// Installation routine calling every hook in emission order.
    pub fn install_routine(&self) -> String {
        let mut out = String::from("__attribute__((constructor)) void lib_main() {\n");
        for h in &self.hooks {
            out.push_str(&h.install);
        }
        out.push_str("\tlog(\"Complete!\");\n}\n");
        out
    }
}
