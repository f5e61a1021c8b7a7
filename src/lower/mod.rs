//! Lowers a method's stack-based instruction stream into C-like statements.
//!
//! Only loads, local stores and object construction produce statements; calls and
//! control flow are observed and skipped. Streams are validated before lowering so the
//! interpreter itself never sees an underflow.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::LowerError;
use crate::types::members::MethodRef;
use crate::types::TypeRef;
use crate::utils::{sanitize_identifier, sanitize_type_name};

pub mod instructions;
pub mod stack;

use instructions::{Constructor, Instruction, Op};
use stack::{local_name, EvaluationStack, StackValue};

pub const OBJECT_SPELLING: &str = "Il2CppObject*";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoweredParameter {
    pub type_name: String,
    pub name: String,
}

impl LoweredParameter {
    pub fn new(type_name: &str, name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoweredBody {
    pub statements: Vec<String>,
    /// Values still on the stack when the stream ended, bottom first.
    pub stack: Vec<StackValue>,
    /// Expression text each local slot was last bound to.
    pub locals: BTreeMap<usize, String>,
    pub structs_needed: Vec<String>,
    pub classes_needed: Vec<String>,
}

/// Checks the stream stays within the supported contract: no underflow and no
/// argument index past the parameter list.
pub fn validate(instructions: &[Instruction], parameter_count: usize) -> Result<(), LowerError> {
    let mut depth = 0usize;
    for instr in instructions {
        if let Op::LoadArgument(index) = instr.op {
            if index >= parameter_count {
                return Err(LowerError::ArgumentOutOfRange {
                    offset: instr.offset,
                    index,
                    count: parameter_count,
                });
            }
        }
        let (pops, pushes) = instr.stack_effect();
        depth = depth
            .checked_sub(pops)
            .ok_or(LowerError::StackUnderflow {
                offset: instr.offset,
            })?;
        depth += pushes;
    }
    Ok(())
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// `<Namespace>_<Class>` identifier handed to the allocation call.
pub fn class_identifier(ty: &TypeRef) -> String {
    let name = sanitize_type_name(&ty.name);
    match &ty.namespace {
        Some(ns) => format!("{}_{}", ns.replace('.', "_"), name),
        None => name,
    }
}

struct Lowerer {
    names: Vec<String>,
    stack: EvaluationStack,
    body: LoweredBody,
}

impl Lowerer {
    fn expr(&self, value: &StackValue) -> String {
        value.expression(&self.names)
    }

    fn step(&mut self, instr: &Instruction) {
        trace!(offset = instr.offset, op = ?instr.op, depth = self.stack.len(), "lowering");
        match &instr.op {
            Op::LoadArgument(i) => self.stack.push(StackValue::ParameterRef(*i)),
            Op::LoadConstantInt32(i) => self.stack.push(StackValue::int(i)),
            Op::LoadConstantInt64(i) => self.stack.push(StackValue::int(i)),
            Op::LoadConstantFloat32(f) => self.stack.push(StackValue::float32(*f)),
            Op::LoadConstantFloat64(f) => self.stack.push(StackValue::float64(*f)),
            Op::LoadString(s) => self.stack.push(StackValue::string(s)),
            Op::StoreLocal(slot) => {
                let value = self.stack.pop();
                let text = self.expr(&value);
                self.body
                    .statements
                    .push(format!("auto {} = {}", local_name(*slot), text));
                self.body.locals.insert(*slot, text);
            }
            Op::LoadLocal(slot) => self.stack.push(StackValue::LocalRef(*slot)),
            Op::NewObject(ctor) => self.construct(instr.offset, ctor),
            Op::Call | Op::NoOperation | Op::Unsupported(_) => {}
        }
    }

    fn construct(&mut self, offset: usize, ctor: &Constructor) {
        let values = self.stack.pop_n(ctor.parameter_count);
        let args: Vec<String> = values.iter().map(|v| self.expr(v)).collect();

        if ctor.declaring.is_value_type && !ctor.declaring.is_primitive() {
            let type_name = sanitize_type_name(&ctor.declaring.name);
            let local = format!("_struct_{}", offset);
            self.body.statements.push(format!(
                "{} {} = {{{}}}",
                type_name,
                local,
                args.join(", ")
            ));
            push_unique(&mut self.body.structs_needed, type_name.clone());
            self.stack.push(StackValue::StructLiteral {
                type_name,
                local,
                values,
            });
        } else {
            let class = class_identifier(&ctor.declaring);
            let local = format!("_class_{}", offset);
            let mut call = format!("{} {} = il2cpp_utils::New({}", OBJECT_SPELLING, local, class);
            for a in &args {
                call.push_str(", ");
                call.push_str(a);
            }
            call.push(')');
            self.body.statements.push(call);
            push_unique(&mut self.body.classes_needed, class);
            self.stack.push(StackValue::HeapRef(local));
        }
    }
}

/// Lowers one instruction stream against its parameter list.
pub fn lower(
    instructions: &[Instruction],
    parameters: &[LoweredParameter],
) -> Result<LoweredBody, LowerError> {
    validate(instructions, parameters.len())?;

    let mut lowerer = Lowerer {
        names: parameters.iter().map(|p| p.name.clone()).collect(),
        stack: EvaluationStack::new(),
        body: LoweredBody::default(),
    };
    for instr in instructions {
        lowerer.step(instr);
    }

    let mut body = lowerer.body;
    body.stack = lowerer.stack.into_values();
    Ok(body)
}

/// Spelling used in lowered code: primitives by the table, value types by name,
/// every other reference as a runtime object pointer.
pub fn cpp_type(ty: Option<&TypeRef>, structs_needed: &mut Vec<String>) -> String {
    let Some(ty) = ty else {
        return "void".to_string();
    };
    if let Some(kind) = ty.primitive {
        return kind.spelling().to_string();
    }
    if ty.is_value_type && !ty.is_generic && !ty.is_array {
        let name = sanitize_type_name(&ty.name);
        push_unique(structs_needed, name.clone());
        return name;
    }
    OBJECT_SPELLING.to_string()
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoweredMethod {
    pub header: String,
    pub parameters: Vec<LoweredParameter>,
    pub body: LoweredBody,
}

impl LoweredMethod {
    pub fn render(&self) -> String {
        let mut out = format!("{} {{\n", self.header);
        for s in &self.body.statements {
            out.push_str(&format!("\t{};\n", s));
        }
        out.push_str("}\n");
        out
    }
}

/// Lowers a method with a body; `None` when the method has none.
pub fn lower_method(method: &MethodRef) -> Result<Option<LoweredMethod>, LowerError> {
    let Some(instructions) = &method.body else {
        return Ok(None);
    };

    let mut structs_needed = vec![];
    let mut parameters = vec![];
    if !method.is_static {
        parameters.push(LoweredParameter::new(OBJECT_SPELLING, "self"));
    }
    for (i, p) in method.parameters.iter().enumerate() {
        let name = if p.name.is_empty() {
            format!("arg{}", i)
        } else {
            sanitize_identifier(&p.name)
        };
        parameters.push(LoweredParameter {
            type_name: cpp_type(Some(&p.ty), &mut structs_needed),
            name,
        });
    }

    let return_type = cpp_type(method.return_type.as_ref(), &mut structs_needed);
    let params_text: Vec<String> = parameters
        .iter()
        .map(|p| format!("{} {}", p.type_name, p.name))
        .collect();
    let header = format!(
        "static {} {}({})",
        return_type,
        sanitize_identifier(&method.name),
        params_text.join(", ")
    );

    let mut body = lower(instructions, &parameters)?;
    for s in structs_needed.into_iter().rev() {
        if !body.structs_needed.contains(&s) {
            body.structs_needed.insert(0, s);
        }
    }

    Ok(Some(LoweredMethod {
        header,
        parameters,
        body,
    }))
}
