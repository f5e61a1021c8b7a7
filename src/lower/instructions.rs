use crate::types::TypeRef;

/// Constructor invoked by a `NewObject`.
#[derive(Clone, Debug, PartialEq)]
pub struct Constructor {
    pub declaring: TypeRef,
    pub parameter_count: usize,
}

/// The simplified instruction set the lowerer understands.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    NoOperation,
    LoadArgument(usize),
    LoadConstantInt32(i32),
    LoadConstantInt64(i64),
    LoadConstantFloat32(f32),
    LoadConstantFloat64(f64),
    LoadString(String),
    StoreLocal(usize),
    LoadLocal(usize),
    NewObject(Constructor),
    /// Observed but never lowered.
    Call,
    /// Anything outside the supported subset; kept for diagnostics only.
    Unsupported(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub offset: usize,
    pub op: Op,
}

impl Instruction {
    pub fn new(offset: usize, op: Op) -> Self {
        Self { offset, op }
    }

    /// Number of values this instruction pops and pushes.
    pub fn stack_effect(&self) -> (usize, usize) {
        match &self.op {
            Op::LoadArgument(_)
            | Op::LoadConstantInt32(_)
            | Op::LoadConstantInt64(_)
            | Op::LoadConstantFloat32(_)
            | Op::LoadConstantFloat64(_)
            | Op::LoadString(_)
            | Op::LoadLocal(_) => (0, 1),
            Op::StoreLocal(_) => (1, 0),
            Op::NewObject(ctor) => (ctor.parameter_count, 1),
            Op::NoOperation | Op::Call | Op::Unsupported(_) => (0, 0),
        }
    }
}

/// Numbers a sequence of ops by position.
pub fn sequence(ops: impl IntoIterator<Item = Op>) -> Vec<Instruction> {
    ops.into_iter()
        .enumerate()
        .map(|(offset, op)| Instruction::new(offset, op))
        .collect()
}
