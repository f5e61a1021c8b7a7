use crate::utils::c_string_literal;

/// `math.h` spellings for values Rust would print as `NaN` or `inf`.
fn non_finite_literal(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("NAN")
    } else if value == f64::INFINITY {
        Some("INFINITY")
    } else if value == f64::NEG_INFINITY {
        Some("-INFINITY")
    } else {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImmediateKind {
    Int,
    Float,
    String,
}

/// One operand on the simulated evaluation stack.
#[derive(Clone, Debug, PartialEq)]
pub enum StackValue {
    Immediate { kind: ImmediateKind, text: String },
    ParameterRef(usize),
    /// Refers to the named local, never to the expression bound to it.
    LocalRef(usize),
    StructLiteral {
        type_name: String,
        local: String,
        values: Vec<StackValue>,
    },
    HeapRef(String),
}

impl StackValue {
    pub fn int(value: impl ToString) -> Self {
        StackValue::Immediate {
            kind: ImmediateKind::Int,
            text: value.to_string(),
        }
    }

    pub fn float32(value: f32) -> Self {
        StackValue::Immediate {
            kind: ImmediateKind::Float,
            text: non_finite_literal(value.into())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{:?}f", value)),
        }
    }

    pub fn float64(value: f64) -> Self {
        StackValue::Immediate {
            kind: ImmediateKind::Float,
            text: non_finite_literal(value)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{:?}", value)),
        }
    }

    pub fn string(value: &str) -> Self {
        StackValue::Immediate {
            kind: ImmediateKind::String,
            text: c_string_literal(value),
        }
    }

    /// Expression text for this value; parameters are looked up by index.
    pub fn expression(&self, parameter_names: &[String]) -> String {
        match self {
            StackValue::Immediate { text, .. } => text.clone(),
            StackValue::ParameterRef(i) => parameter_names[*i].clone(),
            StackValue::LocalRef(slot) => local_name(*slot),
            StackValue::StructLiteral { local, .. } => local.clone(),
            StackValue::HeapRef(name) => name.clone(),
        }
    }
}

pub fn local_name(slot: usize) -> String {
    format!("loc_{}", slot)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvaluationStack {
    values: Vec<StackValue>,
}

impl EvaluationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: StackValue) {
        self.values.push(value);
    }

    /// Pops one value. The stream was validated up front, so an empty stack here is a bug.
    pub fn pop(&mut self) -> StackValue {
        self.values
            .pop()
            .expect("evaluation stack underflow in a validated instruction stream")
    }

    /// Pops `n` values, returned in push order.
    pub fn pop_n(&mut self, n: usize) -> Vec<StackValue> {
        assert!(
            n <= self.values.len(),
            "evaluation stack underflow in a validated instruction stream"
        );
        self.values.split_off(self.values.len() - n)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn peek(&self) -> Option<&StackValue> {
        self.values.last()
    }

    pub fn into_values(self) -> Vec<StackValue> {
        self.values
    }
}
