use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};

use crate::types::members::{FieldRef, MethodRef};
use crate::types::primitive::PrimitiveKind;

pub mod classify;
pub mod members;
pub mod primitive;

/// Read-only view of a type as seen from a field, parameter or declaring position.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub namespace: Option<String>,
    pub name: String,
    /// Assembly the type originates from, when known.
    pub module: Option<String>,
    pub primitive: Option<PrimitiveKind>,
    pub is_value_type: bool,
    pub is_enum: bool,
    pub is_array: bool,
    pub is_generic: bool,
}

impl TypeRef {
    fn bare(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.filter(|n| !n.is_empty()).map(str::to_string),
            name: name.to_string(),
            module: None,
            primitive: None,
            is_value_type: false,
            is_enum: false,
            is_array: false,
            is_generic: false,
        }
    }

    pub fn class(namespace: Option<&str>, name: &str) -> Self {
        Self::bare(namespace, name)
    }

    pub fn value(namespace: Option<&str>, name: &str) -> Self {
        Self {
            is_value_type: true,
            ..Self::bare(namespace, name)
        }
    }

    pub fn enumeration(namespace: Option<&str>, name: &str) -> Self {
        Self {
            is_value_type: true,
            is_enum: true,
            ..Self::bare(namespace, name)
        }
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self {
            primitive: Some(kind),
            is_value_type: kind != PrimitiveKind::String,
            ..Self::bare(Some("System"), kind.runtime_name())
        }
    }

    pub fn array_of(element: &TypeRef) -> Self {
        Self {
            is_array: true,
            module: element.module.clone(),
            ..Self::bare(element.namespace.as_deref(), &format!("{}[]", element.name))
        }
    }

    pub fn generic_parameter(name: &str) -> Self {
        Self {
            is_generic: true,
            ..Self::bare(None, name)
        }
    }

    pub fn in_module(mut self, module: &str) -> Self {
        self.module = Some(module.to_string());
        self
    }

    pub fn generic(mut self) -> Self {
        self.is_generic = true;
        self
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive.is_some()
    }

    pub fn type_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }

    /// Fully qualified name plus originating module; the strongest identity the model carries.
    pub fn identity(&self) -> String {
        match &self.module {
            Some(m) => format!("[{}]{}", m, self.type_name()),
            None => self.type_name(),
        }
    }
}

impl Debug for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identity())
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A type whose members are known to the metadata model.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDef {
    pub ty: TypeRef,
    pub fields: Vec<FieldRef>,
    pub methods: Vec<MethodRef>,
}

impl TypeDef {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            fields: vec![],
            methods: vec![],
        }
    }

    pub fn with_field(mut self, field: FieldRef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodRef) -> Self {
        self.methods.push(method);
        self
    }
}

/// Source of type definitions consumed by the generators.
pub trait MetadataProvider {
    /// Every type definition, in discovery order.
    fn types(&self) -> &[TypeDef];

    /// Finds the definition a reference points at, if the provider knows it.
    fn find_type(&self, ty: &TypeRef) -> Option<&TypeDef>;
}

/// In-memory metadata model, indexed by qualified name.
#[derive(Clone, Debug, Default)]
pub struct Metadata {
    types: Vec<TypeDef>,
    by_name: HashMap<String, Vec<usize>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, def: TypeDef) -> &mut Self {
        self.by_name
            .entry(def.ty.type_name())
            .or_default()
            .push(self.types.len());
        self.types.push(def);
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<TypeDef> for Metadata {
    fn from_iter<I: IntoIterator<Item = TypeDef>>(iter: I) -> Self {
        let mut m = Metadata::new();
        for def in iter {
            m.add(def);
        }
        m
    }
}

impl MetadataProvider for Metadata {
    fn types(&self) -> &[TypeDef] {
        &self.types
    }

    fn find_type(&self, ty: &TypeRef) -> Option<&TypeDef> {
        let candidates = self.by_name.get(&ty.type_name())?;
        // a reference naming its module must match it; otherwise take the first definition
        let exact = candidates
            .iter()
            .map(|&i| &self.types[i])
            .find(|d| ty.module.is_some() && d.ty.module == ty.module);
        exact.or_else(|| {
            candidates
                .first()
                .map(|&i| &self.types[i])
                .filter(|d| ty.module.is_none() || d.ty.module.is_none() || candidates.len() == 1)
        })
    }
}
