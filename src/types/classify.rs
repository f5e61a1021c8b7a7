use crate::types::primitive::PrimitiveKind;
use crate::types::{TypeDef, TypeRef};

pub const DEFAULT_EXCLUDED_NAMESPACES: &[&str] = &["System", "Microsoft", "Mono"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExclusionReason {
    /// Lives in a platform/runtime namespace rather than the target's own types.
    Platform,
    /// Generic definitions and open generic parameters are not laid out.
    Generic,
    /// A value type with no known fields.
    Opaque,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Primitive(PrimitiveKind),
    Enum,
    Struct,
    Class,
    Array,
    Excluded(ExclusionReason),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeClassifier {
    excluded_namespaces: Vec<String>,
}

impl Default for TypeClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_NAMESPACES.iter().map(|s| s.to_string()))
    }
}

impl TypeClassifier {
    pub fn new(excluded_namespaces: impl IntoIterator<Item = String>) -> Self {
        Self {
            excluded_namespaces: excluded_namespaces.into_iter().collect(),
        }
    }

    pub fn is_platform(&self, ty: &TypeRef) -> bool {
        let Some(ns) = ty.namespace.as_deref() else {
            return false;
        };
        self.excluded_namespaces.iter().any(|ex| {
            ns == ex
                || ns
                    .strip_prefix(ex.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// Classifies a type. When the definition is known its flags win over the reference's.
    pub fn classify(&self, ty: &TypeRef, def: Option<&TypeDef>) -> TypeClass {
        let view = def.map(|d| &d.ty).unwrap_or(ty);

        if let Some(kind) = view.primitive {
            return TypeClass::Primitive(kind);
        }
        if view.is_array || ty.is_array {
            return TypeClass::Array;
        }
        if view.is_generic || ty.is_generic {
            return TypeClass::Excluded(ExclusionReason::Generic);
        }
        if self.is_platform(view) {
            return TypeClass::Excluded(ExclusionReason::Platform);
        }
        if view.is_enum {
            return TypeClass::Enum;
        }
        if view.is_value_type {
            return match def {
                Some(d) if !d.fields.is_empty() => TypeClass::Struct,
                _ => TypeClass::Excluded(ExclusionReason::Opaque),
            };
        }
        TypeClass::Class
    }
}
