use crate::lower::instructions::Instruction;
use crate::types::TypeRef;
use std::fmt::{Debug, Formatter};

/// Externally supplied offset annotation, resolved once when the provider builds its view.
///
/// On fields the offset is a byte offset into the object; on methods it is the
/// code address the hook is installed at. The text is kept verbatim for emission.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Annotation {
    pub offset: String,
}

impl Annotation {
    pub fn new(offset: impl Into<String>) -> Self {
        Self {
            offset: offset.into(),
        }
    }

    /// Parses the offset as `0x`-prefixed hex or plain decimal.
    pub fn byte_count(&self) -> Option<usize> {
        let text = self.offset.trim();
        match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => usize::from_str_radix(hex, 16).ok(),
            None => text.parse().ok(),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct FieldRef {
    pub owner: TypeRef,
    pub name: String,
    pub ty: TypeRef,
    pub is_static: bool,
    /// Runtime-special fields such as an enum's `value__`.
    pub is_special: bool,
    pub is_constant: bool,
    pub is_compiler_generated: bool,
    pub offset: Option<Annotation>,
}

impl FieldRef {
    pub fn new(owner: &TypeRef, name: &str, ty: TypeRef) -> Self {
        Self {
            owner: owner.clone(),
            name: name.to_string(),
            is_compiler_generated: name.starts_with('<'),
            ty,
            is_static: false,
            is_special: false,
            is_constant: false,
            offset: None,
        }
    }

    pub fn at(mut self, offset: &str) -> Self {
        self.offset = Some(Annotation::new(offset));
        self
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn constant(mut self) -> Self {
        self.is_static = true;
        self.is_constant = true;
        self
    }

    pub fn special(mut self) -> Self {
        self.is_special = true;
        self
    }
}

impl Debug for FieldRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_static {
            write!(f, "static ")?;
        }
        write!(f, "{} {}::{}", self.ty, self.owner, self.name)?;
        if let Some(a) = &self.offset {
            write!(f, " @ {}", a.offset)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
}

impl Parameter {
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct MethodRef {
    pub declaring: TypeRef,
    pub name: String,
    /// `None` for `void`.
    pub return_type: Option<TypeRef>,
    pub parameters: Vec<Parameter>,
    pub is_static: bool,
    pub is_constructor: bool,
    pub address: Option<Annotation>,
    pub body: Option<Vec<Instruction>>,
}

impl MethodRef {
    pub fn new(declaring: &TypeRef, name: &str) -> Self {
        Self {
            declaring: declaring.clone(),
            name: name.to_string(),
            return_type: None,
            parameters: vec![],
            is_static: false,
            is_constructor: matches!(name, ".ctor" | ".cctor"),
            address: None,
            body: None,
        }
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn param(mut self, name: &str, ty: TypeRef) -> Self {
        self.parameters.push(Parameter::new(name, ty));
        self
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn at(mut self, offset: &str) -> Self {
        self.address = Some(Annotation::new(offset));
        self
    }

    pub fn with_body(mut self, body: Vec<Instruction>) -> Self {
        self.body = Some(body);
        self
    }
}

impl Debug for MethodRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_static {
            write!(f, "static ")?;
        }
        match &self.return_type {
            Some(t) => write!(f, "{} ", t)?,
            None => write!(f, "void ")?,
        }
        write!(f, "{}::{}(", self.declaring, self.name)?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", p.ty, p.name)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_byte_count() {
        assert_eq!(Annotation::new("0x10").byte_count(), Some(16));
        assert_eq!(Annotation::new("0X1A").byte_count(), Some(26));
        assert_eq!(Annotation::new("24").byte_count(), Some(24));
        assert_eq!(Annotation::new("0xZZ").byte_count(), None);
        assert_eq!(Annotation::new("").byte_count(), None);
    }

    #[test]
    fn test_backing_fields_are_compiler_generated() {
        let owner = TypeRef::class(None, "Player");
        let f = FieldRef::new(&owner, "<Health>k__BackingField", TypeRef::class(None, "X"));
        assert!(f.is_compiler_generated);
        assert!(!FieldRef::new(&owner, "health", TypeRef::class(None, "X")).is_compiler_generated);
    }

    #[test]
    fn test_constructor_detection() {
        let owner = TypeRef::class(None, "Player");
        assert!(MethodRef::new(&owner, ".ctor").is_constructor);
        assert!(MethodRef::new(&owner, ".cctor").is_constructor);
        assert!(!MethodRef::new(&owner, "Update").is_constructor);
    }
}
