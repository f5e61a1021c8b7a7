/// The closed set of primitive kinds the generators spell directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Bool,
    SByte,
    Byte,
    Char,
    Int16,
    Int32,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    String,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 13] = [
        PrimitiveKind::Bool,
        PrimitiveKind::SByte,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Int16,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::UInt16,
        PrimitiveKind::UInt32,
        PrimitiveKind::UInt64,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::String,
    ];

    /// Target-language spelling of this kind.
    pub fn spelling(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::SByte => "int8_t",
            PrimitiveKind::Byte => "uint8_t",
            PrimitiveKind::Char => "char16_t",
            PrimitiveKind::Int16 => "int16_t",
            PrimitiveKind::Int32 => "int",
            PrimitiveKind::Int64 => "int64_t",
            PrimitiveKind::UInt16 => "uint16_t",
            PrimitiveKind::UInt32 => "uint32_t",
            PrimitiveKind::UInt64 => "uint64_t",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::String => "Il2CppString*",
        }
    }

    pub fn from_spelling(spelling: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.spelling() == spelling)
    }

    /// Simple name of the runtime type backing this kind; the namespace is always `System`.
    pub fn runtime_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "Boolean",
            PrimitiveKind::SByte => "SByte",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::Int16 => "Int16",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::UInt16 => "UInt16",
            PrimitiveKind::UInt32 => "UInt32",
            PrimitiveKind::UInt64 => "UInt64",
            PrimitiveKind::Float => "Single",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::String => "String",
        }
    }

    pub fn from_runtime_name(namespace: Option<&str>, name: &str) -> Option<Self> {
        if namespace != Some("System") {
            return None;
        }
        Self::ALL.into_iter().find(|k| k.runtime_name() == name)
    }
}
