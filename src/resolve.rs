//! Loads assemblies with `dotnetdll` and converts them into the [`Metadata`] model.

use std::path::{Path, PathBuf};

use dotnetdll::prelude::*;
use dotnetdll::resolved::attribute::{Attribute, FixedArg, NamedArg};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::error::AssemblyLoadError;
use crate::lower::instructions::{Constructor, Instruction as LowInstruction, Op};
use crate::types::members::{Annotation, FieldRef, MethodRef};
use crate::types::primitive::PrimitiveKind;
use crate::types::{Metadata, TypeDef, TypeRef};
use crate::utils::{decompose_type_source, try_static_res_from_file, ResolutionS};

const OFFSET_ARG: &str = "Offset";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error("type not found in any loaded assembly: {0}")]
    TypeNotFound(String),
}

/// Every assembly found in the input, in load order.
///
/// Attribute decoding resolves types through the set itself, so conversion needs a
/// `'static` borrow; callers leak the loaded set for the run.
pub struct AssemblySet {
    resolutions: Vec<(PathBuf, ResolutionS)>,
}

fn is_assembly_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("dll"))
}

impl AssemblySet {
    /// Loads `path` itself when it is a file, or every `*.dll` directly inside it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssemblyLoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssemblyLoadError::FileNotFound(path.display().to_string()));
        }

        let files = if path.is_dir() {
            let entries = std::fs::read_dir(path)
                .map_err(|e| AssemblyLoadError::Io(format!("{}: {}", path.display(), e)))?;
            let mut files = vec![];
            for entry in entries {
                let entry =
                    entry.map_err(|e| AssemblyLoadError::Io(format!("{}: {}", path.display(), e)))?;
                if is_assembly_file(&entry.path()) {
                    files.push(entry.path());
                }
            }
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };

        if files.is_empty() {
            return Err(AssemblyLoadError::NoAssemblies(path.display().to_string()));
        }

        let mut resolutions = Vec::with_capacity(files.len());
        for f in files {
            let res = try_static_res_from_file(&f)?;
            info!(
                assembly = %f.display(),
                types = res.type_definitions.len(),
                "loaded assembly"
            );
            resolutions.push((f, res));
        }
        Ok(Self { resolutions })
    }

    pub fn resolutions(&self) -> impl Iterator<Item = ResolutionS> + '_ {
        self.resolutions.iter().map(|(_, r)| *r)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.resolutions.iter().map(|(p, _)| p.as_path())
    }

    /// Finds a type definition by its full name across every loaded assembly.
    pub fn find_definition(
        &self,
        full_name: &str,
    ) -> Option<(&'static TypeDefinition<'static>, ResolutionS)> {
        self.resolutions().find_map(|res| {
            res.type_definitions
                .iter()
                .find(|t| t.type_name() == full_name)
                .map(|t| (t, res))
        })
    }

    /// Converts every loaded type definition into the metadata model.
    pub fn build_metadata(&'static self) -> Metadata {
        let mut metadata = Metadata::new();
        for res in self.resolutions() {
            for td in &res.type_definitions {
                metadata.add(self.convert_definition(res, td));
            }
        }
        debug!(types = metadata.len(), "built metadata model");
        metadata
    }

    pub fn convert_definition(
        &'static self,
        res: ResolutionS,
        td: &'static TypeDefinition<'static>,
    ) -> TypeDef {
        let ty = self.definition_ref(res, td);
        let mut def = TypeDef::new(ty.clone());

        for field in &td.fields {
            let mut f = FieldRef::new(&ty, &field.name, self.member_type(res, &field.return_type));
            f.is_static = field.static_member || field.literal;
            f.is_constant = field.literal;
            f.is_special = field.special_name || field.runtime_special_name;
            f.offset = self.annotation(res, &field.attributes, false);
            def.fields.push(f);
        }

        for method in &td.methods {
            def.methods.push(self.convert_method(res, &ty, method));
        }
        def
    }

    fn convert_method(
        &'static self,
        res: ResolutionS,
        declaring: &TypeRef,
        method: &'static Method<'static>,
    ) -> MethodRef {
        let mut m = MethodRef::new(declaring, &method.name);
        m.is_static = !method.signature.instance;

        for (i, Parameter(_, p)) in method.signature.parameters.iter().enumerate() {
            let name = method
                .parameter_metadata
                .get(i)
                .and_then(|meta| meta.as_ref())
                .and_then(|meta| meta.name.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| format!("arg{}", i));
            m = m.param(&name, self.parameter_type(res, p));
        }

        let ReturnType(_, ret) = &method.signature.return_type;
        m.return_type = ret.as_ref().map(|p| self.parameter_type(res, p));
        m.address = self.annotation(res, &method.attributes, true);
        m.body = method.body.as_ref().map(|b| {
            b.instructions
                .iter()
                .enumerate()
                .map(|(offset, i)| LowInstruction::new(offset, self.convert_instruction(res, i)))
                .collect()
        });
        m
    }

    /// Reads the string `Offset` named field from the first attribute carrying one.
    /// Method addresses additionally require the attribute to set exactly two named
    /// fields; named properties are not counted.
    fn annotation(
        &'static self,
        res: ResolutionS,
        attributes: &[Attribute<'static>],
        method: bool,
    ) -> Option<Annotation> {
        for attr in attributes {
            let data = match attr.instantiation_data(self, res) {
                Ok(d) => d,
                Err(e) => {
                    trace!(error = ?e, "could not decode attribute");
                    continue;
                }
            };
            let fields = data
                .named_args
                .iter()
                .filter(|arg| matches!(arg, NamedArg::Field(..)))
                .count();
            if method && fields != 2 {
                continue;
            }
            let offset = data.named_args.iter().find_map(|arg| match arg {
                NamedArg::Field(name, FixedArg::String(Some(s))) if *name == OFFSET_ARG => {
                    Some(s.to_string())
                }
                _ => None,
            });
            if let Some(offset) = offset {
                return Some(Annotation::new(offset));
            }
        }
        None
    }

    fn convert_instruction(&self, res: ResolutionS, instr: &Instruction) -> Op {
        use Instruction::*;
        match instr {
            NoOperation => Op::NoOperation,
            LoadArgument(i) => Op::LoadArgument(*i as usize),
            LoadConstantInt32(i) => Op::LoadConstantInt32(*i),
            LoadConstantInt64(i) => Op::LoadConstantInt64(*i),
            LoadConstantFloat32(f) => Op::LoadConstantFloat32(*f),
            LoadConstantFloat64(f) => Op::LoadConstantFloat64(*f),
            LoadString(cs) => Op::LoadString(String::from_utf16_lossy(cs)),
            StoreLocal(i) => Op::StoreLocal(*i as usize),
            LoadLocal(i) => Op::LoadLocal(*i as usize),
            NewObject(ctor) => Op::NewObject(self.constructor(res, ctor)),
            Call { .. } | CallVirtual { .. } => Op::Call,
            other => Op::Unsupported(format!("{:?}", other)),
        }
    }

    fn constructor(&self, res: ResolutionS, ctor: &UserMethod) -> Constructor {
        match ctor {
            UserMethod::Definition(d) => Constructor {
                declaring: self.definition_ref(res, &res[d.parent_type()]),
                parameter_count: res[*d].signature.parameters.len(),
            },
            UserMethod::Reference(r) => {
                let method_ref = &res[*r];
                let declaring = match &method_ref.parent {
                    MethodReferenceParent::Type(t) => self.method_type(res, t),
                    _ => TypeRef::class(None, &method_ref.name),
                };
                Constructor {
                    declaring,
                    parameter_count: method_ref.signature.parameters.len(),
                }
            }
        }
    }

    fn module_name(res: ResolutionS) -> Option<String> {
        res.assembly.as_ref().map(|a| a.name.to_string())
    }

    fn definition_ref(&self, res: ResolutionS, td: &TypeDefinition<'static>) -> TypeRef {
        let base = td
            .extends
            .as_ref()
            .map(|s| self.user_type_name(res, decompose_type_source(s).0));
        let is_enum = base.as_deref() == Some("System.Enum");
        let is_value = is_enum || base.as_deref() == Some("System.ValueType");

        let mut ty = if is_enum {
            TypeRef::enumeration(td.namespace.as_deref(), &td.name)
        } else if is_value {
            TypeRef::value(td.namespace.as_deref(), &td.name)
        } else {
            TypeRef::class(td.namespace.as_deref(), &td.name)
        };
        if let Some(kind) = PrimitiveKind::from_runtime_name(td.namespace.as_deref(), &td.name) {
            ty = TypeRef::primitive(kind);
        }
        ty.is_generic = !td.generic_parameters.is_empty();
        ty.module = Self::module_name(res);
        ty
    }

    fn user_type_name(&self, res: ResolutionS, ut: UserType) -> String {
        match ut {
            UserType::Definition(d) => res[d].type_name(),
            UserType::Reference(r) => res[r].type_name(),
        }
    }

    /// `value` is `None` when the signature does not say; member-reference parents are
    /// read that way, so the definition is looked up among the loaded assemblies.
    fn user_type(&self, res: ResolutionS, ut: UserType, value: Option<bool>, generic: bool) -> TypeRef {
        let r = match ut {
            UserType::Definition(d) => {
                let mut ty = self.definition_ref(res, &res[d]);
                ty.is_generic |= generic;
                return ty;
            }
            UserType::Reference(r) => &res[r],
        };
        let (namespace, name) = (r.namespace.as_deref(), r.name.as_ref());
        let primitive = PrimitiveKind::from_runtime_name(namespace, name);
        let value = match value {
            Some(v) => v,
            None if primitive.is_some() => false,
            None => match self.find_definition(&r.type_name()) {
                Some((td, def_res)) => {
                    let mut ty = self.definition_ref(def_res, td);
                    ty.is_generic |= generic;
                    return ty;
                }
                None => {
                    debug!(
                        type_name = %r.type_name(),
                        "referenced type is not loaded, treating it as a reference type"
                    );
                    false
                }
            },
        };
        let mut ty = match primitive {
            Some(kind) => TypeRef::primitive(kind),
            None if value => TypeRef::value(namespace, name),
            None => TypeRef::class(namespace, name),
        };
        ty.is_generic = generic;
        ty.module = match &r.scope {
            ResolutionScope::Assembly(a) => Some(res[*a].name.to_string()),
            _ => None,
        };
        ty
    }

    fn base_type<T>(
        &self,
        res: ResolutionS,
        base: &BaseType<T>,
        inner: impl Fn(&T) -> TypeRef,
    ) -> TypeRef {
        let prim = TypeRef::primitive;
        match base {
            BaseType::Type { value_kind, source } => {
                let generic = matches!(source, TypeSource::Generic { .. });
                let ut = match source {
                    TypeSource::User(u) => *u,
                    TypeSource::Generic { base, .. } => *base,
                };
                let value = value_kind
                    .as_ref()
                    .map(|k| matches!(k, ValueKind::ValueType));
                self.user_type(res, ut, value, generic)
            }
            BaseType::Boolean => prim(PrimitiveKind::Bool),
            BaseType::Char => prim(PrimitiveKind::Char),
            BaseType::Int8 => prim(PrimitiveKind::SByte),
            BaseType::UInt8 => prim(PrimitiveKind::Byte),
            BaseType::Int16 => prim(PrimitiveKind::Int16),
            BaseType::UInt16 => prim(PrimitiveKind::UInt16),
            BaseType::Int32 => prim(PrimitiveKind::Int32),
            BaseType::UInt32 => prim(PrimitiveKind::UInt32),
            BaseType::Int64 => prim(PrimitiveKind::Int64),
            BaseType::UInt64 => prim(PrimitiveKind::UInt64),
            BaseType::Float32 => prim(PrimitiveKind::Float),
            BaseType::Float64 => prim(PrimitiveKind::Double),
            BaseType::String => prim(PrimitiveKind::String),
            BaseType::Object => TypeRef::class(Some("System"), "Object"),
            BaseType::IntPtr | BaseType::ValuePointer(_, _) | BaseType::FunctionPointer(_) => {
                TypeRef::value(Some("System"), "IntPtr")
            }
            BaseType::UIntPtr => TypeRef::value(Some("System"), "UIntPtr"),
            BaseType::Vector(_, elem) | BaseType::Array(elem, _) => TypeRef::array_of(&inner(elem)),
        }
    }

    fn member_type(&self, res: ResolutionS, t: &MemberType) -> TypeRef {
        match t {
            MemberType::Base(b) => self.base_type(res, b, |e| self.member_type(res, e)),
            MemberType::TypeGeneric(i) => TypeRef::generic_parameter(&format!("T{}", i)),
        }
    }

    fn method_type(&self, res: ResolutionS, t: &MethodType) -> TypeRef {
        match t {
            MethodType::Base(b) => self.base_type(res, b, |e| self.method_type(res, e)),
            MethodType::TypeGeneric(i) => TypeRef::generic_parameter(&format!("T{}", i)),
            MethodType::MethodGeneric(i) => TypeRef::generic_parameter(&format!("M{}", i)),
        }
    }

    fn parameter_type(&self, res: ResolutionS, p: &ParameterType<MethodType>) -> TypeRef {
        match p {
            ParameterType::Value(t) => self.method_type(res, t),
            ParameterType::Ref(_) | ParameterType::TypedReference => {
                TypeRef::value(Some("System"), "IntPtr")
            }
        }
    }
}

impl Resolver<'static> for AssemblySet {
    type Error = ResolveError;

    fn find_type(
        &self,
        name: &str,
    ) -> Result<(&TypeDefinition<'static>, &Resolution<'static>), Self::Error> {
        // assembly-qualified names carry the assembly after the first comma
        let full_name = name.split(',').next().unwrap_or(name).trim();
        self.find_definition(full_name)
            .map(|(td, res)| (td, res))
            .ok_or_else(|| ResolveError::TypeNotFound(full_name.to_string()))
    }
}
