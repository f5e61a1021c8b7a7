//! Type-graph to packed struct layout.
//!
//! The engine owns every [`StructRecord`] discovered during one generation run. Records
//! live in an arena and are referenced by index; each one moves through
//! `Unwritten -> Writing -> Written` exactly once. Meeting a record that is still
//! `Writing` means the type graph looped back on itself, and that one reference is
//! degraded to an opaque pointer instead of recursing.
//!
//! Definitions are emitted in finishing order, so anything a struct embeds or points
//! at is always defined above it.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::LayoutError;
use crate::types::classify::{ExclusionReason, TypeClass, TypeClassifier, DEFAULT_EXCLUDED_NAMESPACES};
use crate::types::members::FieldRef;
use crate::types::{MetadataProvider, TypeDef, TypeRef};
use crate::utils::{sanitize_identifier, sanitize_type_name, NameTable};

pub mod record;

pub use record::{RecordId, RecordKind, RecordState, StructRecord, OPAQUE_POINTER, PADDING_FIELD};
use record::{render_enum, render_struct};

pub const DEFAULT_RESERVED_SUFFIXES: &[&str] = &["k__BackingField", "value__"];

/// How two distinct types that sanitize to the same name are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Key records by sanitized name; a later type reuses the first one's record.
    #[default]
    Reuse,
    /// Key records by module-qualified identity; colliding names get an ordinal suffix.
    Strict,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutOptions {
    pub collision: CollisionPolicy,
    pub reserved_suffixes: Vec<String>,
    pub excluded_namespaces: Vec<String>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            collision: CollisionPolicy::default(),
            reserved_suffixes: DEFAULT_RESERVED_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            excluded_namespaces: DEFAULT_EXCLUDED_NAMESPACES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Degradation {
    Cycle,
    Empty,
    Excluded(ExclusionReason),
    Array,
    Primitive,
    Unresolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved {
    Record(RecordId),
    Degraded(Degradation),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutStats {
    pub written: usize,
    pub discarded: usize,
    pub degraded: usize,
}

pub struct LayoutEngine {
    options: LayoutOptions,
    classifier: TypeClassifier,
    records: Vec<StructRecord>,
    by_key: HashMap<String, RecordId>,
    names: NameTable,
    merged: HashSet<String>,
    written_order: Vec<RecordId>,
    degraded: usize,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutOptions::default())
    }
}

impl LayoutEngine {
    pub fn new(options: LayoutOptions) -> Self {
        let classifier = TypeClassifier::new(options.excluded_namespaces.iter().cloned());
        Self {
            options,
            classifier,
            records: vec![],
            by_key: HashMap::new(),
            names: NameTable::default(),
            merged: HashSet::new(),
            written_order: vec![],
            degraded: 0,
        }
    }

    pub fn classifier(&self) -> &TypeClassifier {
        &self.classifier
    }

    pub fn record(&self, id: RecordId) -> &StructRecord {
        &self.records[id]
    }

    pub fn records(&self) -> &[StructRecord] {
        &self.records
    }

    /// Written records in finishing order.
    pub fn written(&self) -> impl Iterator<Item = &StructRecord> {
        self.written_order.iter().map(|&id| &self.records[id])
    }

    pub fn stats(&self) -> LayoutStats {
        LayoutStats {
            written: self.written_order.len(),
            discarded: self
                .records
                .iter()
                .filter(|r| r.state == RecordState::Discarded)
                .count(),
            degraded: self.degraded,
        }
    }

    /// Every written definition, separated by blank lines.
    pub fn definitions(&self) -> String {
        self.written()
            .filter_map(|r| r.text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn has_reserved_suffix(&self, name: &str) -> bool {
        self.options
            .reserved_suffixes
            .iter()
            .any(|s| name.ends_with(s.as_str()))
    }

    /// Whether an instance field is physically present in the emitted layout.
    pub fn retains(&self, field: &FieldRef) -> bool {
        !field.is_static
            && !field.is_special
            && !field.is_constant
            && !field.is_compiler_generated
            && !self.has_reserved_suffix(&field.name)
    }

    fn key_for(&self, ty: &TypeRef) -> String {
        match self.options.collision {
            CollisionPolicy::Reuse => sanitize_type_name(&ty.name),
            CollisionPolicy::Strict => ty.identity(),
        }
    }

    fn claim_name(&mut self, ty: &TypeRef) -> String {
        self.names.claim(&sanitize_type_name(&ty.name))
    }

    fn degrade(&mut self, ty: &TypeRef, reason: Degradation) -> Resolved {
        self.degraded += 1;
        match reason {
            Degradation::Cycle
            | Degradation::Empty
            | Degradation::Unresolved
            | Degradation::Excluded(ExclusionReason::Generic) => {
                warn!(type_name = %ty, ?reason, "degrading reference to an opaque pointer")
            }
            _ => debug!(type_name = %ty, ?reason, "degrading reference to an opaque pointer"),
        }
        Resolved::Degraded(reason)
    }

    /// Resolves a type into its struct record, writing it (and everything it reaches) on
    /// first sight.
    pub fn resolve_struct<P: MetadataProvider + ?Sized>(
        &mut self,
        provider: &P,
        ty: &TypeRef,
    ) -> Result<Resolved, LayoutError> {
        let def = provider.find_type(ty);
        let kind = match self.classifier.classify(ty, def) {
            TypeClass::Struct => RecordKind::Struct,
            TypeClass::Class => RecordKind::Class,
            TypeClass::Enum => RecordKind::Enum,
            TypeClass::Array => return Ok(self.degrade(ty, Degradation::Array)),
            TypeClass::Primitive(_) => return Ok(self.degrade(ty, Degradation::Primitive)),
            TypeClass::Excluded(r) => return Ok(self.degrade(ty, Degradation::Excluded(r))),
        };
        let Some(def) = def else {
            return Ok(self.degrade(ty, Degradation::Unresolved));
        };

        let key = self.key_for(&def.ty);
        if let Some(&id) = self.by_key.get(&key) {
            let (state, identity) = (self.records[id].state, &self.records[id].identity);
            if *identity != def.ty.identity() && self.merged.insert(def.ty.identity()) {
                warn!(
                    type_name = %def.ty.identity(),
                    existing = %identity,
                    "type shares its sanitized name with another type, reusing the existing record"
                );
            }
            return Ok(match state {
                RecordState::Written => Resolved::Record(id),
                RecordState::Unwritten | RecordState::Writing => {
                    self.degrade(&def.ty, Degradation::Cycle)
                }
                RecordState::Discarded => self.degrade(&def.ty, Degradation::Empty),
            });
        }

        let name = self.claim_name(&def.ty);
        let id = self.records.len();
        let mut record = StructRecord::new(name, def.ty.identity(), kind);
        record.state = RecordState::Writing;
        debug!(type_name = %def.ty, record = %record.name, ?kind, "writing record");
        self.records.push(record);
        self.by_key.insert(key, id);

        match kind {
            RecordKind::Enum => Ok(self.write_enum(id, def)),
            RecordKind::Struct | RecordKind::Class => self.write_struct(provider, id, def),
        }
    }

    fn discard(&mut self, id: RecordId, def: &TypeDef) -> Resolved {
        self.records[id].state = RecordState::Discarded;
        self.degrade(&def.ty, Degradation::Empty)
    }

    fn write_enum(&mut self, id: RecordId, def: &TypeDef) -> Resolved {
        let members: Vec<FieldRef> = def
            .fields
            .iter()
            .filter(|f| f.is_static && !f.is_special && !self.has_reserved_suffix(&f.name))
            .cloned()
            .collect();
        if members.is_empty() {
            return self.discard(id, def);
        }

        let names: Vec<String> = members.iter().map(|f| sanitize_identifier(&f.name)).collect();
        let text = render_enum(&self.records[id], &names);
        self.records[id].finish(members, text);
        self.written_order.push(id);
        Resolved::Record(id)
    }

    fn write_struct<P: MetadataProvider + ?Sized>(
        &mut self,
        provider: &P,
        id: RecordId,
        def: &TypeDef,
    ) -> Result<Resolved, LayoutError> {
        let retained: Vec<FieldRef> = def.fields.iter().filter(|f| self.retains(f)).cloned().collect();
        let Some(first) = retained.first() else {
            return Ok(self.discard(id, def));
        };

        let padding = if self.records[id].kind == RecordKind::Class {
            let annotation =
                first
                    .offset
                    .as_ref()
                    .ok_or_else(|| LayoutError::MissingOffsetAnnotation {
                        type_name: def.ty.type_name(),
                        field: first.name.clone(),
                    })?;
            let bytes = annotation
                .byte_count()
                .ok_or_else(|| LayoutError::InvalidOffset {
                    type_name: def.ty.type_name(),
                    field: first.name.clone(),
                    value: annotation.offset.clone(),
                })?;
            (bytes > 0).then_some(bytes)
        } else {
            None
        };

        let mut lines = Vec::with_capacity(retained.len());
        for f in &retained {
            let spelled = self.spell_type(provider, &f.ty)?;
            lines.push((spelled, sanitize_identifier(&f.name)));
        }

        let text = render_struct(&self.records[id], padding, &lines);
        self.records[id].finish(retained, text);
        self.written_order.push(id);
        Ok(Resolved::Record(id))
    }

    /// Spells a field, parameter or return type: primitives by the table, resolved
    /// records by name (classes as pointers), everything else as an opaque pointer.
    pub fn spell_type<P: MetadataProvider + ?Sized>(
        &mut self,
        provider: &P,
        ty: &TypeRef,
    ) -> Result<String, LayoutError> {
        let def = provider.find_type(ty);
        match self.classifier.classify(ty, def) {
            TypeClass::Primitive(kind) => Ok(kind.spelling().to_string()),
            TypeClass::Array => {
                self.degrade(ty, Degradation::Array);
                Ok(OPAQUE_POINTER.to_string())
            }
            TypeClass::Excluded(reason) => {
                self.degrade(ty, Degradation::Excluded(reason));
                Ok(OPAQUE_POINTER.to_string())
            }
            TypeClass::Struct | TypeClass::Class | TypeClass::Enum => {
                match self.resolve_struct(provider, ty)? {
                    Resolved::Record(id) => Ok(self.records[id].spelling()),
                    Resolved::Degraded(_) => Ok(OPAQUE_POINTER.to_string()),
                }
            }
        }
    }
}
