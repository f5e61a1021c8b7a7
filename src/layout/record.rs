use crate::types::members::FieldRef;

pub type RecordId = usize;

pub const OPAQUE_POINTER: &str = "void*";
pub const PADDING_FIELD: &str = "_unused_data_useless";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Struct,
    Class,
    Enum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordState {
    Unwritten,
    Writing,
    Written,
    /// No fields survived filtering; never emitted or referenced.
    Discarded,
}

/// One emitted struct, class or enum definition.
#[derive(Clone, Debug, PartialEq)]
pub struct StructRecord {
    pub name: String,
    pub identity: String,
    pub kind: RecordKind,
    pub fields: Vec<FieldRef>,
    pub state: RecordState,
    text: Option<String>,
}

impl StructRecord {
    pub(crate) fn new(name: String, identity: String, kind: RecordKind) -> Self {
        Self {
            name,
            identity,
            kind,
            fields: vec![],
            state: RecordState::Unwritten,
            text: None,
        }
    }

    /// How a field or parameter of this record's type is spelled.
    pub fn spelling(&self) -> String {
        match self.kind {
            RecordKind::Class => format!("{}*", self.name),
            RecordKind::Struct | RecordKind::Enum => self.name.clone(),
        }
    }

    /// The emitted definition, present once the record is `Written`.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub(crate) fn finish(&mut self, fields: Vec<FieldRef>, text: String) {
        self.fields = fields;
        self.text = Some(text);
        self.state = RecordState::Written;
    }
}

/// Renders a struct or class body from already spelled `(type, name)` lines.
pub(crate) fn render_struct(
    record: &StructRecord,
    padding: Option<usize>,
    lines: &[(String, String)],
) -> String {
    let mut out = String::new();
    if record.kind == RecordKind::Class {
        out.push_str(&format!("struct {};\n", record.name));
    }
    out.push_str("typedef struct __attribute__((__packed__)) {\n");
    if let Some(n) = padding {
        out.push_str(&format!("\tchar {}[{}];\n", PADDING_FIELD, n));
    }
    for (ty, name) in lines {
        out.push_str(&format!("\t{} {};\n", ty, name));
    }
    out.push_str(&format!("}} {};\n", record.name));
    out
}

pub(crate) fn render_enum(record: &StructRecord, members: &[String]) -> String {
    let mut out = String::from("typedef enum {\n");
    for (i, m) in members.iter().enumerate() {
        let sep = if i + 1 == members.len() { "" } else { "," };
        out.push_str(&format!("\t{}_{}{}\n", record.name, m, sep));
    }
    out.push_str(&format!("}} {};\n", record.name));
    out
}
