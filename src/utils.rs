use crate::error::AssemblyLoadError;
use dotnetdll::prelude::*;
use std::{
    collections::{HashMap, HashSet},
    io::Read,
    path::Path,
};

pub type ResolutionS = &'static Resolution<'static>;

/// Reads and parses one assembly, leaking the buffer so the resolution can borrow it for the run.
pub fn try_static_res_from_file(path: impl AsRef<Path>) -> Result<ResolutionS, AssemblyLoadError> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AssemblyLoadError::FileNotFound(path.display().to_string()),
        _ => AssemblyLoadError::Io(format!("{}: {}", path.display(), e)),
    })?;
    let mut buf = vec![];
    file.read_to_end(&mut buf)
        .map_err(|e| AssemblyLoadError::Io(format!("{}: {}", path.display(), e)))?;
    let resolution = Resolution::parse(Box::leak(buf.into_boxed_slice()), ReadOptions::default())
        .map_err(|e| AssemblyLoadError::InvalidFormat(format!("{}: {:?}", path.display(), e)))?;
    Ok(Box::leak(Box::new(resolution)))
}

pub fn decompose_type_source<T: Clone>(t: &TypeSource<T>) -> (UserType, Vec<T>) {
    let mut type_generics: &[T] = &[];
    let ut = match t {
        TypeSource::User(u) => *u,
        TypeSource::Generic { base, parameters } => {
            type_generics = parameters.as_slice();
            *base
        }
    };
    (ut, type_generics.to_vec())
}

const C_RESERVED: &[&str] = &[
    "auto", "register", "signed", "unsigned", "union", "typedef", "restrict", "inline",
    "_Bool", "_Complex", "_Imaginary", "int", "char", "long", "short", "float",
    "double", "void", "struct", "enum", "extern", "static", "const", "volatile", "sizeof",
];

/// Replaces everything outside `[A-Za-z0-9_]` with `_`.
fn replace_invalid(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Struct/record name for a type: arity markers dropped, brackets and separators replaced.
pub fn sanitize_type_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '`' {
            while chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                chars.next();
            }
            continue;
        }
        out.push(c);
    }
    sanitize_identifier(&out)
}

/// Field, parameter and hook names.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out = replace_invalid(name);
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if C_RESERVED.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

/// Escapes text for a C string literal, quotes included.
pub fn c_string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Hands out identifiers that are unique within one generated namespace. Repeated
/// bases get `_1`, `_2`, ... suffixes, skipping any suffixed form already issued.
#[derive(Debug, Default)]
pub struct NameTable {
    ordinals: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl NameTable {
    pub fn claim(&mut self, base: &str) -> String {
        let next = self.ordinals.entry(base.to_string()).or_insert(0);
        loop {
            let name = match *next {
                0 => base.to_string(),
                n => format!("{}_{}", base, n),
            };
            *next += 1;
            if self.issued.insert(name.clone()) {
                return name;
            }
        }
    }
}
