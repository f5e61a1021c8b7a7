//! Drives one generation run: discovers hooks and structs, then writes the header,
//! the hook source and optionally the lowered method bodies.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::error::GenerateError;
use crate::hooks::HookEmitter;
use crate::layout::{LayoutEngine, LayoutOptions};
use crate::lower::{lower_method, LoweredMethod};
use crate::types::classify::{ExclusionReason, TypeClass};
use crate::types::MetadataProvider;

pub const DEFAULT_SOURCE_NAME: &str = "hooks.c";

const SOURCE_PREAMBLE: &str = "#include <android/log.h>
#include <stdio.h>
#include <stdlib.h>
#include <string.h>
#include <sys/stat.h>
#include <fcntl.h>
#include <unistd.h>
#include <dirent.h>
#include <linux/limits.h>
#include <sys/sendfile.h>

#include \"../beatsaber-hook/shared/inline-hook/inlineHook.h\"
#include \"../beatsaber-hook/shared/utils/utils.h\"
";

/// `hooks.c` -> `hooks.h`; names without a `.c` extension get `.h` appended.
pub fn header_name_for(source_name: &str) -> String {
    match source_name.strip_suffix(".c") {
        Some(stem) => format!("{}.h", stem),
        None => format!("{}.h", source_name),
    }
}

/// `hooks.h` -> `HOOKS_H`; a leading digit gets an underscore in front.
fn include_guard(header_name: &str) -> String {
    let guard: String = header_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if guard.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", guard)
    } else {
        guard
    }
}

/// Which outputs a run produces. The hook flags are coupled: turning hook creation
/// off also turns installation off, turning installation on brings creation back,
/// and header-only mode turns both off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerateConfig {
    source_name: String,
    header_name: String,
    dump_structs: bool,
    dump_hook_creation: bool,
    dump_hook_installation: bool,
    only_make_header: bool,
    /// File receiving lowered method bodies, if any.
    pub lowered_name: Option<String>,
    pub layout: LayoutOptions,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_NAME)
    }
}

impl GenerateConfig {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            header_name: header_name_for(source_name),
            dump_structs: true,
            dump_hook_creation: true,
            dump_hook_installation: true,
            only_make_header: false,
            lowered_name: None,
            layout: LayoutOptions::default(),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn dump_structs(&self) -> bool {
        self.dump_structs
    }

    pub fn dump_hook_creation(&self) -> bool {
        self.dump_hook_creation
    }

    pub fn dump_hook_installation(&self) -> bool {
        self.dump_hook_installation
    }

    pub fn only_make_header(&self) -> bool {
        self.only_make_header
    }

    pub fn set_dump_structs(&mut self, value: bool) -> &mut Self {
        self.dump_structs = value;
        self
    }

    pub fn set_dump_hook_creation(&mut self, value: bool) -> &mut Self {
        self.dump_hook_creation = value;
        if value {
            self.only_make_header = false;
        } else {
            self.dump_hook_installation = false;
        }
        self
    }

    pub fn set_dump_hook_installation(&mut self, value: bool) -> &mut Self {
        self.dump_hook_installation = value;
        if value {
            self.only_make_header = false;
            self.dump_hook_creation = true;
        }
        self
    }

    pub fn set_only_make_header(&mut self, value: bool) -> &mut Self {
        self.only_make_header = value;
        if value {
            self.dump_hook_creation = false;
            self.dump_hook_installation = false;
        }
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    pub types_scanned: usize,
    pub structs_written: usize,
    pub structs_discarded: usize,
    pub degraded_references: usize,
    pub hooks_emitted: usize,
    pub methods_lowered: usize,
}

pub struct Generator<'p, P: MetadataProvider + ?Sized> {
    provider: &'p P,
    config: GenerateConfig,
    layout: LayoutEngine,
    hooks: HookEmitter,
    lowered: Vec<(String, LoweredMethod)>,
    types_scanned: usize,
    collected: bool,
}

impl<'p, P: MetadataProvider + ?Sized> Generator<'p, P> {
    pub fn new(provider: &'p P, config: GenerateConfig) -> Self {
        let layout = LayoutEngine::new(config.layout.clone());
        Self {
            provider,
            config,
            layout,
            hooks: HookEmitter::new(),
            lowered: vec![],
            types_scanned: 0,
            collected: false,
        }
    }

    pub fn config(&self) -> &GenerateConfig {
        &self.config
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn hooks(&self) -> &HookEmitter {
        &self.hooks
    }

    pub fn lowered(&self) -> &[(String, LoweredMethod)] {
        &self.lowered
    }

    /// Walks every non-generic type outside the platform namespaces once, emitting hooks
    /// (and through them every struct the hooks reach) in discovery order. Calling it
    /// again is a no-op.
    pub fn collect(&mut self) -> Result<(), GenerateError> {
        if self.collected {
            return Ok(());
        }
        let provider = self.provider;
        for def in provider.types() {
            if let TypeClass::Excluded(ExclusionReason::Platform | ExclusionReason::Generic) =
                self.layout.classifier().classify(&def.ty, Some(def))
            {
                continue;
            }
            self.types_scanned += 1;

            for method in &def.methods {
                self.hooks.emit(&mut self.layout, provider, method)?;
            }

            if self.config.lowered_name.is_none() {
                continue;
            }
            for method in &def.methods {
                match lower_method(method) {
                    Ok(Some(lowered)) => self
                        .lowered
                        .push((format!("{}::{}", def.ty, method.name), lowered)),
                    Ok(None) => {}
                    Err(e) => warn!(
                        method = ?method,
                        error = %e,
                        "skipping method body outside the lowering subset"
                    ),
                }
            }
        }
        self.collected = true;
        Ok(())
    }

    pub fn summary(&self) -> GenerateSummary {
        let stats = self.layout.stats();
        GenerateSummary {
            types_scanned: self.types_scanned,
            structs_written: stats.written,
            structs_discarded: stats.discarded,
            degraded_references: stats.degraded,
            hooks_emitted: self.hooks.len(),
            methods_lowered: self.lowered.len(),
        }
    }


    pub fn write_header(&self, w: &mut impl Write) -> Result<(), GenerateError> {
        let guard = include_guard(&self.config.header_name);
        writeln!(w, "#ifndef {}", guard)?;
        writeln!(w, "#define {}", guard)?;
        writeln!(w)?;
        writeln!(w, "#include <stdbool.h>")?;
        writeln!(w, "#include <stdint.h>")?;
        writeln!(w, "#include <uchar.h>")?;
        writeln!(w)?;
        if self.config.dump_structs {
            for record in self.layout.written() {
                if let Some(text) = record.text() {
                    writeln!(w, "{}", text)?;
                }
            }
        }
        writeln!(w, "#endif")?;
        Ok(())
    }

    pub fn write_source(&self, w: &mut impl Write) -> Result<(), GenerateError> {
        write!(w, "{}", SOURCE_PREAMBLE)?;
        writeln!(w, "#include \"{}\"", self.config.header_name)?;
        writeln!(w)?;
        if self.config.dump_hook_creation {
            for hook in self.hooks.hooks() {
                writeln!(w, "{}", hook.body)?;
            }
        }
        if self.config.dump_hook_installation {
            write!(w, "{}", self.hooks.install_routine())?;
        }
        Ok(())
    }

    pub fn write_lowered(&self, w: &mut impl Write) -> Result<(), GenerateError> {
        writeln!(w, "#include \"{}\"", self.config.header_name)?;
        for (name, lowered) in &self.lowered {
            writeln!(w)?;
            writeln!(w, "// {}", name)?;
            write!(w, "{}", lowered.render())?;
        }
        Ok(())
    }

    /// Collects, then writes every enabled output into `dir`.
    pub fn write_to_dir(
        &mut self,
        dir: impl AsRef<Path>,
    ) -> Result<GenerateSummary, GenerateError> {
        self.collect()?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut header = BufWriter::new(File::create(dir.join(&self.config.header_name))?);
        self.write_header(&mut header)?;
        header.flush()?;

        if !self.config.only_make_header {
            let mut source = BufWriter::new(File::create(dir.join(&self.config.source_name))?);
            self.write_source(&mut source)?;
            source.flush()?;
        }

        if let Some(name) = &self.config.lowered_name {
            let mut lowered = BufWriter::new(File::create(dir.join(name))?);
            self.write_lowered(&mut lowered)?;
            lowered.flush()?;
        }

        let summary = self.summary();
        info!(
            types = summary.types_scanned,
            structs = summary.structs_written,
            discarded = summary.structs_discarded,
            degraded = summary.degraded_references,
            hooks = summary.hooks_emitted,
            lowered = summary.methods_lowered,
            output = %dir.display(),
            "generation complete"
        );
        Ok(summary)
    }
}
