use clap::Parser;
use dumpity_rs::hooks::HookEmitter;
use dumpity_rs::layout::{LayoutEngine, Resolved};
use dumpity_rs::lower::lower_method;
use dumpity_rs::resolve::AssemblySet;
use dumpity_rs::types::{MetadataProvider, TypeDef};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Dump the layout, hooks and lowered bodies generated for a specified type"
)]
struct Args {
    /// A DLL, or a directory of DLLs, to search in
    assembly: PathBuf,
    /// The full name of the type to dump (e.g. Game.Player)
    type_name: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let assemblies = match AssemblySet::load(&args.assembly) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let assemblies: &'static AssemblySet = Box::leak(Box::new(assemblies));
    for path in assemblies.paths() {
        eprintln!("Assembly: {}", path.display());
    }

    let metadata = assemblies.build_metadata();
    let Some(def) = metadata
        .types()
        .iter()
        .find(|d| d.ty.type_name() == args.type_name)
    else {
        eprintln!("Type '{}' not found", args.type_name);
        println!("\nAvailable types:");
        for d in metadata.types() {
            println!("  {}", d.ty.type_name());
        }
        return ExitCode::FAILURE;
    };

    print_type_info(&metadata, def);
    ExitCode::SUCCESS
}

fn print_type_info(metadata: &impl MetadataProvider, def: &TypeDef) {
    let mut layout = LayoutEngine::default();

    println!("Type: {:?} ({:?})", def.ty, layout.classifier().classify(&def.ty, Some(def)));

    println!("\nFields:");
    for field in &def.fields {
        let kept = if layout.retains(field) { "kept" } else { "dropped" };
        let offset = field.offset.as_ref().map(|a| a.offset.as_str()).unwrap_or("-");
        println!(
            "  - {}: {} [{}] offset {} {:?}",
            field.name,
            field.ty,
            kept,
            offset,
            layout.classifier().classify(&field.ty, metadata.find_type(&field.ty))
        );
    }

    println!("\nLayout:");
    match layout.resolve_struct(metadata, &def.ty) {
        Ok(Resolved::Record(_)) => print!("{}", layout.definitions()),
        Ok(Resolved::Degraded(reason)) => println!("  (degraded: {:?})", reason),
        Err(e) => println!("  (error: {})", e),
    }

    println!("\nHooks:");
    let mut hooks = HookEmitter::new();
    for method in &def.methods {
        match hooks.emit(&mut layout, metadata, method) {
            Ok(Some(hook)) => print!("{}", hook.body),
            Ok(None) => {}
            Err(e) => println!("  {}: (error: {})", method.name, e),
        }
    }
    if hooks.is_empty() {
        println!("  (none)");
    }

    println!("\nMethods:");
    for method in &def.methods {
        println!("  - {:?}", method);
        match lower_method(method) {
            Ok(Some(lowered)) => {
                for line in lowered.render().lines() {
                    println!("    {}", line);
                }
            }
            Ok(None) => println!("    (No body)"),
            Err(e) => println!("    (not lowered: {})", e),
        }
    }
}
