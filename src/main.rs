use std::process::ExitCode;

fn main() -> ExitCode {
    dumpity_rs::run_cli()
}
