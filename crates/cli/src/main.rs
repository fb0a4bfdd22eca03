use std::process::ExitCode;

fn main() -> ExitCode {
    mabar_cli::run()
}
