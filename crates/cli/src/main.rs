use std::process::ExitCode;

fn main() -> ExitCode {
    mailquote_cli::run()
}
