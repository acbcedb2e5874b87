use std::process::ExitCode;

fn main() -> ExitCode {
    courseplan_cli::run()
}
