use std::process::ExitCode;

fn main() -> ExitCode {
    scmscan::app::startup::run()
}
