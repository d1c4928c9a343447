//! Binary entrypoint for the weather plugin.

use std::io::{self, BufReader};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin = io::stdin();
    let reader = BufReader::new(stdin.lock());
    let stdout = io::stdout();
    let writer = stdout.lock();
    courier_plugin_weather::run(
        std::env::args_os(),
        reader,
        writer,
        &mut io::stderr().lock(),
    )
}
