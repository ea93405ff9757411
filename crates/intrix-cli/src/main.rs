//! Binary entrypoint for the Intrix CLI.

use std::process;

#[tokio::main]
async fn main() {
    let exit_code = intrix_cli::run().await;
    process::exit(exit_code);
}
