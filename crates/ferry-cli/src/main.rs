//! Binary entrypoint for the Ferry CLI.

#[tokio::main]
async fn main() {
    let exit_code = ferry_cli::run().await;
    std::process::exit(exit_code);
}
