#[tokio::main]
async fn main() -> std::process::ExitCode {
    match mediconnect_lib::run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Fatal: {e}");
            eprintln!("mediconnect: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
