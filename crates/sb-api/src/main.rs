#[tokio::main]
async fn main() {
    if let Err(err) = sb_api::run().await {
        tracing::error!(error = %err, "sb-api failed");
        std::process::exit(1);
    }
}
