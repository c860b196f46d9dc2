#[tokio::main]
async fn main() {
    if let Err(e) = admission_backend::run().await {
        eprintln!("admission-backend failed: {e}");
        std::process::exit(1);
    }
}
