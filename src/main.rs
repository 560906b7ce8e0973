#[tokio::main]
async fn main() {
    if let Err(e) = pharmacall_lib::run().await {
        eprintln!("pharmacall: {e}");
        std::process::exit(1);
    }
}
