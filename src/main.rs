#[tokio::main]
async fn main() {
    if let Err(e) = praanacare_lib::run().await {
        eprintln!("praanacare: {e}");
        std::process::exit(1);
    }
}
