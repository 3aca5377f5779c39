//! Storefront backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = storefront_backend::run().await {
        eprintln!("fatal: {}", e);
        std::process::exit(1);
    }
}
