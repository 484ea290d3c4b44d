//! MediConnect pharmacy API server.
//!
//! Environment variables are documented on `mediconnect_lib::config`.

#[tokio::main]
async fn main() -> Result<(), mediconnect_lib::error::StartupError> {
    mediconnect_lib::run().await
}
