#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_frag_relay::init().await
}
