#[tokio::main]
async fn main() {
    flashvocab::start_server().await;
}
