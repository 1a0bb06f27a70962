#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rag_chat_lib::init_tracing();
    rag_chat_lib::run().await
}
