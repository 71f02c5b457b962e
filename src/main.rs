#[tokio::main]
async fn main() -> anyhow::Result<()> {
    goaltimer_lib::run().await
}
