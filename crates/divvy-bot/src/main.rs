use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    divvy_bot::run().await
}
