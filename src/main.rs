use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    lumabot_dashboard::run().await
}
