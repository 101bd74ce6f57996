use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    mark_cli::main_entry().await
}
