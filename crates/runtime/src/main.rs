use anyhow::Context;

use tania_infra::TaniaConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tania_observability::init();

    let config = TaniaConfig::from_env().context("invalid TANIA_* configuration")?;
    tania_runtime::run(config).await
}
