//! 그리드 봇 실행 바이너리.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use grid_bot::{BotContext, BotRunner, Settings};
use grid_core::TickTable;
use grid_data::LedgerStore;
use grid_exchange::{DryRunExchange, ExchangeClient, UpbitCredentials, UpbitExchange};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env();
    settings.validate()?;

    info!(
        market = %settings.market,
        total_krw = settings.total_krw,
        slices = settings.slices,
        slice_krw = settings.slice_krw(),
        buy_step_pct = %settings.buy_step_pct,
        sell_tp_pct = %settings.sell_tp_pct,
        poll_sec = settings.poll_sec,
        "그리드 봇 기동"
    );

    let store = LedgerStore::connect(&settings.db_url).await?;
    store.init().await?;
    store.ensure_state().await?;

    let exchange: Arc<dyn ExchangeClient> = if settings.dry_run {
        info!("dry-run 모드: 주문은 로컬에서 합성됨");
        Arc::new(DryRunExchange::new())
    } else {
        warn!("실거래 모드: 실제 주문이 제출됨");
        Arc::new(UpbitExchange::new(UpbitCredentials::new(
            settings.upbit_access_key.clone(),
            settings.upbit_secret_key.clone(),
        )))
    };

    let ctx = BotContext {
        settings,
        store,
        exchange,
        ticks: TickTable::krw(),
    };

    BotRunner::new(ctx).run().await?;
    Ok(())
}
