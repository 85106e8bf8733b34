//! fxsync CLI.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use fxsync_core::{format_timestamp, init_logging, operations, AuditStatus, Instrument, LogConfig};
use fxsync_data::{CandleRepository, CandleStore};
use fxsync_exchange::OandaClient;
use tokio_util::sync::CancellationToken;

use fxsync_collector::{
    run_tick, shutdown_signal, CollectorConfig, CollectorError, Daemon, Result, SyncScheduler,
    SyncStatusBoard,
};

#[derive(Parser)]
#[command(name = "fxsync")]
#[command(about = "OANDA FX candle synchronizer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 데몬 모드: 계좌 확인 후 매 정시 동기화 (SIGINT/SIGTERM으로 종료)
    Daemon,

    /// 즉시 한 번 동기화
    SyncOnce {
        /// 특정 상품만 동기화 (쉼표로 구분, 예: "EUR_USD,USD_JPY")
        #[arg(long)]
        instruments: Option<String>,

        /// 주말/동기화 주기 검사 생략
        #[arg(long)]
        force: bool,
    },

    /// 상품별 마지막 저장 시각과 캔들 수 출력
    Status,

    /// 최근 감사 기록 출력
    Audit {
        /// 출력할 기록 수
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 로깅 초기화
    let log_config = LogConfig::from_env(&format!(
        "fxsync={0},fxsync_collector={0},fxsync_exchange={0},fxsync_data={0}",
        cli.log_level
    ));
    if let Err(e) = init_logging(log_config) {
        eprintln!("로깅 초기화 실패: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!("FxSync 시작");

    match run(cli.command).await {
        Ok(()) => {
            tracing::info!("FxSync 종료");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "치명적 오류로 종료");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    let config = CollectorConfig::from_env()?;
    tracing::debug!(config = ?config, "설정 로드 완료");

    match command {
        Commands::Daemon => run_daemon(config).await,
        Commands::SyncOnce { instruments, force } => sync_once(config, instruments, force).await,
        Commands::Status => print_status(config).await,
        Commands::Audit { limit } => print_audit(config, limit).await,
    }
}

/// 클라이언트, 저장소, 스케줄러 구성
async fn build_scheduler(
    config: &CollectorConfig,
) -> Result<(Arc<OandaClient>, Arc<CandleStore>, Arc<SyncScheduler>)> {
    let client = Arc::new(OandaClient::new(config.oanda.clone())?);
    let store = Arc::new(CandleStore::connect(&config.store).await?);
    tracing::info!(path = %config.store.database_path.display(), "데이터베이스 연결 성공");

    let scheduler = Arc::new(SyncScheduler::new(
        client.clone(),
        store.clone(),
        Arc::new(SyncStatusBoard::new()),
        config.scheduler.clone(),
    ));
    Ok((client, store, scheduler))
}

async fn run_daemon(config: CollectorConfig) -> Result<()> {
    let (client, store, scheduler) = build_scheduler(&config).await?;

    let account = client.verify_account().await?;
    store
        .log_audit(
            operations::STARTUP,
            &format!(
                "account {} verified ({}), {} instruments",
                account.id,
                config.oanda.environment,
                config.scheduler.instruments.len()
            ),
            AuditStatus::Completed,
        )
        .await;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let daemon = Daemon::new(
        scheduler,
        config.scheduler.instruments.clone(),
        config.daemon.clone(),
    );
    daemon.run(shutdown).await;

    store.pool().close().await;
    Ok(())
}

async fn sync_once(
    config: CollectorConfig,
    instruments: Option<String>,
    force: bool,
) -> Result<()> {
    let targets = match instruments {
        Some(list) => Instrument::parse_list(&list).map_err(CollectorError::Config)?,
        None => config.scheduler.instruments.clone(),
    };

    let (_client, store, scheduler) = build_scheduler(&config).await?;

    let stats = run_tick(
        scheduler.clone(),
        &targets,
        config.daemon.max_workers,
        Utc::now(),
        force,
    )
    .await;
    stats.log_summary("sync_once");

    for (instrument, state) in scheduler.board().snapshot() {
        println!(
            "{:<10} {:<10} {:>7}  {}",
            instrument.as_str(),
            state.status,
            state.progress.to_string(),
            state.message
        );
    }

    store.pool().close().await;
    Ok(())
}

async fn print_status(config: CollectorConfig) -> Result<()> {
    let store = CandleStore::connect(&config.store).await?;

    println!("{:<10} {:<22} {:>10}", "INSTRUMENT", "LAST CANDLE", "ROWS");
    for instrument in &config.scheduler.instruments {
        let last = store
            .last_stored_timestamp(instrument)
            .await?
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());
        let count = store.count_candles(instrument).await?;
        println!("{:<10} {:<22} {:>10}", instrument.as_str(), last, count);
    }

    store.pool().close().await;
    Ok(())
}

async fn print_audit(config: CollectorConfig, limit: u32) -> Result<()> {
    let store = CandleStore::connect(&config.store).await?;

    for record in store.recent_audit(limit).await? {
        println!(
            "{:>6}  {}  {:<16} {:<13} {}",
            record.id,
            format_timestamp(record.timestamp),
            record.operation,
            record.status,
            record.details
        );
    }

    store.pool().close().await;
    Ok(())
}
