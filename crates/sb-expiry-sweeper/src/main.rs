use clap::Parser;
use dotenvy::dotenv;
use sb_common::db::{
    cancel_stale_pending_applications, create_pool_from_url_checked, expire_postings, DbPoolError,
    PgPool, PostingStorageError,
};
use sb_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use sb_common::LocalClock;
use thiserror::Error;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "sb-expiry-sweeper",
    about = "Expire finished job postings and cancel pending applications for started shifts"
)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Repeat every N seconds; runs once and exits when omitted
    #[arg(long, env = "SB_SWEEP_INTERVAL_SECS", value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: Option<u64>,

    /// Marketplace local time offset used for "today" and shift start times
    #[arg(long, env = "SB_UTC_OFFSET_MINUTES", default_value_t = 420, allow_negative_numbers = true)]
    utc_offset_minutes: i32,
}

#[derive(Debug, Error)]
enum SweepError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Pool(#[from] DbPoolError),
    #[error(transparent)]
    Storage(#[from] PostingStorageError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SweepReport {
    expired_postings: u64,
    cancelled_applications: u64,
}

impl SweepReport {
    fn is_empty(&self) -> bool {
        self.expired_postings == 0 && self.cancelled_applications == 0
    }
}

fn clock_from(cli: &Cli) -> Result<LocalClock, SweepError> {
    LocalClock::from_offset_minutes(cli.utc_offset_minutes).ok_or_else(|| {
        SweepError::Config(format!(
            "SB_UTC_OFFSET_MINUTES={} is outside +/- 24 hours",
            cli.utc_offset_minutes
        ))
    })
}

async fn sweep_once(pool: &PgPool, clock: &LocalClock) -> Result<SweepReport, SweepError> {
    let now = clock.now();
    let expired_postings = expire_postings(pool, now.date()).await?;
    let cancelled_applications = cancel_stale_pending_applications(pool, now).await?;
    Ok(SweepReport {
        expired_postings,
        cancelled_applications,
    })
}

fn log_report(report: SweepReport) {
    if report.is_empty() {
        debug!("nothing to sweep");
    } else {
        info!(
            expired_postings = report.expired_postings,
            cancelled_applications = report.cancelled_applications,
            "sweep finished"
        );
    }
}

async fn run() -> Result<(), SweepError> {
    dotenv().ok();
    init_tracing_subscriber(env!("CARGO_PKG_NAME"));
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));

    let cli = Cli::parse();
    let clock = clock_from(&cli)?;
    let pool = create_pool_from_url_checked(&cli.database_url).await?;

    let Some(secs) = cli.interval_secs else {
        log_report(sweep_once(&pool, &clock).await?);
        return Ok(());
    };

    info!(interval_secs = secs, "starting expiry sweeper");
    let mut ticker = interval(Duration::from_secs(secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep_once(&pool, &clock).await {
                    Ok(report) => log_report(report),
                    Err(err) => warn!(error = %err, "sweep failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down expiry sweeper");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %err, "sb-expiry-sweeper failed");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let mut argv = vec!["sb-expiry-sweeper", "--database-url", "postgres://localhost/sb"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv)
    }

    #[test]
    fn interval_is_optional_and_positive() {
        let once = parse(&[]).unwrap();
        assert_eq!(once.interval_secs, None);

        let repeating = parse(&["--interval-secs", "300"]).unwrap();
        assert_eq!(repeating.interval_secs, Some(300));

        assert!(parse(&["--interval-secs", "0"]).is_err());
    }

    #[test]
    fn clock_offset_must_fit_a_day() {
        let cli = parse(&["--utc-offset-minutes", "-300"]).unwrap();
        assert_eq!(clock_from(&cli).unwrap().offset().local_minus_utc(), -300 * 60);

        let cli = parse(&["--utc-offset-minutes", "1500"]).unwrap();
        assert!(matches!(clock_from(&cli), Err(SweepError::Config(_))));
    }

    #[test]
    fn empty_report_is_detected() {
        assert!(SweepReport::default().is_empty());
        assert!(!SweepReport {
            expired_postings: 1,
            cancelled_applications: 0,
        }
        .is_empty());
    }
}
