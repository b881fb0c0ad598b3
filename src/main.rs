use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fleet_rental::config::AppConfig;
use fleet_rental::error::AppError;
use fleet_rental::telemetry;
use fleet_rental::workflows::rental::{
    due_dates, rental_router, BillingFrequency, ContractTerms, LoggingNotifier, MemoryStore,
    RentalService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Fleet Rental Coordinator",
    about = "Run the vehicle-rental coordination service or inspect billing schedules from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Billing schedule helpers for operator demos
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum ScheduleCommand {
    /// Print the due dates a contract with the given terms would produce
    Preview(PreviewArgs),
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// Billing frequency
    #[arg(long, value_enum)]
    frequency: FrequencyArg,
    /// Rental fee in cents per period
    #[arg(long)]
    fee_cents: i64,
    /// Due weekday for weekly billing, 0-6 with 0 = Sunday
    #[arg(long)]
    due_weekday: Option<u8>,
    /// Due day for monthly billing, 1-31 (clamped to short months)
    #[arg(long)]
    due_day_of_month: Option<u8>,
    /// Contract start date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    start: NaiveDate,
    /// Optional contract end date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    end: Option<NaiveDate>,
    /// Number of periods to materialize
    #[arg(long, default_value_t = 12)]
    periods: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FrequencyArg {
    Daily,
    Weekly,
    Monthly,
}

impl From<FrequencyArg> for BillingFrequency {
    fn from(value: FrequencyArg) -> Self {
        match value {
            FrequencyArg::Daily => BillingFrequency::Daily,
            FrequencyArg::Weekly => BillingFrequency::Weekly,
            FrequencyArg::Monthly => BillingFrequency::Monthly,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Schedule {
            command: ScheduleCommand::Preview(args),
        } => run_schedule_preview(args),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let store = Arc::new(MemoryStore::default());
    let notifier = Arc::new(LoggingNotifier);
    let service = Arc::new(RentalService::new(
        store,
        notifier,
        config.operations.clone(),
    ));

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(rental_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "fleet rental coordinator ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_schedule_preview(args: PreviewArgs) -> Result<(), AppError> {
    let terms = ContractTerms {
        fee_amount_cents: args.fee_cents,
        frequency: args.frequency.into(),
        due_weekday: args.due_weekday,
        due_day_of_month: args.due_day_of_month,
        start_date: args.start,
        end_date: args.end,
    };

    let dates = due_dates(&terms, args.start, args.periods)
        .map_err(|issue| AppError::Core(issue.into()))?;

    println!(
        "Schedule preview: {} billing, {} cents per period",
        terms.frequency.label(),
        terms.fee_amount_cents
    );
    if dates.is_empty() {
        println!("No due dates fall inside the requested window");
    }
    for (index, date) in dates.iter().enumerate() {
        println!("{:>3}. {date}", index + 1);
    }

    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_format() {
        assert_eq!(
            parse_date("2024-01-03"),
            Ok(NaiveDate::from_ymd_opt(2024, 1, 3).expect("valid date"))
        );
        assert!(parse_date("03/01/2024").is_err());
    }

    #[test]
    fn preview_rejects_invalid_terms() {
        let args = PreviewArgs {
            frequency: FrequencyArg::Weekly,
            fee_cents: 50_000,
            due_weekday: None,
            due_day_of_month: None,
            start: NaiveDate::from_ymd_opt(2024, 1, 3).expect("valid date"),
            end: None,
            periods: 4,
        };

        assert!(run_schedule_preview(args).is_err());
    }
}
