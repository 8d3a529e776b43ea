use bookcabin_allocation::{RedemptionService, RetryPolicy};
use bookcabin_config::Config;
use bookcabin_db::{NewVoucher, PoolSettings};
use bookcabin_models::Cabin;
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::OffsetTime;

mod server;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_HASH: &str = env!("BOOKCABIN_GIT_HASH");

pub(crate) fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH})")
}

// --- CLI definition ---

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Parser)]
#[command(name = "bookcabin")]
#[command(about = "Flight seat vouchers and seat allocation")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BOOKCABIN_GIT_HASH"), ")"))]
struct Cli {
    /// Log level (overrides config)
    #[arg(short, long, global = true)]
    log_level: Option<LogLevel>,

    /// Display log timestamps in UTC (default: local time)
    #[arg(long, global = true)]
    utc: bool,

    /// Database URL (overrides config)
    #[arg(long, global = true)]
    db_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create flights departing on one date
    CreateFlights {
        /// Departure instant, RFC 3339 (e.g. "2030-07-01T06:00:00Z")
        #[arg(long)]
        dep_date: DateTime<Utc>,
        /// Flight numbers (e.g. GA133 GA125)
        #[arg(required = true)]
        flight_numbers: Vec<String>,
    },
    /// Add seats to one cabin of a flight
    AddSeats {
        #[arg(long)]
        flight_id: i64,
        /// ECONOMY, BUSINESS or FIRST
        #[arg(long)]
        cabin: Cabin,
        /// Seat labels (e.g. 1A 1B 1C)
        #[arg(required = true)]
        labels: Vec<String>,
    },
    /// Issue a voucher for a cabin on a flight
    CreateVoucher {
        #[arg(long)]
        code: String,
        #[arg(long)]
        flight_id: i64,
        #[arg(long)]
        cabin: Cabin,
        /// Optional expiry, RFC 3339
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },
    /// Redeem a voucher for a random free seat in its cabin
    Redeem {
        code: String,
    },
    /// List flights
    ListFlights,
    /// List seats
    ListSeats {
        #[arg(long)]
        flight_id: Option<i64>,
    },
    /// List vouchers
    ListVouchers,
    /// List seat assignments
    ListAssignments,
}

// --- Logging ---

fn init_logging(level: &str, utc: bool) {
    let filter = EnvFilter::new(level);

    if utc {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(OffsetTime::new(
                time::UtcOffset::UTC,
                time::macros::format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
                ),
            ))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(LocalTimer)
            .init();
    }
}

struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

// --- Main ---

fn merge_cli(mut config: Config, cli: &Cli) -> Config {
    if let Some(level) = &cli.log_level {
        config.log_level = level.to_string();
    }
    if cli.utc {
        config.utc = true;
    }
    if let Some(url) = &cli.db_url {
        config.db_url = url.clone();
    }
    if let Commands::Serve { port: Some(port) } = &cli.command {
        config.port = *port;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = merge_cli(Config::load(), &cli);
    init_logging(&config.log_level, config.utc);

    let settings = PoolSettings {
        max_connections: config.max_connections,
        busy_timeout: config.busy_timeout(),
    };
    let pool = bookcabin_db::connect(&config.db_url, &settings).await?;
    bookcabin_db::migrate(&pool).await?;

    let policy = RetryPolicy {
        max_attempts: config.max_attempts,
        attempt_timeout: config.attempt_timeout(),
    };
    let redemptions = RedemptionService::new(pool.clone(), policy);

    match cli.command {
        Commands::Serve { .. } => {
            let state = server::AppState { pool, redemptions };
            server::run_server(config.port, state).await?;
        }
        Commands::CreateFlights { dep_date, flight_numbers } => {
            let flights = bookcabin_db::create_flights(&pool, &flight_numbers, dep_date).await?;
            for f in &flights {
                println!("Created flight {} departing {} (id={})", f.flight_no, f.dep_date.to_rfc3339(), f.id);
            }
        }
        Commands::AddSeats { flight_id, cabin, labels } => {
            let seats = bookcabin_db::add_seats(&pool, flight_id, cabin, &labels).await?;
            info!("{} {} seat(s) added to flight {}", seats.len(), cabin, flight_id);
            let labels: Vec<_> = seats.iter().map(|s| s.label.as_str()).collect();
            println!("Added {} seat(s) to flight {flight_id}: {}", seats.len(), labels.join(", "));
        }
        Commands::CreateVoucher { code, flight_id, cabin, expires_at } => {
            let voucher = bookcabin_db::create_voucher(&pool, &NewVoucher { code, flight_id, cabin, expires_at }).await?;
            println!("Issued voucher {} for {} on flight {} (id={})", voucher.code, voucher.cabin, voucher.flight_id, voucher.id);
        }
        Commands::Redeem { code } => {
            let result = redemptions.redeem(&code).await?;
            println!(
                "Voucher {} → seat {} ({}) on flight {}",
                result.voucher_code, result.seat_label, result.cabin, result.flight_id
            );
        }
        Commands::ListFlights => {
            let flights = bookcabin_db::list_flights(&pool).await?;
            if flights.is_empty() {
                println!("No flights found. Use `bookcabin create-flights` to add some.");
            } else {
                println!("{:<6} {:<10} {}", "ID", "Flight", "Departure");
                println!("{}", "-".repeat(45));
                for f in &flights {
                    println!("{:<6} {:<10} {}", f.id, f.flight_no, f.dep_date.to_rfc3339());
                }
                println!("\n{} flight(s) total", flights.len());
            }
        }
        Commands::ListSeats { flight_id } => {
            let seats = bookcabin_db::list_seats(&pool, flight_id).await?;
            if seats.is_empty() {
                println!("No seats found.");
            } else {
                println!("{:<6} {:<8} {:<8} {:<10} {}", "ID", "Flight", "Label", "Cabin", "Assigned");
                println!("{}", "-".repeat(45));
                for s in &seats {
                    let assigned = if s.is_assigned { "yes" } else { "no" };
                    println!("{:<6} {:<8} {:<8} {:<10} {}", s.id, s.flight_id, s.label, s.cabin, assigned);
                }
                let free = seats.iter().filter(|s| !s.is_assigned).count();
                println!("\n{} seat(s), {free} free", seats.len());
            }
        }
        Commands::ListVouchers => {
            let vouchers = bookcabin_db::list_vouchers(&pool).await?;
            if vouchers.is_empty() {
                println!("No vouchers issued.");
            } else {
                println!("{:<6} {:<16} {:<8} {:<10} {:<10} {}", "ID", "Code", "Flight", "Cabin", "Redeemed", "Expires");
                println!("{}", "-".repeat(80));
                for v in &vouchers {
                    let redeemed = v.redeemed_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "no".to_string());
                    let expires = v.expires_at.map(|t| t.to_rfc3339()).unwrap_or_default();
                    println!("{:<6} {:<16} {:<8} {:<10} {:<10} {}", v.id, v.code, v.flight_id, v.cabin, redeemed, expires);
                }
                println!("\n{} voucher(s) total", vouchers.len());
            }
        }
        Commands::ListAssignments => {
            let assignments = bookcabin_db::list_assignments(&pool).await?;
            if assignments.is_empty() {
                println!("No seats assigned yet.");
            } else {
                println!("{:<16} {:<8} {:<8} {:<10} {}", "Voucher", "Flight", "Seat", "Cabin", "Assigned at");
                println!("{}", "-".repeat(70));
                for a in &assignments {
                    println!(
                        "{:<16} {:<8} {:<8} {:<10} {}",
                        a.voucher_code,
                        a.flight_id,
                        a.seat_label,
                        a.cabin,
                        a.assigned_at.to_rfc3339()
                    );
                }
                println!("\n{} assignment(s) total", assignments.len());
            }
        }
    }

    Ok(())
}
