use std::{fs::OpenOptions, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, anyhow, bail};
use bus_setu_driver::{
    Authenticator, LocationReportingLoop, SessionStore, TripSessionController, TripState,
    api::{HttpTripApi, TripApi},
    config::Configuration,
    indicator::LogIndicator,
    provider::SimulatedLocationProvider,
    store::FileKeyValueStore,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bus_setu_driver")]
#[command(about = "Drive a BusSetu trip from the command line", long_about = None)]
struct Cli {
    /// key = value configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Base url of the trip server, overrides the config file
    #[arg(long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which screen the app would open on
    Status,
    Login { username: String, password: String },
    Logout,
    /// List buses available for a trip
    Buses,
    /// List routes available for a trip
    Routes,
    /// Start a trip and report simulated location until Ctrl-C
    Drive {
        #[arg(long)]
        bus: i64,
        #[arg(long)]
        route: i64,
        /// End the trip on its own after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Configuration::load(path).await?,
        None => Configuration::default(),
    };
    if let Some(server) = cli.server {
        config.server = server;
    }

    init_logging(&config)?;

    let api: Arc<dyn TripApi> = Arc::new(HttpTripApi::new(&config.server, config.request_timeout())?);
    let store = FileKeyValueStore::open(&config.session_file).await?;
    let sessions = SessionStore::open(Arc::new(store)).await?;

    match cli.command {
        Commands::Status => {
            println!("Start screen: {:?}", sessions.start_destination());
            match sessions.current() {
                Some(driver_id) => println!("Logged in as driver {driver_id}"),
                None => println!("Not logged in"),
            }
        }
        Commands::Login { username, password } => {
            let auth = Authenticator::new(api, sessions);
            let driver_id = auth.login(&username, &password).await?;
            println!("Logged in as driver {driver_id}");
        }
        Commands::Logout => {
            sessions.clear().await?;
            println!("Logged out");
        }
        Commands::Buses => {
            for bus in api.available_buses().await? {
                println!("{:>6}  {}", bus.id, bus.bus_number);
            }
        }
        Commands::Routes => {
            for route in api.routes().await? {
                println!("{:>6}  {}", route.id, route.route_name);
            }
        }
        Commands::Drive {
            bus,
            route,
            duration_secs,
        } => drive(&config, api, sessions, bus, route, duration_secs).await?,
    }

    Ok(())
}

fn init_logging(config: &Configuration) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", config.log_dir))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_dir.join("driver.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        .init();

    Ok(())
}

async fn drive(
    config: &Configuration,
    api: Arc<dyn TripApi>,
    sessions: SessionStore,
    bus_id: i64,
    route_id: i64,
    duration_secs: Option<u64>,
) -> anyhow::Result<()> {
    let reporting = Arc::new(LocationReportingLoop::spawn(
        Arc::new(SimulatedLocationProvider::demo_route()),
        api.clone(),
        Arc::new(LogIndicator::new()),
        config.location_request(),
    ));

    let controller = TripSessionController::new(api, reporting, sessions);

    controller.load_dashboard().await;
    let dashboard = controller.snapshot();
    if let Some(message) = dashboard.state.error() {
        bail!("{message}");
    }

    let bus = dashboard
        .available_buses
        .into_iter()
        .find(|bus| bus.id == bus_id)
        .ok_or_else(|| anyhow!("Unknown bus {bus_id}"))?;
    let route = dashboard
        .available_routes
        .into_iter()
        .find(|route| route.id == route_id)
        .ok_or_else(|| anyhow!("Unknown route {route_id}"))?;

    tracing::info!("Starting trip on bus {} along {}", bus.bus_number, route.route_name);
    controller.select_bus(bus);
    controller.select_route(route);
    controller.start_trip().await;

    if let Some(message) = controller.state().error() {
        bail!("{message}");
    }

    match duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?,
    }

    controller
        .stop_trip(|| tracing::info!("Safe to leave the dashboard"))
        .await;

    match controller.state() {
        TripState::Error(message) => bail!("{message}"),
        _ => {
            println!("Trip ended");
            Ok(())
        }
    }
}
