use std::{io::Write, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use log::info;
use traffic_monitor::{
    classifier::{speed_deficit_trend, speed_totals},
    configuration::{get_configuration, Settings},
    error::TrafficError,
    models::{Coordinate, InvalidInputError},
    provider::TomTomClient,
    service::TrafficService,
    store::{AnyStore, MeasurementStore},
};

#[derive(Parser)]
#[command(name = "traffic-monitor", about = "Record and classify road traffic at a coordinate")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// create the traffic relation if it does not exist
    Init,
    /// fetch one measurement and store it; reads the location from stdin when not given
    Ingest {
        #[arg(long, allow_hyphen_values = true)]
        location: Option<Coordinate>,
    },
    /// fetch and store a measurement, printing it
    Live {
        #[arg(allow_hyphen_values = true)]
        location: Coordinate,
    },
    /// classify the latest stored measurement for a location
    Status {
        #[arg(allow_hyphen_values = true)]
        location: Coordinate,
    },
    /// print the stored series for a location
    History {
        #[arg(allow_hyphen_values = true)]
        location: Coordinate,
    },
    /// write the full history as CSV
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let configuration = get_configuration().expect("Failed to read configuration.");

    match run(cli.command, configuration).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, configuration: Settings) -> Result<(), TrafficError> {
    let provider = TomTomClient::new(&configuration.provider)?;
    let store = AnyStore::from_settings(&configuration.store)?;
    store.ensure_schema().await?;
    let service = TrafficService::new(provider, store, configuration.query.row_policy);

    match command {
        Command::Init => {
            info!("relation {} ready", configuration.store.table);
            println!("Database initialized.");
        }
        Command::Ingest { location } => {
            let coordinate = match location {
                Some(coordinate) => coordinate,
                None => prompt_location()?,
            };
            let stored = service.ingest(coordinate).await?;
            let m = &stored.measurement;
            println!(
                "Traffic data stored successfully! (id {}, {} at {}: {} km/h, free flow {} km/h, travel time {} s)",
                stored.id,
                coordinate,
                m.timestamp_text(),
                m.current_speed,
                m.free_flow_speed,
                m.current_travel_time
            );
        }
        Command::Live { location } => match service.fetch_live(location).await {
            Some(m) => println!(
                "{} {}: {} km/h (free flow {} km/h, travel time {} s)",
                m.timestamp_text(),
                location,
                m.current_speed,
                m.free_flow_speed,
                m.current_travel_time
            ),
            None => println!("No live data available for {location}"),
        },
        Command::Status { location } => {
            let series = service.fetch_history(location).await;
            let status = service.classify(&series);
            println!("[{:?}] {}", status.level.alert(), status.message);
            if let Some(latest) = series.last() {
                println!("Current Speed: {} km/h", latest.current_speed);
                println!("Free Flow Speed: {} km/h", latest.free_flow_speed);
                println!("Congestion Level: {:.1}%", status.congestion_pct);
            }
        }
        Command::History { location } => {
            let series = service.fetch_history(location).await;
            if series.is_empty() {
                println!("No historical data available for {location}");
            }
            for (m, point) in series.iter().zip(speed_deficit_trend(&series)) {
                println!(
                    "{}  current {:>6} km/h  free flow {:>6} km/h  deficit {:>6} km/h  travel time {} s",
                    m.timestamp_text(),
                    m.current_speed,
                    m.free_flow_speed,
                    point.speed_deficit,
                    m.current_travel_time
                );
            }
            if let Some(share) = speed_totals(&series).current_share() {
                println!("Actual speed share: {:.1}%", share * 100.0);
            }
        }
        Command::Export { output } => {
            let csv = service.export_csv().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, csv).map_err(|e| {
                        TrafficError::Export(e.into())
                    })?;
                    println!("Report written to {}", path.display());
                }
                None => std::io::stdout()
                    .write_all(&csv)
                    .map_err(|e| TrafficError::Export(e.into()))?,
            }
        }
    }
    Ok(())
}

fn prompt_location() -> Result<Coordinate, InvalidInputError> {
    print!("Enter location (latitude,longitude): ");
    std::io::stdout()
        .flush()
        .map_err(|e| InvalidInputError(e.to_string()))?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| InvalidInputError(e.to_string()))?;
    line.parse()
}
