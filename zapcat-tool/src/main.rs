//! zapcat: command-line front end for the service catalog.
//!
//! Imports scan data into a service list, dumps and filters the catalog,
//! renumbers channels, and prints statistics. The catalog files live in one
//! directory (see `--dir`) unless a TOML config names them individually.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use zapcat_core::{position_label, CatalogConfig, CatalogError, Channel, ServiceCatalog};

/// zapcat - service catalog tool for digital-broadcast receivers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the catalog files
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Configuration file naming the catalog files individually
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a scan document and commit it into the service list
    Import {
        /// Scan file to import; defaults to the configured scan tables
        #[arg(short, long)]
        scan: Option<PathBuf>,

        /// Discard the scan pass instead of committing when set
        #[arg(long)]
        dry_run: bool,
    },

    /// Print channels from the service list
    Dump {
        /// Only TV channels
        #[arg(long)]
        tv: bool,

        /// Only radio channels
        #[arg(long)]
        radio: bool,

        /// Only HD channels
        #[arg(long)]
        hd: bool,

        /// Only channels without a zap-number
        #[arg(long)]
        unused: bool,

        /// Restrict to one satellite position (tenths of a degree)
        #[arg(long)]
        satellite: Option<i16>,
    },

    /// Reset and reassign all zap-numbers from the pools
    Renumber,

    /// Print catalog statistics per satellite
    Stats,
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> zapcat_core::Result<()> {
    let config = match &args.config {
        Some(path) => CatalogConfig::from_file(path)?,
        None => CatalogConfig::in_dir(&args.dir),
    };
    let mut catalog = ServiceCatalog::new(config);

    match &args.command {
        Command::Import { scan, dry_run } => import(&mut catalog, scan.as_deref(), *dry_run),
        Command::Dump {
            tv,
            radio,
            hd,
            unused,
            satellite,
        } => {
            load_existing(&mut catalog)?;
            dump(&catalog, *tv, *radio, *hd, *unused, *satellite);
            Ok(())
        }
        Command::Renumber => {
            catalog.load_services(false)?;
            catalog.reset_channel_numbers(false, true);
            let numbered = catalog.assign_free_numbers();
            catalog.save_services(true, false)?;
            info!(
                "renumbered {} channels (tv up to {}, radio up to {})",
                numbered,
                catalog.get_max_number(false),
                catalog.get_max_number(true)
            );
            Ok(())
        }
        Command::Stats => {
            load_existing(&mut catalog)?;
            stats(&catalog);
            Ok(())
        }
    }
}

/// Load the persisted service list, treating an absent file as an empty
/// catalog rather than a failure.
fn load_existing(catalog: &mut ServiceCatalog) -> zapcat_core::Result<()> {
    match catalog.load_services(false) {
        Ok(()) => Ok(()),
        Err(CatalogError::FileNotFound(path)) => {
            info!("no service list at {} yet", path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn import(
    catalog: &mut ServiceCatalog,
    scan: Option<&std::path::Path>,
    dry_run: bool,
) -> zapcat_core::Result<()> {
    catalog.load_provider_map();
    load_existing(catalog)?;
    catalog.load_motor_positions()?;

    let scan_path = scan
        .map(PathBuf::from)
        .unwrap_or_else(|| catalog.config().scan_file.clone());
    let stats = catalog.import_scan_file(&scan_path)?;
    info!(
        "scanned {} satellites, {} transponders ({} new), {} services, {} skipped",
        stats.satellites,
        stats.transponders,
        stats.new_transponders,
        stats.services,
        stats.skipped
    );

    if dry_run {
        catalog.remove_current_channels();
        catalog.remove_nvod_channels();
        info!("dry run, scan pass discarded");
        return Ok(());
    }

    let inserted = catalog.commit_current_channels();
    if catalog.dup_numbers() {
        info!("duplicate zap-numbers in scan data, renumbering");
        catalog.reset_channel_numbers(false, true);
        catalog.assign_free_numbers();
    } else if inserted > 0 {
        catalog.assign_free_numbers();
    }

    catalog.save_services(true, true)?;
    catalog.save_motor_positions()?;
    Ok(())
}

fn dump(
    catalog: &ServiceCatalog,
    tv: bool,
    radio: bool,
    hd: bool,
    unused: bool,
    satellite: Option<i16>,
) {
    let channels: Vec<&Channel> = if tv {
        catalog.all_tv_channels()
    } else if radio {
        catalog.all_radio_channels()
    } else if hd {
        catalog.all_hd_channels()
    } else if unused {
        catalog.all_unused_channels()
    } else if let Some(position) = satellite {
        catalog.all_satellite_channels(position)
    } else {
        catalog.all_channels().values().collect()
    };

    for ch in channels {
        if let Some(position) = satellite {
            if ch.position() != position {
                continue;
            }
        }
        let number = ch
            .number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>5}  {:016x}  {:5}  {:32}  {}",
            number,
            ch.id(),
            position_label(ch.position()),
            ch.name,
            ch.provider_name
        );
    }
}

fn stats(catalog: &ServiceCatalog) {
    println!(
        "{} channels ({} tv, {} radio, {} hd, {} unused), {} nvod, {} transponders",
        catalog.channel_count(),
        catalog.all_tv_channels().len(),
        catalog.all_radio_channels().len(),
        catalog.all_hd_channels().len(),
        catalog.all_unused_channels().len(),
        catalog.nvod_channels().len(),
        catalog.transponder_count()
    );

    for sat in catalog.satellites().values() {
        let transponders: usize = catalog
            .transponders()
            .subset(sat.position)
            .map(|m| m.len())
            .unwrap_or(0);
        println!(
            "  {:5}  {:24}  {} transponders, {} channels, motor {}",
            position_label(sat.position),
            sat.name,
            transponders,
            catalog.all_satellite_channels(sat.position).len(),
            sat.motor_position
        );
    }
}
