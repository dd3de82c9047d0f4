use clap::Parser;
use std::path::PathBuf;

use settlement_sim::demo;
use settlement_sim::settlement::persistence;

#[derive(Parser, Debug)]
#[command(name = "settlement_sim")]
#[command(about = "Run the autonomous settlement job orchestration demo")]
struct Args {
    /// Random seed (uses a random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of simulation ticks to run
    #[arg(short, long, default_value = "200")]
    ticks: u32,

    /// Simulated seconds advanced per tick
    #[arg(long, default_value = "1.0")]
    tick_seconds: f64,

    /// Map width in tiles
    #[arg(short = 'W', long, default_value = "16")]
    width: usize,

    /// Map height in tiles
    #[arg(short = 'H', long, default_value = "12")]
    height: usize,

    /// Ticks between plant growth steps
    #[arg(long, default_value = "20")]
    growth_interval: u32,

    /// Export a JSON run report (e.g. "report.json")
    #[arg(long)]
    report: Option<PathBuf>,

    /// Export the session save to JSON (e.g. "save.json")
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let seed = args.seed.unwrap_or_else(rand::random);
    println!("Running settlement with seed: {}", seed);
    println!("Map size: {}x{}", args.width, args.height);

    let mut session = demo::standard_session(args.width, args.height, seed);
    let layout = demo::build_demo_settlement(&mut session);
    println!(
        "Declared {} rooms (farm, kitchen, graveyard, mushroom farm)",
        session.state.rooms.len()
    );

    let mut jobs_completed = 0;
    for tick in 0..args.ticks {
        session.tick(args.tick_seconds);
        jobs_completed += demo::work_one_round(&mut session);
        if args.growth_interval > 0 && tick % args.growth_interval == args.growth_interval - 1 {
            demo::mature_plants(&mut session.state);
        }
    }

    let report = demo::run_report(&session, &layout, seed, args.ticks, jobs_completed);
    println!(
        "Simulated {:.0}s: {} jobs completed, {} still live",
        report.sim_time, report.jobs_completed, report.live_jobs
    );
    for (name, count) in &report.live_jobs_by_type {
        println!("  {} live: {}", name, count);
    }
    println!(
        "Corpse interred: {}",
        if report.corpse_interred { "yes" } else { "no" }
    );

    if let Some(path) = &args.report {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => match std::fs::write(path, json) {
                Ok(()) => println!("Report written to {}", path.display()),
                Err(error) => eprintln!("Failed to write report: {}", error),
            },
            Err(error) => eprintln!("Failed to serialize report: {}", error),
        }
    }

    if let Some(path) = &args.save {
        let save = persistence::save_session(&session);
        match persistence::write_save(&save, path) {
            Ok(()) => println!("Save written to {}", path.display()),
            Err(error) => eprintln!("Failed to write save: {}", error),
        }
    }
}
