//! Runs the full authenticity pipeline on one image.
//!
//! Run with: cargo run --example analyze -- <image_path> [debug_dir] [config.json]

use std::{env, fs, process};

use image_authenticity::{AnalysisConfig, ForensicsAnalyzer, error::Result, report::JsonReport};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = env::args().collect::<Vec<_>>();
    let Some(image_path) = args.get(1) else {
        eprintln!("Usage: {} <image_path> [debug_dir] [config.json]", args[0]);
        process::exit(2);
    };

    let config = match args.get(3) {
        Some(path) => AnalysisConfig::from_json(&fs::read_to_string(path)?)?,
        None => AnalysisConfig::default(),
    };

    let bytes = fs::read(image_path)?;
    let analysis = ForensicsAnalyzer::new().with_config(config).analyze(&bytes);

    for result in &analysis.results {
        println!("── {} [{}] score {:.0}", result.detector, result.verdict, result.score);
        for line in result.details.lines() {
            println!("   {}", line);
        }
    }
    println!();
    println!("Authenticity: {:.0}/100", analysis.final_score);

    if let Some(dir) = args.get(2) {
        analysis.debug_images.save(dir)?;
        println!("Debug images written to {}", dir);
    }

    let json = JsonReport::from(&analysis).to_json()?;
    println!("{}", json);

    Ok(())
}
