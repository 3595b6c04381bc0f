mod args;
mod report;

use std::error::Error;

use clap::Parser;
use log::{error, LevelFilter};

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();

    let res = report::run_report(
        args.config.clone(),
        args.out.clone(),
        args.summary.clone(),
        args.reference.clone(),
    );

    if let Err(e) = res {
        error!("Report failed: {}", e);
        eprintln!("An error occured: {}", e);
        let mut source = e.source();
        while let Some(s) = source {
            eprintln!("  caused by: {}", s);
            source = s.source();
        }
        std::process::exit(1);
    }
}
