use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use clap::{App, Arg};
use fern;
use log::warn;

use brindley::load_coord_map;

fn setup_logging(verbosity: u64, log_file: &Path) -> Result<(), fern::InitError> {
    let mut base_config = fern::Dispatch::new();

    base_config = match verbosity {
        0 => base_config.level(log::LevelFilter::Info),
        1 => base_config.level(log::LevelFilter::Debug),
        _ => base_config.level(log::LevelFilter::Trace),
    };

    let file_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(fern::log_file(log_file)?);

    let stderr_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%H:%M"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(io::stderr());

    base_config
        .chain(file_config)
        .chain(stderr_config)
        .apply()?;

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let matches = App::new("brindley")
        .version("0.1.0")
        .about(
            "brindley translates reference coordinates through a bridge \
             liftover map. Queries are 'chrom pos' lines; each answer echoes \
             the query followed by the mapped point, or '. .' when the point \
             has no mapping.",
        )
        .arg(
            Arg::with_name("map")
                .value_name("MAP")
                .required(true)
                .index(1)
                .help(
                    "Tab-separated liftover map (from_chrom from_start from_end \
                     to_chrom to_start to_end; the first line is a header).",
                ),
        )
        .arg(
            Arg::with_name("points")
                .short("p")
                .long("points")
                .value_name("FILE")
                .takes_value(true)
                .required(false)
                .help("File with one 'chrom pos' query per line (default: stdin)."),
        )
        .arg(
            Arg::with_name("log_level")
                .short("l")
                .long("log_level")
                .value_name("NUM")
                .takes_value(true)
                .required(false)
                .help("Verbosity of logging (0 - 3)"),
        )
        .get_matches();

    let verbosity: u64 = matches.value_of("log_level").unwrap_or("0").parse().unwrap_or(0);
    setup_logging(verbosity, "brindley.log".as_ref()).expect("failed to initialize logging.");

    let map_file = matches
        .value_of("map")
        .expect("Liftover map file must be provided.");
    let map = load_coord_map(Path::new(map_file))?;

    let reader: Box<dyn BufRead> = match matches.value_of("points") {
        Some(p) => Box::new(BufReader::new(File::open(p)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let query = fields
            .next()
            .map(|chrom| (chrom, fields.next().and_then(|p| p.parse::<i64>().ok())));
        match query {
            Some((chrom, Some(pos))) => match map.map_point(chrom, pos) {
                Some((to_chrom, to_pos)) => {
                    writeln!(out, "{}\t{}\t{}\t{}", chrom, pos, to_chrom, to_pos)?
                }
                None => writeln!(out, "{}\t{}\t.\t.", chrom, pos)?,
            },
            _ => warn!("skipping malformed query line '{}'", line),
        }
    }

    Ok(())
}
