use std::io;
use std::path::Path;
use std::process;

use clap::{App, Arg, ArgMatches};
use fern;
use log::error;

use binnie::{bin_alignments, BinnieConfig, BinnieError};

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

    let stdout_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%H:%M"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(io::stdout());

    base_config
        .chain(file_config)
        .chain(stdout_config)
        .apply()?;

    Ok(())
}

fn out_arg(name: &'static str, hm: &'static str) -> Arg<'static, 'static> {
    Arg::<'static, 'static>::with_name(name)
        .long(name)
        .value_name("FILE")
        .takes_value(true)
        .required(false)
        .help(hm)
}

fn main() {
    let matches = App::new("binnie")
        .version("0.1.0")
        .about(
            "binnie partitions reads aligned to an original reference into \
             unchanged, bridged and remap bins by comparing each read with \
             its re-alignment to a bridge reference.",
        )
        .arg(
            Arg::with_name("original")
                .value_name("ORIGINAL")
                .required(true)
                .index(1)
                .help("Alignments to the original reference, sorted by coordinate."),
        )
        .arg(
            Arg::with_name("bridge")
                .value_name("BRIDGE")
                .required(true)
                .index(2)
                .help("Alignments of the same reads to the bridge reference."),
        )
        .arg(out_arg(
            "unchanged_out",
            "Output for reads kept on the original reference.",
        ))
        .arg(out_arg(
            "bridged_out",
            "Output for reads taking their bridge alignment.",
        ))
        .arg(out_arg("remap_out", "Output for reads that need re-alignment."))
        .arg(
            Arg::with_name("stats")
                .long("stats")
                .value_name("FILE")
                .takes_value(true)
                .required(false)
                .help("Dump binning statistics to FILE."),
        )
        .arg(
            Arg::with_name("buffer_size")
                .long("buffer_size")
                .value_name("NUM")
                .takes_value(true)
                .required(false)
                .help("Maximum number of buffered reads before a forced flush (0 disables)."),
        )
        .arg(
            Arg::with_name("max_buffer_bases")
                .long("max_buffer_bases")
                .value_name("NUM")
                .takes_value(true)
                .required(false)
                .help("Maximum position range spanned by buffered reads (0 disables)."),
        )
        .arg(
            Arg::with_name("ignore_rg")
                .long("ignore_rg")
                .help("Match reads between streams by qname alone, ignoring read groups."),
        )
        .arg(
            Arg::with_name("allow_sorted_unmapped")
                .long("allow_sorted_unmapped")
                .help("Accept unmapped reads placed before the end of the stream."),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Verbosity of logging (repeat for more)."),
        )
        .arg(
            Arg::with_name("debug")
                .long("debug")
                .help("Shorthand for -vv."),
        )
        .get_matches();

    let verbosity = if matches.is_present("debug") {
        2
    } else {
        matches.occurrences_of("verbose")
    };
    setup_logging(verbosity, "binnie.log".as_ref()).expect("failed to initialize logging.");

    let cfg = match build_config(&matches) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{}", e);
            process::exit(e.exit_code());
        }
    };

    if let Err(e) = bin_alignments(&cfg) {
        error!("{}", e);
        process::exit(e.exit_code());
    }
}

fn build_config(matches: &ArgMatches) -> Result<BinnieConfig, BinnieError> {
    let original = matches
        .value_of("original")
        .expect("Original alignment file must be provided.");
    let bridge = matches
        .value_of("bridge")
        .expect("Bridge alignment file must be provided.");

    let mut cfg = BinnieConfig::new(Path::new(original), Path::new(bridge));
    if let Some(p) = matches.value_of("unchanged_out") {
        cfg = BinnieConfig::update_unchanged_out(cfg, Path::new(p));
    }
    if let Some(p) = matches.value_of("bridged_out") {
        cfg = BinnieConfig::update_bridged_out(cfg, Path::new(p));
    }
    if let Some(p) = matches.value_of("remap_out") {
        cfg = BinnieConfig::update_remap_out(cfg, Path::new(p));
    }
    if let Some(p) = matches.value_of("stats") {
        cfg = BinnieConfig::update_stats_out(cfg, Path::new(p));
    }
    if let Some(v) = matches.value_of("buffer_size") {
        let n = parse_num(v, "--buffer_size")?;
        cfg = BinnieConfig::update_buffer_size(cfg, n);
    }
    if let Some(v) = matches.value_of("max_buffer_bases") {
        let n = parse_num(v, "--max_buffer_bases")?;
        cfg = BinnieConfig::update_buffer_bases(cfg, n);
    }
    cfg = BinnieConfig::update_ignore_rg(cfg, matches.is_present("ignore_rg"));
    cfg = BinnieConfig::update_allow_sorted_unmapped(
        cfg,
        matches.is_present("allow_sorted_unmapped"),
    );
    Ok(cfg)
}

fn parse_num(value: &str, option: &str) -> Result<u64, BinnieError> {
    value.parse::<u64>().map_err(|_| {
        BinnieError::Args(format!(
            "{} expects a non-negative integer, got '{}'",
            option, value
        ))
    })
}
