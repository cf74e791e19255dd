use clap::{Arg, ArgAction, ArgMatches, Command};
use index_advisor::logging::{init_logging, parse_level};
use index_advisor::{
    AdvisorConfig, CollectionIndexResults, IndexResults, LogFileSource, OfflineCatalog,
    OperationSource, Processor, ProfileSource, TimeResolution,
};
use tracing::{info, Level};

/// Offline index advisor
///
/// Replays server logs and profiler exports against an optional catalog
/// snapshot and prints the recommended index set per collection.

fn main() {
    let matches = create_cli().get_matches();

    if let Err(e) = run(matches) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn create_cli() -> Command {
    Command::new("index-advisor")
        .about("Recommend indexes from recorded query activity")
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(true)
        .arg(
            Arg::new("log")
                .help("Server log file (legacy text format)")
                .long("log")
                .value_name("FILE")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("profile")
                .help("Profiler export, one JSON document per line")
                .long("profile")
                .value_name("FILE")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("catalog")
                .help("Catalog snapshot with existing indexes, stats and explain output")
                .long("catalog")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("namespace")
                .help("Namespace to analyze (db.coll, db.* or *); repeatable")
                .long("namespace")
                .short('n')
                .value_name("NS")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("resolution")
                .help("Bucket width for query frequency")
                .long("resolution")
                .value_parser(["millisecond", "second", "minute", "hour", "day"]),
        )
        .arg(
            Arg::new("explain")
                .help("Consult catalog explain output for nested queries")
                .long("explain")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("format")
                .help("Output format")
                .long("format")
                .value_parser(["text", "json"])
                .default_value("text"),
        )
        .arg(
            Arg::new("config")
                .help("JSON configuration file")
                .long("config")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("log-level")
                .help("Log level")
                .long("log-level")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("json-logs")
                .help("Emit logs as JSON")
                .long("json-logs")
                .action(ArgAction::SetTrue),
        )
}

fn strings(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn load_config(matches: &ArgMatches) -> Result<AdvisorConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => AdvisorConfig::from_file(path)?,
        None => AdvisorConfig::default(),
    };

    let namespaces = strings(matches, "namespace");
    if !namespaces.is_empty() {
        config.namespaces = namespaces;
    }
    if let Some(resolution) = matches.get_one::<String>("resolution") {
        config.time_resolution = resolution.parse::<TimeResolution>()?;
    }
    if matches.get_flag("explain") {
        config.use_explain = true;
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.log_level = level.clone();
    }
    if matches.get_flag("json-logs") {
        config.json_logs = true;
    }
    config.validate()?;
    Ok(config)
}

fn run(matches: ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&matches)?;
    init_logging(
        parse_level(&config.log_level).unwrap_or(Level::INFO),
        config.json_logs,
    );

    let catalog = match matches.get_one::<String>("catalog") {
        Some(path) => OfflineCatalog::from_file(path)?,
        None => OfflineCatalog::new(),
    };

    let mut sources: Vec<Box<dyn OperationSource>> = Vec::new();
    for path in strings(&matches, "log") {
        sources.push(Box::new(LogFileSource::new(path)));
    }
    for path in strings(&matches, "profile") {
        sources.push(Box::new(ProfileSource::new(path)));
    }
    if sources.is_empty() {
        return Err("no input given, pass --log or --profile".into());
    }

    let mut processor = Processor::new(config.clone());
    for source in sources.iter_mut() {
        source.for_each(&config.namespaces, &mut |op| {
            processor.add(&op, &catalog).map(|_| ())
        })?;
    }
    let results = processor.done(&catalog)?;
    info!(
        collections = results.collections().count(),
        "Analysis complete"
    );

    match matches.get_one::<String>("format").map(String::as_str) {
        Some("json") => println!("{}", serde_json::to_string_pretty(&results)?),
        _ => print_text(&results),
    }
    Ok(())
}

fn print_text(results: &IndexResults) {
    println!(
        "Operations: {} analyzed, {} outside watched namespaces",
        results.processed, results.ignored
    );
    for collection in results.collections() {
        print_collection(collection);
    }
}

fn print_collection(collection: &CollectionIndexResults) {
    println!();
    println!(
        "{} ({} operations, {} query shapes, {} candidates)",
        collection.namespace,
        collection.total_operations(),
        collection.statistics.len(),
        collection.candidate_count
    );
    for index in &collection.indexes {
        let marker = if collection.existing_indexes.contains(index) {
            " "
        } else {
            "+"
        };
        println!("  {} {}", marker, index);
    }
    for index in collection.indexes_to_drop() {
        println!("  - {}", index);
    }
    for (kind, count) in &collection.not_implemented {
        println!("  ! {} {} operation(s) not analyzed", count, kind);
    }
    if !collection.failed_operations.is_empty() {
        println!(
            "  ! {} failed operation(s)",
            collection.failed_operations.len()
        );
    }
}
