// manet-pcap-stats/src/main.rs
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};
use log::error;
use manet_pcap_stats::{
    discover_captures, dissect_pcap, pcap_collector, render_summary, write_report, CollectError,
    CollectorOptions, FailurePolicy, Protocol, ReportConfig, ReportFormat,
};

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    env_logger::init();

    let matches = Command::new("manet-pcap-stats")
        .version(clap::crate_version!())
        .about("Tally AODV / OLSR routing-control messages in pcap captures")
        .subcommand_required(true)
        .subcommand(
            Command::new("analyze")
                .about("Classify control messages in one or more captures and write a report")
                .arg(Arg::new("protocol")
                    .help("Routing protocol to analyze")
                    .required(true)
                    .value_parser(["aodv", "olsr"])
                    .index(1))
                .arg(Arg::new("files")
                    .help("Capture files, in processing order (default: discover <protocol>-control-*.pcap)")
                    .num_args(0..)
                    .index(2))
                .arg(Arg::new("dir")
                    .short('d')
                    .long("dir")
                    .value_name("DIR")
                    .help("Directory searched when no files are given")
                    .default_value("."))
                .arg(Arg::new("output-dir")
                    .short('o')
                    .long("output-dir")
                    .value_name("DIR")
                    .help("Directory the report is written to")
                    .default_value("."))
                .arg(Arg::new("report")
                    .long("report")
                    .value_name("FILE")
                    .help("Report file name (default: <protocol>_analysis_report.<format>)"))
                .arg(Arg::new("chart")
                    .long("chart")
                    .value_name("FILE")
                    .help("Chart file name (default: <protocol>_packet_types_distribution.svg)"))
                .arg(Arg::new("format")
                    .short('f')
                    .long("format")
                    .value_name("FORMAT")
                    .help("Report format")
                    .value_parser(["html", "json", "csv", "summary"])
                    .default_value("html"))
                .arg(Arg::new("fail-fast")
                    .long("fail-fast")
                    .help("Stop at the first unreadable capture instead of skipping it")
                    .action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("dissect")
                .about("Dump the decoded records of one capture as JSON")
                .arg(Arg::new("pcap")
                    .help("The pcap file to dissect")
                    .required(true)
                    .index(1))
                .arg(Arg::new("output")
                    .short('o')
                    .long("output")
                    .value_name("FILE")
                    .help("Output file (default: stdout)"))
                .arg(Arg::new("limit")
                    .short('n')
                    .long("limit")
                    .value_name("N")
                    .help("Limit to first N packets")
                    .value_parser(clap::value_parser!(usize))),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("analyze", sub)) => analyze(sub),
        Some(("dissect", sub)) => dissect(sub),
        _ => unreachable!("subcommand_required"),
    }
}

fn analyze(matches: &ArgMatches) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let protocol: Protocol = string_arg(matches, "protocol").parse()?;
    let format: ReportFormat = string_arg(matches, "format").parse()?;

    let mut config = ReportConfig::new(protocol, format);
    config.output_dir = PathBuf::from(string_arg(matches, "output-dir"));
    if let Some(report) = matches.get_one::<String>("report") {
        config.report_file = report.clone();
    }
    if let Some(chart) = matches.get_one::<String>("chart") {
        config.chart_file = chart.clone();
    }

    let files: Vec<PathBuf> = match matches.get_many::<String>("files") {
        Some(files) => files.map(PathBuf::from).collect(),
        None => discover_captures(&PathBuf::from(string_arg(matches, "dir")), protocol)?,
    };
    if files.is_empty() {
        println!(
            "No capture files found. Expected {}-control-*.pcap in the search directory.",
            protocol.name()
        );
        return Ok(ExitCode::SUCCESS);
    }
    println!("Found {} capture files to analyze...", files.len());

    let failure_policy = if matches.get_flag("fail-fast") {
        FailurePolicy::Halt
    } else {
        FailurePolicy::Continue
    };
    let collector = pcap_collector(protocol).with_options(CollectorOptions { failure_policy });

    let dataset = match collector.collect(&files) {
        Ok(dataset) => dataset,
        Err(CollectError::Halted { completed, source }) => {
            error!("{}", source);
            print!("{}", render_summary(&completed));
            return Err(source.into());
        }
    };

    println!();
    print!("{}", render_summary(&dataset));

    for path in write_report(&dataset, &config)? {
        println!("Report written to {}", path.display());
    }

    if dataset.failures.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn dissect(matches: &ArgMatches) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut result = dissect_pcap(string_arg(matches, "pcap"))?;
    if let Some(n) = matches.get_one::<usize>("limit") {
        result.truncate(*n);
    }
    let output = serde_json::to_string_pretty(&result)?;

    if let Some(output_file) = matches.get_one::<String>("output") {
        std::fs::write(output_file, output)?;
        println!("Output written to {}", output_file);
    } else {
        println!("{}", output);
    }
    Ok(ExitCode::SUCCESS)
}

fn string_arg<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default()
}
