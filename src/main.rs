use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

use regexomatic::{Payload, PipelineConfig, Processor, Record};

#[derive(Parser)]
#[command(name = "regexomatic")]
#[command(about = "Split, parse and tag telemetry records with regular expressions")]
#[command(version)]
struct Args {
    /// YAML configuration bundle
    #[arg(short = 'c', long = "config")]
    config_file: PathBuf,

    /// Input file (default: stdin)
    #[arg(short = 'i', long = "input")]
    input_file: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long = "output")]
    output_file: Option<PathBuf>,

    /// How input lines are read
    #[arg(long, value_enum, default_value = "jsonl")]
    format: InputFormat,

    /// Namespace for records read with --format lines, slash separated
    #[arg(long, default_value = "regexomatic/line")]
    namespace: String,

    /// Print processing statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InputFormat {
    /// One serialized record per line
    Jsonl,
    /// Each line is the text payload of a new record
    Lines,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

fn main() {
    let args = Args::parse();

    init_logging(args.log_level);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout stays clean for records.
/// `RUST_LOG` directives win over `--log-level` when set.
fn init_logging(level: LogLevel) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(Level::from(level)).into())
        .from_env_lossy();

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr)
        .init();
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config_text = std::fs::read_to_string(&args.config_file).map_err(|e| {
        format!(
            "Failed to read config file '{}': {}",
            args.config_file.display(),
            e
        )
    })?;
    let config = PipelineConfig::from_yaml(&config_text)?;
    let processor = Processor::compile(&config)?;

    let input: Box<dyn BufRead> = if let Some(input_path) = &args.input_file {
        let file = File::open(input_path).map_err(|e| {
            format!(
                "Failed to open input file '{}': {}",
                input_path.display(),
                e
            )
        })?;
        Box::new(BufReader::new(file))
    } else {
        Box::new(BufReader::new(io::stdin()))
    };

    let namespace: Vec<String> = args
        .namespace
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let record = match args.format {
            InputFormat::Jsonl => {
                if line.trim().is_empty() {
                    continue;
                }
                serde_json::from_str::<Record>(&line)
                    .map_err(|e| format!("line {}: invalid record: {}", index + 1, e))?
            }
            InputFormat::Lines => Record::new(namespace.iter().cloned(), Payload::Text(line)),
        };
        records.push(record);
    }

    let (output_records, stats) = processor.process_with_stats(&records);

    let mut output: Box<dyn Write> = if let Some(output_path) = &args.output_file {
        let file = File::create(output_path).map_err(|e| {
            format!(
                "Failed to create output file '{}': {}",
                output_path.display(),
                e
            )
        })?;
        Box::new(io::BufWriter::new(file))
    } else {
        Box::new(io::BufWriter::new(io::stdout()))
    };

    for record in &output_records {
        serde_json::to_writer(&mut output, record)?;
        writeln!(output)?;
    }
    output.flush()?;

    if args.stats {
        eprintln!("Statistics:");
        eprintln!("  Records in: {}", stats.records_in);
        eprintln!("  Records out: {}", stats.records_out);
        eprintln!("  Errors: {}", stats.errors);
        if processor.is_gated() {
            eprintln!("  Gate matches: {}", stats.gate_matches);
            eprintln!("  Passed through: {}", stats.passthrough);
        }
        eprintln!("  Processing time: {:?}", stats.processing_time);
    }

    Ok(())
}
