use clap::Parser;
use ctf_format::CtfStreamWriter;
use etl2ctf::converter::CtfConverter;
use etl2ctf::dissector::DissectorRegistry;
use etl2ctf::dissectors;
use etl2ctf::source::{Capture, Record};
use eyre::{Context, Result};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "etl2ctf")]
#[command(about = "transcode event trace captures into a CTF trace folder")]
struct Args {
    #[arg(required = true, help = "input trace capture files")]
    traces: Vec<PathBuf>,

    #[arg(
        short,
        long,
        default_value = "ctf",
        help = "output folder for stream and metadata files"
    )]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut registry = DissectorRegistry::new();
    dissectors::register_defaults(&mut registry);

    let mut writer = CtfStreamWriter::new();
    writer
        .open_folder(&args.output)
        .with_context(|| format!("failed to open output folder path={}", args.output.display()))?;

    let mut converter = CtfConverter::new(registry, writer);
    converter.start()?;

    for path in &args.traces {
        let capture = Capture::open(path)?;
        for record in capture.records() {
            match record? {
                Record::BufferBegin(buffer) => {
                    if let Err(e) = converter.on_buffer(&buffer) {
                        tracing::warn!(error = %e, "failed to switch stream");
                    }
                }
                Record::Event(event) => {
                    if let Err(e) = converter.on_event(&event) {
                        tracing::warn!(error = %e, "failed to convert event");
                    }
                }
            }
        }
    }

    converter.finish().context("failed to serialize metadata")?;

    tracing::info!(output = %args.output.display(), "trace conversion complete");
    Ok(())
}
