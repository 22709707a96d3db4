//! Runs every image of a directory through an operation chain and prints a
//! per-sample summary.
//!
//! ```bash
//! vistool ./images --recursive \
//!     --op decode:mode=rgb \
//!     --op resize:width=224,height=224 \
//!     --op flip:probability=0.5 \
//!     --op transpose
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use vistool::{
    ErrorCode, KvConf, OpRegistry, Sample, ThreadedTransformer, Transformer, TransformerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "vistool")]
#[command(about = "Preprocess a directory of images with a multi-threaded operation chain")]
struct Args {
    /// Directory containing the images
    dir: PathBuf,

    /// Operation to append, as `name` or `name:key=value,key=value` (repeatable)
    #[arg(long = "op", value_name = "SPEC", required = true)]
    ops: Vec<String>,

    /// Number of worker threads (defaults to available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Input queue capacity
    #[arg(long, default_value = "64")]
    queue_capacity: usize,

    /// Base seed for random operations
    #[arg(long)]
    seed: Option<u64>,

    /// File extensions to include (case-insensitive)
    #[arg(long, value_delimiter = ',', default_value = "jpg,jpeg,png")]
    extensions: Vec<String>,

    /// Scan subdirectories
    #[arg(short, long)]
    recursive: bool,
}

/// Parses `name:key=value,key=value` into an operation name and its configuration.
fn parse_op(spec: &str) -> Result<(String, KvConf)> {
    let (name, params) = match spec.split_once(':') {
        Some((name, params)) => (name.trim(), params),
        None => (spec.trim(), ""),
    };
    if name.is_empty() {
        bail!("operation spec {:?} has no name", spec);
    }

    let mut conf = KvConf::new();
    for pair in params.split(',').filter(|p| !p.trim().is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value in {:?}, got {:?}", spec, pair))?;
        conf.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok((name.to_string(), conf))
}

/// Collects image paths under `dir`, sorted for a stable id assignment.
fn collect_images(dir: &Path, extensions: &[String], recursive: bool) -> Result<Vec<PathBuf>> {
    let extensions: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
    let walker = WalkDir::new(dir).max_depth(if recursive { usize::MAX } else { 1 });

    let mut paths = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext.to_lowercase()));
        if matches {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Label of an image: the name of its parent directory.
fn label_of(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn feed(transformer: &ThreadedTransformer, paths: &[PathBuf]) -> Result<()> {
    for (id, path) in paths.iter().enumerate() {
        let data =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let id = u32::try_from(id).context("too many images for 32-bit sample ids")?;
        transformer.put(Sample::new(id, data).with_label(label_of(path)))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut builder = TransformerConfig::builder().queue_capacity(args.queue_capacity);
    if let Some(workers) = args.workers {
        builder = builder.worker_count(workers);
    }
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }

    let transformer = ThreadedTransformer::with_registry(OpRegistry::builtin());
    transformer.configure(builder.build())?;
    for spec in &args.ops {
        let (name, conf) = parse_op(spec)?;
        transformer
            .add_op(&name, &conf)
            .with_context(|| format!("Invalid operation {:?}", spec))?;
    }

    let paths = collect_images(&args.dir, &args.extensions, args.recursive)?;
    if paths.is_empty() {
        tracing::warn!(dir = %args.dir.display(), "No images found");
        return Ok(());
    }
    tracing::info!(images = paths.len(), "Processing directory");

    transformer.start()?;
    let started = Instant::now();

    let (ok, failed) = std::thread::scope(|s| -> Result<(usize, usize)> {
        let producer = s.spawn(|| {
            let fed = feed(&transformer, &paths);
            if fed.is_err() {
                // Unblocks the consumer below.
                let _ = transformer.stop();
            }
            fed
        });

        let (mut ok, mut failed) = (0usize, 0usize);
        while ok + failed < paths.len() {
            let output = match transformer.get() {
                Ok(output) => output,
                Err(e) if e.code() == ErrorCode::NoOutput => break,
                Err(e) => return Err(e.into()),
            };
            let path = &paths[output.id as usize];
            if output.is_ok() {
                ok += 1;
                println!(
                    "{}\t{}\tshape={:?}\tbytes={}",
                    path.display(),
                    output.label,
                    output.shape,
                    output.data.len()
                );
            } else {
                failed += 1;
                println!(
                    "{}\t{}\terror={}\t{}",
                    path.display(),
                    output.label,
                    output.error_code,
                    output.error_message
                );
            }
        }

        producer
            .join()
            .map_err(|_| anyhow!("producer thread panicked"))??;
        Ok((ok, failed))
    })?;

    transformer.stop()?;
    tracing::info!(
        ok,
        failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Done"
    );
    Ok(())
}
