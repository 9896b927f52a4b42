mod cli;
mod config;
mod corpus;
mod dataset;
mod error;
mod pool;
mod preprocess;
mod tokenize;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use dataset::{merge_datasets, open_dataset, DatasetImpl, TokenDataset};
use env_logger::Env;
use log::{debug, info, LevelFilter};
use preprocess::preprocess;

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose, args.quiet);

    match &args.command {
        Some(Commands::Inspect {
            prefix,
            dataset_impl,
            count,
        }) => inspect(&mut io::stdout().lock(), prefix, *dataset_impl, *count),
        Some(Commands::Merge {
            output_prefix,
            input_prefixes,
        }) => merge(output_prefix, input_prefixes),
        None => run(&args),
    }
}

/// Level forced by `-v`/`-q`; without either, `RUST_LOG` (default `info`) decides.
fn log_level(verbose: u8, quiet: u8) -> Option<LevelFilter> {
    match (quiet, verbose) {
        (0, 0) => None,
        (0, 1) => Some(LevelFilter::Debug),
        (0, _) => Some(LevelFilter::Trace),
        (1, _) => Some(LevelFilter::Warn),
        _ => Some(LevelFilter::Error),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    if let Some(level) = log_level(verbose, quiet) {
        builder.filter_level(level);
    }
    let _ = builder.try_init();
}

fn run(args: &Cli) -> Result<()> {
    let conf = Config::from_cli(args).context("invalid arguments")?;
    debug!("config: {}", serde_json::to_string(&conf)?);

    let summary = preprocess(&conf, args.quiet == 0)
        .with_context(|| format!("failed to preprocess {}", conf.input.display()))?;

    for out in &summary.outputs {
        info!(
            "{}: {} documents, {} items, {} tokens -> {}",
            out.key,
            out.documents,
            out.items,
            out.tokens,
            out.prefix.display()
        );
    }
    info!(
        "Done: {} documents ({:.1} MB) in {:.2?}",
        summary.documents,
        summary.bytes as f64 / 1024.0 / 1024.0,
        summary.elapsed
    );
    Ok(())
}

fn inspect(
    out: &mut impl Write,
    prefix: &Path,
    dataset_impl: DatasetImpl,
    count: usize,
) -> Result<()> {
    let ds = open_dataset(dataset_impl, prefix)
        .with_context(|| format!("failed to open {}", prefix.display()))?;

    writeln!(out, "prefix:    {}", prefix.display())?;
    writeln!(out, "impl:      {dataset_impl:?}")?;
    writeln!(out, "dtype:     {}", ds.dtype().name())?;
    writeln!(out, "items:     {}", ds.len())?;
    writeln!(out, "documents: {}", ds.doc_idx().len().saturating_sub(1))?;
    writeln!(out, "tokens:    {}", ds.num_tokens())?;

    for i in 0..count.min(ds.len()) {
        let ids = ds.get(i)?;
        writeln!(out, "[{i}] {} tokens: {ids:?}", ids.len())?;
    }
    Ok(())
}

fn merge(output_prefix: &Path, input_prefixes: &[PathBuf]) -> Result<()> {
    for prefix in input_prefixes {
        info!("Merging {}", prefix.display());
    }
    let ds = merge_datasets(output_prefix, input_prefixes)
        .with_context(|| format!("failed to merge into {}", output_prefix.display()))?;
    info!(
        "Wrote {} items, {} documents to {}",
        ds.len(),
        ds.doc_idx().len().saturating_sub(1),
        output_prefix.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{make_builder, DType};

    fn write(prefix: &Path, docs: &[&[&[u32]]]) {
        let mut builder = make_builder(DatasetImpl::Mmap, prefix, DType::U16).unwrap();
        for doc in docs {
            for item in *doc {
                builder.add_item(item).unwrap();
            }
            builder.end_document();
        }
        builder.finalize().unwrap();
    }

    #[test]
    fn merge_then_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a_text_document");
        let b = dir.path().join("b_text_document");
        write(&a, &[&[&[1, 2, 0]], &[&[3], &[4, 0]]]);
        write(&b, &[&[&[5, 0]]]);

        let merged = dir.path().join("all_text_document");
        merge(&merged, &[a, b]).unwrap();

        let mut out = Vec::new();
        inspect(&mut out, &merged, DatasetImpl::Mmap, 2).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            &lines[1..],
            &[
                "impl:      Mmap",
                "dtype:     uint16",
                "items:     4",
                "documents: 3",
                "tokens:    8",
                "[0] 3 tokens: [1, 2, 0]",
                "[1] 1 tokens: [3]",
            ]
        );
        assert!(lines[0].ends_with("all_text_document"));
    }

    #[test]
    fn inspect_reports_missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let err = inspect(&mut Vec::<u8>::new(), &dir.path().join("nope"), DatasetImpl::Cached, 1)
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to open"));
    }

    #[test]
    fn merge_needs_inputs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(merge(&dir.path().join("out"), &[]).is_err());
    }

    #[test]
    fn log_level_overrides_only_when_asked() {
        assert_eq!(log_level(0, 0), None);
        assert_eq!(log_level(1, 0), Some(LevelFilter::Debug));
        assert_eq!(log_level(3, 0), Some(LevelFilter::Trace));
        assert_eq!(log_level(0, 1), Some(LevelFilter::Warn));
        assert_eq!(log_level(2, 2), Some(LevelFilter::Error));
    }
}
