use std::path::PathBuf;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use log::{debug, info, trace, warn};

use crate::{
    config::Config,
    corpus::CorpusReader,
    dataset::{self, best_fitting_dtype, DType, DatasetBuilder, DatasetImpl},
    error::Result,
    pool::WorkerPool,
    tokenize::{load_tokenizer, TextTokenizer},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeySummary {
    pub key: String,
    pub prefix: PathBuf,
    pub documents: usize,
    pub items: usize,
    pub tokens: usize,
}

#[derive(Clone, Debug, Default)]
pub struct PreprocessSummary {
    pub documents: usize,
    pub bytes: usize,
    pub outputs: Vec<KeySummary>,
    pub elapsed: Duration,
}

struct Progress {
    bar: ProgressBar,
    start: Instant,
    interval: usize,
    documents: usize,
    bytes: usize,
}

impl Progress {
    fn new(interval: usize, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} {pos} documents [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            bar,
            start: Instant::now(),
            interval,
            documents: 0,
            bytes: 0,
        }
    }

    fn record(&mut self, bytes: usize) {
        self.documents += 1;
        self.bytes += bytes;
        self.bar.inc(1);

        if self.documents % self.interval == 0 {
            let elapsed = self.start.elapsed().as_secs_f64().max(f64::EPSILON);
            let docs_per_s = self.documents as f64 / elapsed;
            let mb_per_s = self.bytes as f64 / elapsed / 1024.0 / 1024.0;
            self.bar.set_message(format!("{mb_per_s:.2} MB/s"));
            self.bar.suspend(|| {
                info!(
                    "Processed {} documents ({docs_per_s:.2} docs/s, {mb_per_s:.2} MB/s).",
                    self.documents
                )
            });
        }
    }

    fn finish(&self) -> Duration {
        self.bar.finish_and_clear();
        self.start.elapsed()
    }
}

/// Dtype of the data files for `impl_`; legacy layouts always store int32.
pub fn output_dtype(impl_: DatasetImpl, vocab_size: usize) -> DType {
    match impl_ {
        DatasetImpl::Mmap => best_fitting_dtype(vocab_size),
        DatasetImpl::Lazy | DatasetImpl::Cached => DType::I32,
    }
}

pub fn preprocess(config: &Config, show_progress: bool) -> Result<PreprocessSummary> {
    let start = Instant::now();
    let tokenizer = load_tokenizer(
        config.tokenizer_type,
        &config.vocab_file,
        config.merge_file.as_deref(),
    )?;
    info!(
        "Loaded {} with vocab size {} in {:.2?}",
        tokenizer.name(),
        tokenizer.vocab_size(),
        start.elapsed()
    );

    preprocess_with(config, tokenizer.as_ref(), show_progress)
}

/// Runs the pipeline with an already loaded tokenizer.
pub fn preprocess_with(
    config: &Config,
    tokenizer: &dyn TextTokenizer,
    show_progress: bool,
) -> Result<PreprocessSummary> {
    info!("Opening {}", config.input.display());
    let reader = CorpusReader::open(&config.input, &config.json_keys)?;
    let pool = WorkerPool::new(config.workers, tokenizer, config.encode_options())?;

    let dtype = output_dtype(config.dataset_impl, tokenizer.vocab_size());
    let mut outputs: Vec<(Box<dyn DatasetBuilder>, KeySummary)> =
        Vec::with_capacity(config.json_keys.len());
    for key in &config.json_keys {
        let prefix = config.output_prefix_for(key);
        if dataset::dataset_exists(&prefix) {
            warn!("Overwriting existing dataset {}", prefix.display());
        }
        info!(
            "Output prefix {} ({:?}, {})",
            prefix.display(),
            config.dataset_impl,
            dtype.name()
        );
        let builder = dataset::make_builder(config.dataset_impl, &prefix, dtype)?;
        let summary = KeySummary {
            key: key.clone(),
            prefix,
            ..Default::default()
        };
        outputs.push((builder, summary));
    }

    debug!(
        "Encoding with {} workers, {} records per batch",
        pool.workers(),
        config.batch_size()
    );
    let mut progress = Progress::new(config.log_interval, show_progress);
    for batch in &reader.chunks(config.batch_size()) {
        let docs = batch.collect::<Result<Vec<_>>>()?;
        for encoded in pool.encode_batch(docs)? {
            progress.record(encoded.bytes);
            trace!(
                "line {}: {:?} sentences per key",
                encoded.line,
                encoded.sentences.iter().map(Vec::len).collect::<Vec<_>>()
            );
            for ((builder, summary), sentences) in outputs.iter_mut().zip(&encoded.sentences) {
                if sentences.is_empty() {
                    continue;
                }
                for sentence in sentences {
                    builder.add_item(sentence)?;
                    summary.items += 1;
                    summary.tokens += sentence.len();
                }
                builder.end_document();
                summary.documents += 1;
            }
        }
    }

    let mut summaries = Vec::with_capacity(outputs.len());
    for (builder, summary) in outputs {
        builder.finalize()?;
        summaries.push(summary);
    }

    let elapsed = progress.finish();
    Ok(PreprocessSummary {
        documents: progress.documents,
        bytes: progress.bytes,
        outputs: summaries,
        elapsed,
    })
}
