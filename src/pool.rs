use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    corpus::Document,
    error::{Error, Result},
    tokenize::TextTokenizer,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    pub append_eod: bool,
    pub split_sentences: bool,
    pub keep_newlines: bool,
}

impl EncodeOptions {
    /// Pieces of `text` encoded as separate items. Sentence boundaries follow
    /// UAX #29; without `keep_newlines` the surrounding whitespace is dropped.
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        if !self.split_sentences {
            return vec![text];
        }
        text.unicode_sentences()
            .map(|s| if self.keep_newlines { s } else { s.trim() })
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedDocument {
    pub line: usize,
    pub bytes: usize,
    /// Per key, the sentences of that key. Empty when the text had no tokens.
    pub sentences: Vec<Vec<Vec<u32>>>,
}

/// Encodes every text of `doc`. Pieces without tokens are dropped and EOD,
/// if enabled, ends the last remaining piece of each key.
pub fn encode_document(
    tokenizer: &dyn TextTokenizer,
    options: &EncodeOptions,
    doc: Document,
) -> Result<EncodedDocument> {
    let sentences = doc
        .texts
        .iter()
        .map(|text| {
            let mut encoded = Vec::new();
            for piece in options.split(text) {
                let ids = tokenizer.encode(piece)?;
                if !ids.is_empty() {
                    encoded.push(ids);
                }
            }
            if options.append_eod {
                if let Some(last) = encoded.last_mut() {
                    last.push(tokenizer.eod());
                }
            }
            Ok(encoded)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(EncodedDocument {
        line: doc.line,
        bytes: doc.bytes,
        sentences,
    })
}

/// Tokenizes batches of documents on a fixed number of threads.
pub struct WorkerPool<'t> {
    pool: ThreadPool,
    tokenizer: &'t dyn TextTokenizer,
    options: EncodeOptions,
}

impl<'t> WorkerPool<'t> {
    pub fn new(
        workers: usize,
        tokenizer: &'t dyn TextTokenizer,
        options: EncodeOptions,
    ) -> Result<Self> {
        if workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("encoder-{i}"))
            .build()?;

        Ok(Self {
            pool,
            tokenizer,
            options,
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Encodes `docs` in parallel; the output keeps the input order.
    pub fn encode_batch(&self, docs: Vec<Document>) -> Result<Vec<EncodedDocument>> {
        let tokenizer = self.tokenizer;
        let options = &self.options;
        self.pool.install(|| {
            docs.into_par_iter()
                .map(|doc| encode_document(tokenizer, options, doc))
                .collect()
        })
    }
}
