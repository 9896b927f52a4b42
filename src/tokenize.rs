use std::{marker::PhantomData, path::Path};

use clap::ValueEnum;
use rust_tokenizers::{
    tokenizer::{BertTokenizer, Gpt2Tokenizer, Tokenizer},
    vocab::{BertVocab, Gpt2Vocab, Vocab},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const GPT2_EOD: &str = "<|endoftext|>";
const BERT_EOD: &str = "[SEP]";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
pub enum TokenizerType {
    #[value(name = "GPT2BPETokenizer")]
    #[serde(rename = "GPT2BPETokenizer")]
    Gpt2Bpe,
    #[value(name = "BertWordPieceLowerCase")]
    #[serde(rename = "BertWordPieceLowerCase")]
    BertWordPieceLowerCase,
    #[value(name = "BertWordPieceCase")]
    #[serde(rename = "BertWordPieceCase")]
    BertWordPieceCase,
}

impl TokenizerType {
    pub fn needs_merge_file(self) -> bool {
        matches!(self, Self::Gpt2Bpe)
    }
}

/// Text to token ids, shared read-only by every worker.
pub trait TextTokenizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Token ids for `text`, without special tokens and without truncation.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    fn eod(&self) -> u32;

    fn vocab_size(&self) -> usize;
}

/// Adapts any `rust_tokenizers` tokenizer to [`TextTokenizer`].
pub struct RustTokenizer<V, T> {
    tokenizer: T,
    name: &'static str,
    eod: u32,
    vocab_size: usize,
    _vocab: PhantomData<fn() -> V>,
}

impl<V: Vocab, T: Tokenizer<V>> RustTokenizer<V, T> {
    pub fn new(tokenizer: T, name: &'static str, eod_token: &str) -> Result<Self> {
        let values = tokenizer.vocab().values();
        let eod = values
            .get(eod_token)
            .copied()
            .ok_or_else(|| Error::MissingSpecialToken(eod_token.to_string()))?;
        let eod = u32::try_from(eod).map_err(|_| Error::InvalidTokenId(eod))?;
        let vocab_size = values.len();

        Ok(Self {
            tokenizer,
            name,
            eod,
            vocab_size,
            _vocab: PhantomData,
        })
    }
}

impl<V, T> TextTokenizer for RustTokenizer<V, T>
where
    V: Vocab,
    T: Tokenizer<V> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let tokens = self.tokenizer.tokenize(text);
        self.tokenizer
            .convert_tokens_to_ids(&tokens)
            .into_iter()
            .map(|id| u32::try_from(id).map_err(|_| Error::InvalidTokenId(id)))
            .collect()
    }

    fn eod(&self) -> u32 {
        self.eod
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}

pub fn load_tokenizer(
    kind: TokenizerType,
    vocab_file: &Path,
    merge_file: Option<&Path>,
) -> Result<Box<dyn TextTokenizer>> {
    match kind {
        TokenizerType::Gpt2Bpe => {
            let merge_file = merge_file
                .ok_or_else(|| Error::Config("GPT2BPETokenizer needs --merge-file".into()))?;
            let tokenizer = Gpt2Tokenizer::from_file(vocab_file, merge_file, false)?;
            Ok(Box::new(RustTokenizer::<Gpt2Vocab, _>::new(
                tokenizer,
                "GPT2BPETokenizer",
                GPT2_EOD,
            )?))
        }
        TokenizerType::BertWordPieceLowerCase => {
            let tokenizer = BertTokenizer::from_file(vocab_file, true, true)?;
            Ok(Box::new(RustTokenizer::<BertVocab, _>::new(
                tokenizer,
                "BertWordPieceLowerCase",
                BERT_EOD,
            )?))
        }
        TokenizerType::BertWordPieceCase => {
            let tokenizer = BertTokenizer::from_file(vocab_file, false, false)?;
            Ok(Box::new(RustTokenizer::<BertVocab, _>::new(
                tokenizer,
                "BertWordPieceCase",
                BERT_EOD,
            )?))
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// One token per byte, shifted by one so that 0 is free for EOD.
    pub(crate) struct ByteTokenizer;

    impl TextTokenizer for ByteTokenizer {
        fn name(&self) -> &'static str {
            "bytes"
        }

        fn encode(&self, text: &str) -> Result<Vec<u32>> {
            Ok(text.bytes().map(|b| b as u32 + 1).collect())
        }

        fn eod(&self) -> u32 {
            0
        }

        fn vocab_size(&self) -> usize {
            257
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_gpt2_files(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let vocab = dir.join("vocab.json");
        let merges = dir.join("merges.txt");
        let entries = [
            r#""<|endoftext|>": 0"#,
            r#""h": 1"#,
            r#""e": 2"#,
            r#""l": 3"#,
            r#""o": 4"#,
            r#""he": 5"#,
            r#""ll": 6"#,
            r#""hell": 7"#,
        ];
        fs::write(&vocab, format!("{{{}}}", entries.join(", "))).unwrap();
        fs::write(&merges, "#version: 0.2\nh e\nl l\nhe ll\n").unwrap();
        (vocab, merges)
    }

    #[test]
    fn gpt2_encodes_with_merges() {
        let dir = tempfile::tempdir().unwrap();
        let (vocab, merges) = write_gpt2_files(dir.path());
        let tok = load_tokenizer(TokenizerType::Gpt2Bpe, &vocab, Some(&merges)).unwrap();

        assert_eq!(tok.name(), "GPT2BPETokenizer");
        assert_eq!(tok.eod(), 0);
        assert_eq!(tok.vocab_size(), 8);
        assert_eq!(tok.encode("hello").unwrap(), vec![7, 4]);
        assert!(tok.encode("").unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn loads_from_non_utf8_paths() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join(OsStr::from_bytes(b"voc\xffab"));
        fs::create_dir(&nested).unwrap();
        let (vocab, merges) = write_gpt2_files(&nested);

        let tok = load_tokenizer(TokenizerType::Gpt2Bpe, &vocab, Some(&merges)).unwrap();
        assert_eq!(tok.encode("hello").unwrap(), vec![7, 4]);
    }

    #[test]
    fn gpt2_requires_merge_file() {
        let dir = tempfile::tempdir().unwrap();
        let (vocab, _) = write_gpt2_files(dir.path());
        let err = load_tokenizer(TokenizerType::Gpt2Bpe, &vocab, None)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_vocab_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let merges = dir.path().join("nope.txt");
        assert!(load_tokenizer(TokenizerType::Gpt2Bpe, &missing, Some(&merges)).is_err());
    }

    #[test]
    fn bert_wordpiece_uses_sep_as_eod() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = dir.path().join("vocab.txt");
        fs::write(
            &vocab,
            "[PAD]\n[UNK]\n[CLS]\n[SEP]\n[MASK]\nhello\nworld\n##s\n",
        )
        .unwrap();

        let tok = load_tokenizer(TokenizerType::BertWordPieceLowerCase, &vocab, None).unwrap();
        assert_eq!(tok.eod(), 3);
        assert_eq!(tok.vocab_size(), 8);
        assert_eq!(tok.encode("Hello worlds").unwrap(), vec![5, 6, 7]);
    }

    #[test]
    fn tokenizer_type_names_round_trip_through_serde() {
        let kind: TokenizerType = serde_json::from_str(r#""BertWordPieceCase""#).unwrap();
        assert_eq!(kind, TokenizerType::BertWordPieceCase);
        assert_eq!(
            serde_json::to_string(&TokenizerType::Gpt2Bpe).unwrap(),
            r#""GPT2BPETokenizer""#
        );
        assert!(TokenizerType::Gpt2Bpe.needs_merge_file());
        assert!(!TokenizerType::BertWordPieceCase.needs_merge_file());
    }
}
