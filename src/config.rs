use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    cli::Cli,
    dataset::DatasetImpl,
    error::{Error, IoContext, Result},
    pool::EncodeOptions,
    tokenize::TokenizerType,
};

pub const DEFAULT_JSON_KEY: &str = "text";
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_CHUNK_SIZE: usize = 25;
pub const DEFAULT_LOG_INTERVAL: usize = 100;

/// Partial settings, as read from a json config file or the command line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub input: Option<PathBuf>,
    pub json_keys: Option<Vec<String>>,
    pub tokenizer_type: Option<TokenizerType>,
    pub vocab_file: Option<PathBuf>,
    pub merge_file: Option<PathBuf>,
    pub append_eod: Option<bool>,
    pub split_sentences: Option<bool>,
    pub keep_newlines: Option<bool>,
    pub output_prefix: Option<PathBuf>,
    pub dataset_impl: Option<DatasetImpl>,
    pub workers: Option<usize>,
    pub chunk_size: Option<usize>,
    pub log_interval: Option<usize>,
}

impl ConfigFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_path(path)?;
        serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Fields set in `over` win.
    pub fn merge(self, over: ConfigFile) -> ConfigFile {
        ConfigFile {
            input: over.input.or(self.input),
            json_keys: over.json_keys.or(self.json_keys),
            tokenizer_type: over.tokenizer_type.or(self.tokenizer_type),
            vocab_file: over.vocab_file.or(self.vocab_file),
            merge_file: over.merge_file.or(self.merge_file),
            append_eod: over.append_eod.or(self.append_eod),
            split_sentences: over.split_sentences.or(self.split_sentences),
            keep_newlines: over.keep_newlines.or(self.keep_newlines),
            output_prefix: over.output_prefix.or(self.output_prefix),
            dataset_impl: over.dataset_impl.or(self.dataset_impl),
            workers: over.workers.or(self.workers),
            chunk_size: over.chunk_size.or(self.chunk_size),
            log_interval: over.log_interval.or(self.log_interval),
        }
    }
}

impl From<&Cli> for ConfigFile {
    fn from(cli: &Cli) -> Self {
        ConfigFile {
            input: cli.input.clone(),
            json_keys: cli.json_keys.clone(),
            tokenizer_type: cli.tokenizer_type,
            vocab_file: cli.vocab_file.clone(),
            merge_file: cli.merge_file.clone(),
            // A bare flag can only switch the option on.
            append_eod: cli.append_eod.then_some(true),
            split_sentences: cli.split_sentences.then_some(true),
            keep_newlines: cli.keep_newlines.then_some(true),
            output_prefix: cli.output_prefix.clone(),
            dataset_impl: cli.dataset_impl,
            workers: cli.workers,
            chunk_size: cli.chunk_size,
            log_interval: cli.log_interval,
        }
    }
}

/// Fully resolved settings of one preprocessing run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Config {
    pub input: PathBuf,
    pub json_keys: Vec<String>,
    pub tokenizer_type: TokenizerType,
    pub vocab_file: PathBuf,
    pub merge_file: Option<PathBuf>,
    pub append_eod: bool,
    pub split_sentences: bool,
    pub keep_newlines: bool,
    pub output_prefix: PathBuf,
    pub dataset_impl: DatasetImpl,
    pub workers: usize,
    pub chunk_size: usize,
    pub log_interval: usize,
}

impl Config {
    /// Command-line values override the config file named by `--config`.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let base = match &cli.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        Self::resolve(base.merge(ConfigFile::from(cli)))
    }

    pub fn resolve(file: ConfigFile) -> Result<Self> {
        let required = |name: &str| Error::Config(format!("missing required option --{name}"));
        let config = Config {
            input: file.input.ok_or_else(|| required("input"))?,
            json_keys: file
                .json_keys
                .unwrap_or_else(|| vec![DEFAULT_JSON_KEY.to_string()]),
            tokenizer_type: file.tokenizer_type.unwrap_or(TokenizerType::Gpt2Bpe),
            vocab_file: file.vocab_file.ok_or_else(|| required("vocab-file"))?,
            merge_file: file.merge_file,
            append_eod: file.append_eod.unwrap_or(false),
            split_sentences: file.split_sentences.unwrap_or(false),
            keep_newlines: file.keep_newlines.unwrap_or(false),
            output_prefix: file.output_prefix.ok_or_else(|| required("output-prefix"))?,
            dataset_impl: file.dataset_impl.unwrap_or_default(),
            workers: file.workers.unwrap_or(DEFAULT_WORKERS),
            chunk_size: file.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            log_interval: file.log_interval.unwrap_or(DEFAULT_LOG_INTERVAL),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tokenizer_type.needs_merge_file() && self.merge_file.is_none() {
            return Err(Error::Config(
                "missing required option --merge-file for GPT2BPETokenizer".into(),
            ));
        }
        if self.json_keys.is_empty() {
            return Err(Error::Config("--json-keys needs at least one key".into()));
        }
        if let Some(key) = self.json_keys.iter().find(|k| k.is_empty()) {
            return Err(Error::Config(format!("invalid json key {key:?}")));
        }
        for (name, value) in [
            ("workers", self.workers),
            ("chunk-size", self.chunk_size),
            ("log-interval", self.log_interval),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("--{name} must be at least 1")));
            }
        }
        Ok(())
    }

    /// Records read per round: one chunk for every worker.
    pub fn batch_size(&self) -> usize {
        self.workers * self.chunk_size
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            append_eod: self.append_eod,
            split_sentences: self.split_sentences,
            keep_newlines: self.keep_newlines,
        }
    }

    /// Dataset prefix written for `key`: `{prefix}_{key}_document`, or
    /// `_sentence` when items are sentences.
    pub fn output_prefix_for(&self, key: &str) -> PathBuf {
        let level = if self.split_sentences {
            "sentence"
        } else {
            "document"
        };
        let mut name = self.output_prefix.as_os_str().to_owned();
        name.push(format!("_{key}_{level}"));
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("preprocess_data").chain(args.iter().copied())).unwrap()
    }

    const GPT2: &[&str] = &[
        "--input",
        "my-corpus.json",
        "--output-prefix",
        "my-gpt2",
        "--vocab-file",
        "../gpt2-vocab.json",
        "--dataset-impl",
        "mmap",
        "--tokenizer-type",
        "GPT2BPETokenizer",
        "--merge-file",
        "../gpt2-merges.txt",
        "--append-eod",
        "--workers",
        "5",
    ];

    #[test]
    fn resolves_gpt2_invocation() {
        let config = Config::from_cli(&cli(GPT2)).unwrap();
        assert_eq!(
            config,
            Config {
                input: "my-corpus.json".into(),
                json_keys: vec!["text".into()],
                tokenizer_type: TokenizerType::Gpt2Bpe,
                vocab_file: "../gpt2-vocab.json".into(),
                merge_file: Some("../gpt2-merges.txt".into()),
                append_eod: true,
                split_sentences: false,
                keep_newlines: false,
                output_prefix: "my-gpt2".into(),
                dataset_impl: DatasetImpl::Mmap,
                workers: 5,
                chunk_size: DEFAULT_CHUNK_SIZE,
                log_interval: DEFAULT_LOG_INTERVAL,
            }
        );
        assert_eq!(config.batch_size(), 125);
        assert_eq!(
            config.output_prefix_for("text"),
            PathBuf::from("my-gpt2_text_document")
        );
    }

    #[test]
    fn missing_required_options() {
        let err = Config::from_cli(&cli(&["--input", "a.json"])).unwrap_err();
        assert!(err.to_string().contains("--vocab-file"));

        let err = Config::from_cli(&cli(&[
            "--input",
            "a.json",
            "--vocab-file",
            "v.json",
            "--output-prefix",
            "out",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("--merge-file"));
    }

    #[test]
    fn bert_needs_no_merge_file() {
        let config = Config::from_cli(&cli(&[
            "--input",
            "a.json",
            "--vocab-file",
            "vocab.txt",
            "--output-prefix",
            "out",
            "--tokenizer-type",
            "BertWordPieceLowerCase",
        ]))
        .unwrap();
        assert_eq!(config.merge_file, None);
        assert!(!config.append_eod);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn zero_values_are_rejected() {
        for flag in ["--workers", "--chunk-size", "--log-interval"] {
            let mut args = GPT2[..GPT2.len() - 2].to_vec();
            args.extend([flag, "0"]);
            let err = Config::from_cli(&cli(&args)).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{flag}");
        }
    }

    #[test]
    fn command_line_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(
            &path,
            r#"{
                "input": "from-file.json",
                "vocab_file": "vocab.json",
                "merge_file": "merges.txt",
                "output_prefix": "file-out",
                "dataset_impl": "cached",
                "json_keys": ["text", "title"],
                "append_eod": true,
                "workers": 3
            }"#,
        )
        .unwrap();

        let config = Config::from_cli(&cli(&[
            "--config",
            path.to_str().unwrap(),
            "--workers",
            "8",
            "--output-prefix",
            "cli-out",
        ]))
        .unwrap();
        assert_eq!(config.input, PathBuf::from("from-file.json"));
        assert_eq!(config.output_prefix, PathBuf::from("cli-out"));
        assert_eq!(config.workers, 8);
        assert_eq!(config.dataset_impl, DatasetImpl::Cached);
        assert_eq!(config.json_keys, vec!["text", "title"]);
        assert!(config.append_eod);
    }

    #[test]
    fn split_sentences_changes_output_level() {
        let mut args = GPT2.to_vec();
        args.push("--split-sentences");
        let config = Config::from_cli(&cli(&args)).unwrap();
        assert_eq!(
            config.output_prefix_for("text"),
            PathBuf::from("my-gpt2_text_sentence")
        );
        assert_eq!(
            config.encode_options(),
            EncodeOptions {
                append_eod: true,
                split_sentences: true,
                keep_newlines: false,
            }
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(&path, r#"{"split_sentences": true, "keep_newlines": true}"#).unwrap();
        let mut args = GPT2.to_vec();
        args.extend(["--config", path.to_str().unwrap()]);
        let config = Config::from_cli(&cli(&args)).unwrap();
        assert!(config.split_sentences);
        assert!(config.keep_newlines);
    }

    #[test]
    fn unknown_config_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(&path, r#"{"inptu": "typo.json"}"#).unwrap();
        assert!(matches!(ConfigFile::load(&path), Err(Error::Config(_))));
    }
}
