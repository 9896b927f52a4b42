use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::{dataset::DatasetImpl, tokenize::TokenizerType};

/// Tokenize a json-lines corpus into an indexed binary dataset.
#[derive(Parser, Debug)]
#[command(name = "preprocess_data", version, args_conflicts_with_subcommands = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    /// Json-lines corpus, one object per line
    #[arg(long, value_name = "PATH")]
    pub(crate) input: Option<PathBuf>,

    /// Keys to extract from each record
    #[arg(long, value_name = "KEY", num_args = 1..)]
    pub(crate) json_keys: Option<Vec<String>>,

    #[arg(long, value_enum)]
    pub(crate) tokenizer_type: Option<TokenizerType>,

    #[arg(long, value_name = "PATH")]
    pub(crate) vocab_file: Option<PathBuf>,

    /// BPE merge rules (GPT-2 tokenizer only)
    #[arg(long, value_name = "PATH")]
    pub(crate) merge_file: Option<PathBuf>,

    /// Append an end-of-document token after each record
    #[arg(long, default_value_t = false)]
    pub(crate) append_eod: bool,

    /// Write one item per sentence instead of one per record
    #[arg(long, default_value_t = false)]
    pub(crate) split_sentences: bool,

    /// Keep the newlines that end sentences (with --split-sentences)
    #[arg(long, default_value_t = false)]
    pub(crate) keep_newlines: bool,

    #[arg(long, value_name = "PREFIX")]
    pub(crate) output_prefix: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub(crate) dataset_impl: Option<DatasetImpl>,

    #[arg(long, value_name = "N")]
    pub(crate) workers: Option<usize>,

    /// Records handed to a worker at a time
    #[arg(long, value_name = "N")]
    pub(crate) chunk_size: Option<usize>,

    /// Report progress every N documents
    #[arg(long, value_name = "N")]
    pub(crate) log_interval: Option<usize>,

    /// Json file with default values for the flags above
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub(crate) verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    pub(crate) quiet: u8,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Print the layout of an existing dataset
    Inspect {
        /// Dataset prefix, without .bin/.idx
        prefix: PathBuf,

        #[arg(long, value_enum, default_value_t = DatasetImpl::Mmap)]
        dataset_impl: DatasetImpl,

        /// Number of leading items to print
        #[arg(short, long, default_value_t = 3)]
        count: usize,
    },

    /// Concatenate mmap datasets into a new one
    Merge {
        #[arg(long, value_name = "PREFIX")]
        output_prefix: PathBuf,

        #[arg(long = "input-prefix", value_name = "PREFIX", required = true)]
        input_prefixes: Vec<PathBuf>,
    },
}
