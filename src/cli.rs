use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::search::SearchMode;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding config.yaml and downloaded models.
    /// Defaults to $VS_BASE_PATH or ~/.local/share/vs
    #[clap(long, global = true)]
    pub base_path: Option<PathBuf>,

    /// Corpus file or http(s) URL, overrides the configured one
    #[clap(long, global = true)]
    pub corpus: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List chapters
    Chapters {
        /// Print JSON
        #[clap(long, default_value = "false")]
        json: bool,
    },
    /// Show a chapter with all its verses
    Chapter {
        /// 1-based chapter index
        index: usize,

        /// Print JSON
        #[clap(long, default_value = "false")]
        json: bool,
    },
    /// Search verses
    Search {
        query: String,

        /// keyword: substring match on translations.
        /// semantic: meaning-based match (loads the embedding model)
        #[clap(short, long, value_enum, default_value_t = SearchMode::Keyword)]
        mode: SearchMode,

        /// Print JSON
        #[clap(long, default_value = "false")]
        json: bool,

        /// Override the configured result limit
        #[clap(short, long)]
        limit: Option<usize>,
    },
    /// Show embedding coverage of the corpus
    Stats {
        /// Print JSON
        #[clap(long, default_value = "false")]
        json: bool,
    },
    /// Serve the HTTP API
    Serve {
        /// Bind address, overrides the configured one
        #[clap(long)]
        bind: Option<String>,
    },
}
