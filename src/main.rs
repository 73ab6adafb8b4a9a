use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

mod cli;
mod config;
mod corpus;
mod render;
mod search;
mod semantic;
#[cfg(test)]
mod tests;
mod web;

use cli::Command;
use config::Config;
use corpus::{CorpusLoader, CorpusSource};
use render::{JsonPresenter, Presenter, TextPresenter};
use search::{SearchMode, SearchOutcome, SearchPhase, SearchSession};
use semantic::{Embedder, EmbeddingError, EmbeddingProvider, FastEmbedModel, ProviderStatus};

fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn presenter(json: bool) -> Box<dyn Presenter> {
    if json {
        Box::new(JsonPresenter::new(std::io::stdout()))
    } else {
        Box::new(TextPresenter::new(std::io::stdout()))
    }
}

/// Loader for the configured fastembed model, run off the calling thread.
fn model_loader(
    config: &Config,
) -> impl FnOnce() -> Result<Box<dyn Embedder>, EmbeddingError> + Send + 'static {
    let model_name = config.semantic.model.clone();
    let cache_dir = config.base_path().to_path_buf();

    move || {
        FastEmbedModel::new(&model_name, cache_dir).map(|model| Box::new(model) as Box<dyn Embedder>)
    }
}

/// Load the model while showing a spinner driven by the provider status.
fn load_model_interactive(provider: &Arc<EmbeddingProvider>, config: &Config) {
    let handle = provider.spawn_initialize(model_loader(config), config.model_load_timeout());

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));

    while !handle.is_finished() {
        if let ProviderStatus::Loading { started_at } = provider.status() {
            let elapsed = (chrono::Utc::now() - started_at).num_seconds();
            spinner.set_message(format!(
                "loading embedding model '{}' ({elapsed}s)",
                config.semantic.model
            ));
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    spinner.finish_and_clear();

    match handle.join() {
        Ok(Ok(())) => {}
        // the search reports the reason through the provider status
        Ok(Err(err)) => log::debug!("model initialization failed: {err}"),
        Err(_) => log::error!("model initialization thread panicked"),
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = cli::Args::parse();

    let default_filter = match args.command {
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    init_logging(default_filter);

    let base_path = match args.base_path {
        Some(path) => path,
        None => config::default_base_path()?,
    };
    let config = Config::load_with(&base_path).context("failed to load config")?;

    let corpus_location = args.corpus.unwrap_or_else(|| config.corpus.clone());
    let source = CorpusSource::parse(&corpus_location, config.base_path())?;
    let corpus = CorpusLoader::new()
        .with_expected_dimensions(config.embedding_dimensions)
        .with_fetch_timeout(config.corpus_fetch_timeout())
        .load(&source)
        .with_context(|| format!("failed to load corpus from {source}"))?;

    let provider = Arc::new(EmbeddingProvider::new(
        corpus.dimensions().or(config.embedding_dimensions),
        config.semantic.normalize,
    ));
    if !config.semantic.enabled {
        provider.disable("semantic search is disabled in configuration");
    }

    match args.command {
        Command::Chapters { json } => {
            let session = SearchSession::new(&corpus, provider, config.limits());
            presenter(json).render_chapter_list(&session.chapters())?;
        }

        Command::Chapter { index, json } => {
            let session = SearchSession::new(&corpus, provider, config.limits());
            let mut presenter = presenter(json);
            match session.chapter(index) {
                Some(detail) => presenter.render_chapter_detail(&detail)?,
                None => {
                    presenter.render_error(&format!("chapter {index} not found"))?;
                    return Ok(ExitCode::FAILURE);
                }
            }
        }

        Command::Search {
            query,
            mode,
            json,
            limit,
        } => {
            let mut limits = config.limits();
            if let Some(limit) = limit {
                limits.keyword_limit = limit;
                limits.semantic_top_k = limit;
            }

            if mode == SearchMode::Semantic && !query.trim().is_empty() && !provider.is_ready() {
                load_model_interactive(&provider, &config);
            }

            let session = SearchSession::new(&corpus, provider, limits);
            let mut presenter = presenter(json);

            let hits = match session.search(&query, mode) {
                SearchOutcome::Results(hits) => hits,
                _ => Vec::new(),
            };
            let status = match session.phase() {
                SearchPhase::Failed { message } => {
                    presenter.render_error(&message)?;
                    ExitCode::FAILURE
                }
                _ => {
                    presenter.render_search_results(&hits, mode == SearchMode::Semantic)?;
                    ExitCode::SUCCESS
                }
            };
            session.reset();

            return Ok(status);
        }

        Command::Stats { json } => {
            let session = SearchSession::new(&corpus, provider, config.limits());
            presenter(json).render_stats(&session.index().stats())?;
        }

        Command::Serve { bind } => {
            if config.semantic.enabled {
                // keyword search is served while the model loads
                provider.spawn_initialize(model_loader(&config), config.model_load_timeout());
            }

            let session = Arc::new(SearchSession::new(&corpus, provider, config.limits()));
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            web::start_daemon(session, &bind)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
