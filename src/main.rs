use std::process;
use std::sync::Arc;

use thiserror::Error;
use tracing::{Dispatch, Level, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

use marketscope::{
    client::{ApiClient, ClientError},
    config::{self, AnalyzeArgs, Command, Settings},
    domain::{Selection, SelectionState},
    infra::{InfraError, telemetry},
    presentation::dashboard,
    query::{AnalysisSession, EventBus, GraphError, QueryGraph, QueryStore},
};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Settings(#[from] config::LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        report_application_error(&err);
        process::exit(1);
    }
}

fn report_application_error(err: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %err, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %err, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Some(Command::Analyze(args)) => analyze(*args, settings).await,
        None => {
            // clap prints usage for bare invocations.
            use clap::CommandFactory;
            let _ = config::CliArgs::command().print_help();
            Ok(())
        }
    }
}

async fn analyze(args: AnalyzeArgs, settings: Settings) -> Result<(), AppError> {
    let selection = match (args.industry, args.company) {
        (Some(industry), _) => Selection::industry(industry),
        (_, Some(company)) => Selection::company(company),
        (None, None) => Selection::None,
    };

    let api = Arc::new(ApiClient::new(&settings.api)?);
    let events = Arc::new(EventBus::new());
    let store = Arc::new(QueryStore::new(events));
    let graph = QueryGraph::standard()?;
    let state = Arc::new(SelectionState::new());
    let session = AnalysisSession::new(
        graph,
        store,
        state,
        api,
        settings.cache.event_batch_limit,
    );

    session.select(selection.clone());
    session.run_until_settled().await;

    println!("{}", dashboard::render(&selection, &session.views()));

    Ok(())
}
