use std::{
    io::{self, Write},
    process,
    sync::Arc,
};

use rentdesk::{
    application::{
        dashboard::DashboardService, error::AppError, mutations::MutationGateway,
        pagination::PageQuery, query::QueryFacade, repos::RemoteStore, repos::RepoError,
    },
    cache::{CacheConfig, CacheStore},
    config::{self, CliArgs, Command},
    infra::{error::InfraError, memory::MemoryStore, rest::RestStore, telemetry},
};
use serde::Serialize;
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let causes = error.report();
    if dispatcher::has_been_set() {
        error!(error = %error, causes = ?causes, "{}", error.presentation_message());
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, causes = ?causes, "{}", error.presentation_message());
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let app = build_application_context(&cli_args, &settings)?;
    let result = run_command(&app, cli_args.command).await;

    if cli_args.cache_stats {
        let stats = serde_json::to_string_pretty(&app.cache.stats())
            .map_err(|err| AppError::unexpected(format!("failed to render cache stats: {err}")))?;
        eprintln!("{stats}");
    }

    result
}

struct ApplicationContext {
    cache: Arc<CacheStore>,
    query: Arc<QueryFacade>,
    mutations: MutationGateway,
    dashboard: DashboardService,
}

fn build_application_context(
    cli: &CliArgs,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let remote: Arc<dyn RemoteStore> = if cli.memory {
        info!(target = "rentdesk::bootstrap", "Using in-memory demo dataset");
        Arc::new(MemoryStore::demo())
    } else {
        let store = RestStore::new(&settings.remote)?;
        info!(
            target = "rentdesk::bootstrap",
            base_url = %store.base_url(),
            "Using remote table store"
        );
        Arc::new(store)
    };

    let cache = Arc::new(CacheStore::new(CacheConfig::from(&settings.cache)));
    info!(
        target = "rentdesk::bootstrap",
        enabled = cache.is_enabled(),
        capacity = cache.capacity(),
        "Result cache ready"
    );

    let query = Arc::new(QueryFacade::new(remote.clone(), cache.clone()));
    let mutations = MutationGateway::new(remote, cache.clone());
    let dashboard = DashboardService::new(query.clone());

    Ok(ApplicationContext {
        cache,
        query,
        mutations,
        dashboard,
    })
}

async fn run_command(app: &ApplicationContext, command: Command) -> Result<(), AppError> {
    match command {
        Command::List(args) => {
            let mut query = PageQuery::new(args.page, args.limit);
            query.sort_by = args.sort;
            query.sort_order = args.order;
            query.filters = args.filters.into_iter().collect();
            query.joins = args.joins;

            let page = app.query.get_paginated_data(&args.table, &query).await?;
            print_json(page.as_ref())
        }
        Command::Options(args) => {
            let options = app
                .query
                .get_filter_options(&args.table, &args.field)
                .await?;
            print_json(options.as_ref())
        }
        Command::Suggest(args) => {
            let rows = app
                .query
                .get_search_suggestions(&args.table, &args.term, args.limit)
                .await?;
            print_json(rows.as_ref())
        }
        Command::Get(args) => match app.query.get_by_id(&args.table, &args.id).await? {
            Some(row) => print_json(&row),
            None => Err(AppError::from(RepoError::NotFound)),
        },
        Command::Update(args) => {
            if args.patch.is_empty() {
                return Err(AppError::validation("patch must change at least one column"));
            }
            let row = app
                .mutations
                .update(&args.table, &args.id, args.patch)
                .await?;
            print_json(&row)
        }
        Command::Delete(args) => {
            app.mutations.delete(&args.table, &args.id).await?;
            print_json(&json!({ "table": args.table, "deleted": args.id }))
        }
        Command::Dashboard => {
            let overview = app.dashboard.overview().await?;
            print_json(&overview)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    writeln!(io::stdout().lock(), "{rendered}").map_err(InfraError::from)?;
    Ok(())
}
