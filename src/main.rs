use std::{process, sync::Arc};

use foglio::{
    application::{
        documents::{DocumentService, SiteContext},
        error::AppError,
        moves::TreeMoveService,
        render::{DisabledMacroService, HttpMacroService, MacroService, RenderPipeline},
        repos::{DeletionLogRepo, DocumentsRepo, HealthRepo, JobsRepo, SubscriptionsRepo},
        subscriptions::SubscriptionService,
    },
    config,
    domain::experiments::ExperimentCatalog,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
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
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings)?;

    let listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "foglio::serve",
        addr = %settings.server.public_addr,
        "Listening"
    );

    let router = http::build_router(state);
    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let documents_repo: Arc<dyn DocumentsRepo> = repositories.clone();
    let deletion_log_repo: Arc<dyn DeletionLogRepo> = repositories.clone();
    let subscriptions_repo: Arc<dyn SubscriptionsRepo> = repositories.clone();
    let jobs_repo: Arc<dyn JobsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let experiments = Arc::new(load_experiments(settings)?);
    let macros = build_macro_service(settings)?;
    let render = Arc::new(RenderPipeline::new(macros));

    let site = SiteContext {
        default_locale: settings.site.default_locale.clone(),
        public_url: settings.site.public_url.clone(),
    };

    let documents = Arc::new(DocumentService::new(
        documents_repo.clone(),
        deletion_log_repo,
        experiments,
        render,
        site,
    ));
    let moves = Arc::new(TreeMoveService::new(documents_repo, jobs_repo));
    let subscriptions = Arc::new(SubscriptionService::new(subscriptions_repo));

    Ok(HttpState {
        documents,
        moves,
        subscriptions,
        health: health_repo,
    })
}

fn load_experiments(settings: &config::Settings) -> Result<ExperimentCatalog, AppError> {
    match &settings.experiments.file {
        Some(path) => {
            let catalog = ExperimentCatalog::load(path).map_err(|err| {
                AppError::from(InfraError::configuration(format!(
                    "experiment catalog `{}`: {err}",
                    path.display()
                )))
            })?;
            info!(
                target = "foglio::serve",
                path = %path.display(),
                "Loaded content-experiment catalog"
            );
            Ok(catalog)
        }
        None => Ok(ExperimentCatalog::empty()),
    }
}

fn build_macro_service(settings: &config::Settings) -> Result<Arc<dyn MacroService>, AppError> {
    match &settings.render.endpoint {
        Some(endpoint) => {
            let endpoint = endpoint.parse().map_err(|err| {
                AppError::from(InfraError::configuration(format!(
                    "render.endpoint: {err}"
                )))
            })?;
            let service = HttpMacroService::new(endpoint, settings.render.timeout)
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            Ok(Arc::new(service))
        }
        None => {
            info!(
                target = "foglio::serve",
                "No macro-expansion endpoint configured; serving stored renderings only"
            );
            Ok(Arc::new(DisabledMacroService))
        }
    }
}
