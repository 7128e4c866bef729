use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use smeta_agent::extract::{LlmExtractor, OrderExtractor};
use smeta_agent::fallback::RuleBasedExtractor;
use smeta_agent::intake::OrderIntake;
use smeta_agent::llm::{LlmError, OpenAiCompatClient};
use smeta_core::catalog::{Catalog, CatalogError};
use smeta_core::config::{AppConfig, ConfigError, LlmProvider, LoadOptions};
use smeta_core::session::SessionStore;
use smeta_docs::generator::RenderError;
use smeta_docs::DocumentGenerator;
use smeta_telegram::api::{BotApi, TelegramError};
use smeta_telegram::events::{OrderFlowHandler, UpdateDispatcher};
use smeta_telegram::poller::{PollingRunner, ReconnectPolicy};

pub struct Application {
    pub config: AppConfig,
    pub catalog: Arc<Catalog>,
    pub sessions: Arc<SessionStore>,
    pub documents: Arc<DocumentGenerator>,
    pub telegram_runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("catalog load failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("document templates failed to load: {0}")]
    Templates(#[from] RenderError),
    #[error("llm client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("telegram client setup failed: {0}")]
    Telegram(#[from] TelegramError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!("starting application bootstrap");

    let catalog = Arc::new(match &config.catalog.path {
        Some(path) => {
            info!(path = %path.display(), "loading external catalog");
            Catalog::load(path)?
        }
        None => Catalog::builtin(),
    });
    info!(
        products = catalog.products().len(),
        services = catalog.services().len(),
        "catalog ready"
    );

    let documents = Arc::new(if config.documents.template_dir.is_dir() {
        DocumentGenerator::new(&config.documents)?
    } else {
        warn!(
            template_dir = %config.documents.template_dir.display(),
            "template directory not found, using embedded templates"
        );
        DocumentGenerator::with_embedded_templates(&config.documents)
    });

    let primary: Option<Arc<dyn OrderExtractor>> = match config.llm.provider {
        LlmProvider::OpenaiCompatible => {
            let client = OpenAiCompatClient::new(&config.llm)?;
            info!(model = %config.llm.model, "llm extraction enabled");
            Some(Arc::new(LlmExtractor::new(client, &catalog)))
        }
        LlmProvider::Disabled => {
            warn!("llm provider disabled, intake runs rule-based only");
            None
        }
    };
    let intake = Arc::new(OrderIntake::new(primary, Arc::new(RuleBasedExtractor::new())));

    let sessions = Arc::new(SessionStore::new());

    let api = Arc::new(BotApi::new(&config.telegram)?);
    let mut dispatcher = UpdateDispatcher::new();
    dispatcher.register(Arc::new(OrderFlowHandler::new(
        api.clone(),
        intake,
        sessions.clone(),
        catalog.clone(),
        documents.clone(),
    )));

    let telegram_runner = PollingRunner::new(
        api,
        dispatcher,
        ReconnectPolicy::default(),
        config.telegram.poll_timeout_secs,
    );

    Ok(Application { config, catalog, sessions, documents, telegram_runner })
}
