use crate::server::database::Store;
use crate::server::model::config::ServerConfig;
use crate::server::receipt::qr::QrLinkGenerator;
use crate::server::service::token::TokenService;

pub(crate) struct AppState {
    store: Store,
    tokens: TokenService,
    qr: QrLinkGenerator,
    /// base url of the share links
    domain: String,
}

impl AppState {
    pub fn new(store: Store, tokens: TokenService, qr: QrLinkGenerator, domain: String) -> Self {
        Self {
            store,
            tokens,
            qr,
            domain,
        }
    }

    pub fn from_config(store: Store, config: &ServerConfig) -> Self {
        Self::new(
            store,
            TokenService::from_config(config),
            QrLinkGenerator::new(config.qr_module_size, config.qr_border),
            config.domain.clone(),
        )
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn qr(&self) -> &QrLinkGenerator {
        &self.qr
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}
