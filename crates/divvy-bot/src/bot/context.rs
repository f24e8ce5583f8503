use tokio::sync::Mutex;

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::store::SubscriberStore;
use crate::telegram::TelegramClient;
use crate::yubico::YubicoSettings;

/// Shared state for update handlers and the digest scheduler.
pub(crate) struct BotContext {
    client: TelegramClient,
    config: Config,
    store: Mutex<SubscriberStore>,
    dashboard: Dashboard,
    yubico: Option<YubicoSettings>,
    http: reqwest::Client,
}

impl BotContext {
    pub(crate) fn new(
        client: TelegramClient,
        config: Config,
        store: SubscriberStore,
        dashboard: Dashboard,
        yubico: Option<YubicoSettings>,
    ) -> Self {
        Self {
            client,
            config,
            store: Mutex::new(store),
            dashboard,
            yubico,
            http: reqwest::Client::new(),
        }
    }

    pub(crate) fn client(&self) -> &TelegramClient {
        &self.client
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn store(&self) -> &Mutex<SubscriberStore> {
        &self.store
    }

    pub(crate) fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub(crate) fn yubico(&self) -> Option<&YubicoSettings> {
        self.yubico.as_ref()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}
