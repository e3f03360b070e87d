use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use {
    anyhow::Result,
    async_trait::async_trait,
    tokio::{sync::Mutex, task::JoinHandle},
    tracing::{debug, error, info, warn},
    vtod_channels::{
        ChannelError, HealthSnapshot, NoopNotifier, Notifier, NotifierFactory, NotifierSettings,
    },
    vtod_config::{ConfigStore, DEFAULT_STOP_MESSAGE},
};

use crate::{
    PLUGIN,
    event::{EventListener, EventManager, ProxyEvent},
};

/// Delay between proxy initialization and the start announcement, giving
/// the gateway session time to come up.
pub const START_ANNOUNCE_DELAY: Duration = Duration::from_secs(2);

pub fn start_announcement(text: &str) -> String {
    format!(":white_check_mark: **{text}**")
}

pub fn stop_announcement(text: &str) -> String {
    format!(":octagonal_sign: **{text}**")
}

enum Lifecycle {
    NotStarted,
    Started {
        notifier: Arc<dyn Notifier>,
        announce: Option<JoinHandle<()>>,
    },
    Stopped,
}

/// Posts proxy start/stop announcements through a notifier.
pub struct BridgePlugin {
    me: Weak<BridgePlugin>,
    store: ConfigStore,
    factory: Arc<dyn NotifierFactory>,
    start_delay: Duration,
    state: Mutex<Lifecycle>,
}

pub struct BridgePluginBuilder {
    store: ConfigStore,
    factory: Arc<dyn NotifierFactory>,
    start_delay: Duration,
}

impl BridgePluginBuilder {
    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn build(self) -> Arc<BridgePlugin> {
        Arc::new_cyclic(|me| BridgePlugin {
            me: me.clone(),
            store: self.store,
            factory: self.factory,
            start_delay: self.start_delay,
            state: Mutex::new(Lifecycle::NotStarted),
        })
    }
}

impl BridgePlugin {
    pub fn builder(store: ConfigStore, factory: Arc<dyn NotifierFactory>) -> BridgePluginBuilder {
        BridgePluginBuilder {
            store,
            factory,
            start_delay: START_ANNOUNCE_DELAY,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// True between a successful start and the shutdown.
    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, Lifecycle::Started { .. })
    }

    /// Health of the active notifier, if started.
    pub async fn health(&self) -> Option<HealthSnapshot> {
        let notifier = match &*self.state.lock().await {
            Lifecycle::Started { notifier, .. } => Arc::clone(notifier),
            _ => return None,
        };
        Some(notifier.probe().await)
    }

    async fn on_start(&self, events: Arc<dyn EventManager>) -> Result<()> {
        let mut state = self.state.lock().await;
        if !matches!(*state, Lifecycle::NotStarted) {
            warn!("bridge already initialized, ignoring");
            return Ok(());
        }

        let outcome = self.store.ensure()?;
        debug!(outcome = ?outcome, "config file ready");
        let config = self.store.load()?;
        info!(config = ?config, "loaded config");

        let settings = NotifierSettings::from_config(&config);
        let notifier = match self.factory.connect(&settings).await {
            Ok(notifier) => notifier,
            Err(e) => {
                if matches!(e, ChannelError::MissingToken) {
                    error!("ERROR!! In the configuration file, enter the bot token and channel ID!");
                } else {
                    error!(error = %e, "an unexpected error occurred during bot initialization");
                }
                *state = Lifecycle::Started {
                    notifier: Arc::new(NoopNotifier::new(e.to_string())),
                    announce: None,
                };
                return Ok(());
            },
        };

        if let Some(me) = self.me.upgrade() {
            events.register(&PLUGIN, me);
        }
        events.register(&PLUGIN, Arc::new(NotifierListener::new(Arc::clone(&notifier))));

        let announce = spawn_announcement(
            Arc::clone(&notifier),
            self.start_delay,
            start_announcement(config.start_message()),
        );
        *state = Lifecycle::Started {
            notifier,
            announce: Some(announce),
        };
        info!(delay_ms = self.start_delay.as_millis() as u64, "bridge started");
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let (notifier, announce) = match std::mem::replace(&mut *state, Lifecycle::Stopped) {
            Lifecycle::Started { notifier, announce } => (notifier, announce),
            previous => {
                *state = previous;
                warn!("bridge is not running, ignoring shutdown");
                return Ok(());
            },
        };

        if let Some(task) = announce
            && !task.is_finished()
        {
            task.abort();
            debug!("start announcement still pending, cancelled");
        }

        // Read again so edits made while the proxy ran are picked up.
        let stop_text = match self.store.load() {
            Ok(config) => config.stop_message().to_string(),
            Err(e) => {
                warn!(
                    error = %format!("{e:#}"),
                    "failed to re-read config, using default stop message"
                );
                DEFAULT_STOP_MESSAGE.to_string()
            },
        };

        notifier.send_text(&stop_announcement(&stop_text)).await;
        notifier.shutdown().await;
        info!("bridge stopped");
        Ok(())
    }
}

#[async_trait]
impl EventListener for BridgePlugin {
    async fn on_event(&self, event: ProxyEvent, events: Arc<dyn EventManager>) -> Result<()> {
        match event {
            ProxyEvent::Initialize => self.on_start(events).await,
            ProxyEvent::Shutdown => self.on_stop().await,
        }
    }
}

fn spawn_announcement(
    notifier: Arc<dyn Notifier>,
    delay: Duration,
    message: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        notifier.send_text(&message).await;
        debug!("start announcement sent");
    })
}

/// Registers the notifier session with the host so it is visible alongside
/// the plugin. Reports session health on every event.
pub struct NotifierListener {
    notifier: Arc<dyn Notifier>,
}

impl NotifierListener {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl EventListener for NotifierListener {
    async fn on_event(&self, event: ProxyEvent, _events: Arc<dyn EventManager>) -> Result<()> {
        let health = self.notifier.probe().await;
        debug!(
            notifier = self.notifier.id(),
            event = %event,
            connected = health.connected,
            details = ?health.details,
            "notifier health"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::event::EventBus,
        secrecy::ExposeSecret,
        std::{
            fs,
            sync::{
                Mutex as StdMutex,
                atomic::{AtomicBool, AtomicUsize, Ordering},
            },
        },
    };

    #[derive(Default)]
    struct RecordingNotifier {
        sent: StdMutex<Vec<String>>,
        closed: AtomicBool,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn id(&self) -> &str {
            "recording"
        }

        async fn send_text(&self, text: &str) {
            self.sent.lock().unwrap().push(text.to_string());
        }

        async fn send_embed(&self, text: &str, color: u32, image_url: &str) {
            self.sent
                .lock()
                .unwrap()
                .push(format!("embed:{text}:{color:06x}:{image_url}"));
        }

        async fn probe(&self) -> HealthSnapshot {
            HealthSnapshot {
                connected: !self.closed(),
                details: None,
            }
        }

        async fn shutdown(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Hands out one shared recording notifier; rejects an empty token the
    /// way the Discord factory does.
    #[derive(Default)]
    struct MockFactory {
        notifier: Arc<RecordingNotifier>,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl NotifierFactory for MockFactory {
        async fn connect(
            &self,
            settings: &NotifierSettings,
        ) -> vtod_channels::Result<Arc<dyn Notifier>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if settings.token.expose_secret().is_empty() {
                return Err(ChannelError::MissingToken);
            }
            if settings.token.expose_secret() == "rejected" {
                return Err(ChannelError::Unauthorized("401 Unauthorized".into()));
            }
            Ok(Arc::clone(&self.notifier) as Arc<dyn Notifier>)
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        bus: Arc<EventBus>,
        factory: Arc<MockFactory>,
        plugin: Arc<BridgePlugin>,
    }

    impl Harness {
        /// `config` is written to `config.yml` before startup when given.
        fn new(config: Option<&str>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = ConfigStore::new(dir.path().join("mc-vtod"));
            if let Some(body) = config {
                fs::create_dir_all(store.data_dir()).unwrap();
                fs::write(store.config_path(), body).unwrap();
            }

            let factory = Arc::new(MockFactory::default());
            let plugin =
                BridgePlugin::builder(store, Arc::clone(&factory) as Arc<dyn NotifierFactory>)
                    .build();
            let bus = EventBus::new();
            bus.register(&PLUGIN, Arc::clone(&plugin) as Arc<dyn EventListener>);

            Self {
                _dir: dir,
                bus,
                factory,
                plugin,
            }
        }

        fn notifier(&self) -> &RecordingNotifier {
            &self.factory.notifier
        }

        fn write_config(&self, body: &str) {
            fs::write(self.plugin.store().config_path(), body).unwrap();
        }
    }

    const CONFIG: &str = "configuration-version: 1.2\n\
                          token: abc.def.ghi\n\
                          channel_id: \"1234\"\n\
                          start_message_text: Proxy is up\n\
                          stop_message_text: Proxy is down\n";

    #[tokio::test(start_paused = true)]
    async fn start_announcement_waits_for_delay() {
        let h = Harness::new(Some(CONFIG));
        assert_eq!(h.bus.fire(ProxyEvent::Initialize).await, 0);
        assert!(h.plugin.is_running().await);

        tokio::time::sleep(START_ANNOUNCE_DELAY - Duration::from_millis(1)).await;
        assert!(h.notifier().sent().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(h.notifier().sent(), vec![":white_check_mark: **Proxy is up**"]);
    }

    #[tokio::test(start_paused = true)]
    async fn registers_itself_and_the_notifier() {
        let h = Harness::new(Some(CONFIG));
        assert_eq!(h.bus.listeners_for(PLUGIN.id), 1);

        h.bus.fire(ProxyEvent::Initialize).await;
        // The plugin was already registered by the host; only the notifier is new.
        assert_eq!(h.bus.listeners_for(PLUGIN.id), 2);
        assert_eq!(h.factory.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_rereads_config_and_closes_session() {
        let h = Harness::new(Some(CONFIG));
        h.bus.fire(ProxyEvent::Initialize).await;
        tokio::time::sleep(START_ANNOUNCE_DELAY * 2).await;

        h.write_config(&CONFIG.replace("Proxy is down", "Edited while running"));
        assert_eq!(h.bus.fire(ProxyEvent::Shutdown).await, 0);

        assert_eq!(h.notifier().sent(), vec![
            ":white_check_mark: **Proxy is up**",
            ":octagonal_sign: **Edited while running**",
        ]);
        assert!(h.notifier().closed());
        assert!(!h.plugin.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn early_shutdown_cancels_pending_announcement() {
        let h = Harness::new(Some(CONFIG));
        h.bus.fire(ProxyEvent::Initialize).await;
        h.bus.fire(ProxyEvent::Shutdown).await;
        tokio::time::sleep(START_ANNOUNCE_DELAY * 2).await;

        assert_eq!(h.notifier().sent(), vec![":octagonal_sign: **Proxy is down**"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_falls_back_to_default_text() {
        let h = Harness::new(Some(CONFIG));
        h.bus.fire(ProxyEvent::Initialize).await;
        tokio::time::sleep(START_ANNOUNCE_DELAY * 2).await;

        fs::remove_file(h.plugin.store().config_path()).unwrap();
        assert_eq!(h.bus.fire(ProxyEvent::Shutdown).await, 0);

        let sent = h.notifier().sent();
        assert_eq!(sent.last().unwrap(), ":octagonal_sign: **Server has stopped**");
        assert!(h.notifier().closed());
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_data_dir_gets_default_config_and_noop_bot() {
        let h = Harness::new(None);
        assert_eq!(h.bus.fire(ProxyEvent::Initialize).await, 0);

        assert!(h.plugin.store().config_path().exists());
        assert_eq!(h.factory.connects.load(Ordering::SeqCst), 1);
        // No registration, no announcement.
        assert_eq!(h.bus.listeners_for(PLUGIN.id), 1);
        tokio::time::sleep(START_ANNOUNCE_DELAY * 2).await;
        assert!(h.notifier().sent().is_empty());

        let health = h.plugin.health().await.unwrap();
        assert!(!health.connected);
        assert_eq!(health.details.as_deref(), Some("bot token is empty"));

        assert_eq!(h.bus.fire(ProxyEvent::Shutdown).await, 0);
        assert!(h.notifier().sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_token_degrades_to_noop() {
        let h = Harness::new(Some(&CONFIG.replace("abc.def.ghi", "rejected")));
        assert_eq!(h.bus.fire(ProxyEvent::Initialize).await, 0);

        let health = h.plugin.health().await.unwrap();
        assert!(!health.connected);
        assert!(health.details.unwrap().contains("401"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_config_is_replaced_before_reading() {
        let h = Harness::new(Some(
            "configuration-version: 1.0\ntoken: abc.def.ghi\nstart_message_text: old\n",
        ));
        h.bus.fire(ProxyEvent::Initialize).await;

        // The default carries no token, so the bot degrades to a no-op.
        assert!(h.plugin.store().backup_path(Some(1.0)).exists());
        assert!(!h.plugin.health().await.unwrap().connected);
    }

    #[tokio::test(start_paused = true)]
    async fn second_initialize_is_ignored() {
        let h = Harness::new(Some(CONFIG));
        h.bus.fire(ProxyEvent::Initialize).await;
        h.bus.fire(ProxyEvent::Initialize).await;
        tokio::time::sleep(START_ANNOUNCE_DELAY * 2).await;

        assert_eq!(h.factory.connects.load(Ordering::SeqCst), 1);
        assert_eq!(h.notifier().sent().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_before_start_is_a_noop() {
        let h = Harness::new(Some(CONFIG));
        assert_eq!(h.bus.fire(ProxyEvent::Shutdown).await, 0);
        assert!(h.notifier().sent().is_empty());
        assert!(h.plugin.health().await.is_none());
    }

    #[tokio::test]
    async fn unreadable_config_fails_start() {
        let h = Harness::new(Some("configuration-version: 1.2\nchannel_id: general\n"));
        assert_eq!(h.bus.fire(ProxyEvent::Initialize).await, 1);
        assert!(!h.plugin.is_running().await);
        assert_eq!(h.factory.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn announcement_format() {
        assert_eq!(start_announcement("up"), ":white_check_mark: **up**");
        assert_eq!(stop_announcement("down"), ":octagonal_sign: **down**");
    }
}
