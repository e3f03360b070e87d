use std::{
    fmt,
    sync::{Arc, RwLock},
};

use {
    async_trait::async_trait,
    tracing::{debug, error},
};

use crate::PluginDescription;

/// Lifecycle signals fired by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyEvent {
    /// The proxy finished initializing.
    Initialize,
    /// The proxy is shutting down.
    Shutdown,
}

impl ProxyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialize => "proxy_initialize",
            Self::Shutdown => "proxy_shutdown",
        }
    }
}

impl fmt::Display for ProxyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives proxy events. Errors are logged by the dispatcher and never
/// reach the host.
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(
        &self,
        event: ProxyEvent,
        events: Arc<dyn EventManager>,
    ) -> anyhow::Result<()> {
        let _ = (event, events);
        Ok(())
    }
}

/// Host-side listener registry.
pub trait EventManager: Send + Sync {
    /// Register `listener` on behalf of `plugin`. Registering the same
    /// listener instance again is a no-op.
    fn register(&self, plugin: &PluginDescription, listener: Arc<dyn EventListener>);
}

// ── In-process bus ───────────────────────────────────────────────────────────

struct Registration {
    plugin_id: &'static str,
    listener: Arc<dyn EventListener>,
}

/// In-process [`EventManager`] that dispatches events to listeners in
/// registration order.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Registration>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Dispatch `event` to every listener registered so far.
    ///
    /// Each listener runs in its own task, so an error or a panic in one is
    /// logged and the rest still run. Returns the number of listeners that
    /// failed.
    pub async fn fire(self: &Arc<Self>, event: ProxyEvent) -> usize {
        // Snapshot so listeners can register more listeners mid-dispatch.
        let snapshot: Vec<(&'static str, Arc<dyn EventListener>)> = self
            .read()
            .iter()
            .map(|r| (r.plugin_id, Arc::clone(&r.listener)))
            .collect();
        debug!(event = %event, listeners = snapshot.len(), "dispatching proxy event");

        let mut failed = 0;
        for (plugin_id, listener) in snapshot {
            let events: Arc<dyn EventManager> = self.clone();
            let task = tokio::spawn(async move { listener.on_event(event, events).await });
            match task.await {
                Ok(Ok(())) => {},
                Ok(Err(e)) => {
                    failed += 1;
                    error!(
                        plugin = plugin_id,
                        event = %event,
                        error = %format!("{e:#}"),
                        "event listener failed"
                    );
                },
                Err(e) => {
                    failed += 1;
                    error!(
                        plugin = plugin_id,
                        event = %event,
                        error = %e,
                        "event listener panicked"
                    );
                },
            }
        }
        failed
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.read().len()
    }

    /// Number of listeners registered on behalf of `plugin_id`.
    pub fn listeners_for(&self, plugin_id: &str) -> usize {
        self.read()
            .iter()
            .filter(|r| r.plugin_id == plugin_id)
            .count()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Registration>> {
        self.listeners.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventManager for EventBus {
    fn register(&self, plugin: &PluginDescription, listener: Arc<dyn EventListener>) {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        if listeners.iter().any(|r| same_listener(&r.listener, &listener)) {
            debug!(plugin = plugin.id, "listener already registered");
            return;
        }
        listeners.push(Registration {
            plugin_id: plugin.id,
            listener,
        });
        debug!(plugin = plugin.id, total = listeners.len(), "registered event listener");
    }
}

fn same_listener(a: &Arc<dyn EventListener>, b: &Arc<dyn EventListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use crate::PLUGIN;

    const OTHER: PluginDescription = PluginDescription {
        id: "other",
        name: "Other",
        version: "0.0.0",
        authors: &[],
    };

    #[derive(Default)]
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventListener for Recorder {
        async fn on_event(
            &self,
            event: ProxyEvent,
            _events: Arc<dyn EventManager>,
        ) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("{}:{event}", self.name));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventListener for Failing {
        async fn on_event(
            &self,
            _event: ProxyEvent,
            _events: Arc<dyn EventManager>,
        ) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    struct Panicking;

    #[async_trait]
    impl EventListener for Panicking {
        async fn on_event(
            &self,
            _event: ProxyEvent,
            _events: Arc<dyn EventManager>,
        ) -> anyhow::Result<()> {
            panic!("listener panic")
        }
    }

    /// Registers a fresh recorder the first time it sees an event.
    struct Registrar {
        log: Arc<Mutex<Vec<String>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventListener for Registrar {
        async fn on_event(
            &self,
            _event: ProxyEvent,
            events: Arc<dyn EventManager>,
        ) -> anyhow::Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                events.register(&PLUGIN, Arc::new(Recorder {
                    name: "late",
                    log: Arc::clone(&self.log),
                }));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatches_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["a", "b"] {
            bus.register(&PLUGIN, Arc::new(Recorder {
                name,
                log: Arc::clone(&log),
            }));
        }

        assert_eq!(bus.fire(ProxyEvent::Initialize).await, 0);
        assert_eq!(bus.fire(ProxyEvent::Shutdown).await, 0);
        assert_eq!(*log.lock().unwrap(), vec![
            "a:proxy_initialize",
            "b:proxy_initialize",
            "a:proxy_shutdown",
            "b:proxy_shutdown",
        ]);
    }

    #[tokio::test]
    async fn same_instance_registers_once() {
        let bus = EventBus::new();
        let listener: Arc<dyn EventListener> = Arc::new(Recorder::default());
        bus.register(&PLUGIN, Arc::clone(&listener));
        bus.register(&PLUGIN, Arc::clone(&listener));
        bus.register(&OTHER, Arc::new(Recorder::default()));

        assert_eq!(bus.listener_count(), 2);
        assert_eq!(bus.listeners_for("mc-vtod"), 1);
        assert_eq!(bus.listeners_for("other"), 1);
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.register(&PLUGIN, Arc::new(Failing));
        bus.register(&PLUGIN, Arc::new(Panicking));
        bus.register(&PLUGIN, Arc::new(Recorder {
            name: "after",
            log: Arc::clone(&log),
        }));

        assert_eq!(bus.fire(ProxyEvent::Shutdown).await, 2);
        assert_eq!(*log.lock().unwrap(), vec!["after:proxy_shutdown"]);
    }

    #[tokio::test]
    async fn listeners_may_register_during_dispatch() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.register(&PLUGIN, Arc::new(Registrar {
            log: Arc::clone(&log),
            calls: AtomicUsize::new(0),
        }));

        bus.fire(ProxyEvent::Initialize).await;
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.listener_count(), 2);

        bus.fire(ProxyEvent::Shutdown).await;
        assert_eq!(*log.lock().unwrap(), vec!["late:proxy_shutdown"]);
    }

    #[test]
    fn default_listener_ignores_events() {
        struct Silent;
        impl EventListener for Silent {}

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let bus: Arc<dyn EventManager> = EventBus::new();
        assert!(rt.block_on(Silent.on_event(ProxyEvent::Initialize, bus)).is_ok());
    }
}
