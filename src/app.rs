use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ratatui::widgets::TableState;
use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::args::{SubCommands, TopLevelCmd};
use crate::broadcast;
use crate::errors::AppError;
use crate::heart_rate::session::Session;
use crate::heart_rate::window::SampleWindow;
use crate::heart_rate::{ble, dummy, HeartRateSample, MonitorEvent, SessionId};
use crate::insight::{GeminiClient, Summarizer};
use crate::scan::{bluetooth_event_thread, request_device};
use crate::settings::{default_config_path, Settings};
use crate::structs::{DeviceHandle, DeviceInfo};

pub const INSIGHTS_DISABLED: &str = "AI insights are disabled in the config.";
pub const CONNECTION_CANCELLED: &str = "Connection cancelled.";
/// Samples held for a session whose connect result hasn't been handled yet
const EARLY_SAMPLE_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    /// Linked, but no heart rate has arrived yet
    Connected,
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPopup {
    Fatal(String),
    Intermittent(String),
    UserMustDismiss(String),
}

impl ErrorPopup {
    pub fn detailed(message: &str, error: AppError) -> Self {
        ErrorPopup::UserMustDismiss(format!("{message}\n{error}"))
    }
    pub fn message(&self) -> &str {
        match self {
            ErrorPopup::Fatal(msg)
            | ErrorPopup::Intermittent(msg)
            | ErrorPopup::UserMustDismiss(msg) => msg,
        }
    }
}

#[derive(Debug)]
pub enum DeviceUpdate {
    DeviceInfo(DeviceInfo),
    DisconnectedEvent(String),
    Error(ErrorPopup),
}

#[derive(Debug)]
pub enum AppUpdate {
    Device(DeviceUpdate),
    Monitor(MonitorEvent),
    Connection {
        attempt: u64,
        result: Result<Session, AppError>,
    },
    Insight {
        session: SessionId,
        text: String,
    },
    Error(ErrorPopup),
}

impl From<DeviceUpdate> for AppUpdate {
    fn from(update: DeviceUpdate) -> Self {
        AppUpdate::Device(update)
    }
}

impl From<MonitorEvent> for AppUpdate {
    fn from(event: MonitorEvent) -> Self {
        AppUpdate::Monitor(event)
    }
}

impl From<ErrorPopup> for AppUpdate {
    fn from(popup: ErrorPopup) -> Self {
        AppUpdate::Error(popup)
    }
}

pub struct App {
    pub settings: Settings,
    pub config_path: PathBuf,
    no_save: bool,
    pub headless: bool,
    // Session state
    pub connection_state: ConnectionState,
    pub window: SampleWindow,
    pub session: Option<Session>,
    pub device: Option<DeviceHandle>,
    pub connecting_to: Option<DeviceHandle>,
    connect_attempt: u64,
    /// Events that raced ahead of their session's connect result
    early_events: Vec<MonitorEvent>,
    pub insight: Option<String>,
    pub insight_pending: bool,
    samples_since_insight: u16,
    summarizer: Option<Summarizer<GeminiClient>>,
    // Device chooser
    pub discovered_devices: Vec<DeviceInfo>,
    pub table_state: TableState,
    pub ble_scan_paused: Arc<AtomicBool>,
    // Misc
    pub error_message: Option<ErrorPopup>,
    fatal_error: Option<AppError>,
    pub frame_count: usize,
    pub cancel_app: CancellationToken,
    pub cancel_actors: CancellationToken,
    thread_handles: Vec<JoinHandle<()>>,
    device_tx: Sender<DeviceUpdate>,
    device_rx: Receiver<DeviceUpdate>,
    monitor_tx: Sender<MonitorEvent>,
    monitor_rx: Receiver<MonitorEvent>,
    update_tx: UnboundedSender<AppUpdate>,
    update_rx: UnboundedReceiver<AppUpdate>,
}

impl App {
    /// Loads the config and prepares the app. Nothing is started until [`App::init`].
    pub fn build(
        arg_config: &TopLevelCmd,
        parent_token: Option<CancellationToken>,
    ) -> Result<Self, AppError> {
        let config_path = match &arg_config.config_override {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        let mut settings = Settings::load(&config_path, arg_config.config_required)?;
        match arg_config.subcommands {
            Some(SubCommands::Dummy(_)) => settings.dummy.enabled = true,
            Some(SubCommands::Ble(_)) => settings.dummy.enabled = false,
            None => {}
        }
        let mut app = Self::new(settings, config_path, arg_config.headless, parent_token);
        app.no_save = arg_config.no_save;
        Ok(app)
    }
    pub fn new(
        settings: Settings,
        config_path: PathBuf,
        headless: bool,
        parent_token: Option<CancellationToken>,
    ) -> Self {
        let (device_tx, device_rx) = mpsc::channel(32);
        let (monitor_tx, monitor_rx) = mpsc::channel(64);
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let cancel_app = parent_token.unwrap_or_default();
        let cancel_actors = cancel_app.child_token();

        let summarizer = if settings.insight.enabled {
            match GeminiClient::build(&settings.insight) {
                Ok(client) => Some(Summarizer::new(client)),
                Err(e) => {
                    warn!("Couldn't build insight client, insights disabled: {e}");
                    None
                }
            }
        } else {
            None
        };

        Self {
            settings,
            config_path,
            no_save: true,
            headless,
            connection_state: ConnectionState::Disconnected,
            window: SampleWindow::new(),
            session: None,
            device: None,
            connecting_to: None,
            connect_attempt: 0,
            early_events: Vec::new(),
            insight: None,
            insight_pending: false,
            samples_since_insight: 0,
            summarizer,
            discovered_devices: Vec::new(),
            table_state: TableState::default(),
            ble_scan_paused: Arc::new(AtomicBool::default()),
            error_message: None,
            fatal_error: None,
            frame_count: 0,
            cancel_app,
            cancel_actors,
            thread_handles: Vec::new(),
            device_tx,
            device_rx,
            monitor_tx,
            monitor_rx,
            update_tx,
            update_rx,
        }
    }
    /// Saves the config (unless told not to) and starts the heart rate source.
    pub async fn init(&mut self) {
        if !self.no_save {
            if let Err(e) = self.settings.save(&self.config_path).await {
                error!("Failed to save config: {e}");
                self.error_message = Some(ErrorPopup::detailed("Failed to save config!", e));
            }
        }

        if self.settings.dummy.enabled {
            let session = dummy::connect(
                &self.settings.dummy,
                self.monitor_tx.clone(),
                self.no_packet_timeout(),
                &self.cancel_actors,
            );
            self.start_session(session);
        } else if self.headless {
            self.request_and_connect();
        } else {
            self.start_scanning();
        }
    }
    fn no_packet_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.ble.no_packet_timeout_secs)
    }
    fn start_scanning(&mut self) {
        let tx = self.device_tx.clone();
        let pause_signal = Arc::clone(&self.ble_scan_paused);
        let token = self.cancel_actors.clone();
        self.thread_handles.push(tokio::spawn(async move {
            bluetooth_event_thread(tx, pause_signal, token).await;
        }));
    }
    fn set_scan_paused(&self, paused: bool) {
        self.ble_scan_paused.store(paused, Ordering::SeqCst);
    }
    /// Enters `Connecting`, returning the attempt number any result must carry.
    fn begin_connecting(&mut self, device: Option<DeviceHandle>) -> u64 {
        self.connect_attempt += 1;
        self.connecting_to = device;
        self.connection_state = ConnectionState::Connecting;
        self.connect_attempt
    }
    /// Headless: pick the first matching Heart Rate device and connect to it.
    fn request_and_connect(&mut self) {
        let attempt = self.begin_connecting(None);
        let ble_settings = self.settings.ble.clone();
        let monitor_tx = self.monitor_tx.clone();
        let update_tx = self.update_tx.clone();
        let token = self.cancel_actors.clone();
        self.thread_handles.push(tokio::spawn(async move {
            let result = match request_device(&ble_settings, &token).await {
                Ok(device) => ble::connect(&device, monitor_tx, &ble_settings, &token).await,
                Err(e) => Err(e),
            };
            broadcast!(update_tx, AppUpdate::Connection { attempt, result });
        }));
    }
    pub fn connect_to_selected(&mut self) {
        if self.connection_state != ConnectionState::Disconnected {
            return;
        }
        let Some(device) = self.get_selected_device().cloned() else {
            return;
        };
        self.set_scan_paused(true);
        let attempt = self.begin_connecting(Some(device.handle()));
        let ble_settings = self.settings.ble.clone();
        let monitor_tx = self.monitor_tx.clone();
        let update_tx = self.update_tx.clone();
        let token = self.cancel_actors.clone();
        self.thread_handles.retain(|handle| !handle.is_finished());
        self.thread_handles.push(tokio::spawn(async move {
            let result = ble::connect(&device, monitor_tx, &ble_settings, &token).await;
            broadcast!(update_tx, AppUpdate::Connection { attempt, result });
        }));
    }
    /// Backs out of an in-flight connection, whatever it ends up returning is thrown away.
    pub fn cancel_connecting(&mut self) {
        if self.connection_state != ConnectionState::Connecting {
            return;
        }
        info!("Connection cancelled by user");
        self.connect_attempt += 1;
        self.connecting_to = None;
        self.early_events.clear();
        self.connection_state = ConnectionState::Disconnected;
        self.error_message = Some(ErrorPopup::Intermittent(CONNECTION_CANCELLED.into()));
        self.set_scan_paused(false);
    }
    fn handle_connection(&mut self, attempt: u64, result: Result<Session, AppError>) {
        if attempt != self.connect_attempt || self.connection_state != ConnectionState::Connecting
        {
            if let Ok(session) = result {
                debug!("Dropping late session {} from attempt {attempt}", session.id());
                session.disconnect();
            }
            return;
        }
        match result {
            Ok(session) => self.start_session(session),
            Err(e) => {
                error!("Failed to connect: {e}");
                self.connecting_to = None;
                self.early_events.clear();
                self.connection_state = ConnectionState::Disconnected;
                self.set_scan_paused(false);
                if self.headless {
                    self.fatal_error = Some(e);
                    self.cancel_app.cancel();
                } else {
                    self.error_message = Some(ErrorPopup::UserMustDismiss(e.to_string()));
                }
            }
        }
    }
    fn start_session(&mut self, session: Session) {
        if let Some(old) = self.session.take() {
            warn!("Replacing session {} that never reported a disconnect", old.id());
            old.disconnect();
        }
        info!(
            "Session {} started with {} ({})",
            session.id(),
            session.device().name,
            session.device().id
        );
        // Samples never carry over between devices
        self.window.clear();
        self.device = Some(session.device().clone());
        self.connecting_to = None;
        self.insight = None;
        self.insight_pending = false;
        self.samples_since_insight = 0;
        self.connection_state = ConnectionState::Connected;
        let id = session.id();
        self.session = Some(session);
        // Anything the session sent before we knew about it, in arrival order
        for event in std::mem::take(&mut self.early_events) {
            if event.session() == id {
                self.handle_monitor_event(event);
            }
        }
    }
    fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Device disconnected: {}", session.device().name);
        }
        self.window.clear();
        self.device = None;
        self.insight = None;
        self.insight_pending = false;
        self.connection_state = ConnectionState::Disconnected;
        self.set_scan_paused(false);
        if self.headless {
            // Nothing to reconnect to
            self.cancel_app.cancel();
        }
    }
    pub fn current_session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(Session::id)
    }
    fn handle_monitor_event(&mut self, event: MonitorEvent) {
        if Some(event.session()) != self.current_session_id() {
            if self.connection_state == ConnectionState::Connecting {
                self.hold_early_event(event);
            } else {
                debug!("Ignoring {event:?} from a stale session");
            }
            return;
        }
        match event {
            MonitorEvent::Sample { bpm, .. } => {
                self.window.append(HeartRateSample::now(bpm));
                self.connection_state = ConnectionState::Streaming;
                if self.headless {
                    info!("BPM: {bpm}");
                    self.headless_insight_tick();
                }
            }
            MonitorEvent::Disconnected { .. } => self.end_session(),
        }
    }
    fn hold_early_event(&mut self, event: MonitorEvent) {
        let samples = self
            .early_events
            .iter()
            .filter(|e| matches!(e, MonitorEvent::Sample { .. }))
            .count();
        if matches!(event, MonitorEvent::Sample { .. }) && samples >= EARLY_SAMPLE_LIMIT {
            return;
        }
        debug!("Holding {event:?} until its session is adopted");
        self.early_events.push(event);
    }
    fn headless_insight_tick(&mut self) {
        let every = self.settings.insight.headless_every;
        if every == 0 {
            return;
        }
        self.samples_since_insight += 1;
        if self.samples_since_insight >= every {
            self.samples_since_insight = 0;
            self.request_insight();
        }
    }
    /// Tears the current session down. The state change happens once the session reports back.
    pub fn disconnect(&mut self) {
        if let Some(session) = &self.session {
            session.disconnect();
        }
    }
    pub fn request_insight(&mut self) {
        let Some(session) = self.current_session_id() else {
            return;
        };
        if self.insight_pending {
            return;
        }
        let Some(summarizer) = self.summarizer.clone() else {
            self.insight = Some(INSIGHTS_DISABLED.into());
            return;
        };
        self.insight_pending = true;
        let snapshot = self.window.snapshot();
        let update_tx = self.update_tx.clone();
        // Not tied to the session, a late answer is discarded in `handle_insight`
        tokio::spawn(async move {
            let text = summarizer.summarize(&snapshot).await;
            broadcast!(update_tx, AppUpdate::Insight { session, text });
        });
    }
    fn handle_insight(&mut self, session: SessionId, text: String) {
        if Some(session) != self.current_session_id() {
            debug!("Discarding insight for stale session {session}");
            return;
        }
        if self.headless {
            info!("Insight: {text}");
        }
        self.insight = Some(text);
        self.insight_pending = false;
    }
    fn handle_device_update(&mut self, update: DeviceUpdate) {
        match update {
            DeviceUpdate::DeviceInfo(info) => {
                if let Some(existing) = self.discovered_devices.iter_mut().find(|d| d.id == info.id)
                {
                    *existing = info;
                } else {
                    self.discovered_devices.push(info);
                }
                if self.table_state.selected().is_none() {
                    self.table_state.select(Some(0));
                }
            }
            DeviceUpdate::DisconnectedEvent(id) => {
                if let Some(session) = &self.session {
                    if session.device().id == id {
                        session.disconnect();
                    }
                }
            }
            DeviceUpdate::Error(popup) => self.error_message = Some(popup),
        }
    }
    pub async fn app_receivers(&mut self) -> AppUpdate {
        tokio::select! {
            biased;
            Some(update) = self.update_rx.recv() => update,
            Some(event) = self.monitor_rx.recv() => event.into(),
            Some(update) = self.device_rx.recv() => update.into(),
            else => ErrorPopup::Fatal("All app channels closed".into()).into(),
        }
    }
    pub fn app_handlers(&mut self, update: AppUpdate) {
        match update {
            AppUpdate::Device(update) => self.handle_device_update(update),
            AppUpdate::Monitor(event) => self.handle_monitor_event(event),
            AppUpdate::Connection { attempt, result } => self.handle_connection(attempt, result),
            AppUpdate::Insight { session, text } => self.handle_insight(session, text),
            AppUpdate::Error(popup) => self.error_message = Some(popup),
        }
    }
    pub fn take_fatal_error(&mut self) -> Option<AppError> {
        self.fatal_error.take()
    }
    pub fn term_tick(&mut self) {
        self.frame_count = self.frame_count.wrapping_add(1);
    }
    pub fn is_idle_on_main_menu(&self) -> bool {
        self.connection_state == ConnectionState::Disconnected && self.error_message.is_none()
    }
    pub fn get_selected_device(&self) -> Option<&DeviceInfo> {
        self.table_state
            .selected()
            .and_then(|i| self.discovered_devices.get(i))
    }
    pub fn enter_pressed(&mut self) {
        if let Some(popup) = self.error_message.take() {
            if let ErrorPopup::Fatal(_) = popup {
                self.cancel_app.cancel();
            }
            return;
        }
        if self.connection_state == ConnectionState::Disconnected {
            self.connect_to_selected();
        }
    }
    pub fn escape_pressed(&mut self) {
        match self.connection_state {
            ConnectionState::Connecting => self.cancel_connecting(),
            ConnectionState::Connected | ConnectionState::Streaming => self.disconnect(),
            ConnectionState::Disconnected => {
                self.error_message = None;
            }
        }
    }
    pub fn scroll_down(&mut self) {
        if self.discovered_devices.is_empty() {
            return;
        }
        let next = match self.table_state.selected() {
            Some(i) if i + 1 < self.discovered_devices.len() => i + 1,
            _ => 0,
        };
        self.table_state.select(Some(next));
    }
    pub fn scroll_up(&mut self) {
        if self.discovered_devices.is_empty() {
            return;
        }
        let previous = match self.table_state.selected() {
            Some(0) | None => self.discovered_devices.len() - 1,
            Some(i) => i - 1,
        };
        self.table_state.select(Some(previous));
    }
    /// Stops all actors and waits a bit for them to wrap up.
    pub async fn join_threads(&mut self) {
        self.cancel_actors.cancel();
        if let Some(session) = self.session.take() {
            if timeout(Duration::from_secs(3), session.join()).await.is_err() {
                warn!("Session didn't close in time");
            }
        }
        for handle in self.thread_handles.drain(..) {
            match timeout(Duration::from_secs(3), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Actor failed: {e}"),
                Err(_) => warn!("Actor didn't shut down in time"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc::{unbounded, UnboundedSender as PacketSender};
    use futures::{FutureExt, StreamExt};

    fn test_app(headless: bool) -> App {
        let settings = Settings::from_toml_str("[insight]\nenabled = false").unwrap();
        App::new(settings, PathBuf::from("unused.toml"), headless, None)
    }

    fn manual_session(app: &App) -> (Session, PacketSender<Vec<u8>>) {
        let (packet_tx, packet_rx) = unbounded::<Vec<u8>>();
        let session = Session::spawn(
            DeviceHandle::new("strap-1", Some("Chest Strap".into())),
            packet_rx.boxed(),
            async {}.boxed(),
            Duration::from_secs(30),
            app.monitor_tx.clone(),
            &app.cancel_actors,
        );
        (session, packet_tx)
    }

    async fn pump_until(app: &mut App, done: impl Fn(&App) -> bool) {
        timeout(Duration::from_secs(5), async {
            while !done(app) {
                let update = app.app_receivers().await;
                app.app_handlers(update);
            }
        })
        .await
        .expect("App never reached the expected state");
    }

    #[tokio::test]
    async fn samples_stream_then_disconnect_resets() {
        let mut app = test_app(false);
        let (session, packets) = manual_session(&app);
        app.start_session(session);
        assert_eq!(app.connection_state, ConnectionState::Connected);
        assert_eq!(app.device.as_ref().unwrap().name, "Chest Strap");

        for payload in [vec![0x00, 70], vec![0x00], vec![0x01, 0x48, 0x00]] {
            packets.unbounded_send(payload).unwrap();
        }
        pump_until(&mut app, |app| app.window.len() == 2).await;
        assert_eq!(app.connection_state, ConnectionState::Streaming);
        assert_eq!(app.window.current().unwrap().bpm(), 72);

        app.disconnect();
        app.disconnect();
        pump_until(&mut app, |app| {
            app.connection_state == ConnectionState::Disconnected
        })
        .await;
        assert!(app.window.is_empty());
        assert!(app.device.is_none());
        assert!(app.session.is_none());
        // Only one disconnect was reported
        assert!(app.monitor_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_messages_are_ignored() {
        let mut app = test_app(false);
        let (session, _packets) = manual_session(&app);
        let id = session.id();
        app.start_session(session);

        app.app_handlers(AppUpdate::Monitor(MonitorEvent::Sample {
            session: id + 1000,
            bpm: 99,
        }));
        assert!(app.window.is_empty());

        app.app_handlers(AppUpdate::Monitor(MonitorEvent::Disconnected {
            session: id + 1000,
        }));
        assert_eq!(app.connection_state, ConnectionState::Connected);

        app.app_handlers(AppUpdate::Insight {
            session: id + 1000,
            text: "old news".into(),
        });
        assert_eq!(app.insight, None);

        app.app_handlers(AppUpdate::Insight {
            session: id,
            text: "Heart rate is steady.".into(),
        });
        assert_eq!(app.insight.as_deref(), Some("Heart rate is steady."));
    }

    #[tokio::test]
    async fn late_connection_after_cancel_is_dropped() {
        let mut app = test_app(false);
        let attempt = app.begin_connecting(Some(DeviceHandle::new("strap-1", None)));
        app.cancel_connecting();
        assert_eq!(app.connection_state, ConnectionState::Disconnected);
        assert_eq!(
            app.error_message,
            Some(ErrorPopup::Intermittent(CONNECTION_CANCELLED.into()))
        );

        let (session, _packets) = manual_session(&app);
        app.app_handlers(AppUpdate::Connection {
            attempt,
            result: Ok(session),
        });
        assert!(app.session.is_none());
        assert_eq!(app.connection_state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn link_lost_before_connect_result_still_disconnects() {
        let mut app = test_app(false);
        let attempt = app.begin_connecting(Some(DeviceHandle::new("strap-1", None)));
        let (session, packets) = manual_session(&app);
        packets.unbounded_send(vec![0x00, 80]).unwrap();
        drop(packets);

        // Both events land before the connect result does
        for _ in 0..2 {
            let event = app.monitor_rx.recv().await.unwrap();
            app.app_handlers(event.into());
        }
        assert_eq!(app.connection_state, ConnectionState::Connecting);

        app.app_handlers(AppUpdate::Connection {
            attempt,
            result: Ok(session),
        });
        assert_eq!(app.connection_state, ConnectionState::Disconnected);
        assert!(app.session.is_none());
        assert!(app.device.is_none());
        assert!(app.window.is_empty());
    }

    #[tokio::test]
    async fn samples_before_connect_result_are_kept() {
        let mut app = test_app(false);
        let attempt = app.begin_connecting(Some(DeviceHandle::new("strap-1", None)));
        let (session, packets) = manual_session(&app);
        packets.unbounded_send(vec![0x00, 80]).unwrap();
        let event = app.monitor_rx.recv().await.unwrap();
        app.app_handlers(event.into());
        // A leftover from some older session
        app.app_handlers(AppUpdate::Monitor(MonitorEvent::Sample {
            session: 0,
            bpm: 99,
        }));

        app.app_handlers(AppUpdate::Connection {
            attempt,
            result: Ok(session),
        });
        assert_eq!(app.connection_state, ConnectionState::Streaming);
        assert_eq!(app.window.len(), 1);
        assert_eq!(app.window.current().unwrap().bpm(), 80);
    }

    #[tokio::test]
    async fn selected_device_connect_is_joined() {
        let mut app = test_app(false);
        app.handle_device_update(DeviceUpdate::DeviceInfo(DeviceInfo::new(
            "dev-0".into(),
            Some("No Peripheral".into()),
            String::new(),
            None,
            vec![],
            None,
        )));
        app.connect_to_selected();
        assert_eq!(app.connection_state, ConnectionState::Connecting);
        assert_eq!(app.thread_handles.len(), 1);

        pump_until(&mut app, |app| {
            app.connection_state == ConnectionState::Disconnected
        })
        .await;
        assert_eq!(
            app.error_message,
            Some(ErrorPopup::UserMustDismiss(
                "Connection failed: Device object missing".into()
            ))
        );
        app.join_threads().await;
        assert!(app.thread_handles.is_empty());
    }

    #[tokio::test]
    async fn connection_errors_surface() {
        let mut app = test_app(false);
        let attempt = app.begin_connecting(None);
        app.app_handlers(AppUpdate::Connection {
            attempt,
            result: Err(AppError::Connection("Connection timed out".into())),
        });
        assert_eq!(app.connection_state, ConnectionState::Disconnected);
        assert_eq!(
            app.error_message,
            Some(ErrorPopup::UserMustDismiss(
                "Connection failed: Connection timed out".into()
            ))
        );
    }

    #[tokio::test]
    async fn headless_errors_stop_the_app() {
        let mut app = test_app(true);
        let attempt = app.begin_connecting(None);
        app.app_handlers(AppUpdate::Connection {
            attempt,
            result: Err(AppError::DeviceNotFound),
        });
        assert!(app.cancel_app.is_cancelled());
        assert!(matches!(
            app.take_fatal_error(),
            Some(AppError::DeviceNotFound)
        ));
    }

    #[tokio::test]
    async fn insight_without_summarizer() {
        let mut app = test_app(false);
        app.request_insight();
        assert_eq!(app.insight, None);

        let (session, _packets) = manual_session(&app);
        app.start_session(session);
        app.request_insight();
        assert_eq!(app.insight.as_deref(), Some(INSIGHTS_DISABLED));
        assert!(!app.insight_pending);
    }

    #[tokio::test]
    async fn platform_disconnect_event_closes_matching_session() {
        let mut app = test_app(false);
        let (session, _packets) = manual_session(&app);
        app.start_session(session);

        app.app_handlers(DeviceUpdate::DisconnectedEvent("someone-else".into()).into());
        assert!(!app.session.as_ref().unwrap().is_finished());

        app.app_handlers(DeviceUpdate::DisconnectedEvent("strap-1".into()).into());
        pump_until(&mut app, |app| {
            app.connection_state == ConnectionState::Disconnected
        })
        .await;
        assert!(app.device.is_none());
    }

    #[test]
    fn table_navigation_wraps() {
        let mut app = test_app(false);
        app.scroll_down();
        assert_eq!(app.table_state.selected(), None);
        for i in 0..3 {
            app.handle_device_update(DeviceUpdate::DeviceInfo(DeviceInfo::new(
                format!("dev-{i}"),
                None,
                String::new(),
                None,
                vec![],
                None,
            )));
        }
        // Updates for a known device replace it in place
        app.handle_device_update(DeviceUpdate::DeviceInfo(DeviceInfo::new(
            "dev-1".into(),
            Some("Renamed".into()),
            String::new(),
            None,
            vec![],
            None,
        )));
        assert_eq!(app.discovered_devices.len(), 3);
        assert_eq!(app.discovered_devices[1].name, "Renamed");
        assert_eq!(app.table_state.selected(), Some(0));
        app.scroll_up();
        assert_eq!(app.table_state.selected(), Some(2));
        app.scroll_down();
        assert_eq!(app.table_state.selected(), Some(0));
    }
}
