use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cognito::CognitoBroker;
use crate::command::{Command, compose};
use crate::config::ClientConfig;
use crate::coordinator::{Coordinator, Observers, ThingSource, TickOutcome};
use crate::device::{
    Device, FanLevel, FanSpeed, HorizontalSwing, Mode, VerticalSwing, WindSpeed7Gear,
};
use crate::features::DeviceFeature;
use crate::iot::{AwsIotConnector, FakeIot, IotClient, IotDataConnector};
use crate::rest::TclRestClient;
use crate::selfdiag::{SelfDiagRecord, SelfDiagStep};
use crate::session::{Clock, SessionManager, SystemClock};
use crate::storage::{Behavior, DeviceStorage};
use crate::store::{MemoryStore, Store, device_key, load_json, save_json, selfdiag_key, update_json};
use crate::types::{Event, StatsFilter, StatsResponse, Thing};
use crate::{Error, Result};

pub struct TclClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn Store>>,
    connector: Option<Arc<dyn IotDataConnector>>,
    clock: Option<Arc<dyn Clock>>,
    cognito_endpoint: Option<String>,
    observers: Observers,
}

impl TclClientBuilder {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(username, password))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            store: None,
            connector: None,
            clock: None,
            cognito_endpoint: None,
            observers: Observers::default(),
        }
    }

    pub fn app_login_url(mut self, url: impl Into<String>) -> Self {
        self.config.app_login_url = url.into();
        self
    }

    pub fn cloud_urls(mut self, url: impl Into<String>) -> Self {
        self.config.cloud_urls = url.into();
        self
    }

    pub fn app_id(mut self, id: impl Into<String>) -> Self {
        self.config.app_id = id.into();
        self
    }

    /// Clamped to the 10 second floor.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.set_poll_interval(interval);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    pub fn verbose_device_logging(mut self, on: bool) -> Self {
        self.config.verbose_device_logging = on;
        self
    }

    pub fn verbose_session_logging(mut self, on: bool) -> Self {
        self.config.verbose_session_logging = on;
        self
    }

    pub fn verbose_setup_logging(mut self, on: bool) -> Self {
        self.config.verbose_setup_logging = on;
        self
    }

    pub fn mute_beep_on_power_on(mut self, on: bool) -> Self {
        self.config.behavior_mute_beep_on_power_on = on;
        self
    }

    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn iot_connector(mut self, connector: Arc<dyn IotDataConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides the Cognito identity endpoint, which is otherwise derived
    /// from the region.
    pub fn cognito_endpoint(mut self, url: impl Into<String>) -> Self {
        self.cognito_endpoint = Some(url.into());
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.observers.events.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&Device) + Send + Sync + 'static) -> Self {
        self.observers.snapshots.push(Box::new(f));
        self
    }

    pub fn build(self) -> Result<TclClient> {
        let rest = TclRestClient::new(self.config.http_timeout)?
            .with_verbose(self.config.verbose_session_logging);
        let mut cognito = CognitoBroker::new();
        if let Some(endpoint) = self.cognito_endpoint {
            cognito = cognito.with_endpoint(endpoint);
        }
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let session = Arc::new(SessionManager::new(
            self.config.clone(),
            rest,
            cognito,
            store.clone(),
            clock,
        ));

        Ok(TclClient {
            config: self.config,
            session,
            store,
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(AwsIotConnector) as Arc<dyn IotDataConnector>),
            observers: Arc::new(self.observers),
            coordinator: None,
            poller: None,
        })
    }
}

struct Poller {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct TclClient {
    config: ClientConfig,
    session: Arc<SessionManager>,
    store: Arc<dyn Store>,
    connector: Arc<dyn IotDataConnector>,
    observers: Arc<Observers>,
    coordinator: Option<Arc<Coordinator>>,
    poller: Option<Poller>,
}

impl TclClient {
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> TclClientBuilder {
        TclClientBuilder::new(username, password)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Logs in (or enters fake mode), then runs the first refresh. Failing
    /// here means bad credentials or an unreachable cloud.
    pub async fn connect(&mut self) -> Result<()> {
        let fake = self.session.fake_settings().await?;
        let (source, iot) = if fake.use_fake_data {
            info!("fake data mode, skipping cloud setup");
            let iot = IotClient::offline(Arc::new(FakeIot::from_fake_data(&fake.data)));
            (ThingSource::Fake(fake_things(&fake.data)), iot)
        } else {
            let auth = self.session.get_auth_data().await?;
            debug!(country = %auth.user.country_abbr, "session ready");
            self.session.get_aws_credentials().await?;
            (ThingSource::Cloud, IotClient::new(self.session.clone(), self.connector.clone()))
        };

        let coordinator = Arc::new(Coordinator::new(
            self.config.clone(),
            self.session.clone(),
            Arc::new(iot),
            self.store.clone(),
            source,
            self.observers.clone(),
        ));
        coordinator.tick().await?;
        info!(devices = coordinator.devices().len(), "connected");
        self.coordinator = Some(coordinator);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.coordinator.is_some()
    }

    /// Stops polling and drops the IoT connection.
    pub async fn disconnect(&mut self) {
        self.stop_polling().await;
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.iot().close().await;
        }
    }

    /// Forgets every cached credential and logs in again.
    pub async fn relogin(&self) -> Result<()> {
        self.session.clear_storage().await?;
        if let Some(coordinator) = &self.coordinator {
            coordinator.iot().close().await;
        }
        self.session.get_aws_credentials().await?;
        Ok(())
    }

    /// One refresh of every device, now.
    pub async fn poll(&self) -> Result<TickOutcome> {
        self.coordinator()?.tick().await
    }

    pub fn start_polling(&mut self) -> Result<()> {
        if self.poller.is_some() {
            return Ok(());
        }
        let coordinator = self.coordinator()?.clone();
        let (shutdown, rx) = watch::channel(false);
        let task = coordinator.spawn(rx);
        self.poller = Some(Poller { shutdown, task });
        Ok(())
    }

    pub async fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            let _ = poller.shutdown.send(true);
            if let Err(e) = poller.task.await {
                warn!("poll task ended abnormally: {e}");
            }
        }
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.coordinator.as_ref().map(|c| c.devices()).unwrap_or_default()
    }

    pub fn device(&self, device_id: &str) -> Option<Arc<Device>> {
        self.coordinator.as_ref()?.device(device_id)
    }

    pub fn device_weak(&self, device_id: &str) -> Option<Weak<Device>> {
        self.coordinator.as_ref()?.device_weak(device_id)
    }

    pub fn subscribe(&self) -> Result<broadcast::Receiver<Arc<Device>>> {
        Ok(self.coordinator()?.subscribe())
    }

    // -- Commands --

    /// Validates and publishes one command, persists any remembered value
    /// and reads the shadow back.
    pub async fn send(&self, device_id: &str, command: Command) -> Result<()> {
        let coordinator = self.coordinator()?;
        let device = self.require_device(device_id)?;
        let composed = compose(&device, command)?;
        debug!(device_id, ?command, "sending command");

        coordinator.iot().publish_desired(device_id, &composed.desired).await?;

        if let Some(updated) = composed.storage {
            let key = device_key(&self.config.namespace, device_id);
            update_json(self.store.as_ref(), &key, |s: &mut DeviceStorage| {
                s.target_temperature = updated.target_temperature;
                s.fan_speed = updated.fan_speed;
                s.humidity = updated.humidity;
            })
            .await?;
        }

        if let Err(e) = coordinator.refresh_device(device_id).await {
            warn!(device_id, "refresh after command failed: {e}");
        }
        Ok(())
    }

    pub async fn set_power(&self, device_id: &str, on: bool) -> Result<()> {
        self.send(device_id, Command::Power(on)).await
    }

    pub async fn set_mode(&self, device_id: &str, mode: Mode) -> Result<()> {
        self.send(device_id, Command::Mode(mode)).await
    }

    /// Celsius; rejected outside the device's stored limits.
    pub async fn set_target_temperature(&self, device_id: &str, celsius: f64) -> Result<()> {
        self.send(device_id, Command::TargetTemperature(celsius)).await
    }

    pub async fn set_target_humidity(&self, device_id: &str, percent: i64) -> Result<()> {
        self.send(device_id, Command::TargetHumidity(percent)).await
    }

    pub async fn set_fan_speed(&self, device_id: &str, speed: FanSpeed) -> Result<()> {
        self.send(device_id, Command::FanSpeed(speed)).await
    }

    pub async fn set_fan_speed_7_gear(&self, device_id: &str, speed: WindSpeed7Gear) -> Result<()> {
        self.send(device_id, Command::FanSpeed7Gear(speed)).await
    }

    pub async fn set_fan_level(&self, device_id: &str, level: FanLevel) -> Result<()> {
        self.send(device_id, Command::FanLevel(level)).await
    }

    pub async fn set_vertical_swing(&self, device_id: &str, swing: VerticalSwing) -> Result<()> {
        self.send(device_id, Command::VerticalSwing(swing)).await
    }

    pub async fn set_horizontal_swing(&self, device_id: &str, swing: HorizontalSwing) -> Result<()> {
        self.send(device_id, Command::HorizontalSwing(swing)).await
    }

    pub async fn set_eco(&self, device_id: &str, on: bool) -> Result<()> {
        self.send(device_id, Command::Eco(on)).await
    }

    pub async fn set_beep(&self, device_id: &str, on: bool) -> Result<()> {
        self.send(device_id, Command::Beep(on)).await
    }

    pub async fn self_clean(&self, device_id: &str) -> Result<()> {
        self.send(device_id, Command::SelfClean(true)).await
    }

    /// Edits the per-device behavior preferences.
    pub async fn update_behavior(
        &self,
        device_id: &str,
        f: impl FnOnce(&mut Behavior),
    ) -> Result<Behavior> {
        let key = device_key(&self.config.namespace, device_id);
        let storage = update_json(self.store.as_ref(), &key, |s: &mut DeviceStorage| {
            f(&mut s.user_config.behavior)
        })
        .await?;
        if let Some(coordinator) = &self.coordinator
            && let Err(e) = coordinator.refresh_device(device_id).await
        {
            debug!(device_id, "refresh after behavior change failed: {e}");
        }
        Ok(storage.user_config.behavior)
    }

    // -- Statistics --

    pub async fn work_time(&self, device_id: &str, filter: StatsFilter) -> Result<StatsResponse> {
        self.require_feature(device_id, DeviceFeature::SensorWorkTime)?;
        let (saas, device_url) = self.stats_context().await?;
        self.session
            .rest()
            .get_work_time(&device_url, &saas, device_id, &filter)
            .await
    }

    pub async fn energy_consumption(&self, device_id: &str, filter: StatsFilter) -> Result<StatsResponse> {
        self.require_feature(device_id, DeviceFeature::SensorPowerConsumption)?;
        let (saas, device_url) = self.stats_context().await?;
        self.session
            .rest()
            .get_energy_consumption(&device_url, &saas, device_id, &filter)
            .await
    }

    async fn stats_context(&self) -> Result<(String, String)> {
        let tokens = self.session.get_refresh_tokens().await?;
        let urls = self.session.get_cloud_urls().await?;
        Ok((tokens.saas_token.expose().to_string(), urls.device_url))
    }

    // -- Self-diagnostics --

    /// Starts a new capture from the current shadow, replacing any previous one.
    pub async fn selfdiag_start(&self, device_id: &str, description: &str) -> Result<SelfDiagRecord> {
        self.require_device(device_id)?;
        let shadow = self.coordinator()?.iot().get_shadow(device_id).await?;
        let record = SelfDiagRecord::start(shadow, description);
        save_json(self.store.as_ref(), &selfdiag_key(&self.config.namespace, device_id), &record).await?;
        Ok(record)
    }

    pub async fn selfdiag_step(&self, device_id: &str, description: &str) -> Result<SelfDiagStep> {
        let key = selfdiag_key(&self.config.namespace, device_id);
        let mut record: SelfDiagRecord = load_json(self.store.as_ref(), &key)
            .await?
            .ok_or_else(|| Error::invalid(format!("no self-diagnostic capture for {device_id}")))?;
        let shadow = self.coordinator()?.iot().get_shadow(device_id).await?;
        let step = record.step(shadow, description).clone();
        save_json(self.store.as_ref(), &key, &record).await?;
        Ok(step)
    }

    pub async fn selfdiag_load(&self, device_id: &str) -> Result<Option<SelfDiagRecord>> {
        load_json(self.store.as_ref(), &selfdiag_key(&self.config.namespace, device_id)).await
    }

    // -- Helpers --

    fn coordinator(&self) -> Result<&Arc<Coordinator>> {
        self.coordinator.as_ref().ok_or(Error::NotConnected)
    }

    fn require_device(&self, device_id: &str) -> Result<Arc<Device>> {
        self.coordinator()?
            .device(device_id)
            .ok_or_else(|| Error::UnknownDevice(device_id.to_string()))
    }

    fn require_feature(&self, device_id: &str, feature: DeviceFeature) -> Result<()> {
        if self.require_device(device_id)?.has(feature) {
            Ok(())
        } else {
            Err(Error::invalid(format!("{device_id} does not report {feature}")))
        }
    }
}

fn fake_things(data: &Value) -> Vec<Thing> {
    let Some(Value::Array(items)) = data.get("things") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(thing) => Some(thing),
            Err(e) => {
                warn!("skipping malformed fake thing: {e}");
                None
            }
        })
        .collect()
}
