use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, Weak};

use chrono::Datelike;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::{ClientConfig, clamp_poll_interval};
use crate::device::shadow::KNOWN_KEYS;
use crate::device::{Device, Family, seed_storage};
use crate::diff::device_events;
use crate::iot::IotClient;
use crate::probe;
use crate::session::SessionManager;
use crate::storage::DeviceStorage;
use crate::store::{Store, device_key, load_json, save_json, update_json};
use crate::types::{Event, StatsFilter, Thing};
use crate::{Error, Result};

pub(crate) type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
pub(crate) type SnapshotCallback = Box<dyn Fn(&Device) + Send + Sync>;

const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
pub(crate) struct Observers {
    pub events: Vec<EventCallback>,
    pub snapshots: Vec<SnapshotCallback>,
}

pub(crate) enum ThingSource {
    Cloud,
    Fake(Vec<Thing>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Updated(usize),
    Skipped,
}

pub struct Coordinator {
    config: ClientConfig,
    session: Arc<SessionManager>,
    iot: Arc<IotClient>,
    store: Arc<dyn Store>,
    source: ThingSource,
    things: RwLock<HashMap<String, Thing>>,
    devices: RwLock<HashMap<String, Arc<Device>>>,
    warned_keys: std::sync::Mutex<HashSet<(String, String)>>,
    tick_lock: Mutex<()>,
    observers: Arc<Observers>,
    snapshots: broadcast::Sender<Arc<Device>>,
}

impl Coordinator {
    pub(crate) fn new(
        config: ClientConfig,
        session: Arc<SessionManager>,
        iot: Arc<IotClient>,
        store: Arc<dyn Store>,
        source: ThingSource,
        observers: Arc<Observers>,
    ) -> Self {
        let (snapshots, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            config,
            session,
            iot,
            store,
            source,
            things: RwLock::new(HashMap::new()),
            devices: RwLock::new(HashMap::new()),
            warned_keys: std::sync::Mutex::new(HashSet::new()),
            tick_lock: Mutex::new(()),
            observers,
            snapshots,
        }
    }

    pub fn iot(&self) -> &IotClient {
        &self.iot
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Device>> {
        self.snapshots.subscribe()
    }

    pub fn device(&self, device_id: &str) -> Option<Arc<Device>> {
        read(&self.devices).get(device_id).cloned()
    }

    pub fn device_weak(&self, device_id: &str) -> Option<Weak<Device>> {
        self.device(device_id).map(|d| Arc::downgrade(&d))
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        let mut devices: Vec<_> = read(&self.devices).values().cloned().collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }

    pub async fn tick(&self) -> Result<TickOutcome> {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            debug!("previous tick still running, skipping");
            return Ok(TickOutcome::Skipped);
        };
        match self.refresh_all().await {
            Ok(n) => Ok(TickOutcome::Updated(n)),
            Err(e) => {
                warn!("update failed: {e}");
                Err(Error::UpdateFailed(Box::new(e)))
            }
        }
    }

    pub async fn refresh_device(&self, device_id: &str) -> Result<TickOutcome> {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            debug!(device_id, "refresh dropped, tick in flight");
            return Ok(TickOutcome::Skipped);
        };
        let thing = read(&self.things)
            .get(device_id)
            .cloned()
            .ok_or_else(|| Error::UnknownDevice(device_id.to_string()))?;
        let shadow = self.iot.get_shadow(device_id).await?;
        self.apply(thing, shadow).await?;
        Ok(TickOutcome::Updated(1))
    }

    pub(crate) fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let period = clamp_poll_interval(self.config.poll_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(secs = period.as_secs(), "polling started");
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = stopped(&mut shutdown) => break,
                }
                tokio::select! {
                    // failures are already logged; the next tick retries
                    _ = self.tick() => {}
                    _ = stopped(&mut shutdown) => break,
                }
            }
            info!("polling stopped");
        })
    }

    async fn refresh_all(&self) -> Result<usize> {
        let things = self.list_things().await?;
        let count = things.len();
        for thing in things {
            let shadow = if thing.is_online {
                self.iot.get_shadow(&thing.device_id).await?
            } else {
                self.device(&thing.device_id)
                    .map(|d| d.shadow.clone())
                    .unwrap_or_else(|| Value::Object(Map::new()))
            };
            self.apply(thing, shadow).await?;
        }
        Ok(count)
    }

    async fn list_things(&self) -> Result<Vec<Thing>> {
        let things = match &self.source {
            ThingSource::Fake(things) => things.clone(),
            ThingSource::Cloud => {
                let tokens = self.session.get_refresh_tokens().await?;
                let auth = self.session.get_auth_data().await?;
                let urls = self.session.get_cloud_urls().await?;
                self.session
                    .rest()
                    .list_things(&urls.device_url, tokens.saas_token.expose(), &auth.user.country_abbr)
                    .await?
            }
        };
        debug!(count = things.len(), "things listed");
        *write(&self.things) = things.iter().map(|t| (t.device_id.clone(), t.clone())).collect();
        write(&self.devices).retain(|id, _| {
            let listed = things.iter().any(|t| &t.device_id == id);
            if !listed {
                info!(device_id = %id, "device no longer listed, dropping it");
            }
            listed
        });
        Ok(things)
    }

    async fn apply(&self, thing: Thing, shadow: Value) -> Result<()> {
        let previous = self.device(&thing.device_id);
        let (mut storage, fresh) = self.load_storage(&thing.device_id).await?;
        if previous.is_none() && thing.family().is_supported() {
            self.setup_device(&thing, &mut storage).await;
        }

        let mut device = Device::build(&thing, shadow, storage);
        let seeded = seed_storage(device.family, &device.data, device.mode(), &mut device.storage);
        if seeded || fresh {
            save_json(self.store.as_ref(), &device_key(&self.config.namespace, &device.device_id), &device.storage)
                .await?;
        }
        if self.config.verbose_device_logging {
            debug!(device_id = %device.device_id, shadow = %device.shadow, "device refreshed");
        } else {
            trace!(device_id = %device.device_id, shadow = %device.shadow, "device refreshed");
        }
        self.warn_unknown_keys(&device);

        let mut events = Vec::new();
        match &previous {
            None => events.push(Event::DeviceAdded {
                device_id: device.device_id.clone(),
                family: device.family,
            }),
            Some(prev) if prev.is_online != device.is_online => events.push(Event::OnlineChanged {
                device_id: device.device_id.clone(),
                online: device.is_online,
            }),
            Some(_) => {}
        }
        let empty = Value::Object(Map::new());
        events.extend(device_events(previous.as_ref().map_or(&empty, |p| &p.shadow), &device));

        let device = Arc::new(device);
        write(&self.devices).insert(device.device_id.clone(), device.clone());
        for event in &events {
            for cb in &self.observers.events {
                cb(event);
            }
        }
        for cb in &self.observers.snapshots {
            cb(&device);
        }
        let _ = self.snapshots.send(device);
        Ok(())
    }

    async fn load_storage(&self, device_id: &str) -> Result<(DeviceStorage, bool)> {
        let key = device_key(&self.config.namespace, device_id);
        if let Some(storage) = load_json(self.store.as_ref(), &key).await? {
            return Ok((storage, false));
        }
        let mut storage = DeviceStorage::default();
        storage.user_config.behavior.silent_beep_when_turn_on = self.config.behavior_mute_beep_on_power_on;
        Ok((storage, true))
    }

    /// First-sight probes: statistics availability for every supported
    /// device and the plug-in bundle for portables. Failures only disable
    /// the corresponding features.
    async fn setup_device(&self, thing: &Thing, storage: &mut DeviceStorage) {
        if matches!(self.source, ThingSource::Fake(_)) {
            return;
        }
        let device_id = thing.device_id.as_str();
        let family = thing.family();
        self.trace_setup(device_id, &format!("setting up {} ({})", thing.display_name(), family.as_str()));

        let context = async {
            let tokens = self.session.get_refresh_tokens().await?;
            let auth = self.session.get_auth_data().await?;
            let urls = self.session.get_cloud_urls().await?;
            Ok::<_, Error>((tokens, auth, urls))
        };
        let (tokens, auth, urls) = match context.await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(device_id, "device setup skipped: {e}");
                return;
            }
        };
        let rest = self.session.rest();
        let saas = tokens.saas_token.expose();
        let mut changed = false;

        let nuc = &mut storage.non_user_config;
        if !nuc.work_time.init_done || !nuc.power_consumption.init_done {
            let year = chrono::DateTime::from_timestamp(self.session.now(), 0)
                .map(|t| t.year())
                .unwrap_or(1970);
            let filter = StatsFilter::Year(year);
            if !nuc.work_time.init_done {
                let enabled = rest.get_work_time(&urls.device_url, saas, device_id, &filter).await.is_ok();
                nuc.work_time.init_done = true;
                nuc.work_time.enabled = enabled;
                self.trace_setup(device_id, &format!("work time statistics enabled: {enabled}"));
            }
            if !nuc.power_consumption.init_done {
                let enabled = rest
                    .get_energy_consumption(&urls.device_url, saas, device_id, &filter)
                    .await
                    .is_ok();
                nuc.power_consumption.init_done = true;
                nuc.power_consumption.enabled = enabled;
                self.trace_setup(device_id, &format!("energy statistics enabled: {enabled}"));
            }
            changed = true;
        }

        if family == Family::PortableAc && !nuc.rn_probe_data.as_ref().is_some_and(|p| p.is_success) {
            let result = probe::run(rest, &urls.cloud_url, saas, &thing.product_key, &auth.user.country_abbr).await;
            self.trace_setup(device_id, &format!("plug-in probe success: {}", result.is_success));
            nuc.rn_probe_data = Some(result);
            changed = true;
        }

        if changed {
            let probed = storage.non_user_config.clone();
            let key = device_key(&self.config.namespace, device_id);
            let saved = update_json(self.store.as_ref(), &key, |s: &mut DeviceStorage| {
                s.non_user_config.work_time = probed.work_time;
                s.non_user_config.power_consumption = probed.power_consumption;
                s.non_user_config.rn_probe_data = probed.rn_probe_data;
            })
            .await;
            if let Err(e) = saved {
                warn!(device_id, "could not persist setup probes: {e}");
            }
        }
    }

    fn warn_unknown_keys(&self, device: &Device) {
        let Some(reported) = device.shadow.pointer("/state/reported").and_then(Value::as_object) else {
            return;
        };
        let mut warned = self.warned_keys.lock().unwrap_or_else(|e| e.into_inner());
        for key in reported.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
            if warned.insert((device.device_id.clone(), key.clone())) {
                warn!(device_id = %device.device_id, key = %key, "unknown shadow field ignored");
            }
        }
    }

    fn trace_setup(&self, device_id: &str, msg: &str) {
        if self.config.verbose_setup_logging {
            debug!(device_id, "{msg}");
        } else {
            trace!(device_id, "{msg}");
        }
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognito::CognitoBroker;
    use crate::iot::{FakeIot, IotData};
    use crate::rest::TclRestClient;
    use crate::session::SystemClock;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn coordinator(
        things: Value,
        shadows: Value,
        events: Vec<EventCallback>,
    ) -> (Arc<Coordinator>, Arc<FakeIot>, Arc<MemoryStore>) {
        let fake = Arc::new(FakeIot::from_fake_data(&json!({ "shadows": shadows })));
        let (coordinator, store) = coordinator_over(things, fake.clone(), events);
        (coordinator, fake, store)
    }

    fn coordinator_over(
        things: Value,
        iot: Arc<dyn IotData>,
        events: Vec<EventCallback>,
    ) -> (Arc<Coordinator>, Arc<MemoryStore>) {
        let config = ClientConfig::new("u", "p");
        let store = Arc::new(MemoryStore::new());
        let rest = TclRestClient::new(Duration::from_secs(1)).unwrap();
        let cognito = CognitoBroker::new();
        let session = Arc::new(SessionManager::new(
            config.clone(),
            rest,
            cognito,
            store.clone(),
            Arc::new(SystemClock),
        ));
        let iot = Arc::new(IotClient::offline(iot));
        let things = serde_json::from_value(things).unwrap();
        let coordinator = Coordinator::new(
            config,
            session,
            iot,
            store.clone(),
            ThingSource::Fake(things),
            Arc::new(Observers {
                events,
                snapshots: Vec::new(),
            }),
        );
        (Arc::new(coordinator), store)
    }

    struct SlowIot;

    #[async_trait::async_trait]
    impl IotData for SlowIot {
        async fn get_shadow(&self, _device_id: &str) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(json!({"state": {"reported": {"powerSwitch": 1}}}))
        }

        async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn tick_builds_devices_and_seeds_storage() {
        let (c, _, store) = coordinator(
            json!([{"deviceId": "d1", "deviceName": "Split AC", "isOnline": 1}]),
            json!({"d1": {"state": {"reported": {"powerSwitch": 1, "workMode": 1, "targetTemperature": 22}}}}),
            Vec::new(),
        );
        assert_eq!(c.tick().await.unwrap(), TickOutcome::Updated(1));
        let device = c.device("d1").unwrap();
        assert_eq!(device.family, Family::SplitAc);
        assert!(device.is_on());

        let stored: DeviceStorage = load_json(store.as_ref(), &device_key("tcl_hvac", "d1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.remembered_temperature(crate::device::Mode::Cool), Some(22.0));
    }

    #[tokio::test]
    async fn events_on_first_and_changed_poll() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cb: EventCallback = Box::new(move |e: &Event| sink.lock().unwrap().push(e.clone()));
        let (c, _fake, _) = coordinator(
            json!([{"deviceId": "d1", "deviceName": "Split AC", "isOnline": 1}]),
            json!({"d1": {"state": {"reported": {"powerSwitch": 0, "workMode": 1}}}}),
            vec![cb],
        );
        c.tick().await.unwrap();
        assert!(seen.lock().unwrap().contains(&Event::DeviceAdded {
            device_id: "d1".into(),
            family: Family::SplitAc
        }));

        seen.lock().unwrap().clear();
        let desired: Map<String, Value> = [("powerSwitch".to_string(), json!(1))].into_iter().collect();
        c.iot().publish_desired("d1", &desired).await.unwrap();
        c.refresh_device("d1").await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Event::PowerChanged { device_id: "d1".into(), on: true }]
        );
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let (c, _, _) = coordinator(json!([]), json!({}), Vec::new());
        let _guard = c.tick_lock.lock().await;
        assert_eq!(c.tick().await.unwrap(), TickOutcome::Skipped);
    }

    #[tokio::test]
    async fn tick_failure_is_update_failed() {
        let (c, _, _) = coordinator(
            json!([{"deviceId": "ghost", "deviceName": "Split AC", "isOnline": 1}]),
            json!({}),
            Vec::new(),
        );
        let err = c.tick().await.unwrap_err();
        assert!(matches!(err, Error::UpdateFailed(inner) if matches!(*inner, Error::UnknownDevice(_))));
    }

    #[tokio::test]
    async fn offline_thing_keeps_previous_shadow() {
        let (c, _, _) = coordinator(
            json!([{"deviceId": "d1", "deviceName": "Window AC", "isOnline": 0}]),
            json!({}),
            Vec::new(),
        );
        c.tick().await.unwrap();
        let device = c.device("d1").unwrap();
        assert!(!device.is_online);
        assert_eq!(device.shadow, json!({}));
    }

    #[tokio::test]
    async fn subscribers_receive_snapshots() {
        let (c, _, _) = coordinator(
            json!([{"deviceId": "d1", "deviceName": "Portable AC", "isOnline": 1}]),
            json!({"d1": {"state": {"reported": {"powerSwitch": 1}}}}),
            Vec::new(),
        );
        let mut rx = c.subscribe();
        c.tick().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().device_id, "d1");
        let weak = c.device_weak("d1").unwrap();
        assert!(weak.upgrade().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_stops_on_shutdown() {
        let counter = Arc::new(AtomicUsize::new(0));
        let hits = counter.clone();
        let cb: EventCallback = Box::new(move |_: &Event| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        let (c, _, _) = coordinator(
            json!([{"deviceId": "d1", "deviceName": "Split AC", "isOnline": 1}]),
            json!({"d1": {"state": {"reported": {"powerSwitch": 1}}}}),
            vec![cb],
        );
        let (tx, rx) = watch::channel(false);
        let handle = c.clone().spawn(rx);
        tokio::time::sleep(Duration::from_secs(61)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(counter.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_tick_in_flight() {
        let counter = Arc::new(AtomicUsize::new(0));
        let hits = counter.clone();
        let cb: EventCallback = Box::new(move |_: &Event| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        let (c, _) = coordinator_over(
            json!([{"deviceId": "d1", "deviceName": "Split AC", "isOnline": 1}]),
            Arc::new(SlowIot),
            vec![cb],
        );
        let (tx, rx) = watch::channel(false);
        let handle = c.clone().spawn(rx);
        // first tick fires at 60s and then waits 30s on the shadow read
        tokio::time::sleep(Duration::from_secs(61)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poll task stops without finishing the tick")
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(c.device("d1").is_none());
        assert!(c.tick_lock.try_lock().is_ok());
    }
}
