use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOGIN_URL: &str = "https://pa.account.tcl.com/account/login?clientId=54148614";
pub const DEFAULT_CLOUD_URLS: &str = "https://prod-center.aws.tcljd.com/v3/global/cloud_url_get";
pub const DEFAULT_APP_ID: &str = "wx6e1af3fa84fbe523";
pub const DEFAULT_NAMESPACE: &str = "tcl_hvac";

pub const DEFAULT_POLL_SECS: u64 = 60;
pub const MIN_POLL_SECS: u64 = 10;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Clone)]
pub struct ClientConfig {
    pub username: String,
    pub password: String,
    pub app_login_url: String,
    /// Bootstrap URL used for region discovery.
    pub cloud_urls: String,
    pub app_id: String,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub namespace: String,
    pub verbose_device_logging: bool,
    pub verbose_session_logging: bool,
    pub verbose_setup_logging: bool,
    pub behavior_mute_beep_on_power_on: bool,
}

impl ClientConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            app_login_url: DEFAULT_LOGIN_URL.to_string(),
            cloud_urls: DEFAULT_CLOUD_URLS.to_string(),
            app_id: DEFAULT_APP_ID.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            namespace: DEFAULT_NAMESPACE.to_string(),
            verbose_device_logging: false,
            verbose_session_logging: false,
            verbose_setup_logging: false,
            behavior_mute_beep_on_power_on: false,
        }
    }

    /// Sets the poll interval, clamped to the 10 second floor.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = clamp_poll_interval(interval);
    }

    /// Reads the daemon configuration from `TCL_*` environment variables.
    pub fn from_env() -> Result<Self, String> {
        let username = env_nonempty("TCL_USERNAME").ok_or("missing TCL_USERNAME")?;
        let password = env_nonempty("TCL_PASSWORD").ok_or("missing TCL_PASSWORD")?;
        let mut config = Self::new(username, password);

        if let Some(url) = env_nonempty("TCL_APP_LOGIN_URL") {
            config.app_login_url = url;
        }
        if let Some(url) = env_nonempty("TCL_CLOUD_URLS") {
            config.cloud_urls = url;
        }
        if let Some(id) = env_nonempty("TCL_APP_ID") {
            config.app_id = id;
        }
        if let Some(secs) = env_nonempty("TCL_POLL_INTERVAL_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| "TCL_POLL_INTERVAL_SECS must be a whole number of seconds")?;
            config.set_poll_interval(Duration::from_secs(secs));
        }
        if env_flag("TCL_VERBOSE") {
            config.verbose_device_logging = true;
            config.verbose_session_logging = true;
            config.verbose_setup_logging = true;
        }
        config.behavior_mute_beep_on_power_on = env_flag("TCL_MUTE_BEEP_ON_POWER_ON");
        Ok(config)
    }

    pub fn state_dir_from_env() -> PathBuf {
        env_nonempty("TCL_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".tcl-state"))
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("username", &self.username)
            .field("password", &"REDACTED")
            .field("app_login_url", &self.app_login_url)
            .field("cloud_urls", &self.cloud_urls)
            .field("app_id", &self.app_id)
            .field("poll_interval", &self.poll_interval)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

pub fn clamp_poll_interval(interval: Duration) -> Duration {
    interval.max(Duration::from_secs(MIN_POLL_SECS))
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> bool {
    env_nonempty(name)
        .map(|s| matches!(s.as_str(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false)
}
