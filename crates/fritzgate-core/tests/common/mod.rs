// Scripted in-memory backend shared by the integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

use fritzgate_api::{DeviceInfo, Error, Procedure, RemoteProcedure, SessionId};
use tokio_util::sync::CancellationToken;

use fritzgate_core::{
    AccessoryKind, AccessoryPlan, Credentials, Device, DeviceStateCache, DispatchPolicy,
    GatewayConfig, RequestQueue, RetryPolicy, SessionManager,
};

pub const USERNAME: &str = "smarthome";
pub const PASSWORD: &str = "hunter2";

/// What a scripted call does instead of the default answer.
#[derive(Debug, Clone)]
pub enum Outcome {
    Answer(Value),
    /// HTTP 503; retried by the queue.
    Unavailable,
    /// HTTP 403 regardless of the session id.
    Expired,
    /// `inval`
    Rejected,
}

impl Outcome {
    fn into_result(self, procedure: Procedure) -> Result<Value, Error> {
        match self {
            Self::Answer(value) => Ok(value),
            Self::Unavailable => Err(Error::Api {
                status: 503,
                message: "Service Unavailable".into(),
            }),
            Self::Expired => Err(Error::SessionExpired),
            Self::Rejected => Err(Error::InvalidResponse {
                procedure: procedure.to_string(),
                body: "inval".into(),
            }),
        }
    }
}

/// How a scripted login ends.
#[derive(Debug, Clone, Copy)]
pub enum Login {
    /// Wrong user name or password.
    Refused,
    /// The box does not answer in time.
    TimedOut,
    /// The box answers with the all-zero session id.
    ZeroSid,
}

/// One call as the backend saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub procedure: Procedure,
    pub args: Vec<Value>,
    pub sid: String,
}

#[derive(Default)]
struct MockState {
    valid_sid: Option<String>,
    login_fails: bool,
    logins: VecDeque<Login>,
    answers: HashMap<Procedure, Value>,
    scripted: HashMap<Procedure, VecDeque<Outcome>>,
    always: HashMap<Procedure, Outcome>,
    started: Vec<Recorded>,
    finished: Vec<Recorded>,
}

/// In-memory box: issues session ids, rejects stale ones with 403, and
/// answers procedures from a script.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    latency: Duration,
    login_latency: Duration,
    logins: AtomicUsize,
    logouts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call takes `latency` (virtual time under a paused clock).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_login_latency(mut self, latency: Duration) -> Self {
        self.login_latency = latency;
        self
    }

    /// Default answer for `procedure`.
    pub fn answer(self, procedure: Procedure, value: Value) -> Self {
        self.state().answers.insert(procedure, value);
        self
    }

    pub fn with_devices(self, devices: &[DeviceInfo]) -> Self {
        self.answer(Procedure::GetDeviceList, serde_json::to_value(devices).unwrap())
    }

    /// Queue one-off outcomes for the next calls to `procedure`.
    pub fn script(&self, procedure: Procedure, outcomes: impl IntoIterator<Item = Outcome>) {
        self.state()
            .scripted
            .entry(procedure)
            .or_default()
            .extend(outcomes);
    }

    /// Make every call to `procedure` end with `outcome`.
    pub fn always(&self, procedure: Procedure, outcome: Outcome) {
        self.state().always.insert(procedure, outcome);
    }

    /// Forget the current session, as the box does after its idle timeout.
    pub fn expire_session(&self) {
        self.state().valid_sid = None;
    }

    pub fn fail_logins(&self, fail: bool) {
        self.state().login_fails = fail;
    }

    /// Queue one-off outcomes for the next logins.
    pub fn script_logins(&self, outcomes: impl IntoIterator<Item = Login>) {
        self.state().logins.extend(outcomes);
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Calls in the order they reached the backend.
    pub fn started(&self) -> Vec<Recorded> {
        self.state().started.clone()
    }

    /// Calls in the order they completed.
    pub fn finished(&self) -> Vec<Recorded> {
        self.state().finished.clone()
    }

    pub fn calls_to(&self, procedure: Procedure) -> Vec<Recorded> {
        self.started()
            .into_iter()
            .filter(|c| c.procedure == procedure)
            .collect()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn outcome(&self, procedure: Procedure, args: &[Value]) -> Outcome {
        let mut state = self.state();
        if let Some(outcome) = state.always.get(&procedure) {
            return outcome.clone();
        }
        if let Some(outcome) = state.scripted.get_mut(&procedure).and_then(VecDeque::pop_front) {
            return outcome;
        }
        let echo = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);
        Outcome::Answer(match procedure {
            Procedure::SetSwitchOn => json!(true),
            Procedure::SetSwitchOff => json!(false),
            Procedure::SetTempTarget => echo(1),
            Procedure::SetGuestWlan => echo(0),
            other => state.answers.get(&other).cloned().unwrap_or(Value::Null),
        })
    }
}

#[async_trait]
impl RemoteProcedure for MockBackend {
    async fn authenticate(
        &self,
        username: &str,
        _password: &SecretString,
    ) -> Result<SessionId, Error> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.login_latency.is_zero() {
            tokio::time::sleep(self.login_latency).await;
        }
        let mut state = self.state();
        let refused = match state.logins.pop_front() {
            Some(Login::TimedOut) => return Err(Error::Timeout { timeout_secs: 5 }),
            Some(Login::ZeroSid) => return Ok(SessionId::new("0000000000000000")),
            Some(Login::Refused) => true,
            None => state.login_fails,
        };
        if refused || username != USERNAME {
            return Err(Error::Authentication {
                message: "wrong user name or password".into(),
            });
        }
        let sid = format!("{n:016x}");
        state.valid_sid = Some(sid.clone());
        Ok(SessionId::new(sid))
    }

    async fn call(
        &self,
        procedure: Procedure,
        sid: &SessionId,
        args: &[Value],
    ) -> Result<Value, Error> {
        let record = Recorded {
            procedure,
            args: args.to_vec(),
            sid: sid.as_str().to_owned(),
        };
        self.state().started.push(record.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let authorized = self.state().valid_sid.as_deref() == Some(sid.as_str());
        let result = if authorized {
            self.outcome(procedure, args).into_result(procedure)
        } else {
            Err(Error::SessionExpired)
        };
        self.state().finished.push(record);
        result
    }

    async fn logout(&self, sid: &SessionId) -> Result<(), Error> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if state.valid_sid.as_deref() == Some(sid.as_str()) {
            state.valid_sid = None;
        }
        Ok(())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

pub fn config() -> GatewayConfig {
    GatewayConfig::new(
        Url::parse("http://fritz.box").unwrap(),
        Credentials {
            username: USERNAME.into(),
            password: SecretString::from(PASSWORD.to_owned()),
        },
    )
}

pub fn concurrent(max_in_flight: usize) -> GatewayConfig {
    let mut config = config();
    config.dispatch = DispatchPolicy::Concurrent { max_in_flight };
    config
}

pub fn retry(mut config: GatewayConfig, max_attempts: u32, delay: Duration) -> GatewayConfig {
    config.retry = RetryPolicy {
        max_attempts,
        delay,
    };
    config
}

/// A device entry as `getdevicelistinfos` reports it.
pub fn device(identifier: &str, name: &str, mask: u32) -> DeviceInfo {
    DeviceInfo {
        identifier: identifier.into(),
        id: "16".into(),
        function_bitmask: mask,
        name: name.into(),
        manufacturer: "AVM".into(),
        product_name: String::new(),
        fw_version: "04.25".into(),
        present: true,
        is_group: false,
        switch: None,
        power_meter: None,
        temperature: None,
        thermostat: None,
        alert: None,
        battery: None,
        battery_low: false,
        humidity: None,
        buttons: Vec::new(),
    }
}

/// Plan for an accessory of `kind` backed by `info`.
pub fn plan(kind: AccessoryKind, info: DeviceInfo) -> AccessoryPlan {
    AccessoryPlan {
        kind,
        name: info.name.clone(),
        device: Some(Device::from(info)),
    }
}

/// A cache over a running queue, without the gateway around it.
pub fn cache(backend: MockBackend) -> (Arc<MockBackend>, DeviceStateCache) {
    let backend = Arc::new(backend);
    let config = config();
    let session = SessionManager::new(backend.clone(), config.credentials);
    let (queue, _task) = RequestQueue::spawn(
        backend.clone(),
        session,
        config.dispatch,
        config.retry,
        CancellationToken::new(),
    );
    (backend, DeviceStateCache::new(queue))
}

/// Let every runnable task finish. Under a paused clock this returns once
/// the runtime is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(1)).await;
}

// Bitmasks of the usual AVM devices.
pub const DECT_200: u32 = 35_712;
pub const DECT_301: u32 = 320;
pub const DECT_440: u32 = 1_048_864;
pub const DECT_350: u32 = 8_208;
pub const DECT_400: u32 = 32;
