//! Services and controllers shared by the integration tests

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use tether_client::{ClientProperty, ServiceDirectory};
use tether_server::{
    shared::{async_trait, BoxError, InitContext, SessionId, StartContext, Unit},
    ClientTable, RemoteProperty, RemoteSignal, Service,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    pub from: u64,
    pub text: String,
}

// ScoreService
/// Exposes one of each channel kind
pub struct ScoreService {
    pub score: RemoteProperty<u32>,
    pub chat: RemoteSignal<ChatLine>,
    pub ping: RemoteSignal<u32>,
    pub heard: Arc<Mutex<Vec<(SessionId, ChatLine)>>>,
}

impl ScoreService {
    pub const NAME: &'static str = "ScoreService";

    pub fn new() -> Self {
        Self {
            score: RemoteProperty::new(0),
            chat: RemoteSignal::new(),
            ping: RemoteSignal::unreliable(),
            heard: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for ScoreService {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit for ScoreService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), BoxError> {
        let heard = self.heard.clone();
        self.chat
            .connect(move |session, line| heard.lock().push((session, line.clone())));
        Ok(())
    }
}

impl Service for ScoreService {
    fn client(&self, table: &mut ClientTable<Self>) {
        table
            .property("Score", &self.score)
            .signal("Chat", &self.chat)
            .signal("Ping", &self.ping)
            .method("Add", |_service: Arc<Self>, _session, (a, b): (u32, u32)| async move {
                Ok::<_, BoxError>(a + b)
            })
            .method("Whoami", |_service: Arc<Self>, session: SessionId, _: ()| async move {
                Ok::<_, BoxError>(session.to_u64())
            })
            .method("ScoreFor", |service: Arc<Self>, session, _: ()| async move {
                Ok::<_, BoxError>(service.score.get_for(session))
            })
            .method("Fail", |_service: Arc<Self>, _session, reason: String| async move {
                Err::<(), _>(reason)
            })
            .method("Panic", |_service: Arc<Self>, _session, _: ()| async move {
                if true {
                    panic!("handler blew up");
                }
                Ok::<(), BoxError>(())
            })
            .method("Sleep", |_service: Arc<Self>, _session, millis: u64| async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok::<_, BoxError>(millis)
            });
    }
}

// Lifecycle Probes

/// Records unit lifecycle events, in order, across every probe sharing it
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().iter().position(|found| found == entry)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    None,
    Init,
    Start,
    StartPanic,
}

/// A service with configurable dependencies that journals its lifecycle
pub struct ProbeService {
    name: &'static str,
    dependencies: Vec<&'static str>,
    failure: Failure,
    journal: Journal,
}

impl ProbeService {
    pub fn new(name: &'static str, dependencies: &[&'static str], journal: &Journal) -> Self {
        Self {
            name,
            dependencies: dependencies.to_vec(),
            failure: Failure::None,
            journal: journal.clone(),
        }
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = failure;
        self
    }
}

#[async_trait]
impl Unit for ProbeService {
    fn name(&self) -> &str {
        self.name
    }

    fn dependencies(&self) -> &[&str] {
        &self.dependencies
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<(), BoxError> {
        for dependency in &self.dependencies {
            ctx.get_by_name(dependency)?;
        }
        self.journal.record(format!("init {}", self.name));
        if self.failure == Failure::Init {
            return Err(format!("{} refused to init", self.name).into());
        }
        Ok(())
    }

    async fn start(&self, _ctx: StartContext) -> Result<(), BoxError> {
        self.journal.record(format!("start {}", self.name));
        match self.failure {
            Failure::Start => Err(format!("{} refused to start", self.name).into()),
            Failure::StartPanic => panic!("{} panicked in start", self.name),
            _ => Ok(()),
        }
    }
}

impl Service for ProbeService {}

// ScoreController
/// Client-side controller that resolves the score property during init
pub struct ScoreController {
    score: Option<ClientProperty<u32>>,
    pub started_with: Arc<Mutex<Option<u32>>>,
}

impl ScoreController {
    pub const NAME: &'static str = "ScoreController";

    pub fn new() -> Self {
        Self {
            score: None,
            started_with: Arc::new(Mutex::new(None)),
        }
    }

    pub fn score(&self) -> Option<&ClientProperty<u32>> {
        self.score.as_ref()
    }
}

impl Default for ScoreController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Unit for ScoreController {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<(), BoxError> {
        let directory = ctx
            .extension::<ServiceDirectory>()
            .ok_or("no service directory")?;
        let score = directory.service(ScoreService::NAME)?.property::<u32>("Score")?;
        self.score = Some(score);
        Ok(())
    }

    async fn start(&self, _ctx: StartContext) -> Result<(), BoxError> {
        if let Some(score) = &self.score {
            let value = score.wait_ready(Duration::from_secs(2)).await?;
            *self.started_with.lock() = Some(value);
        }
        Ok(())
    }
}
