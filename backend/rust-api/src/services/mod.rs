use std::sync::Arc;
use std::time::Duration;

use mongodb::Client as MongoClient;
use redis::aio::ConnectionManager;

use crate::config::{Config, StorageBackend};
use crate::middlewares::auth::JwtService;
use crate::models::DifficultyCatalog;
use crate::repositories::{MemoryStore, MongoStore, Stores};

pub mod access_policy;
pub mod advice_service;
pub mod analytics_worker;
pub mod event_queue;
pub mod progress_service;
pub mod prompt_builder;
pub mod quality_validator;
pub mod regeneration;
pub mod response_parser;
pub mod scoring_service;
pub mod statistics_service;
pub mod submission_lock;
pub mod test_service;
pub mod text_generator;

use access_policy::{AccessPolicy, CreatorOrStaffPolicy};
use advice_service::AdviceService;
use analytics_worker::AnalyticsWorker;
use event_queue::{EventQueue, InProcessQueue, RedisEventQueue};
use progress_service::ProgressService;
use regeneration::RegenerationCoordinator;
use scoring_service::ScoringService;
use statistics_service::StatisticsService;
use submission_lock::{InMemorySubmissionLock, RedisSubmissionLock, SubmissionLock};
use test_service::TestService;
use text_generator::{TextGenerator, UnconfiguredGenerator, YandexGptClient};

pub struct AppState {
    pub config: Config,
    pub jwt: JwtService,
    pub queue: Arc<dyn EventQueue>,
    pub tests: TestService,
    pub progress: ProgressService,
    pub scoring: ScoringService,
    pub statistics: StatisticsService,
    pub advice: AdviceService,
    mongo: Option<MongoStore>,
}

/// External collaborators the services are assembled from.
pub struct Collaborators {
    pub stores: Stores,
    pub catalog: Arc<DifficultyCatalog>,
    pub generator: Arc<dyn TextGenerator>,
    pub queue: Arc<dyn EventQueue>,
    pub lock: Arc<dyn SubmissionLock>,
    pub policy: Arc<dyn AccessPolicy>,
}

impl AppState {
    pub fn from_parts(config: Config, parts: Collaborators) -> Self {
        let Collaborators {
            stores,
            catalog,
            generator,
            queue,
            lock,
            policy,
        } = parts;

        let coordinator = RegenerationCoordinator::new(generator.clone(), config.generation.clone());
        let tests = TestService::new(
            stores.tests.clone(),
            stores.topics.clone(),
            catalog,
            coordinator,
            policy,
        );
        let progress = ProgressService::new(stores.progress.clone(), stores.tests.clone());
        let scoring = ScoringService::new(
            tests.clone(),
            stores.topics.clone(),
            stores.audit.clone(),
            stores.history.clone(),
            stores.progress.clone(),
            queue.clone(),
            lock,
        );
        let statistics = StatisticsService::new(
            stores.history.clone(),
            stores.statistics.clone(),
            stores.topics.clone(),
            stores.tests.clone(),
        );
        let advice = AdviceService::new(stores.history.clone(), stores.tests.clone(), generator);

        Self {
            jwt: JwtService::new(&config.jwt_secret),
            config,
            queue,
            tests,
            progress,
            scoring,
            statistics,
            advice,
            mongo: None,
        }
    }

    /// Fully in-process state: memory store, in-process queue and lock.
    pub fn in_memory(
        config: Config,
        store: Arc<MemoryStore>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self::from_parts(
            config,
            Collaborators {
                stores: Stores::from_memory(store),
                catalog: Arc::new(DifficultyCatalog::default()),
                generator,
                queue: Arc::new(InProcessQueue::new()),
                lock: Arc::new(InMemorySubmissionLock::default()),
                policy: Arc::new(CreatorOrStaffPolicy),
            },
        )
    }

    /// Production state backed by MongoDB and Redis.
    pub async fn connect(config: Config) -> anyhow::Result<Self> {
        if config.storage == StorageBackend::Memory {
            let generator: Arc<dyn TextGenerator> = if config.generator.api_key.is_empty() {
                tracing::warn!("No generator API key configured, generation requests will fail");
                Arc::new(UnconfiguredGenerator)
            } else {
                Arc::new(YandexGptClient::new(config.generator.clone())?)
            };
            tracing::warn!("Memory storage selected, data is lost on restart");
            return Ok(Self::in_memory(config, Arc::new(MemoryStore::new()), generator));
        }

        let mongo_client = MongoClient::with_uri_str(&config.mongo_uri).await?;
        let mongo = MongoStore::new(mongo_client.database(&config.mongo_database));
        mongo.ping().await?;
        tracing::info!("MongoDB connection established");

        let redis = connect_redis(&config.redis_uri).await?;
        let generator = Arc::new(YandexGptClient::new(config.generator.clone())?);

        let mut state = Self::from_parts(
            config,
            Collaborators {
                stores: Stores::from_mongo(mongo.clone()),
                catalog: Arc::new(DifficultyCatalog::default()),
                generator,
                queue: Arc::new(RedisEventQueue::new(redis.clone())),
                lock: Arc::new(RedisSubmissionLock::new(redis)),
                policy: Arc::new(CreatorOrStaffPolicy),
            },
        );
        state.mongo = Some(mongo);
        Ok(state)
    }

    /// A worker consuming this state's queue.
    pub fn analytics_worker(&self) -> AnalyticsWorker {
        AnalyticsWorker::new(self.queue.clone(), self.advice.clone(), self.statistics.clone())
    }

    pub async fn check_store(&self) -> anyhow::Result<()> {
        match &self.mongo {
            Some(mongo) => mongo.ping().await,
            None => Ok(()),
        }
    }
}

pub async fn connect_redis(uri: &str) -> anyhow::Result<ConnectionManager> {
    tracing::info!("Attempting to connect to Redis...");
    let client = redis::Client::open(uri)?;

    let redis = tokio::time::timeout(Duration::from_secs(30), ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    let mut conn = redis.clone();
    tokio::time::timeout(
        Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");
    Ok(redis)
}
