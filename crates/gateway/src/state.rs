//! Application state shared across handlers

use axum::extract::FromRef;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use viewer_common::{
    auth::JwtManager,
    bookmarks::SessionBookmarkStore,
    cache::{keys, Cache},
    config::AppConfig,
    db::{DbPool, Repository},
    download::{DownloadService, TaskManagerClient},
    ead::{BasexClient, BasexEadParser, EadSessionStore},
    errors::{AppError, Result},
    iiif::{ApiUrls, ImageHandler, ThumbnailHandler, WatermarkHandler},
    search::{SearchIndex, SolrSearchIndex, SolrDocument},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub repo: Repository,
    pub search: Arc<dyn SearchIndex>,
    pub cache: Option<Arc<Cache>>,
    pub jwt: Arc<JwtManager>,
    pub images: Arc<ImageHandler>,
    pub thumbnails: Arc<ThumbnailHandler>,
    pub watermarks: Arc<WatermarkHandler>,
    pub api_urls: Arc<ApiUrls>,
    pub ead: Arc<BasexEadParser>,
    pub ead_sessions: Arc<EadSessionStore>,
    pub bookmark_sessions: Arc<SessionBookmarkStore>,
    pub downloads: DownloadService,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl AppState {
    /// Wire every service from configuration; the cache is optional
    pub async fn build(config: Arc<AppConfig>, db: DbPool) -> Result<Self> {
        let jwt_secret = config.auth.jwt_secret.as_deref().ok_or_else(|| AppError::Configuration {
            message: "auth.jwt_secret must be set".to_string(),
        })?;
        let jwt = Arc::new(JwtManager::new(jwt_secret, config.auth.jwt_expiration_secs));

        let cache = match &config.redis {
            Some(redis) => match Cache::new(redis).await {
                Ok(cache) => {
                    info!("Redis cache connected");
                    Some(Arc::new(cache))
                }
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, running without cache");
                    None
                }
            },
            None => None,
        };

        let search: Arc<dyn SearchIndex> = Arc::new(SolrSearchIndex::new(&config.search)?);
        let repo = Repository::new(db.clone());

        let ead = BasexEadParser::new(
            Arc::new(BasexClient::new(&config.ead)?),
            search.clone(),
            cache.clone(),
            config.ead.clone(),
        );

        let downloads = DownloadService::new(
            repo.clone(),
            Arc::new(TaskManagerClient::new(&config.download)?),
            &config.download,
        );

        let idle = Duration::from_secs(config.server.session_idle_secs);

        Ok(Self {
            images: Arc::new(ImageHandler::new(&config.iiif)),
            thumbnails: Arc::new(ThumbnailHandler::new(&config.iiif)),
            watermarks: Arc::new(WatermarkHandler::new(&config.watermark, &config.iiif)),
            api_urls: Arc::new(ApiUrls::from_config(&config.iiif)),
            ead: Arc::new(ead),
            ead_sessions: Arc::new(EadSessionStore::new(idle)),
            bookmark_sessions: Arc::new(SessionBookmarkStore::new(idle)),
            config,
            db,
            repo,
            search,
            cache,
            jwt,
            downloads,
        })
    }

    /// Top-level record document, cached when redis is configured
    pub async fn record(&self, pi: &str) -> Result<SolrDocument> {
        let load = || async {
            self.search
                .record_by_pi(pi)
                .await?
                .ok_or_else(|| AppError::RecordNotFound { pi: pi.to_string() })
        };

        match &self.cache {
            Some(cache) => {
                let ttl = self
                    .config
                    .redis
                    .as_ref()
                    .map(|r| r.default_ttl_secs)
                    .unwrap_or_default();
                cache.get_or_load(&keys::record(pi), ttl, "record", load).await
            }
            None => load().await,
        }
    }

    /// Drop anonymous session state nobody touched for the idle timeout
    pub fn evict_idle_sessions(&self) -> usize {
        let now = Instant::now();
        self.ead_sessions.evict_idle(now) + self.bookmark_sessions.evict_idle(now)
    }
}
