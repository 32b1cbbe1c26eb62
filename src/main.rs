use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use careteam_auth::{
    config::Config,
    db::{
        self,
        memory::MemoryStore,
        postgres::{PgAuthCodeStore, PgInvitationStore, PgTokenStore, PgUserStore},
        AuthCodeStore, InvitationStore, TokenStore, UserStore,
    },
    services::{
        auth::AuthService,
        auth_code::{AuthCodes, LogCodeSender},
        invitations::InvitationService,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let (users, tokens, codes, invitations): (
        Arc<dyn UserStore>,
        Arc<dyn TokenStore>,
        Arc<dyn AuthCodeStore>,
        Arc<dyn InvitationStore>,
    ) = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool).await?;
            info!("Database connected and migrations applied");
            (
                Arc::new(PgUserStore::new(pool.clone())),
                Arc::new(PgTokenStore::new(pool.clone())),
                Arc::new(PgAuthCodeStore::new(pool.clone())),
                Arc::new(PgInvitationStore::new(pool)),
            )
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory stores");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store.clone(), store.clone(), store)
        }
    };

    let codes = AuthCodes::new(&config.auth, codes, Arc::new(LogCodeSender));
    let auth = Arc::new(AuthService::new(&config.auth, users, tokens, codes));
    let invitations = Arc::new(InvitationService::new(
        invitations,
        auth.clone(),
        config.auth.invite_token_lifetime,
    ));

    let state = AppState {
        auth,
        invitations,
        config: config.clone(),
    };
    let app = careteam_auth::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("auth API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
