use std::sync::Arc;

use aws_config::BehaviorVersion;
use domain::{
    prescriptions::Workflow,
    store::{DynamoStore, MemoryStore, RecordStore},
};

mod config;
mod error;
mod principal;
mod routes;

use config::{load_seed, Backend, Config, Seed};
use routes::AppState;

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env()?;
    let store = init_store(&config).await?;

    let app = routes::router(AppState {
        workflow: Workflow::new(store),
    });

    match config.local_bind_addr {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on {}", addr);
            axum::serve(listener, app).await?;
        }
        None => {
            let app = tower::ServiceBuilder::new()
                .layer(axum_aws_lambda::LambdaLayer::default())
                .service(app);

            lambda_http::run(app).await?;
        }
    }

    Ok(())
}

async fn init_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.backend {
        Backend::DynamoDb => {
            let aws = aws_config::defaults(BehaviorVersion::latest()).load().await;
            let client = aws_sdk_dynamodb::Client::new(&aws);
            tracing::info!(
                "Using DynamoDB tables {}, {}, {}",
                config.tables.users,
                config.tables.medicines,
                config.tables.prescriptions
            );
            Ok(Arc::new(DynamoStore::new(client, config.tables.clone())))
        }
        Backend::Memory => {
            let seed = match &config.seed_file {
                Some(path) => load_seed(path)?,
                None => Seed::default(),
            };
            tracing::info!(
                "Using in-memory store seeded with {} users and {} medicines",
                seed.users.len(),
                seed.medicines.len()
            );
            Ok(Arc::new(
                MemoryStore::seeded(seed.users, seed.medicines).await,
            ))
        }
    }
}
