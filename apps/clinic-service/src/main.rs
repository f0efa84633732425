use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use clinic_db::init_db_pool;
use clinic_service::api::{self, AppState};
use clinic_service::auth::TokenKeys;
use clinic_service::built_info;
use clinic_service::clock::SystemClock;
use clinic_service::config::ServiceConfig;
use clinic_service::Clinic;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::from_env().context("Falha ao carregar configuração")?;
    init_tracing(config.log_json);

    info!(
        "Iniciando {} v{} ({})",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::PROFILE
    );

    if config.jwt_secret.trim().is_empty() {
        bail!("CLINIC_JWT_SECRET não definido");
    }

    let pool = init_db_pool(&config.db).await?;
    let clinic = Clinic::new(pool, config.hours.clone(), Arc::new(SystemClock));
    let state = AppState::new(clinic, TokenKeys::from_secret(config.jwt_secret.as_bytes()));
    let app = api::router(state, config.max_in_flight);

    info!(
        "Expediente {}-{} (intervalo {}-{}), horários de {} minutos",
        config.hours.open, config.hours.close, config.hours.break_start, config.hours.break_end,
        config.hours.slot_minutes
    );
    info!("Servidor escutando em {}", config.bind_addr);

    axum::Server::bind(&config.bind_addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Falha no servidor HTTP")?;

    info!("Servidor encerrado");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Falha ao aguardar sinal de encerramento: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Sinal de encerramento recebido");
}
