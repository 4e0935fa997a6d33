// src/main.rs
use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

use theme_discovery::api::process_data::{run_operation, BatchUpdateData, ProcessOperation, ProcessOptions};
use theme_discovery::config::AppConfig;
use theme_discovery::db::PgStore;
use theme_discovery::store::MemoryStore;
use theme_discovery::{api, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

fn io_error(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(io_error)?;

    let state = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .map_err(io_error)?;
            sqlx::migrate!().run(&pool).await.map_err(io_error)?;
            log::info!("connected to postgres, migrations applied");
            AppState::new(Arc::new(PgStore::new(pool)), &config)
        }
        None => {
            log::warn!("DATABASE_URL not set, using in-memory store");
            AppState::new(Arc::new(MemoryStore::new()), &config)
        }
    };

    if let Some(period) = config.batch_update_interval {
        let job_state = state.clone();
        state.scheduler.start("batch_update", period, move || {
            let state = job_state.clone();
            async move {
                let operation = ProcessOperation::BatchUpdate(BatchUpdateData {
                    theme_ids: Vec::new(),
                    stale_only: true,
                });
                if let Err(e) =
                    run_operation(&state, &operation, &ProcessOptions::default(), None).await
                {
                    log::error!("scheduled batch_update failed: {e}");
                }
            }
        });
    }

    let scheduler = state.scheduler.clone();
    let state = web::Data::new(state);
    let bind = (config.host.clone(), config.port);
    log::info!("listening on {}:{}", bind.0, bind.1);

    let result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .route("/", web::get().to(index))
            .configure(api::configure)
    })
    .bind(bind)?
    .run()
    .await;

    scheduler.stop_all();
    result
}
