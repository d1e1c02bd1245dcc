mod api;
mod config;
mod finding;
mod persistence;
mod project;
mod run;
mod runner;

use crate::api::build_api;
use crate::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .unwrap();
    let router = build_api(config).await;
    axum::serve(listener, router).await.unwrap();
}
