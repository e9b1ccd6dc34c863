mod db;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let pool = db::init_pool(&database_url)
        .await
        .expect("database init failed");

    let config = state::ServerConfig::from_env();
    let state = state::AppState::new(pool, config);

    // Uploaded backgrounds and handouts are served straight off disk.
    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .expect("upload dir init failed");

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "fogboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
