use sqlx::postgres::PgPoolOptions;

mod creation_job;
mod logger;
mod poll_job;
mod state_machine;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres");

    // Same embedded migrations as the API; sqlx's ledger makes this a no-op
    // when the API already ran them.
    sqlx::migrate!("../sqlx-migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    println!("Hostbay orchestrator starting");

    let creation = tokio::spawn(creation_job::run(pool.clone()));
    let poll = tokio::spawn(poll_job::run(pool.clone()));

    tokio::select! {
        _ = creation => eprintln!("❌ job-creation exited"),
        _ = poll => eprintln!("❌ job-poll exited"),
        _ = tokio::signal::ctrl_c() => println!("Shutting down"),
    }
}
