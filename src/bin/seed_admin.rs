use colegio_cms::{
    auth::hash_password,
    models::{NewUser, Role},
    repository::{PostgresRepository, Repository},
};
use sqlx::postgres::PgPoolOptions;
use std::env;

/// seed-admin
///
/// Bootstraps the first principal. Reads `DATABASE_URL`, `SEED_ADMIN_EMAIL`,
/// `SEED_ADMIN_PASSWORD`, and optionally `SEED_ADMIN_NAME` and `SEED_ADMIN_ROLE`
/// (default `superadmin`). Does nothing if the email is already registered.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seed_admin=info,colegio_cms=info".into()),
        )
        .init();

    let db_url = env::var("DATABASE_URL").expect("FATAL: DATABASE_URL must be set.");
    let email = env::var("SEED_ADMIN_EMAIL").expect("FATAL: SEED_ADMIN_EMAIL must be set.");
    let password =
        env::var("SEED_ADMIN_PASSWORD").expect("FATAL: SEED_ADMIN_PASSWORD must be set.");
    let name = env::var("SEED_ADMIN_NAME").ok().filter(|n| !n.trim().is_empty());
    let role = match env::var("SEED_ADMIN_ROLE") {
        Ok(value) => Role::parse(value.trim())
            .unwrap_or_else(|| panic!("FATAL: unknown SEED_ADMIN_ROLE '{}'", value)),
        Err(_) => Role::Superadmin,
    };

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    let repo = PostgresRepository::new(pool);

    let existing = repo
        .find_user_by_email(email.trim())
        .await
        .expect("FATAL: Failed to query usuarios.");
    if let Some(user) = existing {
        tracing::info!(user_id = user.id, role = %user.role, "principal already exists, nothing to do");
        return;
    }

    let password_hash = hash_password(&password).expect("FATAL: Failed to hash password.");
    let user = repo
        .create_user(NewUser {
            email: email.trim().to_string(),
            password_hash,
            name,
            role: role.as_str().to_string(),
        })
        .await
        .expect("FATAL: Failed to create principal.");

    tracing::info!(user_id = user.id, email = %user.email, role = %user.role, "principal created");
}
