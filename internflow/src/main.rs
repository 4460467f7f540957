use clap::{Parser, Subcommand};
use internflow::api::{AppState, app};
use internflow::auth::{Auth, NewUser};
use internflow::config::{Config, redact_db_url};
use internflow::entity::role::RoleName;
use internflow::storage::MediaStore;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "internflow", about = "InternFlow - internship supervision API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default)
    Serve,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage roles
    Roles {
        #[command(subcommand)]
        action: RolesAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create an active user account
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
        /// Student, Teacher, Administrator or Company
        #[arg(long)]
        role: Option<String>,
    },
}

#[derive(Subcommand)]
enum RolesAction {
    /// Insert any missing default role
    Seed,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init structured logging (respects RUST_LOG; defaults to info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing::info!(database = %redact_db_url(&config.database_url), "connecting to database");

    let db = Database::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;

    let auth = Arc::new(Auth::new(db.clone()));
    auth.ensure_default_roles().await?;

    tracing::info!("database initialized");

    match cli.command {
        None | Some(Commands::Serve) => serve(auth, config).await?,
        Some(Commands::User { action }) => handle_user_action(&auth, action).await?,
        Some(Commands::Roles {
            action: RolesAction::Seed,
        }) => tracing::info!("default roles present"),
    }

    Ok(())
}

async fn serve(auth: Arc<Auth>, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Seed an administrator when the store is empty
    if auth.count_users().await? == 0 {
        match &config.seed_admin {
            Some(seed) => {
                let role = auth.role_by_name(RoleName::Administrator.as_str()).await?;
                tracing::warn!(username = %seed.username, "No users found, seeding administrator.");
                auth.create_user(NewUser {
                    username: seed.username.clone(),
                    email: seed.email.clone(),
                    password: seed.password.clone(),
                    role_id: Some(role.id),
                    is_active: true,
                    is_staff: true,
                    ..Default::default()
                })
                .await?;
            }
            None => tracing::warn!(
                "No users found and IF_ADMIN_PASSWORD is not set. \
                 Create an administrator with `internflow user create --role Administrator`."
            ),
        }
    }

    tokio::fs::create_dir_all(&config.media_root).await?;

    let state = AppState {
        db: auth.db().clone(),
        auth,
        jwt_secret: config.jwt_secret,
        access_token_minutes: config.access_token_minutes,
        refresh_token_days: config.refresh_token_days,
        media: MediaStore::new(&config.media_root),
    };

    let service = app(state, &config.cors_allowed_origins);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, media = %config.media_root.display(), "API online");

    axum::serve(
        listener,
        axum::ServiceExt::<axum::extract::Request>::into_make_service(service),
    )
    .await?;

    Ok(())
}

async fn handle_user_action(
    auth: &Auth,
    action: UserAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        UserAction::Create {
            username,
            password,
            email,
            role,
        } => {
            let role = match role {
                Some(name) => Some(auth.role_by_name(&name).await?),
                None => None,
            };
            let is_admin = role
                .as_ref()
                .is_some_and(|r| r.name == RoleName::Administrator.as_str());
            let user = auth
                .create_user(NewUser {
                    username,
                    email,
                    password,
                    role_id: role.as_ref().map(|r| r.id),
                    is_active: true,
                    is_staff: is_admin,
                    ..Default::default()
                })
                .await?;
            tracing::info!(
                username = %user.username,
                role = role.as_ref().map(|r| r.name.as_str()).unwrap_or("none"),
                "Created user"
            );
        }
    }
    Ok(())
}
