//! Users CLI
//!
//! Operator front end for the users store: schema migration, health
//! checks, and versioned create/read/update/delete of user records.
//! Every write takes the version the caller last saw.

use clap::{Args, Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::FromEnv;
use domain_users::{
    CreateUser, SqlUserRepository, UpdateUser, UserError, UserFilter, UserService,
};
use eyre::{Result, WrapErr};
use migration::Migrator;
use serde::Serialize;
use tracing::{error, info};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "users-cli")]
#[command(about = "Manage versioned user records")]
struct Cli {
    /// Recorded as created_by / updated_by on writes
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,

    /// Check database connectivity
    Health,

    #[command(flatten)]
    User(UserCommand),
}

/// Commands served by the user service
#[derive(Subcommand)]
enum UserCommand {
    /// Create a user
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone_number: Option<String>,
    },

    /// Fetch one user, including inactive ones
    Get(Lookup),

    /// List users, newest first
    List {
        /// Substring match on username
        #[arg(long)]
        username: Option<String>,
        /// Substring match on email
        #[arg(long)]
        email: Option<String>,
        /// Only active (true) or only deleted (false) users
        #[arg(long)]
        active: Option<bool>,
        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: u64,
        /// Page size; 0 uses the configured default
        #[arg(long, default_value_t = 0)]
        size: u64,
    },

    /// Change fields of a user
    Update {
        id: i64,
        /// Version the change is based on
        #[arg(long)]
        version: i32,
        #[command(flatten)]
        fields: UpdateFields,
    },

    /// Soft-delete a user
    Delete {
        id: i64,
        /// Version the delete is based on
        #[arg(long)]
        version: i32,
    },

    /// Report whether a username is taken
    CheckUsername {
        username: String,
        /// Ignore this user id
        #[arg(long)]
        exclude: Option<i64>,
    },

    /// Report whether an email is taken
    CheckEmail {
        email: String,
        /// Ignore this user id
        #[arg(long)]
        exclude: Option<i64>,
    },

    /// Verify a username and password
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Lookup {
    #[arg(long)]
    id: Option<i64>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    email: Option<String>,
}

#[derive(Args)]
struct UpdateFields {
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    full_name: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[arg(long)]
    phone_number: Option<String>,
    #[arg(long)]
    active: Option<bool>,
}

impl From<UpdateFields> for UpdateUser {
    fn from(fields: UpdateFields) -> Self {
        Self {
            username: fields.username,
            email: fields.email,
            full_name: fields.full_name,
            password: fields.password,
            phone_number: fields.phone_number,
            is_active: fields.active,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!("Connecting to database...");
    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .wrap_err("Database connection failed")?;

    let actor = cli.actor.as_deref();

    match cli.command {
        Commands::Migrate => {
            database::postgres::run_migrations::<Migrator>(&db, "users-cli").await?;
        }

        Commands::Health => {
            let status = database::postgres::check_health_detailed(&db).await;
            print_json(&serde_json::json!({
                "healthy": status.healthy,
                "message": status.message,
                "response_time_ms": status.response_time_ms,
            }))?;
            if !status.healthy {
                eyre::bail!("Database is unhealthy");
            }
        }

        Commands::User(command) => {
            let service = UserService::with_config(SqlUserRepository::new(db), config.users);
            run(&service, command, actor).await?;
        }
    }

    Ok(())
}

async fn run(
    service: &UserService<SqlUserRepository>,
    command: UserCommand,
    actor: Option<&str>,
) -> Result<()> {
    match command {
        UserCommand::Create {
            username,
            email,
            full_name,
            password,
            phone_number,
        } => {
            let input = CreateUser {
                username,
                email,
                full_name,
                password,
                phone_number,
            };
            print_json(&service.create_user(input, actor).await.map_err(report)?)
        }

        UserCommand::Get(lookup) => {
            let user = match (lookup.id, lookup.username, lookup.email) {
                (Some(id), _, _) => service.get_user(id).await,
                (_, Some(username), _) => service.get_user_by_username(&username).await,
                (_, _, Some(email)) => service.get_user_by_email(&email).await,
                (None, None, None) => eyre::bail!("one of --id, --username or --email is required"),
            };
            print_json(&user.map_err(report)?)
        }

        UserCommand::List {
            username,
            email,
            active,
            page,
            size,
        } => {
            let filter = UserFilter {
                username,
                email,
                is_active: active,
                page,
                size,
            };
            print_json(&service.list_users(filter).await.map_err(report)?)
        }

        UserCommand::Update {
            id,
            version,
            fields,
        } => {
            let user = service
                .update_user(id, version, fields.into(), actor)
                .await
                .map_err(report)?;
            print_json(&user)
        }

        UserCommand::Delete { id, version } => {
            service
                .delete_user(id, version, actor)
                .await
                .map_err(report)?;
            info!(user_id = id, "Deleted user");
            Ok(())
        }

        UserCommand::CheckUsername { username, exclude } => {
            let taken = service
                .username_exists(&username, exclude)
                .await
                .map_err(report)?;
            print_json(&serde_json::json!({ "username": username, "taken": taken }))
        }

        UserCommand::CheckEmail { email, exclude } => {
            let taken = service
                .email_exists(&email, exclude)
                .await
                .map_err(report)?;
            print_json(&serde_json::json!({ "email": email, "taken": taken }))
        }

        UserCommand::Login { username, password } => {
            let user = service
                .authenticate(&username, &password)
                .await
                .map_err(report)?;
            print_json(&user)
        }
    }
}

/// Prefix the stable error code so scripts can match on it
fn report(err: UserError) -> eyre::Report {
    let code = err.code();
    if !err.is_client_error() {
        error!(code, error = %err, "User operation failed");
    }
    eyre::Report::new(err).wrap_err(code)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
