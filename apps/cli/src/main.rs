//! Leaguer CLI - sign in, manage the account and follow live updates.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use leaguer_config_and_utils::{init_logging_for_service, Config, Paths};
use session_lifecycle_orchestrator::{ClientPlatform, ProfileUpdate, SocialProvider};

/// Leaguer CLI - account and live channel access from the terminal.
#[derive(Parser)]
#[command(name = "leaguer")]
#[command(about = "Leaguer CLI for authentication, profile and live updates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email or username and password
    Login {
        /// Email or username; prompted when omitted
        #[arg(short, long)]
        user: Option<String>,
        /// Keep the session after this command exits
        #[arg(short, long)]
        remember: bool,
    },

    /// Login with a third-party identity token
    SocialLogin {
        #[arg(short, long)]
        provider: SocialProvider,
        #[arg(short, long)]
        email: String,
        /// Identity token issued by the provider
        #[arg(long, env = "LEAGUER_ID_TOKEN", hide_env_values = true)]
        id_token: String,
        #[arg(long, value_enum, default_value = "web")]
        platform: PlatformArg,
    },

    /// Logout and clear session
    Logout,

    /// Check authentication status
    Status,

    /// Show the signed-in user
    Whoami,

    /// Update profile fields
    UpdateProfile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Birthday as YYYY-MM-DD
        #[arg(long)]
        birthday: Option<String>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },

    /// Change the account password
    ChangePassword,

    /// Send a password reset link
    ResetPassword {
        /// Email or username
        identifier: String,
    },

    /// Resend the email verification link
    VerifyEmail {
        /// User ID; defaults to the signed-in user
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Print live channel messages until interrupted
    Listen {
        /// Only show these message types (repeatable)
        #[arg(short = 't', long = "type")]
        types: Vec<String>,
    },

    /// Send one live channel message
    Send {
        /// Message type
        message_type: String,
        /// JSON object merged into the message
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Check backend health
    Health,

    /// Show backend information
    Info,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Web,
    Android,
    Ios,
}

impl From<PlatformArg> for ClientPlatform {
    fn from(platform: PlatformArg) -> Self {
        match platform {
            PlatformArg::Web => ClientPlatform::Web,
            PlatformArg::Android => ClientPlatform::Android,
            PlatformArg::Ios => ClientPlatform::Ios,
        }
    }
}

async fn run(cli: Cli, config: Config, paths: Paths) -> anyhow::Result<()> {
    let format = &cli.format;
    let client = commands::open_client(&config, &paths)?;

    match cli.command {
        Commands::Login { user, remember } => {
            commands::login(&client, user, remember, format).await
        }
        Commands::SocialLogin {
            provider,
            email,
            id_token,
            platform,
        } => {
            commands::social_login(&client, provider, email, id_token, platform.into(), format)
                .await
        }
        Commands::Logout => commands::logout(&client, format).await,
        Commands::Status => commands::status(&client, format).await,
        Commands::Whoami => commands::whoami(&client, format).await,
        Commands::UpdateProfile {
            first_name,
            last_name,
            username,
            email,
            birthday,
            gender,
            phone,
            language,
        } => {
            let update = ProfileUpdate {
                first_name,
                last_name,
                username,
                email,
                user_birthday: birthday,
                user_gender: gender,
                user_phone_number: phone,
                current_language: language,
                ..Default::default()
            };
            commands::update_profile(&client, update, format).await
        }
        Commands::ChangePassword => commands::change_password(&client, format).await,
        Commands::ResetPassword { identifier } => {
            commands::reset_password(&client, &identifier, format).await
        }
        Commands::VerifyEmail { user_id } => {
            commands::verify_email(&client, user_id.as_deref(), format).await
        }
        Commands::Listen { types } => commands::listen(&client, &types, format).await,
        Commands::Send { message_type, data } => {
            commands::send(&client, &message_type, data.as_deref(), format).await
        }
        Commands::Health => commands::health(&client, format).await,
        Commands::Info => commands::info(&client, format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    let result = match Paths::new() {
        Ok(paths) => match Config::load(&paths) {
            Ok(config) => {
                let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
                init_logging_for_service("cli", &level);
                run(cli, config, paths).await
            }
            Err(e) => Err(anyhow::anyhow!("Failed to load configuration: {}", e)),
        },
        Err(e) => Err(anyhow::anyhow!("Failed to resolve the Leaguer directory: {}", e)),
    };

    if let Err(e) = result {
        output::print_error(&e.to_string(), &format);
        std::process::exit(1);
    }
}
