use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use shared::{BulkSendRequest, SendMessageRequest};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod output;

use api::ApiClient;

#[derive(Parser)]
#[command(name = "wedding-admin")]
#[command(about = "Admin client for the wedding RSVP server")]
#[command(version)]
struct Cli {
    /// Server URL (overrides config)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Session token (overrides config)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "WEDDING_ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// End the session on the server and forget the token
    Logout,
    /// Show the logged-in admin
    Whoami,
    /// Inspect guests
    Guests {
        #[command(subcommand)]
        action: GuestAction,
    },
    /// Send one WhatsApp message
    Send {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        message: String,
        /// Personalize the message for this guest
        #[arg(long)]
        guest: Option<String>,
    },
    /// Send a message or template to several guests
    Bulk {
        #[arg(long, conflicts_with = "template", required_unless_present = "template")]
        message: Option<String>,
        /// Template name or id
        #[arg(long)]
        template: Option<String>,
        #[arg(long = "guest", required = true)]
        guests: Vec<String>,
    },
    /// Show message history
    Messages {
        #[arg(long)]
        guest: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum GuestAction {
    /// List guests, newest first
    List {
        /// attending, tentative, declined or pending
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one guest
    Show { id: String },
    /// Headcount summary
    Summary,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (server, token)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
    /// Get the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wedding_admin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = config::Config::load().unwrap_or_default();
    let server = config.server_url(cli.server);
    let token = cli.token.or_else(|| config.token.clone());
    let client = || logged_in_client(&server, token.clone());

    match cli.command {
        Commands::Guests { action } => {
            let client = client()?;
            match action {
                GuestAction::List { status } => {
                    let guests = client.list_guests(status.as_deref()).await?;
                    for guest in &guests {
                        println!("{}", output::guest_line(guest));
                    }
                    println!("{} guest(s)", guests.len());
                }
                GuestAction::Show { id } => {
                    println!("{}", output::guest_detail(&client.get_guest(&id).await?))
                }
                GuestAction::Summary => println!("{}", output::summary(&client.summary().await?)),
            }
        }
        Commands::Send { phone, message, guest } => {
            let request = SendMessageRequest {
                phone,
                message: Some(message),
                guest_id: guest,
                template_id: None,
            };
            let log = client()?.send(&request).await?;
            println!("{}", output::message_line(&log));
        }
        Commands::Bulk { message, template, guests } => {
            let client = client()?;
            let template_id = match template {
                Some(wanted) => Some(find_template(&client, &wanted).await?),
                None => None,
            };
            let request = BulkSendRequest {
                guest_ids: guests,
                message,
                template_id,
            };
            let response = client.bulk(&request).await?;
            println!("{}", output::bulk_report(&response));
        }
        Commands::Messages { guest } => {
            for log in client()?.history(guest.as_deref()).await? {
                println!("{}", output::message_line(&log));
            }
        }
        Commands::Login { email, password } => {
            auth::login(&mut config, &server, &email, password).await?
        }
        Commands::Logout => auth::logout(&mut config, &server).await?,
        Commands::Whoami => auth::whoami(&config, &server).await?,
        Commands::Config { action } => handle_config_command(action)?,
    }

    Ok(())
}

fn logged_in_client(server: &str, token: Option<String>) -> Result<ApiClient> {
    let token = token
        .ok_or_else(|| anyhow!("Not logged in. Run 'wedding-admin login --email <email>' first."))?;
    Ok(ApiClient::new(server, Some(token)))
}

/// Matches a template by id, or by name ignoring case
async fn find_template(client: &ApiClient, wanted: &str) -> Result<String> {
    client
        .templates()
        .await?
        .into_iter()
        .find(|t| t.id == wanted || t.name.eq_ignore_ascii_case(wanted))
        .map(|t| t.id)
        .ok_or_else(|| anyhow!("No template named '{}'", wanted))
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let mut config = config::Config::load().unwrap_or_default();
            config.set(&key, value)?;
            config.save()?;
            println!("Configuration saved");
        }
        ConfigAction::Get { key } => {
            let config = config::Config::load()?;
            println!("{}", config.get(&key)?);
        }
        ConfigAction::Show => {
            let config = config::Config::load()?;
            println!("server: {}", config.get("server")?);
            println!("token: {}", config.get("token")?);
        }
        ConfigAction::Path => {
            let path = config::Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_requires_message_or_template() {
        assert!(Cli::try_parse_from(["wedding-admin", "bulk", "--guest", "g1"]).is_err());
        assert!(Cli::try_parse_from(["wedding-admin", "bulk", "--message", "hi"]).is_err());

        let cli = Cli::try_parse_from([
            "wedding-admin", "bulk", "--template", "Reminder", "--guest", "g1", "--guest", "g2",
        ])
        .unwrap();
        match cli.command {
            Commands::Bulk { guests, template, message } => {
                assert_eq!(guests, vec!["g1", "g2"]);
                assert_eq!(template.as_deref(), Some("Reminder"));
                assert!(message.is_none());
            }
            _ => panic!("expected bulk"),
        }
    }

    #[test]
    fn test_server_flag_is_global() {
        let cli = Cli::try_parse_from(["wedding-admin", "guests", "summary", "--server", "http://x:1"]).unwrap();
        assert_eq!(cli.server.as_deref(), Some("http://x:1"));
        assert!(matches!(cli.command, Commands::Guests { action: GuestAction::Summary }));
    }
}
