use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use dialoguer::Password;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ApiError;
use crate::domain::models::AuthSession;
use crate::domain::models::ChatApi;
use crate::domain::models::UserRecord;
use crate::domain::services::SessionStore;
use crate::infrastructure::api::petbuddy::PetBuddy;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

fn format_conversation(user: &UserRecord) -> String {
    let mut res = format!("- (ID: {}) {}", user.id, user.username);

    if !user.email.is_empty() {
        res = format!("{res}, {}", user.email);
    }

    return res;
}

async fn print_conversations_list(api: &PetBuddy) -> Result<(), ApiError> {
    let conversations = api.conversations().await?;

    if conversations.is_empty() {
        println!("No conversations yet. Message someone on PetBuddy to get started!");
        return Ok(());
    }

    let lines = conversations
        .iter()
        .map(|user| {
            return format_conversation(user);
        })
        .collect::<Vec<String>>();

    println!("{}", lines.join("\n"));
    return Ok(());
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if !config_file_path.parent().unwrap().exists() {
        fs::create_dir_all(config_file_path.parent().unwrap()).await?;
    }

    let mut file = fs::File::create(config_file_path.clone()).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    let config_path_display = config_file_path.as_os_str().to_str().unwrap();
    println!("Created default config file at {config_path_display}");
    return Ok(());
}

async fn login() -> Result<()> {
    let username = Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt("PetBuddy username")
        .interact_text()?;
    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Password")
        .interact()?;

    let server_url = Config::get(ConfigKey::ServerURL);
    let session = match PetBuddy::login(&server_url, &username, &password).await {
        Ok(session) => session,
        Err(ApiError::AuthExpired) => bail!("Invalid username or password."),
        Err(err) => return Err(err.into()),
    };

    SessionStore::default().save(&session).await?;
    println!(
        "Signed in as {username} (user id {user_id}).",
        user_id = session.user_id
    );

    return Ok(());
}

async fn resolve_counterpart(api: &PetBuddy, counterpart_id: i64) -> Result<(), ApiError> {
    let user = api.user(counterpart_id).await?;
    Config::set(ConfigKey::CounterpartUsername, &user.username);

    let display_name = api
        .display_name(user.id)
        .await?
        .unwrap_or_else(|| return user.username.to_string());
    Config::set(ConfigKey::CounterpartName, &display_name);

    return Ok(());
}

/// Loads the stored session and resolves the counterpart before the
/// conversation view starts, so the view never opens on a dead backend or an
/// unknown user id.
async fn authenticate() -> Result<AuthSession> {
    let session = SessionStore::default().load().await?;
    let api = PetBuddy::with_session(&session);

    api.health_check().await?;

    let counterpart = Config::get(ConfigKey::Counterpart);
    let counterpart_id = counterpart.parse::<i64>();
    if counterpart_id.is_err() {
        bail!("--counterpart must be the numeric id of the user to chat with. Find ids with 'kibble conversations'.");
    }

    match resolve_counterpart(&api, counterpart_id.unwrap()).await {
        Ok(()) => {}
        Err(ApiError::AuthExpired) => {
            SessionStore::default().delete().await?;
            bail!("Your session has expired. Sign in again with 'kibble login'.");
        }
        Err(err) => return Err(err.into()),
    }

    return Ok(session);
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_debug() -> Command {
    return Command::new("debug")
        .about("Debug helpers for Kibble")
        .hide(true)
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running Kibble with environment variable RUST_LOG=kibble")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );
}

fn arg_counterpart() -> Arg {
    return Arg::new(ConfigKey::Counterpart.to_string())
        .long(ConfigKey::Counterpart.to_string())
        .env("KIBBLE_COUNTERPART")
        .num_args(1)
        .help("The numeric user id of the pet owner or caretaker to chat with.");
}

fn subcommand_chat() -> Command {
    return Command::new("chat")
        .about("Open the live conversation view with a counterpart.")
        .arg(arg_counterpart());
}

pub fn build() -> Command {
    let commands_text = format!(
        "{}\n{}\n\n{}\n{}",
        Paint::new("CHAT COMMANDS:").underline().bold(),
        [
            "  /retry (/rt) - Resend any failed messages.",
            "  /help (/h) - Show the command reference in the status line.",
            "  /quit (/q) - Leave the conversation view.",
        ]
        .join("\n"),
        Paint::new("CHAT HOTKEYS:").underline().bold(),
        [
            "  Up/Down - Scroll the timeline.",
            "  Ctrl-U/Ctrl-D - Page up and down.",
            "  Ctrl-R - Resend any failed messages.",
            "  Ctrl-C - Quit.",
        ]
        .join("\n"),
    );

    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("kibble")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_chat())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(
            Command::new("conversations")
                .about("List the users you have existing conversations with, and their ids."),
        )
        .subcommand(subcommand_debug())
        .subcommand(Command::new("login").about("Sign in to PetBuddy and store the session token."))
        .subcommand(Command::new("logout").about("Delete the stored session token."))
        .subcommand(Command::new("manpages").about("Generates manpages and outputs to stdout."))
        .arg(arg_counterpart())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("KIBBLE_CONFIG_FILE")
                .num_args(1)
                .help(format!(
                    "Path to configuration file [default: {}]",
                    Config::default(ConfigKey::ConfigFile)
                ))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::ServerURL.to_string())
                .long(ConfigKey::ServerURL.to_string())
                .env("KIBBLE_SERVER_URL")
                .num_args(1)
                .help(format!(
                    "PetBuddy server base URL for both the REST API and the live stream. [default: {}]",
                    Config::default(ConfigKey::ServerURL)
                ))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::ReconnectDelay.to_string())
                .long(ConfigKey::ReconnectDelay.to_string())
                .env("KIBBLE_RECONNECT_DELAY")
                .num_args(1)
                .help(format!(
                    "Base delay in milliseconds between reconnect attempts to the live stream, doubled each attempt. [default: {}]",
                    Config::default(ConfigKey::ReconnectDelay)
                ))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::ReconnectMaxAttempts.to_string())
                .long(ConfigKey::ReconnectMaxAttempts.to_string())
                .env("KIBBLE_RECONNECT_MAX_ATTEMPTS")
                .num_args(1)
                .help(format!(
                    "How many reconnect attempts to make before the live stream gives up. [default: {}]",
                    Config::default(ConfigKey::ReconnectMaxAttempts)
                ))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::RequestTimeout.to_string())
                .long(ConfigKey::RequestTimeout.to_string())
                .env("KIBBLE_REQUEST_TIMEOUT")
                .num_args(1)
                .help(format!(
                    "Time to wait in milliseconds before timing out an API request. [default: {}]",
                    Config::default(ConfigKey::RequestTimeout)
                ))
                .global(true),
        );
}

pub async fn parse() -> Result<Option<AuthSession>> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => {
            match debug_matches.subcommand() {
                Some(("log-path", _)) => {
                    let log_path = dirs::cache_dir().unwrap().join("kibble/debug.log");
                    println!("{}", log_path.to_str().unwrap());
                }
                Some(("enum-config", _)) => {
                    let res = ConfigKey::VARIANTS.join("\n");
                    println!("{}", res);
                }
                _ => {
                    subcommand_debug().print_long_help()?;
                }
            }

            return Ok(None);
        }
        Some(("chat", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            return Ok(Some(authenticate().await?));
        }
        Some(("login", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            login().await?;
            return Ok(None);
        }
        Some(("logout", _)) => {
            SessionStore::default().delete().await?;
            println!("Signed out.");
            return Ok(None);
        }
        Some(("conversations", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            let session = SessionStore::default().load().await?;
            let api = PetBuddy::with_session(&session);

            match print_conversations_list(&api).await {
                Ok(()) => {}
                Err(ApiError::AuthExpired) => {
                    SessionStore::default().delete().await?;
                    bail!("Your session has expired. Sign in again with 'kibble login'.");
                }
                Err(err) => return Err(err.into()),
            }

            return Ok(None);
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }

            return Ok(None);
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(None);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(None);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(None);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(None);
            }
        },
        Some(("manpages", _)) => {
            clap_mangen::Man::new(build()).render(&mut io::stdout())?;
            return Ok(None);
        }
        _ => {
            Config::load(vec![&matches]).await?;
            return Ok(Some(authenticate().await?));
        }
    }
}
