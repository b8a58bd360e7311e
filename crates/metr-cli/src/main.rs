use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod configuration;
mod error;
mod logging;
mod prompt;
mod session;

use configuration::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend base URL (can also be set via METR_BACKEND__URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Search domain for new conversations (can also be set via METR_BACKEND__DOMAIN)
    #[arg(long, global = true)]
    domain: Option<String>,

    /// Do not send any location with queries
    #[arg(long, global = true)]
    no_location: bool,

    /// Fixed latitude to use instead of looking the location up
    #[arg(long, global = true, requires = "longitude", allow_negative_numbers = true)]
    latitude: Option<f64>,

    /// Fixed longitude to use instead of looking the location up
    #[arg(long, global = true, requires = "latitude", allow_negative_numbers = true)]
    longitude: Option<f64>,

    /// File remembering the active conversation
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Start or resume an interactive chat")]
    Session,

    #[command(about = "Ask one question without the interactive prompt")]
    Run {
        /// The question to ask
        #[arg(short, long, value_name = "TEXT")]
        text: String,
    },

    /// Print the messages of the stored conversation
    History,

    /// Forget the stored conversation
    Reset,

    /// Print the location that would be sent with queries
    Locate,
}

impl Cli {
    /// Flags win over file and environment configuration
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(url) = &self.backend_url {
            settings.backend.url = url.clone();
        }
        if let Some(domain) = &self.domain {
            settings.backend.domain = domain.clone();
        }
        if self.no_location {
            settings.location.enabled = false;
        }
        if let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) {
            settings.location.latitude = Some(latitude);
            settings.location.longitude = Some(longitude);
        }
        if let Some(state_file) = &self.state_file {
            settings.state_file = Some(state_file.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::setup_logging();

    let cli = Cli::parse();
    let mut settings = Settings::new()?;
    cli.apply_to(&mut settings);

    match cli.command {
        None | Some(Command::Session) => commands::session::execute(&settings).await,
        Some(Command::Run { text }) => commands::run::execute(&settings, &text).await,
        Some(Command::History) => commands::history::execute(&settings).await,
        Some(Command::Reset) => commands::reset::execute(&settings.conversation_store()?),
        Some(Command::Locate) => commands::locate::execute(&settings.location).await,
    }
}
