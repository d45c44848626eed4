//! `tripvar` drives the generation services from a terminal.
//!
//! Connection settings come from the `LLM_*` environment variables (a `.env`
//! file is loaded first); results are printed as JSON.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tracing::debug;
use tripvar::llm::TextGenerationService;
use tripvar::prompt::PayloadStyle;
use tripvar::travel::{
    AccommodationType, BudgetLevel, TravelPlanner, TravelPlanningRequest, TravelPreferences,
    TravelStyle,
};
use tripvar::{ChatMessage, GenerationRequest, Role, Runnable, Settings, StreamEvent, UserContext};

#[derive(Parser)]
#[command(name = "tripvar")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, env = "TRIPVAR_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Caller id attached to log spans
    #[arg(long, global = true, env = "TRIPVAR_USER_ID", default_value = "cli")]
    user_id: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate text from a single prompt
    Generate {
        #[arg(long)]
        prompt: String,

        /// Use the plain completions endpoint instead of chat completions
        #[arg(long)]
        completion: bool,

        /// Print tokens as they arrive
        #[arg(long)]
        stream: bool,

        #[command(flatten)]
        sampling: Sampling,
    },

    /// Continue a conversation given as role:content messages
    Chat {
        /// e.g. `--message "system:Be brief" --message "user:Hello"`
        #[arg(long = "message", required = true, value_parser = parse_message)]
        messages: Vec<ChatMessage>,

        #[arg(long)]
        completion: bool,

        #[arg(long)]
        stream: bool,

        #[command(flatten)]
        sampling: Sampling,
    },

    /// Create a day-by-day travel plan
    Plan {
        #[arg(long)]
        destination: String,

        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: NaiveDate,

        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: NaiveDate,

        #[arg(long)]
        budget: Option<BudgetArg>,

        #[arg(long)]
        accommodation: Option<AccommodationArg>,

        #[arg(long)]
        style: Option<StyleArg>,

        #[arg(long = "interest")]
        interests: Vec<String>,

        #[arg(long, default_value_t = 1)]
        travelers: u32,

        #[arg(long)]
        special_requests: Option<String>,
    },
}

#[derive(Args)]
struct Sampling {
    #[arg(long, default_value_t = 1000)]
    max_tokens: u32,

    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Model id; defaults to DEFAULT_MODEL
    #[arg(long)]
    model: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BudgetArg {
    Budget,
    MidRange,
    Luxury,
}

impl From<BudgetArg> for BudgetLevel {
    fn from(value: BudgetArg) -> Self {
        match value {
            BudgetArg::Budget => BudgetLevel::Budget,
            BudgetArg::MidRange => BudgetLevel::MidRange,
            BudgetArg::Luxury => BudgetLevel::Luxury,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AccommodationArg {
    Hotel,
    Hostel,
    Apartment,
    Resort,
    Guesthouse,
}

impl From<AccommodationArg> for AccommodationType {
    fn from(value: AccommodationArg) -> Self {
        match value {
            AccommodationArg::Hotel => AccommodationType::Hotel,
            AccommodationArg::Hostel => AccommodationType::Hostel,
            AccommodationArg::Apartment => AccommodationType::Apartment,
            AccommodationArg::Resort => AccommodationType::Resort,
            AccommodationArg::Guesthouse => AccommodationType::Guesthouse,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StyleArg {
    Relaxed,
    Adventurous,
    Cultural,
    Luxury,
    Budget,
}

impl From<StyleArg> for TravelStyle {
    fn from(value: StyleArg) -> Self {
        match value {
            StyleArg::Relaxed => TravelStyle::Relaxed,
            StyleArg::Adventurous => TravelStyle::Adventurous,
            StyleArg::Cultural => TravelStyle::Cultural,
            StyleArg::Luxury => TravelStyle::Luxury,
            StyleArg::Budget => TravelStyle::Budget,
        }
    }
}

fn parse_message(raw: &str) -> Result<ChatMessage, String> {
    let (role, content) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected role:content, got '{raw}'"))?;
    let role = match role.trim().to_ascii_lowercase().as_str() {
        "system" => Role::System,
        "user" | "human" => Role::User,
        "assistant" | "ai" => Role::Assistant,
        other => return Err(format!("unknown role '{other}'")),
    };
    Ok(ChatMessage::new(role, content.trim()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let settings = Settings::from_env().context("invalid LLM_* configuration")?;
    debug!(?settings, "loaded settings");
    let user = UserContext::new(cli.user_id);

    match cli.command {
        Commands::Generate {
            prompt,
            completion,
            stream,
            sampling,
        } => {
            let request = sampling.apply(GenerationRequest::builder().prompt(prompt))?;
            run_generation(settings, &user, request, completion, stream).await
        }
        Commands::Chat {
            messages,
            completion,
            stream,
            sampling,
        } => {
            let request = sampling.apply(GenerationRequest::builder().messages(messages))?;
            run_generation(settings, &user, request, completion, stream).await
        }
        Commands::Plan {
            destination,
            start,
            end,
            budget,
            accommodation,
            style,
            interests,
            travelers,
            special_requests,
        } => {
            let mut preferences = TravelPreferences::new(destination, start, end);
            preferences.budget = budget.map(Into::into);
            preferences.accommodation_type = accommodation.map(Into::into);
            preferences.travel_style = style.map(Into::into);
            preferences.interests = interests;
            preferences.num_travelers = travelers;

            let mut request = TravelPlanningRequest::new(preferences);
            request.special_requests = special_requests;

            let planner = TravelPlanner::from_settings(settings)?;
            let response = planner.create_travel_plan(&user, request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

impl Sampling {
    fn apply(
        self,
        builder: tripvar::GenerationRequestBuilder,
    ) -> Result<GenerationRequest, tripvar::TripvarError> {
        let builder = builder
            .max_tokens(self.max_tokens)
            .temperature(self.temperature);
        match self.model {
            Some(model) => builder.model(model).build(),
            None => builder.build(),
        }
    }
}

async fn run_generation(
    settings: Settings,
    user: &UserContext,
    request: GenerationRequest,
    completion: bool,
    stream: bool,
) -> Result<()> {
    let style = if completion {
        PayloadStyle::Completion
    } else {
        PayloadStyle::Chat
    };
    let service = TextGenerationService::from_settings(settings)?.with_style(style);

    if !stream {
        let result = service.generate(user, request).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    user.ensure_active()?;
    let mut events = service.stream(request);
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::ContentChunk(chunk) => {
                write!(stdout, "{chunk}")?;
                stdout.flush()?;
            }
            StreamEvent::Metadata { key, value } => debug!(%key, %value, "stream metadata"),
            StreamEvent::FinalAnswer(_) => writeln!(stdout)?,
        }
    }
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_prefixed_messages() {
        let message = parse_message("user: What should I pack?").unwrap();
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content, "What should I pack?");

        let message = parse_message("System:Be brief: one line").unwrap();
        assert_eq!(message.role, Role::System);
        assert_eq!(message.content, "Be brief: one line");
    }

    #[test]
    fn rejects_unknown_roles_and_missing_separator() {
        assert!(parse_message("narrator:once upon a time").is_err());
        assert!(parse_message("hello there").is_err());
    }

    #[test]
    fn plan_arguments_parse() {
        let cli = Cli::try_parse_from([
            "tripvar",
            "plan",
            "--destination",
            "Lisbon",
            "--start",
            "2025-05-01",
            "--end",
            "2025-05-03",
            "--budget",
            "mid-range",
            "--interest",
            "food",
            "--interest",
            "museums",
        ])
        .unwrap();

        match cli.command {
            Commands::Plan {
                destination,
                budget,
                interests,
                travelers,
                ..
            } => {
                assert_eq!(destination, "Lisbon");
                assert!(matches!(budget, Some(BudgetArg::MidRange)));
                assert_eq!(interests, vec!["food", "museums"]);
                assert_eq!(travelers, 1);
            }
            _ => panic!("expected plan command"),
        }
    }
}
