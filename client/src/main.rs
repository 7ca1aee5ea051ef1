//! StratMarket - command-line client
//!
//! A thin view over the client core: every command builds the application
//! context, restores the persisted session and performs one action.

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use shared::TradingMode;

use stratmarket::app::{App, AppEvent, RegisterForm};
use stratmarket::config::ClientConfig;
use stratmarket::core::error::AppError;
use stratmarket::debug::{self, DebugConfig};
use stratmarket::services::api::get_account_profile;
use stratmarket::SessionState;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about = "StratMarket client", long_about = None)]
struct Args {
    /// Mirror logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show session, trading mode, subscription and configuration
    Status,
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "STRATMARKET_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "STRATMARKET_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        country: Option<String>,
    },
    /// Confirm an account with the token from the verification email
    Verify {
        #[arg(long)]
        token_hash: String,
    },
    /// Sign out
    Logout,
    /// Fetch and show the subscription status
    Subscription,
    /// Fetch and show the account profile
    Profile,
    /// Show or change the trading mode
    Mode {
        #[arg(value_enum)]
        mode: Option<ModeArg>,
    },
    /// Show or record the cookie-consent choice
    Consent {
        #[arg(value_enum)]
        choice: Option<ConsentArg>,
    },
    /// Request a reset email, or set a new password with the code from it
    ResetPassword {
        #[arg(long, required_unless_present = "code")]
        email: Option<String>,
        #[arg(long, requires = "new_password")]
        code: Option<String>,
        #[arg(long, env = "STRATMARKET_NEW_PASSWORD", hide_env_values = true)]
        new_password: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Crypto,
    Stocks,
}

impl From<ModeArg> for TradingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Crypto => TradingMode::Crypto,
            ModeArg::Stocks => TradingMode::Stocks,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ConsentArg {
    Accept,
    Reject,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = ClientConfig::from_env();
    let mut debug_config = DebugConfig::from_env();
    debug_config.log_to_stderr |= args.verbose;
    let _log_guard = debug::init_logger(&debug_config);

    let app = App::from_config(config);
    for issue in app.configuration_issues() {
        eprintln!("Configuration error: {}", issue);
    }

    match run(&app, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(app: &App, command: Command) -> Result<(), AppError> {
    let state = app.start().await;

    match command {
        Command::Status => {
            print_session(&state);
            println!("Trading mode: {}", app.trading_mode.read());
            let snapshot = app.subscription.refresh().await;
            println!("Plan: {} ({} backtests remaining)", snapshot.plan, snapshot.backtests_remaining);
            match app.consent.read() {
                Some(consent) => println!("Cookies: analytics={} marketing={}", consent.analytics, consent.marketing),
                None => println!("Cookies: not decided"),
            }
        }
        Command::Login { email, password } => {
            if !app.handle_login_click(email, password) {
                return Err(form_error(app));
            }
            let event = next_result(app, |e| matches!(e, AppEvent::LoginResult(_))).await;
            if let Some(AppEvent::LoginResult(result)) = event {
                let session = result?;
                println!("Signed in as {}", session.display_name());
            }
        }
        Command::Register {
            email,
            password,
            name,
            phone,
            country,
        } => {
            let form = RegisterForm {
                email,
                confirm_password: password.clone(),
                password,
                name,
                phone,
                country,
            };
            if !app.handle_register_click(form) {
                return Err(form_error(app));
            }
            let event = next_result(app, |e| matches!(e, AppEvent::RegisterResult(_))).await;
            if let Some(AppEvent::RegisterResult(result)) = event {
                match result? {
                    stratmarket::session::Registration::SignedIn(session) => {
                        println!("Account created, signed in as {}", session.display_name())
                    }
                    stratmarket::session::Registration::VerificationPending { email } => {
                        println!("Check {} for a confirmation link", email)
                    }
                }
            }
        }
        Command::Verify { token_hash } => {
            app.handle_verification_link(token_hash);
            let event = next_result(app, |e| matches!(e, AppEvent::VerificationResult(_))).await;
            if let Some(AppEvent::VerificationResult(result)) = event {
                println!("Email confirmed, signed in as {}", result?.display_name());
            }
        }
        Command::Logout => {
            app.session.logout().await;
            println!("Signed out");
        }
        Command::Subscription => {
            if !state.is_authenticated() {
                println!("Not signed in; free tier applies");
            }
            let snapshot = app.subscription.refresh().await;
            match serde_json::to_string_pretty(&*snapshot) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{:?}", snapshot),
            }
        }
        Command::Profile => {
            let profile = get_account_profile(&app.api).await?;
            match serde_json::to_string_pretty(&profile) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{:?}", profile),
            }
        }
        Command::Mode { mode: None } => println!("{}", app.trading_mode.read()),
        Command::Mode { mode: Some(mode) } => {
            let mode = app.set_trading_mode(mode.into()).await?;
            println!("Trading mode set to {}", mode);
        }
        Command::Consent { choice: None } => match app.consent.read() {
            Some(consent) => println!(
                "analytics={} marketing={} decided_at={}",
                consent.analytics, consent.marketing, consent.decided_at
            ),
            None => println!("Not decided"),
        },
        Command::Consent { choice: Some(choice) } => {
            let consent = match choice {
                ConsentArg::Accept => app.consent.accept_all()?,
                ConsentArg::Reject => app.consent.reject_optional()?,
            };
            println!("Recorded: analytics={} marketing={}", consent.analytics, consent.marketing);
        }
        Command::ResetPassword {
            code: Some(code),
            new_password: Some(new_password),
            ..
        } => {
            if !app.handle_reset_complete(code, new_password.clone(), new_password) {
                return Err(form_error(app));
            }
            let event = next_result(app, |e| matches!(e, AppEvent::PasswordResetResult(_))).await;
            if let Some(AppEvent::PasswordResetResult(result)) = event {
                println!("Password updated, signed in as {}", result?.display_name());
            }
        }
        Command::ResetPassword { email, .. } => {
            if !app.handle_reset_request(email.unwrap_or_default(), None) {
                return Err(form_error(app));
            }
            let event = next_result(app, |e| matches!(e, AppEvent::PasswordResetRequested(_))).await;
            if let Some(AppEvent::PasswordResetRequested(result)) = event {
                result?;
                println!("If the address has an account, a reset link is on its way");
            }
        }
    }

    Ok(())
}

fn print_session(state: &SessionState) {
    match state {
        SessionState::Authenticated { session, .. } => {
            println!("Signed in as {} <{}>", session.display_name(), session.email)
        }
        SessionState::PendingVerification { email } => println!("Waiting for confirmation of {}", email),
        SessionState::Unauthenticated | SessionState::Initializing => println!("Not signed in"),
    }
}

/// Wait for the first event matching `wanted`, folding everything into the view.
async fn next_result(app: &App, wanted: impl Fn(&AppEvent) -> bool) -> Option<AppEvent> {
    while let Some(event) = app.next_event().await {
        if wanted(&event) {
            return Some(event);
        }
    }
    None
}

fn form_error(app: &App) -> AppError {
    let message = app
        .view
        .read()
        .auth
        .error()
        .unwrap_or("Invalid input")
        .to_string();
    AppError::Validation(message)
}
