use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("expenseai")
        .about("Personal finance auth core and Google OAuth relay")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("5000")
                .env("EXPENSEAI_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("backend-url")
                .short('b')
                .long("backend-url")
                .help("Base URL of the hosted auth/database service, example: https://project.hosted.dev")
                .env("EXPENSEAI_BACKEND_URL")
                .required(true),
        )
        .arg(
            Arg::new("service-key")
                .long("service-key")
                .help("Service-role API key for the hosted row API")
                .env("EXPENSEAI_SERVICE_KEY")
                .required(true),
        )
        .arg(
            Arg::new("google-client-id")
                .long("google-client-id")
                .help("Google OAuth client id the relay verifies credentials against")
                .env("EXPENSEAI_GOOGLE_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new("google-client-secret")
                .long("google-client-secret")
                .help("Google OAuth client secret used for the code exchange")
                .env("EXPENSEAI_GOOGLE_CLIENT_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("session-secret")
                .long("session-secret")
                .help("Secret signing relay session tokens")
                .env("EXPENSEAI_SESSION_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("session-ttl-days")
                .long("session-ttl-days")
                .help("Session token lifetime in days")
                .default_value("7")
                .env("EXPENSEAI_SESSION_TTL_DAYS")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("allowed-origin")
                .long("allowed-origin")
                .help("CORS origin allowed to call the relay; repeat for more than one")
                .env("EXPENSEAI_ALLOWED_ORIGINS")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("EXPENSEAI_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
