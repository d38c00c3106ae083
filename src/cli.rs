use clap::{Parser, Subcommand};

pub const DEFAULT_INTERVAL_MIN: u64 = 30;
pub const DEFAULT_COUNTDOWN_SECS: u64 = 30;

/// Control an AOKE standing desk via BLE
#[derive(Debug, Parser)]
#[command(name = "desk", version)]
pub struct Cli {
    /// BLE address of the desk (defaults to the configured one)
    #[arg(short, long, global = true)]
    pub address: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Interactive setup: scan and save config
    Setup,
    /// Scan for desks
    Scan,
    /// Read current height
    Height,
    /// Move to the sit preset
    Sit,
    /// Move to the stand preset
    Stand,
    /// Move to a specific height in cm (65.0-130.0)
    Move {
        #[arg(allow_negative_numbers = true)]
        cm: f32,
    },
    /// Sit/stand cycle with notifications
    Auto {
        /// Interval in minutes
        #[arg(long, default_value_t = DEFAULT_INTERVAL_MIN)]
        interval: u64,

        /// Notification countdown in seconds
        #[arg(long, default_value_t = DEFAULT_COUNTDOWN_SECS)]
        countdown: u64,
    },
}

impl Command {
    /// Whether the command talks to a configured desk
    pub fn needs_desk(&self) -> bool {
        !matches!(self, Self::Setup | Self::Scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse_str(line: &str) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("desk").chain(line.split_whitespace()))
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_arguments_has_no_command() {
        assert_eq!(parse_str("").unwrap().command, None);
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_str("sit").unwrap().command, Some(Command::Sit));
        assert_eq!(parse_str("stand").unwrap().command, Some(Command::Stand));
        assert_eq!(parse_str("height").unwrap().command, Some(Command::Height));
        assert_eq!(parse_str("scan").unwrap().command, Some(Command::Scan));
        assert_eq!(parse_str("setup").unwrap().command, Some(Command::Setup));
    }

    #[test]
    fn test_move_height() {
        assert_eq!(
            parse_str("move 95.5").unwrap().command,
            Some(Command::Move { cm: 95.5 })
        );
        assert_eq!(
            parse_str("move -5").unwrap().command,
            Some(Command::Move { cm: -5.0 })
        );
        assert!(parse_str("move").is_err());
        assert!(parse_str("move tall").is_err());
    }

    #[test]
    fn test_address_override() {
        let cli = parse_str("-a D4:E1:5C:38:00:01 stand").unwrap();
        assert_eq!(cli.address.as_deref(), Some("D4:E1:5C:38:00:01"));
        assert_eq!(cli.command, Some(Command::Stand));

        let cli = parse_str("height --address=AA:BB").unwrap();
        assert_eq!(cli.address.as_deref(), Some("AA:BB"));

        assert!(parse_str("sit --address").is_err());
    }

    #[test]
    fn test_auto_defaults_and_overrides() {
        assert_eq!(
            parse_str("auto").unwrap().command,
            Some(Command::Auto {
                interval: 30,
                countdown: 30
            })
        );
        assert_eq!(
            parse_str("auto --interval 45 --countdown=10").unwrap().command,
            Some(Command::Auto {
                interval: 45,
                countdown: 10
            })
        );
        assert!(parse_str("auto --interval soon").is_err());
        assert!(parse_str("sit --interval 5").is_err());
    }

    #[test]
    fn test_rejects_unknown_input() {
        assert!(parse_str("dance").is_err());
        assert!(parse_str("sit --fast").is_err());
        assert!(parse_str("sit now").is_err());
    }

    #[test]
    fn test_needs_desk() {
        assert!(Command::Sit.needs_desk());
        assert!(Command::Move { cm: 80.0 }.needs_desk());
        assert!(Command::Auto {
            interval: 1,
            countdown: 1
        }
        .needs_desk());
        assert!(!Command::Scan.needs_desk());
        assert!(!Command::Setup.needs_desk());
    }
}
