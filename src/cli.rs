use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rejabot")]
#[command(author, version, about = "Telegram channel bot for lesson plans: brand, publish, catalog", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// Print catalog and scheduler statistics
    Stats,

    /// Grant admin rights to a Telegram user id
    AddAdmin {
        /// Telegram user id
        user_id: i64,
    },

    /// Brand a local file without publishing it (dry run)
    Process {
        /// File or .zip archive to process
        file: PathBuf,

        /// Directory for the branded copies
        #[arg(short, long, default_value = "branded")]
        output: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_no_command() {
        let cli = Cli::try_parse_from(["rejabot"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_subcommands() {
        let cli = Cli::try_parse_from(["rejabot", "add-admin", "42"]).unwrap();
        assert_eq!(cli.command, Some(Commands::AddAdmin { user_id: 42 }));

        let cli = Cli::try_parse_from(["rejabot", "process", "reja.xlsx", "-o", "out"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Process {
                file: PathBuf::from("reja.xlsx"),
                output: PathBuf::from("out"),
            })
        );
    }
}
