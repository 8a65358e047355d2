use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use crate::commands::{self, CommandReport};

#[derive(Parser, Debug)]
#[command(
    name = "comment-harvest",
    version,
    about = "Harvest page comments into durable JSON archives"
)]
struct Cli {
    /// Print the command report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every enabled source, or only URL, and update its archive
    Harvest {
        /// Harvest this single page instead of the configured sources
        url: Option<String>,
    },
    /// Show resolved paths, config and archive sizes
    Status,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let report = match &cli.command {
        Command::Harvest { url } => commands::harvest::run(url.as_deref())?,
        Command::Status => commands::status::run()?,
    };
    print_report(&report, cli.json)?;
    if !report.ok {
        bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_is_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from(["comment-harvest", "harvest", "https://x.test/?id=1", "--json"])
            .expect("parse");
        assert!(cli.json);
        match cli.command {
            Command::Harvest { url } => assert_eq!(url.as_deref(), Some("https://x.test/?id=1")),
            Command::Status => panic!("wrong subcommand"),
        }
    }
}
