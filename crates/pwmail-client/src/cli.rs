//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use crate::client::MailClient;
use crate::error::ClientError;
use crate::model::{account_from_credential, read_json_file, InboxQuery, MailDraft};
use crate::output::{OutputFormat, OutputFormatter};
use crate::ExitCode;

/// pwmail - passwordless mail client
#[derive(Parser, Debug)]
#[command(name = "pwmail")]
#[command(version, about = "pwmail - passwordless mail client")]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Mail server base URL
    #[arg(long, env = "PWMAIL_SERVER", default_value = "http://localhost:8080", global = true)]
    pub server: String,

    /// Private scalar as 64 hex characters
    #[arg(long, env = "PWMAIL_USER", hide_env_values = true, global = true)]
    pub user: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the address derived from --user
    Address,

    /// List one page of the inbox
    Inbox {
        /// JSON file with `page` and `limit`
        query: PathBuf,
    },

    /// Read one mail by id
    Read {
        /// Mail id
        email_id: Uuid,
    },

    /// Send a mail
    Send {
        /// JSON file with `to`, `subject` and `body`
        mail: PathBuf,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Address => "address",
            Commands::Inbox { .. } => "inbox",
            Commands::Read { .. } => "read",
            Commands::Send { .. } => "send",
        }
    }
}

impl Cli {
    /// Execute the CLI command, printing its result or error
    pub async fn execute(self) -> ExitCode {
        let formatter = OutputFormatter::new(self.output);
        let command = self.command.name();

        match self.run(&formatter).await {
            Ok(output) => {
                println!("{output}");
                ExitCode::Success
            }
            Err(e) => {
                let code = e.exit_code();
                eprintln!("{}", formatter.format_error(command, code, &e.to_string()));
                code
            }
        }
    }

    /// Execute the command and return its formatted output
    pub async fn run(self, formatter: &OutputFormatter) -> Result<String, ClientError> {
        let credential = self.user.as_deref().ok_or_else(|| {
            ClientError::InvalidCredential("--user or PWMAIL_USER is required".to_string())
        })?;
        let account = account_from_credential(credential)?;

        if let Commands::Address = self.command {
            return Ok(formatter.format_address(&account.address().to_string()));
        }

        let client = MailClient::new(self.server.clone(), account)?;
        if self.verbose {
            info!(server = %self.server, address = %client.account().address().short(), "using account");
        }

        match self.command {
            Commands::Address => Ok(formatter.format_address(&client.account().address().to_string())),
            Commands::Inbox { query } => {
                let query: InboxQuery = read_json_file(&query).await?;
                let inbox = client.inbox(query).await?;
                Ok(formatter.format_inbox(&inbox))
            }
            Commands::Read { email_id } => {
                let mail = client.read(email_id).await?;
                Ok(formatter.format_mail(&mail))
            }
            Commands::Send { mail } => {
                let draft: MailDraft = read_json_file(&mail).await?;
                let sent = client.send(&draft).await?;
                Ok(formatter.format_sent(&sent))
            }
        }
    }
}
