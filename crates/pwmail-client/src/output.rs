//! Output formatting for CLI results
//!
//! Table output is for people; JSON output is a stable envelope for scripts.

use std::str::FromStr;

use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::model::{InboxResponse, Mail, SendResponse};
use crate::ExitCode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// JSON wrapper shared by every command
#[derive(Serialize)]
pub struct JsonResponse<'a, T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Exit code name on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub command: &'a str,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_address(&self, address: &str) -> String {
        match self.format {
            OutputFormat::Table => address.to_string(),
            OutputFormat::Json => {
                self.to_json("address", &serde_json::json!({ "address": address }))
            }
        }
    }

    pub fn format_inbox(&self, inbox: &InboxResponse) -> String {
        match self.format {
            OutputFormat::Table => inbox_table(inbox),
            OutputFormat::Json => self.to_json("inbox", inbox),
        }
    }

    pub fn format_mail(&self, mail: &Mail) -> String {
        match self.format {
            OutputFormat::Table => mail_table(mail),
            OutputFormat::Json => self.to_json("read", mail),
        }
    }

    pub fn format_sent(&self, sent: &SendResponse) -> String {
        match self.format {
            OutputFormat::Table => format!("Mail sent: {}", sent.id),
            OutputFormat::Json => self.to_json("send", sent),
        }
    }

    pub fn format_error(&self, command: &str, code: ExitCode, message: &str) -> String {
        match self.format {
            OutputFormat::Table => format!("Error: {message}"),
            OutputFormat::Json => {
                let response = JsonResponse::<()> {
                    success: false,
                    data: None,
                    error: Some(message.to_string()),
                    code: Some(code.name()),
                    command,
                };
                serde_json::to_string_pretty(&response)
                    .unwrap_or_else(|_| format!("{{\"success\":false,\"error\":{message:?}}}"))
            }
        }
    }

    fn to_json<T: Serialize>(&self, command: &str, value: &T) -> String {
        let response = JsonResponse {
            success: true,
            data: Some(value),
            error: None,
            code: None,
            command,
        };
        serde_json::to_string_pretty(&response).unwrap_or_else(|e| {
            self.format_error(command, ExitCode::ServerError, &format!("Serialization error: {e}"))
        })
    }
}

/// First 16 hex characters of an address
fn short(address: &str) -> &str {
    address.get(..16).unwrap_or(address)
}

fn inbox_table(inbox: &InboxResponse) -> String {
    if inbox.inbox.is_empty() {
        return format!("No mail on this page ({} total).", inbox.total);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "From", "Subject", "Sent At"]);
    for mail in &inbox.inbox {
        table.add_row(vec![
            mail.id.to_string(),
            short(&mail.from).to_string(),
            mail.subject.clone(),
            mail.sent_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    format!("{table}\n{} of {} mails", inbox.inbox.len(), inbox.total)
}

fn mail_table(mail: &Mail) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["ID", &mail.id.to_string()]);
    table.add_row(vec!["From", &mail.from]);
    table.add_row(vec!["To", &mail.to]);
    table.add_row(vec!["Subject", &mail.subject]);
    table.add_row(vec!["Sent At", &mail.sent_at.to_rfc3339()]);
    format!("{table}\n\n{}", mail.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn mail() -> Mail {
        Mail {
            id: Uuid::new_v4(),
            from: "ab".repeat(64),
            to: "cd".repeat(64),
            subject: "quarterly numbers".into(),
            body: "see attached".into(),
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_json_inbox_envelope() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let inbox = InboxResponse {
            inbox: vec![mail()],
            total: 7,
        };

        let value: serde_json::Value = serde_json::from_str(&formatter.format_inbox(&inbox)).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["command"], "inbox");
        assert_eq!(value["data"]["total"], 7);
    }

    #[test]
    fn test_table_mail_shows_body() {
        let formatter = OutputFormatter::new(OutputFormat::Table);
        let text = formatter.format_mail(&mail());
        assert!(text.contains("quarterly numbers"));
        assert!(text.ends_with("see attached"));
    }

    #[test]
    fn test_empty_inbox_table() {
        let formatter = OutputFormatter::new(OutputFormat::Table);
        let text = formatter.format_inbox(&InboxResponse {
            inbox: Vec::new(),
            total: 3,
        });
        assert!(text.contains("3 total"));
    }

    #[test]
    fn test_json_error() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let value: serde_json::Value =
            serde_json::from_str(&formatter.format_error("read", ExitCode::NotFound, "Mail not found"))
                .unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Mail not found");
        assert_eq!(value["code"], "NOT_FOUND");
    }
}
