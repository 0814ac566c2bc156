use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use solo_instance::Role;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// One line of command output.
#[derive(Debug, Serialize)]
pub struct Event<'a> {
    pub event: &'static str,
    pub app_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<&'a [String]>,
    pub timestamp: String,
}

impl<'a> Event<'a> {
    fn new(event: &'static str, app_id: &'a str) -> Self {
        Self {
            event,
            app_id,
            role: None,
            running: None,
            pid: None,
            args: None,
            timestamp: now_unix_seconds(),
        }
    }

    pub fn started(app_id: &'a str, role: Role) -> Self {
        Self {
            role: Some(role.to_string()),
            pid: Some(std::process::id()),
            ..Self::new("started", app_id)
        }
    }

    pub fn forwarded(app_id: &'a str, args: &'a [String]) -> Self {
        Self {
            args: Some(args),
            ..Self::new("forwarded", app_id)
        }
    }

    pub fn sent(app_id: &'a str, pid: Option<u32>, args: &'a [String]) -> Self {
        Self {
            pid,
            args: Some(args),
            ..Self::new("sent", app_id)
        }
    }

    pub fn status(app_id: &'a str, running: bool, pid: Option<u32>) -> Self {
        Self {
            running: Some(running),
            pid,
            ..Self::new("status", app_id)
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("event", self.event.to_string()), ("app", self.app_id.to_string())];
        if let Some(role) = &self.role {
            fields.push(("role", role.clone()));
        }
        if let Some(running) = self.running {
            fields.push(("running", running.to_string()));
        }
        if let Some(pid) = self.pid {
            fields.push(("pid", pid.to_string()));
        }
        if let Some(args) = self.args {
            fields.push(("args", args_preview(args)));
        }
        fields
    }
}

pub fn print_event(event: &Event<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let (header, row): (Vec<_>, Vec<_>) = event
                .fields()
                .into_iter()
                .map(|(key, value)| (key.to_uppercase(), value))
                .unzip();
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header)
                .add_row(row);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line = event
                .fields()
                .into_iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
        }
    }
}

/// Arguments as a JSON array, so empty strings and spaces stay visible.
fn args_preview(args: &[String]) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| format!("<{} args>", args.len()))
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_event_serializes_role_and_pid() {
        let event = Event::started("com.example.app", Role::Primary);
        let value = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(value["event"], "started");
        assert_eq!(value["role"], "primary");
        assert_eq!(value["pid"], std::process::id());
        assert!(value.get("args").is_none());
    }

    #[test]
    fn forwarded_event_keeps_args_verbatim() {
        let args = vec!["--flag".to_string(), String::new(), "a b".to_string()];
        let event = Event::forwarded("app", &args);
        let value = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(value["args"], serde_json::json!(["--flag", "", "a b"]));
        assert!(value.get("role").is_none());
    }

    #[test]
    fn pretty_fields_follow_event_shape() {
        let event = Event::status("app", false, None);
        let fields = event.fields();
        assert_eq!(
            fields,
            vec![
                ("event", "status".to_string()),
                ("app", "app".to_string()),
                ("running", "false".to_string()),
            ]
        );
    }
}
