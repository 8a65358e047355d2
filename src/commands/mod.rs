pub mod harvest;
pub mod status;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    /// One line per detail, then one `issue:` line per problem.
    pub fn render_text(&self) -> String {
        let mut out = format!("{} ok={}\n", self.command, self.ok);
        for line in &self.details {
            out.push_str(&format!("  {line}\n"));
        }
        for line in &self.issues {
            out.push_str(&format!("  issue: {line}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_flips_ok_and_renders_after_details() {
        let mut report = CommandReport::new("harvest");
        report.detail("sources=2");
        assert!(report.ok);
        report.issue("archive dir unavailable");

        assert!(!report.ok);
        assert_eq!(report.details, vec!["sources=2"]);
        assert_eq!(
            report.render_text(),
            "harvest ok=false\n  sources=2\n  issue: archive dir unavailable\n"
        );
    }
}
