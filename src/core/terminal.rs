use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_step(step: &str) {
    println!("{} {}", SPARKLE, style(step).bold());
}

pub fn print_link(label: &str, url: &str) {
    println!(
        "  {} {}: {}",
        GLOBE,
        style(label).bold(),
        style(url).underlined().cyan()
    );
}

/// Colored status word for run and step states.
pub fn status_badge(status: &str) -> String {
    match status {
        "completed" | "registered" | "active" => style(status).green().to_string(),
        "running" | "queued" | "pending" => style(status).cyan().to_string(),
        "failed" => style(status).red().bold().to_string(),
        _ => style(status).yellow().to_string(),
    }
}

enum GuideRow {
    Command(String, String),
    Status(String, String),
    Text(String),
    Blank,
}

/// A titled block of help or status rows.
pub struct GuideSection {
    title: String,
    rows: Vec<GuideRow>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn command(mut self, command: &str, description: &str) -> Self {
        self.rows
            .push(GuideRow::Command(command.to_string(), description.to_string()));
        self
    }

    pub fn status(mut self, label: &str, value: &str) -> Self {
        self.rows
            .push(GuideRow::Status(label.to_string(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.rows.push(GuideRow::Text(text.to_string()));
        self
    }

    pub fn blank(mut self) -> Self {
        self.rows.push(GuideRow::Blank);
        self
    }

    pub fn print(&self) {
        println!("{}", style(&self.title).bold().underlined());
        let width = self
            .rows
            .iter()
            .map(|r| match r {
                GuideRow::Command(c, _) => c.len(),
                _ => 0,
            })
            .max()
            .unwrap_or(0);
        for row in &self.rows {
            match row {
                GuideRow::Command(command, description) => println!(
                    "  {}  {}",
                    style(format!("{:<width$}", command, width = width)).cyan(),
                    description
                ),
                GuideRow::Status(label, value) => print_status(label, value),
                GuideRow::Text(text) => {
                    for line in text.lines() {
                        println!("  {}", line);
                    }
                }
                GuideRow::Blank => println!(),
            }
        }
        println!();
    }
}

pub fn print_banner() {
    println!();
    println!(
        "{} {}",
        ROCKET,
        style("qaflow").bold().cyan()
    );
    println!("{}\n", style("QA workflow orchestration for testing agents.").dim());
}

pub fn print_goodbye() {
    println!("\n{} {}", SPARKLE, style("qaflow stopped.").bold().cyan());
}
