//! Command output
//!
//! Command results go to stdout. Warnings and errors go to stderr, next to
//! the log stream, so `--json` output stays machine-readable.

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }

    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Checkmarks and indentation for terminals
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {message}");
    }
    fn info(&self, message: &str) {
        println!("  {message}");
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// One JSON document per result; status lines are single-line objects
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", serde_json::json!({ "success": true, "message": message }));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", serde_json::json!({ "success": false, "error": message }));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", serde_json::json!({ "level": "warning", "message": message }));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("{}", serde_json::json!({ "success": false, "error": e.to_string() })),
        }
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}

/// Left-aligned text table with a rule under the header and a total line.
///
/// The last column is never padded.
pub struct Table {
    columns: Vec<(&'static str, usize)>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: &[(&'static str, usize)]) -> Self {
        Self {
            columns: columns.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn render_line(&self, cells: &[&str]) -> String {
        let last = self.columns.len().saturating_sub(1);
        let mut line = String::new();
        for (i, (&(_, width), cell)) in self.columns.iter().zip(cells).enumerate() {
            if i == last {
                line.push_str(cell);
            } else {
                line.push_str(&format!("{cell:<width$} "));
            }
        }
        line.trim_end().to_string()
    }

    /// Renders the table; `noun` names the rows in the total line.
    pub fn render(&self, noun: &str) -> String {
        let header: Vec<&str> = self.columns.iter().map(|(name, _)| *name).collect();
        let rule_width: usize = self.columns.iter().map(|(_, w)| w + 1).sum();

        let mut out = vec![self.render_line(&header), "-".repeat(rule_width.max(20))];
        for row in &self.rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            out.push(self.render_line(&cells));
        }
        out.push(String::new());
        out.push(format!("Total: {} {noun}(s)", self.rows.len()));
        out.join("\n")
    }

    pub fn print(&self, noun: &str) {
        println!("{}", self.render(noun));
    }
}

/// Human-readable byte size.
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    match bytes {
        b if b < 1024 => format!("{b} B"),
        b if b < 1024 * 1024 => format!("{:.1} KB", b as f64 / KIB),
        b => format!("{:.1} MB", b as f64 / (KIB * KIB)),
    }
}
