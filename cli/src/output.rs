//! Plain and JSON printers.

use std::io::BufRead;
use std::io::Write;

use anyhow::Context;
use owo_colors::OwoColorize;
use serde::Serialize;
use supports_color::Stream;

#[derive(Debug, Clone, Copy)]
pub struct Printer {
    json: bool,
    color: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            color: !json && supports_color::on(Stream::Stdout).is_some(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(value).context("failed to encode output")?;
        println!("{text}");
        Ok(())
    }

    /// Prints `value` as JSON in JSON mode, otherwise as a table.
    pub fn print<T: Serialize + ?Sized>(
        &self,
        value: &T,
        headers: &[&str],
        rows: Vec<Vec<String>>,
    ) -> anyhow::Result<()> {
        if self.json {
            return self.json(value);
        }
        self.table(headers, &rows);
        Ok(())
    }

    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        print!("{}", render_table(headers, rows, self.color));
    }

    /// A one-line confirmation; silent in JSON mode.
    pub fn success(&self, message: &str) {
        if self.json {
            return;
        }
        if self.color {
            println!("{}", message.green());
        } else {
            println!("{message}");
        }
    }

    pub fn plain(&self, line: &str) {
        println!("{line}");
    }
}

/// Column-aligned text table. Headers are uppercased.
pub fn render_table(headers: &[&str], rows: &[Vec<String>], color: bool) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            let width = cell.lines().map(str::len).max().unwrap_or(0);
            if let Some(slot) = widths.get_mut(index) {
                *slot = (*slot).max(width);
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<w$}", h.to_uppercase(), w = *w))
        .collect();
    let header = header.join("  ");
    if color {
        out.push_str(&header.trim_end().bold().to_string());
    } else {
        out.push_str(header.trim_end());
    }
    out.push('\n');

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}", w = *w))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Asks a yes/no question on stderr and reads the answer from stdin.
pub fn confirm(question: &str) -> anyhow::Result<bool> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{question} (y/N) ")?;
    stderr.flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Reads one line from stdin after printing `prompt` on stderr.
pub fn prompt(prompt: &str) -> anyhow::Result<String> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{prompt}: ")?;
    stderr.flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

/// Prints a failure the way the binary reports it.
pub fn report_error(err: &anyhow::Error, json: bool, debug: bool) {
    if json {
        let body = serde_json::json!({ "error": err.to_string() });
        eprintln!("{body}");
        return;
    }
    if supports_color::on(Stream::Stderr).is_some() {
        eprintln!("{} {err}", "Doppler Error:".red().bold());
    } else {
        eprintln!("Doppler Error: {err}");
    }
    if debug {
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
}
