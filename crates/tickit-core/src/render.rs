use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Local;
use tickit_shared::{StatusFilter, Task};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::page::Notice;

const EMPTY_LIST: &str = "No tasks yet. Add one with `tickit add <title>`.";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, tasks))]
    pub fn write_task_list<W: Write>(
        &self,
        mut out: W,
        filter: StatusFilter,
        tasks: &[Task],
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "{EMPTY_LIST}")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Created".to_string(),
            "Title".to_string(),
            "Description".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                let done = if task.completed { "[x]" } else { "[ ]" };
                let title = if task.completed {
                    self.paint(&printable(&task.title), "9;90")
                } else {
                    printable(&task.title)
                };
                vec![
                    self.paint(&task.id.to_string(), "33"),
                    done.to_string(),
                    task.created_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d")
                        .to_string(),
                    title,
                    printable(first_line(&task.description)),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        writeln!(out)?;
        writeln!(out, "{} task(s), filter: {filter}", tasks.len())?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, task))]
    pub fn write_task_info<W: Write>(&self, mut out: W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", printable(&task.title))?;
        writeln!(
            out,
            "status      {}",
            if task.completed { "completed" } else { "pending" }
        )?;
        for (idx, line) in task.description.lines().enumerate() {
            let label = if idx == 0 { "description" } else { "" };
            writeln!(out, "{label:<11} {}", printable(line))?;
        }
        writeln!(out, "created     {}", task.created_at.format("%Y-%m-%dT%H:%M:%SZ"))?;
        writeln!(out, "updated     {}", task.updated_at.format("%Y-%m-%dT%H:%M:%SZ"))?;
        Ok(())
    }

    pub fn write_notices<W: Write>(&self, mut out: W, notices: &[Notice]) -> anyhow::Result<()> {
        for notice in notices {
            writeln!(out, "{}", self.paint(&printable(&notice.message), "31"))?;
        }
        Ok(())
    }

    pub fn print_task_list(&self, filter: StatusFilter, tasks: &[Task]) -> anyhow::Result<()> {
        self.write_task_list(io::stdout().lock(), filter, tasks)
    }

    pub fn print_task_info(&self, task: &Task) -> anyhow::Result<()> {
        self.write_task_info(io::stdout().lock(), task)
    }

    pub fn print_notices(&self, notices: &[Notice]) -> anyhow::Result<()> {
        self.write_notices(io::stderr().lock(), notices)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// Server-supplied text with control characters neutralised, so it can
/// neither drive the terminal nor skew column widths.
fn printable(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            c if !c.is_control() => c,
            c if c.is_whitespace() => ' ',
            _ => '\u{fffd}',
        })
        .collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
