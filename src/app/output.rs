use std::fmt::Write;

use ansi_term::{Colour, Style};
use chrono::{DateTime, Utc};

use crate::{
    engine::TimerDisplay,
    model::{Task, TimeLogEntry},
    utils::time::format_duration,
};

use super::{Outcome, Workspace};

pub fn render(outcome: &Outcome, workspace: &Workspace) -> String {
    match outcome {
        Outcome::Created(id) => format!("{id}\n"),
        Outcome::Removed(id) => format!("Removed {id}\n"),
        Outcome::Timer => format!("{}\n", timer_line(workspace.engine().display().as_ref())),
        Outcome::Status => status(workspace),
    }
}

/// One line describing the active entry.
pub fn timer_line(display: Option<&TimerDisplay>) -> String {
    let Some(display) = display else {
        return Style::new().dimmed().paint("idle").to_string();
    };
    let marker = if display.running {
        Colour::Green.bold().paint("▶ running")
    } else {
        Colour::Yellow.paint("⏸ paused")
    };
    format!(
        "{marker}\t{}\t{}\t[{} / {}]",
        format_duration(display.elapsed),
        display.description,
        display.task_id,
        display.entry_id
    )
}

fn status(workspace: &Workspace) -> String {
    let engine = workspace.engine();
    let now = engine.now();
    let mut out = String::new();
    let _ = writeln!(out, "{}", timer_line(engine.display().as_ref()));
    if let Some(primed) = engine.primed_task() {
        let _ = writeln!(out, "primed\t{primed}");
    }
    for task in workspace.book().tasks() {
        out.push('\n');
        write_task(&mut out, task, now);
    }
    out
}

fn write_task(out: &mut String, task: &Task, now: DateTime<Utc>) {
    let _ = writeln!(out, "{}\t[{}]", Style::new().bold().paint(task.title.as_str()), task.id);
    for entry in &task.time_log {
        write_entry(out, entry, now);
    }
    for section in task.checklist.sections() {
        for item in &section.items {
            let check = if item.is_completed { "x" } else { " " };
            let _ = writeln!(
                out,
                "  [{check}] {}\t{}\t[{}]",
                item.text,
                format_duration(item.logged_time),
                item.id
            );
        }
    }
    if !task.time_log_sessions.is_empty() {
        let _ = writeln!(out, "  {} archived sessions", task.time_log_sessions.len());
    }
}

fn write_entry(out: &mut String, entry: &TimeLogEntry, now: DateTime<Utc>) {
    if entry.is_header() {
        let _ = writeln!(out, "  {}", Style::new().underline().paint(entry.description.as_str()));
        return;
    }
    let marker = if entry.is_running {
        Colour::Green.paint("▶").to_string()
    } else {
        " ".to_string()
    };
    let _ = writeln!(
        out,
        "  {marker} {}\t{}\t[{}]",
        entry.description,
        format_duration(entry.live_duration(now)),
        entry.id
    );
}
