//! Renders quiz state as a table or as JSON.

use color_eyre::eyre::Result;
use serde::Serialize;
use slotstore::quiz::{QuizRoute, QuizState};
use std::io::Write;

/// Flattened view of one route's quiz state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizView {
    pub route: String,
    pub key: String,
    pub name: String,
    pub finished: bool,
}

impl QuizView {
    pub fn new(route: QuizRoute, state: &QuizState) -> Self {
        Self {
            route: route.to_string(),
            key: route.slot_key(),
            name: state.name.clone(),
            finished: state.finished,
        }
    }
}

pub fn render<W: Write>(out: &mut W, views: &[QuizView], json: bool) -> Result<()> {
    if json {
        let j = serde_json::to_string(views)?;
        writeln!(out, "{}", j)?;
        return Ok(());
    }

    let mut table = prettytable::Table::new();

    table.add_row(prettytable::row!["ROUTE", "SLOT", "NAME", "FINISHED"]);

    for v in views.iter() {
        table.add_row(prettytable::row![v.route, v.key, v.name, v.finished]);
    }

    table.print(out)?;

    Ok(())
}

#[cfg(test)]
#[path = "./view_tests.rs"]
mod tests;
