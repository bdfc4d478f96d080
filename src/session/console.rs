// A line-oriented console renderer. It only consumes display payloads and
// produces ratings/comments, so any richer frontend can replace it.

use std::collections::HashMap;
use std::io;
use std::io::BufRead;

use snafu::prelude::*;

use annotation_session::{DisplayPayload, END_OF_DATASET};

use crate::session::*;

#[derive(Eq, PartialEq, Debug, Clone)]
enum Input {
    Text(String),
    Back,
    Quit,
}

#[derive(Eq, PartialEq, Debug, Clone)]
enum Step {
    Submit {
        ratings: HashMap<String, String>,
        comments: String,
    },
    Back,
    Quit,
}

/// Drives the whole annotation dialogue until the user quits or the input
/// stream closes. Every saved answer is already on disk when this returns.
pub fn run_loop(session: &mut AnnotationSession, first: DisplayPayload) -> BAnnResult<()> {
    println!(
        "Annotating with the {:?} schema. Type :b to go back, :q to quit.",
        session.schema().name
    );
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut payload = first;
    loop {
        render(&payload);
        if payload.end_of_data {
            println!("Type :b to revisit the last example or :q to quit.");
            match read_input(&mut lines)? {
                Input::Quit => break,
                Input::Back => payload = session.go_back(payload.index)?,
                Input::Text(_) => {}
            }
            continue;
        }
        match collect_submission(session, &payload, &mut lines)? {
            Step::Quit => break,
            Step::Back => payload = session.go_back(payload.index)?,
            Step::Submit { ratings, comments } => {
                let next = session.submit(payload.index, &ratings, &comments)?;
                if !next.end_of_data && next.index == payload.index {
                    println!("Every rating is required before moving on.");
                }
                payload = next;
            }
        }
    }
    println!(
        "Annotations saved to {}",
        session.annotations_path().display()
    );
    Ok(())
}

fn render(payload: &DisplayPayload) {
    println!();
    if payload.end_of_data {
        println!("=== {} ===", END_OF_DATASET);
        println!("All {} examples are annotated.", payload.total);
        return;
    }
    println!("=== Example {} out of {} ===", payload.index + 1, payload.total);
    for (column, text) in &payload.fields {
        println!("--- {} ---", column);
        println!("{}", text);
    }
}

/// Asks for every rating and then the comments. An empty answer keeps the
/// selection already in the payload; the session itself decides whether the
/// form is complete.
fn collect_submission(
    session: &AnnotationSession,
    payload: &DisplayPayload,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> AnnResult<Step> {
    let mut ratings: HashMap<String, String> = HashMap::new();
    for (column, current) in &payload.ratings {
        let choices = session.choices_for(column);
        render_choices(column, choices, current.as_deref());
        match read_input(lines)? {
            Input::Quit => return Ok(Step::Quit),
            Input::Back => return Ok(Step::Back),
            Input::Text(text) if text.is_empty() => {
                if let Some(c) = current {
                    ratings.insert(column.clone(), c.clone());
                }
            }
            Input::Text(text) => {
                let value = parse_choice(&text, choices).unwrap_or(text);
                ratings.insert(column.clone(), value);
            }
        }
    }
    if payload.comments.is_empty() {
        println!("Comments (enter to leave none):");
    } else {
        println!("Comments [{}]:", payload.comments);
    }
    let comments = match read_input(lines)? {
        Input::Quit => return Ok(Step::Quit),
        Input::Back => return Ok(Step::Back),
        Input::Text(text) if text.is_empty() => payload.comments.clone(),
        Input::Text(text) => text,
    };
    Ok(Step::Submit { ratings, comments })
}

fn render_choices(column: &str, choices: &[String], current: Option<&str>) {
    match current {
        Some(c) => println!("{} [{}]:", column, c),
        None => println!("{}:", column),
    }
    for (i, choice) in choices.iter().enumerate() {
        println!("  {}. {}", i + 1, choice);
    }
}

fn read_input(lines: &mut impl Iterator<Item = io::Result<String>>) -> AnnResult<Input> {
    match lines.next() {
        // A closed stream ends the session like an explicit quit.
        None => Ok(Input::Quit),
        Some(line) => {
            let line = line.whatever_context("failed to read from the terminal")?;
            match line.trim() {
                ":q" => Ok(Input::Quit),
                ":b" => Ok(Input::Back),
                text => Ok(Input::Text(text.to_string())),
            }
        }
    }
}

/// Maps what the user typed to a choice: a 1-based position in the list or
/// the choice spelled out (case insensitive). Anything else passes through
/// untouched for the session to judge.
fn parse_choice(input: &str, choices: &[String]) -> Option<String> {
    if let Ok(n) = input.parse::<usize>() {
        if n >= 1 && n <= choices.len() {
            return Some(choices[n - 1].clone());
        }
    }
    choices
        .iter()
        .find(|c| c.eq_ignore_ascii_case(input))
        .cloned()
}
