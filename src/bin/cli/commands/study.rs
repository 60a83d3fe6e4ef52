use std::io::{self, BufRead, Write};

use anyhow::Result;

use mnemos_lib::timestamp::TimestampSecs;
use mnemos_lib::{CollectionError, Grade, SchedulerError, UndoResult};

use crate::app::App;
use crate::render::terminal::{paint, render_button, render_card_header, render_counts, render_outcome, Color};

const GRADE_LABELS: [(Grade, &str); 4] = [
    (Grade::Again, "Again"),
    (Grade::Hard, "Hard"),
    (Grade::Good, "Good"),
    (Grade::Easy, "Easy"),
];

enum Input {
    Answer(Grade),
    Undo,
    Quit,
    Unknown,
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "q" | "quit" => Input::Quit,
        "u" | "undo" => Input::Undo,
        other => other
            .parse::<u8>()
            .ok()
            .and_then(|n| Grade::try_from(n).ok())
            .map(Input::Answer)
            .unwrap_or(Input::Unknown),
    }
}

/// Grades shown for a card with `buttons` answer buttons
fn visible_grades(buttons: u8) -> Vec<(Grade, &'static str)> {
    GRADE_LABELS
        .iter()
        .copied()
        .filter(|(grade, _)| buttons >= 4 || matches!(grade, Grade::Again | Grade::Good))
        .collect()
}

pub fn run(app: &mut App, use_color: bool) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    app.collection.reset()?;

    loop {
        let now = TimestampSecs::now();
        let Some(card) = app.collection.get_card_at(now)? else {
            println!("{}", paint("Congratulations! You have finished for now.", Color::GREEN, use_color));
            break;
        };

        let counts = app.collection.counts_at(now)?;
        let deck_name = app
            .collection
            .storage()
            .get_deck(card.deck_id)?
            .map(|d| d.name)
            .unwrap_or_default();
        println!();
        println!("{}", render_counts(&counts, use_color));
        println!("{}", render_card_header(&card, &deck_name, use_color));

        let buttons = app.collection.answer_buttons(&card)?;
        let mut choices = Vec::new();
        for (grade, label) in visible_grades(buttons) {
            let secs = app.collection.next_interval_secs_at(&card, grade, now)?;
            choices.push(render_button(grade.as_u8(), label, secs, use_color));
        }
        println!("{}   [u] Undo   [q] Quit", choices.join("   "));
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        match parse_input(&line?) {
            Input::Quit => break,
            Input::Undo => match app.collection.undo()? {
                Some(UndoResult::Review(review)) => println!("Undid answer to card {}", review.card.id),
                Some(UndoResult::Checkpoint { name }) | Some(UndoResult::External { name }) => {
                    println!("Undid {}", name)
                }
                None => println!("Nothing to undo"),
            },
            Input::Answer(grade) => match app.collection.answer_card(&card, grade) {
                Ok(outcome) => println!("{}", render_outcome(&outcome, use_color)),
                Err(CollectionError::Scheduler(SchedulerError::InvalidGrade { grade, .. })) => {
                    println!("{}", paint(&format!("Grade {} is not available here", grade), Color::YELLOW, use_color));
                }
                Err(err) => return Err(err.into()),
            },
            Input::Unknown => println!("Enter a grade, u, or q"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert!(matches!(parse_input("3\n"), Input::Answer(Grade::Good)));
        assert!(matches!(parse_input(" u "), Input::Undo));
        assert!(matches!(parse_input("q"), Input::Quit));
        assert!(matches!(parse_input("7"), Input::Unknown));
    }

    #[test]
    fn test_two_button_grades() {
        let grades: Vec<Grade> = visible_grades(2).into_iter().map(|(g, _)| g).collect();
        assert_eq!(grades, vec![Grade::Again, Grade::Good]);
        assert_eq!(visible_grades(4).len(), 4);
    }
}
