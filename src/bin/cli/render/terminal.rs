use mnemos_lib::scheduler::format_interval;
use mnemos_lib::{AnswerOutcome, Card, CardQueue, Counts};

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// New, learning, and review counts in the usual blue/red/green
pub fn render_counts(counts: &Counts, use_color: bool) -> String {
    format!(
        "{} {} {}",
        paint(&counts.new.to_string(), Color::BLUE, use_color),
        paint(&counts.learning.to_string(), Color::RED, use_color),
        paint(&counts.review.to_string(), Color::GREEN, use_color),
    )
}

pub fn queue_label(queue: CardQueue) -> &'static str {
    match queue {
        CardQueue::New => "new",
        CardQueue::Learn | CardQueue::DayLearn => "learning",
        CardQueue::Review => "review",
        CardQueue::Preview => "preview",
        CardQueue::Suspended => "suspended",
        CardQueue::SchedBuried | CardQueue::UserBuried => "buried",
    }
}

pub fn render_card_header(card: &Card, deck_name: &str, use_color: bool) -> String {
    let title = format!("Card {}", card.id);
    format!(
        "{}  {}  {}",
        paint(&title, Color::BOLD, use_color),
        paint(deck_name, Color::CYAN, use_color),
        paint(queue_label(card.queue), Color::GRAY, use_color),
    )
}

/// One button label per grade, e.g. `[3] Good (10m)`
pub fn render_button(number: u8, label: &str, interval_secs: u32, use_color: bool) -> String {
    format!(
        "[{}] {} {}",
        number,
        label,
        paint(&format!("({})", format_interval(interval_secs)), Color::DIM, use_color)
    )
}

pub fn render_outcome(outcome: &AnswerOutcome, use_color: bool) -> String {
    let next = match outcome.learning_delay_secs {
        Some(secs) => format!("again in {}", format_interval(secs)),
        None => format!("next review in {}", format_interval(outcome.interval_days.saturating_mul(86_400))),
    };
    let mut line = paint(&next, Color::GRAY, use_color);
    if outcome.leech {
        line.push(' ');
        line.push_str(&paint("(leech)", Color::YELLOW, use_color));
    }
    if outcome.suspended {
        line.push(' ');
        line.push_str(&paint("(suspended)", Color::RED, use_color));
    }
    line
}
