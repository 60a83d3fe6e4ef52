use anyhow::Result;

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let version = app.collection.scheduler_version();
    let cards = app.collection.storage().card_count()?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": app.path.to_string_lossy(),
                "scheduler": version.to_string(),
                "cardCount": cards,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Collection: {}", paint(&app.path.display().to_string(), Color::BOLD, use_color));
            println!("  Scheduler: {}", version);
            println!("  Cards: {}", cards);
        }
    }

    Ok(())
}
