use anyhow::{Context, Result};

use mnemos_lib::SchedulerVersion;

use crate::app::App;
use crate::SchedulerArg;

pub fn run(app: &mut App, target: SchedulerArg) -> Result<()> {
    let target = match target {
        SchedulerArg::V2 => SchedulerVersion::V2,
        SchedulerArg::V3 => SchedulerVersion::V3,
    };
    let from = app.collection.scheduler_version();
    if from == target {
        println!("Already using scheduler {}", target);
        return Ok(());
    }
    app.collection
        .upgrade_scheduler(target)
        .with_context(|| format!("Failed to switch from scheduler {} to {}", from, target))?;
    println!("Switched from scheduler {} to {}", from, target);
    Ok(())
}
