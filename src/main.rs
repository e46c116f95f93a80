use gander::prelude::*;

fn main() -> Result<(), GanderError> {
    let result = GanderAttack::initialize()?.execute()?;

    // Failed thresholds fail the process, so CI can gate on a run.
    if !result.passed {
        std::process::exit(1);
    }

    Ok(())
}
