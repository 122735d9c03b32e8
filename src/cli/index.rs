use std::path::Path;

use anyhow::Result;

use crate::weave::TrackedTypes;

/// Run the index subcommand: print the union of the given tracked-type
/// indexes, one identity per line.
pub fn index(inputs: &[impl AsRef<Path>]) -> Result<()> {
    let tracked = TrackedTypes::load(inputs);
    for identity in tracked.iter() {
        println!("{identity}");
    }
    Ok(())
}
