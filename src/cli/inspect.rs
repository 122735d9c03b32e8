use std::path::Path;

use anyhow::Result;

use super::utils::{options_for, parse_source};
use crate::weave::{AllowedParentIndex, TrackedTypes, Weaver};

/// Run the inspect subcommand: print the metadata record of every tracked
/// type in `input` as JSON.
pub fn inspect(
    input: &Path,
    index: &[impl AsRef<Path>],
    allowed_parents: &[impl AsRef<Path>],
    module_path: Option<&str>,
) -> Result<()> {
    let tracked = TrackedTypes::load(index);
    let allowed_parents = AllowedParentIndex::load(allowed_parents);
    let file = parse_source(input)?;
    let options = options_for(input, module_path, &tracked, &allowed_parents);

    let mut reports = Vec::new();
    for result in Weaver::new(&options).inspect(&file.items) {
        match result {
            Ok(metadata) => reports.push(metadata.report()),
            Err(err) => eprintln!("{}: {}", input.display(), err),
        }
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
