use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use quote::ToTokens;
use rayon::prelude::*;

use super::utils::{options_for, parse_source, write_output};
use crate::error::Error;
use crate::weave::{AllowedParentIndex, TrackedTypes, Weaver};

const GENERATED_HEADER: &str = "// @generated by `timber weave`; edit the original source instead.\n";

/// Arguments of the weave subcommand
#[derive(Debug, Clone)]
pub struct WeaveArgs {
    pub inputs: Vec<PathBuf>,
    pub index: Vec<PathBuf>,
    pub allowed_parents: Vec<PathBuf>,
    pub module_path: Option<String>,
    pub out_dir: Option<PathBuf>,
}

/// What happened to one input file.
struct FileReport {
    input: PathBuf,
    output: String,
    woven: Vec<String>,
    failures: Vec<Error>,
}

/// Run the weave subcommand
pub fn weave(args: &WeaveArgs) -> Result<()> {
    let tracked = TrackedTypes::load(&args.index);
    let allowed_parents = AllowedParentIndex::load(&args.allowed_parents);
    if tracked.is_empty() {
        log::warn!("the tracked-type index is empty; only #[timber(node)] types will be woven");
    }

    if let Some(out_dir) = &args.out_dir {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    }

    let reports: Vec<_> = args
        .inputs
        .par_iter()
        .map(|input| weave_file(input, args.module_path.as_deref(), &tracked, &allowed_parents))
        .collect();

    let mut failed = 0;
    let mut unreadable = 0;
    for (input, report) in args.inputs.iter().zip(reports) {
        let report = match report {
            Ok(report) => report,
            Err(err) => {
                eprintln!("{}: {err:#}", input.display());
                unreadable += 1;
                continue;
            }
        };
        for failure in &report.failures {
            eprintln!("{}: {}", report.input.display(), failure);
        }
        failed += report.failures.len();
        log::info!(
            "{}: wove {} type(s) [{}]",
            report.input.display(),
            report.woven.len(),
            report.woven.join(", ")
        );

        let target = args.out_dir.as_ref().map(|dir| output_path(dir, &report.input));
        write_output(&report.output, target.as_deref())?;
    }

    match (unreadable, failed) {
        (0, 0) => Ok(()),
        (0, _) => bail!("{failed} type(s) failed to weave"),
        (_, 0) => bail!("{unreadable} input file(s) could not be woven"),
        _ => bail!("{unreadable} input file(s) could not be woven and {failed} type(s) failed to weave"),
    }
}

fn weave_file(
    input: &Path,
    module_path: Option<&str>,
    tracked: &TrackedTypes,
    allowed_parents: &AllowedParentIndex,
) -> Result<FileReport> {
    let mut file = parse_source(input)?;
    let options = options_for(input, module_path, tracked, allowed_parents);
    log::debug!("weaving {} as {}", input.display(), options.module_path);

    let outcome = Weaver::new(&options).weave_items(std::mem::take(&mut file.items));
    file.items = outcome.items;

    Ok(FileReport {
        input: input.to_path_buf(),
        output: format!("{GENERATED_HEADER}{}", file.to_token_stream()),
        woven: outcome
            .woven
            .iter()
            .map(|metadata| metadata.identity.clone())
            .collect(),
        failures: outcome.failures.iter().map(|failure| failure.to_error()).collect(),
    })
}

fn output_path(out_dir: &Path, input: &Path) -> PathBuf {
    out_dir.join(input.file_name().unwrap_or(input.as_os_str()))
}
