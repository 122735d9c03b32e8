//! `timber` subcommands
//!
//! `weave` rewrites the tracked types of source files, `inspect` dumps their
//! metadata records as JSON, and `index` prints the union of index files.

pub mod index;
pub mod inspect;
pub mod weave;

/// Common CLI utilities
pub mod utils {
    use std::path::{Component, Path};

    use crate::error::{Error, Result};
    use crate::weave::{AllowedParentIndex, TrackedTypes, WeaveOptions};

    /// Read and parse a Rust source file
    pub fn parse_source(path: &Path) -> Result<syn::File> {
        let source = std::fs::read_to_string(path)?;
        syn::parse_file(&source).map_err(|err| Error::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })
    }

    /// Write output to file or stdout
    pub fn write_output(content: &str, output_path: Option<&Path>) -> Result<()> {
        match output_path {
            Some(path) => std::fs::write(path, content).map_err(Error::from),
            None => {
                println!("{}", content);
                Ok(())
            }
        }
    }

    /// Module path of a source file, derived from its location under `src/`.
    ///
    /// `src/lib.rs` and `src/main.rs` are the crate root, `src/a/mod.rs` and
    /// `src/a.rs` are `crate::a`.
    pub fn module_path_for(path: &Path) -> String {
        let components: Vec<String> = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let start = components
            .iter()
            .rposition(|part| part == "src")
            .map_or(components.len().saturating_sub(1), |index| index + 1);

        let mut segments = vec![String::from("crate")];
        for (offset, part) in components[start..].iter().enumerate() {
            let last = start + offset + 1 == components.len();
            let name = if last {
                part.strip_suffix(".rs").unwrap_or(part)
            } else {
                part.as_str()
            };
            if last && matches!(name, "mod" | "lib" | "main") {
                continue;
            }
            segments.push(name.replace('-', "_"));
        }
        segments.join("::")
    }

    /// Build weave options for `path` from the index files.
    pub fn options_for(
        path: &Path,
        module_path: Option<&str>,
        tracked: &TrackedTypes,
        allowed_parents: &AllowedParentIndex,
    ) -> WeaveOptions {
        let module_path = module_path
            .map(str::to_string)
            .unwrap_or_else(|| module_path_for(path));
        WeaveOptions::new(module_path)
            .with_tracked(tracked.clone())
            .with_allowed_parents(allowed_parents.clone())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_module_path_for() {
            assert_eq!(module_path_for(Path::new("src/lib.rs")), "crate");
            assert_eq!(module_path_for(Path::new("src/tree.rs")), "crate::tree");
            assert_eq!(module_path_for(Path::new("app/src/tree/mod.rs")), "crate::tree");
            assert_eq!(module_path_for(Path::new("src/tree/leaf-node.rs")), "crate::tree::leaf_node");
            assert_eq!(module_path_for(Path::new("shapes.rs")), "crate::shapes");
        }
    }
}
