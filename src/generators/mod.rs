// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Generator
//!
//! Walks an input tree, hands every regular file to the [`Pipeline`] and
//! records what was written in a [`Manifest`].
//!
//! - Files are visited in lexicographic order of their relative path, so
//!   identical inputs produce identical manifests.
//! - Per-file failures (render errors, output conflicts) are collected in
//!   the [`GenerationReport`]; the run continues unless `abort_on_error`
//!   is set. Any other error ends the run immediately.
//! - Existing content in the output root is left alone.
//!
//! ```rust,no_run
//! use webgen::generators::Generator;
//! use webgen::pipeline::Pipeline;
//! use webgen::processors::ProcessorOptions;
//!
//! let pipeline = Pipeline::from_names(&["HtmlTemplate"], ProcessorOptions::default())?;
//! let report = Generator::new(pipeline).generate("site", "public")?;
//! for entry in report.manifest.iter() {
//!     println!("{entry}");
//! }
//! # Ok::<(), webgen::WebgenError>(())
//! ```

/// HTML output finishing.
pub mod html;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use walkdir::WalkDir;

use crate::core::config::SiteConfig;
use crate::core::context::Context;
use crate::core::error::{FileFailure, IoResultExt, Result, WebgenError};
use crate::core::traits::Outcome;
use crate::manifest::{entry_for, Manifest};
use crate::pipeline::Pipeline;

/// `chrono` format of generation timestamps (`YYYYMMDDHHMMSS`, UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// The current UTC time as a generation timestamp.
pub fn timestamp_now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Outcome of one generation run.
#[derive(Debug)]
pub struct GenerationReport {
    /// Every output written, in input order.
    pub manifest: Manifest,
    /// Inputs that could not be turned into outputs, in input order.
    pub failures: Vec<FileFailure>,
    /// Inputs claimed without output (hidden, temporary or backup files).
    pub ignored: Vec<PathBuf>,
    /// The run's timestamp.
    pub timestamp: String,
    /// Whether the run stopped at its first failure.
    pub aborted: bool,
}

impl GenerationReport {
    /// True when no file failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The manifest, or `GenerationFailed` listing every failure.
    pub fn into_result(self) -> Result<Manifest> {
        if self.failures.is_empty() {
            Ok(self.manifest)
        } else {
            Err(WebgenError::GenerationFailed {
                failures: self.failures,
            })
        }
    }
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} ignored, {} failed",
            self.manifest.len(),
            self.ignored.len(),
            self.failures.len()
        )?;
        if self.aborted {
            f.write_str(" (aborted)")?;
        }
        Ok(())
    }
}

/// Drives a [`Pipeline`] over an input tree.
#[derive(Debug)]
pub struct Generator {
    pipeline: Pipeline,
    abort_on_error: bool,
    variables: Map<String, JsonValue>,
    deploy_dir: Option<PathBuf>,
}

impl Generator {
    /// Creates a generator around `pipeline`.
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            abort_on_error: false,
            variables: Map::new(),
            deploy_dir: None,
        }
    }

    /// Creates the generator a site configuration describes.
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        Ok(Self::new(Pipeline::from_config(config)?)
            .with_abort_on_error(config.abort_on_error)
            .with_variables(config.variables_json()?)
            .with_deploy_dir(config.versions.deploy_dir.clone()))
    }

    /// Stops at the first per-file failure.
    pub fn with_abort_on_error(mut self, abort: bool) -> Self {
        self.abort_on_error = abort;
        self
    }

    /// Renderer variables exported into every run's context.
    pub fn with_variables(mut self, variables: Map<String, JsonValue>) -> Self {
        self.variables = variables;
        self
    }

    /// Deploy directory exported into every run's context.
    pub fn with_deploy_dir(mut self, deploy_dir: Option<PathBuf>) -> Self {
        self.deploy_dir = deploy_dir;
        self
    }

    /// The pipeline in use.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Generates `input_root` into `output_root`, timestamped now.
    pub fn generate<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input_root: P,
        output_root: Q,
    ) -> Result<GenerationReport> {
        self.generate_at(input_root, output_root, &timestamp_now())
    }

    /// Generates `input_root` into `output_root` with an explicit
    /// timestamp.
    pub fn generate_at<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input_root: P,
        output_root: Q,
        timestamp: &str,
    ) -> Result<GenerationReport> {
        let context = Context::new(
            input_root.as_ref(),
            output_root.as_ref(),
            timestamp,
        )
        .with_deploy_dir(self.deploy_dir.clone())
        .with_variables(self.variables.clone());
        self.run(&context)
    }

    /// Runs the pipeline over the tree `context` describes.
    pub fn run(&mut self, context: &Context) -> Result<GenerationReport> {
        let input_root = context.input_root();
        let output_root = context.output_root();
        if !fs::metadata(input_root).at_path(input_root)?.is_dir() {
            return Err(WebgenError::config_error(
                "input root is not a directory",
                Some(input_root.to_path_buf()),
            ));
        }
        let files = list_input_files(input_root, Some(output_root))?;
        log::info!(
            "Generating {} files from {} into {}",
            files.len(),
            input_root.display(),
            output_root.display()
        );

        let mut report = GenerationReport {
            manifest: Manifest::new(),
            failures: Vec::new(),
            ignored: Vec::new(),
            timestamp: context.timestamp().to_string(),
            aborted: false,
        };
        let mut producers: HashMap<String, PathBuf> = HashMap::new();
        let abort_on_error = self.abort_on_error;

        let run = self.pipeline.start_run(context)?;
        for relative in files {
            let processor = run.resolve(&relative);
            let renamed = processor.rename(&relative);
            log::debug!(
                "{} -> {} ({})",
                relative.display(),
                renamed.display(),
                processor.name()
            );

            let result = match entry_for(&renamed) {
                None => Err(WebgenError::render_error(
                    relative.clone(),
                    format!(
                        "{} produced an invalid output name `{}`",
                        processor.name(),
                        renamed.display()
                    ),
                )),
                Some(entry) => match producers.get(&entry) {
                    Some(first) => Err(WebgenError::OutputConflict {
                        output: entry,
                        first: first.clone(),
                        second: relative.clone(),
                    }),
                    None => processor
                        .process(
                            &input_root.join(&relative),
                            &output_root.join(&renamed),
                        )
                        .map(|outcome| (entry, outcome)),
                },
            };

            match result {
                Ok((entry, Outcome::Emitted)) => {
                    _ = report.manifest.insert(entry.clone())?;
                    _ = producers.insert(entry, relative);
                }
                Ok((_, Outcome::Skipped)) => report.ignored.push(relative),
                Err(error) if error.is_per_file() => {
                    log::warn!("{}", error);
                    report.failures.push(FileFailure {
                        input: relative,
                        error,
                    });
                    if abort_on_error {
                        report.aborted = true;
                        break;
                    }
                }
                Err(error) => return Err(error),
            }
        }
        drop(run);

        log::info!("Generation finished: {}", report);
        Ok(report)
    }
}

/// Regular files below `input_root` as relative paths, in lexicographic
/// order. `exclude` (typically the output root) is skipped when it lies
/// inside the input tree. Symlinks are included when they point at a
/// regular file.
pub fn list_input_files(
    input_root: &Path,
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let root = fs::canonicalize(input_root).at_path(input_root)?;
    let excluded = exclude
        .and_then(|path| fs::canonicalize(path).ok())
        .filter(|path| path != &root && path.starts_with(&root));

    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| Some(entry.path()) != excluded.as_deref());
    for entry in walker {
        let entry = entry?;
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(&root)
            .map_err(|e| WebgenError::internal_error(e.to_string()))?;
        files.push(relative.to_path_buf());
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::Processor;
    use std::fs;
    use tempfile::TempDir;

    /// Uppercases `*.data` files into `*.page`; `bad.data` fails.
    #[derive(Debug)]
    struct DataPage;

    impl Processor for DataPage {
        fn name(&self) -> &'static str {
            "DataPage"
        }

        fn can_handle(&self, path: &Path) -> bool {
            path.extension().is_some_and(|e| e == "data")
        }

        fn process(&self, input: &Path, output: &Path) -> Result<Outcome> {
            let text = crate::fsutil::read_text(input)?;
            if text.starts_with("bad") {
                return Err(WebgenError::render_error(
                    input.to_path_buf(),
                    "bad data",
                ));
            }
            crate::fsutil::write_atomic(output, text.to_uppercase().as_bytes())?;
            Ok(Outcome::Emitted)
        }

        fn rename(&self, path: &Path) -> PathBuf {
            path.with_extension("page")
        }
    }

    fn generator() -> Generator {
        let renderer: Box<dyn Processor> = Box::new(DataPage);
        Generator::new(Pipeline::with_processors(vec![renderer]))
    }

    fn tree(files: &[(&str, &[u8])]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for (name, body) in files {
            let path = temp.path().join("in").join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        temp
    }

    #[test]
    fn test_protected_files_are_not_written() -> Result<()> {
        let temp = tree(&[
            ("_layout.html", b"x"),
            ("dir/.#lock", b"x"),
            ("notes.txt~", b"x"),
            ("index.txt", b"x"),
        ]);
        let out = temp.path().join("out");
        let report = generator().generate(temp.path().join("in"), &out)?;

        assert_eq!(report.manifest.entries(), ["index.txt"]);
        assert_eq!(report.ignored.len(), 3);
        assert!(!out.join("_layout.html").exists());
        assert!(!out.join("dir").exists());
        assert!(!out.join("notes.txt~").exists());
        Ok(())
    }

    #[test]
    fn test_unclaimed_files_are_copied_byte_for_byte() -> Result<()> {
        let bytes: &[u8] = &[0, 159, 146, 150, 255];
        let temp = tree(&[("img/logo.bin", bytes)]);
        let out = temp.path().join("out");
        let report = generator().generate(temp.path().join("in"), &out)?;

        assert_eq!(report.manifest.entries(), ["img/logo.bin"]);
        assert_eq!(fs::read(out.join("img/logo.bin"))?, bytes);
        Ok(())
    }

    #[test]
    fn test_rename_is_reflected_in_manifest() -> Result<()> {
        let temp = tree(&[("a/b.data", b"hello")]);
        let out = temp.path().join("out");
        let report = generator().generate(temp.path().join("in"), &out)?;

        assert_eq!(report.manifest.entries(), ["a/b.page"]);
        assert_eq!(fs::read_to_string(out.join("a/b.page"))?, "HELLO");
        assert!(!out.join("a/b.data").exists());
        Ok(())
    }

    #[test]
    fn test_manifest_order_is_deterministic() -> Result<()> {
        let temp = tree(&[
            ("b.txt", b"1"),
            ("a/z.txt", b"2"),
            ("a/b/c.txt", b"3"),
            ("c.txt", b"4"),
        ]);
        let first = generator().generate(temp.path().join("in"), temp.path().join("o1"))?;
        let second = generator().generate(temp.path().join("in"), temp.path().join("o2"))?;
        assert_eq!(
            first.manifest.entries(),
            ["a/b/c.txt", "a/z.txt", "b.txt", "c.txt"]
        );
        assert_eq!(first.manifest, second.manifest);
        Ok(())
    }

    #[test]
    fn test_failures_are_collected_and_run_continues() -> Result<()> {
        let temp = tree(&[
            ("a.data", b"bad"),
            ("b.data", b"good"),
            ("c.txt", b"c"),
        ]);
        let out = temp.path().join("out");
        let report = generator().generate(temp.path().join("in"), &out)?;

        assert_eq!(report.manifest.entries(), ["b.page", "c.txt"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].input, PathBuf::from("a.data"));
        assert!(!out.join("a.page").exists());
        assert!(!report.is_success());
        assert!(matches!(
            report.into_result(),
            Err(WebgenError::GenerationFailed { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_abort_on_error_stops_run() -> Result<()> {
        let temp = tree(&[("a.data", b"bad"), ("b.txt", b"b")]);
        let report = generator()
            .with_abort_on_error(true)
            .generate(temp.path().join("in"), temp.path().join("out"))?;
        assert!(report.aborted);
        assert!(report.manifest.is_empty());
        Ok(())
    }

    #[test]
    fn test_output_conflict_is_per_file_failure() -> Result<()> {
        let temp = tree(&[("x.data", b"from data"), ("x.page", b"static")]);
        let out = temp.path().join("out");
        let report = generator().generate(temp.path().join("in"), &out)?;

        assert_eq!(report.manifest.entries(), ["x.page"]);
        assert_eq!(fs::read_to_string(out.join("x.page"))?, "FROM DATA");
        assert!(matches!(
            report.failures[0].error,
            WebgenError::OutputConflict { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_nested_output_root_is_not_walked() -> Result<()> {
        let temp = tree(&[("index.txt", b"x")]);
        let input = temp.path().join("in");
        let out = input.join("public");
        let first = generator().generate(&input, &out)?;
        let second = generator().generate(&input, &out)?;
        assert_eq!(first.manifest, second.manifest);
        assert_eq!(second.manifest.entries(), ["index.txt"]);
        Ok(())
    }

    #[test]
    fn test_existing_output_is_preserved_and_missing_input_fails() -> Result<()> {
        let temp = tree(&[("index.txt", b"x")]);
        let out = temp.path().join("out");
        fs::create_dir_all(&out)?;
        fs::write(out.join("keep.me"), "old")?;
        _ = generator().generate(temp.path().join("in"), &out)?;
        assert!(out.join("keep.me").exists());

        assert!(generator()
            .generate(temp.path().join("missing"), &out)
            .is_err());
        Ok(())
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 14);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }
}
