//! Destinations for the result files a run produces.

use anyhow::anyhow;
use formatx::formatx;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Where a run writes its result files. A writer is requested once per
/// results key; `None` means the destination discards that output, so the
/// caller can skip producing it altogether.
pub trait Output: Debug {
    fn writer_for_results_key(&self, results_key: &str) -> anyhow::Result<Option<impl Write>>;
}

/// Writes one file per results key into a directory. File names come from a
/// template holding a single `{}` placeholder for the key, e.g.
/// `"household__{}.csv"`.
#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    /// An unusable template is reported here rather than midway through a
    /// run, after some results have already been written.
    pub fn new(directory_path: PathBuf, file_template: String) -> anyhow::Result<Self> {
        format_file_name(&file_template, "results")?;
        Ok(Self {
            directory_path,
            file_template,
        })
    }
}

fn format_file_name(template: &str, results_key: &str) -> anyhow::Result<String> {
    formatx!(template, results_key)
        .map_err(|error| anyhow!("could not build result file name from template: {error}"))
}

impl Output for FileOutput {
    fn writer_for_results_key(&self, results_key: &str) -> anyhow::Result<Option<impl Write>> {
        let file_name = format_file_name(&self.file_template, results_key)?;
        let file = File::create(self.directory_path.join(file_name))?;
        Ok(Some(BufWriter::new(file)))
    }
}

/// Discards every result file; calculations still run and return their
/// values.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_results_key(&self, _results_key: &str) -> anyhow::Result<Option<impl Write>> {
        Ok(None::<std::io::Sink>)
    }
}
