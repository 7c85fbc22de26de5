//! routines init command implementation
//!
//! Creates the data directory, its `routines.toml`, and the storage layout
//! for the chosen backend.

use std::path::PathBuf;

use crate::config::{BackendKind, CONFIG_FILE};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::tracker::Tracker;

pub struct InitOptions {
    pub backend: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct InitReport {
    data_dir: PathBuf,
    config: PathBuf,
    backend: BackendKind,
    created: bool,
}

pub fn run(options: InitOptions) -> Result<()> {
    let backend = options
        .backend
        .as_deref()
        .map(str::parse::<BackendKind>)
        .transpose()?;
    let data_dir = match options.data_dir {
        Some(dir) => dir,
        None => Tracker::default_data_dir()?,
    };

    let config_path = data_dir.join(CONFIG_FILE);
    let created = !config_path.exists();
    let tracker = Tracker::init(&data_dir, backend)?;

    let report = InitReport {
        data_dir: data_dir.clone(),
        config: config_path,
        backend: tracker.config().storage.backend,
        created,
    };

    let header = if created {
        "routines init: initialized data directory"
    } else {
        "routines init: already initialized"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("data dir", data_dir.display().to_string());
    human.push_summary("backend", format!("{:?}", report.backend).to_lowercase());
    human.push_next_step("routines new <name> --task <task> --task <task>");

    emit_success(options.output, "init", &report, Some(&human))
}
