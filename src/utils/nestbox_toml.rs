//! Load `.nestbox.toml` (CLI only). Lib users build [`Opts`] themselves.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::utils::config::PackagePaths;
use crate::{Opts, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NestboxToml {
    #[serde(default)]
    jobs: JobsSection,
    #[serde(default)]
    traversal: TraversalSection,
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobsSection {
    workers: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TraversalSection {
    recursive: Option<bool>,
    auto_single_archive: Option<bool>,
    all_entries: Option<bool>,
    max_depth: Option<usize>,
    max_fan_out: Option<usize>,
    allow_pre_extract: Option<bool>,
    pre_extract_limit: Option<u64>,
    exclude: Option<Vec<String>>,
    image_extensions: Option<Vec<String>>,
    archive_extensions: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsSection {
    verbose: Option<bool>,
    json: Option<bool>,
    temp_dir: Option<String>,
}

/// `.nestbox.toml` in `dir`.
pub fn default_config_path(dir: &Path) -> PathBuf {
    dir.join(PackagePaths::get().config_filename())
}

/// Parse the file at `path`. `Ok(None)` when it does not exist; malformed files are
/// [`Error::Config`].
pub fn load_nestbox_toml(path: &Path) -> Result<Option<NestboxToml>> {
    let s = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };
    toml::from_str(&s).map(Some).map_err(|e| Error::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $field:ident) => {
        if let Some(v) = $section.$field.clone() {
            $opts.$field = v;
        }
    };
    ($section:expr, $opts:expr, $field:ident => $($opts_field:ident).+) => {
        if let Some(v) = $section.$field.clone() {
            $opts.$($opts_field).+ = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI flags.
pub fn apply_file_to_opts(file: &NestboxToml, opts: &mut Opts) {
    apply_file_opt!(file.jobs, opts, workers);

    let t = &file.traversal;
    apply_file_opt!(t, opts, recursive => collect.recursive);
    apply_file_opt!(t, opts, auto_single_archive => collect.auto_single_archive);
    apply_file_opt!(t, opts, all_entries => collect.all_entries);
    apply_file_opt!(t, opts, max_depth => collect.max_depth);
    apply_file_opt!(t, opts, max_fan_out => collect.max_fan_out);
    apply_file_opt!(t, opts, allow_pre_extract => collect.allow_pre_extract);
    apply_file_opt!(t, opts, pre_extract_limit);
    apply_file_opt!(t, opts, exclude);
    apply_file_opt!(t, opts, image_extensions);
    apply_file_opt!(t, opts, archive_extensions);

    let s = &file.settings;
    apply_file_opt!(s, opts, verbose);
    apply_file_opt!(s, opts, json);
    if let Some(ref dir) = s.temp_dir {
        opts.temp_dir = Some(PathBuf::from(dir));
    }
}
