//! Load `.pipekit.toml` from a directory (CLI only). The library takes its settings from
//! the pipe methods instead.

use serde::Deserialize;
use std::path::Path;

use crate::ScriptOpts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Deserialize)]
pub struct PipekitToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    stream: Option<bool>,
    verbose: Option<bool>,
    channel_cap: Option<usize>,
}

/// Parse config text. Unknown keys are ignored.
pub fn parse_pipekit_toml(text: &str) -> Result<PipekitToml, toml::de::Error> {
    toml::from_str(text)
}

/// Load the config file from `dir` if present. Returns None if missing or unreadable.
pub fn load_pipekit_toml(dir: &Path) -> Option<PipekitToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_pipekit_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $field:ident) => {
        if let Some(v) = $section.$field {
            $opts.$field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying flags.
pub fn apply_file_to_opts(file: &PipekitToml, opts: &mut ScriptOpts) {
    let settings = &file.settings;
    apply_file_opt!(settings, opts, stream);
    apply_file_opt!(settings, opts, verbose);
    if settings.channel_cap.is_some() {
        opts.channel_cap = settings.channel_cap;
    }
}
