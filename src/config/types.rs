use scdloop_edit::EditOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub edit: EditConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EditConfig {
    /// Point the sound entry's loop byte fields at the new Vorbis loop
    /// (default: true)
    #[serde(default = "default_sync_vorbis_header")]
    pub sync_vorbis_header: bool,

    /// Leave the `.scdloop-backup` file next to the original when a write
    /// is rolled back
    #[serde(default)]
    pub keep_backup_on_failure: bool,
}

fn default_sync_vorbis_header() -> bool {
    true
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            sync_vorbis_header: default_sync_vorbis_header(),
            keep_backup_on_failure: false,
        }
    }
}

impl EditConfig {
    pub fn options(&self) -> EditOptions {
        EditOptions {
            sync_vorbis_header: self.sync_vorbis_header,
            keep_backup_on_failure: self.keep_backup_on_failure,
            ..EditOptions::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Print reports as JSON without needing `--json`
    #[serde(default)]
    pub json: bool,
}
