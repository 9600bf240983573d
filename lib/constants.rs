//! Constants for plugin-index.
//!
//! File names, directory names and environment variables shared by the
//! indexer. Review these to ensure they match your repository layout.

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Manifest file that declares an integration's version.
pub const INTEGRATION_MANIFEST_FILE: &str = "manifest.json";

/// Manifest file that declares a platform's version.
pub const PLATFORM_MANIFEST_FILE: &str = "platform.json";

/// Folder holding integrations, both in the source tree and the index root.
pub const INTEGRATIONS_DIR: &str = "integrations";

/// Folder holding platforms, both in the source tree and the index root.
pub const PLATFORMS_DIR: &str = "platforms";

/// Sub-folder of a component's primary folder holding archived artifacts.
pub const VERSIONS_DIR: &str = "versions";

/// Suffix appended to artifact stems built for the dev branch.
pub const DEV_ARTIFACT_SUFFIX: &str = "_dev";

/// Extension used for in-progress files before they are renamed into place.
pub const TMP_EXT: &str = "tmp";

/// Default index file name, relative to the index root.
pub const DEFAULT_INDEX_FILE: &str = "index.json";

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "plugin-index.toml";

/// Environment variable pointing at a config file.
pub const CONFIG_PATH_ENV: &str = "PLUGIN_INDEX_CONFIG";

/// Per-component ignore file, gitignore syntax.
pub const INDEX_IGNORE_FILE: &str = ".indexignore";

/// Name under which the indexer stamps its own version into the index.
pub const TOOL_NAME: &str = env!("CARGO_PKG_NAME");

/// The indexer's own version.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
