use std::fs::{create_dir_all, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn default_wait_timeout_secs() -> u64 {
    30
}

fn default_scan_max_depth() -> u8 {
    255
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Repositories to reset when the command line names none.
    #[serde(default)]
    pub repos: Vec<String>,
    // The index-diff tracker has no inherent bound on how long a diff may
    // take; this is ours. A repository whose diff never materializes fails
    // the run after this many seconds.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    /// How deep to look for repositories inside a plain directory argument.
    #[serde(default = "default_scan_max_depth")]
    pub scan_max_depth: u8,
}

impl Config {
    pub fn empty() -> Self {
        Self {
            repos: vec![],
            wait_timeout_secs: default_wait_timeout_secs(),
            scan_max_depth: default_scan_max_depth(),
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn default_path() -> PathBuf {
        Self::get_config_home().join("config.toml")
    }

    /// Location of all config. By default
    ///
    /// Linux   :   $XDG_CONFIG_HOME/ide-reset or $HOME/.config/ide-reset
    /// macOS   :   $HOME/Library/Application Support
    /// Windows :   %AppData%\Roaming\ide-reset
    ///
    /// This can be overridden by setting IDE_RESET_CONFIG_HOME environment variable.
    fn get_config_home() -> PathBuf {
        // The environment variable lets us run tests independently, but I'm sure someone will come
        // up with another reason to use it.
        if let Ok(env_var) = env::var("IDE_RESET_CONFIG_HOME") {
            if !env_var.is_empty() {
                return env_var.into();
            }
        }

        dirs::config_dir()
            .expect("Could not find your config directory. The default is ~/.config/ide-reset but it \
                can also be controlled by setting the IDE_RESET_CONFIG_HOME environment variable.")
            .join("ide-reset")
    }

    /// Load Config from default path
    pub fn load() -> Self {
        Self::load_file(Self::default_path().as_path()).unwrap_or_else(|_| Self::empty())
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;

        let res = toml::from_slice(buffer.as_slice())?;
        Ok(res)
    }

    /// Save config to disk in ~/.config/ide-reset/config.toml
    pub fn save(&self) {
        self.save_to_path(Self::default_path().as_path())
    }

    pub fn create_dir(path: &Path) {
        if let Some(dir) = path.parent() {
            create_dir_all(dir).unwrap_or_else(|_| {
                panic!(
                    "Failed to create directory at `{}`. \
                    ide-reset stores its configuration in `{}/config.toml`, \
                    where you can list the Git repositories it should reset by default.",
                    dir.display(),
                    path.display()
                )
            })
        }
    }

    /// Attempts to create parent dirs, serialize `self` as TOML and write to disk.
    pub fn save_to_path(&self, path: &Path) {
        Self::create_dir(path);

        let config_string = match toml::to_string(self) {
            Ok(v) => v,
            Err(e) => {
                println!("Unexpected error when serializing config: {e}");
                return;
            }
        };

        match fs::write(path, config_string) {
            Ok(_) => (),
            Err(e) => println!("Unable to write ide-reset config file: {e}"),
        }
    }

    pub fn set_watch(&mut self, path: String) {
        let abs_path = fs::canonicalize(path).expect("The provided path is not a directory");
        let abs_path = abs_path
            .to_str()
            .expect("The provided path is not valid unicode")
            .to_string();

        if self.repos.contains(&abs_path) {
            println!("{abs_path} is already in the default selection")
        } else {
            self.repos.push(abs_path.clone());
            println!("Added {abs_path} to the default selection")
        }
    }

    pub fn set_unwatch(&mut self, path: String) {
        let abs_path = fs::canonicalize(path).expect("The provided path is not a directory");
        let abs_path = abs_path
            .to_str()
            .expect("The provided path is not valid unicode")
            .to_string();

        match self.repos.iter().position(|r| r == &abs_path) {
            Some(idx) => {
                self.repos.remove(idx);
                println!("Removed {abs_path} from the default selection");
            }
            None => println!("{abs_path} is not in the default selection"),
        }
    }
}
