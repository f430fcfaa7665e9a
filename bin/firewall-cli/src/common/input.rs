//! Input and output helpers.

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::Result;

/// Reads a file, or stdin if the path is a dash (-).
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

/// Reads and parses a JSON document from a file or stdin.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!(path = %path.display(), "Loading JSON input");
    Ok(serde_json::from_str(&read_input(path)?)?)
}

/// Writes `value` as pretty-printed JSON to `output`, or to stdout if no file is given.
pub fn write_json<T: Serialize>(value: &T, output: Option<&PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            debug!(path = %path.display(), "Writing JSON output");
            fs::write(path, json)?;
        }
        None => println!("{json}"),
    }
    Ok(())
}
