use std::io::{self, Write};

use serde::Serialize;

use crate::app::{AddResult, LibraryAddResult, LibraryRemoveResult, RemoveResult};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_add(result: &AddResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_remove(result: &RemoveResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_library_add(result: &LibraryAddResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_library_remove(result: &LibraryRemoveResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
