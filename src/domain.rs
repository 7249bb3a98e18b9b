use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::GdmError;

/// A `table:path[:display_name]` specifier from the `add` command line.
///
/// A literal colon inside a field is written `\:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSpec {
    pub table: String,
    pub path: String,
    pub name: Option<String>,
}

const COLON_SENTINEL: &str = "\u{1}";

impl FromStr for DataSpec {
    type Err = GdmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let escaped = value.replace("\\:", COLON_SENTINEL);
        let fields = escaped
            .split(':')
            .map(|field| field.replace(COLON_SENTINEL, ":"))
            .collect::<Vec<_>>();

        if fields.len() < 2 || fields.len() > 3 {
            return Err(GdmError::InvalidSpec(value.to_string()));
        }

        Ok(Self {
            table: fields[0].clone(),
            path: fields[1].clone(),
            name: fields.get(2).cloned(),
        })
    }
}

impl fmt::Display for DataSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{}:{}", self.table, self.path, name),
            None => write!(f, "{}:{}", self.table, self.path),
        }
    }
}

/// Short aliases accepted in place of the canonical remote table names.
pub fn resolve_table_synonym(name: &str) -> &str {
    match name {
        "fasta" => "all_fasta",
        "bowtie" => "bowtie_indexes",
        "bowtie2" => "bowtie2_indexes",
        "bwa" => "bwa_indexes",
        "bwa_mem" => "bwa_mem_indexes",
        "tophat2" => "tophat2_indexes",
        "star" => "rnastar_index2x_versioned",
        other => other,
    }
}

/// A slash-separated folder path inside a data library, normalized to its
/// non-empty segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPath(Vec<String>);

impl FolderPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for FolderPath {
    type Err = GdmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut segments: Vec<String> = Vec::new();
        for segment in value.split('/') {
            match segment {
                "" | "." => {}
                // Collapsed during parsing so no folder is ever named '..'.
                ".." => {
                    segments.pop();
                }
                other => segments.push(other.to_string()),
            }
        }
        Ok(Self(segments))
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

/// Identifier pair for an in-flight asynchronous Galaxy operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub dataset_id: String,
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum FastaSortingMethod {
    #[default]
    AsIs,
    Lexicographical,
    Gatk,
    Custom,
}

impl fmt::Display for FastaSortingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            FastaSortingMethod::AsIs => "as_is",
            FastaSortingMethod::Lexicographical => "lexicographical",
            FastaSortingMethod::Gatk => "gatk",
            FastaSortingMethod::Custom => "custom",
        };
        write!(f, "{value}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum CustomSortHandling {
    #[default]
    Discard,
    KeepAppend,
    KeepPrepend,
}

impl fmt::Display for CustomSortHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            CustomSortHandling::Discard => "discard",
            CustomSortHandling::KeepAppend => "keep_append",
            CustomSortHandling::KeepPrepend => "keep_prepend",
        };
        write!(f, "{value}")
    }
}
