use std::collections::BTreeMap;
use std::time::Duration;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    CustomSortHandling, DataSpec, FastaSortingMethod, FolderPath, PendingOperation,
    resolve_table_synonym,
};
use crate::error::GdmError;
use crate::fs_util::{SourceOptions, resolve_source, resolve_sources};
use crate::galaxy::{DatasetState, GalaxyClient, ToolRunResponse};
use crate::wait::{WaitConfig, await_terminal};

pub const DBKEYS_TABLE: &str = "__dbkeys__";

const FETCH_GENOME_TOOL_ID: &str = "toolshed.g2.bx.psu.edu/repos/devteam/data_manager_fetch_genome_dbkeys_all_fasta/data_manager_fetch_genome_all_fasta_dbkey/0.0.4";
const MANUAL_DM_TOOL_ID: &str =
    "toolshed.g2.bx.psu.edu/repos/iuc/data_manager_manual/data_manager_manual/0.0.2";

#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub dbkey: Option<String>,
    pub dbkey_display_name: Option<String>,
    pub genome_fasta: Option<String>,
    pub genome_fasta_name: Option<String>,
    pub fasta_sorting_method: FastaSortingMethod,
    pub fasta_custom_sort_list: Option<String>,
    pub fasta_custom_sort_handling: CustomSortHandling,
    pub star_with_gtf: bool,
    pub star_version: Option<String>,
    pub no_file_check: bool,
    pub no_biomaj_env: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    pub tables: Vec<String>,
    pub exact: bool,
}

#[derive(Debug, Clone)]
pub struct LibraryAddOptions {
    pub library: Option<String>,
    pub folder: FolderPath,
    pub roles: Vec<String>,
    pub description: String,
    pub synopsis: String,
    pub file_type: String,
    pub no_file_check: bool,
    pub replace: bool,
    pub no_biomaj_env: bool,
}

impl Default for LibraryAddOptions {
    fn default() -> Self {
        Self {
            library: None,
            folder: "/".parse().expect("root folder path"),
            roles: Vec::new(),
            description: String::new(),
            synopsis: String::new(),
            file_type: "auto".to_string(),
            no_file_check: false,
            replace: false,
            no_biomaj_env: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddResult {
    pub dbkey: Option<String>,
    pub created_dbkey: bool,
    pub fetched_genome: bool,
    pub rows: Vec<AddedRow>,
    pub reloaded_tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddedRow {
    pub table: String,
    pub value: String,
    pub name: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveResult {
    pub removed: Vec<RemovedRow>,
    pub reloaded_tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovedRow {
    pub table: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryAddResult {
    pub library: String,
    pub library_id: Option<String>,
    pub folder_id: Option<String>,
    pub uploaded: Vec<String>,
    pub replaced: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryRemoveResult {
    pub library: String,
    pub removed_folder: Option<String>,
    pub removed_library: bool,
}

/// One row to register, after spec parsing and name resolution.
#[derive(Debug, Clone)]
struct ResolvedEntry {
    table: String,
    path: Option<String>,
    name: String,
}

#[derive(Clone)]
pub struct App<G: GalaxyClient> {
    galaxy: G,
    wait: WaitConfig,
    settle_delay: Duration,
}

impl<G: GalaxyClient> App<G> {
    pub fn new(galaxy: G) -> Self {
        Self {
            galaxy,
            wait: WaitConfig::default(),
            // Reloading too soon after a mutation silently misses rows.
            settle_delay: Duration::from_secs(1),
        }
    }

    pub fn with_timing(galaxy: G, wait: WaitConfig, settle_delay: Duration) -> Self {
        Self {
            galaxy,
            wait,
            settle_delay,
        }
    }

    pub fn galaxy(&self) -> &G {
        &self.galaxy
    }

    /// Register one data table row per spec, creating the dbkey first when
    /// needed. All rows go through a single manual data-manager invocation.
    pub fn add(&self, specs: &[DataSpec], options: &AddOptions) -> Result<AddResult, GdmError> {
        let formats = self.table_formats()?;
        let source_options = SourceOptions {
            check_existence: !options.no_file_check,
            use_biomaj_env: !options.no_biomaj_env,
        };

        let mut entries = Vec::new();
        let mut table_counts: BTreeMap<String, usize> = BTreeMap::new();
        for spec in specs {
            let table = resolve_table_synonym(&spec.table).to_string();
            if !formats.contains_key(&table) {
                return Err(GdmError::UnknownTable(spec.table.clone()));
            }
            let path = resolve_source(&spec.path, source_options)?;
            *table_counts.entry(table.clone()).or_insert(0) += 1;
            entries.push((table, Some(path), spec.name.clone()));
        }

        let dbkey_entry = match &options.dbkey {
            Some(dbkey) => self.find_dbkey_entry(dbkey)?,
            None => None,
        };

        // A dbkey is needed when registering a full genome, when only the
        // dbkey itself is being added, or when any touched table keys its
        // rows by dbkey.
        let need_dbkey = options.genome_fasta.is_some()
            || specs.is_empty()
            || table_counts
                .keys()
                .any(|table| formats[table].iter().any(|col| col == "dbkey"));
        let create_dbkey = options.dbkey.is_some() && dbkey_entry.is_none() && need_dbkey;

        match (&options.dbkey, need_dbkey) {
            (Some(dbkey), _) if create_dbkey => info!("need to create the dbkey '{dbkey}'"),
            (Some(dbkey), _) if dbkey_entry.is_some() => {
                info!("the dbkey '{dbkey}' already exists")
            }
            (None, true) => return Err(GdmError::MissingDbkey),
            (None, false) => debug!("no dbkey given, none needed"),
            _ => {}
        }

        let dbkey_display_name = options.dbkey_display_name.clone().or_else(biomaj_bank_name);

        // Display-name precedence: explicit per-entry name, then the dbkey
        // display name, then the name of an existing remote dbkey entry,
        // then the dbkey itself, then the path's base filename.
        let default_name = dbkey_display_name
            .clone()
            .or_else(|| dbkey_entry.as_ref().and_then(|row| row.get(1).cloned()))
            .or_else(|| options.dbkey.clone());

        let mut resolved: Vec<ResolvedEntry> = entries
            .into_iter()
            .map(|(table, path, name)| {
                let name = name
                    .or_else(|| default_name.clone())
                    .or_else(|| path.as_deref().map(base_filename))
                    .unwrap_or_default();
                ResolvedEntry { table, path, name }
            })
            .collect();

        let mut fetched_genome = false;
        if let Some(genome_fasta) = &options.genome_fasta {
            // The fetch tool recreates the dbkey entry together with the len
            // file, so an existing entry has to go first.
            if !create_dbkey {
                if let Some(row) = &dbkey_entry {
                    info!("deleting the dbkey entry before recreating it (recomputes the len file)");
                    self.galaxy
                        .delete_table_entry(DBKEYS_TABLE, &row.join("\t"))?;
                }
            }

            let fasta_path = resolve_source(genome_fasta, source_options)?;
            let genome_name = options
                .genome_fasta_name
                .clone()
                .or_else(|| default_name.clone())
                .unwrap_or_default();
            info!("adding a new genome from fasta '{genome_name}' -> '{fasta_path}'");

            let request = FetchGenomeRequest {
                dbkey: options.dbkey.clone().unwrap_or_default(),
                dbkey_name: default_name.clone().unwrap_or_default(),
                sequence_name: genome_name,
                fasta_path,
                sorting_method: options.fasta_sorting_method,
                custom_sort_list: options.fasta_custom_sort_list.clone(),
                custom_sort_handling: options.fasta_custom_sort_handling,
            };
            let response = self
                .galaxy
                .run_tool(FETCH_GENOME_TOOL_ID, &request.into_params())?;
            let pending = pending_from(&response)?;
            self.wait_completion(&pending, true)?;
            fetched_genome = true;
        } else if create_dbkey {
            let dbkey = options.dbkey.clone().unwrap_or_default();
            info!("will create the dbkey '{dbkey}'");
            resolved.push(ResolvedEntry {
                table: DBKEYS_TABLE.to_string(),
                path: None,
                name: dbkey_display_name
                    .clone()
                    .or_else(|| options.dbkey.clone())
                    .unwrap_or_default(),
            });
            table_counts.insert(DBKEYS_TABLE.to_string(), 1);
        }

        let mut rows = Vec::new();
        if !resolved.is_empty() {
            let mut request = ManualDataManagerRequest::new();
            for entry in &resolved {
                match &entry.path {
                    Some(path) => info!(
                        "adding a new entry to table '{}': '{}' -> '{}'",
                        entry.table, entry.name, path
                    ),
                    None => info!(
                        "adding a new entry to table '{}': '{}' -> no path",
                        entry.table, entry.name
                    ),
                }

                let path = entry.path.clone().unwrap_or_default();
                // The unique value must not collide when several entries go
                // into the same table, so a random token is appended.
                let value = match (&options.dbkey, table_counts[&entry.table] == 1) {
                    (Some(dbkey), true) => dbkey.clone(),
                    (Some(dbkey), false) => format!("{dbkey}_{}", Uuid::new_v4()),
                    (None, _) => Uuid::new_v4().to_string(),
                };

                let mut sources: BTreeMap<&str, String> = BTreeMap::new();
                sources.insert("value", value.clone());
                sources.insert("dbkey", options.dbkey.clone().unwrap_or_default());
                sources.insert("name", entry.name.clone());
                sources.insert("path", path.clone());
                sources.insert("db_path", path.clone());
                sources.insert("url", path.clone());
                sources.insert("len_path", path.clone());
                let with_gtf = if options.star_with_gtf { "1" } else { "0" };
                sources.insert("with-gtf", with_gtf.to_string());
                sources.insert("with_gene_model", with_gtf.to_string());
                sources.insert(
                    "version",
                    options.star_version.clone().unwrap_or_else(|| "0".to_string()),
                );

                let columns = formats[&entry.table]
                    .iter()
                    .map(|col| {
                        let value = sources.get(col.as_str()).cloned().unwrap_or_else(|| {
                            warn!(
                                "no value source for column '{col}' in table '{}', \
                                 submitting it empty",
                                entry.table
                            );
                            String::new()
                        });
                        (col.clone(), value)
                    })
                    .collect();
                request.add_row(&entry.table, columns);

                rows.push(AddedRow {
                    table: entry.table.clone(),
                    value,
                    name: entry.name.clone(),
                    path: entry.path.clone(),
                });
            }

            let response = self.galaxy.run_tool(MANUAL_DM_TOOL_ID, &request.into_params())?;
            let pending = pending_from(&response)?;
            self.wait_completion(&pending, true)?;
        } else {
            debug!("no table entries to register");
        }

        std::thread::sleep(self.settle_delay);
        let mut reloaded_tables = Vec::new();
        for table in table_counts.keys() {
            info!("reloading table '{table}'");
            self.galaxy.reload_data_table(table)?;
            reloaded_tables.push(table.clone());
        }

        Ok(AddResult {
            dbkey: options.dbkey.clone(),
            created_dbkey: create_dbkey,
            fetched_genome,
            rows,
            reloaded_tables,
        })
    }

    /// Delete every row matching the dbkey from the target tables (all known
    /// tables by default), plus exact matches from `__dbkeys__`.
    pub fn remove(&self, dbkey: &str, options: &RemoveOptions) -> Result<RemoveResult, GdmError> {
        let mut tables = BTreeMap::new();
        for summary in self.galaxy.get_data_tables()? {
            let info = self.show_table_normalized(&summary.name)?;
            tables.insert(summary.name, info);
        }

        let tables_to_clean: Vec<String> = if options.tables.is_empty() {
            tables.keys().cloned().collect()
        } else {
            options
                .tables
                .iter()
                .map(|name| {
                    let resolved = resolve_table_synonym(name).to_string();
                    if tables.contains_key(&resolved) {
                        Ok(resolved)
                    } else {
                        Err(GdmError::UnknownTable(name.clone()))
                    }
                })
                .collect::<Result<_, _>>()?
        };

        info!(
            "will remove '{dbkey}' entries from tables: {}",
            tables_to_clean.join(", ")
        );

        let mut removed = Vec::new();

        // The dbkey table itself is always cleaned, by exact value match.
        if let Some(dbkeys) = tables.get(DBKEYS_TABLE) {
            if let Some(field) = dbkeys.columns.iter().position(|col| col == "value") {
                for row in &dbkeys.fields {
                    if row.get(field).map(String::as_str) == Some(dbkey) {
                        info!("deleting from '{DBKEYS_TABLE}' table");
                        self.galaxy.delete_table_entry(DBKEYS_TABLE, &row.join("\t"))?;
                        removed.push(RemovedRow {
                            table: DBKEYS_TABLE.to_string(),
                            value: dbkey.to_string(),
                        });
                    }
                }
            }
        }

        for table in &tables_to_clean {
            let table_info = &tables[table];
            let field = match table_info.columns.iter().position(|col| col == "dbkey") {
                Some(field) => field,
                None => match table_info.columns.iter().position(|col| col == "value") {
                    Some(field) => field,
                    None => continue,
                },
            };

            for row in &table_info.fields {
                // The server sometimes reports rows shorter than the schema.
                let Some(cell) = row.get(field) else {
                    continue;
                };
                let matched = if options.exact {
                    cell == dbkey
                } else {
                    cell.starts_with(dbkey)
                };
                if matched {
                    info!("deleting from '{table}' table");
                    self.galaxy.delete_table_entry(table, &row.join("\t"))?;
                    removed.push(RemovedRow {
                        table: table.clone(),
                        value: cell.clone(),
                    });
                }
            }
        }

        std::thread::sleep(self.settle_delay);
        info!("reloading tables");
        for table in &tables_to_clean {
            self.galaxy.reload_data_table(table)?;
        }

        Ok(RemoveResult {
            removed,
            reloaded_tables: tables_to_clean,
        })
    }

    /// Link files into a data library, creating the library and folder chain
    /// when missing.
    pub fn add_library(
        &self,
        sources: &[String],
        options: &LibraryAddOptions,
    ) -> Result<LibraryAddResult, GdmError> {
        let library_name = options
            .library
            .clone()
            .or_else(|| std::env::var("dbname").ok())
            .ok_or(GdmError::MissingLibraryName)?;

        if sources.is_empty() {
            info!("nothing to do");
            return Ok(LibraryAddResult {
                library: library_name,
                library_id: None,
                folder_id: None,
                uploaded: Vec::new(),
                replaced: Vec::new(),
            });
        }

        let source_options = SourceOptions {
            check_existence: !options.no_file_check,
            use_biomaj_env: !options.no_biomaj_env,
        };
        let sources = resolve_sources(sources, source_options)?;

        let role_ids = self.resolve_roles(&options.roles)?;

        info!("adding to data library '{library_name}'");
        let library_id = self.get_or_create_library(
            &library_name,
            &options.description,
            &options.synopsis,
        )?;

        info!("preparing folders in library '{library_name}'");
        let dest_folder = self.ensure_folder_tree(&library_id, &options.folder)?;

        let replaced =
            self.replace_existing(&library_id, &options.folder, &sources, options.replace)?;

        info!(
            "adding {} file(s) to the library '{library_name}'",
            sources.len()
        );
        let upload_folder = match &dest_folder {
            Some(id) => id.clone(),
            None => self.root_folder_id(&library_id)?,
        };
        for source in &sources {
            self.galaxy.upload_file_from_server(
                &library_id,
                &upload_folder,
                source,
                &options.file_type,
            )?;
            if !role_ids.is_empty() {
                // Non-additive: the whole library's access is overwritten.
                self.galaxy.set_library_permissions(&library_id, &role_ids)?;
            }
        }

        Ok(LibraryAddResult {
            library: library_name,
            library_id: Some(library_id),
            folder_id: dest_folder,
            uploaded: sources,
            replaced,
        })
    }

    /// Delete a folder from a library, or the whole library when no folder
    /// is given. Nothing is created on this path.
    pub fn remove_library(
        &self,
        library: &str,
        folder: Option<&FolderPath>,
    ) -> Result<LibraryRemoveResult, GdmError> {
        info!("removing from data library '{library}'");
        let library_id = self
            .find_library(library)?
            .ok_or_else(|| GdmError::LibraryNotFound(library.to_string()))?;

        match folder {
            Some(path) if !path.is_root() => {
                info!("looking for folder '{path}' in library '{library}'");
                let folder_id = self.find_folder_tree(&library_id, path)?;
                info!("removing folder '{path}' from the library '{library}'");
                self.galaxy.delete_folder(&folder_id)?;
                Ok(LibraryRemoveResult {
                    library: library.to_string(),
                    removed_folder: Some(path.to_string()),
                    removed_library: false,
                })
            }
            _ => {
                info!("removing the whole library '{library}'");
                self.galaxy.delete_library(&library_id)?;
                Ok(LibraryRemoveResult {
                    library: library.to_string(),
                    removed_folder: None,
                    removed_library: true,
                })
            }
        }
    }

    /// Block until the pending operation reaches a terminal state. On a
    /// terminal `error` with a known job, the job's captured output is
    /// surfaced in the failure.
    pub fn wait_completion(
        &self,
        pending: &PendingOperation,
        exit_on_error: bool,
    ) -> Result<DatasetState, GdmError> {
        let state = await_terminal(|| self.galaxy.show_dataset(&pending.dataset_id), &self.wait)?;

        if exit_on_error && state == DatasetState::Error {
            if let Some(job_id) = &pending.job_id {
                let details = self.galaxy.show_job(job_id)?;
                return Err(GdmError::JobFailed {
                    stdout: details.stdout,
                    stderr: details.stderr,
                });
            }
        }

        Ok(state)
    }

    fn table_formats(&self) -> Result<BTreeMap<String, Vec<String>>, GdmError> {
        let mut formats = BTreeMap::new();
        for summary in self.galaxy.get_data_tables()? {
            let info = self.show_table_normalized(&summary.name)?;
            formats.insert(summary.name, info.columns);
        }
        Ok(formats)
    }

    fn show_table_normalized(
        &self,
        name: &str,
    ) -> Result<crate::galaxy::DataTableInfo, GdmError> {
        let mut info = self.galaxy.show_data_table(name)?;
        // The twobit table has no 'name' column, but the server reports a
        // synthesized one because every table is supposed to have it.
        if name == "twobit" {
            info.columns.retain(|col| col != "name");
        }
        Ok(info)
    }

    fn find_dbkey_entry(&self, dbkey: &str) -> Result<Option<Vec<String>>, GdmError> {
        let dbkeys = self.galaxy.show_data_table(DBKEYS_TABLE)?;
        Ok(dbkeys
            .fields
            .into_iter()
            .find(|row| row.first().map(String::as_str) == Some(dbkey)))
    }

    fn resolve_roles(&self, roles: &[String]) -> Result<Vec<String>, GdmError> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }
        info!("checking roles");
        let remote: BTreeMap<String, String> = self
            .galaxy
            .get_roles()?
            .into_iter()
            .map(|role| (role.name, role.id))
            .collect();

        roles
            .iter()
            .map(|name| {
                remote
                    .get(name)
                    .cloned()
                    .ok_or_else(|| GdmError::RoleNotFound(name.clone()))
            })
            .collect()
    }

    fn find_library(&self, name: &str) -> Result<Option<String>, GdmError> {
        info!("looking for lib '{name}'");
        let libraries = self.galaxy.get_libraries()?;
        Ok(libraries
            .into_iter()
            .find(|lib| lib.name == name && !lib.deleted)
            .map(|lib| lib.id))
    }

    fn get_or_create_library(
        &self,
        name: &str,
        description: &str,
        synopsis: &str,
    ) -> Result<String, GdmError> {
        if let Some(id) = self.find_library(name)? {
            info!("found library '{name}'");
            return Ok(id);
        }
        info!("did not find library '{name}', creating it");
        let created = self.galaxy.create_library(name, description, synopsis)?;
        Ok(created.id)
    }

    fn root_folder_id(&self, library_id: &str) -> Result<String, GdmError> {
        self.galaxy
            .show_library(library_id)?
            .root_folder_id
            .ok_or_else(|| {
                GdmError::InvalidResponse(format!("library {library_id} has no root folder id"))
            })
    }

    /// Walk the folder path, reusing folders whose full accumulated path is
    /// already known and creating the unmatched suffix in order. Returns the
    /// id of the last folder, or `None` for the library root.
    fn ensure_folder_tree(
        &self,
        library_id: &str,
        path: &FolderPath,
    ) -> Result<Option<String>, GdmError> {
        let known = self.known_folders(library_id)?;

        let mut accumulated = String::new();
        let mut last_folder: Option<String> = None;
        let mut to_create = Vec::new();
        for segment in path.segments() {
            accumulated.push('/');
            accumulated.push_str(segment);
            match known.get(&accumulated) {
                Some(id) if to_create.is_empty() => {
                    debug!("found folder {segment}");
                    last_folder = Some(id.clone());
                }
                _ => {
                    debug!("did not find folder {segment}");
                    to_create.push(segment.clone());
                }
            }
        }

        for segment in to_create {
            match &last_folder {
                Some(parent) => info!("creating folder {segment} in folder {parent}"),
                None => info!("creating folder {segment} in root folder"),
            }
            let created =
                self.galaxy
                    .create_folder(library_id, &segment, last_folder.as_deref())?;
            last_folder = Some(created.id);
        }

        Ok(last_folder)
    }

    /// Like [`Self::ensure_folder_tree`] but failing on the first missing
    /// segment instead of creating it.
    fn find_folder_tree(&self, library_id: &str, path: &FolderPath) -> Result<String, GdmError> {
        let known = self.known_folders(library_id)?;

        let mut accumulated = String::new();
        let mut last_folder = None;
        for segment in path.segments() {
            accumulated.push('/');
            accumulated.push_str(segment);
            match known.get(&accumulated) {
                Some(id) => last_folder = Some(id.clone()),
                None => return Err(GdmError::FolderNotFound(segment.clone())),
            }
        }

        last_folder.ok_or_else(|| GdmError::FolderNotFound(path.to_string()))
    }

    /// Folders are addressed by their full slash-joined path as reported in
    /// the library contents listing.
    fn known_folders(&self, library_id: &str) -> Result<BTreeMap<String, String>, GdmError> {
        Ok(self
            .galaxy
            .get_library_contents(library_id)?
            .into_iter()
            .filter(|content| content.is_folder())
            .map(|content| (content.name, content.id))
            .collect())
    }

    /// Look for files already at the destination with the same base name.
    /// With `replace` they are deleted first; otherwise a duplicate copy is
    /// allowed.
    fn replace_existing(
        &self,
        library_id: &str,
        folder: &FolderPath,
        sources: &[String],
        replace: bool,
    ) -> Result<Vec<String>, GdmError> {
        let prefix = if folder.is_root() {
            String::new()
        } else {
            folder.to_string()
        };
        let expected: Vec<String> = sources
            .iter()
            .map(|source| format!("{prefix}/{}", base_filename(source)))
            .collect();

        let mut replaced = Vec::new();
        for content in self.galaxy.get_library_contents(library_id)? {
            if content.is_file() && expected.contains(&content.name) {
                if replace {
                    info!(
                        "{} already present in the data library: replacing it",
                        content.name
                    );
                    self.galaxy.delete_library_dataset(library_id, &content.id)?;
                    replaced.push(content.name);
                } else {
                    info!(
                        "{} already present in the data library: adding another copy",
                        content.name
                    );
                }
            }
        }
        Ok(replaced)
    }
}

/// `"$dbname ($remoterelease)"` when running under BioMAJ.
fn biomaj_bank_name() -> Option<String> {
    let dbname = std::env::var("dbname").ok()?;
    let release = std::env::var("remoterelease").ok()?;
    Some(format!("{dbname} ({release})"))
}

fn base_filename(path: &str) -> String {
    Utf8Path::new(path)
        .file_name()
        .unwrap_or(path)
        .to_string()
}

fn pending_from(response: &ToolRunResponse) -> Result<PendingOperation, GdmError> {
    let dataset_id = response
        .outputs
        .first()
        .map(|output| output.id.clone())
        .ok_or_else(|| GdmError::InvalidResponse("tool run returned no outputs".to_string()))?;
    Ok(PendingOperation {
        dataset_id,
        job_id: response.jobs.first().map(|job| job.id.clone()),
    })
}

/// Parameter builder for the fetch-genome data manager: registers a dbkey
/// and its full genome fasta, symlinked from the server filesystem.
#[derive(Debug, Clone)]
pub struct FetchGenomeRequest {
    pub dbkey: String,
    pub dbkey_name: String,
    pub sequence_name: String,
    pub fasta_path: String,
    pub sorting_method: FastaSortingMethod,
    pub custom_sort_list: Option<String>,
    pub custom_sort_handling: CustomSortHandling,
}

impl FetchGenomeRequest {
    pub fn into_params(self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert(
            "dbkey_source|dbkey_source_selector".to_string(),
            "new".to_string(),
        );
        params.insert("dbkey_source|dbkey".to_string(), self.dbkey);
        params.insert("dbkey_source|dbkey_name".to_string(), self.dbkey_name);
        params.insert("sequence_name".to_string(), self.sequence_name);
        params.insert(
            "reference_source|reference_source_selector".to_string(),
            "directory".to_string(),
        );
        params.insert(
            "reference_source|fasta_filename".to_string(),
            self.fasta_path,
        );
        params.insert(
            "reference_source|create_symlink".to_string(),
            "true".to_string(),
        );
        params.insert(
            "sorting|sort_selector".to_string(),
            self.sorting_method.to_string(),
        );
        if self.sorting_method == FastaSortingMethod::Custom {
            params.insert(
                "sorting|handle_not_listed|handle_not_listed_selector".to_string(),
                self.custom_sort_handling.to_string(),
            );
            for (index, identifier) in self
                .custom_sort_list
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .filter(|identifier| !identifier.is_empty())
                .enumerate()
            {
                params.insert(
                    format!("sorting|sequence_identifiers_{index}|identifier"),
                    identifier.to_string(),
                );
            }
        }
        params
    }
}

/// Parameter builder for the manual data manager: one batch covering every
/// table row, with per-row column name/value pairs.
#[derive(Debug, Clone, Default)]
pub struct ManualDataManagerRequest {
    params: BTreeMap<String, String>,
    rows: usize,
}

impl ManualDataManagerRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, table: &str, columns: Vec<(String, String)>) {
        let entry = self.rows;
        for (index, (name, value)) in columns.into_iter().enumerate() {
            self.params.insert(
                format!("data_tables_{entry}|columns_{index}|data_table_column_name"),
                name,
            );
            self.params.insert(
                format!("data_tables_{entry}|columns_{index}|data_table_column_value"),
                value,
            );
            self.params.insert(
                format!("data_tables_{entry}|columns_{index}|is_path|is_path_selector"),
                "no".to_string(),
            );
        }
        self.params.insert(
            format!("data_tables_{entry}|data_table_name"),
            table.to_string(),
        );
        self.rows += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn into_params(self) -> BTreeMap<String, String> {
        self.params
    }
}
