#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use galaxy_data_manager::error::GdmError;
use galaxy_data_manager::galaxy::{
    DataTableInfo, DataTableSummary, DatasetState, DatasetStatus, GalaxyClient, JobDetails,
    Library, LibraryContent, ObjectRef, Role, ToolRunResponse,
};

#[derive(Debug, Clone)]
pub struct MockTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct MockLibrary {
    pub id: String,
    pub name: String,
    pub deleted: bool,
    pub root_folder_id: String,
    /// (id, full path name, content type)
    pub contents: Vec<(String, String, String)>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub tables: BTreeMap<String, MockTable>,
    pub libraries: Vec<MockLibrary>,
    /// (id, name)
    pub roles: Vec<(String, String)>,
    pub reloaded: Vec<String>,
    /// (library id, folder id, path, file type)
    pub uploads: Vec<(String, String, String, String)>,
    /// (library id, access role ids)
    pub permission_sets: Vec<(String, Vec<String>)>,
    pub tool_runs: Vec<String>,
    pub fail_next_job: bool,
    next_id: usize,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }
}

/// In-memory Galaxy server: applies data-manager tool invocations to its own
/// tables so orchestration round trips can be asserted end to end.
#[derive(Default)]
pub struct MockGalaxy {
    pub state: Mutex<MockState>,
}

impl MockGalaxy {
    /// The tables a stock Galaxy instance with the usual aligner data
    /// managers would expose.
    pub fn with_standard_tables() -> Self {
        let mock = Self::default();
        {
            let mut state = mock.state.lock().unwrap();
            let mut add = |name: &str, columns: &[&str]| {
                state.tables.insert(
                    name.to_string(),
                    MockTable {
                        columns: columns.iter().map(|col| col.to_string()).collect(),
                        rows: Vec::new(),
                    },
                );
            };
            add("__dbkeys__", &["value", "name", "len_path"]);
            add("all_fasta", &["value", "dbkey", "name", "path"]);
            add("bowtie2_indexes", &["value", "dbkey", "name", "path"]);
            add("bwa_indexes", &["value", "dbkey", "name", "path"]);
            add("blastdb", &["value", "name", "path"]);
            // The server reports a phantom 'name' column for twobit.
            add("twobit", &["value", "path", "name"]);
            add(
                "rnastar_index2x_versioned",
                &["value", "dbkey", "name", "path", "with_gene_model", "version"],
            );
        }
        mock
    }

    pub fn add_library(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("lib");
        let root = state.next_id("F");
        state.libraries.push(MockLibrary {
            id: id.clone(),
            name: name.to_string(),
            deleted: false,
            root_folder_id: root.clone(),
            contents: vec![(root, "/".to_string(), "folder".to_string())],
        });
        id
    }

    pub fn add_role(&self, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.roles.push((id.to_string(), name.to_string()));
    }

    pub fn seed_row(&self, table: &str, row: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state
            .tables
            .get_mut(table)
            .expect("seeded table exists")
            .rows
            .push(row.iter().map(|cell| cell.to_string()).collect());
    }

    pub fn table_rows(&self, table: &str) -> Vec<Vec<String>> {
        let state = self.state.lock().unwrap();
        state.tables[table].rows.clone()
    }

    pub fn fail_next_job(&self) {
        self.state.lock().unwrap().fail_next_job = true;
    }

    fn apply_manual_dm(state: &mut MockState, inputs: &BTreeMap<String, String>) {
        let mut entry = 0usize;
        loop {
            let Some(table) = inputs.get(&format!("data_tables_{entry}|data_table_name")) else {
                break;
            };
            let mut values: BTreeMap<String, String> = BTreeMap::new();
            let mut column = 0usize;
            while let Some(name) =
                inputs.get(&format!("data_tables_{entry}|columns_{column}|data_table_column_name"))
            {
                let value = inputs
                    .get(&format!(
                        "data_tables_{entry}|columns_{column}|data_table_column_value"
                    ))
                    .cloned()
                    .unwrap_or_default();
                values.insert(name.clone(), value);
                column += 1;
            }

            if let Some(table) = state.tables.get_mut(table) {
                let row = table
                    .columns
                    .iter()
                    .map(|col| values.get(col).cloned().unwrap_or_default())
                    .collect();
                table.rows.push(row);
            }
            entry += 1;
        }
    }

    fn apply_fetch_genome(state: &mut MockState, inputs: &BTreeMap<String, String>) {
        let dbkey = inputs
            .get("dbkey_source|dbkey")
            .cloned()
            .unwrap_or_default();
        let dbkey_name = inputs
            .get("dbkey_source|dbkey_name")
            .cloned()
            .unwrap_or_default();
        let sequence_name = inputs.get("sequence_name").cloned().unwrap_or_default();

        if let Some(table) = state.tables.get_mut("__dbkeys__") {
            table.rows.push(vec![
                dbkey.clone(),
                dbkey_name,
                format!("/galaxy/tool-data/{dbkey}/len/{dbkey}.len"),
            ]);
        }
        if let Some(table) = state.tables.get_mut("all_fasta") {
            table.rows.push(vec![
                dbkey.clone(),
                dbkey.clone(),
                sequence_name,
                format!("/galaxy/tool-data/{dbkey}/seq/{dbkey}.fa"),
            ]);
        }
    }
}

impl GalaxyClient for MockGalaxy {
    fn get_data_tables(&self) -> Result<Vec<DataTableSummary>, GdmError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tables
            .keys()
            .map(|name| DataTableSummary { name: name.clone() })
            .collect())
    }

    fn show_data_table(&self, name: &str) -> Result<DataTableInfo, GdmError> {
        let state = self.state.lock().unwrap();
        let table = state
            .tables
            .get(name)
            .ok_or_else(|| GdmError::GalaxyStatus {
                status: 404,
                message: format!("no table {name}"),
            })?;
        Ok(DataTableInfo {
            columns: table.columns.clone(),
            fields: table.rows.clone(),
        })
    }

    fn delete_table_entry(&self, table: &str, values: &str) -> Result<(), GdmError> {
        let mut state = self.state.lock().unwrap();
        if let Some(table) = state.tables.get_mut(table) {
            table.rows.retain(|row| row.join("\t") != values);
        }
        Ok(())
    }

    fn reload_data_table(&self, name: &str) -> Result<(), GdmError> {
        let mut state = self.state.lock().unwrap();
        state.reloaded.push(name.to_string());
        Ok(())
    }

    fn get_libraries(&self) -> Result<Vec<Library>, GdmError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .libraries
            .iter()
            .map(|lib| Library {
                id: lib.id.clone(),
                name: lib.name.clone(),
                deleted: lib.deleted,
                root_folder_id: Some(lib.root_folder_id.clone()),
            })
            .collect())
    }

    fn create_library(
        &self,
        name: &str,
        _description: &str,
        _synopsis: &str,
    ) -> Result<Library, GdmError> {
        let id = self.add_library(name);
        let state = self.state.lock().unwrap();
        let lib = state.libraries.iter().find(|lib| lib.id == id).unwrap();
        Ok(Library {
            id: lib.id.clone(),
            name: lib.name.clone(),
            deleted: false,
            root_folder_id: Some(lib.root_folder_id.clone()),
        })
    }

    fn show_library(&self, library_id: &str) -> Result<Library, GdmError> {
        let state = self.state.lock().unwrap();
        let lib = state
            .libraries
            .iter()
            .find(|lib| lib.id == library_id)
            .ok_or_else(|| GdmError::GalaxyStatus {
                status: 404,
                message: format!("no library {library_id}"),
            })?;
        Ok(Library {
            id: lib.id.clone(),
            name: lib.name.clone(),
            deleted: lib.deleted,
            root_folder_id: Some(lib.root_folder_id.clone()),
        })
    }

    fn get_library_contents(&self, library_id: &str) -> Result<Vec<LibraryContent>, GdmError> {
        let state = self.state.lock().unwrap();
        let lib = state
            .libraries
            .iter()
            .find(|lib| lib.id == library_id)
            .ok_or_else(|| GdmError::GalaxyStatus {
                status: 404,
                message: format!("no library {library_id}"),
            })?;
        Ok(lib
            .contents
            .iter()
            .map(|(id, name, content_type)| LibraryContent {
                id: id.clone(),
                name: name.clone(),
                content_type: content_type.clone(),
            })
            .collect())
    }

    fn create_folder(
        &self,
        library_id: &str,
        name: &str,
        base_folder_id: Option<&str>,
    ) -> Result<LibraryContent, GdmError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("F");
        let lib = state
            .libraries
            .iter_mut()
            .find(|lib| lib.id == library_id)
            .ok_or_else(|| GdmError::GalaxyStatus {
                status: 404,
                message: format!("no library {library_id}"),
            })?;
        let parent_path = match base_folder_id {
            None => String::new(),
            Some(parent) => {
                let path = lib
                    .contents
                    .iter()
                    .find(|(id, _, content_type)| id == parent && content_type == "folder")
                    .map(|(_, name, _)| name.clone())
                    .unwrap_or_default();
                if path == "/" { String::new() } else { path }
            }
        };
        let full_path = format!("{parent_path}/{name}");
        lib.contents
            .push((id.clone(), full_path.clone(), "folder".to_string()));
        Ok(LibraryContent {
            id,
            name: full_path,
            content_type: "folder".to_string(),
        })
    }

    fn delete_folder(&self, folder_id: &str) -> Result<(), GdmError> {
        let mut state = self.state.lock().unwrap();
        for lib in &mut state.libraries {
            let Some(path) = lib
                .contents
                .iter()
                .find(|(id, _, _)| id == folder_id)
                .map(|(_, name, _)| name.clone())
            else {
                continue;
            };
            let prefix = format!("{path}/");
            lib.contents
                .retain(|(id, name, _)| id != folder_id && !name.starts_with(&prefix));
        }
        Ok(())
    }

    fn delete_library(&self, library_id: &str) -> Result<(), GdmError> {
        let mut state = self.state.lock().unwrap();
        for lib in &mut state.libraries {
            if lib.id == library_id {
                lib.deleted = true;
            }
        }
        Ok(())
    }

    fn delete_library_dataset(&self, library_id: &str, dataset_id: &str) -> Result<(), GdmError> {
        let mut state = self.state.lock().unwrap();
        for lib in &mut state.libraries {
            if lib.id == library_id {
                lib.contents.retain(|(id, _, _)| id != dataset_id);
            }
        }
        Ok(())
    }

    fn upload_file_from_server(
        &self,
        library_id: &str,
        folder_id: &str,
        path: &str,
        file_type: &str,
    ) -> Result<(), GdmError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("ds");
        state.uploads.push((
            library_id.to_string(),
            folder_id.to_string(),
            path.to_string(),
            file_type.to_string(),
        ));
        let lib = state
            .libraries
            .iter_mut()
            .find(|lib| lib.id == library_id)
            .ok_or_else(|| GdmError::GalaxyStatus {
                status: 404,
                message: format!("no library {library_id}"),
            })?;
        let folder_path = lib
            .contents
            .iter()
            .find(|(id, _, content_type)| id == folder_id && content_type == "folder")
            .map(|(_, name, _)| name.clone())
            .unwrap_or_default();
        let folder_path = if folder_path == "/" {
            String::new()
        } else {
            folder_path
        };
        let base = path.rsplit('/').next().unwrap_or(path);
        lib.contents
            .push((id, format!("{folder_path}/{base}"), "file".to_string()));
        Ok(())
    }

    fn set_library_permissions(
        &self,
        library_id: &str,
        access_role_ids: &[String],
    ) -> Result<(), GdmError> {
        let mut state = self.state.lock().unwrap();
        state
            .permission_sets
            .push((library_id.to_string(), access_role_ids.to_vec()));
        Ok(())
    }

    fn get_roles(&self) -> Result<Vec<Role>, GdmError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .roles
            .iter()
            .map(|(id, name)| Role {
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }

    fn run_tool(
        &self,
        tool_id: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<ToolRunResponse, GdmError> {
        let mut state = self.state.lock().unwrap();
        state.tool_runs.push(tool_id.to_string());

        if !state.fail_next_job {
            if tool_id.contains("data_manager_manual") {
                Self::apply_manual_dm(&mut state, inputs);
            } else if tool_id.contains("fetch_genome") {
                Self::apply_fetch_genome(&mut state, inputs);
            }
        }

        let dataset = state.next_id("hda");
        let job = state.next_id("job");
        Ok(ToolRunResponse {
            outputs: vec![ObjectRef { id: dataset }],
            jobs: vec![ObjectRef { id: job }],
        })
    }

    fn show_dataset(&self, _dataset_id: &str) -> Result<DatasetStatus, GdmError> {
        let state = self.state.lock().unwrap();
        let terminal = if state.fail_next_job {
            DatasetState::Error
        } else {
            DatasetState::Ok
        };
        Ok(DatasetStatus { state: terminal })
    }

    fn show_job(&self, _job_id: &str) -> Result<JobDetails, GdmError> {
        Ok(JobDetails {
            stdout: "tool stdout".to_string(),
            stderr: "tool stderr".to_string(),
        })
    }
}
