use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::json;

use crate::error::GdmError;

#[derive(Debug, Clone, Deserialize)]
pub struct DataTableSummary {
    pub name: String,
}

/// Schema and current rows of one tool data table.
#[derive(Debug, Clone, Deserialize)]
pub struct DataTableInfo {
    pub columns: Vec<String>,
    #[serde(default)]
    pub fields: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Library {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub root_folder_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryContent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

impl LibraryContent {
    pub fn is_folder(&self) -> bool {
        self.content_type == "folder"
    }

    pub fn is_file(&self) -> bool {
        self.content_type == "file"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    pub id: String,
}

/// Response of a tool invocation: dataset and job identifiers to track.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRunResponse {
    #[serde(default)]
    pub outputs: Vec<ObjectRef>,
    #[serde(default)]
    pub jobs: Vec<ObjectRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetState {
    Ok,
    Error,
    #[serde(other)]
    Pending,
}

impl DatasetState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DatasetState::Ok | DatasetState::Error)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetStatus {
    pub state: DatasetState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobDetails {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// The remote surface this tool drives. Everything the orchestrators do goes
/// through this trait so tests can substitute an in-memory server.
pub trait GalaxyClient: Send + Sync {
    fn get_data_tables(&self) -> Result<Vec<DataTableSummary>, GdmError>;
    fn show_data_table(&self, name: &str) -> Result<DataTableInfo, GdmError>;
    /// Delete one row identified by its tab-joined column values.
    fn delete_table_entry(&self, table: &str, values: &str) -> Result<(), GdmError>;
    fn reload_data_table(&self, name: &str) -> Result<(), GdmError>;

    fn get_libraries(&self) -> Result<Vec<Library>, GdmError>;
    fn create_library(
        &self,
        name: &str,
        description: &str,
        synopsis: &str,
    ) -> Result<Library, GdmError>;
    fn show_library(&self, library_id: &str) -> Result<Library, GdmError>;
    fn get_library_contents(&self, library_id: &str) -> Result<Vec<LibraryContent>, GdmError>;
    fn create_folder(
        &self,
        library_id: &str,
        name: &str,
        base_folder_id: Option<&str>,
    ) -> Result<LibraryContent, GdmError>;
    fn delete_folder(&self, folder_id: &str) -> Result<(), GdmError>;
    fn delete_library(&self, library_id: &str) -> Result<(), GdmError>;
    fn delete_library_dataset(&self, library_id: &str, dataset_id: &str) -> Result<(), GdmError>;
    /// Link a file already present on the server filesystem into a folder.
    fn upload_file_from_server(
        &self,
        library_id: &str,
        folder_id: &str,
        path: &str,
        file_type: &str,
    ) -> Result<(), GdmError>;
    /// Overwrite the library's access permissions with the given role set.
    fn set_library_permissions(
        &self,
        library_id: &str,
        access_role_ids: &[String],
    ) -> Result<(), GdmError>;

    fn get_roles(&self) -> Result<Vec<Role>, GdmError>;

    fn run_tool(
        &self,
        tool_id: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<ToolRunResponse, GdmError>;
    fn show_dataset(&self, dataset_id: &str) -> Result<DatasetStatus, GdmError>;
    fn show_job(&self, job_id: &str) -> Result<JobDetails, GdmError>;
}

#[derive(Clone)]
pub struct GalaxyHttpClient {
    client: Client,
    base_url: String,
}

impl GalaxyHttpClient {
    pub fn new(url: &str, apikey: &str) -> Result<Self, GdmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("galaxy-dm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GdmError::Connection(err.to_string()))?,
        );
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(apikey).map_err(|err| GdmError::Connection(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| GdmError::Connection(err.to_string()))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, GdmError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(GdmError::Connection(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, GdmError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "Galaxy request failed".to_string());
        Err(GdmError::GalaxyStatus { status, message })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, GdmError> {
        let url = self.api_url(path);
        let response = self.send_with_retries(|| self.client.get(&url))?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| GdmError::InvalidResponse(err.to_string()))
    }

    fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<T, GdmError> {
        let url = self.api_url(path);
        let response = self.send_with_retries(|| self.client.post(&url).json(payload))?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| GdmError::InvalidResponse(err.to_string()))
    }

    fn delete_with_payload(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<(), GdmError> {
        let url = self.api_url(path);
        let response = self.send_with_retries(|| self.client.delete(&url).json(payload))?;
        Self::handle_status(response)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), GdmError> {
        let url = self.api_url(path);
        let response = self.send_with_retries(|| self.client.delete(&url))?;
        Self::handle_status(response)?;
        Ok(())
    }
}

impl GalaxyClient for GalaxyHttpClient {
    fn get_data_tables(&self) -> Result<Vec<DataTableSummary>, GdmError> {
        self.get_json("tool_data")
    }

    fn show_data_table(&self, name: &str) -> Result<DataTableInfo, GdmError> {
        self.get_json(&format!("tool_data/{name}"))
    }

    fn delete_table_entry(&self, table: &str, values: &str) -> Result<(), GdmError> {
        self.delete_with_payload(&format!("tool_data/{table}"), &json!({ "values": values }))
    }

    fn reload_data_table(&self, name: &str) -> Result<(), GdmError> {
        let _: serde_json::Value = self.get_json(&format!("tool_data/{name}/reload"))?;
        Ok(())
    }

    fn get_libraries(&self) -> Result<Vec<Library>, GdmError> {
        self.get_json("libraries?deleted=false")
    }

    fn create_library(
        &self,
        name: &str,
        description: &str,
        synopsis: &str,
    ) -> Result<Library, GdmError> {
        self.post_json(
            "libraries",
            &json!({
                "name": name,
                "description": description,
                "synopsis": synopsis,
            }),
        )
    }

    fn show_library(&self, library_id: &str) -> Result<Library, GdmError> {
        self.get_json(&format!("libraries/{library_id}"))
    }

    fn get_library_contents(&self, library_id: &str) -> Result<Vec<LibraryContent>, GdmError> {
        self.get_json(&format!("libraries/{library_id}/contents"))
    }

    fn create_folder(
        &self,
        library_id: &str,
        name: &str,
        base_folder_id: Option<&str>,
    ) -> Result<LibraryContent, GdmError> {
        let parent = match base_folder_id {
            Some(id) => id.to_string(),
            // The API wants an explicit parent, the library's root when none
            // has been created yet.
            None => self
                .show_library(library_id)?
                .root_folder_id
                .ok_or_else(|| {
                    GdmError::InvalidResponse(format!(
                        "library {library_id} has no root folder id"
                    ))
                })?,
        };
        let created: Vec<LibraryContent> = self.post_json(
            &format!("libraries/{library_id}/contents"),
            &json!({
                "create_type": "folder",
                "folder_id": parent,
                "name": name,
                "description": "",
            }),
        )?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| GdmError::InvalidResponse("folder creation returned nothing".into()))
    }

    fn delete_folder(&self, folder_id: &str) -> Result<(), GdmError> {
        self.delete_with_payload(&format!("folders/{folder_id}"), &json!({ "recursive": true }))
    }

    fn delete_library(&self, library_id: &str) -> Result<(), GdmError> {
        self.delete(&format!("libraries/{library_id}"))
    }

    fn delete_library_dataset(&self, library_id: &str, dataset_id: &str) -> Result<(), GdmError> {
        self.delete(&format!("libraries/{library_id}/contents/{dataset_id}"))
    }

    fn upload_file_from_server(
        &self,
        library_id: &str,
        folder_id: &str,
        path: &str,
        file_type: &str,
    ) -> Result<(), GdmError> {
        let _: serde_json::Value = self.post_json(
            &format!("libraries/{library_id}/contents"),
            &json!({
                "create_type": "file",
                "folder_id": folder_id,
                "upload_option": "upload_paths",
                "filesystem_paths": path,
                "link_data_only": "link_to_files",
                "file_type": file_type,
            }),
        )?;
        Ok(())
    }

    fn set_library_permissions(
        &self,
        library_id: &str,
        access_role_ids: &[String],
    ) -> Result<(), GdmError> {
        let _: serde_json::Value = self.post_json(
            &format!("libraries/{library_id}/permissions"),
            &json!({
                "action": "set_permissions",
                "access_ids[]": access_role_ids,
            }),
        )?;
        Ok(())
    }

    fn get_roles(&self) -> Result<Vec<Role>, GdmError> {
        self.get_json("roles")
    }

    fn run_tool(
        &self,
        tool_id: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<ToolRunResponse, GdmError> {
        self.post_json(
            "tools",
            &json!({
                "tool_id": tool_id,
                "history_id": serde_json::Value::Null,
                "inputs": inputs,
            }),
        )
    }

    fn show_dataset(&self, dataset_id: &str) -> Result<DatasetStatus, GdmError> {
        self.get_json(&format!("datasets/{dataset_id}"))
    }

    fn show_job(&self, job_id: &str) -> Result<JobDetails, GdmError> {
        self.get_json(&format!("jobs/{job_id}?full=true"))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
