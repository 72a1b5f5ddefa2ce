use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use homeplan_core::document::{FloorPlan, FloorPlanDocument};
use homeplan_core::store::{FloorPlanCache, FloorPlanId, FloorPlanPersistence, StoreError};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("floor plan {0} not found")]
    NotFound(FloorPlanId),
    #[error("invalid floor plan id {0:?}")]
    InvalidId(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document {path:?}: {source}")]
    InvalidDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<IoError> for StoreError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::NotFound(id) => StoreError::NotFound(id.to_string()),
            other => StoreError::Backend {
                message: other.to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// 以目录存放平面文档，每份文档一个 `<floor_plan_id>.json`。
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 文档路径；标识为空或含路径分隔符时拒绝。
    pub fn path_for(&self, id: &FloorPlanId) -> Result<PathBuf, IoError> {
        let raw = id.as_str();
        if raw.is_empty()
            || raw == "."
            || raw == ".."
            || raw.contains(['/', '\\'])
        {
            return Err(IoError::InvalidId(raw.to_string()));
        }
        Ok(self.root.join(format!("{raw}.json")))
    }

    pub fn read(&self, id: &FloorPlanId) -> Result<FloorPlanDocument, IoError> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(IoError::NotFound(id.clone()));
        }
        let content = fs::read_to_string(&path).map_err(|source| IoError::ReadError {
            path: path.clone(),
            source,
        })?;
        let mut document: FloorPlanDocument =
            serde_json::from_str(&content).map_err(|source| IoError::InvalidDocument {
                path: path.clone(),
                source,
            })?;
        // 文件名即标识。
        document.floor_plan_id = id.clone();
        debug!(?path, groups = document.data.groups.len(), "已读取平面文档");
        Ok(document)
    }

    /// 整份写入。先写临时文件再改名，中途失败不会留下半截文档。
    pub fn write(&self, document: &FloorPlanDocument) -> Result<PathBuf, IoError> {
        let path = self.path_for(&document.floor_plan_id)?;
        fs::create_dir_all(&self.root).map_err(|source| IoError::WriteError {
            path: self.root.clone(),
            source,
        })?;
        let content = serde_json::to_string_pretty(document).map_err(|source| {
            IoError::InvalidDocument {
                path: path.clone(),
                source,
            }
        })?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, content).map_err(|source| IoError::WriteError {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| IoError::WriteError {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// 目录中全部文档的标识，按字典序。
    pub fn list(&self) -> Result<Vec<FloorPlanId>, IoError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|source| IoError::ReadError {
            path: self.root.clone(),
            source,
        })?;
        let mut ids: Vec<FloorPlanId> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(FloorPlanId::new)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl FloorPlanCache for JsonStore {
    fn load(&self, id: &FloorPlanId) -> Result<FloorPlanDocument, StoreError> {
        Ok(self.read(id)?)
    }
}

impl FloorPlanPersistence for JsonStore {
    /// 覆盖文档的 `data`；文档不存在时新建。
    fn update(&mut self, id: &FloorPlanId, data: FloorPlan) -> Result<(), StoreError> {
        let mut document = match self.read(id) {
            Ok(document) => document,
            Err(IoError::NotFound(_)) => FloorPlanDocument {
                floor_plan_id: id.clone(),
                name: String::new(),
                data: FloorPlan::default(),
            },
            Err(err) => return Err(err.into()),
        };
        document.data = data;
        let path = self.write(&document)?;
        info!(floor_plan = %id, ?path, "平面文档已保存");
        Ok(())
    }
}

/// 进程内存储，供演示与测试使用。
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    documents: BTreeMap<FloorPlanId, FloorPlanDocument>,
    updates: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: FloorPlanDocument) -> Self {
        let mut store = Self::new();
        store.insert(document);
        store
    }

    pub fn insert(&mut self, document: FloorPlanDocument) {
        self.documents
            .insert(document.floor_plan_id.clone(), document);
    }

    pub fn get(&self, id: &FloorPlanId) -> Option<&FloorPlanDocument> {
        self.documents.get(id)
    }

    /// 收到的持久化请求次数。
    #[inline]
    pub fn update_count(&self) -> usize {
        self.updates
    }
}

impl FloorPlanCache for MemoryStore {
    fn load(&self, id: &FloorPlanId) -> Result<FloorPlanDocument, StoreError> {
        self.documents
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

impl FloorPlanPersistence for MemoryStore {
    fn update(&mut self, id: &FloorPlanId, data: FloorPlan) -> Result<(), StoreError> {
        self.updates += 1;
        self.documents
            .entry(id.clone())
            .and_modify(|document| document.data = data.clone())
            .or_insert_with(|| FloorPlanDocument {
                floor_plan_id: id.clone(),
                name: String::new(),
                data,
            });
        Ok(())
    }
}
