//! Read-only resource and project directories.
//!
//! The scheduler never owns staff, equipment, or project records. It reads
//! them through [`ResourceCatalog`] and [`ProjectDirectory`], which a
//! deployment can back by anything. [`StaticCatalog`] serves both from a
//! TOML file loaded at startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use crewboard_id::{ProjectId, ResourceId};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::model::{
    EquipmentUnit, Money, Project, ProjectStatus, RateCard, Resource, StaffMember,
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate resource id: {0}")]
    DuplicateResource(ResourceId),

    #[error("duplicate project id: {0}")]
    DuplicateProject(ProjectId),

    #[error("resource {0} has a negative rate")]
    NegativeRate(ResourceId),

    #[error("resource {0} has a rate above the hourly cap")]
    RateTooHigh(ResourceId),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Highest hourly rate a catalog entry may carry.
pub const MAX_HOURLY_RATE: Money = Money::from_major(1_000_000);

/// Source of staff and equipment records.
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    async fn list_resources(&self) -> Result<Vec<Resource>, CatalogError>;

    async fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>, CatalogError>;
}

/// Source of project records.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, CatalogError>;

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, CatalogError>;
}

/// In-memory catalog serving both directories.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    resources: BTreeMap<ResourceId, Resource>,
    projects: BTreeMap<ProjectId, Project>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.insert(resource.id(), resource);
        self
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.insert(project.id, project);
        self
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn from_toml_str(input: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(input)?;
        file.into_catalog()
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let input = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_toml_str(&input)?;

        info!(
            path = %path.display(),
            resources = catalog.resource_count(),
            projects = catalog.project_count(),
            "Loaded catalog"
        );

        Ok(catalog)
    }
}

#[async_trait]
impl ResourceCatalog for StaticCatalog {
    async fn list_resources(&self) -> Result<Vec<Resource>, CatalogError> {
        Ok(self.resources.values().cloned().collect())
    }

    async fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>, CatalogError> {
        Ok(self.resources.get(&id).cloned())
    }
}

#[async_trait]
impl ProjectDirectory for StaticCatalog {
    async fn list_projects(&self) -> Result<Vec<Project>, CatalogError> {
        Ok(self.projects.values().cloned().collect())
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, CatalogError> {
        Ok(self.projects.get(&id).cloned())
    }
}

// =============================================================================
// File format
// =============================================================================

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    staff: Vec<StaffEntry>,
    #[serde(default)]
    equipment: Vec<EquipmentEntry>,
    #[serde(default)]
    projects: Vec<ProjectEntry>,
}

/// Rates in the file are minor units per hour. Overtime defaults to base.
#[derive(Debug, Deserialize)]
struct RateEntry {
    base_rate: i64,
    overtime1_rate: Option<i64>,
    overtime2_rate: Option<i64>,
}

impl RateEntry {
    fn into_rates(self) -> RateCard {
        RateCard {
            base: Money::from_minor(self.base_rate),
            overtime1: Money::from_minor(self.overtime1_rate.unwrap_or(self.base_rate)),
            overtime2: Money::from_minor(self.overtime2_rate.unwrap_or(self.base_rate)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StaffEntry {
    id: ResourceId,
    name: String,
    #[serde(default)]
    role: String,
    #[serde(flatten)]
    rates: RateEntry,
}

#[derive(Debug, Deserialize)]
struct EquipmentEntry {
    id: ResourceId,
    name: String,
    #[serde(default)]
    category: String,
    #[serde(flatten)]
    rates: RateEntry,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    id: ProjectId,
    name: String,
    #[serde(default)]
    status: ProjectStatus,
    site: Option<String>,
}

impl CatalogFile {
    fn into_catalog(self) -> Result<StaticCatalog, CatalogError> {
        let staff = self.staff.into_iter().map(|s| {
            Resource::Staff(StaffMember {
                id: s.id,
                name: s.name,
                role: s.role,
                rates: s.rates.into_rates(),
            })
        });
        let equipment = self.equipment.into_iter().map(|e| {
            Resource::Equipment(EquipmentUnit {
                id: e.id,
                name: e.name,
                category: e.category,
                rates: e.rates.into_rates(),
            })
        });

        let mut catalog = StaticCatalog::new();
        for resource in staff.chain(equipment) {
            let id = resource.id();
            if resource.rates().has_negative_rate() {
                return Err(CatalogError::NegativeRate(id));
            }
            if resource.rates().exceeds(MAX_HOURLY_RATE) {
                return Err(CatalogError::RateTooHigh(id));
            }
            if catalog.resources.insert(id, resource).is_some() {
                return Err(CatalogError::DuplicateResource(id));
            }
        }

        for entry in self.projects {
            let project = Project {
                id: entry.id,
                name: entry.name,
                status: entry.status,
                site: entry.site,
            };
            if catalog.projects.insert(project.id, project).is_some() {
                return Err(CatalogError::DuplicateProject(entry.id));
            }
        }

        Ok(catalog)
    }
}
