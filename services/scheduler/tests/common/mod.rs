//! Shared fixtures for scheduler integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use crewboard_id::{ProjectId, ResourceId};
use crewboard_scheduler::{
    api,
    catalog::StaticCatalog,
    db::MemoryAllocationStore,
    model::{
        EquipmentUnit, Money, Project, ProjectStatus, RateCard, Resource, StaffMember,
    },
    scheduler::SchedulerService,
    state::AppState,
};
use tokio::net::TcpListener;

/// Staff member billed at 50.00/hr, so one nominal day is 400.00.
pub const STAFF_BASE_RATE: Money = Money::from_major(50);

pub struct Fixture {
    pub service: SchedulerService,
    pub store: Arc<MemoryAllocationStore>,
    pub staff: Resource,
    pub excavator: Resource,
    pub p1: Project,
    pub p2: Project,
    pub archived: Project,
}

impl Fixture {
    pub fn new() -> Self {
        let staff = Resource::Staff(StaffMember {
            id: ResourceId::new(),
            name: "Sam Ortega".to_string(),
            role: "Foreman".to_string(),
            rates: RateCard {
                base: STAFF_BASE_RATE,
                overtime1: Money::from_major(75),
                overtime2: Money::from_major(100),
            },
        });
        let excavator = Resource::Equipment(EquipmentUnit {
            id: ResourceId::new(),
            name: "Excavator 12".to_string(),
            category: "Earthmoving".to_string(),
            rates: RateCard::flat(Money::from_major(120)),
        });

        let p1 = project("Harbour Bridge");
        let p2 = project("Airport Terminal");
        let archived = Project {
            status: ProjectStatus::Archived,
            ..project("Old Depot")
        };

        let catalog = Arc::new(
            StaticCatalog::new()
                .with_resource(staff.clone())
                .with_resource(excavator.clone())
                .with_project(p1.clone())
                .with_project(p2.clone())
                .with_project(archived.clone()),
        );
        let store = Arc::new(MemoryAllocationStore::new());
        let service = SchedulerService::new(store.clone(), catalog.clone(), catalog);

        Self {
            service,
            store,
            staff,
            excavator,
            p1,
            p2,
            archived,
        }
    }
}

pub fn project(name: &str) -> Project {
    Project {
        id: ProjectId::new(),
        name: name.to_string(),
        status: ProjectStatus::Active,
        site: None,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crewboard_scheduler=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Serves the fixture's scheduler on an ephemeral port and returns its base
/// URL. The server lives until the test runtime shuts down.
pub async fn spawn_server(fx: &Fixture) -> String {
    let state = AppState::new(fx.service.clone(), "memory");
    let app = api::create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}
