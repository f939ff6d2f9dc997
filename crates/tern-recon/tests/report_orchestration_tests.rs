//! End-to-end report orchestration tests over memory-backed stores.
//!
//! These exercise the full lifecycle: request normalization, the Pending
//! checkpoint, every comparison axis, progressive persistence, and terminal
//! status handling, without any network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tern_core::catalog::{AccessUrl, CatalogGranule, MetadataCatalog, TimeWindow, UrlRole};
use tern_core::index::GranuleFile;
use tern_core::inventory::FileRecord;
use tern_core::page::{FetchError, Page, PageToken};
use tern_core::{
    BucketMap, BucketVisibility, CollectionId, DistributionEndpoint, IndexGranule, MemoryCatalog,
    MemoryInventory, MemoryObjectStore, MemoryReportTracker, MemorySearchIndex, ObjectStore,
    ReportStatus, ReportTracker,
};
use tern_recon::{
    OrchestratorConfig, ReconError, ReconStores, ReconciliationReport, ReportOrchestrator,
    ReportRequest,
};

const DISTRIBUTION: &str = "https://data.example.org";

struct World {
    storage: Arc<MemoryObjectStore>,
    inventory: Arc<MemoryInventory>,
    catalog: Arc<MemoryCatalog>,
    index: Arc<MemorySearchIndex>,
    tracker: Arc<MemoryReportTracker>,
    buckets: BucketMap,
}

impl World {
    fn new() -> Self {
        Self {
            storage: Arc::new(MemoryObjectStore::new().with_page_size(2)),
            inventory: Arc::new(MemoryInventory::new().with_page_size(2)),
            catalog: Arc::new(MemoryCatalog::new().with_page_size(2)),
            index: Arc::new(MemorySearchIndex::new().with_page_size(2)),
            tracker: Arc::new(MemoryReportTracker::new()),
            buckets: BucketMap::new()
                .with_bucket("data-protected", BucketVisibility::Protected)
                .with_bucket("data-private", BucketVisibility::Private),
        }
    }

    /// Seeds a consistent world with one drifting entry per axis.
    fn seeded() -> Self {
        let world = Self::new();
        let at = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let collection = CollectionId::new("MOD09GQ", "006");

        // Storage vs inventory: `a` and `d` match, `b` is storage-only,
        // `c` is inventory-only.
        for key in ["a", "b", "d"] {
            world.storage.insert_object("data-protected", key);
        }
        for key in ["a", "c", "d"] {
            world
                .inventory
                .insert_file(FileRecord::new("data-protected", key, "g1"));
        }

        // Collections: MOD09GQ matches, Y is catalog-only, Z is index-only.
        world.catalog.insert_collection(collection.clone(), at);
        world
            .catalog
            .insert_collection(CollectionId::new("Y", "1"), at);
        world.index.insert_collection(collection.clone(), at);
        world
            .index
            .insert_collection(CollectionId::new("Z", "1"), at);

        // Granules of the matched collection: g1 matches (with files),
        // g2 is catalog-only, g3 is index-only.
        world.catalog.insert_granule(CatalogGranule {
            granule_id: "g1".to_string(),
            collection: collection.clone(),
            urls: vec![AccessUrl::new(
                format!("{DISTRIBUTION}/data-protected/g1/f1.hdf"),
                UrlRole::Download,
            )],
        });
        world.catalog.insert_granule(CatalogGranule {
            granule_id: "g2".to_string(),
            collection: collection.clone(),
            urls: Vec::new(),
        });
        world.index.insert_granule(IndexGranule {
            granule_id: "g1".to_string(),
            collection: collection.clone(),
            files: vec![
                GranuleFile::new("data-protected", "g1/f1.hdf", "f1.hdf"),
                GranuleFile::new("data-private", "g1/f2.met", "f2.met"),
            ],
        });
        world.index.insert_granule(IndexGranule {
            granule_id: "g3".to_string(),
            collection,
            files: Vec::new(),
        });

        world
    }

    fn orchestrator(&self) -> ReportOrchestrator {
        self.orchestrator_with(OrchestratorConfig::new("stacks/test"))
    }

    fn orchestrator_with(&self, config: OrchestratorConfig) -> ReportOrchestrator {
        ReportOrchestrator::new(
            ReconStores {
                storage: self.storage.clone(),
                inventory: self.inventory.clone(),
                catalog: self.catalog.clone(),
                index: self.index.clone(),
                tracker: self.tracker.clone(),
            },
            self.buckets.clone(),
            Arc::new(DistributionEndpoint::new(DISTRIBUTION)),
            config,
        )
    }

    async fn persisted(&self, location: &str) -> ReconciliationReport {
        let bytes = self.storage.get(location).await.expect("document persisted");
        serde_json::from_slice(&bytes).expect("document parses")
    }
}

fn request(report_type: &str) -> ReportRequest {
    ReportRequest {
        report_type: Some(report_type.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn inventory_report_covers_every_axis() {
    let world = World::seeded();
    let report = world
        .orchestrator()
        .create_report(request("Inventory"))
        .await
        .expect("report generates");

    assert_eq!(report.status, ReportStatus::Generated);
    assert!(report.create_end_time.is_some());
    assert!(report.error.is_none());

    let body = match &report.body {
        tern_recon::ReportBody::Inventory(body) => body,
        other => panic!("expected inventory body, got {other:?}"),
    };

    // Storage vs inventory: [a, b, d] vs [a, c, d].
    assert_eq!(body.storage_files.ok_count, 2);
    assert_eq!(body.storage_files.only_in_storage, vec!["data-protected/b"]);
    assert_eq!(body.storage_files.only_in_inventory.len(), 1);
    assert_eq!(
        body.storage_files.only_in_inventory[0].object_path,
        "data-protected/c"
    );
    assert_eq!(body.storage_files.ok_count_by_granule["g1"], 2);

    // Collections: MOD09GQ matches; Y catalog-only; Z index-only.
    assert_eq!(body.collections.ok_count, 1);
    assert_eq!(body.collections.only_in_catalog, vec!["Y___1"]);
    assert_eq!(body.collections.only_in_index, vec!["Z___1"]);

    // Granules of MOD09GQ: g1 matches; g2 catalog-only; g3 index-only.
    assert_eq!(body.granules.ok_count, 1);
    assert_eq!(body.granules.only_in_catalog[0].granule_id, "g2");
    assert_eq!(body.granules.only_in_index[0].granule_id, "g3");

    // Files of g1: f1 matched by URL, f2 private and legitimately absent.
    assert_eq!(body.access_urls.ok_count, 2);
    assert!(body.access_urls.only_in_catalog.is_empty());
    assert!(body.access_urls.only_in_index.is_empty());
    assert_eq!(body.access_urls.ok_count_by_granule["g1"], 2);
}

#[tokio::test]
async fn generated_report_is_persisted_and_tracked() {
    let world = World::seeded();
    let report = world
        .orchestrator()
        .create_report(request("Inventory"))
        .await
        .expect("report generates");

    let persisted = world.persisted(&report.location).await;
    assert_eq!(persisted, report);

    let record = world
        .tracker
        .get(&report.name)
        .await
        .expect("tracker readable")
        .expect("record exists");
    assert_eq!(record.status, ReportStatus::Generated);
    assert_eq!(record.location, report.location);
    assert!(record.error.is_none());
}

#[tokio::test]
async fn report_name_and_location_follow_the_naming_scheme() {
    let world = World::seeded();
    let report = world
        .orchestrator()
        .create_report(request("Granule Not Found"))
        .await
        .expect("report generates");

    assert!(report.name.starts_with("granuleNotFoundReport-"));
    assert_eq!(
        report.location,
        format!("stacks/test/reconciliation-reports/{}.json", report.name)
    );
}

#[tokio::test]
async fn one_way_report_never_lists_catalog_side_drift() {
    let world = World::seeded();
    let report = world
        .orchestrator()
        .create_report(request("Granule Not Found"))
        .await
        .expect("report generates");

    let body = match &report.body {
        tern_recon::ReportBody::GranuleNotFound(body) => body,
        other => panic!("expected granule-not-found body, got {other:?}"),
    };

    assert!(body.collections.only_in_catalog.is_empty());
    assert!(body.granules.only_in_catalog.is_empty());
    // Index-side drift is still reported.
    assert_eq!(body.collections.only_in_index, vec!["Z___1"]);
    assert_eq!(body.granules.only_in_index[0].granule_id, "g3");
}

#[tokio::test]
async fn internal_report_compares_catalog_and_index_only() {
    let world = World::seeded();
    let report = world
        .orchestrator()
        .create_report(request("Internal"))
        .await
        .expect("report generates");

    let json = serde_json::to_value(&report).expect("serializes");
    assert_eq!(json["reportType"], "Internal");
    assert!(json.get("storageFiles").is_none());
    assert!(json.get("accessUrls").is_none());
    assert_eq!(json["collections"]["okCount"], 1);
    assert_eq!(json["granules"]["okCount"], 1);
}

#[tokio::test]
async fn identical_worlds_produce_identical_report_bodies() {
    let first = World::seeded()
        .orchestrator()
        .create_report(request("Inventory"))
        .await
        .expect("first run");
    let second = World::seeded()
        .orchestrator()
        .create_report(request("Inventory"))
        .await
        .expect("second run");

    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn input_error_leaves_no_persisted_state() {
    let world = World::seeded();
    let bad_request = ReportRequest {
        collection_id: Some("A___1".to_string()),
        collection_ids: Some(vec!["B___1".to_string()]),
        ..Default::default()
    };

    let err = world
        .orchestrator()
        .create_report(bad_request)
        .await
        .expect_err("conflicting filters are rejected");
    assert!(err.is_input_error());

    // No report blob was written under the stack prefix.
    let page = world
        .storage
        .list_page("stacks", None)
        .await
        .expect("listable");
    assert!(page.items.is_empty());
}

/// Catalog whose collection listing always fails; used to drive the failure
/// path after the bucket axis has already been checkpointed.
struct BrokenCatalog;

#[async_trait]
impl MetadataCatalog for BrokenCatalog {
    async fn collection_ids(
        &self,
        _window: Option<&TimeWindow>,
    ) -> tern_core::Result<Vec<CollectionId>> {
        Err(tern_core::Error::storage("catalog is unreachable"))
    }

    async fn granules_page(
        &self,
        _collection: &CollectionId,
        _token: Option<&PageToken>,
    ) -> Result<Page<CatalogGranule>, FetchError> {
        Err(FetchError::fatal("catalog is unreachable"))
    }
}

#[tokio::test]
async fn failed_report_is_recorded_with_its_cause() {
    let world = World::seeded();
    let orchestrator = ReportOrchestrator::new(
        ReconStores {
            storage: world.storage.clone(),
            inventory: world.inventory.clone(),
            catalog: Arc::new(BrokenCatalog),
            index: world.index.clone(),
            tracker: world.tracker.clone(),
        },
        world.buckets.clone(),
        Arc::new(DistributionEndpoint::new(DISTRIBUTION)),
        OrchestratorConfig::new("stacks/test"),
    );

    let err = orchestrator
        .create_report(request("Inventory"))
        .await
        .expect_err("broken catalog fails the report");
    assert!(matches!(err, ReconError::Storage { .. }));

    // The tracking record is terminal and carries the cause.
    let page = world
        .storage
        .list_page("stacks", None)
        .await
        .expect("listable");
    assert_eq!(page.items.len(), 1);
    let location = page.items[0].object_path();
    let persisted = world.persisted(&location).await;

    assert_eq!(persisted.status, ReportStatus::Failed);
    let failure = persisted.error.as_ref().expect("failure recorded");
    assert!(failure.cause.contains("catalog is unreachable"));

    let record = world
        .tracker
        .get(&persisted.name)
        .await
        .expect("tracker readable")
        .expect("record exists");
    assert_eq!(record.status, ReportStatus::Failed);
    assert!(record.error.is_some());

    // The bucket axis completed before the failure; its checkpoint is kept
    // as a best-effort diagnostic, not rolled back.
    let body = match &persisted.body {
        tern_recon::ReportBody::Inventory(body) => body,
        other => panic!("expected inventory body, got {other:?}"),
    };
    assert_eq!(body.storage_files.ok_count, 2);
}

/// Catalog that answers correctly but slowly; used to exercise the
/// wall-clock budget.
struct SlowCatalog {
    inner: Arc<MemoryCatalog>,
    delay: Duration,
}

#[async_trait]
impl MetadataCatalog for SlowCatalog {
    async fn collection_ids(
        &self,
        window: Option<&TimeWindow>,
    ) -> tern_core::Result<Vec<CollectionId>> {
        tokio::time::sleep(self.delay).await;
        self.inner.collection_ids(window).await
    }

    async fn granules_page(
        &self,
        collection: &CollectionId,
        token: Option<&PageToken>,
    ) -> Result<Page<CatalogGranule>, FetchError> {
        self.inner.granules_page(collection, token).await
    }
}

#[tokio::test]
async fn exceeding_the_time_budget_fails_the_report() {
    let world = World::seeded();
    let slow = SlowCatalog {
        inner: world.catalog.clone(),
        delay: Duration::from_millis(200),
    };
    let orchestrator = ReportOrchestrator::new(
        ReconStores {
            storage: world.storage.clone(),
            inventory: world.inventory.clone(),
            catalog: Arc::new(slow),
            index: world.index.clone(),
            tracker: world.tracker.clone(),
        },
        world.buckets.clone(),
        Arc::new(DistributionEndpoint::new(DISTRIBUTION)),
        OrchestratorConfig::new("stacks/test").with_total_timeout(Duration::from_millis(20)),
    );

    let err = orchestrator
        .create_report(request("Inventory"))
        .await
        .expect_err("budget elapses");
    assert!(matches!(err, ReconError::Timeout { .. }));

    let page = world
        .storage
        .list_page("stacks", None)
        .await
        .expect("listable");
    let persisted = world.persisted(&page.items[0].object_path()).await;
    assert_eq!(persisted.status, ReportStatus::Failed);
}

#[tokio::test]
async fn collection_filter_scopes_the_catalog_axes() {
    let world = World::seeded();
    let filtered = ReportRequest {
        report_type: Some("Inventory".to_string()),
        collection_id: Some("MOD09GQ___006".to_string()),
        ..Default::default()
    };
    let report = world
        .orchestrator()
        .create_report(filtered)
        .await
        .expect("report generates");

    let body = match &report.body {
        tern_recon::ReportBody::Inventory(body) => body,
        other => panic!("expected inventory body, got {other:?}"),
    };
    assert_eq!(body.collections.ok_count, 1);
    assert!(body.collections.only_in_catalog.is_empty());
    assert!(body.collections.only_in_index.is_empty());
    assert_eq!(body.granules.ok_count, 1);
}
