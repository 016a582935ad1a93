#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map session.
//!
//! A [`MapSession`] owns everything a map view needs for its lifetime:
//! the configured acquisition client, the region table, the loaded states
//! layer with its hit-test index, and the per-region county cache. It is
//! created once and shared (behind an `Arc`) with background load tasks.

pub mod config;
pub mod task;

use std::path::Path;
use std::sync::Arc;

use region_map_acquisition::{
    AcquisitionClient, AcquisitionError, Cancellation, Endpoint, HttpTransport, MessagesOnly,
    PartitionStrategy, ProgressCallback, QueryTemplate, Transport,
};
use region_map_cache::RegionCache;
use region_map_geometry::convert::{STATE_FIELD, out_fields};
use region_map_geometry::convert_records;
use region_map_geometry_models::{
    EntityKind, Feature, FeatureCollection, FeatureProperties, Position,
};
use region_map_regions::{Region, RegionError, RegionTable};
use region_map_spatial::SpatialIndex;
use thiserror::Error;
use tokio::sync::OnceCell;

pub use config::{AcquisitionConfig, SessionConfig};
pub use task::LoadTask;

/// Cache key of the nationwide county collection.
const ALL_COUNTIES_KEY: &str = "*";

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Remote acquisition failed.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// Region lookup failed.
    #[error(transparent)]
    Region(#[from] RegionError),

    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration was invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// No state of the region survived selection and exclusion.
    #[error("No states with FIPS codes found for region {region}")]
    NoEntities {
        /// Region name.
        region: String,
    },

    /// A background load panicked or was aborted.
    #[error("Background load failed: {message}")]
    Task {
        /// Join error description.
        message: String,
    },
}

/// The loaded states with a prebuilt hit-test index.
#[derive(Debug)]
pub struct StateLayer {
    /// States in acquisition order.
    pub collection: FeatureCollection,
    index: SpatialIndex,
}

impl StateLayer {
    /// Indexes a states collection.
    #[must_use]
    pub fn new(collection: FeatureCollection) -> Self {
        let index = SpatialIndex::build(&collection.features);
        Self { collection, index }
    }

    /// The state containing the point, if any.
    #[must_use]
    pub fn state_at(&self, point: Position) -> Option<&Feature> {
        self.index
            .locate(point)
            .and_then(|i| self.collection.features.get(i))
    }

    /// FIPS codes of the given states, in layer order, without duplicates
    /// and without `excluded` codes.
    #[must_use]
    pub fn fips_codes<'a>(
        &'a self,
        region: &Region,
        is_excluded: impl Fn(&str) -> bool,
    ) -> Vec<&'a str> {
        let mut codes: Vec<&str> = Vec::new();
        for feature in &self.collection {
            let FeatureProperties::State(state) = &feature.properties else {
                continue;
            };
            if !region.contains(&state.name) || state.fips.is_empty() {
                continue;
            }
            if is_excluded(&state.fips) {
                log::debug!("Skipping excluded state {} ({})", state.name, state.fips);
                continue;
            }
            if !codes.contains(&state.fips.as_str()) {
                codes.push(&state.fips);
            }
        }
        codes
    }
}

/// One map session: configuration, client, region table, and caches.
#[derive(Debug)]
pub struct MapSession {
    config: SessionConfig,
    client: AcquisitionClient,
    regions: RegionTable,
    states: OnceCell<Arc<StateLayer>>,
    counties: RegionCache<FeatureCollection>,
}

impl MapSession {
    /// Creates a session over an explicit transport.
    #[must_use]
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>, regions: RegionTable) -> Self {
        let client = AcquisitionClient::new(transport)
            .with_retry(config.acquisition.retry_policy())
            .with_timeouts(config.acquisition.timeouts())
            .with_concurrency(config.acquisition.concurrency);
        Self {
            config,
            client,
            regions,
            states: OnceCell::new(),
            counties: RegionCache::new(),
        }
    }

    /// Creates a session talking HTTP, with the built-in region table.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Acquisition`] if the HTTP client cannot be
    /// built.
    pub fn connect(config: SessionConfig) -> Result<Self, SessionError> {
        let transport = HttpTransport::new(&config.acquisition.user_agent)?;
        Ok(Self::new(config, Arc::new(transport), RegionTable::builtin()))
    }

    /// Loads configuration (file plus environment) and connects.
    ///
    /// # Errors
    ///
    /// Returns configuration or client construction errors.
    pub fn from_config_file(path: Option<&Path>) -> Result<Self, SessionError> {
        Self::connect(SessionConfig::load(path)?)
    }

    /// The session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The region table.
    #[must_use]
    pub const fn regions(&self) -> &RegionTable {
        &self.regions
    }

    /// Region keys with cached counties.
    #[must_use]
    pub fn cached_regions(&self) -> Vec<String> {
        self.counties
            .keys()
            .into_iter()
            .filter(|k| k != ALL_COUNTIES_KEY)
            .collect()
    }

    /// The states layer, if it has been loaded.
    #[must_use]
    pub fn states(&self) -> Option<&Arc<StateLayer>> {
        self.states.get()
    }

    fn states_endpoint(&self) -> Endpoint {
        Endpoint::new(self.config.acquisition.states_url.clone(), "States")
    }

    fn counties_endpoint(&self, label: impl Into<String>) -> Endpoint {
        Endpoint::new(self.config.acquisition.counties_url.clone(), label)
    }

    fn counties_template(&self) -> QueryTemplate {
        QueryTemplate::new(
            out_fields(EntityKind::County),
            Some(self.config.acquisition.counties_geometry_precision),
        )
    }

    /// Loads every state in a single request. Loaded once per session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Acquisition`] if the request fails after
    /// all retries or returns no states.
    pub async fn load_states(
        &self,
        progress: &dyn ProgressCallback,
        cancel: &Cancellation,
    ) -> Result<Arc<StateLayer>, SessionError> {
        let layer = self
            .states
            .get_or_try_init(|| async move {
                let template = QueryTemplate::new(
                    out_fields(EntityKind::State),
                    Some(self.config.acquisition.states_geometry_precision),
                );
                let outcome = self
                    .client
                    .fetch_all(
                        &self.states_endpoint(),
                        &template,
                        &PartitionStrategy::whole(),
                        progress,
                        cancel,
                    )
                    .await?;
                let collection = convert_records(&outcome.records, EntityKind::State);
                log::info!("Loaded {} states", collection.len());
                Ok::<_, SessionError>(Arc::new(StateLayer::new(collection)))
            })
            .await?;
        Ok(Arc::clone(layer))
    }

    /// Loads the counties of one region, state by state.
    ///
    /// Served from the cache after the first success. Otherwise loads the
    /// states layer if needed, takes the FIPS codes of the region's states
    /// (minus excluded codes), and queries one batch per code.
    ///
    /// # Errors
    ///
    /// * [`SessionError::Region`] for an unknown region.
    /// * [`SessionError::NoEntities`] if no state code remains.
    /// * [`SessionError::Acquisition`] if loading failed entirely.
    pub async fn load_region_counties(
        &self,
        region: &str,
        progress: &dyn ProgressCallback,
        cancel: &Cancellation,
    ) -> Result<Arc<FeatureCollection>, SessionError> {
        let region = self.regions.get(region)?;

        self.counties
            .get_or_load(&region.name, || async move {
                progress.set_message(format!("Loading counties for {} region...", region.name));
                let states = self.load_states(&MessagesOnly(progress), cancel).await?;

                let codes: Vec<String> = states
                    .fips_codes(region, |fips| self.config.is_excluded(fips))
                    .into_iter()
                    .map(ToString::to_string)
                    .collect();
                if codes.is_empty() {
                    return Err(SessionError::NoEntities {
                        region: region.name.clone(),
                    });
                }
                log::info!(
                    "Loading counties for {} states in {} region",
                    codes.len(),
                    region.name
                );

                let strategy = PartitionStrategy::PartitionKey {
                    field: STATE_FIELD.to_string(),
                    keys: codes,
                };
                let outcome = self
                    .client
                    .fetch_all(
                        &self.counties_endpoint(format!("{} counties", region.name)),
                        &self.counties_template(),
                        &strategy,
                        progress,
                        cancel,
                    )
                    .await?;

                if outcome.stats.failed > 0 {
                    log::warn!(
                        "{} region: {} of {} states failed to load",
                        region.name,
                        outcome.stats.failed,
                        outcome.stats.failed + outcome.stats.succeeded
                    );
                }
                Ok::<_, SessionError>(convert_records(&outcome.records, EntityKind::County))
            })
            .await
    }

    /// Loads every county nationwide in `OBJECTID` batches.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Acquisition`] if the count query fails or
    /// no batch returned any county.
    pub async fn load_all_counties(
        &self,
        progress: &dyn ProgressCallback,
        cancel: &Cancellation,
    ) -> Result<Arc<FeatureCollection>, SessionError> {
        self.counties
            .get_or_load(ALL_COUNTIES_KEY, || async move {
                let strategy = PartitionStrategy::object_ids(self.config.acquisition.batch_size);
                let outcome = self
                    .client
                    .fetch_all(
                        &self.counties_endpoint("Counties"),
                        &self.counties_template(),
                        &strategy,
                        progress,
                        cancel,
                    )
                    .await?;
                Ok::<_, SessionError>(convert_records(&outcome.records, EntityKind::County))
            })
            .await
    }

    /// The state under a `[lon, lat]` point. `None` until the states layer
    /// is loaded.
    #[must_use]
    pub fn state_at(&self, lon: f64, lat: f64) -> Option<&Feature> {
        self.states.get()?.state_at([lon, lat])
    }

    /// The region of the state under a point. `None` until the states
    /// layer is loaded, outside every state, or for states in no region.
    #[must_use]
    pub fn region_at(&self, lon: f64, lat: f64) -> Option<&Region> {
        let state = self.state_at(lon, lat)?;
        self.regions.region_of_state(state.name())
    }

    /// Loads the states layer if needed, then resolves the region at a
    /// point.
    ///
    /// # Errors
    ///
    /// Returns the error of [`Self::load_states`].
    pub async fn locate_region(
        &self,
        lon: f64,
        lat: f64,
        progress: &dyn ProgressCallback,
    ) -> Result<Option<&Region>, SessionError> {
        self.load_states(progress, &Cancellation::new()).await?;
        Ok(self.region_at(lon, lat))
    }

    /// Spawns [`Self::load_region_counties`] as a background task.
    #[must_use]
    pub fn spawn_region_load(self: &Arc<Self>, region: &str) -> LoadTask<Arc<FeatureCollection>> {
        let session = Arc::clone(self);
        let region = region.to_string();
        LoadTask::spawn(move |progress, cancel| async move {
            session
                .load_region_counties(&region, &progress, &cancel)
                .await
        })
    }

    /// Spawns [`Self::load_all_counties`] as a background task.
    #[must_use]
    pub fn spawn_all_counties_load(self: &Arc<Self>) -> LoadTask<Arc<FeatureCollection>> {
        let session = Arc::clone(self);
        LoadTask::spawn(move |progress, cancel| async move {
            session.load_all_counties(&progress, &cancel).await
        })
    }
}

#[cfg(test)]
mod tests {
    use region_map_acquisition::{NullProgress, QueryRequest, ScriptedTransport};
    use region_map_geometry::projection::lon_lat_to_web_mercator;
    use serde_json::{Value, json};

    use super::*;

    /// Web Mercator rings of a lon/lat box.
    fn mercator_box(lon0: f64, lat0: f64, lon1: f64, lat1: f64) -> Value {
        let ring: Vec<[f64; 2]> = [
            (lon0, lat0),
            (lon0, lat1),
            (lon1, lat1),
            (lon1, lat0),
            (lon0, lat0),
        ]
        .into_iter()
        .map(|(lon, lat)| lon_lat_to_web_mercator(lon, lat))
        .collect();
        json!([ring])
    }

    fn state(name: &str, fips: &str, rings: Value) -> Value {
        json!({ "attributes": { "NAME": name, "STATE": fips }, "geometry": { "rings": rings } })
    }

    fn county(name: &str, fips: &str, population: u64) -> Value {
        json!({
            "attributes": { "NAME": name, "STATE": fips, "POP100": population },
            "geometry": { "rings": mercator_box(0.0, 0.0, 1.0, 1.0) }
        })
    }

    const STATES_URL: &str = "http://example.test/54/query";
    const COUNTIES_URL: &str = "http://example.test/55/query";

    fn respond(request: &QueryRequest) -> Result<Value, AcquisitionError> {
        if request.url == STATES_URL {
            return Ok(json!({ "features": [
                state("Nevada", "32", mercator_box(-120.0, 35.0, -114.0, 42.0)),
                state("Texas", "48", mercator_box(-106.0, 26.0, -94.0, 36.0)),
                state("Puerto Rico", "72", mercator_box(-67.3, 17.9, -65.2, 18.5)),
            ]}));
        }
        if request.is_count() {
            return Ok(json!({ "count": 4 }));
        }
        match request.param("where") {
            Some("STATE = '32'") => Ok(json!({ "features": [
                county("Clark", "32", 2_265_461),
                county("Washoe", "32", 486_492),
            ]})),
            Some("STATE = '48'") => Ok(json!({ "features": [county("Harris", "48", 4_731_145)] })),
            Some("STATE = '72'") => Ok(json!({ "features": [county("San Juan", "72", 342_259)] })),
            Some(w) if w.starts_with("OBJECTID") => Ok(json!({ "features": [
                county(w, "01", 1),
                county(w, "01", 2),
            ]})),
            _ => Ok(json!({ "features": [] })),
        }
    }

    fn table() -> RegionTable {
        RegionTable::from_toml_str(
            r##"
            [[region]]
            name = "West"
            color = "#FF6B6B"
            states = ["Nevada", "California"]

            [[region]]
            name = "Southwest"
            color = "#FECA57"
            states = ["Texas", "Puerto Rico"]

            [[region]]
            name = "Caribbean"
            color = "#000000"
            states = ["Puerto Rico", "U.S. Virgin Islands"]
            "##,
        )
        .unwrap()
    }

    fn session() -> (Arc<MapSession>, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(|request, _| respond(request)));
        let mut config = SessionConfig::default();
        config.acquisition.states_url = STATES_URL.to_string();
        config.acquisition.counties_url = COUNTIES_URL.to_string();
        config.acquisition.backoff_ms = 0;
        let session = MapSession::new(config, Arc::clone(&transport) as Arc<dyn Transport>, table());
        (Arc::new(session), transport)
    }

    fn names(collection: &FeatureCollection) -> Vec<&str> {
        collection.iter().map(Feature::name).collect()
    }

    #[test]
    fn error_messages() {
        let unknown: SessionError = RegionError::UnknownRegion {
            name: "Atlantis".to_string(),
        }
        .into();
        assert_eq!(unknown.to_string(), "Unknown region: Atlantis");

        let missing: SessionError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(matches!(missing, SessionError::Io(_)));

        let empty = SessionError::NoEntities {
            region: "Caribbean".to_string(),
        };
        assert_eq!(
            empty.to_string(),
            "No states with FIPS codes found for region Caribbean"
        );
    }

    #[tokio::test]
    async fn region_at_after_states_load() {
        let (session, transport) = session();
        assert!(session.region_at(-117.0, 38.0).is_none());

        let states = session
            .load_states(&NullProgress, &Cancellation::new())
            .await
            .unwrap();
        assert_eq!(states.collection.len(), 3);

        assert_eq!(session.region_at(-117.0, 38.0).map(|r| r.name.as_str()), Some("West"));
        assert_eq!(
            session.state_at(-100.0, 30.0).map(Feature::name),
            Some("Texas")
        );
        assert!(session.region_at(0.0, 0.0).is_none());

        // Loaded once.
        session
            .load_states(&NullProgress, &Cancellation::new())
            .await
            .unwrap();
        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.requests()[0].param("geometryPrecision"), Some("6"));
    }

    #[tokio::test]
    async fn locate_region_loads_states() {
        let (session, _) = session();
        let region = session
            .locate_region(-110.0, 40.0, &NullProgress)
            .await
            .unwrap();
        assert!(region.is_none());
        let region = session
            .locate_region(-115.5, 36.2, &NullProgress)
            .await
            .unwrap();
        assert_eq!(region.map(|r| r.name.as_str()), Some("West"));
    }

    #[tokio::test]
    async fn region_counties_are_cached() {
        let (session, transport) = session();

        let first = session
            .load_region_counties("west", &NullProgress, &Cancellation::new())
            .await
            .unwrap();
        assert_eq!(names(&first), vec!["Clark", "Washoe"]);
        assert_eq!(transport.request_count(), 2);

        let second = session
            .load_region_counties("West", &NullProgress, &Cancellation::new())
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.request_count(), 2);
        assert_eq!(session.cached_regions(), vec!["West".to_string()]);

        let requests = transport.requests();
        let county_request = &requests[1];
        assert_eq!(county_request.url, COUNTIES_URL);
        assert_eq!(county_request.param("outFields"), Some("NAME,STATE,POP100"));
        assert_eq!(county_request.param("geometryPrecision"), Some("2"));
    }

    #[tokio::test]
    async fn excluded_states_are_not_queried() {
        let (session, transport) = session();

        let counties = session
            .load_region_counties("Southwest", &NullProgress, &Cancellation::new())
            .await
            .unwrap();
        assert_eq!(names(&counties), vec!["Harris"]);

        let wheres: Vec<String> = transport
            .requests()
            .iter()
            .filter(|r| r.url == COUNTIES_URL)
            .filter_map(|r| r.param("where").map(ToString::to_string))
            .collect();
        assert_eq!(wheres, vec!["STATE = '48'"]);
    }

    #[tokio::test]
    async fn region_without_codes_is_no_entities() {
        let (session, _) = session();

        let result = session
            .load_region_counties("Caribbean", &NullProgress, &Cancellation::new())
            .await;
        assert!(matches!(result, Err(SessionError::NoEntities { ref region }) if region == "Caribbean"));
        assert!(session.cached_regions().is_empty());
    }

    #[tokio::test]
    async fn unknown_region() {
        let (session, transport) = session();
        let result = session
            .load_region_counties("Atlantis", &NullProgress, &Cancellation::new())
            .await;
        assert!(matches!(
            result,
            Err(SessionError::Region(RegionError::UnknownRegion { .. }))
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn all_counties_by_object_id() {
        let (session, transport) = session();

        let counties = session
            .load_all_counties(&NullProgress, &Cancellation::new())
            .await
            .unwrap();
        // count = 4 in a single 150-record batch.
        assert_eq!(counties.len(), 2);
        assert!(transport.requests()[0].is_count());
        assert_eq!(
            transport.requests()[1].param("where"),
            Some("OBJECTID >= 1 AND OBJECTID <= 4")
        );
        assert!(session.cached_regions().is_empty());
    }

    #[tokio::test]
    async fn spawned_load_reports_progress() {
        let (session, _) = session();

        let mut task = session.spawn_region_load("West");
        let mut events = Vec::new();
        while let Some(event) = task.events.recv().await {
            events.push(event);
        }
        let counties = task.join().await.unwrap();

        assert_eq!(counties.len(), 2);
        assert!(events.iter().any(|e| e.message.contains("West")));
        assert!(events.last().is_some_and(|e| e.finished));
    }

    #[tokio::test]
    async fn region_load_on_fresh_session_finishes_once() {
        let (session, _) = session();

        let mut task = session.spawn_region_load("West");
        let mut events = Vec::new();
        while let Some(event) = task.events.recv().await {
            events.push(event);
        }
        task.join().await.unwrap();

        let finished: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.finished)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(finished, vec![events.len() - 1], "events: {events:?}");

        // The states step still reports, without ending the load.
        assert!(events.iter().any(|e| e.message.starts_with("States:")));

        let percents: Vec<f64> = events.iter().filter_map(|e| e.percent).collect();
        assert!(
            percents.windows(2).all(|w| w[0] <= w[1]),
            "percent went backwards: {percents:?}"
        );
    }

    #[tokio::test]
    async fn cancelled_load_fails_and_is_not_cached() {
        let (session, transport) = session();

        let task = session.spawn_all_counties_load();
        task.cancel();
        let result = task.join().await;

        assert!(matches!(
            result,
            Err(SessionError::Acquisition(AcquisitionError::Cancelled { .. }))
        ));
        // Cancelled before the count query.
        assert_eq!(transport.request_count(), 0);

        let counties = session
            .load_all_counties(&NullProgress, &Cancellation::new())
            .await
            .unwrap();
        assert_eq!(counties.len(), 2);
    }
}
