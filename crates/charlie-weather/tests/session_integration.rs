//! End-to-end session flows against a mock provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use charlie_weather::{
    Coordinates, FixedGeolocator, Geolocator, Location, LocationError, LocationStore,
    MemoryLocationStore, Phase, ProviderClient, Session, SessionOptions, TemperatureUnit,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Geolocator that records how often it was asked.
struct CountingGeolocator {
    coords: Option<Coordinates>,
    calls: AtomicUsize,
}

impl CountingGeolocator {
    fn new(coords: Option<Coordinates>) -> Self {
        Self {
            coords,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Geolocator for CountingGeolocator {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.coords.ok_or(LocationError::PermissionDenied)
    }
}

fn weather_body(temp: f64) -> serde_json::Value {
    serde_json::json!({
        "main": {"temp": temp, "humidity": 65, "pressure": 1010},
        "weather": [{"icon": "10d", "description": "chuva leve"}],
        "wind": {"deg": 200, "speed": 4.1}
    })
}

fn forecast_body() -> serde_json::Value {
    serde_json::json!({
        "list": [
            {"main": {"temp": 24.0}, "dt_txt": "2099-01-01 12:00:00"},
            {"main": {"temp": 26.0}, "dt_txt": "2099-01-02 12:00:00"}
        ]
    })
}

fn directory_body() -> serde_json::Value {
    serde_json::json!([
        {"id": 3550308, "nome": "São Paulo", "microrregiao": {"mesorregiao": {"UF": {"nome": "São Paulo"}}}},
        {"id": 3304557, "nome": "Rio de Janeiro", "microrregiao": {"mesorregiao": {"UF": {"nome": "Rio de Janeiro"}}}},
        {"id": 3548500, "nome": "Santos", "microrregiao": {"mesorregiao": {"UF": {"nome": "São Paulo"}}}}
    ])
}

async fn mount_directory(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/municipios"))
        .respond_with(ResponseTemplate::new(200).set_body_json(directory_body()))
        .mount(server)
        .await;
}

fn session(
    server: &MockServer,
    store: Arc<dyn LocationStore>,
    geolocator: Arc<dyn Geolocator>,
) -> Session {
    let client =
        ProviderClient::new(&server.uri(), &format!("{}/municipios", server.uri())).unwrap();
    Session::new(client, store, geolocator, SessionOptions::default())
}

#[tokio::test]
async fn test_no_cache_no_geolocation_stays_locating() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/api/location"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/forecast"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let session = session(
        &mock_server,
        Arc::new(MemoryLocationStore::new()),
        Arc::new(FixedGeolocator::unavailable()),
    );
    session.start().await;
    session.wait_for_directory().await;

    let state = session.snapshot();
    assert_eq!(state.phase(), Phase::Locating);
    assert!(state.location().is_none());
    assert!(state.weather().is_none());
    assert!(state.forecast().is_none());
    assert_eq!(state.city_names().map(<[String]>::len), Some(3));
    assert!(!state.is_loading());
}

#[tokio::test]
async fn test_cached_location_skips_geolocation_and_fetches() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/api/location"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .and(query_param("cidade", "Sao Paulo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body(22.5)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/forecast"))
        .and(query_param("cidade", "Sao Paulo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store =
        Arc::new(MemoryLocationStore::with_location(&Location::new("São Paulo", "São Paulo")).unwrap());
    let geolocator = Arc::new(CountingGeolocator::new(Some(Coordinates::new(0.0, 0.0))));
    let session = session(&mock_server, store, geolocator.clone());

    session.start().await;

    assert_eq!(geolocator.calls.load(Ordering::SeqCst), 0);
    let state = session.snapshot();
    assert_eq!(state.phase(), Phase::Ready);
    assert_eq!(state.weather().map(|w| w.temperature_c.as_str()), Some("22 °C"));
    assert_eq!(state.forecast().map(|f| f.len()), Some(2));
    assert!(!state.is_loading());
}

#[tokio::test]
async fn test_fresh_coordinates_resolve_cache_and_fetch() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/api/location"))
        .and(query_param("lat", "-22.9"))
        .and(query_param("lon", "-43.2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "city": "Rio de Janeiro",
            "state": "Rio de Janeiro"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .and(query_param("cidade", "Rio de Janeiro"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body(31.0)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryLocationStore::new());
    let geolocator = Arc::new(CountingGeolocator::new(Some(Coordinates::new(-22.9, -43.2))));
    let session = session(&mock_server, store.clone(), geolocator.clone());

    session.start().await;

    assert_eq!(geolocator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.load(), Some(Location::new("Rio de Janeiro", "Rio de Janeiro")));
    let state = session.snapshot();
    assert_eq!(state.phase(), Phase::Ready);
    assert_eq!(state.weather().map(|w| w.description.as_str()), Some("chuva leve"));
}

#[tokio::test]
async fn test_resolver_failure_stays_locating() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/api/location"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryLocationStore::new());
    let geolocator = Arc::new(FixedGeolocator::new(Coordinates::new(-15.8, -47.9)));
    let session = session(&mock_server, store.clone(), geolocator);

    session.start().await;

    assert_eq!(session.phase(), Phase::Locating);
    assert!(store.load().is_none());
}

#[tokio::test]
async fn test_city_not_found_sets_notice_and_clears_loading() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .and(query_param("cidade", "Curitiba"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body(12.0)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .and(query_param("cidade", "Atlantida"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "cod": "404",
            "message": "city not found"
        })))
        .mount(&mock_server)
        .await;

    let session = session(
        &mock_server,
        Arc::new(MemoryLocationStore::new()),
        Arc::new(FixedGeolocator::unavailable()),
    );

    session.refresh_weather("Curitiba").await;
    assert!(session.take_notice().is_none());

    session.refresh_weather("Atlântida").await;

    let state = session.snapshot();
    assert!(!state.is_loading());
    assert_eq!(state.notice(), Some("City not found!"));
    // Last good reading stays on screen
    assert_eq!(state.weather().map(|w| w.temperature_c.as_str()), Some("12 °C"));

    assert_eq!(session.take_notice().as_deref(), Some("City not found!"));
    assert!(session.take_notice().is_none());
}

#[tokio::test]
async fn test_weather_server_error_sets_notice() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = session(
        &mock_server,
        Arc::new(MemoryLocationStore::new()),
        Arc::new(FixedGeolocator::unavailable()),
    );
    session.refresh_weather("Recife").await;

    let state = session.snapshot();
    assert!(!state.is_loading());
    assert!(state.weather().is_none());
    assert_eq!(
        state.notice(),
        Some("The weather service is experiencing issues. Please try again later.")
    );
}

#[tokio::test]
async fn test_malformed_weather_sets_notice() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "main": {"temp": 18.0, "humidity": 70, "pressure": 1012},
            "weather": [],
            "wind": {"deg": 0, "speed": 1.0}
        })))
        .mount(&mock_server)
        .await;

    let session = session(
        &mock_server,
        Arc::new(MemoryLocationStore::new()),
        Arc::new(FixedGeolocator::unavailable()),
    );
    session.refresh_weather("Natal").await;

    assert!(!session.is_loading());
    assert_eq!(
        session.take_notice().as_deref(),
        Some("Received an unexpected response. Please try again.")
    );
}

#[tokio::test]
async fn test_overlapping_weather_refreshes_last_response_wins() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .and(query_param("cidade", "Manaus"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(weather_body(10.0))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .and(query_param("cidade", "Belem"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body(30.0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = session(
        &mock_server,
        Arc::new(MemoryLocationStore::new()),
        Arc::new(FixedGeolocator::unavailable()),
    );

    // Manaus is requested first but answers last
    tokio::join!(session.refresh_weather("Manaus"), session.refresh_weather("Belém"));

    let state = session.snapshot();
    assert_eq!(state.weather().map(|w| w.temperature_c.as_str()), Some("10 °C"));
    assert!(!state.is_loading());
    assert!(state.notice().is_none());
}

#[tokio::test]
async fn test_cached_location_without_state_is_completed_from_directory() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .and(query_param("cidade", "Santos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body(25.0)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .mount(&mock_server)
        .await;

    let cached = Location {
        city: Some("Santos".to_string()),
        state: None,
    };
    let store = Arc::new(MemoryLocationStore::with_location(&cached).unwrap());
    let session = session(&mock_server, store, Arc::new(FixedGeolocator::unavailable()));

    session.start().await;
    session.wait_for_directory().await;

    let state = session.snapshot();
    assert_eq!(state.phase(), Phase::Ready);
    assert_eq!(state.location().and_then(|l| l.state.as_deref()), Some("São Paulo"));
}

#[tokio::test]
async fn test_forecast_failure_is_silent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/forecast"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let session = session(
        &mock_server,
        Arc::new(MemoryLocationStore::new()),
        Arc::new(FixedGeolocator::unavailable()),
    );
    session.refresh_forecast("Recife").await;

    let state = session.snapshot();
    assert!(state.forecast().is_none());
    assert!(state.notice().is_none());
    assert!(!state.is_loading());
}

#[tokio::test]
async fn test_toggle_unit_never_refetches() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body(20.0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = session(
        &mock_server,
        Arc::new(MemoryLocationStore::new()),
        Arc::new(FixedGeolocator::unavailable()),
    );
    session.refresh_weather("Porto Alegre").await;

    assert_eq!(session.toggle_temperature_unit(), TemperatureUnit::Fahrenheit);
    assert_eq!(session.snapshot().temperature_display(), Some("68 °F"));
    assert_eq!(session.toggle_temperature_unit(), TemperatureUnit::Celsius);
    assert_eq!(session.snapshot().temperature_display(), Some("20 °C"));
}

#[tokio::test]
async fn test_suggest_cities_after_directory_load() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server).await;

    let session = session(
        &mock_server,
        Arc::new(MemoryLocationStore::new()),
        Arc::new(FixedGeolocator::unavailable()),
    );
    assert!(session.suggest_cities("sa", 5).is_empty());

    session.start().await;
    session.wait_for_directory().await;

    let cities: Vec<String> = session
        .suggest_cities("sa", 5)
        .into_iter()
        .map(|m| m.city)
        .collect();
    assert_eq!(cities, vec!["São Paulo".to_string(), "Santos".to_string()]);
}

#[tokio::test]
async fn test_directory_failure_leaves_projections_unset() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/municipios"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let session = session(
        &mock_server,
        Arc::new(MemoryLocationStore::new()),
        Arc::new(FixedGeolocator::unavailable()),
    );
    session.start().await;
    session.wait_for_directory().await;

    let state = session.snapshot();
    assert!(state.city_names().is_none());
    assert!(state.municipalities().is_none());
}

#[tokio::test]
async fn test_start_twice_is_ignored() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/municipios"))
        .respond_with(ResponseTemplate::new(200).set_body_json(directory_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = session(
        &mock_server,
        Arc::new(MemoryLocationStore::new()),
        Arc::new(FixedGeolocator::unavailable()),
    );
    session.start().await;
    session.start().await;
    session.wait_for_directory().await;

    assert_eq!(session.phase(), Phase::Locating);
}
