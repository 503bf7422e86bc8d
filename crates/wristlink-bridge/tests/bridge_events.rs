//! End-to-end pipeline runs against a mocked weather endpoint.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wristlink_bridge::{Bridge, BridgeEvent, PipelineContext, RunError};
use wristlink_core::PlatformVariant;
use wristlink_device::{timezone_offset_minutes, DeliveryError, DeviceChannel, WeatherMessage};
use wristlink_weather::{
    Coordinates, FixedLocation, LocationError, LocationProvider, Position, PositionOptions,
    UnavailableLocation, WeatherError, WeatherProvider,
};

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Weather(WeatherMessage),
    Timezone(i32),
}

/// Channel that records what reached the watch
#[derive(Clone, Default)]
struct RecordingChannel {
    sent: Arc<Mutex<Vec<Sent>>>,
    refuse: bool,
}

impl RecordingChannel {
    fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }
}

impl DeviceChannel for RecordingChannel {
    async fn send_message(&self, message: WeatherMessage) -> Result<(), DeliveryError> {
        if self.refuse {
            return Err(DeliveryError::Nack("outbox full".to_string()));
        }
        self.sent.lock().push(Sent::Weather(message));
        Ok(())
    }

    async fn send_timezone_offset(&self, offset_minutes: i32) -> Result<(), DeliveryError> {
        self.sent.lock().push(Sent::Timezone(offset_minutes));
        Ok(())
    }
}

/// Hands out queued fixes, each after its own delay
struct ScriptedLocation {
    fixes: Mutex<VecDeque<(Coordinates, Duration)>>,
}

impl ScriptedLocation {
    fn new(fixes: Vec<(Coordinates, Duration)>) -> Self {
        Self {
            fixes: Mutex::new(fixes.into()),
        }
    }
}

impl LocationProvider for ScriptedLocation {
    async fn current_position(&self, _options: PositionOptions) -> Result<Position, LocationError> {
        let next = self.fixes.lock().pop_front();
        let (coords, delay) = next.ok_or(LocationError::ServiceUnavailable)?;
        tokio::time::sleep(delay).await;
        Ok(Position::now(coords))
    }
}

fn new_york() -> Coordinates {
    Coordinates::new(40.7128, -74.006)
}

async fn mount_weather(server: &MockServer, lat: &str, temp: f64, name: &str) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", lat))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "main": {"temp": temp},
            "name": name
        })))
        .mount(server)
        .await;
}

fn bridge<L: LocationProvider + 'static>(
    server: &MockServer,
    location: L,
    channel: RecordingChannel,
    platform: PlatformVariant,
) -> Bridge<L, RecordingChannel> {
    let weather = WeatherProvider::new(
        &format!("{}/data/2.5/weather", server.uri()),
        Some("test_key".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    Bridge::new(
        PipelineContext {
            location,
            weather,
            channel,
            options: PositionOptions::default(),
        },
        platform,
    )
}

#[tokio::test]
async fn test_ready_relays_weather() {
    let server = MockServer::start().await;
    mount_weather(&server, "40.7128", 295.15, "New York").await;

    let channel = RecordingChannel::default();
    let bridge = bridge(
        &server,
        FixedLocation::new(new_york()),
        channel.clone(),
        PlatformVariant::Basalt,
    );

    let ready = bridge.on_ready();
    assert!(ready.timezone.is_none());

    let message = ready.run.await.unwrap().unwrap().unwrap();
    assert_eq!(message, WeatherMessage::new(22, "New York"));
    assert_eq!(channel.sent(), vec![Sent::Weather(message)]);
}

#[tokio::test]
async fn test_ready_on_aplite_pushes_timezone_once() {
    let server = MockServer::start().await;
    mount_weather(&server, "40.7128", 295.15, "New York").await;

    let channel = RecordingChannel::default();
    let bridge = bridge(
        &server,
        FixedLocation::new(new_york()),
        channel.clone(),
        PlatformVariant::Aplite,
    );

    let ready = bridge.on_ready();
    let timezone = ready.timezone.expect("aplite gets a timezone push");
    let offset = timezone.await.unwrap().unwrap().unwrap();
    ready.run.await.unwrap().unwrap().unwrap();

    assert_eq!(offset, timezone_offset_minutes(&chrono::Local::now()));
    let sent = channel.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent.iter().filter(|s| matches!(s, Sent::Timezone(_))).count(),
        1
    );
    assert!(sent.contains(&Sent::Timezone(offset)));
}

#[tokio::test]
async fn test_location_failure_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let channel = RecordingChannel::default();
    let bridge = bridge(
        &server,
        UnavailableLocation,
        channel.clone(),
        PlatformVariant::Basalt,
    );

    let result = bridge.handle_event(BridgeEvent::Ready).await.unwrap().unwrap();
    assert!(matches!(
        result,
        Err(RunError::Location(LocationError::ServiceUnavailable))
    ));
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn test_location_timeout_sends_nothing() {
    let server = MockServer::start().await;
    let channel = RecordingChannel::default();
    let weather = WeatherProvider::new(
        &format!("{}/data/2.5/weather", server.uri()),
        None,
        Duration::from_secs(5),
    )
    .unwrap();
    let bridge = Bridge::new(
        PipelineContext {
            location: ScriptedLocation::new(vec![(new_york(), Duration::from_secs(5))]),
            weather,
            channel: channel.clone(),
            options: PositionOptions {
                timeout: Duration::from_millis(50),
                ..PositionOptions::default()
            },
        },
        PlatformVariant::Basalt,
    );

    let result = bridge
        .on_app_message(serde_json::json!({}))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(result, Err(RunError::Location(LocationError::Timeout))));
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_response_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "main": {"pressure": 1013}
        })))
        .mount(&server)
        .await;

    let channel = RecordingChannel::default();
    let bridge = bridge(
        &server,
        FixedLocation::new(new_york()),
        channel.clone(),
        PlatformVariant::Basalt,
    );

    let result = bridge
        .on_app_message(serde_json::json!({"0": 0}))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(
        result,
        Err(RunError::Weather(WeatherError::MalformedResponse(_)))
    ));
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn test_delivery_failure_is_reported() {
    let server = MockServer::start().await;
    mount_weather(&server, "40.7128", 280.0, "New York").await;

    let bridge = bridge(
        &server,
        FixedLocation::new(new_york()),
        RecordingChannel::refusing(),
        PlatformVariant::Basalt,
    );

    let result = bridge
        .on_app_message(serde_json::Value::Null)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(result, Err(RunError::Delivery(DeliveryError::Nack(_)))));
}

#[tokio::test]
async fn test_each_refresh_starts_its_own_run() {
    let server = MockServer::start().await;
    mount_weather(&server, "1", 283.15, "First").await;
    mount_weather(&server, "2", 293.15, "Second").await;

    let channel = RecordingChannel::default();
    let location = ScriptedLocation::new(vec![
        (Coordinates::new(1.0, 0.0), Duration::from_millis(400)),
        (Coordinates::new(2.0, 0.0), Duration::from_millis(50)),
    ]);
    let bridge = bridge(&server, location, channel.clone(), PlatformVariant::Basalt);

    let first = bridge.on_app_message(serde_json::json!({"0": 0}));
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = bridge.on_app_message(serde_json::json!({"0": 0}));
    assert_eq!(bridge.in_flight(), 2);

    let second = second.await.unwrap().unwrap().unwrap();
    let first = first.await.unwrap().unwrap().unwrap();

    assert_eq!(first, WeatherMessage::new(10, "First"));
    assert_eq!(second, WeatherMessage::new(20, "Second"));
    // Completion order, not trigger order
    assert_eq!(
        channel.sent(),
        vec![Sent::Weather(second), Sent::Weather(first)]
    );
}

#[tokio::test]
async fn test_drain_waits_for_pending_runs() {
    let server = MockServer::start().await;
    mount_weather(&server, "40.7128", 295.15, "New York").await;

    let channel = RecordingChannel::default();
    let location = ScriptedLocation::new(vec![(new_york(), Duration::from_millis(100))]);
    let bridge = bridge(&server, location, channel.clone(), PlatformVariant::Basalt);

    let _run = bridge.on_app_message(serde_json::json!({}));
    bridge.drain().await;

    assert_eq!(bridge.in_flight(), 0);
    assert_eq!(channel.sent().len(), 1);
}

#[tokio::test]
async fn test_concurrent_drains_both_finish() {
    let server = MockServer::start().await;
    mount_weather(&server, "40.7128", 295.15, "New York").await;

    let channel = RecordingChannel::default();
    let location = ScriptedLocation::new(vec![
        (new_york(), Duration::from_millis(100)),
        (new_york(), Duration::from_millis(10)),
    ]);
    let bridge = bridge(&server, location, channel.clone(), PlatformVariant::Basalt);

    let _run = bridge.on_app_message(serde_json::json!({}));
    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(bridge.drain(), bridge.drain())
    })
    .await
    .expect("both drains return");

    assert_eq!(bridge.in_flight(), 0);
    assert_eq!(channel.sent().len(), 1);

    // The tracker is open again, so a later drain still waits for new runs
    let _run = bridge.on_app_message(serde_json::json!({}));
    bridge.drain().await;
    assert_eq!(channel.sent().len(), 2);
}

#[tokio::test]
async fn test_shutdown_during_drain_finishes() {
    let server = MockServer::start().await;
    let channel = RecordingChannel::default();
    let location = ScriptedLocation::new(vec![(new_york(), Duration::from_secs(10))]);
    let bridge = bridge(&server, location, channel.clone(), PlatformVariant::Basalt);

    let run = bridge.on_app_message(serde_json::json!({}));
    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(bridge.drain(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            bridge.shutdown().await;
        })
    })
    .await
    .expect("drain and shutdown return");

    assert!(run.await.unwrap().is_none());
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_pending_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let channel = RecordingChannel::default();
    let location = ScriptedLocation::new(vec![(new_york(), Duration::from_secs(10))]);
    let bridge = bridge(&server, location, channel.clone(), PlatformVariant::Basalt);

    let run = bridge.on_app_message(serde_json::json!({}));
    bridge.shutdown().await;

    assert!(run.await.unwrap().is_none());
    assert!(channel.sent().is_empty());
}
