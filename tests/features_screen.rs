use std::time::Duration;

use featureboard_lib::platform::simulated::SimulatedDevice;
use featureboard_lib::platform::{
    AccelerometerSample, BarometerSample, BatteryState, PermissionStatus,
};
use featureboard_lib::{
    run_demo, ActionOutcome, Capability, CapabilityError, DemoOptions, FeatureAction,
    FeatureSettings, FeaturesScreen, Panel, PlatformFamily,
};

/// Lets tasks spawned by a mount run to their next pending point
/// (mirror of the crate-internal `lifecycle::settle` test helper).
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn screen_on(device: &SimulatedDevice, platform: PlatformFamily) -> FeaturesScreen {
    let settings = FeatureSettings {
        platform,
        ..FeatureSettings::default()
    };
    FeaturesScreen::new(device.ports(), &settings)
}

#[tokio::test]
async fn mount_registers_one_listener_per_stream_and_unmount_releases_all() {
    let device = SimulatedDevice::new();
    let screen = screen_on(&device, PlatformFamily::Android);

    screen.mount().await.unwrap();
    settle().await;
    // accelerometer + barometer + three battery listeners
    assert_eq!(device.active_listeners(), 5);
    assert!(screen.panels().iter().all(|panel| panel.is_mounted()));

    screen.unmount();
    assert_eq!(device.active_listeners(), 0);
    assert!(screen.panels().iter().all(|panel| !panel.is_mounted()));
}

#[tokio::test]
async fn streams_after_unmount_change_nothing() {
    let device = SimulatedDevice::new();
    let screen = screen_on(&device, PlatformFamily::Android);
    screen.mount().await.unwrap();
    screen.unmount();
    let before = screen.snapshot();

    device.accelerometer.emit(AccelerometerSample {
        x: 0.7,
        y: 0.0,
        z: -1.0,
    });
    device.barometer.emit(BarometerSample {
        pressure: 1001.0,
        relative_altitude: Some(2.0),
    });
    device.battery.set_level(0.05);
    device.battery.set_state(BatteryState::Charging);

    assert_eq!(screen.snapshot(), before);
}

#[tokio::test]
async fn denied_camera_scenario() {
    let device = SimulatedDevice::new();
    device.camera.permission.set_answer(PermissionStatus::Denied);
    let screen = screen_on(&device, PlatformFamily::Ios);
    screen.mount().await.unwrap();

    let outcome = screen.dispatch(FeatureAction::Capture).await;

    assert_eq!(
        outcome,
        ActionOutcome::Failed(CapabilityError::PermissionDenied(Capability::Camera))
    );
    assert_eq!(device.camera.launches(), 0);
    assert_eq!(screen.camera.photo(), None);
    let camera = &screen.snapshot().panels[0];
    assert_eq!(camera.lines, vec!["Camera permission is required".to_string()]);
}

#[tokio::test]
async fn maps_follow_the_location_panel() {
    let device = SimulatedDevice::new();
    let screen = screen_on(&device, PlatformFamily::Ios);
    screen.mount().await.unwrap();

    assert_eq!(
        screen.dispatch(FeatureAction::OpenMaps).await,
        ActionOutcome::Skipped
    );
    assert!(device.urls.opened().is_empty());

    assert_eq!(
        screen.dispatch(FeatureAction::Locate).await,
        ActionOutcome::Completed
    );
    assert_eq!(
        screen.dispatch(FeatureAction::OpenMaps).await,
        ActionOutcome::Completed
    );
    assert_eq!(
        device.urls.opened(),
        vec!["http://maps.apple.com/?ll=37.33182,-122.03118".to_string()]
    );
}

#[tokio::test]
async fn capture_then_share() {
    let device = SimulatedDevice::new();
    let screen = screen_on(&device, PlatformFamily::Android);
    screen.mount().await.unwrap();

    assert_eq!(
        screen.dispatch(FeatureAction::Share).await,
        ActionOutcome::Skipped
    );
    assert_eq!(
        screen.dispatch(FeatureAction::Capture).await,
        ActionOutcome::Completed
    );
    assert_eq!(
        screen.dispatch(FeatureAction::Share).await,
        ActionOutcome::Completed
    );
    assert_eq!(device.sharing.shared().len(), 1);
}

#[tokio::test]
async fn biometrics_absent_scenario() {
    let device = SimulatedDevice::new();
    device.biometrics.set_hardware(false);
    let screen = screen_on(&device, PlatformFamily::Android);
    screen.mount().await.unwrap();

    screen.dispatch(FeatureAction::Authenticate).await;

    assert_eq!(device.biometrics.prompts(), 0);
    let biometric = screen.snapshot().panels[6].clone();
    assert_eq!(
        biometric.lines,
        vec!["No biometric hardware or no biometrics enrolled".to_string()]
    );
}

#[tokio::test]
async fn snapshot_serializes_in_display_order() {
    let device = SimulatedDevice::new();
    let screen = screen_on(&device, PlatformFamily::Web);
    screen.mount().await.unwrap();
    device.battery.set_level(0.42);

    let json = serde_json::to_value(screen.snapshot()).unwrap();

    let kinds: Vec<&str> = json["panels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|panel| panel["kind"].as_str().unwrap())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "camera",
            "location",
            "notification",
            "accelerometer",
            "barometer",
            "battery",
            "biometric"
        ]
    );
    assert_eq!(json["panels"][5]["lines"][0], "Level: 42%");
    assert_eq!(json["panels"][1]["actions"][1]["action"], "open-maps");
}

#[tokio::test]
async fn second_mount_is_rejected() {
    let device = SimulatedDevice::new();
    let screen = screen_on(&device, PlatformFamily::Android);
    screen.mount().await.unwrap();
    settle().await;

    assert!(screen.mount().await.is_err());
    assert_eq!(device.active_listeners(), 5);
}

#[tokio::test]
async fn demo_run_leaves_no_listeners_behind() {
    let snapshot = run_demo(DemoOptions {
        settings_path: None,
        platform: Some(PlatformFamily::Ios),
        run_for: Duration::from_millis(250),
        actions: vec![
            FeatureAction::Capture,
            FeatureAction::Locate,
            FeatureAction::OpenMaps,
            FeatureAction::Notify,
            FeatureAction::Authenticate,
        ],
    })
    .await
    .unwrap();

    assert_eq!(snapshot.panels.len(), 7);
    assert_eq!(
        snapshot.panels[2].lines,
        vec!["Scheduled a local notification for 5 seconds from now".to_string()]
    );
    assert_eq!(snapshot.panels[6].lines, vec!["Authenticated ✅".to_string()]);
}

#[tokio::test]
async fn stalled_barometer_probe_does_not_block_the_screen() {
    let device = SimulatedDevice::new();
    device.barometer.stall_probe(true);
    device.battery.stall_level_read(true);
    let screen = screen_on(&device, PlatformFamily::Android);

    let mounted = tokio::time::timeout(Duration::from_millis(300), screen.mount()).await;
    assert!(matches!(mounted, Ok(Ok(()))));
    settle().await;

    // accelerometer + three battery listeners; no barometer until it answers
    assert_eq!(device.active_listeners(), 4);
    assert_eq!(
        screen.dispatch(FeatureAction::Notify).await,
        ActionOutcome::Completed
    );
    let snapshot = screen.snapshot();
    assert_eq!(snapshot.panels[4].lines, vec!["Waiting for data...".to_string()]);
    assert_eq!(snapshot.panels[5].lines[1], "State: Unplugged");

    screen.unmount();
    assert_eq!(device.active_listeners(), 0);
}
