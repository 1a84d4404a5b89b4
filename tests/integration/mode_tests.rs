//! Mode arbitration against a mock car.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use autocar::app::events::AppEvent;
use autocar::app::ports::{BoundingBox, EventSink, Services};
use autocar::config::VehicleConfig;
use autocar::fsm::NavOp;
use autocar::fsm::context::{Mode, VehicleState};
use autocar::mode::ModeController;

use crate::mock_hw::{
    CountingVideo, MotorCall, Rig, ScriptedSpeech, ScriptedTrackers, WAIT, fast_config, rig,
};

fn controller(rig: &Rig, services: Services, config: VehicleConfig) -> Arc<ModeController> {
    let sink: Arc<dyn EventSink> = rig.sink.clone();
    Arc::new(ModeController::new(
        rig.hw.clone(),
        services,
        Arc::new(VehicleState::new()),
        Arc::new(config),
        sink,
    ))
}

fn enabled(mode: Mode) -> impl Fn(&AppEvent) -> bool {
    move |e| *e == AppEvent::ModeEnabled(mode)
}

#[test]
fn grace_period_separates_clear_and_enable() {
    let r = rig(200.0);
    let config = VehicleConfig {
        mode_grace_ms: 150,
        ..fast_config()
    };
    let modes = controller(&r, Services::default(), config);

    let m = Arc::clone(&modes);
    let loop_thread = thread::spawn(move || m.enable_self_driving());

    assert!(r.sink.wait_for(WAIT, enabled(Mode::SelfDriving)));
    let cleared = r.sink.first_at(|e| *e == AppEvent::ModesCleared).unwrap();
    let raised = r.sink.first_at(enabled(Mode::SelfDriving)).unwrap();
    assert!(
        raised.duration_since(cleared) >= Duration::from_millis(150),
        "mode raised {:?} after clear",
        raised.duration_since(cleared)
    );
    assert!(modes.flags().self_driving);

    modes.disable_self_driving();
    loop_thread.join().unwrap();
    assert!(!modes.flags().self_driving);
    assert_eq!(r.motor.last(), Some(MotorCall::Stop));
}

#[test]
fn latest_request_wins() {
    let r = rig(200.0);
    let services = Services {
        speech: Some(Arc::new(ScriptedSpeech::default())),
        ..Services::default()
    };
    let config = VehicleConfig {
        mode_grace_ms: 100,
        ..fast_config()
    };
    let modes = controller(&r, services, config);

    let m = Arc::clone(&modes);
    let first = thread::spawn(move || m.enable_self_driving());
    thread::sleep(Duration::from_millis(30));
    let m = Arc::clone(&modes);
    let second = thread::spawn(move || m.enable_speech_driving());

    // The superseded request gives up without running a loop.
    first.join().unwrap();
    assert!(r.sink.wait_for(WAIT, enabled(Mode::SpeechDriving)));
    assert_eq!(r.sink.count(enabled(Mode::SelfDriving)), 0);

    let flags = modes.flags();
    assert!(flags.speech_driving);
    assert_eq!(flags.count(), 1);

    modes.disable_speech_driving();
    second.join().unwrap();
    assert_eq!(modes.flags().count(), 0);
}

#[test]
fn at_most_one_flag_under_contention() {
    let r = rig(200.0);
    let services = Services {
        speech: Some(Arc::new(ScriptedSpeech::default())),
        ..Services::default()
    };
    let config = VehicleConfig {
        mode_grace_ms: 200,
        ..fast_config()
    };
    let modes = controller(&r, services, config);

    let mut threads = Vec::new();
    for i in 0..6 {
        let m = Arc::clone(&modes);
        threads.push(thread::spawn(move || {
            if i % 2 == 0 {
                m.enable_self_driving();
            } else {
                m.enable_speech_driving();
            }
        }));
        thread::sleep(Duration::from_millis(7));
    }

    for _ in 0..40 {
        assert!(modes.flags().count() <= 1);
        thread::sleep(Duration::from_millis(5));
    }
    assert!(r.sink.wait_for(WAIT, |e| matches!(e, AppEvent::ModeEnabled(_))));
    assert_eq!(r.sink.count(|e| matches!(e, AppEvent::ModeEnabled(_))), 1);

    modes.disable_self_driving();
    modes.disable_speech_driving();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(modes.flags().count(), 0);
}

#[test]
fn self_driving_needs_a_distance_sensor() {
    let mut r = rig(200.0);
    r.hw.distance = None;
    let modes = controller(&r, Services::default(), fast_config());

    modes.enable_self_driving();

    assert_eq!(modes.flags().count(), 0);
    assert_eq!(
        r.sink.count(|e| matches!(
            e,
            AppEvent::ModeAborted {
                mode: Mode::SelfDriving,
                ..
            }
        )),
        1
    );
    assert_eq!(r.sink.count(|e| *e == AppEvent::ModesCleared), 0);
    assert!(r.motor.calls().is_empty());
}

#[test]
fn missing_services_abort_their_modes() {
    let r = rig(200.0);
    let modes = controller(&r, Services::default(), fast_config());

    modes.enable_self_tracking();
    modes.enable_speech_driving();

    assert_eq!(r.sink.count(|e| matches!(e, AppEvent::ModeAborted { .. })), 2);
    assert_eq!(modes.flags().count(), 0);
}

#[test]
fn tracker_failure_aborts_after_clearing() {
    let r = rig(200.0);
    let video = Arc::new(CountingVideo::default());
    let services = Services {
        trackers: Some(Arc::new(ScriptedTrackers::broken())),
        video: Some(video.clone()),
        ..Services::default()
    };
    let modes = controller(&r, services, fast_config());

    modes.enable_self_tracking();

    assert_eq!(video.stops.load(Ordering::SeqCst), 1);
    assert_eq!(r.sink.count(|e| *e == AppEvent::ModesCleared), 1);
    assert!(r.sink.events().contains(&AppEvent::ModeAborted {
        mode: Mode::SelfTracking,
        reason: "tracker unavailable",
    }));
    assert_eq!(modes.flags().count(), 0);
}

#[test]
fn self_tracking_follows_a_target_and_hands_camera_back() {
    let r = rig(200.0);
    let target = BoundingBox {
        min_x: 250,
        min_y: 50,
        max_x: 350,
        max_y: 150,
    };
    let trackers = Arc::new(ScriptedTrackers::new(vec![None, None, None], Some(target)));
    let video = Arc::new(CountingVideo::default());
    let services = Services {
        trackers: Some(trackers.clone()),
        video: Some(video.clone()),
        ..Services::default()
    };
    let modes = controller(&r, services, fast_config());

    let m = Arc::clone(&modes);
    let loop_thread = thread::spawn(move || m.enable_self_tracking());

    assert!(r.sink.wait_for(WAIT, |e| *e == AppEvent::TargetAcquired));
    assert!(r.sink.wait_for(WAIT, |e| *e
        == AppEvent::OpChanged {
            from: NavOp::Forward,
            to: NavOp::Pause,
        }));
    // Centred target: the follower drives straight at it.
    thread::sleep(Duration::from_millis(30));
    assert!(r.motor.count(MotorCall::Forward) >= 2);

    modes.disable_self_tracking();
    loop_thread.join().unwrap();

    assert_eq!(trackers.opened(), 1);
    assert_eq!(video.stops.load(Ordering::SeqCst), 1);
    assert_eq!(video.starts.load(Ordering::SeqCst), 1);
    assert_eq!(modes.flags().count(), 0);
    assert_eq!(r.motor.last(), Some(MotorCall::Stop));
}

#[test]
fn disabling_an_inactive_mode_is_quiet() {
    let r = rig(200.0);
    let video = Arc::new(CountingVideo::default());
    let services = Services {
        video: Some(video.clone()),
        ..Services::default()
    };
    let modes = controller(&r, services, fast_config());

    modes.disable_self_driving();
    modes.disable_self_tracking();
    modes.disable_speech_driving();

    assert!(r.sink.events().is_empty());
    assert_eq!(video.starts.load(Ordering::SeqCst), 0);
}
