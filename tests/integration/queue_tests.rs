//! Operator command queue and dispatch.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use autocar::app::commands::Command;
use autocar::app::events::AppEvent;
use autocar::app::ports::{EventSink, Services};
use autocar::app::queue::CommandQueue;
use autocar::app::service::Vehicle;
use autocar::config::VehicleConfig;

use crate::mock_hw::{MotorCall, Rig, WAIT, fast_config, rig};

fn vehicle(r: &Rig, config: VehicleConfig) -> Arc<Vehicle> {
    let sink: Arc<dyn EventSink> = r.sink.clone();
    let v = Arc::new(Vehicle::new(r.hw.clone(), Services::default(), config, sink));
    v.start();
    v
}

#[test]
fn unknown_tokens_are_dropped() {
    let r = rig(200.0);
    let queue = CommandQueue::spawn(vehicle(&r, fast_config()));

    queue.submit("warp");
    queue.submit("  ");
    queue.shutdown();

    assert_eq!(
        r.sink.count(|e| *e == AppEvent::CommandDropped("warp".to_owned())),
        1
    );
    assert_eq!(r.sink.count(|e| matches!(e, AppEvent::CommandDropped(_))), 2);
    assert_eq!(r.motor.calls(), vec![MotorCall::Stop], "only the shutdown stop");
}

#[test]
fn commands_run_in_order_and_shutdown_drains() {
    let r = rig(200.0);
    let queue = CommandQueue::spawn(vehicle(&r, fast_config()));

    for token in ["forward", "LEFT", " backward ", "stop", "right"] {
        queue.submit(token);
    }
    queue.shutdown();

    assert_eq!(
        r.motor.calls(),
        vec![
            MotorCall::Forward,
            MotorCall::Left,
            MotorCall::Stop,
            MotorCall::Backward,
            MotorCall::Stop,
            MotorCall::Right,
            MotorCall::Stop,
            MotorCall::Stop,
        ]
    );
    let events = r.sink.events();
    assert_eq!(events.first(), Some(&AppEvent::Started));
    assert_eq!(events.last(), Some(&AppEvent::Shutdown));
    assert!(!queue.vehicle().is_running());
}

#[test]
fn shutdown_is_idempotent_and_later_submits_are_ignored() {
    let r = rig(200.0);
    let queue = CommandQueue::spawn(vehicle(&r, fast_config()));

    queue.shutdown();
    queue.shutdown();
    queue.submit_command(Command::Forward);

    assert_eq!(r.sink.count(|e| *e == AppEvent::Shutdown), 1);
    assert_eq!(r.motor.count(MotorCall::Forward), 0);
}

#[test]
fn navigation_ops_need_a_running_loop() {
    let r = rig(200.0);
    let queue = CommandQueue::spawn(vehicle(&r, fast_config()));

    queue.submit("pause");
    queue.submit("scan");
    queue.shutdown();

    assert_eq!(r.sink.count(|e| matches!(e, AppEvent::CommandDropped(_))), 2);
    assert!(r.servo.angles().iter().all(|a| *a == 0), "no sweep happened");
}

#[test]
fn servo_steps_are_clamped() {
    let r = rig(200.0);
    let v = vehicle(&r, fast_config());

    for _ in 0..8 {
        v.dispatch(Command::ServoRight);
    }
    assert_eq!(v.state().servo_angle(), 90);
    v.dispatch(Command::ServoLeft);
    assert_eq!(v.state().servo_angle(), 75);
    v.dispatch(Command::ServoAhead);
    assert_eq!(v.state().servo_angle(), 0);
    v.shutdown();
}

#[test]
fn mode_commands_run_off_the_dispatch_thread() {
    let r = rig(200.0);
    let queue = CommandQueue::spawn(vehicle(&r, fast_config()));

    queue.submit("selfdrivingon");
    // Dispatch is not blocked by the grace period or the loop.
    queue.submit("beep");
    assert!(r.sink.wait_for(WAIT, |e| matches!(e, AppEvent::ModeEnabled(_))));
    assert!(queue.vehicle().flags().self_driving);
    let deadline = Instant::now() + WAIT;
    while r.motor.last() != Some(MotorCall::Forward) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }

    queue.submit("scan");
    assert!(r.sink.wait_for(WAIT, |e| matches!(e, AppEvent::Scanned(_))));
    assert_eq!(r.sink.count(|e| matches!(e, AppEvent::CommandDropped(_))), 0);

    queue.submit("selfdrivingoff");
    assert!(r.sink.wait_for(WAIT, |e| matches!(e, AppEvent::ModeDisabled(_))));
    thread::sleep(Duration::from_millis(50));
    queue.shutdown();
    assert_eq!(queue.vehicle().flags().count(), 0);
    assert_eq!(r.motor.last(), Some(MotorCall::Stop));
}

#[test]
fn mode_request_in_its_grace_period_dies_with_shutdown() {
    let r = rig(200.0);
    let queue = CommandQueue::spawn(vehicle(&r, fast_config()));

    queue.submit("selfdrivingon");
    assert!(r.sink.wait_for(WAIT, |e| *e == AppEvent::ModesCleared));
    queue.shutdown();
    // Well past the 50 ms grace period the request was waiting out.
    thread::sleep(Duration::from_millis(200));

    assert!(queue.vehicle().state().is_closed());
    assert_eq!(queue.vehicle().flags().count(), 0);
    assert_eq!(r.sink.count(|e| matches!(e, AppEvent::ModeEnabled(_))), 0);
    assert_eq!(r.motor.count(MotorCall::Forward), 0);
    assert_eq!(r.motor.last(), Some(MotorCall::Stop));

    queue.submit_command(Command::SelfDrivingOn);
    queue.vehicle().dispatch(Command::SelfDrivingOn);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(queue.vehicle().flags().count(), 0);
}
