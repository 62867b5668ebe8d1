use padnav::config::Settings;
use padnav::consumers::{
    Consumer, ConsumerRegistry, GlobalShortcutConsumer, NavigationConsumer, ShortcutCombo,
};
use padnav::controller::mock::MockController;
use padnav::controller::{ControllerHandle, RawButtons, RawFrame, SignalId, TransitionEvent, TransitionKind};
use padnav::overlay::{ui_channel, Direction, GameSession, OverlayView, UiBridge};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};

type Log = Arc<Mutex<Vec<TransitionEvent>>>;

struct Collect {
    name: &'static str,
    log: Log,
}

impl Collect {
    fn new(name: &'static str) -> (Box<dyn Consumer>, Log) {
        let log = Log::default();
        (
            Box::new(Self {
                name,
                log: Arc::clone(&log),
            }),
            log,
        )
    }
}

impl Consumer for Collect {
    fn name(&self) -> &str {
        self.name
    }

    fn consume(&mut self, events: &[TransitionEvent]) {
        self.log.lock().unwrap().extend_from_slice(events);
    }
}

#[derive(Default)]
struct View {
    visible: bool,
    moves: Vec<Direction>,
}

impl OverlayView for View {
    fn move_focus(&mut self, direction: Direction) {
        self.moves.push(direction);
    }

    fn activate_focused(&mut self) {}

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

fn kinds(log: &Log) -> Vec<(SignalId, TransitionKind)> {
    log.lock()
        .unwrap()
        .iter()
        .map(|e| (e.signal, e.kind))
        .collect()
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

#[tokio::test(start_paused = true)]
async fn held_stick_repeats_once_then_releases() {
    let mock = MockController::with_gamepad("Pad");
    let (consumer, log) = Collect::new("collect");
    let mut registry = ConsumerRegistry::new();
    registry.register(consumer, true);

    // stick well past the deadzone, held ~300ms at the 16ms period
    mock.set_frame(RawFrame::with_stick(0, -15_000));
    let start = Instant::now();
    let handle =
        ControllerHandle::spawn(&Settings::default(), Arc::new(registry), mock.backend())
            .expect("spawn");

    sleep(ms(300)).await;
    mock.set_frame(RawFrame::neutral());
    sleep(ms(100)).await;

    assert_eq!(
        kinds(&log),
        vec![
            (SignalId::Up, TransitionKind::Pressed),
            (SignalId::Up, TransitionKind::Repeated),
            (SignalId::Up, TransitionKind::Released),
        ]
    );

    let events = log.lock().unwrap().clone();
    let repeat_at = events[1].timestamp - start;
    assert!(repeat_at > ms(250) && repeat_at < ms(300));
    assert!(events[0].timestamp <= events[1].timestamp);
    assert!(events[1].timestamp <= events[2].timestamp);

    handle.shutdown().await.expect("stats");
}

#[tokio::test(start_paused = true)]
async fn disabled_consumer_sees_nothing() {
    let mock = MockController::with_gamepad("Pad");
    let (nav, nav_log) = Collect::new("nav");
    let (shortcut, shortcut_log) = Collect::new("shortcut");
    let mut registry = ConsumerRegistry::new();
    let nav_id = registry.register(nav, false);
    registry.register(shortcut, true);
    let registry = Arc::new(registry);

    let handle =
        ControllerHandle::spawn(&Settings::default(), Arc::clone(&registry), mock.backend())
            .expect("spawn");

    mock.set_frame(RawFrame::with_buttons(RawButtons::A));
    sleep(ms(50)).await;
    mock.set_frame(RawFrame::neutral());
    sleep(ms(50)).await;

    assert!(nav_log.lock().unwrap().is_empty());
    assert_eq!(
        kinds(&shortcut_log),
        vec![
            (SignalId::A, TransitionKind::Pressed),
            (SignalId::A, TransitionKind::Released),
        ]
    );

    registry.enable(nav_id);
    mock.set_frame(RawFrame::with_buttons(RawButtons::B));
    sleep(ms(50)).await;
    assert_eq!(kinds(&nav_log), vec![(SignalId::B, TransitionKind::Pressed)]);

    handle.shutdown().await.expect("stats");
}

#[tokio::test(start_paused = true)]
async fn consumer_enabled_mid_hold_waits_for_next_press() {
    let mock = MockController::with_gamepad("Pad");
    let (nav, nav_log) = Collect::new("nav");
    let mut registry = ConsumerRegistry::new();
    let nav_id = registry.register(nav, false);
    let registry = Arc::new(registry);

    let handle =
        ControllerHandle::spawn(&Settings::default(), Arc::clone(&registry), mock.backend())
            .expect("spawn");

    mock.set_frame(RawFrame::with_buttons(RawButtons::DPAD_DOWN));
    sleep(ms(100)).await;
    registry.enable(nav_id);

    // repeats at ~256ms and the release at ~350ms belong to the old hold
    sleep(ms(250)).await;
    mock.set_frame(RawFrame::neutral());
    sleep(ms(200)).await;
    assert!(nav_log.lock().unwrap().is_empty());

    mock.set_frame(RawFrame::with_buttons(RawButtons::DPAD_DOWN));
    sleep(ms(50)).await;
    mock.set_frame(RawFrame::neutral());
    sleep(ms(50)).await;
    assert_eq!(
        kinds(&nav_log),
        vec![
            (SignalId::Down, TransitionKind::Pressed),
            (SignalId::Down, TransitionKind::Released),
        ]
    );

    handle.shutdown().await.expect("stats");
}

#[tokio::test(start_paused = true)]
async fn no_controller_produces_no_events() {
    let mock = MockController::new();
    mock.add_device("Not a gamepad", false);
    let (consumer, log) = Collect::new("collect");
    let mut registry = ConsumerRegistry::new();
    registry.register(consumer, true);

    let handle =
        ControllerHandle::spawn(&Settings::default(), Arc::new(registry), mock.backend())
            .expect("dormant start");
    assert!(handle.device().is_none());

    mock.set_frame(RawFrame::with_buttons(RawButtons::GUIDE));
    sleep(ms(500)).await;

    assert!(log.lock().unwrap().is_empty());
    assert_eq!(mock.read_count(), 0);
    handle.shutdown().await.expect("stats");
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_device_once() {
    let mock = MockController::with_gamepad("Pad");
    let handle = ControllerHandle::spawn(
        &Settings::default(),
        Arc::new(ConsumerRegistry::new()),
        mock.backend(),
    )
    .expect("spawn");

    sleep(ms(100)).await;
    assert!(mock.read_count() > 0);

    let stats = handle.shutdown().await.expect("stats");
    assert!(stats.ticks > 0);
    assert_eq!(mock.release_count(), 1);
    assert_eq!(mock.acquired(), None);

    let reads = mock.read_count();
    sleep(ms(100)).await;
    assert_eq!(mock.read_count(), reads);
}

#[tokio::test(start_paused = true)]
async fn removal_goes_dormant_until_reopened() {
    let mock = MockController::with_gamepad("Pad");
    let (consumer, log) = Collect::new("collect");
    let mut registry = ConsumerRegistry::new();
    registry.register(consumer, true);

    let handle =
        ControllerHandle::spawn(&Settings::default(), Arc::new(registry), mock.backend())
            .expect("spawn");

    mock.set_frame(RawFrame::with_buttons(RawButtons::START));
    sleep(ms(50)).await;
    mock.disconnect();
    sleep(ms(50)).await;

    // the held button is released when the pad goes away
    assert_eq!(
        kinds(&log),
        vec![
            (SignalId::Start, TransitionKind::Pressed),
            (SignalId::Start, TransitionKind::Released),
        ]
    );
    let reads = mock.read_count();
    sleep(ms(200)).await;
    assert_eq!(mock.read_count(), reads);

    mock.reconnect();
    mock.set_frame(RawFrame::with_buttons(RawButtons::A));
    assert!(handle.request_reopen());
    sleep(ms(50)).await;

    assert_eq!(mock.acquire_count(), 2);
    assert_eq!(
        kinds(&log).last(),
        Some(&(SignalId::A, TransitionKind::Pressed))
    );

    handle.shutdown().await.expect("stats");
    assert_eq!(mock.release_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn shortcut_opens_overlay_and_navigation_follows() {
    let mock = MockController::with_gamepad("Pad");
    let game = GameSession::new();
    game.set_running(true);
    let (ui_tx, ui_rx) = ui_channel();

    let mut registry = ConsumerRegistry::new();
    registry.register(
        Box::new(GlobalShortcutConsumer::new(
            ShortcutCombo::StartBack,
            game,
            ui_tx.clone(),
        )),
        true,
    );
    let navigation = registry.register(Box::new(NavigationConsumer::new(ui_tx)), false);
    let registry = Arc::new(registry);

    let handle =
        ControllerHandle::spawn(&Settings::default(), Arc::clone(&registry), mock.backend())
            .expect("spawn");
    let mut bridge = UiBridge::new(ui_rx, Arc::clone(&registry), navigation);
    let mut view = View::default();

    // Down while hidden goes nowhere
    mock.set_frame(RawFrame::with_buttons(RawButtons::DPAD_DOWN));
    sleep(ms(50)).await;
    mock.set_frame(RawFrame::neutral());
    sleep(ms(150)).await;
    assert_eq!(bridge.pump(&mut view), 0);

    mock.set_frame(RawFrame::with_buttons(RawButtons::START.with(RawButtons::BACK)));
    sleep(ms(50)).await;
    mock.set_frame(RawFrame::neutral());
    sleep(ms(50)).await;
    assert_eq!(bridge.pump(&mut view), 1);
    assert!(view.visible);
    assert!(registry.is_enabled(navigation));

    mock.set_frame(RawFrame::with_buttons(RawButtons::DPAD_RIGHT));
    sleep(ms(50)).await;
    mock.set_frame(RawFrame::with_buttons(RawButtons::B));
    sleep(ms(50)).await;
    bridge.pump(&mut view);

    assert_eq!(view.moves, vec![Direction::Right]);
    assert!(!view.visible);
    assert!(!registry.is_enabled(navigation));

    handle.shutdown().await.expect("stats");
}
