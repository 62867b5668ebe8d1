use color_eyre::Result;
use padnav::config::Settings;
use padnav::consumers::{ConsumerRegistry, GlobalShortcutConsumer, NavigationConsumer};
use padnav::controller::{ControllerError, ControllerHandle};
use padnav::overlay::{ui_channel, Direction, GameSession, OverlayView, UiBridge};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings_path = Settings::default_path();
    let settings = Settings::load_or_default(settings_path.as_deref()).await;
    info!("Input settings: {:?}", settings);

    // Standalone runs have no process discovery, treat the game as running
    let game = GameSession::new();
    game.set_running(true);

    let (ui_tx, ui_rx) = ui_channel();

    let mut registry = ConsumerRegistry::new();
    registry.register(
        Box::new(GlobalShortcutConsumer::new(
            settings.shortcut,
            game.clone(),
            ui_tx.clone(),
        )),
        true,
    );
    let navigation = registry.register(Box::new(NavigationConsumer::new(ui_tx)), false);
    let registry = Arc::new(registry);

    let controller = match ControllerHandle::spawn_gilrs(&settings, Arc::clone(&registry)) {
        Ok(handle) => handle,
        Err(ControllerError::InvalidSettings(e)) => {
            warn!("{}; falling back to default input settings", e);
            ControllerHandle::spawn_gilrs(&Settings::default(), Arc::clone(&registry))
                .unwrap_or_else(|e| {
                    error!("Controller backend unavailable: {}", e);
                    ControllerHandle::dormant()
                })
        }
        Err(e) => {
            error!("Controller backend unavailable: {}", e);
            ControllerHandle::dormant()
        }
    };

    if let Some(device) = controller.device() {
        info!("Using controller: {}", device.name);
    }

    let mut bridge = UiBridge::new(ui_rx, Arc::clone(&registry), navigation);
    let mut view = HeadlessOverlay::default();

    info!("Waiting for {} (ctrl-c to quit)", settings.shortcut);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            command = bridge.recv() => match command {
                Some(command) => bridge.apply(command, &mut view),
                None => {
                    warn!("UI command channel closed");
                    break;
                }
            },
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!("Failed to listen for ctrl-c: {}", e);
                }
                info!("Shutdown requested");
                break;
            }
        }
    }

    if let Some(stats) = controller.shutdown().await {
        info!("Controller input stopped after {} ticks", stats.ticks);
    }
    Ok(())
}

/// Stand-in overlay that only logs what a window would do
#[derive(Debug, Default)]
struct HeadlessOverlay {
    visible: bool,
    focus: (i32, i32),
}

impl OverlayView for HeadlessOverlay {
    fn move_focus(&mut self, direction: Direction) {
        let (x, y) = self.focus;
        self.focus = match direction {
            Direction::Up => (x, y - 1),
            Direction::Down => (x, y + 1),
            Direction::Left => (x - 1, y),
            Direction::Right => (x + 1, y),
        };
        info!("Focus {} -> {:?}", direction, self.focus);
    }

    fn activate_focused(&mut self) {
        info!("Activate {:?}", self.focus);
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        info!("Overlay {}", if visible { "shown" } else { "hidden" });
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
