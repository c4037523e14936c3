//! Hand-off to the bundled arcade game templates.

/// Bundled templates, by file stem.
pub const TEMPLATE_NAMES: &[&str] = &[
    "asteroids2D",
    "basic2",
    "breakout2D",
    "collector2D",
    "endlessRunner3D",
    "maze2D",
    "maze3D",
    "parkour3D-firstperson",
    "parkour3D-thirdperson",
    "pong2D",
    "pong3D",
    "puzzle",
    "race2d",
    "race3d",
    "rpg2D",
    "rpg3D",
    "rubik",
    "runner2D",
    "runner3D",
    "shooter2D",
    "snake2D",
    "snake3D",
    "spaceShooter2D",
    "spaceShooter3D",
    "survival2D",
    "survival3D",
    "towerDefense2D",
    "towerDefense3D",
];

/// A running game. `destroy` must remove its surface, detach its listeners
/// and release its GPU resources.
pub trait GameRuntime {
    fn name(&self) -> &str;
    fn start(&mut self);
    fn destroy(&mut self);
}

/// Keeps at most one template running.
#[derive(Default)]
pub struct TemplateLauncher {
    active: Option<Box<dyn GameRuntime>>,
}

impl TemplateLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref().map(|runtime| runtime.name())
    }

    pub fn is_known(name: &str) -> bool {
        TEMPLATE_NAMES.contains(&name)
    }

    pub fn launch(&mut self, mut runtime: Box<dyn GameRuntime>) {
        self.shutdown();
        log::info!("Starting template '{}'", runtime.name());
        runtime.start();
        self.active = Some(runtime);
    }

    pub fn shutdown(&mut self) {
        if let Some(mut runtime) = self.active.take() {
            log::info!("Destroying template '{}'", runtime.name());
            runtime.destroy();
        }
    }
}

impl Drop for TemplateLauncher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
