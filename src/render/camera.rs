use glam::DVec3;

pub const FIELD_OF_VIEW_DEG: f64 = 75.0;
pub const NEAR_PLANE: f64 = 0.1;
pub const FAR_PLANE: f64 = 1000.0;

const ORBIT_ROTATE_SPEED: f64 = 0.01;
const ORBIT_PAN_SPEED: f64 = 0.01;
const ORBIT_ZOOM_STEP: f64 = 0.1;
const ORBIT_MIN_DISTANCE: f64 = 1.0;
const ORBIT_PHI_LIMIT: f64 = std::f64::consts::FRAC_PI_2 - 0.1;
/// Offset of the edit camera from the orbit target when entering Edit mode.
pub const EDIT_CAMERA_OFFSET: DVec3 = DVec3::new(10.0, 5.0, 10.0);

const FLY_FRICTION: f64 = 10.0;
const FLY_GRAVITY: f64 = 272.0;
const FLY_ACCELERATION: f64 = 400.0;
const FLY_JUMP_IMPULSE: f64 = 90.0;
const FLY_EYE_HEIGHT: f64 = 1.0;
const FLY_LOOK_SPEED: f64 = 0.01;
pub const PREVIEW_EYE: DVec3 = DVec3::new(0.0, 1.0, 5.0);
pub const PREVIEW_LOOK_AT: DVec3 = DVec3::new(0.0, 1.0, 0.0);

/// Where the camera is and where it looks. Y is up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: DVec3,
    pub forward: DVec3,
}

impl CameraPose {
    pub fn look_at(position: DVec3, target: DVec3) -> Self {
        let forward = (target - position).try_normalize().unwrap_or(DVec3::NEG_Z);
        Self { position, forward }
    }

    /// Right and up vectors completing the view basis.
    pub fn basis(&self) -> (DVec3, DVec3) {
        let right = self
            .forward
            .cross(DVec3::Y)
            .try_normalize()
            .unwrap_or(DVec3::X);
        let up = right.cross(self.forward).normalize_or_zero();
        (right, up)
    }

    pub fn target(&self) -> DVec3 {
        self.position + self.forward
    }
}

/// Edit-mode camera circling a target point.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: DVec3,
    pub distance: f64,
    pub theta: f64,
    pub phi: f64,
    pose: CameraPose,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        let mut camera = Self {
            target: DVec3::ZERO,
            distance: 10.0,
            theta: std::f64::consts::FRAC_PI_4,
            phi: std::f64::consts::FRAC_PI_6,
            pose: CameraPose::look_at(DVec3::ONE, DVec3::ZERO),
        };
        camera.update_pose();
        camera
    }
}

impl OrbitCamera {
    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// Places the camera at the fixed elevated offset from the target.
    /// The orbit angles keep their values and take over on the next drag.
    pub fn reset_for_edit(&mut self) {
        self.pose = CameraPose::look_at(self.target + EDIT_CAMERA_OFFSET, self.target);
    }

    pub fn update_pose(&mut self) {
        let offset = DVec3::new(
            self.distance * self.theta.cos() * self.phi.cos(),
            self.distance * self.phi.sin(),
            self.distance * self.theta.sin() * self.phi.cos(),
        );
        self.pose = CameraPose::look_at(self.target + offset, self.target);
    }

    pub fn orbit(&mut self, dx: f64, dy: f64) {
        self.theta += dx * ORBIT_ROTATE_SPEED;
        self.phi = (self.phi + dy * ORBIT_ROTATE_SPEED).clamp(-ORBIT_PHI_LIMIT, ORBIT_PHI_LIMIT);
        self.update_pose();
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        // Screen-left vector on the ground plane; dragging right moves the target right.
        let left = DVec3::Y.cross(self.pose.forward).normalize_or_zero();
        self.target += left * (-dx * ORBIT_PAN_SPEED);
        self.target += DVec3::Y * (dy * ORBIT_PAN_SPEED);
        self.update_pose();
    }

    /// Positive `delta` (wheel down) zooms out.
    pub fn zoom(&mut self, delta: f64) {
        if delta == 0.0 {
            return;
        }
        let factor = if delta > 0.0 {
            1.0 + ORBIT_ZOOM_STEP
        } else {
            1.0 - ORBIT_ZOOM_STEP
        };
        self.distance = (self.distance * factor).max(ORBIT_MIN_DISTANCE);
        self.update_pose();
    }
}

/// Movement keys currently held in Preview mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveIntent {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl MoveIntent {
    pub fn is_idle(&self) -> bool {
        !(self.forward || self.backward || self.left || self.right)
    }
}

/// Preview-mode first person camera with gravity and a ground clamp at eye height.
///
/// Integration uses the raw frame delta. The constants were tuned against
/// typical frame rates and the motion is not frame-rate independent.
#[derive(Debug, Clone, Copy)]
pub struct FlyCamera {
    pub position: DVec3,
    pub velocity: DVec3,
    pub yaw: f64,
    pub pitch: f64,
    pub can_jump: bool,
}

impl Default for FlyCamera {
    fn default() -> Self {
        let mut camera = Self {
            position: PREVIEW_EYE,
            velocity: DVec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            can_jump: false,
        };
        camera.reset();
        camera
    }
}

impl FlyCamera {
    pub fn reset(&mut self) {
        let pose = CameraPose::look_at(PREVIEW_EYE, PREVIEW_LOOK_AT);
        self.position = pose.position;
        self.velocity = DVec3::ZERO;
        let (yaw, pitch) = forward_to_yaw_pitch(pose.forward);
        self.yaw = yaw;
        self.pitch = pitch;
        self.can_jump = false;
    }

    pub fn forward(&self) -> DVec3 {
        let cos_pitch = self.pitch.cos();
        DVec3::new(
            -self.yaw.sin() * cos_pitch,
            self.pitch.sin(),
            -self.yaw.cos() * cos_pitch,
        )
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            forward: self.forward(),
        }
    }

    pub fn look(&mut self, dx: f64, dy: f64) {
        self.yaw -= dx * FLY_LOOK_SPEED;
        self.pitch = (self.pitch - dy * FLY_LOOK_SPEED)
            .clamp(-std::f64::consts::FRAC_PI_2, std::f64::consts::FRAC_PI_2);
        wrap_yaw(&mut self.yaw);
    }

    pub fn jump(&mut self) {
        if self.can_jump {
            self.velocity.y += FLY_JUMP_IMPULSE;
        }
        self.can_jump = false;
    }

    pub fn integrate(&mut self, intent: &MoveIntent, dt: f64) {
        self.velocity.x -= self.velocity.x * FLY_FRICTION * dt;
        self.velocity.z -= self.velocity.z * FLY_FRICTION * dt;
        self.velocity.y -= FLY_GRAVITY * dt;

        let mut flat_forward = self.forward();
        flat_forward.y = 0.0;
        let flat_forward = flat_forward.normalize_or_zero();
        let right = flat_forward.cross(DVec3::Y).normalize_or_zero();

        let input_x = intent.right as i32 - intent.left as i32;
        let input_z = intent.forward as i32 - intent.backward as i32;
        let wish = right * input_x as f64 + flat_forward * input_z as f64;
        if wish.length_squared() > 0.0 {
            let wish = wish.normalize();
            self.velocity.x += wish.x * FLY_ACCELERATION * dt;
            self.velocity.z += wish.z * FLY_ACCELERATION * dt;
        }

        self.position += self.velocity * dt;

        if self.position.y < FLY_EYE_HEIGHT {
            self.velocity.y = 0.0;
            self.position.y = FLY_EYE_HEIGHT;
            self.can_jump = true;
        }
    }
}

fn forward_to_yaw_pitch(forward: DVec3) -> (f64, f64) {
    let f = forward.try_normalize().unwrap_or(DVec3::NEG_Z);
    let yaw = (-f.x).atan2(-f.z);
    let pitch = f.y.clamp(-1.0, 1.0).asin();
    (yaw, pitch)
}

fn wrap_yaw(yaw: &mut f64) {
    const TWO_PI: f64 = std::f64::consts::PI * 2.0;
    if yaw.is_finite() {
        *yaw = (*yaw + std::f64::consts::PI).rem_euclid(TWO_PI) - std::f64::consts::PI;
    }
}
