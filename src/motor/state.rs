// Motor state container
//
// Holds the control mode, commanded run state, setpoints and PID gains.
// This is a dumb data holder: range clamping and mode gating are the
// command interpreter's job, the frame encoder only reads from it.

/// Which setpoint governs the motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Open-loop duty cycle
    Pwm,
    /// Closed-loop speed in rotations per second
    Speed,
}

/// Commanded mechanical behavior, independent of the control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Coast,
    Cw,
    Ccw,
    Brake,
}

/// The node's single motor. Created once at startup, mutated only by the
/// command interpreter, read by the frame encoder on every publish.
#[derive(Debug, Clone)]
pub struct Motor {
    control_mode: ControlMode,
    run_state: RunState,
    duty_cycle: f32,
    speed_rps: f32,
    kp: f32,
    ki: f32,
    kd: f32,
}

impl Motor {
    /// Startup state: PWM mode, braked, zero duty
    pub fn new() -> Self {
        Self {
            control_mode: ControlMode::Pwm,
            run_state: RunState::Brake,
            duty_cycle: 0.0,
            speed_rps: 0.0,
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
        }
    }

    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn duty_cycle(&self) -> f32 {
        self.duty_cycle
    }

    pub fn speed_rps(&self) -> f32 {
        self.speed_rps
    }

    pub fn gains(&self) -> (f32, f32, f32) {
        (self.kp, self.ki, self.kd)
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) {
        self.control_mode = mode;
    }

    pub fn set_run_state(&mut self, state: RunState) {
        self.run_state = state;
    }

    pub fn set_duty_cycle(&mut self, duty: f32) {
        self.duty_cycle = duty;
    }

    pub fn set_speed(&mut self, rps: f32) {
        self.speed_rps = rps;
    }

    /// Set kp and ki together; kd is always derived as ki / 4 (fixed ratio,
    /// not independently settable in this controller).
    pub fn set_gains(&mut self, kp: f32, ki: f32) {
        self.kp = kp;
        self.ki = ki;
        self.kd = ki / 4.0;
    }
}

impl Default for Motor {
    fn default() -> Self {
        Self::new()
    }
}
