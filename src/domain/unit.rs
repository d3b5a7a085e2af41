// Flywheel unit operating state derived from the status code tag
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitState {
    Stopped,
    StartingUp,
    Idle,
    Charging,
    Discharging,
    Unknown,
}

impl UnitState {
    pub fn from_code(code: f64) -> Self {
        if code.fract() != 0.0 {
            return UnitState::Unknown;
        }
        match code as i64 {
            1 => UnitState::Stopped,
            2 => UnitState::StartingUp,
            3 | 6 | 7 => UnitState::Idle,
            4 => UnitState::Charging,
            5 => UnitState::Discharging,
            _ => UnitState::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UnitState::Stopped => "Stopped",
            UnitState::StartingUp => "Starting Up",
            UnitState::Idle => "Idle",
            UnitState::Charging => "Charging",
            UnitState::Discharging => "Discharging",
            UnitState::Unknown => "Unknown",
        }
    }
}
