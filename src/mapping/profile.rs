//! Mapping profiles
//!
//! A `MappingProfile` binds virtual gamepad targets to Wiimote buttons and
//! describes how the accelerometer drives an analog target. Profiles are
//! plain serde documents; the store persists them as JSON.

use crate::mapping::frame::{GamepadButton, GamepadSlider};
use crate::wiimote::types::DeviceButton;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Schema version written by this crate
pub const CURRENT_VERSION: u32 = 2;

/// Name of the built-in profile that always exists
pub const DEFAULT_PROFILE_NAME: &str = "Default";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Profile '{name}' is invalid: {}", .reasons.join("; "))]
    Invalid { name: String, reasons: Vec<String> },

    #[error("Profile '{name}' has version {version}, newer than supported version {supported}")]
    UnsupportedVersion {
        name: String,
        version: u32,
        supported: u32,
    },
}

/// Virtual gamepad control a device button can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GamepadTarget {
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    LeftTrigger,
    RightTrigger,
    Start,
    Back,
    Guide,
    LeftThumb,
    RightThumb,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
}

/// Where a bound target lands in the virtual controller frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutput {
    Button(GamepadButton),
    /// Digital press drives the slider to full scale
    Slider(GamepadSlider),
}

impl GamepadTarget {
    pub const ALL: [GamepadTarget; 17] = [
        GamepadTarget::A,
        GamepadTarget::B,
        GamepadTarget::X,
        GamepadTarget::Y,
        GamepadTarget::LeftShoulder,
        GamepadTarget::RightShoulder,
        GamepadTarget::LeftTrigger,
        GamepadTarget::RightTrigger,
        GamepadTarget::Start,
        GamepadTarget::Back,
        GamepadTarget::Guide,
        GamepadTarget::LeftThumb,
        GamepadTarget::RightThumb,
        GamepadTarget::DPadUp,
        GamepadTarget::DPadDown,
        GamepadTarget::DPadLeft,
        GamepadTarget::DPadRight,
    ];

    pub fn output(self) -> TargetOutput {
        match self {
            GamepadTarget::A => TargetOutput::Button(GamepadButton::A),
            GamepadTarget::B => TargetOutput::Button(GamepadButton::B),
            GamepadTarget::X => TargetOutput::Button(GamepadButton::X),
            GamepadTarget::Y => TargetOutput::Button(GamepadButton::Y),
            GamepadTarget::LeftShoulder => TargetOutput::Button(GamepadButton::LeftShoulder),
            GamepadTarget::RightShoulder => TargetOutput::Button(GamepadButton::RightShoulder),
            GamepadTarget::LeftTrigger => TargetOutput::Slider(GamepadSlider::LeftTrigger),
            GamepadTarget::RightTrigger => TargetOutput::Slider(GamepadSlider::RightTrigger),
            GamepadTarget::Start => TargetOutput::Button(GamepadButton::Start),
            GamepadTarget::Back => TargetOutput::Button(GamepadButton::Back),
            GamepadTarget::Guide => TargetOutput::Button(GamepadButton::Guide),
            GamepadTarget::LeftThumb => TargetOutput::Button(GamepadButton::LeftThumb),
            GamepadTarget::RightThumb => TargetOutput::Button(GamepadButton::RightThumb),
            GamepadTarget::DPadUp => TargetOutput::Button(GamepadButton::DPadUp),
            GamepadTarget::DPadDown => TargetOutput::Button(GamepadButton::DPadDown),
            GamepadTarget::DPadLeft => TargetOutput::Button(GamepadButton::DPadLeft),
            GamepadTarget::DPadRight => TargetOutput::Button(GamepadButton::DPadRight),
        }
    }
}

/// Analog destination of the shaped tilt signals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccelTarget {
    /// Steering on X, pitch on Y
    #[default]
    LeftStick,
    RightStick,
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
    /// Forward pitch presses the trigger
    LeftTrigger,
    RightTrigger,
}

/// Accelerometer-to-analog settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelerometerMapping {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub target: AccelTarget,

    /// Gain applied after normalising to the maximum tilt (> 0)
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,

    /// Magnitudes at or below this are zeroed (0.0 to 1.0)
    #[serde(default = "default_dead_zone")]
    pub dead_zone: f32,

    #[serde(default)]
    pub invert: bool,

    /// Response curve: sign(v) * |v|^exponent
    #[serde(default = "default_curve_exponent")]
    pub curve_exponent: f32,
}

impl Default for AccelerometerMapping {
    fn default() -> Self {
        Self {
            enabled: false,
            target: AccelTarget::default(),
            sensitivity: default_sensitivity(),
            dead_zone: default_dead_zone(),
            invert: false,
            curve_exponent: default_curve_exponent(),
        }
    }
}

fn default_sensitivity() -> f32 { 2.2 }
fn default_dead_zone() -> f32 { 0.05 }
fn default_curve_exponent() -> f32 { 1.0 }
fn default_author() -> String { "User".to_string() }
fn legacy_version() -> u32 { 1 }

/// A named, versioned set of bindings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingProfile {
    pub name: String,

    /// Documents without a version predate versioning
    #[serde(default = "legacy_version")]
    pub version: u32,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub associated_games: Vec<String>,

    #[serde(default = "default_author")]
    pub author: String,

    /// Unix seconds; 0 means never
    #[serde(default)]
    pub created_at: u64,

    #[serde(default)]
    pub modified_at: u64,

    #[serde(default)]
    pub last_used_at: u64,

    #[serde(default)]
    pub usage_count: u32,

    #[serde(default)]
    pub is_favorite: bool,

    /// Unbound targets are absent
    #[serde(default)]
    pub buttons: BTreeMap<GamepadTarget, DeviceButton>,

    #[serde(default)]
    pub accelerometer: AccelerometerMapping,
}

impl MappingProfile {
    /// Empty profile with no bindings
    pub fn new(name: impl Into<String>) -> Self {
        let now = unix_now();
        Self {
            name: name.into(),
            version: CURRENT_VERSION,
            description: String::new(),
            tags: Vec::new(),
            associated_games: Vec::new(),
            author: default_author(),
            created_at: now,
            modified_at: now,
            last_used_at: 0,
            usage_count: 0,
            is_favorite: false,
            buttons: BTreeMap::new(),
            accelerometer: AccelerometerMapping::default(),
        }
    }

    /// The built-in "Default" profile: horizontal grip, NES style
    pub fn default_profile() -> Self {
        let mut profile = Self::new(DEFAULT_PROFILE_NAME);
        profile.description = "Classic NES-style horizontal Wiimote mapping".to_string();
        profile.tags = vec!["Default".to_string(), "Classic".to_string()];
        profile.author = "System".to_string();
        profile.buttons = bindings(&[
            (GamepadTarget::A, DeviceButton::Two),
            (GamepadTarget::B, DeviceButton::One),
            (GamepadTarget::X, DeviceButton::A),
            (GamepadTarget::Y, DeviceButton::B),
            (GamepadTarget::DPadUp, DeviceButton::DPadRight),
            (GamepadTarget::DPadDown, DeviceButton::DPadLeft),
            (GamepadTarget::DPadLeft, DeviceButton::DPadUp),
            (GamepadTarget::DPadRight, DeviceButton::DPadDown),
            (GamepadTarget::Start, DeviceButton::Plus),
            (GamepadTarget::Back, DeviceButton::Minus),
            (GamepadTarget::Guide, DeviceButton::Home),
        ]);
        profile
    }

    pub fn binding(&self, target: GamepadTarget) -> Option<DeviceButton> {
        self.buttons.get(&target).copied()
    }

    /// Bind or unbind a target
    pub fn bind(&mut self, target: GamepadTarget, button: Option<DeviceButton>) {
        match button {
            Some(button) => {
                self.buttons.insert(target, button);
            }
            None => {
                self.buttons.remove(&target);
            }
        }
    }

    /// Every validation failure, empty when the profile is valid
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Profile name cannot be empty".to_string());
        }

        if self.version > CURRENT_VERSION {
            errors.push(format!(
                "Profile version {} is newer than supported version {}",
                self.version, CURRENT_VERSION
            ));
        }

        let accel = &self.accelerometer;
        if accel.enabled {
            // Negated comparisons so NaN fails too
            if !(accel.sensitivity > 0.0) {
                errors.push("Accelerometer sensitivity must be positive".to_string());
            }
            if !(0.0..=1.0).contains(&accel.dead_zone) {
                errors.push("Accelerometer dead zone must be between 0 and 1".to_string());
            }
            if !(accel.curve_exponent > 0.0) {
                errors.push("Accelerometer curve exponent must be positive".to_string());
            }
        }

        errors
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        let reasons = self.validation_errors();
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ProfileError::Invalid {
                name: self.name.clone(),
                reasons,
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validation_errors().is_empty()
    }

    /// Copy with a new name and fresh usage statistics
    pub fn clone_as(&self, name: impl Into<String>) -> Self {
        let now = unix_now();
        Self {
            name: name.into(),
            version: CURRENT_VERSION,
            created_at: now,
            modified_at: now,
            last_used_at: 0,
            usage_count: 0,
            is_favorite: false,
            ..self.clone()
        }
    }

    /// Called each time the profile is activated
    pub fn record_usage(&mut self) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.last_used_at = unix_now();
        debug!("Profile '{}' used {} times", self.name, self.usage_count);
    }

    /// Upgrade an older document to `CURRENT_VERSION`
    pub fn migrate(mut self) -> Result<Self, ProfileError> {
        if self.version > CURRENT_VERSION {
            return Err(ProfileError::UnsupportedVersion {
                name: self.name,
                version: self.version,
                supported: CURRENT_VERSION,
            });
        }

        if self.version < 2 {
            // v1 had no metadata block
            info!("Migrating profile '{}' from v{} to v2", self.name, self.version);
            if self.author.trim().is_empty() {
                self.author = default_author();
            }
            if self.created_at == 0 {
                self.created_at = unix_now();
            }
            if self.modified_at == 0 {
                self.modified_at = self.created_at;
            }
            self.version = 2;
        }

        Ok(self)
    }
}

/// Built-in genre templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileTemplate {
    Racing,
    Platformer,
    Fighting,
    Shooter,
    Sports,
    Party,
    RocketLeague,
}

impl ProfileTemplate {
    pub const ALL: [ProfileTemplate; 7] = [
        ProfileTemplate::Racing,
        ProfileTemplate::Platformer,
        ProfileTemplate::Fighting,
        ProfileTemplate::Shooter,
        ProfileTemplate::Sports,
        ProfileTemplate::Party,
        ProfileTemplate::RocketLeague,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProfileTemplate::Racing => "Racing Game (Tilt Steering)",
            ProfileTemplate::Platformer => "Platformer (Mario Style)",
            ProfileTemplate::Fighting => "Fighting Game",
            ProfileTemplate::Shooter => "FPS/Shooter",
            ProfileTemplate::Sports => "Sports Game",
            ProfileTemplate::Party => "Party Game (Ultimate Chicken Horse)",
            ProfileTemplate::RocketLeague => "Rocket League (Tilt Pro)",
        }
    }

    /// Case-insensitive lookup by template name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|template| template.name().eq_ignore_ascii_case(name))
    }

    fn description(self) -> &'static str {
        match self {
            ProfileTemplate::Racing => "Tilt to steer, buttons for gas and brake.",
            ProfileTemplate::Platformer => "2D platformers with the classic horizontal grip.",
            ProfileTemplate::Fighting => "Every face button within reach for fighting games.",
            ProfileTemplate::Shooter => "First-person shooter layout.",
            ProfileTemplate::Sports => "General sports game controls.",
            ProfileTemplate::Party => "Horizontal grip for party games.",
            ProfileTemplate::RocketLeague => "2 accelerate, 1 jump, B boost, A brake, tilt steering.",
        }
    }

    fn tags(self) -> &'static [&'static str] {
        match self {
            ProfileTemplate::Racing => &["Racing", "Motion", "Accelerometer"],
            ProfileTemplate::Platformer => &["Platformer", "2D", "Classic"],
            ProfileTemplate::Fighting => &["Fighting", "Arcade"],
            ProfileTemplate::Shooter => &["FPS", "Shooter", "Action"],
            ProfileTemplate::Sports => &["Sports"],
            ProfileTemplate::Party => &["Party", "Arcade", "Platformer"],
            ProfileTemplate::RocketLeague => &["Rocket League", "Racing", "Tilt", "Competitive"],
        }
    }

    fn games(self) -> &'static [&'static str] {
        match self {
            ProfileTemplate::Racing => &["Need for Speed", "Forza Horizon", "Mario Kart", "TrackMania"],
            ProfileTemplate::Platformer => &["Super Mario", "Sonic", "Celeste", "Hollow Knight"],
            ProfileTemplate::Fighting => &["Street Fighter", "Mortal Kombat", "Tekken"],
            ProfileTemplate::Shooter => &["Halo", "Doom", "Counter-Strike"],
            ProfileTemplate::Sports => &["FIFA", "NBA 2K", "Madden NFL"],
            ProfileTemplate::Party => &["Ultimate Chicken Horse", "Overcooked", "Move or Die"],
            ProfileTemplate::RocketLeague => &["Rocket League"],
        }
    }

    fn bindings(self) -> BTreeMap<GamepadTarget, DeviceButton> {
        use DeviceButton as W;
        use GamepadTarget as T;

        match self {
            ProfileTemplate::Racing => bindings(&[
                (T::A, W::Two),
                (T::B, W::One),
                (T::X, W::A),
                (T::Y, W::B),
                (T::LeftShoulder, W::DPadLeft),
                (T::RightShoulder, W::DPadRight),
                (T::DPadUp, W::DPadUp),
                (T::DPadDown, W::DPadDown),
                (T::Start, W::Plus),
                (T::Back, W::Minus),
                (T::Guide, W::Home),
            ]),
            ProfileTemplate::Platformer => MappingProfile::default_profile().buttons,
            ProfileTemplate::Fighting => bindings(&[
                (T::A, W::A),
                (T::B, W::Two),
                (T::X, W::B),
                (T::Y, W::One),
                (T::LeftShoulder, W::Minus),
                (T::RightShoulder, W::Plus),
                (T::DPadUp, W::DPadUp),
                (T::DPadDown, W::DPadDown),
                (T::DPadLeft, W::DPadLeft),
                (T::DPadRight, W::DPadRight),
                (T::Guide, W::Home),
            ]),
            ProfileTemplate::Shooter | ProfileTemplate::Sports => {
                let mut map = bindings(&[
                    (T::A, W::A),
                    (T::B, W::B),
                    (T::X, W::One),
                    (T::Y, W::Two),
                    (T::LeftShoulder, W::Minus),
                    (T::RightShoulder, W::Plus),
                    (T::DPadUp, W::DPadUp),
                    (T::DPadDown, W::DPadDown),
                    (T::DPadLeft, W::DPadLeft),
                    (T::DPadRight, W::DPadRight),
                    (T::Guide, W::Home),
                ]);
                if self == ProfileTemplate::Sports {
                    map.insert(T::Start, W::Plus);
                    map.insert(T::Back, W::Minus);
                }
                map
            }
            ProfileTemplate::Party => {
                let mut map = MappingProfile::default_profile().buttons;
                map.insert(T::X, W::B);
                map.insert(T::Y, W::A);
                map.insert(T::LeftShoulder, W::One);
                map.insert(T::RightShoulder, W::Two);
                map
            }
            ProfileTemplate::RocketLeague => bindings(&[
                (T::RightTrigger, W::Two),
                (T::A, W::One),
                (T::B, W::B),
                (T::LeftTrigger, W::A),
                (T::Start, W::Plus),
                (T::Back, W::Minus),
                (T::Guide, W::Home),
            ]),
        }
    }

    fn accelerometer(self) -> AccelerometerMapping {
        match self {
            ProfileTemplate::Racing => AccelerometerMapping {
                enabled: true,
                ..AccelerometerMapping::default()
            },
            ProfileTemplate::RocketLeague => AccelerometerMapping {
                enabled: true,
                sensitivity: 1.4,
                dead_zone: 0.06,
                ..AccelerometerMapping::default()
            },
            _ => AccelerometerMapping::default(),
        }
    }

    pub fn create(self) -> MappingProfile {
        let mut profile = MappingProfile::new(self.name());
        profile.description = self.description().to_string();
        profile.tags = self.tags().iter().map(|s| s.to_string()).collect();
        profile.associated_games = self.games().iter().map(|s| s.to_string()).collect();
        profile.author = "System".to_string();
        profile.buttons = self.bindings();
        profile.accelerometer = self.accelerometer();
        profile
    }
}

fn bindings(pairs: &[(GamepadTarget, DeviceButton)]) -> BTreeMap<GamepadTarget, DeviceButton> {
    pairs.iter().copied().collect()
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
