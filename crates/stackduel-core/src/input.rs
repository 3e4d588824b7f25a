/// A key a client can hold during one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKey {
    Left,
    Right,
    RotateRight,
    RotateLeft,
    SoftDropOn,
    SoftDropOff,
    Hold,
    HardDrop,
}

impl InputKey {
    /// Application order within a frame: horizontal, rotate, vertical,
    /// hold, then hard drop.
    pub const ORDER: [InputKey; 8] = [
        InputKey::Left,
        InputKey::Right,
        InputKey::RotateRight,
        InputKey::RotateLeft,
        InputKey::SoftDropOn,
        InputKey::SoftDropOff,
        InputKey::Hold,
        InputKey::HardDrop,
    ];

    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "rotate_right" | "rotate" => Some(Self::RotateRight),
            "rotate_left" | "rrotate" => Some(Self::RotateLeft),
            "down" => Some(Self::SoftDropOn),
            "downOff" => Some(Self::SoftDropOff),
            "hold" => Some(Self::Hold),
            "space" => Some(Self::HardDrop),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::RotateRight => "rotate_right",
            Self::RotateLeft => "rotate_left",
            Self::SoftDropOn => "down",
            Self::SoftDropOff => "downOff",
            Self::Hold => "hold",
            Self::HardDrop => "space",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::Left => 1 << 0,
            Self::Right => 1 << 1,
            Self::RotateRight => 1 << 2,
            Self::RotateLeft => 1 << 3,
            Self::SoftDropOn => 1 << 4,
            Self::SoftDropOff => 1 << 5,
            Self::Hold => 1 << 6,
            Self::HardDrop => 1 << 7,
        }
    }
}

/// The set of keys recorded for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSet(u8);

impl InputSet {
    pub const EMPTY: InputSet = InputSet(0);

    /// Build from wire key strings. Unknown keys are skipped and logged.
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> Self {
        let mut set = Self::EMPTY;
        for key in keys {
            match InputKey::parse(key.as_ref()) {
                Some(k) => set.insert(k),
                None => tracing::debug!(key = key.as_ref(), "Ignoring unknown input key"),
            }
        }
        set
    }

    pub fn insert(&mut self, key: InputKey) {
        self.0 |= key.bit();
    }

    pub fn contains(self, key: InputKey) -> bool {
        self.0 & key.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Held keys in application order.
    pub fn keys(self) -> impl Iterator<Item = InputKey> {
        InputKey::ORDER.into_iter().filter(move |&k| self.contains(k))
    }

    /// Canonical wire names of the held keys.
    pub fn key_names(self) -> Vec<String> {
        self.keys().map(|k| k.as_str().to_string()).collect()
    }
}
