//! Keyboard decoding and the "keys held" map read at the start of each frame.

/// Game actions bound to keys. Everything else on the keyboard is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Forward,
    Back,
    StrafeLeft,
    StrafeRight,
    TurnLeft,
    TurnRight,
    Run,
    Fire,
    Close,
}

const KEY_COUNT: usize = 9;

impl Key {
    /// Decodes a DOM `KeyboardEvent` from its `key` and `code` fields.
    /// Letters are matched case-insensitively so Shift+W still moves.
    pub fn from_dom(key: &str, code: &str) -> Option<Key> {
        if code == "Space" {
            return Some(Key::Fire);
        }
        let mut chars = key.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return match c.to_ascii_lowercase() {
                'w' => Some(Key::Forward),
                's' => Some(Key::Back),
                'a' => Some(Key::StrafeLeft),
                'd' => Some(Key::StrafeRight),
                'q' => Some(Key::TurnLeft),
                'e' => Some(Key::TurnRight),
                ' ' => Some(Key::Fire),
                _ => None,
            };
        }
        match key {
            "ArrowUp" => Some(Key::Forward),
            "ArrowDown" => Some(Key::Back),
            "ArrowLeft" => Some(Key::TurnLeft),
            "ArrowRight" => Some(Key::TurnRight),
            "Shift" => Some(Key::Run),
            "Spacebar" => Some(Key::Fire),
            "Escape" | "Esc" => Some(Key::Close),
            _ => None,
        }
    }

    /// Keys whose browser default (page scroll, find-as-you-type) must be
    /// suppressed while the game has focus.
    pub fn suppresses_default(self) -> bool {
        !matches!(self, Key::Run | Key::Close)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Last-state-wins map of held keys; no event queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeysHeld {
    down: [bool; KEY_COUNT],
}

impl KeysHeld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: Key) {
        self.down[key.index()] = true;
    }

    pub fn release(&mut self, key: Key) {
        self.down[key.index()] = false;
    }

    #[inline(always)]
    pub fn is_down(&self, key: Key) -> bool {
        self.down[key.index()]
    }

    pub fn clear(&mut self) {
        self.down = [false; KEY_COUNT];
    }
}
