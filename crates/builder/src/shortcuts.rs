// Keyboard shortcut mapping for the builder view.
//
// UI-agnostic: the host translates its key events into `KeyChord`s and
// dispatches the returned command to the builder. Active only while the
// builder view is mounted — that gating is the host's job.

/// A normalized key press. `primary` is Ctrl on Linux/Windows and Cmd on
/// macOS; the host decides which modifier it maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    /// Lowercased key character.
    pub key: char,
    pub primary: bool,
    pub shift: bool,
}

impl KeyChord {
    pub fn new(key: char, primary: bool, shift: bool) -> Self {
        Self { key: key.to_ascii_lowercase(), primary, shift }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorCommand {
    Undo,
    Redo,
}

/// Map a chord to a builder command.
///
/// Undo: primary+Z. Redo: primary+Y or primary+Shift+Z.
pub fn command_for(chord: KeyChord) -> Option<EditorCommand> {
    if !chord.primary {
        return None;
    }
    match (chord.key, chord.shift) {
        ('z', false) => Some(EditorCommand::Undo),
        ('z', true) => Some(EditorCommand::Redo),
        ('y', _) => Some(EditorCommand::Redo),
        _ => None,
    }
}
