use super::keyboard::Key;

/// A line of terminal input in interactive mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Routed through the keyboard hub like a real key press.
    Key(Key),
    Restart,
    Seek(f64),
    /// Jump to a frame by its 1-based label number.
    Frame(usize),
    Visible(bool),
    Info,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            // Bare Enter toggles like the space bar
            return Some(Command::Key(Key::Space));
        };
        let cmd = match word.to_ascii_lowercase().as_str() {
            "space" | "p" | "play" | "pause" => Command::Key(Key::Space),
            "left" | "h" | "prev" => Command::Key(Key::ArrowLeft),
            "right" | "l" | "next" => Command::Key(Key::ArrowRight),
            "r" | "restart" => Command::Restart,
            "s" | "seek" => Command::Seek(parts.next()?.parse().ok()?),
            "f" | "frame" => {
                let number: usize = parts.next()?.parse().ok()?;
                Command::Frame(number.saturating_sub(1))
            }
            "hide" => Command::Visible(false),
            "show" => Command::Visible(true),
            "i" | "info" => Command::Info,
            "q" | "quit" | "exit" => Command::Quit,
            other => {
                // Any other single key is passed through and ignored downstream
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Command::Key(Key::Char(c)),
                    _ => return None,
                }
            }
        };
        Some(cmd)
    }

    pub fn help() -> &'static str {
        "Enter/space: play-pause | left/right: step | seek <0..1> | frame <n> | restart | hide/show | info | quit"
    }
}
