//! Text tokenization and key metadata.
//!
//! Typed text is split into tokens: plain characters and `{KeyName}`
//! special keys. Every synthesized keyboard event carries the fully
//! populated key/code/keyCode/charCode set for its token.

use hb_page::Modifiers;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Char(char),
    /// A `{KeyName}` special key, e.g. `Enter` or `ArrowDown`.
    Key(String),
}

/// Split text into character and special-key tokens. A `{` without a
/// matching `}` (or with a non-key body) is typed literally.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{'
            && let Some(close) = chars[i + 1..].iter().position(|&c| c == '}')
        {
            let body: String = chars[i + 1..i + 1 + close].iter().collect();
            if !body.is_empty() && body.chars().all(|c| c.is_ascii_alphanumeric()) {
                tokens.push(Token::Key(body));
                i += close + 2;
                continue;
            }
        }
        tokens.push(Token::Char(chars[i]));
        i += 1;
    }
    tokens
}

/// Event fields for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub key: String,
    pub code: String,
    pub key_code: u32,
    pub char_code: u32,
    /// Whether a `keypress` is dispatched (printable characters only).
    pub printable: bool,
}

pub fn is_modifier(name: &str) -> bool {
    matches!(name, "Meta" | "Control" | "Shift" | "Alt")
}

pub fn key_info(token: &Token) -> KeyInfo {
    match token {
        Token::Char(c) => char_info(*c),
        Token::Key(name) => special_info(name),
    }
}

fn char_info(c: char) -> KeyInfo {
    let (code, key_code) = match c {
        'a'..='z' => (format!("Key{}", c.to_ascii_uppercase()), c as u32 - 32),
        'A'..='Z' => (format!("Key{c}"), c as u32),
        '0'..='9' => (format!("Digit{c}"), c as u32),
        ' ' => ("Space".to_string(), 32),
        '.' => ("Period".to_string(), 190),
        ',' => ("Comma".to_string(), 188),
        '-' => ("Minus".to_string(), 189),
        '/' => ("Slash".to_string(), 191),
        _ => (String::new(), 0),
    };
    KeyInfo {
        key: c.to_string(),
        code,
        key_code,
        char_code: c as u32,
        printable: true,
    }
}

fn special_info(name: &str) -> KeyInfo {
    let (key_code, code): (u32, &str) = match name {
        "Enter" => (13, "Enter"),
        "Tab" => (9, "Tab"),
        "Backspace" => (8, "Backspace"),
        "Delete" => (46, "Delete"),
        "Escape" => (27, "Escape"),
        "ArrowLeft" => (37, "ArrowLeft"),
        "ArrowUp" => (38, "ArrowUp"),
        "ArrowRight" => (39, "ArrowRight"),
        "ArrowDown" => (40, "ArrowDown"),
        "Home" => (36, "Home"),
        "End" => (35, "End"),
        "PageUp" => (33, "PageUp"),
        "PageDown" => (34, "PageDown"),
        "Shift" => (16, "ShiftLeft"),
        "Control" => (17, "ControlLeft"),
        "Alt" => (18, "AltLeft"),
        "Meta" => (91, "MetaLeft"),
        _ => (0, ""),
    };
    KeyInfo {
        key: name.to_string(),
        code: if code.is_empty() {
            name.to_string()
        } else {
            code.to_string()
        },
        key_code,
        char_code: 0,
        printable: false,
    }
}

/// Update modifier state for a `keydown`/`keyup` of a modifier key.
pub fn apply_modifier(modifiers: &mut Modifiers, name: &str, down: bool) {
    match name {
        "Meta" => modifiers.meta = down,
        "Control" => modifiers.ctrl = down,
        "Shift" => modifiers.shift = down,
        "Alt" => modifiers.alt = down,
        _ => {},
    }
}
