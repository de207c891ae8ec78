//! Nickname validation.

/// Maximum nickname length accepted by this server.
pub const MAX_NICK_LEN: usize = 9;

/// Extension trait for checking whether a string is a valid nickname.
pub trait NickExt {
    /// Check validity per RFC 1459: the first character is a letter or
    /// one of `` [ ] \ ` _ ^ { | } ``, the rest are letters, digits,
    /// specials, or `-`, and the whole thing is at most
    /// [`MAX_NICK_LEN`] characters.
    fn is_valid_nick(&self) -> bool;
}

#[inline]
fn is_special(c: char) -> bool {
    matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}')
}

impl NickExt for &str {
    fn is_valid_nick(&self) -> bool {
        if self.is_empty() || self.len() > MAX_NICK_LEN {
            return false;
        }

        let mut chars = self.chars();
        let first = match chars.next() {
            Some(c) => c,
            None => return false,
        };
        if !first.is_ascii_alphabetic() && !is_special(first) {
            return false;
        }

        chars.all(|c| c.is_ascii_alphanumeric() || is_special(c) || c == '-')
    }
}

impl NickExt for String {
    fn is_valid_nick(&self) -> bool {
        self.as_str().is_valid_nick()
    }
}
