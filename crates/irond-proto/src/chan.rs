//! Channel name validation.

/// Maximum channel name length, prefix included.
pub const MAX_CHANNEL_LEN: usize = 50;

/// Extension trait for checking whether a string names a channel.
pub trait ChannelExt {
    /// Check validity: a `#` or `&` prefix followed by up to 49 more
    /// characters, none of which is a space, comma, colon, or control
    /// byte.
    fn is_channel_name(&self) -> bool;
}

impl ChannelExt for &str {
    fn is_channel_name(&self) -> bool {
        let mut chars = self.chars();

        match chars.next() {
            Some('#') | Some('&') => {}
            _ => return false,
        }

        if self.len() > MAX_CHANNEL_LEN {
            return false;
        }

        chars.all(|c| c != ' ' && c != ',' && c != ':' && !c.is_control())
    }
}

impl ChannelExt for String {
    fn is_channel_name(&self) -> bool {
        self.as_str().is_channel_name()
    }
}
