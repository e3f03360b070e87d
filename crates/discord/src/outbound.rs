//! Message shaping for Discord limits.

use serenity::all::{Colour, CreateEmbed, CreateEmbedAuthor, CreateMessage};

/// Maximum length of a message body, in characters.
pub const MESSAGE_LIMIT: usize = 2000;

/// Maximum length of an embed author name, in characters.
pub const EMBED_AUTHOR_LIMIT: usize = 256;

/// Truncate to at most `limit` characters, ending with an ellipsis when cut.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    if limit == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn text_message(text: &str) -> CreateMessage {
    CreateMessage::new().content(truncate_chars(text, MESSAGE_LIMIT))
}

/// Embed whose author line carries the text and, when given, the icon.
pub fn embed_message(text: &str, color: u32, image_url: &str) -> CreateMessage {
    let mut author = CreateEmbedAuthor::new(truncate_chars(text, EMBED_AUTHOR_LIMIT));
    if !image_url.trim().is_empty() {
        author = author.icon_url(image_url.trim());
    }
    let embed = CreateEmbed::new().colour(Colour::new(color)).author(author);
    CreateMessage::new().embed(embed)
}
