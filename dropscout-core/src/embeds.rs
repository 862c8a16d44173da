// src/embeds.rs
//
// Discord embed construction for presenting Drop campaigns.

use twilight_model::channel::message::Embed;
use twilight_util::builder::embed::{
    EmbedAuthorBuilder, EmbedBuilder, EmbedFieldBuilder, ImageSource,
};

use crate::models::CampaignRecord;

const BRAND_COLOR: u32 = 0x0023_5876;
const BENEFIT_LINES: usize = 6;

/// Build the standard embed for one campaign. Title is the game name linking
/// to the Drops directory, description is the campaign name, start/end render
/// as Discord timestamps, and the box art becomes the thumbnail. The
/// `title_prefix` (e.g. "Now Active") goes in the author line so the title
/// stays clean.
pub fn build_campaign_embed(c: &CampaignRecord, title_prefix: &str) -> Embed {
    let title = c
        .game_name
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| if c.name.is_empty() { "Twitch Drops" } else { &c.name })
        .trim()
        .to_string();

    let mut builder = EmbedBuilder::new().title(title).color(BRAND_COLOR);
    if !title_prefix.is_empty() {
        builder = builder.author(EmbedAuthorBuilder::new(title_prefix.to_string()));
    }
    if !c.name.is_empty() {
        builder = builder.description(c.name.clone());
    }
    if let Some(ts) = c.starts_epoch() {
        builder = builder.field(
            EmbedFieldBuilder::new("Starts", format!("<t:{ts}:F> (<t:{ts}:R>)")).inline(),
        );
    }
    if let Some(ts) = c.ends_epoch() {
        builder = builder.field(
            EmbedFieldBuilder::new("Ends", format!("<t:{ts}:F> (<t:{ts}:R>)")).inline(),
        );
    }
    if !c.benefits.is_empty() {
        let listing = c
            .benefits
            .iter()
            .take(BENEFIT_LINES)
            .map(|b| format!("• {}", b.name))
            .collect::<Vec<_>>()
            .join("\n");
        builder = builder.field(EmbedFieldBuilder::new("Drops", listing));
    }
    if let Some(box_art) = c.game_box_art.as_deref() {
        if let Ok(source) = ImageSource::url(box_art) {
            builder = builder.thumbnail(source);
        }
    }
    if let Some(game_name) = c.game_name.as_deref() {
        let slug = c
            .game_slug
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(game_name));
        builder = builder.url(format!(
            "https://www.twitch.tv/directory/category/{slug}?filter=drops"
        ));
    }
    builder.build()
}

/// Best-effort slug for the Drops directory link when upstream gave no slug:
/// lowercase, apostrophes dropped, runs of non-alphanumerics become one dash.
fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for ch in name.to_lowercase().chars() {
        if ch == '\'' {
            continue;
        }
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        urlencoding::encode(name).into_owned()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_strips_apostrophes_and_collapses() {
        assert_eq!(slugify("Tom Clancy's Division 2"), "tom-clancys-division-2");
        assert_eq!(slugify("VALORANT"), "valorant");
        assert_eq!(slugify("A  --  B"), "a-b");
    }
}
