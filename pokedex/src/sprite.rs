//! Pokemon id extraction and sprite URL resolution.

use crate::api::SpriteSet;
use crate::error::IdentifierError;

const SPRITE_BASE_URL: &str =
    "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon";

/// Pulls the numeric id out of a `.../pokemon/<id>/` resource URL.
pub fn extract_pokemon_id(url: &str) -> Result<u32, IdentifierError> {
    let unrecognized = || IdentifierError::UnrecognizedUrl(url.to_string());
    let path = url.strip_suffix('/').unwrap_or(url);
    let (prefix, id) = path.rsplit_once('/').ok_or_else(unrecognized)?;
    if !prefix.ends_with("/pokemon") || id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unrecognized());
    }
    match id.parse::<u32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(unrecognized()),
    }
}

pub fn build_sprite_url(id: u32) -> String {
    format!("{SPRITE_BASE_URL}/{id}.png")
}

/// Small list sprite: default front sprite, else the conventional URL for `id`.
pub fn resolve_list_sprite_url(sprites: &SpriteSet, id: u32) -> String {
    sprites
        .front_default
        .clone()
        .unwrap_or_else(|| build_sprite_url(id))
}

/// Detail image: official artwork, then default front sprite, then the conventional URL.
pub fn resolve_official_artwork_url(sprites: &SpriteSet, id: u32) -> String {
    sprites
        .official_artwork
        .clone()
        .or_else(|| sprites.front_default.clone())
        .unwrap_or_else(|| build_sprite_url(id))
}
