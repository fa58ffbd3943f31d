//! Output file naming.
//!
//! A saved document's file name records the guild and the filter that
//! produced it, so `pins update` can rerun the same query:
//!
//! - `<guild_id>.json` when no expression was given;
//! - `<guild_id>-<base64url(expression)>.json` otherwise.
//!
//! The URL-safe alphabet contains `-`, but a snowflake never does, so the
//! first `-` always separates the two parts.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use pins_core::filter::FilterExpression;
use pins_core::models::Snowflake;
use std::path::Path;

const EXTENSION: &str = ".json";

pub fn encode_filename(guild_id: Snowflake, expression: &FilterExpression) -> String {
    if expression.as_str().is_empty() {
        format!("{}{}", guild_id, EXTENSION)
    } else {
        format!(
            "{}-{}{}",
            guild_id,
            URL_SAFE.encode(expression.as_str()),
            EXTENSION
        )
    }
}

/// Recover the guild id and expression from a path's file name.
pub fn decode_filename(path: &Path) -> Result<(Snowflake, FilterExpression)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("not a file name: {}", path.display()))?;
    let stem = name.strip_suffix(EXTENSION).unwrap_or(name);

    let (snowflake, expression) = match stem.split_once('-') {
        Some((snowflake, encoded)) => {
            let bytes = URL_SAFE
                .decode(encoded)
                .with_context(|| format!("base64 error in expression part {:?}", encoded))?;
            let source = String::from_utf8(bytes)
                .with_context(|| format!("expression part {:?} is not UTF-8", encoded))?;
            (snowflake, FilterExpression::new(source))
        }
        None => (stem, FilterExpression::default()),
    };

    let guild_id: Snowflake = snowflake
        .parse()
        .with_context(|| format!("cannot parse snowflake {:?}", snowflake))?;
    Ok((guild_id, expression))
}
