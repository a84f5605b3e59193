// Object naming: picks the key an upload is stored under and builds the
// public link for it.
//
// Keys are `prefix + name + extension`. The name is either supplied by the
// caller, in which case an existing object with that key is a hard
// `Error::NameConflict`, or drawn at random from `[A-Za-z0-9]` and re-drawn
// on collision up to `MAX_ATTEMPTS` times.

use crate::error::{Error, Result};
use crate::store::ObjectStore;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Number of random candidates tried before giving up.
pub const MAX_ATTEMPTS: usize = 5;

// Characters escaped in a key segment. `+` is included because B2 decodes it
// as a space in `X-Bz-File-Name`.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Full path of an object inside the bucket, prefix included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    key: String,
    name_start: usize,
}

impl ObjectKey {
    /// The prefix goes through [`normalize_prefix`], so `img` and `img/`
    /// give the same key.
    pub fn new(prefix: &str, name: &str, extension: &str) -> Self {
        let prefix = normalize_prefix(prefix);
        Self {
            key: format!("{}{}{}", prefix, name, extension),
            name_start: prefix.len(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The part after the prefix, e.g. `aB3xYz.png`.
    pub fn file_name(&self) -> &str {
        &self.key[self.name_start..]
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Strips leading separators and makes a non-empty prefix end with exactly
/// one `/`. An empty prefix stays empty and means the bucket root.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Returns the extension with a leading dot, shortening `jpeg` to `jpg`.
/// An empty input stays empty.
pub fn normalize_extension(extension: &str) -> String {
    let bare = extension.trim_start_matches('.');
    if bare.is_empty() {
        String::new()
    } else if bare.eq_ignore_ascii_case("jpeg") {
        ".jpg".to_string()
    } else {
        format!(".{}", bare)
    }
}

/// Normalized extension of a local path, or an empty string if it has none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

/// `length` characters drawn uniformly from the 62 ASCII letters and digits.
pub fn random_name<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// Decide the final key for an upload.
///
/// With `desired_name`, exactly one existence check is made and a hit is
/// returned as [`Error::NameConflict`]. Without it, up to [`MAX_ATTEMPTS`]
/// random names of `name_length` characters are checked in turn and the
/// first free one wins; if all are taken the result is
/// [`Error::NameExhausted`].
///
/// Nothing is reserved: another process may still claim the same key
/// between this check and the upload.
pub fn resolve<S, R>(
    store: &S,
    prefix: &str,
    desired_name: Option<&str>,
    extension: &str,
    name_length: usize,
    rng: &mut R,
) -> Result<ObjectKey>
where
    S: ObjectStore + ?Sized,
    R: Rng + ?Sized,
{
    let extension = normalize_extension(extension);

    let desired = desired_name
        .map(|name| name.trim().trim_start_matches('/'))
        .filter(|name| !name.is_empty());

    if let Some(name) = desired {
        let key = ObjectKey::new(prefix, strip_extension(name, &extension), &extension);
        debug!(key = %key, "checking requested name");
        if store.exists(key.as_str())? {
            return Err(Error::NameConflict(key.file_name().to_string()));
        }
        return Ok(key);
    }

    for attempt in 1..=MAX_ATTEMPTS {
        let key = ObjectKey::new(prefix, &random_name(rng, name_length), &extension);
        debug!(key = %key, attempt, "checking random name");
        if !store.exists(key.as_str())? {
            return Ok(key);
        }
        warn!(key = %key, attempt, "random name already taken");
    }

    Err(Error::NameExhausted {
        attempts: MAX_ATTEMPTS,
    })
}

/// Public link for `key`: the base URL and the encoded key joined by a
/// single `/`.
pub fn resolve_url(base_url: &str, key: &ObjectKey) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        encode_key(key.as_str().trim_start_matches('/'))
    )
}

/// Percent-encode each `/`-separated segment of a key, keeping the separators.
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

// "cat.png" with extension ".png" is stored as "cat.png", not "cat.png.png".
fn strip_extension<'a>(name: &'a str, extension: &str) -> &'a str {
    if extension.is_empty() {
        return name;
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 && same_extension(&name[dot..], extension) => &name[..dot],
        _ => name,
    }
}

fn same_extension(a: &str, b: &str) -> bool {
    normalize_extension(a).eq_ignore_ascii_case(b)
}
