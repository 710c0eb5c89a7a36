use crate::errors::NormalizeError;
use crate::image_ops::image_types::Extensions;
use crate::store::media_storage::MediaStorage;

/// Split a media path into everything before the extension and the extension
/// itself (with the dot). Dotfiles have no extension.
fn split_extension(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(0) | None => (path, ""),
        Some(dot) => path.split_at(name_start + dot),
    }
}

/// `course_photos/a.jpeg` -> `course_photos/a.webp`
pub fn normalized_name(path: &str, extension: Extensions) -> String {
    let (base, _) = split_extension(path);
    format!("{}.{}", base, extension.name())
}

/// `course_photos/a.jpeg`, 2 -> `course_photos/a_2.jpeg`
pub fn numbered_name(path: &str, counter: u32) -> String {
    let (base, ext) = split_extension(path);
    format!("{}_{}{}", base, counter, ext)
}

/// Location of `path` inside the archive tree, mirroring its directories
pub fn archive_name(archive_dir: &str, path: &str) -> String {
    format!(
        "{}/{}",
        archive_dir.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// First name in `candidate`, `candidate_1`, `candidate_2`.. not taken in storage
pub async fn free_name(
    storage: &(dyn MediaStorage + Send + Sync),
    candidate: &str,
) -> Result<String, NormalizeError> {
    if !storage.exists(candidate).await? {
        return Ok(candidate.to_string());
    }
    let mut counter = 1;
    loop {
        let name = numbered_name(candidate, counter);
        if !storage.exists(&name).await? {
            return Ok(name);
        }
        counter += 1;
    }
}
