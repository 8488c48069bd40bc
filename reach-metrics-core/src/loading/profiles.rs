use std::path::Path;

use hashbrown::HashSet;

use crate::{Error, Profile};

const PROFILE_PREFIX: &str = "profile-";
const PROFILE_SUFFIX: &str = ".json";

/// Reads every `profile-*.json` file of a network directory, ordered by
/// file name
pub fn parse_profiles(directory: &Path) -> Result<Vec<Profile>, Error> {
    let mut paths: Vec<_> = std::fs::read_dir(directory)
        .map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to read directory '{}': {e}", directory.display()),
            )
        })?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| {
                    name.starts_with(PROFILE_PREFIX) && name.ends_with(PROFILE_SUFFIX)
                })
        })
        .collect();
    paths.sort();

    let profiles = paths
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path)?;
            parse_profile(&text, &path.display().to_string())
        })
        .collect::<Result<Vec<_>, Error>>()?;

    validate_profiles(&profiles)?;
    log::info!(
        "Loaded {} profiles from {}",
        profiles.len(),
        directory.display()
    );
    Ok(profiles)
}

pub fn parse_profile(text: &str, origin: &str) -> Result<Profile, Error> {
    serde_json::from_str(text).map_err(|e| Error::InvalidProfile(format!("{origin}: {e}")))
}

/// Profile ids must be non-empty and unique within a network
pub fn validate_profiles(profiles: &[Profile]) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for profile in profiles {
        if profile.id.trim().is_empty() {
            return Err(Error::InvalidProfile("profile id is empty".to_string()));
        }
        if !seen.insert(profile.id.as_str()) {
            return Err(Error::DuplicateProfile(profile.id.clone()));
        }
    }
    Ok(())
}
