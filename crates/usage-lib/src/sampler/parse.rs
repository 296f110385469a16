//! Extraction rules for pod names and image references
//!
//! Pure functions, no platform or storage access. Malformed input always
//! degrades to a sentinel value; nothing here returns an error.

/// Sentinel for unparseable identity fields
pub const UNKNOWN: &str = "unknown";

/// Version used when an image reference carries no tag
pub const DEFAULT_VERSION: &str = "latest";

/// Split a full image reference into `(base, version)`.
///
/// The version is the text after the last `:` when that `:` belongs to the
/// tag (i.e. occurs after the last `/`), otherwise [`DEFAULT_VERSION`].
/// The base is the final path segment with any registry prefix stripped:
/// `quay.io/jupyter/scipy-notebook:2024.01` -> `("scipy-notebook", "2024.01")`.
pub fn split_image_ref(image: &str) -> (String, String) {
    let last_slash = image.rfind('/');
    let (repo, version) = match image.rfind(':') {
        Some(colon) if last_slash.map_or(true, |s| colon > s) => {
            (&image[..colon], image[colon + 1..].to_string())
        }
        _ => (image, DEFAULT_VERSION.to_string()),
    };

    let base = match repo.rfind('/') {
        Some(slash) => repo[slash + 1..].to_string(),
        None => repo.to_string(),
    };

    (base, version)
}

/// Derive the stable user id from a pod name following the
/// `<prefix><user_id>[-<suffix>]` spawner convention.
///
/// Returns `None` when the pod does not follow the convention; callers
/// degrade to the [`UNKNOWN`] sentinel.
pub fn user_id_from_pod(pod_name: &str, prefix: &str) -> Option<String> {
    let rest = pod_name.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }

    // Trailing segment is the spawner hash; a bare user id has none.
    let user_id = match rest.rsplit_once('-') {
        Some((id, _)) if !id.is_empty() => id,
        _ => rest,
    };
    Some(user_id.to_string())
}

/// Synthesize a display name from a user id: `john-doe` -> `John Doe`.
pub fn display_name_for(user_id: &str) -> String {
    user_id
        .split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the identity key for a user id under the configured mail domain.
pub fn email_for(user_id: &str, domain: &str) -> String {
    format!("{}@{}", user_id, domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_image_ref_with_tag() {
        let (base, version) = split_image_ref("jupyter/scipy-notebook:2024.01");
        assert_eq!(base, "scipy-notebook");
        assert_eq!(version, "2024.01");
    }

    #[test]
    fn test_split_image_ref_without_tag() {
        let (base, version) = split_image_ref("jupyter/base-notebook");
        assert_eq!(base, "base-notebook");
        assert_eq!(version, DEFAULT_VERSION);
    }

    #[test]
    fn test_split_image_ref_registry_port() {
        // The colon belongs to the registry, not a tag
        let (base, version) = split_image_ref("registry.local:5000/hub/datasci");
        assert_eq!(base, "datasci");
        assert_eq!(version, DEFAULT_VERSION);
    }

    #[test]
    fn test_split_image_ref_registry_port_and_tag() {
        let (base, version) = split_image_ref("registry.local:5000/hub/datasci:1.2");
        assert_eq!(base, "datasci");
        assert_eq!(version, "1.2");
    }

    #[test]
    fn test_split_image_ref_bare_name() {
        let (base, version) = split_image_ref("unknown");
        assert_eq!(base, "unknown");
        assert_eq!(version, DEFAULT_VERSION);
    }

    #[test]
    fn test_user_id_with_hash_suffix() {
        assert_eq!(
            user_id_from_pod("jupyter-alice-5f4x", "jupyter-"),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_user_id_multi_dash() {
        assert_eq!(
            user_id_from_pod("jupyter-john-doe-abc123", "jupyter-"),
            Some("john-doe".to_string())
        );
    }

    #[test]
    fn test_user_id_without_suffix() {
        assert_eq!(
            user_id_from_pod("jupyter-alice", "jupyter-"),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_user_id_prefix_mismatch() {
        assert_eq!(user_id_from_pod("hub-7d9f", "jupyter-"), None);
        assert_eq!(user_id_from_pod("proxy-1", "jupyter-"), None);
    }

    #[test]
    fn test_user_id_empty_remainder() {
        assert_eq!(user_id_from_pod("jupyter-", "jupyter-"), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name_for("john-doe"), "John Doe");
        assert_eq!(display_name_for("alice"), "Alice");
    }

    #[test]
    fn test_email_for() {
        assert_eq!(email_for("alice", "illinois.edu"), "alice@illinois.edu");
    }
}
