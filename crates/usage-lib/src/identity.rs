//! Identity reconciliation
//!
//! Maps ephemeral pod observations onto stable user rows. The merge is a
//! pure three-way function so it behaves identically regardless of which
//! storage backend applies it, and it never regresses a field that a
//! richer source (e.g. the campus directory sync) has already filled in.

use crate::models::{Observation, User};
use crate::sampler::{user_id_from_pod, UNKNOWN};

/// True when the identity key carries the unknown sentinel local part.
pub fn is_unknown_identity(email: &str) -> bool {
    email.split('@').next().unwrap_or("") == UNKNOWN
}

/// True when the display name is a sentinel rather than a real name.
pub fn is_placeholder_name(name: &str) -> bool {
    name.is_empty() || name.eq_ignore_ascii_case(UNKNOWN) || name == "Unknown User"
}

/// Merge a freshly derived user row into the stored one.
///
/// - `user_id` always takes the incoming (latest) value
/// - `full_name`: incoming real name, else existing real name, else the
///   email local part
/// - `first_seen`/`last_seen` widen monotonically
pub fn merge(existing: Option<&User>, incoming: User) -> User {
    let Some(old) = existing else {
        return fill_placeholder_name(incoming);
    };

    let full_name = if !is_placeholder_name(&incoming.full_name) {
        incoming.full_name
    } else if !is_placeholder_name(&old.full_name) {
        old.full_name.clone()
    } else {
        local_part(&incoming.email)
    };

    User {
        email: incoming.email,
        user_id: incoming.user_id,
        full_name,
        first_seen: old.first_seen.min(incoming.first_seen),
        last_seen: old.last_seen.max(incoming.last_seen),
    }
}

/// Fold an observation batch into one candidate user row per identity.
///
/// The candidate's `user_id` comes from the sample with the greatest
/// `sampled_at`, regardless of batch order. Observations carrying the
/// unknown sentinel (identity or name) are excluded; they are still
/// stored as observations by the caller.
pub fn users_from_batch(batch: &[Observation], pod_prefix: &str) -> Vec<User> {
    let mut users: Vec<User> = Vec::new();

    for obs in batch {
        if is_unknown_identity(&obs.user_email) || is_placeholder_name(&obs.user_name) {
            continue;
        }

        let user_id = user_id_from_pod(&obs.pod_name, pod_prefix)
            .unwrap_or_else(|| UNKNOWN.to_string());

        match users.iter_mut().find(|u| u.email == obs.user_email) {
            Some(user) => {
                // Latest by sample time, not by batch position
                if obs.sampled_at >= user.last_seen {
                    user.user_id = user_id;
                }
                user.first_seen = user.first_seen.min(obs.sampled_at);
                user.last_seen = user.last_seen.max(obs.sampled_at);
                if is_placeholder_name(&user.full_name)
                    && !is_placeholder_name(&obs.user_name)
                {
                    user.full_name = obs.user_name.clone();
                }
            }
            None => users.push(User {
                email: obs.user_email.clone(),
                user_id,
                full_name: obs.user_name.clone(),
                first_seen: obs.sampled_at,
                last_seen: obs.sampled_at,
            }),
        }
    }

    users.sort_by(|a, b| a.email.cmp(&b.email));
    users
}

fn fill_placeholder_name(mut user: User) -> User {
    if is_placeholder_name(&user.full_name) {
        user.full_name = local_part(&user.email);
    }
    user
}

fn local_part(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn user(email: &str, name: &str, first: i64, last: i64) -> User {
        User {
            email: email.to_string(),
            user_id: email.split('@').next().unwrap().to_string(),
            full_name: name.to_string(),
            first_seen: Utc.timestamp_opt(first, 0).unwrap(),
            last_seen: Utc.timestamp_opt(last, 0).unwrap(),
        }
    }

    fn obs(email: &str, name: &str, pod: &str, at: i64) -> Observation {
        Observation {
            sampled_at: Utc.timestamp_opt(at, 0).unwrap(),
            user_email: email.to_string(),
            user_name: name.to_string(),
            node_name: "node-a".to_string(),
            container_image: "img:1".to_string(),
            container_base: "img".to_string(),
            container_version: "1".to_string(),
            age_seconds: 0,
            pod_name: pod.to_string(),
        }
    }

    #[test]
    fn test_merge_widens_seen_window() {
        let old = user("alice@x.edu", "Alice", 1000, 2000);
        let merged = merge(Some(&old), user("alice@x.edu", "Alice", 500, 3000));
        assert_eq!(merged.first_seen.timestamp(), 500);
        assert_eq!(merged.last_seen.timestamp(), 3000);
    }

    #[test]
    fn test_merge_never_narrows_seen_window() {
        let old = user("alice@x.edu", "Alice", 1000, 3000);
        let merged = merge(Some(&old), user("alice@x.edu", "Alice", 1500, 2000));
        assert_eq!(merged.first_seen.timestamp(), 1000);
        assert_eq!(merged.last_seen.timestamp(), 3000);
    }

    #[test]
    fn test_merge_real_name_wins_over_placeholder() {
        let old = user("bob@x.edu", "Unknown User", 1000, 2000);
        let merged = merge(Some(&old), user("bob@x.edu", "Bob Smith", 1000, 2500));
        assert_eq!(merged.full_name, "Bob Smith");
    }

    #[test]
    fn test_merge_placeholder_never_reverts_real_name() {
        let old = user("bob@x.edu", "Bob Smith", 1000, 2000);
        let merged = merge(Some(&old), user("bob@x.edu", "Unknown User", 1000, 2500));
        assert_eq!(merged.full_name, "Bob Smith");
        assert_eq!(merged.last_seen.timestamp(), 2500);
    }

    #[test]
    fn test_merge_falls_back_to_local_part() {
        let old = user("carol@x.edu", "", 1000, 2000);
        let merged = merge(Some(&old), user("carol@x.edu", "unknown", 1000, 2500));
        assert_eq!(merged.full_name, "carol");
    }

    #[test]
    fn test_merge_new_user_placeholder_name() {
        let merged = merge(None, user("dave@x.edu", "Unknown User", 1000, 1000));
        assert_eq!(merged.full_name, "dave");
    }

    #[test]
    fn test_users_from_batch_folds_per_email() {
        let batch = vec![
            obs("alice@x.edu", "Alice", "jupyter-alice-a1", 2000),
            obs("alice@x.edu", "Alice", "jupyter-alice-a1", 1000),
            obs("bob@x.edu", "Bob", "jupyter-bob-b1", 1500),
        ];

        let users = users_from_batch(&batch, "jupyter-");
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].email, "alice@x.edu");
        assert_eq!(users[0].first_seen.timestamp(), 1000);
        assert_eq!(users[0].last_seen.timestamp(), 2000);
        assert_eq!(users[0].user_id, "alice");
    }

    #[test]
    fn test_users_from_batch_user_id_from_newest_sample() {
        // The newer sample is listed first; its derived id must win
        // regardless of batch order.
        let batch = vec![
            obs("alice@x.edu", "Alice", "jupyter-alice-2-x9", 2000),
            obs("alice@x.edu", "Alice", "jupyter-alice-a1", 1000),
        ];

        let users = users_from_batch(&batch, "jupyter-");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, "alice-2");
        assert_eq!(users[0].first_seen.timestamp(), 1000);
        assert_eq!(users[0].last_seen.timestamp(), 2000);
    }

    #[test]
    fn test_users_from_batch_skips_sentinels() {
        let batch = vec![
            obs("unknown@x.edu", "Unknown User", "jupyter-", 1000),
            obs("alice@x.edu", "Alice", "jupyter-alice-a1", 1000),
        ];

        let users = users_from_batch(&batch, "jupyter-");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "alice@x.edu");
    }
}
