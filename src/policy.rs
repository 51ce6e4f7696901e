use crate::{
    models::{Permission, Role},
    repository::{self, PersistenceError, Repository},
    session::UserSession,
};
use std::collections::BTreeSet;

/// has_permission
///
/// The single authorization decision. Rules, in order:
/// 1. no session or an anonymous one → deny,
/// 2. the environment super-admin → allow everything,
/// 3. otherwise → membership in the session's resolved permission set.
///
/// Pure and uncached: the session carries everything needed.
pub fn has_permission(session: Option<&UserSession>, permission: Permission) -> bool {
    match session {
        None | Some(UserSession::Anonymous) => false,
        Some(UserSession::EnvAdmin { .. }) => true,
        Some(UserSession::User { permissions, .. }) => permissions.contains(&permission),
    }
}

/// Union of the known permissions granted by `roles`.
pub fn resolve_permissions<'a>(roles: impl IntoIterator<Item = &'a Role>) -> BTreeSet<Permission> {
    roles.into_iter().flat_map(|role| role.granted()).collect()
}

/// Loads each referenced role and unions their permissions.
///
/// Role ids that no longer resolve (deleted roles, malformed ids) contribute
/// nothing. Only a storage failure is an error.
pub async fn resolve_role_ids(
    repo: &dyn Repository,
    role_ids: &[String],
) -> Result<BTreeSet<Permission>, PersistenceError> {
    let mut roles = Vec::with_capacity(role_ids.len());
    for id in role_ids {
        match repository::fetch::<Role>(repo, id).await? {
            Some(role) => roles.push(role),
            None => tracing::debug!(role_id = %id, "skipping dangling role reference"),
        }
    }
    Ok(resolve_permissions(&roles))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_session(perms: &[Permission]) -> UserSession {
        UserSession::User {
            user_id: "u1".to_string(),
            username: "editor".to_string(),
            roles: vec![],
            permissions: perms.iter().copied().collect(),
        }
    }

    #[test]
    fn absent_session_is_denied() {
        for p in Permission::ALL {
            assert!(!has_permission(None, p));
        }
    }

    #[test]
    fn anonymous_session_is_denied() {
        for p in Permission::ALL {
            assert!(!has_permission(Some(&UserSession::Anonymous), p));
        }
    }

    #[test]
    fn env_admin_holds_every_permission() {
        let session = UserSession::EnvAdmin {
            username: "root".to_string(),
        };
        for p in Permission::ALL {
            assert!(has_permission(Some(&session), p), "{p}");
        }
    }

    #[test]
    fn user_session_checks_membership() {
        let session = user_session(&[Permission::ManageUsers]);
        assert!(has_permission(Some(&session), Permission::ManageUsers));
        assert!(!has_permission(Some(&session), Permission::ManageRoles));
    }

    #[test]
    fn unknown_role_permissions_are_ignored() {
        let role = Role {
            id: "r1".to_string(),
            name: "Odd".to_string(),
            description: None,
            permissions: vec!["manage_articles".to_string(), "launch_rockets".to_string()],
        };
        let resolved = resolve_permissions([&role]);
        assert_eq!(resolved.into_iter().collect::<Vec<_>>(), vec![Permission::ManageArticles]);
    }
}
