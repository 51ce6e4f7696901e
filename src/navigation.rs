use askama::Template;

use crate::{
    models::{DashboardStats, NavLink, Permission},
    policy::has_permission,
    session::UserSession,
};

/// A candidate entry in the admin navigation.
pub struct NavItem {
    pub label: &'static str,
    pub href: &'static str,
    pub permission: Permission,
}

/// Admin navigation, in display order. Hiding an entry is cosmetic: the
/// route gate and the handlers enforce the same permission.
pub const NAV_ITEMS: [NavItem; 8] = [
    NavItem {
        label: "Dashboard",
        href: "/admin",
        permission: Permission::ViewAdminDashboard,
    },
    NavItem {
        label: "Articles",
        href: "/admin/api/content/articles",
        permission: Permission::ManageArticles,
    },
    NavItem {
        label: "Advertisements",
        href: "/admin/api/content/advertisements",
        permission: Permission::ManageLayoutGadgets,
    },
    NavItem {
        label: "Gadgets",
        href: "/admin/api/content/gadgets",
        permission: Permission::ManageLayoutGadgets,
    },
    NavItem {
        label: "Users",
        href: "/admin/api/users",
        permission: Permission::ManageUsers,
    },
    NavItem {
        label: "Roles",
        href: "/admin/api/roles",
        permission: Permission::ManageRoles,
    },
    NavItem {
        label: "SEO",
        href: "/admin/api/content/seo_settings",
        permission: Permission::ManageSeoGlobal,
    },
    NavItem {
        label: "Activity log",
        href: "/admin/api/activity",
        permission: Permission::ManageSettings,
    },
];

pub fn visible_items(session: &UserSession) -> Vec<NavLink> {
    NAV_ITEMS
        .iter()
        .filter(|item| has_permission(Some(session), item.permission))
        .map(|item| NavLink {
            label: item.label.to_string(),
            href: item.href.to_string(),
        })
        .collect()
}

/// Server-rendered admin shell.
#[derive(Template)]
#[template(path = "admin/shell.html")]
pub struct AdminShellTemplate {
    pub username: String,
    pub is_env_admin: bool,
    pub links: Vec<NavLink>,
    pub dashboard: Option<DashboardStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_sees_nothing() {
        assert!(visible_items(&UserSession::Anonymous).is_empty());
    }

    #[test]
    fn env_admin_sees_everything() {
        let session = UserSession::EnvAdmin {
            username: "root".to_string(),
        };
        assert_eq!(visible_items(&session).len(), NAV_ITEMS.len());
    }

    #[test]
    fn user_sees_only_granted_items() {
        let session = UserSession::User {
            user_id: "u1".to_string(),
            username: "hr".to_string(),
            roles: vec!["r1".to_string()],
            permissions: [Permission::ManageUsers].into_iter().collect(),
        };
        let labels: Vec<String> = visible_items(&session)
            .into_iter()
            .map(|l| l.label)
            .collect();
        assert_eq!(labels, vec!["Users".to_string()]);
    }
}
