//! Permission domain model: modules, actions, and per-module flags.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WardenError;

/// A resource domain subject to access control.
///
/// Closed enumeration: every permission entry targets exactly one of
/// these modules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Users,
    Roles,
    Content,
    Settings,
    Reports,
    Analytics,
    Billing,
    Support,
}

impl Module {
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Users => "users",
            Module::Roles => "roles",
            Module::Content => "content",
            Module::Settings => "settings",
            Module::Reports => "reports",
            Module::Analytics => "analytics",
            Module::Billing => "billing",
            Module::Support => "support",
        }
    }

    /// All modules, in canonical order.
    pub fn all() -> &'static [Module] {
        &[
            Module::Users,
            Module::Roles,
            Module::Content,
            Module::Settings,
            Module::Reports,
            Module::Analytics,
            Module::Billing,
            Module::Support,
        ]
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" => Ok(Module::Users),
            "roles" => Ok(Module::Roles),
            "content" => Ok(Module::Content),
            "settings" => Ok(Module::Settings),
            "reports" => Ok(Module::Reports),
            "analytics" => Ok(Module::Analytics),
            "billing" => Ok(Module::Billing),
            "support" => Ok(Module::Support),
            other => Err(WardenError::Validation {
                message: format!("unknown module: {other}"),
            }),
        }
    }
}

/// One of the four capabilities a module grant can carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    Read,
    Write,
    Delete,
    Admin,
}

/// The four independent capability flags for one module.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionFlags {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub admin: bool,
}

impl PermissionFlags {
    pub fn allows(&self, action: PermissionAction) -> bool {
        match action {
            PermissionAction::Read => self.read,
            PermissionAction::Write => self.write,
            PermissionAction::Delete => self.delete,
            PermissionAction::Admin => self.admin,
        }
    }

    /// Flag-wise OR of two grants.
    pub fn union(&self, other: &PermissionFlags) -> PermissionFlags {
        PermissionFlags {
            read: self.read || other.read,
            write: self.write || other.write,
            delete: self.delete || other.delete,
            admin: self.admin || other.admin,
        }
    }
}

/// A single permission grant as supplied by callers: one module plus
/// its flags. Role state stores the validated `BTreeMap` form instead,
/// which cannot express duplicate modules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionEntry {
    pub module: Module,
    #[serde(flatten)]
    pub flags: PermissionFlags,
}

/// A fully resolved, inheritance-applied permission mapping.
///
/// `BTreeMap` keeps module iteration order stable within one call,
/// which the role comparator relies on.
pub type EffectivePermissions = BTreeMap<Module, PermissionFlags>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_round_trips_through_str() {
        for module in Module::all() {
            assert_eq!(module.as_str().parse::<Module>().unwrap(), *module);
        }
    }

    #[test]
    fn unknown_module_is_rejected() {
        assert!("payments".parse::<Module>().is_err());
    }

    #[test]
    fn flags_default_to_all_false() {
        let flags = PermissionFlags::default();
        assert!(!flags.read && !flags.write && !flags.delete && !flags.admin);
    }

    #[test]
    fn union_is_flagwise_or() {
        let a = PermissionFlags {
            read: true,
            ..Default::default()
        };
        let b = PermissionFlags {
            write: true,
            ..Default::default()
        };
        let merged = a.union(&b);
        assert!(merged.read && merged.write);
        assert!(!merged.delete && !merged.admin);
    }

    #[test]
    fn allows_maps_each_action_to_its_flag() {
        let flags = PermissionFlags {
            read: true,
            admin: true,
            ..Default::default()
        };
        assert!(flags.allows(PermissionAction::Read));
        assert!(!flags.allows(PermissionAction::Write));
        assert!(!flags.allows(PermissionAction::Delete));
        assert!(flags.allows(PermissionAction::Admin));
    }
}
