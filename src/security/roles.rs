//! Role derivation and the per-topic rights tables.
//!
//! Users are stored with a legacy numeric role. The effective role of a
//! request is derived from that legacy role and from whether the user is
//! acting on their own organization or on another contact. Each effective
//! role maps to one complete rights table.

use std::collections::HashMap;

use derive_more::Display;
use lazy_static::lazy_static;

use crate::models::{IdType, ItemType};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, juniper::GraphQLEnum)]
pub enum LegacyRole {
    Root,
    InternAdmin,
    InternEditor,
    ExternAdmin,
    ExternEditor,
    Exploitant,
    Beheerder,
    ExploitantDataAnalyst,
    InternDataAnalyst,
    ExternDataAnalyst,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum LegacyGroup {
    Intern,
    Extern,
    Exploitant,
    Beheerder,
}

impl LegacyGroup {
    pub fn to_db(&self) -> &'static str {
        match self {
            LegacyGroup::Intern => "intern",
            LegacyGroup::Extern => "extern",
            LegacyGroup::Exploitant => "exploitant",
            LegacyGroup::Beheerder => "beheerder",
        }
    }
}

impl LegacyRole {
    pub fn from_id(id: IdType) -> Option<LegacyRole> {
        match id {
            1 => Some(LegacyRole::Root),
            2 => Some(LegacyRole::InternAdmin),
            3 => Some(LegacyRole::InternEditor),
            4 => Some(LegacyRole::ExternAdmin),
            5 => Some(LegacyRole::ExternEditor),
            6 => Some(LegacyRole::Exploitant),
            7 => Some(LegacyRole::Beheerder),
            8 => Some(LegacyRole::ExploitantDataAnalyst),
            9 => Some(LegacyRole::InternDataAnalyst),
            10 => Some(LegacyRole::ExternDataAnalyst),
            _ => None,
        }
    }

    pub fn id(self) -> IdType {
        match self {
            LegacyRole::Root => 1,
            LegacyRole::InternAdmin => 2,
            LegacyRole::InternEditor => 3,
            LegacyRole::ExternAdmin => 4,
            LegacyRole::ExternEditor => 5,
            LegacyRole::Exploitant => 6,
            LegacyRole::Beheerder => 7,
            LegacyRole::ExploitantDataAnalyst => 8,
            LegacyRole::InternDataAnalyst => 9,
            LegacyRole::ExternDataAnalyst => 10,
        }
    }

    pub fn group(self) -> LegacyGroup {
        match self {
            LegacyRole::Root
            | LegacyRole::InternAdmin
            | LegacyRole::InternEditor
            | LegacyRole::InternDataAnalyst => LegacyGroup::Intern,
            LegacyRole::ExternAdmin
            | LegacyRole::ExternEditor
            | LegacyRole::ExternDataAnalyst => LegacyGroup::Extern,
            LegacyRole::Exploitant
            | LegacyRole::ExploitantDataAnalyst => LegacyGroup::Exploitant,
            LegacyRole::Beheerder => LegacyGroup::Beheerder,
        }
    }

    /// Root and intern users work on behalf of every contact.
    pub fn is_platform_wide(self) -> bool {
        self.group() == LegacyGroup::Intern
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, juniper::GraphQLEnum)]
pub enum UserRole {
    None,
    RootAdmin,
    Admin,
    Editor,
    DataAnalyst,
    Viewer,
}

impl UserRole {
    pub fn level(self) -> u8 {
        match self {
            UserRole::None => 0,
            UserRole::Viewer => 1,
            UserRole::DataAnalyst => 2,
            UserRole::Editor => 3,
            UserRole::Admin => 4,
            UserRole::RootAdmin => 5,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, juniper::GraphQLEnum)]
pub enum SecurityTopic {
    System,
    Users,
    Gemeenten,
    Exploitanten,
    Dataleveranciers,
    Fietsenstallingen,
    Content,
    Rapportages,
}

pub const ALL_TOPICS: [SecurityTopic; 8] = [
    SecurityTopic::System,
    SecurityTopic::Users,
    SecurityTopic::Gemeenten,
    SecurityTopic::Exploitanten,
    SecurityTopic::Dataleveranciers,
    SecurityTopic::Fietsenstallingen,
    SecurityTopic::Content,
    SecurityTopic::Rapportages,
];

impl SecurityTopic {
    /// Topic guarding the contacts of a type.
    pub fn for_contact_type(item_type: ItemType) -> SecurityTopic {
        match item_type {
            ItemType::Organizations => SecurityTopic::Gemeenten,
            ItemType::Exploitant => SecurityTopic::Exploitanten,
            ItemType::Dataprovider => SecurityTopic::Dataleveranciers,
            ItemType::Admin => SecurityTopic::System,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, juniper::GraphQLObject)]
pub struct CrudRights {
    pub create: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
}

impl CrudRights {
    pub const NONE: CrudRights = CrudRights { create: false, read: false, update: false, delete: false };
    pub const READ: CrudRights = CrudRights { create: false, read: true, update: false, delete: false };
    pub const READ_UPDATE: CrudRights = CrudRights { create: false, read: true, update: true, delete: false };
    pub const NO_DELETE: CrudRights = CrudRights { create: true, read: true, update: true, delete: false };
    pub const ALL: CrudRights = CrudRights { create: true, read: true, update: true, delete: true };

    pub fn allows(&self, op: Operation) -> bool {
        match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

pub type RightsTable = HashMap<SecurityTopic, CrudRights>;

fn build_table(entries: &[(SecurityTopic, CrudRights)]) -> RightsTable {
    // Every topic is present, the ones not listed get no rights at all
    let mut table: RightsTable = ALL_TOPICS.iter().map(|t| (*t, CrudRights::NONE)).collect();
    for (topic, rights) in entries {
        table.insert(*topic, *rights);
    }
    table
}

lazy_static! {
    static ref NONE_RIGHTS: RightsTable = build_table(&[]);

    static ref ROOT_ADMIN_RIGHTS: RightsTable = build_table(&[
        (SecurityTopic::System, CrudRights::ALL),
        (SecurityTopic::Users, CrudRights::ALL),
        (SecurityTopic::Gemeenten, CrudRights::ALL),
        (SecurityTopic::Exploitanten, CrudRights::ALL),
        (SecurityTopic::Dataleveranciers, CrudRights::ALL),
        (SecurityTopic::Fietsenstallingen, CrudRights::ALL),
        (SecurityTopic::Content, CrudRights::ALL),
        (SecurityTopic::Rapportages, CrudRights::ALL),
    ]);

    static ref ADMIN_RIGHTS: RightsTable = build_table(&[
        (SecurityTopic::Users, CrudRights::ALL),
        (SecurityTopic::Gemeenten, CrudRights::READ_UPDATE),
        (SecurityTopic::Exploitanten, CrudRights::READ),
        (SecurityTopic::Dataleveranciers, CrudRights::READ),
        (SecurityTopic::Fietsenstallingen, CrudRights::ALL),
        (SecurityTopic::Content, CrudRights::ALL),
        (SecurityTopic::Rapportages, CrudRights::READ),
    ]);

    static ref EDITOR_RIGHTS: RightsTable = build_table(&[
        (SecurityTopic::Gemeenten, CrudRights::READ),
        (SecurityTopic::Exploitanten, CrudRights::READ),
        (SecurityTopic::Fietsenstallingen, CrudRights::NO_DELETE),
        (SecurityTopic::Content, CrudRights::ALL),
        (SecurityTopic::Rapportages, CrudRights::READ),
    ]);

    static ref DATA_ANALYST_RIGHTS: RightsTable = build_table(&[
        (SecurityTopic::Gemeenten, CrudRights::READ),
        (SecurityTopic::Fietsenstallingen, CrudRights::READ),
        (SecurityTopic::Rapportages, CrudRights::READ),
    ]);

    static ref VIEWER_RIGHTS: RightsTable = build_table(&[
        (SecurityTopic::Gemeenten, CrudRights::READ),
        (SecurityTopic::Fietsenstallingen, CrudRights::READ),
        (SecurityTopic::Content, CrudRights::READ),
    ]);
}

pub fn rights_for(role: UserRole) -> &'static RightsTable {
    match role {
        UserRole::None => &NONE_RIGHTS,
        UserRole::RootAdmin => &ROOT_ADMIN_RIGHTS,
        UserRole::Admin => &ADMIN_RIGHTS,
        UserRole::Editor => &EDITOR_RIGHTS,
        UserRole::DataAnalyst => &DATA_ANALYST_RIGHTS,
        UserRole::Viewer => &VIEWER_RIGHTS,
    }
}

/// Derives the effective role of a user.
///
/// `own_organization` tells whether the contact the user is acting on is the
/// organization the user belongs to. Users without a (known) legacy role get
/// `UserRole::None`.
pub fn derive_role(legacy: Option<LegacyRole>, own_organization: bool) -> UserRole {
    let legacy = match legacy {
        Some(x) => x,
        None => return UserRole::None,
    };

    match (legacy, own_organization) {
        (LegacyRole::Root, true) => UserRole::RootAdmin,
        (LegacyRole::Root, false) => UserRole::Admin,
        (LegacyRole::InternAdmin, _) => UserRole::Admin,
        (LegacyRole::InternEditor, _) => UserRole::Editor,
        (LegacyRole::InternDataAnalyst, _) => UserRole::DataAnalyst,
        (LegacyRole::ExternAdmin, true) => UserRole::Admin,
        (LegacyRole::ExternEditor, true) => UserRole::Editor,
        (LegacyRole::ExternDataAnalyst, true) => UserRole::DataAnalyst,
        (LegacyRole::ExternAdmin, false)
        | (LegacyRole::ExternEditor, false)
        | (LegacyRole::ExternDataAnalyst, false) => UserRole::None,
        (LegacyRole::Exploitant, true) => UserRole::Admin,
        (LegacyRole::Exploitant, false) => UserRole::Editor,
        (LegacyRole::ExploitantDataAnalyst, _) => UserRole::DataAnalyst,
        (LegacyRole::Beheerder, true) => UserRole::Editor,
        (LegacyRole::Beheerder, false) => UserRole::None,
    }
}

#[derive(Debug, Clone, PartialEq, juniper::GraphQLObject)]
pub struct TopicRights {
    pub topic: SecurityTopic,
    pub rights: CrudRights,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityProfile {
    pub role: UserRole,
    rights: &'static RightsTable,
}

impl SecurityProfile {
    pub fn new(role: UserRole) -> Self {
        SecurityProfile {
            role,
            rights: rights_for(role),
        }
    }

    pub fn derive(legacy: Option<LegacyRole>, own_organization: bool) -> Self {
        Self::new(derive_role(legacy, own_organization))
    }

    pub fn rights(&self, topic: SecurityTopic) -> CrudRights {
        self.rights.get(&topic).copied().unwrap_or(CrudRights::NONE)
    }

    pub fn allows(&self, topic: SecurityTopic, op: Operation) -> bool {
        self.rights(topic).allows(op)
    }

    /// Rights in the stable topic order used by the admin UI.
    pub fn topic_rights(&self) -> Vec<TopicRights> {
        ALL_TOPICS.iter()
            .map(|topic| TopicRights { topic: *topic, rights: self.rights(*topic) })
            .collect()
    }
}

/// Whether a user may act on behalf of `target`.
pub fn may_access_contact(legacy: Option<LegacyRole>, own_contact: Option<IdType>, linked_contacts: &[IdType], target: IdType) -> bool {
    match legacy {
        None => false,
        Some(role) if role.is_platform_wide() => true,
        Some(_) => own_contact == Some(target) || linked_contacts.contains(&target),
    }
}

/// Whether a user with legacy role `actor` may give `target` to another user.
pub fn may_assign_role(actor: Option<LegacyRole>, target: LegacyRole) -> bool {
    match actor {
        Some(LegacyRole::Root) => true,
        Some(LegacyRole::InternAdmin) => target != LegacyRole::Root,
        Some(LegacyRole::ExternAdmin) => target.group() == LegacyGroup::Extern,
        Some(LegacyRole::Exploitant) => target.group() == LegacyGroup::Exploitant,
        _ => false,
    }
}
