use crate::model::{generate_id, Collection, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Member classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberType {
    #[serde(rename = "CP")]
    ChannelPartner,
    Customer,
    Both,
}

impl MemberType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberType::ChannelPartner => "CP",
            MemberType::Customer => "Customer",
            MemberType::Both => "Both",
        }
    }

    /// Accepts the stored names (`CP`, `Customer`, `Both`) and the signup form
    /// names (`channelpartner`, `customer`, `both`), case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cp" | "channelpartner" | "channel_partner" => Some(MemberType::ChannelPartner),
            "customer" => Some(MemberType::Customer),
            "both" => Some(MemberType::Both),
            _ => None,
        }
    }

    pub fn is_channel_partner(&self) -> bool {
        matches!(self, MemberType::ChannelPartner | MemberType::Both)
    }

    pub fn is_customer(&self) -> bool {
        matches!(self, MemberType::Customer | MemberType::Both)
    }

    pub fn from_flags(channel_partner: bool, customer: bool) -> Self {
        match (channel_partner, customer) {
            (true, true) => MemberType::Both,
            (true, false) => MemberType::ChannelPartner,
            _ => MemberType::Customer,
        }
    }

    /// Union of two classifications.
    pub fn merge(self, other: MemberType) -> Self {
        Self::from_flags(
            self.is_channel_partner() || other.is_channel_partner(),
            self.is_customer() || other.is_customer(),
        )
    }

    /// Collections a member of this type must have a record in.
    pub fn collections(&self) -> &'static [Collection] {
        match self {
            MemberType::ChannelPartner => &[Collection::ChannelPartner],
            MemberType::Customer => &[Collection::Customer],
            MemberType::Both => &[Collection::ChannelPartner, Collection::Customer],
        }
    }
}

impl std::fmt::Display for MemberType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from a member to the member who introduced them.
///
/// Name and mobile are cached copies taken when the link was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntroducerRef {
    pub id: Id,
    pub collection: Option<Collection>,
    pub mobile: Option<String>,
    pub name: Option<String>,
}

impl IntroducerRef {
    pub fn to(member: &MemberRecord) -> Self {
        Self {
            id: member.id.clone(),
            collection: Some(member.collection),
            mobile: Some(member.mobile.clone()),
            name: Some(member.name.clone()),
        }
    }
}

/// One stored member document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: Id,
    pub collection: Collection,
    pub name: String,
    pub display_name: String,
    pub mobile: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub introducer: Option<IntroducerRef>,
    /// Legacy records carry no type.
    pub user_type: Option<MemberType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemberRecord {
    pub fn new(
        collection: Collection,
        name: String,
        display_name: String,
        mobile: String,
        password_hash: String,
        user_type: Option<MemberType>,
        introducer: Option<IntroducerRef>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            collection,
            name,
            display_name,
            mobile,
            password_hash,
            introducer,
            user_type,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy of this record placed in another collection under the same id.
    pub fn copy_into(&self, collection: Collection) -> Self {
        Self {
            collection,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn introducer_id(&self) -> Option<&Id> {
        self.introducer.as_ref().map(|i| &i.id)
    }

    /// Type used when counting; untyped legacy records count as customers.
    pub fn effective_type(&self) -> MemberType {
        self.user_type.unwrap_or(MemberType::Customer)
    }

    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    pub fn summary(&self) -> MemberSummary {
        MemberSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            mobile: self.mobile.clone(),
            user_type: self.user_type,
            introducer_name: self.introducer.as_ref().and_then(|i| i.name.clone()),
            created_at: self.created_at,
        }
    }
}

/// Member as exposed over the API (never carries the password hash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub id: Id,
    pub name: String,
    pub display_name: String,
    pub mobile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<MemberType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introducer_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
