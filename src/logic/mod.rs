pub mod accounts;
pub mod admin;
pub mod aggregate;
pub mod credentials;
pub mod error;
pub mod migrate;
pub mod network;
pub mod promo;
pub mod reports;

pub use aggregate::{
    admin_network, branch_summary, classify, count_level, level_members, network_for,
    AdminNetwork, Branch, BranchSummary, LevelCount, LevelMembers, MemberNetwork,
};
pub use credentials::{hash_password, verify_password, TokenError, TokenIssuer};
pub use error::LogicError;
pub use network::{merge_records, Dedup, Level, NetworkMember, NetworkOptions, ReferralGraph};
pub use promo::PromoRenderer;
pub use reports::{
    connections, hierarchy, hierarchy_level, member_stats, ranking, referral_chain, top_introducers,
    IntroducerLookup,
};
