//! Identity projection used to tag outbound bridge requests.

use serde::Serialize;

use crate::request::Identity;

/// Compact, stably keyed view of an [`Identity`].
///
/// Key names are part of the contract with downstream services reading the
/// `X-Arch-Author` / `X-Arch-Script-Author` headers; do not rename fields
/// without renaming them on the receiving side.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct IdentityProjection<'a> {
    pub id: u64,
    pub name: &'a str,
    pub avatar_url: &'a str,
    pub color: &'a str,
    pub discrim: u32,
    pub roles: &'a [u64],
    pub nick: &'a str,
    pub permissions: u64,
}

impl<'a> From<&'a Identity> for IdentityProjection<'a> {
    fn from(identity: &'a Identity) -> Self {
        Self {
            id: identity.id,
            name: &identity.name,
            avatar_url: &identity.avatar_url,
            color: &identity.color,
            discrim: identity.discriminator,
            roles: &identity.roles,
            nick: &identity.nick,
            permissions: identity.permissions,
        }
    }
}

impl IdentityProjection<'_> {
    /// Serialize to the compact JSON form placed in a header value.
    pub fn to_header_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Project and serialize in one step.
pub fn project(identity: &Identity) -> serde_json::Result<String> {
    IdentityProjection::from(identity).to_header_json()
}
