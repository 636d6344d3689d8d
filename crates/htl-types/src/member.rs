use serde::{Deserialize, Serialize};

/// A registered supply-chain participant.
///
/// `member_type` is free-form on the wire; the participants the ledger
/// expects are `grower`, `lab`, `shipper`, `trader` and `retailer`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub organization: String,
    pub address: String,
    pub member_type: String,
}

impl Member {
    pub fn new(
        id: impl Into<String>,
        organization: impl Into<String>,
        address: impl Into<String>,
        member_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            organization: organization.into(),
            address: address.into(),
            member_type: member_type.into(),
        }
    }
}
